//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::RegistryError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), RegistryError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.batch_execute(DIRECTORY_SCHEMA).map_err(|e| {
            RegistryError::Internal(format!("Failed to create directory tables: {}", e))
        })?;
        conn.batch_execute(ENDORSEMENT_SCHEMA).map_err(|e| {
            RegistryError::Internal(format!("Failed to create endorsement tables: {}", e))
        })?;
        conn.batch_execute(INDEXES_SCHEMA)
            .map_err(|e| RegistryError::Internal(format!("Failed to create indexes: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, RegistryError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| {
            RegistryError::Internal(format!("Failed to create schema_version table: {}", e))
        })?;

    let row = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result::<VersionRow>(conn)
        .optional()?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), RegistryError> {
    diesel::sql_query("DELETE FROM schema_version").execute(conn)?;
    diesel::sql_query("INSERT INTO schema_version (version) VALUES (?)")
        .bind::<Integer, _>(version)
        .execute(conn)?;
    Ok(())
}

/// Manufacturers, fixtures, vendors
const DIRECTORY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS manufacturers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    website TEXT,
    country TEXT,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS fixture_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fixtures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    manufacturer_id INTEGER REFERENCES manufacturers(id) ON DELETE SET NULL,
    fixture_type_id INTEGER REFERENCES fixture_types(id) ON DELETE SET NULL,

    -- Specification attributes (all optional, the scorer degrades per field)
    light_source_type TEXT,
    total_lumens REAL,
    power_consumption_watts REAL,
    weight_kg REAL,
    beam_angle_min REAL,
    beam_angle_max REAL,
    color_mixing_type TEXT,
    pan_range_degrees REAL,
    tilt_range_degrees REAL,
    dmx_channels_min INTEGER,
    gobo_wheels_count INTEGER,

    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

-- Vendors and distributors share one table, split by vendor_type
CREATE TABLE IF NOT EXISTS vendors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    vendor_type TEXT NOT NULL DEFAULT 'vendor',
    website TEXT,
    region TEXT,
    latitude REAL,
    longitude REAL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS fixture_vendors (
    fixture_id INTEGER NOT NULL REFERENCES fixtures(id) ON DELETE CASCADE,
    vendor_id INTEGER NOT NULL REFERENCES vendors(id) ON DELETE CASCADE,
    PRIMARY KEY (fixture_id, vendor_id)
);
"#;

/// Endorsement categories, tallies, votes and certifications
const ENDORSEMENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS endorsement_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    is_positive INTEGER NOT NULL DEFAULT 1,
    applies_to TEXT NOT NULL DEFAULT 'fixture',
    sort_order INTEGER NOT NULL DEFAULT 0
);

-- Tallies are recounted from endorsement_votes on every write
CREATE TABLE IF NOT EXISTS endorsements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL REFERENCES endorsement_categories(id) ON DELETE CASCADE,
    upvotes INTEGER NOT NULL DEFAULT 0,
    downvotes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    UNIQUE (entity_type, entity_id, category_id)
);

CREATE TABLE IF NOT EXISTS endorsement_votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endorsement_id INTEGER NOT NULL REFERENCES endorsements(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL,
    vote_type TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    UNIQUE (endorsement_id, session_id)
);

CREATE TABLE IF NOT EXISTS certifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fixture_id INTEGER NOT NULL UNIQUE REFERENCES fixtures(id) ON DELETE CASCADE,
    threshold REAL NOT NULL,
    min_votes_per_category INTEGER NOT NULL,
    certified_at TEXT NOT NULL,
    last_reviewed_at TEXT NOT NULL
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fixtures_manufacturer ON fixtures(manufacturer_id);
CREATE INDEX IF NOT EXISTS idx_fixtures_type ON fixtures(fixture_type_id);
CREATE INDEX IF NOT EXISTS idx_fixtures_active ON fixtures(is_active);
CREATE INDEX IF NOT EXISTS idx_vendors_type ON vendors(vendor_type);
CREATE INDEX IF NOT EXISTS idx_endorsements_entity ON endorsements(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_votes_session ON endorsement_votes(session_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        init_schema(&mut conn).unwrap();
        init_schema(&mut conn).unwrap();
        assert_eq!(get_schema_version(&mut conn).unwrap(), SCHEMA_VERSION);
    }
}
