//! SQLite database module for the fixture directory
//!
//! ## Tables
//!
//! - `manufacturers`, `fixture_types`, `fixtures` - the catalogue
//! - `vendors`, `fixture_vendors` - vendors/distributors and what they carry
//! - `endorsement_categories`, `endorsements`, `endorsement_votes` - community votes
//! - `certifications` - fixtures that passed an explicit evaluation
//!
//! Repository functions take `&mut SqliteConnection` so services can compose
//! them inside a single `conn.transaction`.

pub mod certifications;
pub mod diesel_schema;
pub mod directory;
pub mod endorsements;
pub mod fixtures;
pub mod models;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use tracing::{debug, info};

use crate::error::RegistryError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Per-connection pragmas applied whenever the pool hands out a connection
const WAL_PRAGMAS: &str = concat!(
    "PRAGMA journal_mode = WAL; ",
    "PRAGMA synchronous = NORMAL; ",
    "PRAGMA foreign_keys = ON; ",
    "PRAGMA busy_timeout = 5000;",
);

#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let pragmas = if self.wal {
            WAL_PRAGMAS
        } else {
            "PRAGMA foreign_keys = ON;"
        };
        conn.batch_execute(pragmas).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pooled SQLite database for the registry
pub struct RegistryDb {
    pool: DbPool,
}

impl RegistryDb {
    /// Open or create the registry database
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self, RegistryError> {
        info!("Opening SQLite database at {:?}", db_path);

        let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(Duration::from_secs(10))
            .connection_customizer(Box::new(ConnectionOptions { wal: true }))
            .build(manager)
            .map_err(|e| RegistryError::Pool(format!("Failed to open SQLite: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool
    /// is pinned to a single connection.
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        debug!("Opening in-memory SQLite database");

        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(ConnectionOptions { wal: false }))
            .build(manager)
            .map_err(|e| RegistryError::Pool(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), RegistryError> {
        let mut conn = self.conn()?;
        schema::init_schema(&mut conn)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<PooledConn, RegistryError> {
        self.pool
            .get()
            .map_err(|e| RegistryError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// Run a read operation on a pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, RegistryError>,
    {
        let mut conn = self.conn()?;
        f(&mut conn)
    }

    /// Run a write operation inside a transaction; any error rolls back
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, RegistryError>,
    {
        let mut pooled = self.conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.transaction(f)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, RegistryError> {
        use diesel_schema::{certifications, endorsement_votes, fixtures, manufacturers, vendors};

        self.with_conn(|conn| {
            let fixture_count: i64 = fixtures::table.count().get_result(conn)?;
            let active_fixture_count: i64 = fixtures::table
                .filter(fixtures::is_active.eq(1))
                .count()
                .get_result(conn)?;
            let manufacturer_count: i64 = manufacturers::table.count().get_result(conn)?;
            let vendor_count: i64 = vendors::table.count().get_result(conn)?;
            let vote_count: i64 = endorsement_votes::table.count().get_result(conn)?;
            let certified_count: i64 = certifications::table.count().get_result(conn)?;

            Ok(DbStats {
                fixture_count: fixture_count as u64,
                active_fixture_count: active_fixture_count as u64,
                manufacturer_count: manufacturer_count as u64,
                vendor_count: vendor_count as u64,
                vote_count: vote_count as u64,
                certified_count: certified_count as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub fixture_count: u64,
    pub active_fixture_count: u64,
    pub manufacturer_count: u64,
    pub vendor_count: u64,
    pub vote_count: u64,
    pub certified_count: u64,
}

// Re-exports
pub use endorsements::{EntityKind, EntityRef, VoteType};
pub use fixtures::{CreateFixtureInput, FixtureQuery};
pub use models::{
    Certification, Endorsement, EndorsementCategory, Fixture, FixtureType, FixtureWithRelations,
    Manufacturer, Vendor,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_has_empty_stats() {
        let db = RegistryDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.fixture_count, 0);
        assert_eq!(stats.vote_count, 0);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        {
            let db = RegistryDb::open(&path, 2).unwrap();
            assert_eq!(db.stats().unwrap().certified_count, 0);
        }
        assert!(path.exists());

        // Reopening sees the existing schema version
        let db = RegistryDb::open(&path, 2).unwrap();
        assert_eq!(db.stats().unwrap().manufacturer_count, 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        use diesel_schema::fixture_types;

        let db = RegistryDb::open_in_memory().unwrap();
        let result: Result<(), RegistryError> = db.with_transaction(|conn| {
            diesel::insert_into(fixture_types::table)
                .values(&models::NewFixtureType { slug: "wash", name: "Wash" })
                .execute(conn)?;
            Err(RegistryError::InvalidInput("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| Ok(fixture_types::table.count().get_result(conn)?))
            .unwrap();
        assert_eq!(count, 0);
    }
}
