//! Fixture catalogue operations using Diesel

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::Deserialize;

use super::diesel_schema::{fixture_types, fixture_vendors, fixtures, manufacturers, vendors};
use super::directory;
use super::models::{
    current_timestamp, Fixture, FixtureType, FixtureWithRelations, Manufacturer, NewFixture,
    Vendor,
};
use crate::error::RegistryError;

// ============================================================================
// Query Types
// ============================================================================

/// Input for creating a fixture. Manufacturer and type are referenced by slug.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFixtureInput {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub fixture_type: Option<String>,
    #[serde(default)]
    pub light_source_type: Option<String>,
    #[serde(default)]
    pub total_lumens: Option<f64>,
    #[serde(default)]
    pub power_consumption_watts: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub beam_angle_min: Option<f64>,
    #[serde(default)]
    pub beam_angle_max: Option<f64>,
    #[serde(default)]
    pub color_mixing_type: Option<String>,
    #[serde(default)]
    pub pan_range_degrees: Option<f64>,
    #[serde(default)]
    pub tilt_range_degrees: Option<f64>,
    #[serde(default)]
    pub dmx_channels_min: Option<i32>,
    #[serde(default)]
    pub gobo_wheels_count: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Query parameters for listing fixtures
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureQuery {
    #[serde(default)]
    pub search: Option<String>,
    /// Manufacturer slug
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// Fixture type slug
    #[serde(default, rename = "type")]
    pub fixture_type: Option<String>,
    #[serde(default)]
    pub light_source: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default, alias = "per_page")]
    pub per_page: Option<i64>,
}

/// Reference to a fixture by numeric id or slug
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureKey {
    Id(i32),
    Slug(String),
}

impl FixtureKey {
    /// All-digit path segments are ids, anything else is a slug
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i32>() {
            Ok(id) if !raw.starts_with('+') && !raw.starts_with('-') => FixtureKey::Id(id),
            _ => FixtureKey::Slug(raw.to_string()),
        }
    }
}

impl std::fmt::Display for FixtureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureKey::Id(id) => write!(f, "{}", id),
            FixtureKey::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Filters with slugs already resolved to ids
#[derive(Debug, Clone, Default)]
struct ResolvedFilter {
    search: Option<String>,
    manufacturer_id: Option<i32>,
    fixture_type_id: Option<i32>,
    light_source: Option<String>,
    include_inactive: bool,
}

// ============================================================================
// Read Operations
// ============================================================================

pub fn get_fixture(conn: &mut SqliteConnection, id: i32) -> Result<Option<Fixture>, RegistryError> {
    Ok(fixtures::table
        .filter(fixtures::id.eq(id))
        .select(Fixture::as_select())
        .first(conn)
        .optional()?)
}

pub fn get_fixture_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<Fixture>, RegistryError> {
    Ok(fixtures::table
        .filter(fixtures::slug.eq(slug))
        .select(Fixture::as_select())
        .first(conn)
        .optional()?)
}

/// Look a fixture up by id or slug
pub fn find_fixture(
    conn: &mut SqliteConnection,
    key: &FixtureKey,
) -> Result<Option<Fixture>, RegistryError> {
    match key {
        FixtureKey::Id(id) => get_fixture(conn, *id),
        FixtureKey::Slug(slug) => get_fixture_by_slug(conn, slug),
    }
}

/// Like [`find_fixture`] but a missing fixture is an error
pub fn require_fixture(
    conn: &mut SqliteConnection,
    key: &FixtureKey,
) -> Result<Fixture, RegistryError> {
    find_fixture(conn, key)?.ok_or_else(|| RegistryError::not_found("Fixture", key))
}

/// Attach manufacturer and type rows to a batch of fixtures
pub fn attach_relations(
    conn: &mut SqliteConnection,
    rows: Vec<Fixture>,
) -> Result<Vec<FixtureWithRelations>, RegistryError> {
    let manufacturer_ids: Vec<i32> = rows.iter().filter_map(|f| f.manufacturer_id).collect();
    let type_ids: Vec<i32> = rows.iter().filter_map(|f| f.fixture_type_id).collect();

    let manufacturers_by_id: HashMap<i32, Manufacturer> = if manufacturer_ids.is_empty() {
        HashMap::new()
    } else {
        manufacturers::table
            .filter(manufacturers::id.eq_any(&manufacturer_ids))
            .select(Manufacturer::as_select())
            .load(conn)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect()
    };

    let types_by_id: HashMap<i32, FixtureType> = if type_ids.is_empty() {
        HashMap::new()
    } else {
        fixture_types::table
            .filter(fixture_types::id.eq_any(&type_ids))
            .select(FixtureType::as_select())
            .load(conn)?
            .into_iter()
            .map(|t| (t.id, t))
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|fixture| FixtureWithRelations {
            manufacturer: fixture
                .manufacturer_id
                .and_then(|id| manufacturers_by_id.get(&id).cloned()),
            fixture_type: fixture
                .fixture_type_id
                .and_then(|id| types_by_id.get(&id).cloned()),
            fixture,
        })
        .collect())
}

fn filtered_query(filter: &ResolvedFilter) -> fixtures::BoxedQuery<'static, Sqlite> {
    let mut query = fixtures::table.into_boxed();

    if !filter.include_inactive {
        query = query.filter(fixtures::is_active.eq(1));
    }
    if let Some(id) = filter.manufacturer_id {
        query = query.filter(fixtures::manufacturer_id.eq(id));
    }
    if let Some(id) = filter.fixture_type_id {
        query = query.filter(fixtures::fixture_type_id.eq(id));
    }
    if let Some(ref light_source) = filter.light_source {
        query = query.filter(fixtures::light_source_type.eq(light_source.clone()));
    }
    if let Some(ref search) = filter.search {
        let pattern = format!("%{}%", search);
        query = query.filter(
            fixtures::name
                .like(pattern.clone())
                .or(fixtures::slug.like(pattern)),
        );
    }

    query
}

/// List fixtures with filters and offset pagination.
///
/// Returns the requested page and the total number of matching rows.
/// An unknown manufacturer or type slug matches nothing.
pub fn list_fixtures(
    conn: &mut SqliteConnection,
    query: &FixtureQuery,
    limit: i64,
    offset: i64,
) -> Result<(Vec<FixtureWithRelations>, i64), RegistryError> {
    let mut filter = ResolvedFilter {
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
        light_source: query.light_source.clone(),
        include_inactive: query.include_inactive,
        ..Default::default()
    };

    if let Some(ref slug) = query.manufacturer {
        match directory::get_manufacturer_by_slug(conn, slug)? {
            Some(m) => filter.manufacturer_id = Some(m.id),
            None => return Ok((vec![], 0)),
        }
    }
    if let Some(ref slug) = query.fixture_type {
        match directory::get_fixture_type_by_slug(conn, slug)? {
            Some(t) => filter.fixture_type_id = Some(t.id),
            None => return Ok((vec![], 0)),
        }
    }

    let total: i64 = filtered_query(&filter).count().get_result(conn)?;

    let rows: Vec<Fixture> = filtered_query(&filter)
        .order((fixtures::name.asc(), fixtures::id.asc()))
        .limit(limit)
        .offset(offset)
        .select(Fixture::as_select())
        .load(conn)?;

    Ok((attach_relations(conn, rows)?, total))
}

/// Candidate pool for similarity: every active fixture except the reference
pub fn similarity_candidates(
    conn: &mut SqliteConnection,
    reference_id: i32,
) -> Result<Vec<Fixture>, RegistryError> {
    Ok(fixtures::table
        .filter(fixtures::is_active.eq(1))
        .filter(fixtures::id.ne(reference_id))
        .select(Fixture::as_select())
        .load(conn)?)
}

/// Vendors and distributors carrying a fixture
pub fn vendors_for_fixture(
    conn: &mut SqliteConnection,
    fixture_id: i32,
) -> Result<Vec<Vendor>, RegistryError> {
    Ok(fixture_vendors::table
        .inner_join(vendors::table)
        .filter(fixture_vendors::fixture_id.eq(fixture_id))
        .order(vendors::name.asc())
        .select(Vendor::as_select())
        .load(conn)?)
}

/// Fixture count per manufacturer id
pub fn counts_by_manufacturer(
    conn: &mut SqliteConnection,
) -> Result<HashMap<i32, i64>, RegistryError> {
    let rows: Vec<(Option<i32>, i64)> = fixtures::table
        .filter(fixtures::is_active.eq(1))
        .group_by(fixtures::manufacturer_id)
        .select((fixtures::manufacturer_id, diesel::dsl::count_star()))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count)))
        .collect())
}

// ============================================================================
// Write Operations
// ============================================================================

/// Create a fixture, resolving manufacturer and type slugs
pub fn create_fixture(
    conn: &mut SqliteConnection,
    input: &CreateFixtureInput,
) -> Result<Fixture, RegistryError> {
    let manufacturer_id = match input.manufacturer {
        Some(ref slug) => Some(
            directory::get_manufacturer_by_slug(conn, slug)?
                .ok_or_else(|| RegistryError::not_found("Manufacturer", slug))?
                .id,
        ),
        None => None,
    };
    let fixture_type_id = match input.fixture_type {
        Some(ref slug) => Some(
            directory::get_fixture_type_by_slug(conn, slug)?
                .ok_or_else(|| RegistryError::not_found("Fixture type", slug))?
                .id,
        ),
        None => None,
    };

    let now = current_timestamp();
    let new_fixture = NewFixture {
        slug: &input.slug,
        name: &input.name,
        manufacturer_id,
        fixture_type_id,
        light_source_type: input.light_source_type.as_deref(),
        total_lumens: input.total_lumens,
        power_consumption_watts: input.power_consumption_watts,
        weight_kg: input.weight_kg,
        beam_angle_min: input.beam_angle_min,
        beam_angle_max: input.beam_angle_max,
        color_mixing_type: input.color_mixing_type.as_deref(),
        pan_range_degrees: input.pan_range_degrees,
        tilt_range_degrees: input.tilt_range_degrees,
        dmx_channels_min: input.dmx_channels_min,
        gobo_wheels_count: input.gobo_wheels_count,
        description: input.description.as_deref(),
        is_active: if input.is_active { 1 } else { 0 },
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(fixtures::table)
        .values(&new_fixture)
        .execute(conn)?;

    get_fixture_by_slug(conn, &input.slug)?
        .ok_or_else(|| RegistryError::Internal("Failed to retrieve created fixture".into()))
}

pub fn fixture_slug_exists(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<bool, RegistryError> {
    let count: i64 = fixtures::table
        .filter(fixtures::slug.eq(slug))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::directory::{create_fixture_type, create_manufacturer, CreateManufacturerInput};
    use crate::db::RegistryDb;

    fn fixture(slug: &str, name: &str) -> CreateFixtureInput {
        CreateFixtureInput {
            slug: slug.to_string(),
            name: name.to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fixture_key_parse() {
        assert_eq!(FixtureKey::parse("42"), FixtureKey::Id(42));
        assert_eq!(FixtureKey::parse("mac-aura"), FixtureKey::Slug("mac-aura".into()));
        assert_eq!(FixtureKey::parse("-1"), FixtureKey::Slug("-1".into()));
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let db = RegistryDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            create_manufacturer(
                conn,
                &CreateManufacturerInput {
                    slug: "martin".into(),
                    name: "Martin".into(),
                    ..Default::default()
                },
            )?;
            create_fixture_type(conn, "moving-head", "Moving Head")?;

            let seeds = [
                ("mac-aura", "MAC Aura"),
                ("mac-viper", "MAC Viper"),
                ("era-300", "ERA 300"),
            ];
            for (slug, name) in seeds {
                let mut input = fixture(slug, name);
                if slug.starts_with("mac") {
                    input.manufacturer = Some("martin".into());
                    input.fixture_type = Some("moving-head".into());
                }
                create_fixture(conn, &input)?;
            }

            let mut retired = fixture("old-par", "Old Par");
            retired.is_active = false;
            create_fixture(conn, &retired)?;

            let (all, total) = list_fixtures(conn, &FixtureQuery::default(), 10, 0)?;
            assert_eq!(total, 3);
            assert_eq!(all[0].fixture.name, "ERA 300");

            let by_maker = FixtureQuery {
                manufacturer: Some("martin".into()),
                ..Default::default()
            };
            let (rows, total) = list_fixtures(conn, &by_maker, 1, 1)?;
            assert_eq!(total, 2);
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].fixture.slug, "mac-viper");
            assert_eq!(rows[0].manufacturer.as_ref().unwrap().name, "Martin");

            let searched = FixtureQuery {
                search: Some("viper".into()),
                ..Default::default()
            };
            let (rows, _) = list_fixtures(conn, &searched, 10, 0)?;
            assert_eq!(rows.len(), 1);

            let unknown = FixtureQuery {
                manufacturer: Some("nobody".into()),
                ..Default::default()
            };
            assert_eq!(list_fixtures(conn, &unknown, 10, 0)?.1, 0);

            let with_inactive = FixtureQuery {
                include_inactive: true,
                ..Default::default()
            };
            assert_eq!(list_fixtures(conn, &with_inactive, 10, 0)?.1, 4);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_candidates_exclude_reference_and_inactive() {
        let db = RegistryDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let a = create_fixture(conn, &fixture("a", "A"))?;
            create_fixture(conn, &fixture("b", "B"))?;
            let mut c = fixture("c", "C");
            c.is_active = false;
            create_fixture(conn, &c)?;

            let candidates = similarity_candidates(conn, a.id)?;
            let slugs: Vec<&str> = candidates.iter().map(|f| f.slug.as_str()).collect();
            assert_eq!(slugs, vec!["b"]);
            Ok(())
        })
        .unwrap();
    }
}
