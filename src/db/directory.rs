//! Manufacturers, fixture types and vendors

use diesel::prelude::*;
use serde::Deserialize;

use super::diesel_schema::{fixture_types, fixture_vendors, manufacturers, vendors};
use super::models::{
    current_timestamp, FixtureType, Manufacturer, NewFixtureType, NewFixtureVendor,
    NewManufacturer, NewVendor, Vendor,
};
use crate::error::RegistryError;

/// Vendor kinds accepted in `vendors.vendor_type`
pub const VENDOR_TYPES: &[&str] = &["vendor", "distributor"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManufacturerInput {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFixtureTypeInput {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVendorInput {
    pub slug: String,
    pub name: String,
    #[serde(default = "default_vendor_type")]
    pub vendor_type: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Fixture slugs this vendor carries
    #[serde(default)]
    pub fixtures: Vec<String>,
}

fn default_vendor_type() -> String {
    "vendor".to_string()
}

// ============================================================================
// Manufacturers
// ============================================================================

pub fn get_manufacturer_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<Manufacturer>, RegistryError> {
    Ok(manufacturers::table
        .filter(manufacturers::slug.eq(slug))
        .select(Manufacturer::as_select())
        .first(conn)
        .optional()?)
}

pub fn list_manufacturers(conn: &mut SqliteConnection) -> Result<Vec<Manufacturer>, RegistryError> {
    Ok(manufacturers::table
        .order(manufacturers::name.asc())
        .select(Manufacturer::as_select())
        .load(conn)?)
}

pub fn create_manufacturer(
    conn: &mut SqliteConnection,
    input: &CreateManufacturerInput,
) -> Result<Manufacturer, RegistryError> {
    let now = current_timestamp();
    diesel::insert_into(manufacturers::table)
        .values(&NewManufacturer {
            slug: &input.slug,
            name: &input.name,
            website: input.website.as_deref(),
            country: input.country.as_deref(),
            description: input.description.as_deref(),
            created_at: &now,
        })
        .execute(conn)?;

    get_manufacturer_by_slug(conn, &input.slug)?
        .ok_or_else(|| RegistryError::Internal("Failed to retrieve created manufacturer".into()))
}

// ============================================================================
// Fixture Types
// ============================================================================

pub fn get_fixture_type_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<FixtureType>, RegistryError> {
    Ok(fixture_types::table
        .filter(fixture_types::slug.eq(slug))
        .select(FixtureType::as_select())
        .first(conn)
        .optional()?)
}

pub fn list_fixture_types(conn: &mut SqliteConnection) -> Result<Vec<FixtureType>, RegistryError> {
    Ok(fixture_types::table
        .order(fixture_types::name.asc())
        .select(FixtureType::as_select())
        .load(conn)?)
}

pub fn create_fixture_type(
    conn: &mut SqliteConnection,
    slug: &str,
    name: &str,
) -> Result<FixtureType, RegistryError> {
    diesel::insert_into(fixture_types::table)
        .values(&NewFixtureType { slug, name })
        .execute(conn)?;

    get_fixture_type_by_slug(conn, slug)?
        .ok_or_else(|| RegistryError::Internal("Failed to retrieve created fixture type".into()))
}

// ============================================================================
// Vendors
// ============================================================================

pub fn get_vendor(conn: &mut SqliteConnection, id: i32) -> Result<Option<Vendor>, RegistryError> {
    Ok(vendors::table
        .filter(vendors::id.eq(id))
        .select(Vendor::as_select())
        .first(conn)
        .optional()?)
}

pub fn get_vendor_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<Vendor>, RegistryError> {
    Ok(vendors::table
        .filter(vendors::slug.eq(slug))
        .select(Vendor::as_select())
        .first(conn)
        .optional()?)
}

/// List vendors, optionally restricted to one vendor_type
pub fn list_vendors(
    conn: &mut SqliteConnection,
    vendor_type: Option<&str>,
) -> Result<Vec<Vendor>, RegistryError> {
    let mut query = vendors::table.into_boxed();
    if let Some(kind) = vendor_type {
        query = query.filter(vendors::vendor_type.eq(kind.to_string()));
    }
    Ok(query
        .order(vendors::name.asc())
        .select(Vendor::as_select())
        .load(conn)?)
}

/// Create a vendor without its fixture links
pub fn create_vendor(
    conn: &mut SqliteConnection,
    input: &CreateVendorInput,
) -> Result<Vendor, RegistryError> {
    let now = current_timestamp();
    diesel::insert_into(vendors::table)
        .values(&NewVendor {
            slug: &input.slug,
            name: &input.name,
            vendor_type: &input.vendor_type,
            website: input.website.as_deref(),
            region: input.region.as_deref(),
            latitude: input.latitude,
            longitude: input.longitude,
            created_at: &now,
        })
        .execute(conn)?;

    get_vendor_by_slug(conn, &input.slug)?
        .ok_or_else(|| RegistryError::Internal("Failed to retrieve created vendor".into()))
}

/// Record that a vendor carries a fixture. Returns false if already linked.
pub fn link_fixture_vendor(
    conn: &mut SqliteConnection,
    fixture_id: i32,
    vendor_id: i32,
) -> Result<bool, RegistryError> {
    let inserted = diesel::insert_or_ignore_into(fixture_vendors::table)
        .values(&NewFixtureVendor {
            fixture_id,
            vendor_id,
        })
        .execute(conn)?;
    Ok(inserted > 0)
}

/// Number of fixtures a vendor carries
pub fn vendor_fixture_count(
    conn: &mut SqliteConnection,
    vendor_id: i32,
) -> Result<i64, RegistryError> {
    Ok(fixture_vendors::table
        .filter(fixture_vendors::vendor_id.eq(vendor_id))
        .count()
        .get_result(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RegistryDb;

    fn vendor(slug: &str, kind: &str) -> CreateVendorInput {
        CreateVendorInput {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            vendor_type: kind.to_string(),
            website: None,
            region: Some("EU".into()),
            latitude: Some(52.5),
            longitude: Some(13.4),
            fixtures: vec![],
        }
    }

    #[test]
    fn test_vendor_type_filter() {
        let db = RegistryDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            create_vendor(conn, &vendor("stagehouse", "vendor"))?;
            create_vendor(conn, &vendor("lightflow", "distributor"))?;

            assert_eq!(list_vendors(conn, None)?.len(), 2);
            let distributors = list_vendors(conn, Some("distributor"))?;
            assert_eq!(distributors.len(), 1);
            assert_eq!(distributors[0].slug, "lightflow");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_duplicate_manufacturer_slug_fails() {
        let db = RegistryDb::open_in_memory().unwrap();
        let input = CreateManufacturerInput {
            slug: "robe".into(),
            name: "Robe".into(),
            ..Default::default()
        };
        db.with_conn(|conn| create_manufacturer(conn, &input)).unwrap();
        let second = db.with_conn(|conn| create_manufacturer(conn, &input));
        assert!(matches!(second, Err(RegistryError::Database(_))));
    }
}
