//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//!
//! SQLite stores booleans as INTEGER; the view layer coerces them.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Directory Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = manufacturers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Manufacturer {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub website: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = manufacturers)]
pub struct NewManufacturer<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub website: Option<&'a str>,
    pub country: Option<&'a str>,
    pub description: Option<&'a str>,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fixture_types)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FixtureType {
    pub id: i32,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fixture_types)]
pub struct NewFixtureType<'a> {
    pub slug: &'a str,
    pub name: &'a str,
}

/// Fixture row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = fixtures)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Fixture {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub manufacturer_id: Option<i32>,
    pub fixture_type_id: Option<i32>,
    pub light_source_type: Option<String>,
    pub total_lumens: Option<f64>,
    pub power_consumption_watts: Option<f64>,
    pub weight_kg: Option<f64>,
    pub beam_angle_min: Option<f64>,
    pub beam_angle_max: Option<f64>,
    pub color_mixing_type: Option<String>,
    pub pan_range_degrees: Option<f64>,
    pub tilt_range_degrees: Option<f64>,
    pub dmx_channels_min: Option<i32>,
    pub gobo_wheels_count: Option<i32>,
    pub description: Option<String>,
    pub is_active: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// New fixture for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fixtures)]
pub struct NewFixture<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub manufacturer_id: Option<i32>,
    pub fixture_type_id: Option<i32>,
    pub light_source_type: Option<&'a str>,
    pub total_lumens: Option<f64>,
    pub power_consumption_watts: Option<f64>,
    pub weight_kg: Option<f64>,
    pub beam_angle_min: Option<f64>,
    pub beam_angle_max: Option<f64>,
    pub color_mixing_type: Option<&'a str>,
    pub pan_range_degrees: Option<f64>,
    pub tilt_range_degrees: Option<f64>,
    pub dmx_channels_min: Option<i32>,
    pub gobo_wheels_count: Option<i32>,
    pub description: Option<&'a str>,
    pub is_active: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Fixture joined with its manufacturer and type (API response)
#[derive(Debug, Clone, Serialize)]
pub struct FixtureWithRelations {
    pub fixture: Fixture,
    pub manufacturer: Option<Manufacturer>,
    pub fixture_type: Option<FixtureType>,
}

/// Vendor or distributor row
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = vendors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Vendor {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub vendor_type: String,
    pub website: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vendors)]
pub struct NewVendor<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub vendor_type: &'a str,
    pub website: Option<&'a str>,
    pub region: Option<&'a str>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fixture_vendors)]
pub struct NewFixtureVendor {
    pub fixture_id: i32,
    pub vendor_id: i32,
}

// ============================================================================
// Endorsement Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = endorsement_categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EndorsementCategory {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub is_positive: i32,
    pub applies_to: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = endorsement_categories)]
pub struct NewEndorsementCategory<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub is_positive: i32,
    pub applies_to: &'a str,
    pub sort_order: i32,
}

/// Aggregated tally for one (entity, category) pair
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = endorsements)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Endorsement {
    pub id: i32,
    pub entity_type: String,
    pub entity_id: i32,
    pub category_id: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl Endorsement {
    /// Derived, never stored
    pub fn net_score(&self) -> i32 {
        self.upvotes - self.downvotes
    }

    pub fn total_votes(&self) -> i32 {
        self.upvotes + self.downvotes
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = endorsements)]
pub struct NewEndorsement<'a> {
    pub entity_type: &'a str,
    pub entity_id: i32,
    pub category_id: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = endorsement_votes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EndorsementVote {
    pub id: i32,
    pub endorsement_id: i32,
    pub session_id: String,
    pub vote_type: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = endorsement_votes)]
pub struct NewEndorsementVote<'a> {
    pub endorsement_id: i32,
    pub session_id: &'a str,
    pub vote_type: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Endorsement row joined with its category
#[derive(Debug, Clone, Serialize)]
pub struct EndorsementWithCategory {
    pub endorsement: Endorsement,
    pub category: EndorsementCategory,
}

// ============================================================================
// Certification Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = certifications)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Certification {
    pub id: i32,
    pub fixture_id: i32,
    pub threshold: f64,
    pub min_votes_per_category: i32,
    pub certified_at: String,
    pub last_reviewed_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = certifications)]
pub struct NewCertification<'a> {
    pub fixture_id: i32,
    pub threshold: f64,
    pub min_votes_per_category: i32,
    pub certified_at: &'a str,
    pub last_reviewed_at: &'a str,
}
