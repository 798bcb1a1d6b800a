//! Certification records - one row per certified fixture

use diesel::prelude::*;

use super::diesel_schema::certifications;
use super::models::{current_timestamp, Certification, NewCertification};
use crate::error::RegistryError;

pub fn get_certification(
    conn: &mut SqliteConnection,
    fixture_id: i32,
) -> Result<Option<Certification>, RegistryError> {
    Ok(certifications::table
        .filter(certifications::fixture_id.eq(fixture_id))
        .select(Certification::as_select())
        .first(conn)
        .optional()?)
}

pub fn list_certifications(
    conn: &mut SqliteConnection,
) -> Result<Vec<Certification>, RegistryError> {
    Ok(certifications::table
        .order(certifications::last_reviewed_at.desc())
        .select(Certification::as_select())
        .load(conn)?)
}

/// Certified fixture ids among `fixture_ids`
pub fn certified_among(
    conn: &mut SqliteConnection,
    fixture_ids: &[i32],
) -> Result<Vec<i32>, RegistryError> {
    if fixture_ids.is_empty() {
        return Ok(vec![]);
    }
    Ok(certifications::table
        .filter(certifications::fixture_id.eq_any(fixture_ids))
        .select(certifications::fixture_id)
        .load(conn)?)
}

/// Insert a certification, or refresh the review timestamp and policy of
/// an existing one. `certified_at` keeps its first value.
pub fn upsert_certification(
    conn: &mut SqliteConnection,
    fixture_id: i32,
    threshold: f64,
    min_votes_per_category: i32,
) -> Result<Certification, RegistryError> {
    let now = current_timestamp();

    diesel::insert_into(certifications::table)
        .values(&NewCertification {
            fixture_id,
            threshold,
            min_votes_per_category,
            certified_at: &now,
            last_reviewed_at: &now,
        })
        .on_conflict(certifications::fixture_id)
        .do_update()
        .set((
            certifications::threshold.eq(threshold),
            certifications::min_votes_per_category.eq(min_votes_per_category),
            certifications::last_reviewed_at.eq(&now),
        ))
        .execute(conn)?;

    get_certification(conn, fixture_id)?
        .ok_or_else(|| RegistryError::Internal("Failed to retrieve certification".into()))
}
