//! Fixture service - catalogue reads, creation and similar-fixture lookups

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::{PaginationConfig, SimilarityConfig};
use crate::db::fixtures::{self, FixtureKey};
use crate::db::{certifications, CreateFixtureInput, FixtureQuery, RegistryDb};
use crate::error::RegistryError;
use crate::similarity;
use crate::views::{
    page_window, FixtureDetailView, FixtureView, Page, SimilarFixtureView, SimilarFixturesView,
    VendorView,
};

use super::events::{EventBus, RegistryEvent};

/// Slugs are lowercase ASCII letters, digits and single dashes, with at least one letter
pub(crate) fn validate_slug(field: &str, slug: &str) -> Result<(), RegistryError> {
    let valid = !slug.is_empty()
        && slug.len() <= 128
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(RegistryError::InvalidInput(format!(
            "{} '{}' must be lowercase letters, digits and dashes",
            field, slug
        )));
    }
    // All-digit path segments resolve as ids
    if slug.chars().all(|c| c.is_ascii_digit()) {
        return Err(RegistryError::InvalidInput(format!(
            "{} '{}' must contain a letter",
            field, slug
        )));
    }
    Ok(())
}

pub(crate) fn require_name(field: &str, name: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        Err(RegistryError::InvalidInput(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

fn validate_non_negative(field: &str, value: Option<f64>) -> Result<(), RegistryError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(RegistryError::InvalidInput(format!(
            "{} must be a non-negative number",
            field
        ))),
        _ => Ok(()),
    }
}

/// Fixture service for catalogue business logic
pub struct FixtureService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
    pagination: PaginationConfig,
    similarity: SimilarityConfig,
}

impl FixtureService {
    pub fn new(
        db: Arc<RegistryDb>,
        events: Arc<EventBus>,
        pagination: PaginationConfig,
        similarity: SimilarityConfig,
    ) -> Self {
        Self {
            db,
            events,
            pagination,
            similarity,
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// List fixtures, one page at a time
    pub fn list(&self, query: &FixtureQuery) -> Result<Page<FixtureView>, RegistryError> {
        let (page, per_page, offset) = page_window(
            query.page,
            query.per_page,
            self.pagination.default_per_page,
            self.pagination.max_per_page,
        )?;

        self.db.with_conn(|conn| {
            let (rows, total) = fixtures::list_fixtures(conn, query, per_page, offset)?;
            let ids: Vec<i32> = rows.iter().map(|r| r.fixture.id).collect();
            let certified: HashSet<i32> =
                certifications::certified_among(conn, &ids)?.into_iter().collect();

            let items = rows
                .into_iter()
                .map(|row| {
                    let is_certified = certified.contains(&row.fixture.id);
                    FixtureView::new(row, is_certified)
                })
                .collect();
            Ok(Page::new(items, total, page, per_page))
        })
    }

    /// Fixture page: relations, vendors and certification
    pub fn get(&self, key: &FixtureKey) -> Result<Option<FixtureDetailView>, RegistryError> {
        self.db.with_conn(|conn| {
            let fixture = match fixtures::find_fixture(conn, key)? {
                Some(f) => f,
                None => return Ok(None),
            };
            let fixture_id = fixture.id;

            let row = fixtures::attach_relations(conn, vec![fixture])?
                .pop()
                .ok_or_else(|| RegistryError::Internal("Lost fixture relations".into()))?;
            let vendors = fixtures::vendors_for_fixture(conn, fixture_id)?;
            let certification = certifications::get_certification(conn, fixture_id)?;

            Ok(Some(FixtureDetailView {
                fixture: FixtureView::new(row, certification.is_some()),
                vendors: vendors.into_iter().map(VendorView::from).collect(),
                certification: certification.map(Into::into),
            }))
        })
    }

    /// Top-N fixtures most similar to the reference.
    ///
    /// `limit` falls back to the configured default and is clamped to the
    /// configured maximum.
    pub fn similar(
        &self,
        key: &FixtureKey,
        limit: Option<usize>,
    ) -> Result<SimilarFixturesView, RegistryError> {
        let limit = self.similarity.resolve_limit(limit);

        self.db.with_conn(|conn| {
            let reference = fixtures::require_fixture(conn, key)?;
            let candidates = fixtures::similarity_candidates(conn, reference.id)?;
            let candidate_count = candidates.len();

            let ranked = similarity::rank(&reference, candidates, limit);
            debug!(
                fixture = %reference.slug,
                candidates = candidate_count,
                returned = ranked.len(),
                "Ranked similar fixtures"
            );

            // Manufacturer and type names for the returned rows only
            let mut rows = vec![reference.clone()];
            rows.extend(ranked.iter().map(|s| s.fixture.clone()));
            let mut with_relations = fixtures::attach_relations(conn, rows)?.into_iter();

            let reference_row = with_relations
                .next()
                .ok_or_else(|| RegistryError::Internal("Lost reference fixture".into()))?;
            let certified = certifications::get_certification(conn, reference.id)?.is_some();

            let similar = ranked
                .into_iter()
                .zip(with_relations)
                .map(|(scored, relations)| SimilarFixtureView::new(scored, &relations))
                .collect();

            Ok(SimilarFixturesView {
                reference: FixtureView::new(reference_row, certified),
                similar,
            })
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a fixture with validation
    pub fn create(&self, input: CreateFixtureInput) -> Result<FixtureView, RegistryError> {
        self.validate_fixture(&input)?;

        let row = self.db.with_transaction(|conn| {
            if fixtures::fixture_slug_exists(conn, &input.slug)? {
                return Err(RegistryError::InvalidInput(format!(
                    "Fixture slug '{}' already exists",
                    input.slug
                )));
            }
            let fixture = fixtures::create_fixture(conn, &input)?;
            fixtures::attach_relations(conn, vec![fixture])?
                .pop()
                .ok_or_else(|| RegistryError::Internal("Lost fixture relations".into()))
        })?;

        self.events.emit(RegistryEvent::FixtureCreated {
            id: row.fixture.id,
            slug: row.fixture.slug.clone(),
        });

        Ok(FixtureView::new(row, false))
    }

    fn validate_fixture(&self, input: &CreateFixtureInput) -> Result<(), RegistryError> {
        validate_slug("slug", &input.slug)?;
        require_name("name", &input.name)?;
        validate_non_negative("totalLumens", input.total_lumens)?;
        validate_non_negative("powerConsumptionWatts", input.power_consumption_watts)?;
        validate_non_negative("weightKg", input.weight_kg)?;
        validate_non_negative("beamAngleMin", input.beam_angle_min)?;
        validate_non_negative("beamAngleMax", input.beam_angle_max)?;
        validate_non_negative("panRangeDegrees", input.pan_range_degrees)?;
        validate_non_negative("tiltRangeDegrees", input.tilt_range_degrees)?;
        if matches!(input.dmx_channels_min, Some(n) if n < 0) {
            return Err(RegistryError::InvalidInput(
                "dmxChannelsMin must not be negative".into(),
            ));
        }
        if matches!(input.gobo_wheels_count, Some(n) if n < 0) {
            return Err(RegistryError::InvalidInput(
                "goboWheelsCount must not be negative".into(),
            ));
        }
        Ok(())
    }
}
