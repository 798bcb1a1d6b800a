//! View types for the HTTP API boundary
//!
//! Most views use camelCase serialization for the TypeScript frontend; ts-rs
//! generates matching interfaces (`cargo test export_bindings`).
//!
//! The similar-fixtures and vote responses keep the snake_case field names
//! (`similarity_score`, `match_reasons`, `net_score`) existing clients read.
//!
//! Boolean coercion: SQLite stores bools as i32. Views expose proper bools.

use serde::Serialize;
use ts_rs::TS;

use crate::certification::{approval_percentage, CategoryResult, Evaluation};
use crate::db::endorsements::VoteTally;
use crate::db::models::{
    Certification, EndorsementCategory, EndorsementWithCategory, FixtureType, FixtureWithRelations,
    Manufacturer, Vendor,
};
use crate::error::RegistryError;
use crate::similarity::{ScoreBreakdown, ScoredFixture};

// ============================================================================
// Pagination
// ============================================================================

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

/// Resolve 1-based `page` / `per_page` request values into (page, per_page, offset)
///
/// Fails with `InvalidInput` when the offset does not fit in an i64.
pub fn page_window(
    page: Option<i64>,
    per_page: Option<i64>,
    default_per_page: i64,
    max_per_page: i64,
) -> Result<(i64, i64, i64), RegistryError> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page
        .unwrap_or(default_per_page)
        .clamp(1, max_per_page.max(1));
    let offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| RegistryError::InvalidInput(format!("page {} is out of range", page)))?;
    Ok((page, per_page, offset))
}

// ============================================================================
// Directory Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ManufacturerRefView {
    pub id: i32,
    pub slug: String,
    pub name: String,
}

impl From<&Manufacturer> for ManufacturerRefView {
    fn from(m: &Manufacturer) -> Self {
        Self {
            id: m.id,
            slug: m.slug.clone(),
            name: m.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ManufacturerView {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub website: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub fixture_count: i64,
}

impl ManufacturerView {
    pub fn new(m: Manufacturer, fixture_count: i64) -> Self {
        Self {
            id: m.id,
            slug: m.slug,
            name: m.name,
            website: m.website,
            country: m.country,
            description: m.description,
            fixture_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FixtureTypeView {
    pub id: i32,
    pub slug: String,
    pub name: String,
}

impl From<FixtureType> for FixtureTypeView {
    fn from(t: FixtureType) -> Self {
        Self {
            id: t.id,
            slug: t.slug,
            name: t.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VendorView {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub vendor_type: String,
    pub website: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Only filled on single-vendor lookups
    pub fixture_count: Option<i64>,
}

impl From<Vendor> for VendorView {
    fn from(v: Vendor) -> Self {
        Self {
            id: v.id,
            slug: v.slug,
            name: v.name,
            vendor_type: v.vendor_type,
            website: v.website,
            region: v.region,
            latitude: v.latitude,
            longitude: v.longitude,
            fixture_count: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FixtureView {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub manufacturer: Option<ManufacturerRefView>,
    pub fixture_type: Option<String>,
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
    pub is_active: bool,
    pub certified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl FixtureView {
    pub fn new(row: FixtureWithRelations, certified: bool) -> Self {
        let f = row.fixture;
        Self {
            id: f.id,
            slug: f.slug,
            name: f.name,
            manufacturer: row.manufacturer.as_ref().map(ManufacturerRefView::from),
            fixture_type: row.fixture_type.map(|t| t.name),
            light_source_type: f.light_source_type,
            total_lumens: f.total_lumens,
            power_consumption_watts: f.power_consumption_watts,
            weight_kg: f.weight_kg,
            beam_angle_min: f.beam_angle_min,
            beam_angle_max: f.beam_angle_max,
            color_mixing_type: f.color_mixing_type,
            pan_range_degrees: f.pan_range_degrees,
            tilt_range_degrees: f.tilt_range_degrees,
            dmx_channels_min: f.dmx_channels_min,
            gobo_wheels_count: f.gobo_wheels_count,
            description: f.description,
            is_active: f.is_active != 0,
            certified,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

/// Fixture page with the vendors carrying it
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FixtureDetailView {
    #[serde(flatten)]
    pub fixture: FixtureView,
    pub vendors: Vec<VendorView>,
    pub certification: Option<CertificationView>,
}

// ============================================================================
// Similarity Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ScoreBreakdownView {
    pub fixture_type: f64,
    pub light_source: f64,
    pub brightness: f64,
    pub power: f64,
    pub weight: f64,
    pub beam_angle: f64,
    pub color_mixing: f64,
    pub movement: f64,
    pub dmx_channels: f64,
    pub gobo: f64,
}

impl From<ScoreBreakdown> for ScoreBreakdownView {
    fn from(b: ScoreBreakdown) -> Self {
        Self {
            fixture_type: b.fixture_type,
            light_source: b.light_source,
            brightness: b.brightness,
            power: b.power,
            weight: b.weight,
            beam_angle: b.beam_angle,
            color_mixing: b.color_mixing,
            movement: b.movement,
            dmx_channels: b.dmx_channels,
            gobo: b.gobo,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SimilarFixtureView {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub manufacturer_name: Option<String>,
    pub fixture_type_name: Option<String>,
    pub light_source_type: Option<String>,
    pub total_lumens: Option<f64>,
    pub similarity_score: f64,
    pub match_reasons: Vec<String>,
    pub score_breakdown: ScoreBreakdownView,
}

impl SimilarFixtureView {
    pub fn new(scored: ScoredFixture, relations: &FixtureWithRelations) -> Self {
        Self {
            id: scored.fixture.id,
            slug: scored.fixture.slug,
            name: scored.fixture.name,
            manufacturer_name: relations.manufacturer.as_ref().map(|m| m.name.clone()),
            fixture_type_name: relations.fixture_type.as_ref().map(|t| t.name.clone()),
            light_source_type: scored.fixture.light_source_type,
            total_lumens: scored.fixture.total_lumens,
            similarity_score: scored.score,
            match_reasons: scored.match_reasons,
            score_breakdown: scored.breakdown.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SimilarFixturesView {
    pub reference: FixtureView,
    pub similar: Vec<SimilarFixtureView>,
}

// ============================================================================
// Endorsement Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryView {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub is_positive: bool,
    pub applies_to: String,
    pub sort_order: i32,
}

impl From<EndorsementCategory> for CategoryView {
    fn from(c: EndorsementCategory) -> Self {
        Self {
            id: c.id,
            slug: c.slug,
            name: c.name,
            description: c.description,
            is_positive: c.is_positive != 0,
            applies_to: c.applies_to,
            sort_order: c.sort_order,
        }
    }
}

/// One category's tally for an entity, with the caller's own vote
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EndorsementView {
    pub category: CategoryView,
    pub upvotes: i32,
    pub downvotes: i32,
    pub net_score: i32,
    /// `None` means "no data" (nobody has voted)
    pub approval_percentage: Option<f64>,
    pub session_vote: Option<String>,
}

impl EndorsementView {
    /// Category with no endorsement row yet
    pub fn empty(category: EndorsementCategory) -> Self {
        Self {
            category: category.into(),
            upvotes: 0,
            downvotes: 0,
            net_score: 0,
            approval_percentage: None,
            session_vote: None,
        }
    }

    pub fn new(row: EndorsementWithCategory, session_vote: Option<String>) -> Self {
        let e = row.endorsement;
        Self {
            category: row.category.into(),
            upvotes: e.upvotes,
            downvotes: e.downvotes,
            net_score: e.net_score(),
            approval_percentage: approval_percentage(e.upvotes as i64, e.downvotes as i64),
            session_vote,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, TS)]
#[ts(export)]
pub struct VoteResultView {
    pub upvotes: i32,
    pub downvotes: i32,
    pub net_score: i32,
}

impl From<VoteTally> for VoteResultView {
    fn from(t: VoteTally) -> Self {
        Self {
            upvotes: t.upvotes,
            downvotes: t.downvotes,
            net_score: t.net_score,
        }
    }
}

// ============================================================================
// Certification Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CertificationView {
    pub fixture_id: i32,
    pub threshold: f64,
    pub min_votes_per_category: i32,
    pub certified_at: String,
    pub last_reviewed_at: String,
}

impl From<Certification> for CertificationView {
    fn from(c: Certification) -> Self {
        Self {
            fixture_id: c.fixture_id,
            threshold: c.threshold,
            min_votes_per_category: c.min_votes_per_category,
            certified_at: c.certified_at,
            last_reviewed_at: c.last_reviewed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryResultView {
    pub category_slug: String,
    pub category_name: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub total_votes: i64,
    pub approval_rate: f64,
    pub meets_threshold: bool,
    pub has_enough_votes: bool,
}

impl From<CategoryResult> for CategoryResultView {
    fn from(c: CategoryResult) -> Self {
        Self {
            category_slug: c.category_slug,
            category_name: c.category_name,
            upvotes: c.upvotes,
            downvotes: c.downvotes,
            total_votes: c.total_votes,
            approval_rate: c.approval_rate,
            meets_threshold: c.meets_threshold,
            has_enough_votes: c.has_enough_votes,
        }
    }
}

/// Body of `POST /endorsement-issues/certify/{fixtureId}`, pass or fail
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CertifyResultView {
    pub success: bool,
    pub threshold: f64,
    pub all_above_threshold: bool,
    pub has_enough_votes: bool,
    pub min_votes_required: i64,
    pub categories: Vec<CategoryResultView>,
    pub certification: Option<CertificationView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CertifyResultView {
    pub fn new(evaluation: Evaluation, certification: Option<Certification>) -> Self {
        let error = if evaluation.passed {
            None
        } else if !evaluation.all_above_threshold {
            Some(format!(
                "Not every category reaches {}% approval",
                evaluation.threshold
            ))
        } else {
            Some(format!(
                "Every category needs at least {} votes",
                evaluation.min_votes_required
            ))
        };

        Self {
            success: evaluation.passed,
            threshold: evaluation.threshold,
            all_above_threshold: evaluation.all_above_threshold,
            has_enough_votes: evaluation.has_enough_votes,
            min_votes_required: evaluation.min_votes_required,
            categories: evaluation.categories.into_iter().map(Into::into).collect(),
            certification: certification.map(Into::into),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page: Page<i32> = Page::new(vec![1, 2], 5, 1, 2);
        assert_eq!(page.total_pages, 3);
        let empty: Page<i32> = Page::new(vec![], 0, 1, 24);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(None, None, 24, 100).unwrap(), (1, 24, 0));
        assert_eq!(page_window(Some(3), Some(10), 24, 100).unwrap(), (3, 10, 20));
        assert_eq!(page_window(Some(0), Some(1000), 24, 100).unwrap(), (1, 100, 0));
    }

    #[test]
    fn test_page_window_rejects_offset_overflow() {
        let err = page_window(Some(i64::MAX), Some(24), 24, 100).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));

        // per_page of 1 never overflows
        assert_eq!(
            page_window(Some(i64::MAX), Some(1), 24, 100).unwrap(),
            (i64::MAX, 1, i64::MAX - 1)
        );
    }

    #[test]
    fn test_score_breakdown_serializes_through_view() {
        let breakdown = ScoreBreakdown {
            fixture_type: 20.0,
            gobo: 5.0,
            ..Default::default()
        };
        let json = serde_json::to_value(ScoreBreakdownView::from(breakdown)).unwrap();
        assert_eq!(json["fixture_type"], 20.0);
        assert_eq!(json["gobo"], 5.0);
        assert_eq!(json["dmx_channels"], 0.0);
    }

    #[test]
    fn test_vote_result_keeps_snake_case() {
        let view = VoteResultView {
            upvotes: 3,
            downvotes: 1,
            net_score: 2,
        };
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["net_score"], 2);
    }

    #[test]
    fn test_certify_view_reports_failed_criteria() {
        let evaluation = Evaluation {
            passed: false,
            all_above_threshold: true,
            has_enough_votes: false,
            threshold: 90.0,
            min_votes_required: 5,
            categories: vec![],
        };
        let json = serde_json::to_value(CertifyResultView::new(evaluation, None)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["allAboveThreshold"], true);
        assert_eq!(json["hasEnoughVotes"], false);
        assert_eq!(json["minVotesRequired"], 5);
        assert!(json["error"].as_str().unwrap().contains("5 votes"));
    }
}
