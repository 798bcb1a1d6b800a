//! Fixture similarity scoring
//!
//! Scores every candidate against a reference fixture as a weighted sum of
//! ten attribute terms. Each term degrades for missing data instead of
//! excluding the candidate, so a fixture with no specs still gets a low
//! baseline score.
//!
//! | Term | Max |
//! |------|-----|
//! | fixture type | 35 |
//! | light source | 25 |
//! | lumens | 12 |
//! | power | 8 |
//! | color mixing | 10 |
//! | weight | 6 |
//! | pan/tilt parity | 6 |
//! | beam angle (min) | 5 |
//! | DMX channels | 2 |
//! | gobo wheels | 2 |
//!
//! The terms are added without normalisation: an exact match on every
//! attribute scores [`MAX_SCORE`] (111), not 100. Existing rankings depend on
//! these numbers, so the ceiling is kept as is.

use std::cmp::Ordering;

use crate::db::models::Fixture;

/// Score of a candidate that matches the reference on every attribute
pub const MAX_SCORE: f64 = 111.0;

/// Relative difference under which a numeric attribute is reported as a match reason
const CLOSE_RATIO: f64 = 0.2;

/// Attribute snapshot the scorer works on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureProfile {
    pub fixture_type_id: Option<i32>,
    pub light_source_type: Option<String>,
    pub total_lumens: Option<f64>,
    pub power_consumption_watts: Option<f64>,
    pub weight_kg: Option<f64>,
    pub beam_angle_min: Option<f64>,
    pub color_mixing_type: Option<String>,
    pub pan_range_degrees: Option<f64>,
    pub tilt_range_degrees: Option<f64>,
    pub dmx_channels_min: Option<i32>,
    pub gobo_wheels_count: Option<i32>,
}

impl From<&Fixture> for FixtureProfile {
    fn from(f: &Fixture) -> Self {
        Self {
            fixture_type_id: f.fixture_type_id,
            light_source_type: f.light_source_type.clone(),
            total_lumens: f.total_lumens,
            power_consumption_watts: f.power_consumption_watts,
            weight_kg: f.weight_kg,
            beam_angle_min: f.beam_angle_min,
            color_mixing_type: f.color_mixing_type.clone(),
            pan_range_degrees: f.pan_range_degrees,
            tilt_range_degrees: f.tilt_range_degrees,
            dmx_channels_min: f.dmx_channels_min,
            gobo_wheels_count: f.gobo_wheels_count,
        }
    }
}

impl FixtureProfile {
    fn has_movement(&self) -> bool {
        self.pan_range_degrees.is_some() || self.tilt_range_degrees.is_some()
    }
}

/// Per-term contributions of one comparison
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
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

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.fixture_type
            + self.light_source
            + self.brightness
            + self.power
            + self.weight
            + self.beam_angle
            + self.color_mixing
            + self.movement
            + self.dmx_channels
            + self.gobo
    }
}

// ============================================================================
// Term Rules
// ============================================================================

/// Exact / both-present-but-different / otherwise
fn categorical<T: PartialEq>(
    a: Option<&T>,
    b: Option<&T>,
    exact: f64,
    differ: f64,
    missing: f64,
) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a == b => exact,
        (Some(_), Some(_)) => differ,
        _ => missing,
    }
}

/// |a - b| / max(a, b), with a zero (or negative) max contributing nothing
fn relative_delta(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max <= 0.0 {
        0.0
    } else {
        (a - b).abs() / max
    }
}

/// `max(floor, weight - delta * weight)` when both sides are present
fn numeric(a: Option<f64>, b: Option<f64>, weight: f64, floor: f64, one: f64, neither: f64) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (weight - relative_delta(a, b) * weight).max(floor),
        (Some(_), None) | (None, Some(_)) => one,
        (None, None) => neither,
    }
}

fn movement(reference: &FixtureProfile, candidate: &FixtureProfile) -> f64 {
    let ref_pan = reference.pan_range_degrees.is_some();
    let ref_tilt = reference.tilt_range_degrees.is_some();
    let cand_pan = candidate.pan_range_degrees.is_some();
    let cand_tilt = candidate.tilt_range_degrees.is_some();

    if ref_pan == cand_pan && ref_tilt == cand_tilt && ref_pan {
        6.0
    } else if reference.has_movement() || candidate.has_movement() {
        2.0
    } else {
        1.0
    }
}

fn color_mixing(a: Option<&String>, b: Option<&String>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a == b => 10.0,
        (Some(_), Some(_)) => 5.0,
        (Some(_), None) | (None, Some(_)) => 2.0,
        (None, None) => 1.0,
    }
}

fn gobo(a: Option<i32>, b: Option<i32>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a > 0 && b > 0 => 2.0,
        _ => 0.0,
    }
}

/// Score a candidate against the reference
pub fn score(reference: &FixtureProfile, candidate: &FixtureProfile) -> ScoreBreakdown {
    ScoreBreakdown {
        fixture_type: categorical(
            reference.fixture_type_id.as_ref(),
            candidate.fixture_type_id.as_ref(),
            35.0,
            5.0,
            3.0,
        ),
        light_source: categorical(
            reference.light_source_type.as_ref(),
            candidate.light_source_type.as_ref(),
            25.0,
            12.0,
            5.0,
        ),
        brightness: numeric(reference.total_lumens, candidate.total_lumens, 12.0, 5.0, 3.0, 2.0),
        power: numeric(
            reference.power_consumption_watts,
            candidate.power_consumption_watts,
            8.0,
            3.0,
            2.0,
            1.0,
        ),
        weight: numeric(reference.weight_kg, candidate.weight_kg, 6.0, 2.0, 1.0, 0.0),
        beam_angle: numeric(reference.beam_angle_min, candidate.beam_angle_min, 5.0, 2.0, 1.0, 0.0),
        color_mixing: color_mixing(
            reference.color_mixing_type.as_ref(),
            candidate.color_mixing_type.as_ref(),
        ),
        movement: movement(reference, candidate),
        dmx_channels: numeric(
            reference.dmx_channels_min.map(f64::from),
            candidate.dmx_channels_min.map(f64::from),
            2.0,
            1.0,
            0.0,
            0.0,
        ),
        gobo: gobo(reference.gobo_wheels_count, candidate.gobo_wheels_count),
    }
}

/// Human-readable reasons a candidate resembles the reference
pub fn match_reasons(reference: &FixtureProfile, candidate: &FixtureProfile) -> Vec<String> {
    let mut reasons = Vec::new();

    let same = |a: Option<&String>, b: Option<&String>| {
        matches!((a, b), (Some(a), Some(b)) if a == b)
    };
    let close = |a: Option<f64>, b: Option<f64>| match (a, b) {
        (Some(a), Some(b)) => relative_delta(a, b) <= CLOSE_RATIO,
        _ => false,
    };

    if matches!(
        (reference.fixture_type_id, candidate.fixture_type_id),
        (Some(a), Some(b)) if a == b
    ) {
        reasons.push("Same fixture type".to_string());
    }
    if same(reference.light_source_type.as_ref(), candidate.light_source_type.as_ref()) {
        reasons.push(format!(
            "Same light source ({})",
            reference.light_source_type.as_deref().unwrap_or_default()
        ));
    }
    if close(reference.total_lumens, candidate.total_lumens) {
        reasons.push("Similar brightness".to_string());
    }
    if close(reference.power_consumption_watts, candidate.power_consumption_watts) {
        reasons.push("Similar power draw".to_string());
    }
    if close(reference.weight_kg, candidate.weight_kg) {
        reasons.push("Similar weight".to_string());
    }
    if close(reference.beam_angle_min, candidate.beam_angle_min) {
        reasons.push("Similar beam angle".to_string());
    }
    if same(reference.color_mixing_type.as_ref(), candidate.color_mixing_type.as_ref()) {
        reasons.push(format!(
            "Same color mixing ({})",
            reference.color_mixing_type.as_deref().unwrap_or_default()
        ));
    }
    if movement(reference, candidate) >= 6.0 {
        reasons.push("Both have pan/tilt movement".to_string());
    }
    if gobo(reference.gobo_wheels_count, candidate.gobo_wheels_count) > 0.0 {
        reasons.push("Both have gobo wheels".to_string());
    }

    reasons
}

/// One ranked candidate
#[derive(Debug, Clone)]
pub struct ScoredFixture {
    pub fixture: Fixture,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub match_reasons: Vec<String>,
}

/// Rank candidates against the reference.
///
/// The reference itself and inactive fixtures never appear in the output.
/// Sorted by score descending, then name ascending, truncated to `limit`.
pub fn rank(reference: &Fixture, candidates: Vec<Fixture>, limit: usize) -> Vec<ScoredFixture> {
    let profile = FixtureProfile::from(reference);

    let mut scored: Vec<ScoredFixture> = candidates
        .into_iter()
        .filter(|c| c.id != reference.id && c.is_active != 0)
        .map(|fixture| {
            let candidate = FixtureProfile::from(&fixture);
            let breakdown = score(&profile, &candidate);
            ScoredFixture {
                score: breakdown.total(),
                match_reasons: match_reasons(&profile, &candidate),
                breakdown,
                fixture,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.fixture.name.cmp(&b.fixture.name))
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_profile() -> FixtureProfile {
        FixtureProfile {
            fixture_type_id: Some(1),
            light_source_type: Some("LED".into()),
            total_lumens: Some(10000.0),
            power_consumption_watts: Some(500.0),
            weight_kg: Some(25.0),
            beam_angle_min: Some(4.0),
            color_mixing_type: Some("CMY".into()),
            pan_range_degrees: Some(540.0),
            tilt_range_degrees: Some(270.0),
            dmx_channels_min: Some(16),
            gobo_wheels_count: Some(2),
        }
    }

    fn fixture(id: i32, name: &str, profile: &FixtureProfile) -> Fixture {
        Fixture {
            id,
            slug: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            manufacturer_id: None,
            fixture_type_id: profile.fixture_type_id,
            light_source_type: profile.light_source_type.clone(),
            total_lumens: profile.total_lumens,
            power_consumption_watts: profile.power_consumption_watts,
            weight_kg: profile.weight_kg,
            beam_angle_min: profile.beam_angle_min,
            beam_angle_max: None,
            color_mixing_type: profile.color_mixing_type.clone(),
            pan_range_degrees: profile.pan_range_degrees,
            tilt_range_degrees: profile.tilt_range_degrees,
            dmx_channels_min: profile.dmx_channels_min,
            gobo_wheels_count: profile.gobo_wheels_count,
            description: None,
            is_active: 1,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_identical_fixtures_hit_the_ceiling() {
        let p = full_profile();
        let breakdown = score(&p, &p);
        assert_eq!(breakdown.total(), MAX_SCORE);
        assert_eq!(
            breakdown.total(),
            35.0 + 25.0 + 12.0 + 8.0 + 6.0 + 5.0 + 10.0 + 6.0 + 2.0 + 2.0
        );
    }

    #[test]
    fn test_brightness_delta() {
        let reference = FixtureProfile {
            total_lumens: Some(10000.0),
            ..Default::default()
        };
        let candidate = FixtureProfile {
            total_lumens: Some(8000.0),
            ..Default::default()
        };
        let brightness = score(&reference, &candidate).brightness;
        assert!((brightness - 9.6).abs() < 1e-9, "got {}", brightness);
    }

    #[test]
    fn test_numeric_floor_applies() {
        let reference = FixtureProfile {
            total_lumens: Some(50000.0),
            power_consumption_watts: Some(1000.0),
            ..Default::default()
        };
        let candidate = FixtureProfile {
            total_lumens: Some(500.0),
            power_consumption_watts: Some(10.0),
            ..Default::default()
        };
        let b = score(&reference, &candidate);
        assert_eq!(b.brightness, 5.0);
        assert_eq!(b.power, 3.0);
    }

    #[test]
    fn test_zero_max_contributes_no_delta() {
        let zero = FixtureProfile {
            total_lumens: Some(0.0),
            dmx_channels_min: Some(0),
            ..Default::default()
        };
        let b = score(&zero, &zero);
        assert_eq!(b.brightness, 12.0);
        assert_eq!(b.dmx_channels, 2.0);
        assert!(b.total().is_finite());
    }

    #[test]
    fn test_empty_profiles_get_baseline() {
        let empty = FixtureProfile::default();
        let b = score(&empty, &empty);
        // type 3 + source 5 + lumens 2 + power 1 + color 1 + movement 1
        assert_eq!(b.total(), 13.0);
    }

    #[test]
    fn test_one_sided_values() {
        let reference = full_profile();
        let candidate = FixtureProfile::default();
        let b = score(&reference, &candidate);
        assert_eq!(b.fixture_type, 3.0);
        assert_eq!(b.light_source, 5.0);
        assert_eq!(b.brightness, 3.0);
        assert_eq!(b.power, 2.0);
        assert_eq!(b.weight, 1.0);
        assert_eq!(b.beam_angle, 1.0);
        assert_eq!(b.color_mixing, 2.0);
        assert_eq!(b.movement, 2.0);
        assert_eq!(b.dmx_channels, 0.0);
        assert_eq!(b.gobo, 0.0);
    }

    #[test]
    fn test_categorical_mismatch() {
        let reference = full_profile();
        let candidate = FixtureProfile {
            fixture_type_id: Some(2),
            light_source_type: Some("Discharge".into()),
            color_mixing_type: Some("RGBW".into()),
            ..full_profile()
        };
        let b = score(&reference, &candidate);
        assert_eq!(b.fixture_type, 5.0);
        assert_eq!(b.light_source, 12.0);
        assert_eq!(b.color_mixing, 5.0);
    }

    #[test]
    fn test_movement_parity() {
        let head = full_profile();
        let tilt_only = FixtureProfile {
            pan_range_degrees: None,
            ..full_profile()
        };
        assert_eq!(score(&head, &head).movement, 6.0);
        assert_eq!(score(&head, &tilt_only).movement, 2.0);
        // Matching absence of pan is not rewarded
        assert_eq!(score(&tilt_only, &tilt_only).movement, 2.0);
    }

    #[test]
    fn test_gobo_requires_both_positive() {
        let with = FixtureProfile {
            gobo_wheels_count: Some(1),
            ..Default::default()
        };
        let without = FixtureProfile {
            gobo_wheels_count: Some(0),
            ..Default::default()
        };
        assert_eq!(score(&with, &with).gobo, 2.0);
        assert_eq!(score(&with, &without).gobo, 0.0);
    }

    #[test]
    fn test_match_reasons() {
        let reference = full_profile();
        let candidate = FixtureProfile {
            total_lumens: Some(8500.0),
            weight_kg: Some(40.0),
            ..full_profile()
        };
        let reasons = match_reasons(&reference, &candidate);
        assert!(reasons.contains(&"Same fixture type".to_string()));
        assert!(reasons.contains(&"Same light source (LED)".to_string()));
        assert!(reasons.contains(&"Similar brightness".to_string()));
        assert!(!reasons.contains(&"Similar weight".to_string()));
        assert!(reasons.contains(&"Both have gobo wheels".to_string()));
    }

    #[test]
    fn test_rank_excludes_reference_sorts_and_truncates() {
        let p = full_profile();
        let reference = fixture(1, "Reference", &p);

        let mut inactive = fixture(5, "Inactive Twin", &p);
        inactive.is_active = 0;

        let candidates = vec![
            reference.clone(),
            fixture(2, "Zeta Twin", &p),
            fixture(3, "Alpha Twin", &p),
            fixture(4, "Bare", &FixtureProfile::default()),
            inactive,
        ];

        let ranked = rank(&reference, candidates.clone(), 10);
        let names: Vec<&str> = ranked.iter().map(|s| s.fixture.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha Twin", "Zeta Twin", "Bare"]);
        assert_eq!(ranked[0].score, MAX_SCORE);
        assert!(ranked[2].score > 0.0);

        let top = rank(&reference, candidates, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].fixture.id, 3);
    }
}
