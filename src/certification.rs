//! Certification rules over aggregated endorsement tallies
//!
//! A fixture passes when every one of its endorsement categories has an
//! approval rate at or above the threshold and at least the minimum number
//! of votes. Categories without votes count as 0% approval.

use serde::Serialize;

use crate::error::RegistryError;

/// Pass criteria for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationPolicy {
    /// Approval percentage (0-100) each category must reach
    pub threshold: f64,
    pub min_votes_per_category: i64,
}

impl Default for CertificationPolicy {
    fn default() -> Self {
        Self {
            threshold: 90.0,
            min_votes_per_category: 5,
        }
    }
}

impl CertificationPolicy {
    pub fn new(threshold: f64, min_votes_per_category: i64) -> Result<Self, RegistryError> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(RegistryError::InvalidInput(format!(
                "threshold must be between 0 and 100, got {}",
                threshold
            )));
        }
        if min_votes_per_category < 0 {
            return Err(RegistryError::InvalidInput(
                "minVotesPerCategory must not be negative".into(),
            ));
        }
        Ok(Self {
            threshold,
            min_votes_per_category,
        })
    }
}

/// Tally of one category, as read from the endorsement row
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTally {
    pub category_slug: String,
    pub category_name: String,
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Approval as a percentage, `None` when nobody has voted
pub fn approval_percentage(upvotes: i64, downvotes: i64) -> Option<f64> {
    let total = upvotes + downvotes;
    if total <= 0 {
        None
    } else {
        Some(upvotes as f64 / total as f64 * 100.0)
    }
}

/// Evaluated state of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category_slug: String,
    pub category_name: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub total_votes: i64,
    pub approval_rate: f64,
    pub meets_threshold: bool,
    pub has_enough_votes: bool,
}

/// Outcome of evaluating all categories of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub passed: bool,
    pub all_above_threshold: bool,
    pub has_enough_votes: bool,
    pub threshold: f64,
    pub min_votes_required: i64,
    pub categories: Vec<CategoryResult>,
}

/// Evaluate tallies against a policy.
///
/// An entity with no endorsement rows cannot be evaluated.
pub fn evaluate(
    tallies: &[CategoryTally],
    policy: CertificationPolicy,
) -> Result<Evaluation, RegistryError> {
    if tallies.is_empty() {
        return Err(RegistryError::InvalidInput(
            "No endorsements found for this fixture".into(),
        ));
    }

    let categories: Vec<CategoryResult> = tallies
        .iter()
        .map(|t| {
            let total_votes = t.upvotes + t.downvotes;
            let approval_rate = approval_percentage(t.upvotes, t.downvotes).unwrap_or(0.0);
            CategoryResult {
                category_slug: t.category_slug.clone(),
                category_name: t.category_name.clone(),
                upvotes: t.upvotes,
                downvotes: t.downvotes,
                total_votes,
                approval_rate,
                meets_threshold: approval_rate >= policy.threshold,
                has_enough_votes: total_votes >= policy.min_votes_per_category,
            }
        })
        .collect();

    let all_above_threshold = categories.iter().all(|c| c.meets_threshold);
    let has_enough_votes = categories.iter().all(|c| c.has_enough_votes);

    Ok(Evaluation {
        passed: all_above_threshold && has_enough_votes,
        all_above_threshold,
        has_enough_votes,
        threshold: policy.threshold,
        min_votes_required: policy.min_votes_per_category,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(slug: &str, up: i64, down: i64) -> CategoryTally {
        CategoryTally {
            category_slug: slug.to_string(),
            category_name: slug.to_string(),
            upvotes: up,
            downvotes: down,
        }
    }

    #[test]
    fn test_approval_percentage() {
        assert_eq!(approval_percentage(0, 0), None);
        assert_eq!(approval_percentage(3, 1), Some(75.0));
        assert_eq!(approval_percentage(0, 4), Some(0.0));
    }

    #[test]
    fn test_one_category_below_threshold_fails() {
        // 95%, 95%, 80%
        let tallies = vec![tally("beam", 19, 1), tally("build", 19, 1), tally("color", 16, 4)];
        let result = evaluate(&tallies, CertificationPolicy::default()).unwrap();
        assert!(!result.passed);
        assert!(!result.all_above_threshold);
        assert!(result.has_enough_votes);
        assert!(!result.categories[2].meets_threshold);
    }

    #[test]
    fn test_too_few_votes_fails() {
        let tallies = vec![tally("beam", 10, 0), tally("build", 3, 0)];
        let result = evaluate(&tallies, CertificationPolicy::default()).unwrap();
        assert!(!result.passed);
        assert!(result.all_above_threshold);
        assert!(!result.has_enough_votes);
        assert_eq!(result.min_votes_required, 5);
    }

    #[test]
    fn test_all_categories_pass() {
        let tallies = vec![tally("beam", 9, 1), tally("build", 5, 0)];
        let result = evaluate(&tallies, CertificationPolicy::default()).unwrap();
        assert!(result.passed);
        assert_eq!(result.categories[0].approval_rate, 90.0);
    }

    #[test]
    fn test_unvoted_category_counts_as_zero() {
        let tallies = vec![tally("beam", 10, 0), tally("noise", 0, 0)];
        let policy = CertificationPolicy::new(0.0, 0).unwrap();
        // 0% still meets a 0% threshold
        assert!(evaluate(&tallies, policy).unwrap().passed);

        let strict = CertificationPolicy::new(1.0, 0).unwrap();
        let result = evaluate(&tallies, strict).unwrap();
        assert!(!result.all_above_threshold);
        assert_eq!(result.categories[1].approval_rate, 0.0);
    }

    #[test]
    fn test_no_tallies_is_invalid() {
        let err = evaluate(&[], CertificationPolicy::default()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));
    }

    #[test]
    fn test_policy_bounds() {
        assert!(CertificationPolicy::new(101.0, 5).is_err());
        assert!(CertificationPolicy::new(-1.0, 5).is_err());
        assert!(CertificationPolicy::new(f64::NAN, 5).is_err());
        assert!(CertificationPolicy::new(50.0, -1).is_err());
        assert!(CertificationPolicy::new(100.0, 0).is_ok());
    }
}
