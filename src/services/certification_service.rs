//! Certification service - explicit evaluation of a fixture's endorsements
//!
//! Certifications are only written here: casting votes never certifies or
//! decertifies anything, and nothing expires on its own.

use std::sync::Arc;

use serde::Deserialize;

use crate::certification::{self, CategoryTally, CertificationPolicy};
use crate::config::CertificationConfig;
use crate::db::certifications;
use crate::db::endorsements;
use crate::db::fixtures::{self, FixtureKey};
use crate::db::{EntityRef, RegistryDb};
use crate::error::RegistryError;
use crate::views::{CertificationView, CertifyResultView};

use super::events::{EventBus, RegistryEvent};

/// Optional overrides sent with a certify request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyInput {
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub min_votes_per_category: Option<i64>,
}

pub struct CertificationService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
    defaults: CertificationConfig,
}

impl CertificationService {
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>, defaults: CertificationConfig) -> Self {
        Self {
            db,
            events,
            defaults,
        }
    }

    fn policy(&self, input: &CertifyInput) -> Result<CertificationPolicy, RegistryError> {
        CertificationPolicy::new(
            input.threshold.unwrap_or(self.defaults.threshold),
            input
                .min_votes_per_category
                .unwrap_or(self.defaults.min_votes_per_category),
        )
    }

    /// Evaluate a fixture and certify it when every category passes.
    ///
    /// A failed evaluation returns `success: false` with the criteria that
    /// failed and leaves the certifications table untouched.
    pub fn evaluate(
        &self,
        fixture_id: i32,
        input: &CertifyInput,
    ) -> Result<CertifyResultView, RegistryError> {
        let policy = self.policy(input)?;
        let min_votes = i32::try_from(policy.min_votes_per_category).map_err(|_| {
            RegistryError::InvalidInput("minVotesPerCategory is too large".into())
        })?;

        let (evaluation, certification, renewed) = self.db.with_transaction(|conn| {
            let fixture = fixtures::require_fixture(conn, &FixtureKey::Id(fixture_id))?;

            let tallies: Vec<CategoryTally> =
                endorsements::endorsements_for_entity(conn, EntityRef::fixture(fixture.id))?
                    .into_iter()
                    .map(|row| CategoryTally {
                        category_slug: row.category.slug,
                        category_name: row.category.name,
                        upvotes: row.endorsement.upvotes as i64,
                        downvotes: row.endorsement.downvotes as i64,
                    })
                    .collect();

            let evaluation = certification::evaluate(&tallies, policy)?;
            if !evaluation.passed {
                return Ok((evaluation, None, false));
            }

            let renewed = certifications::get_certification(conn, fixture.id)?.is_some();
            let cert = certifications::upsert_certification(
                conn,
                fixture.id,
                policy.threshold,
                min_votes,
            )?;
            Ok((evaluation, Some(cert), renewed))
        })?;

        if evaluation.passed {
            self.events.emit(RegistryEvent::FixtureCertified {
                fixture_id,
                threshold: policy.threshold,
                renewed,
            });
        } else {
            self.events.emit(RegistryEvent::CertificationRejected {
                fixture_id,
                all_above_threshold: evaluation.all_above_threshold,
                has_enough_votes: evaluation.has_enough_votes,
            });
        }

        Ok(CertifyResultView::new(evaluation, certification))
    }

    /// Certification of a fixture, `None` if it was never certified
    pub fn get(&self, key: &FixtureKey) -> Result<Option<CertificationView>, RegistryError> {
        self.db.with_conn(|conn| {
            let fixture = fixtures::require_fixture(conn, key)?;
            Ok(certifications::get_certification(conn, fixture.id)?.map(Into::into))
        })
    }

    /// All certifications, most recently reviewed first
    pub fn list(&self) -> Result<Vec<CertificationView>, RegistryError> {
        self.db.with_conn(|conn| {
            Ok(certifications::list_certifications(conn)?
                .into_iter()
                .map(Into::into)
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::endorsements::CreateCategoryInput;
    use crate::db::{CreateFixtureInput, EntityKind, VoteType};

    fn setup() -> (Arc<RegistryDb>, CertificationService, i32) {
        let db = Arc::new(RegistryDb::open_in_memory().unwrap());
        let fixture_id = db
            .with_conn(|conn| {
                let fixture = fixtures::create_fixture(
                    conn,
                    &CreateFixtureInput {
                        slug: "mac-aura".into(),
                        name: "MAC Aura".into(),
                        is_active: true,
                        ..Default::default()
                    },
                )?;
                endorsements::create_category(
                    conn,
                    &CreateCategoryInput {
                        slug: "output".into(),
                        name: "Output".into(),
                        description: None,
                        is_positive: true,
                        applies_to: EntityKind::Fixture,
                        sort_order: 0,
                    },
                )?;
                Ok(fixture.id)
            })
            .unwrap();
        let svc = CertificationService::new(
            db.clone(),
            Arc::new(EventBus::new()),
            CertificationConfig::default(),
        );
        (db, svc, fixture_id)
    }

    fn add_votes(db: &RegistryDb, fixture_id: i32, up: usize, down: usize) {
        db.with_transaction(|conn| {
            let category = endorsements::get_category_by_slug(conn, "output")?
                .ok_or_else(|| RegistryError::Internal("category".into()))?;
            let e = endorsements::get_or_create_endorsement(
                conn,
                EntityRef::fixture(fixture_id),
                category.id,
            )?;
            for i in 0..up {
                endorsements::upsert_vote(conn, e.id, &format!("up-{}", i), VoteType::Up)?;
            }
            for i in 0..down {
                endorsements::upsert_vote(conn, e.id, &format!("down-{}", i), VoteType::Down)?;
            }
            endorsements::recount(conn, e.id)?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_no_endorsements_is_bad_request() {
        let (_db, svc, id) = setup();
        let err = svc.evaluate(id, &CertifyInput::default()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_fixture_is_not_found() {
        let (_db, svc, _id) = setup();
        let err = svc.evaluate(4242, &CertifyInput::default()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn test_failed_evaluation_does_not_certify() {
        let (db, svc, id) = setup();
        add_votes(&db, id, 3, 0);

        let result = svc.evaluate(id, &CertifyInput::default()).unwrap();
        assert!(!result.success);
        assert!(result.all_above_threshold);
        assert!(!result.has_enough_votes);
        assert_eq!(result.min_votes_required, 5);
        assert!(svc.get(&FixtureKey::Id(id)).unwrap().is_none());
    }

    #[test]
    fn test_pass_then_renew() {
        let (db, svc, id) = setup();
        add_votes(&db, id, 9, 1);

        let first = svc.evaluate(id, &CertifyInput::default()).unwrap();
        assert!(first.success);
        let cert = first.certification.unwrap();
        assert_eq!(cert.threshold, 90.0);

        let override_policy = CertifyInput {
            threshold: Some(80.0),
            min_votes_per_category: Some(3),
        };
        let second = svc.evaluate(id, &override_policy).unwrap();
        let renewed = second.certification.unwrap();
        assert_eq!(renewed.certified_at, cert.certified_at);
        assert_eq!(renewed.threshold, 80.0);
        assert_eq!(renewed.min_votes_per_category, 3);
        assert_eq!(svc.list().unwrap().len(), 1);
    }

    #[test]
    fn test_evaluate_emits_one_event_per_outcome() {
        let (db, _svc, id) = setup();
        let bus = Arc::new(EventBus::new());
        let svc =
            CertificationService::new(db.clone(), bus.clone(), CertificationConfig::default());
        let mut rx = bus.subscribe();

        add_votes(&db, id, 3, 0);
        svc.evaluate(id, &CertifyInput::default()).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            RegistryEvent::CertificationRejected {
                has_enough_votes: false,
                ..
            }
        ));

        add_votes(&db, id, 9, 1);
        svc.evaluate(id, &CertifyInput::default()).unwrap();
        match rx.try_recv().unwrap() {
            RegistryEvent::FixtureCertified {
                fixture_id,
                renewed,
                ..
            } => {
                assert_eq!(fixture_id, id);
                assert!(!renewed);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let (db, svc, id) = setup();
        add_votes(&db, id, 9, 1);
        let bad = CertifyInput {
            threshold: Some(150.0),
            min_votes_per_category: None,
        };
        assert!(matches!(
            svc.evaluate(id, &bad).unwrap_err(),
            RegistryError::InvalidInput(_)
        ));
    }
}
