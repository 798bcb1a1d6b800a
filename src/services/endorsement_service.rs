//! Endorsement service - session votes and per-category tallies
//!
//! A vote write is one transaction:
//!
//! ```text
//! resolve entity + category → get_or_create endorsement → upsert vote → recount
//! ```
//!
//! Tallies are always recounted from `endorsement_votes`, so repeated or
//! switched votes from the same session never drift the counts.

use std::collections::HashMap;
use std::sync::Arc;

use diesel::SqliteConnection;
use serde::Deserialize;
use tracing::debug;

use crate::db::endorsements::{self, CreateCategoryInput, VoteTally};
use crate::db::fixtures::{self, FixtureKey};
use crate::db::models::EndorsementCategory;
use crate::db::{directory, EntityKind, EntityRef, RegistryDb, VoteType};
use crate::error::RegistryError;
use crate::views::{CategoryView, EndorsementView};

use super::events::{EventBus, RegistryEvent};

/// Body of a vote request. Both fields are required; they are optional here
/// so a missing field reports a clear message instead of a JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteInput {
    #[serde(default)]
    pub vote_type: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn require_session(session_id: Option<&str>) -> Result<&str, RegistryError> {
    match session_id.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(RegistryError::InvalidInput("sessionId is required".into())),
    }
}

/// Resolve a path segment to an endorsable entity
fn resolve_entity(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    key: &str,
) -> Result<EntityRef, RegistryError> {
    match kind {
        EntityKind::Fixture => {
            let fixture = fixtures::require_fixture(conn, &FixtureKey::parse(key))?;
            Ok(EntityRef::fixture(fixture.id))
        }
        EntityKind::Vendor => {
            let vendor = directory::get_vendor_by_slug(conn, key)?
                .ok_or_else(|| RegistryError::not_found("Vendor", key))?;
            Ok(EntityRef::vendor(vendor.id))
        }
    }
}

/// Look up a category and check it can be applied to `kind`
fn resolve_category(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    slug: &str,
) -> Result<EndorsementCategory, RegistryError> {
    let category = endorsements::get_category_by_slug(conn, slug)?
        .ok_or_else(|| RegistryError::not_found("Endorsement category", slug))?;
    if category.applies_to != kind.as_str() {
        return Err(RegistryError::InvalidInput(format!(
            "Category '{}' applies to {}s, not {}s",
            slug, category.applies_to, kind
        )));
    }
    Ok(category)
}

pub struct EndorsementService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
}

impl EndorsementService {
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub fn categories(
        &self,
        applies_to: Option<EntityKind>,
    ) -> Result<Vec<CategoryView>, RegistryError> {
        self.db.with_conn(|conn| {
            Ok(endorsements::list_categories(conn, applies_to)?
                .into_iter()
                .map(Into::into)
                .collect())
        })
    }

    pub fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<CategoryView, RegistryError> {
        super::fixture_service::validate_slug("slug", &input.slug)?;
        super::fixture_service::require_name("name", &input.name)?;

        self.db.with_transaction(|conn| {
            if endorsements::get_category_by_slug(conn, &input.slug)?.is_some() {
                return Err(RegistryError::InvalidInput(format!(
                    "Category slug '{}' already exists",
                    input.slug
                )));
            }
            Ok(endorsements::create_category(conn, &input)?.into())
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Every category applicable to the entity with its tally, zeros for
    /// categories nobody has voted on yet. `session_id` fills in the caller's
    /// own vote.
    pub fn list_for_entity(
        &self,
        kind: EntityKind,
        key: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<EndorsementView>, RegistryError> {
        self.db.with_conn(|conn| {
            let entity = resolve_entity(conn, kind, key)?;
            let categories = endorsements::list_categories(conn, Some(kind))?;
            let rows = endorsements::endorsements_for_entity(conn, entity)?;

            let session_votes: HashMap<i32, String> = match session_id.filter(|s| !s.is_empty()) {
                Some(session) => {
                    let ids: Vec<i32> = rows.iter().map(|r| r.endorsement.id).collect();
                    endorsements::session_votes(conn, &ids, session)?
                        .into_iter()
                        .map(|v| (v.endorsement_id, v.vote_type))
                        .collect()
                }
                None => HashMap::new(),
            };

            let mut by_category: HashMap<i32, _> = rows
                .into_iter()
                .map(|row| (row.category.id, row))
                .collect();

            Ok(categories
                .into_iter()
                .map(|category| match by_category.remove(&category.id) {
                    Some(row) => {
                        let vote = session_votes.get(&row.endorsement.id).cloned();
                        EndorsementView::new(row, vote)
                    }
                    None => EndorsementView::empty(category),
                })
                .collect())
        })
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Cast or change a session's vote and return the recounted tally
    pub fn cast_vote(
        &self,
        kind: EntityKind,
        key: &str,
        category_slug: &str,
        input: &VoteInput,
    ) -> Result<VoteTally, RegistryError> {
        let vote_type: VoteType = input
            .vote_type
            .as_deref()
            .ok_or_else(|| RegistryError::InvalidInput("voteType is required".into()))?
            .parse()?;
        let session_id = require_session(input.session_id.as_deref())?;

        let (entity, tally) = self.db.with_transaction(|conn| {
            let entity = resolve_entity(conn, kind, key)?;
            let category = resolve_category(conn, kind, category_slug)?;

            let endorsement = endorsements::get_or_create_endorsement(conn, entity, category.id)?;
            endorsements::upsert_vote(conn, endorsement.id, session_id, vote_type)?;
            let tally = endorsements::recount(conn, endorsement.id)?;
            Ok((entity, tally))
        })?;

        debug!(
            entity = %kind,
            entity_id = entity.id,
            category = category_slug,
            vote = vote_type.as_str(),
            net_score = tally.net_score,
            "Vote recorded"
        );

        self.events.emit(RegistryEvent::VoteCast {
            entity_type: kind.to_string(),
            entity_id: entity.id,
            category: category_slug.to_string(),
            vote_type: vote_type.as_str().to_string(),
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
        });

        Ok(tally)
    }

    /// Withdraw a session's vote. Retracting a vote that does not exist
    /// returns the current tally unchanged.
    pub fn retract_vote(
        &self,
        kind: EntityKind,
        key: &str,
        category_slug: &str,
        session_id: Option<&str>,
    ) -> Result<VoteTally, RegistryError> {
        let session_id = require_session(session_id)?;

        let (entity, tally, removed) = self.db.with_transaction(|conn| {
            let entity = resolve_entity(conn, kind, key)?;
            let category = resolve_category(conn, kind, category_slug)?;

            let endorsement = match endorsements::get_endorsement(conn, entity, category.id)? {
                Some(e) => e,
                None => {
                    let zero = VoteTally {
                        upvotes: 0,
                        downvotes: 0,
                        net_score: 0,
                    };
                    return Ok((entity, zero, false));
                }
            };

            if endorsements::delete_vote(conn, endorsement.id, session_id)? {
                Ok((entity, endorsements::recount(conn, endorsement.id)?, true))
            } else {
                Ok((entity, VoteTally::from(&endorsement), false))
            }
        })?;

        if removed {
            self.events.emit(RegistryEvent::VoteRetracted {
                entity_type: kind.to_string(),
                entity_id: entity.id,
                category: category_slug.to_string(),
            });
        }

        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::directory::{create_vendor, CreateVendorInput};
    use crate::db::CreateFixtureInput;

    fn setup() -> EndorsementService {
        let db = Arc::new(RegistryDb::open_in_memory().unwrap());
        db.with_conn(|conn| {
            fixtures::create_fixture(
                conn,
                &CreateFixtureInput {
                    slug: "mac-aura".into(),
                    name: "MAC Aura".into(),
                    is_active: true,
                    ..Default::default()
                },
            )?;
            create_vendor(
                conn,
                &CreateVendorInput {
                    slug: "stagehouse".into(),
                    name: "Stagehouse".into(),
                    vendor_type: "vendor".into(),
                    website: None,
                    region: None,
                    latitude: None,
                    longitude: None,
                    fixtures: vec![],
                },
            )?;
            for (slug, applies_to, order) in [
                ("beam-quality", EntityKind::Fixture, 1),
                ("reliability", EntityKind::Fixture, 2),
                ("support", EntityKind::Vendor, 1),
            ] {
                endorsements::create_category(
                    conn,
                    &CreateCategoryInput {
                        slug: slug.into(),
                        name: slug.into(),
                        description: None,
                        is_positive: true,
                        applies_to,
                        sort_order: order,
                    },
                )?;
            }
            Ok(())
        })
        .unwrap();
        EndorsementService::new(db, Arc::new(EventBus::new()))
    }

    fn vote(kind: &str, session: &str) -> VoteInput {
        VoteInput {
            vote_type: Some(kind.into()),
            session_id: Some(session.into()),
        }
    }

    #[test]
    fn test_same_vote_twice_is_idempotent() {
        let svc = setup();
        let first = svc
            .cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &vote("up", "s1"))
            .unwrap();
        let second = svc
            .cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &vote("up", "s1"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.upvotes, 1);
    }

    #[test]
    fn test_switching_vote_moves_net_by_two() {
        let svc = setup();
        svc.cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &vote("up", "s2"))
            .unwrap();
        let before = svc
            .cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &vote("up", "s1"))
            .unwrap();
        let after = svc
            .cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &vote("down", "s1"))
            .unwrap();
        assert_eq!(after.upvotes, before.upvotes - 1);
        assert_eq!(after.downvotes, before.downvotes + 1);
        assert_eq!(before.net_score - after.net_score, 2);
    }

    #[test]
    fn test_vote_validation() {
        let svc = setup();
        let missing_session = VoteInput {
            vote_type: Some("up".into()),
            session_id: None,
        };
        assert!(matches!(
            svc.cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &missing_session),
            Err(RegistryError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &vote("sideways", "s1")),
            Err(RegistryError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.cast_vote(EntityKind::Fixture, "nope", "beam-quality", &vote("up", "s1")),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            svc.cast_vote(EntityKind::Fixture, "mac-aura", "nope", &vote("up", "s1")),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_vendor_category_rejected_for_fixture() {
        let svc = setup();
        let err = svc
            .cast_vote(EntityKind::Fixture, "mac-aura", "support", &vote("up", "s1"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));

        let tally = svc
            .cast_vote(EntityKind::Vendor, "stagehouse", "support", &vote("up", "s1"))
            .unwrap();
        assert_eq!(tally.upvotes, 1);
    }

    #[test]
    fn test_list_for_entity_fills_unvoted_categories() {
        let svc = setup();
        svc.cast_vote(EntityKind::Fixture, "mac-aura", "reliability", &vote("down", "s1"))
            .unwrap();

        let listed = svc
            .list_for_entity(EntityKind::Fixture, "mac-aura", Some("s1"))
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].category.slug, "beam-quality");
        assert_eq!(listed[0].approval_percentage, None);
        assert_eq!(listed[1].downvotes, 1);
        assert_eq!(listed[1].approval_percentage, Some(0.0));
        assert_eq!(listed[1].session_vote.as_deref(), Some("down"));
    }

    #[test]
    fn test_retract_vote() {
        let svc = setup();
        svc.cast_vote(EntityKind::Fixture, "mac-aura", "beam-quality", &vote("up", "s1"))
            .unwrap();
        let tally = svc
            .retract_vote(EntityKind::Fixture, "mac-aura", "beam-quality", Some("s1"))
            .unwrap();
        assert_eq!(tally.upvotes, 0);

        // Nothing left to retract
        let again = svc
            .retract_vote(EntityKind::Fixture, "mac-aura", "beam-quality", Some("s1"))
            .unwrap();
        assert_eq!(again.net_score, 0);
    }
}
