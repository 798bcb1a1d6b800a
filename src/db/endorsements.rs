//! Endorsement categories, tallies and session votes
//!
//! Tallies in `endorsements` are a materialised count of `endorsement_votes`:
//! every write recounts from the vote rows instead of incrementing, so a
//! session switching its vote never double-counts.

use std::fmt;
use std::str::FromStr;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::{endorsement_categories, endorsement_votes, endorsements};
use super::models::{
    current_timestamp, Endorsement, EndorsementCategory, EndorsementVote,
    EndorsementWithCategory, NewEndorsement, NewEndorsementCategory, NewEndorsementVote,
};
use crate::error::RegistryError;

// ============================================================================
// Types
// ============================================================================

/// Kind of entity an endorsement is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Fixture,
    Vendor,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Fixture => "fixture",
            EntityKind::Vendor => "vendor",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixture" => Ok(EntityKind::Fixture),
            "vendor" => Ok(EntityKind::Vendor),
            other => Err(RegistryError::InvalidInput(format!(
                "unknown entity kind '{}', expected 'fixture' or 'vendor'",
                other
            ))),
        }
    }
}

/// A concrete endorsable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i32,
}

impl EntityRef {
    pub fn fixture(id: i32) -> Self {
        Self { kind: EntityKind::Fixture, id }
    }

    pub fn vendor(id: i32) -> Self {
        Self { kind: EntityKind::Vendor, id }
    }
}

/// Direction of a single session vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }
}

impl FromStr for VoteType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            other => Err(RegistryError::InvalidInput(format!(
                "voteType must be 'up' or 'down', got '{}'",
                other
            ))),
        }
    }
}

/// Counts after a vote write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub upvotes: i32,
    pub downvotes: i32,
    pub net_score: i32,
}

impl From<&Endorsement> for VoteTally {
    fn from(e: &Endorsement) -> Self {
        Self {
            upvotes: e.upvotes,
            downvotes: e.downvotes,
            net_score: e.net_score(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryInput {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_positive: bool,
    #[serde(default = "default_applies_to")]
    pub applies_to: EntityKind,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_true() -> bool {
    true
}

fn default_applies_to() -> EntityKind {
    EntityKind::Fixture
}

// ============================================================================
// Categories
// ============================================================================

pub fn get_category_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<EndorsementCategory>, RegistryError> {
    Ok(endorsement_categories::table
        .filter(endorsement_categories::slug.eq(slug))
        .select(EndorsementCategory::as_select())
        .first(conn)
        .optional()?)
}

/// List categories in display order, optionally only those for one entity kind
pub fn list_categories(
    conn: &mut SqliteConnection,
    applies_to: Option<EntityKind>,
) -> Result<Vec<EndorsementCategory>, RegistryError> {
    let mut query = endorsement_categories::table.into_boxed();
    if let Some(kind) = applies_to {
        query = query.filter(endorsement_categories::applies_to.eq(kind.as_str()));
    }
    Ok(query
        .order((
            endorsement_categories::sort_order.asc(),
            endorsement_categories::name.asc(),
        ))
        .select(EndorsementCategory::as_select())
        .load(conn)?)
}

pub fn create_category(
    conn: &mut SqliteConnection,
    input: &CreateCategoryInput,
) -> Result<EndorsementCategory, RegistryError> {
    diesel::insert_into(endorsement_categories::table)
        .values(&NewEndorsementCategory {
            slug: &input.slug,
            name: &input.name,
            description: input.description.as_deref(),
            is_positive: if input.is_positive { 1 } else { 0 },
            applies_to: input.applies_to.as_str(),
            sort_order: input.sort_order,
        })
        .execute(conn)?;

    get_category_by_slug(conn, &input.slug)?
        .ok_or_else(|| RegistryError::Internal("Failed to retrieve created category".into()))
}

// ============================================================================
// Endorsements
// ============================================================================

pub fn get_endorsement(
    conn: &mut SqliteConnection,
    entity: EntityRef,
    category_id: i32,
) -> Result<Option<Endorsement>, RegistryError> {
    Ok(endorsements::table
        .filter(endorsements::entity_type.eq(entity.kind.as_str()))
        .filter(endorsements::entity_id.eq(entity.id))
        .filter(endorsements::category_id.eq(category_id))
        .select(Endorsement::as_select())
        .first(conn)
        .optional()?)
}

/// Fetch the endorsement row, creating it with zero counts on first use
pub fn get_or_create_endorsement(
    conn: &mut SqliteConnection,
    entity: EntityRef,
    category_id: i32,
) -> Result<Endorsement, RegistryError> {
    let now = current_timestamp();
    diesel::insert_or_ignore_into(endorsements::table)
        .values(&NewEndorsement {
            entity_type: entity.kind.as_str(),
            entity_id: entity.id,
            category_id,
            upvotes: 0,
            downvotes: 0,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    get_endorsement(conn, entity, category_id)?
        .ok_or_else(|| RegistryError::Internal("Failed to retrieve endorsement".into()))
}

/// Every endorsement row for an entity, joined with its category
pub fn endorsements_for_entity(
    conn: &mut SqliteConnection,
    entity: EntityRef,
) -> Result<Vec<EndorsementWithCategory>, RegistryError> {
    let rows: Vec<(Endorsement, EndorsementCategory)> = endorsements::table
        .inner_join(endorsement_categories::table)
        .filter(endorsements::entity_type.eq(entity.kind.as_str()))
        .filter(endorsements::entity_id.eq(entity.id))
        .order((
            endorsement_categories::sort_order.asc(),
            endorsement_categories::name.asc(),
        ))
        .select((Endorsement::as_select(), EndorsementCategory::as_select()))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(endorsement, category)| EndorsementWithCategory { endorsement, category })
        .collect())
}

// ============================================================================
// Votes
// ============================================================================

/// Insert the session's vote or overwrite its direction
pub fn upsert_vote(
    conn: &mut SqliteConnection,
    endorsement_id: i32,
    session_id: &str,
    vote_type: VoteType,
) -> Result<(), RegistryError> {
    let now = current_timestamp();
    diesel::insert_into(endorsement_votes::table)
        .values(&NewEndorsementVote {
            endorsement_id,
            session_id,
            vote_type: vote_type.as_str(),
            created_at: &now,
            updated_at: &now,
        })
        .on_conflict((endorsement_votes::endorsement_id, endorsement_votes::session_id))
        .do_update()
        .set((
            endorsement_votes::vote_type.eq(vote_type.as_str()),
            endorsement_votes::updated_at.eq(&now),
        ))
        .execute(conn)?;
    Ok(())
}

/// Remove a session's vote. Returns false when there was none.
pub fn delete_vote(
    conn: &mut SqliteConnection,
    endorsement_id: i32,
    session_id: &str,
) -> Result<bool, RegistryError> {
    let deleted = diesel::delete(
        endorsement_votes::table
            .filter(endorsement_votes::endorsement_id.eq(endorsement_id))
            .filter(endorsement_votes::session_id.eq(session_id)),
    )
    .execute(conn)?;
    Ok(deleted > 0)
}

/// Recount an endorsement's tallies from its vote rows and store them
pub fn recount(
    conn: &mut SqliteConnection,
    endorsement_id: i32,
) -> Result<VoteTally, RegistryError> {
    let counts: Vec<(String, i64)> = endorsement_votes::table
        .filter(endorsement_votes::endorsement_id.eq(endorsement_id))
        .group_by(endorsement_votes::vote_type)
        .select((endorsement_votes::vote_type, diesel::dsl::count_star()))
        .load(conn)?;

    let mut upvotes = 0i32;
    let mut downvotes = 0i32;
    for (vote_type, count) in counts {
        match vote_type.as_str() {
            "up" => upvotes = count as i32,
            "down" => downvotes = count as i32,
            _ => {}
        }
    }

    diesel::update(endorsements::table.filter(endorsements::id.eq(endorsement_id)))
        .set((
            endorsements::upvotes.eq(upvotes),
            endorsements::downvotes.eq(downvotes),
            endorsements::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;

    Ok(VoteTally {
        upvotes,
        downvotes,
        net_score: upvotes - downvotes,
    })
}

/// The session's votes across a set of endorsements
pub fn session_votes(
    conn: &mut SqliteConnection,
    endorsement_ids: &[i32],
    session_id: &str,
) -> Result<Vec<EndorsementVote>, RegistryError> {
    if endorsement_ids.is_empty() {
        return Ok(vec![]);
    }

    Ok(endorsement_votes::table
        .filter(endorsement_votes::endorsement_id.eq_any(endorsement_ids))
        .filter(endorsement_votes::session_id.eq(session_id))
        .select(EndorsementVote::as_select())
        .load(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RegistryDb;

    fn category(conn: &mut SqliteConnection) -> EndorsementCategory {
        create_category(
            conn,
            &CreateCategoryInput {
                slug: "beam-output".into(),
                name: "Beam Output".into(),
                description: None,
                is_positive: true,
                applies_to: EntityKind::Fixture,
                sort_order: 0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_vote_type_parse() {
        assert_eq!("up".parse::<VoteType>().unwrap(), VoteType::Up);
        assert_eq!("down".parse::<VoteType>().unwrap(), VoteType::Down);
        assert!("sideways".parse::<VoteType>().is_err());
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let db = RegistryDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let cat = category(conn);
            let entity = EntityRef::fixture(7);
            assert!(get_endorsement(conn, entity, cat.id)?.is_none());

            let first = get_or_create_endorsement(conn, entity, cat.id)?;
            let second = get_or_create_endorsement(conn, entity, cat.id)?;
            assert_eq!(first.id, second.id);
            assert_eq!(first.upvotes, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_upsert_then_recount() {
        let db = RegistryDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let cat = category(conn);
            let e = get_or_create_endorsement(conn, EntityRef::fixture(1), cat.id)?;

            upsert_vote(conn, e.id, "s1", VoteType::Up)?;
            upsert_vote(conn, e.id, "s2", VoteType::Up)?;
            upsert_vote(conn, e.id, "s3", VoteType::Down)?;
            assert_eq!(
                recount(conn, e.id)?,
                VoteTally { upvotes: 2, downvotes: 1, net_score: 1 }
            );

            upsert_vote(conn, e.id, "s1", VoteType::Down)?;
            assert_eq!(
                recount(conn, e.id)?,
                VoteTally { upvotes: 1, downvotes: 2, net_score: -1 }
            );

            assert!(delete_vote(conn, e.id, "s3")?);
            assert!(!delete_vote(conn, e.id, "s3")?);
            assert_eq!(recount(conn, e.id)?.downvotes, 1);

            let mine = session_votes(conn, &[e.id], "s1")?;
            assert_eq!(mine.len(), 1);
            assert_eq!(mine[0].vote_type, "down");
            Ok(())
        })
        .unwrap();
    }
}
