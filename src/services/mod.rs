//! Service layer for fixture-registry
//!
//! Services sit between HTTP handlers and the repositories in `db/`. Each one
//! owns input validation, transaction boundaries and event emission.
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (validation, transactions, events)
//!     ↓
//! Repository Layer (db/*.rs)  +  pure scoring (similarity.rs, certification.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod certification_service;
pub mod directory_service;
pub mod endorsement_service;
pub mod events;
pub mod fixture_service;
pub mod response;

pub use certification_service::{CertificationService, CertifyInput};
pub use directory_service::DirectoryService;
pub use endorsement_service::{EndorsementService, VoteInput};
pub use events::{EventBus, EventListener, RegistryEvent};
pub use fixture_service::FixtureService;
pub use response::*;

use std::sync::Arc;

use crate::config::Config;
use crate::db::RegistryDb;

/// Service container handed to the HTTP server
pub struct Services {
    pub db: Arc<RegistryDb>,
    pub fixtures: Arc<FixtureService>,
    pub directory: Arc<DirectoryService>,
    pub endorsements: Arc<EndorsementService>,
    pub certifications: Arc<CertificationService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services over a shared database
    pub fn new(db: Arc<RegistryDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            fixtures: Arc::new(FixtureService::new(
                db.clone(),
                events.clone(),
                config.pagination,
                config.similarity,
            )),
            directory: Arc::new(DirectoryService::new(db.clone(), events.clone())),
            endorsements: Arc::new(EndorsementService::new(db.clone(), events.clone())),
            certifications: Arc::new(CertificationService::new(
                db.clone(),
                events.clone(),
                config.certification,
            )),
            events,
            db,
        }
    }
}
