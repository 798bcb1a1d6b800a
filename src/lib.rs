//! Fixture Registry - directory service for entertainment lighting fixtures
//!
//! Serves a searchable catalogue of fixtures, manufacturers, vendors and
//! distributors, plus community endorsements and certification.
//!
//! ## Core Computations
//!
//! | Component | Module | Input → Output |
//! |-----------|--------|----------------|
//! | Similarity scorer | [`similarity`] | reference + candidates → ranked top-N |
//! | Endorsement aggregator | [`services::endorsement_service`] | vote → recounted tally |
//! | Certification evaluator | [`certification`] | category tallies → pass/fail + criteria |
//!
//! All three are stateless between requests; everything lives in SQLite.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/fixture-registry/
//! ├── registry.db            # SQLite (WAL)
//! └── config.toml            # Configuration
//! ```

pub mod certification;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod seed;
pub mod services;
pub mod similarity;
pub mod views;

// Re-exports
pub use config::Config;
pub use db::{DbStats, RegistryDb};
pub use error::RegistryError;
pub use http::HttpServer;
pub use seed::{BulkResult, SeedFile};
pub use services::{EventBus, RegistryEvent, Services};
