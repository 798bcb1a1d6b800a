//! JSON seed loading
//!
//! A seed file lists directory rows by slug:
//!
//! ```json
//! {
//!   "manufacturers": [{ "slug": "robe", "name": "Robe" }],
//!   "fixtureTypes": [{ "slug": "moving-head", "name": "Moving Head" }],
//!   "categories": [{ "slug": "beam-quality", "name": "Beam quality", "appliesTo": "fixture" }],
//!   "fixtures": [{ "slug": "megapointe", "name": "MegaPointe", "manufacturer": "robe" }],
//!   "vendors": [{ "slug": "stagehouse", "name": "Stagehouse", "fixtures": ["megapointe"] }]
//! }
//! ```
//!
//! Sections load in dependency order. Rows whose slug already exists are
//! skipped, so a seed can be applied to the same database repeatedly.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::directory::{CreateFixtureTypeInput, CreateManufacturerInput, CreateVendorInput};
use crate::db::endorsements::CreateCategoryInput;
use crate::db::fixtures::FixtureKey;
use crate::db::CreateFixtureInput;
use crate::error::RegistryError;
use crate::services::{RegistryEvent, Services};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFile {
    #[serde(default)]
    pub manufacturers: Vec<CreateManufacturerInput>,
    #[serde(default)]
    pub fixture_types: Vec<CreateFixtureTypeInput>,
    #[serde(default)]
    pub categories: Vec<CreateCategoryInput>,
    #[serde(default)]
    pub fixtures: Vec<CreateFixtureInput>,
    #[serde(default)]
    pub vendors: Vec<CreateVendorInput>,
}

impl SeedFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Result of applying a seed
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkResult {
    pub inserted: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

impl BulkResult {
    fn record<T>(&mut self, section: &str, slug: &str, result: Result<T, RegistryError>) {
        match result {
            Ok(_) => self.inserted += 1,
            Err(e) => {
                warn!(section = section, slug = slug, error = %e, "Seed row rejected");
                self.errors.push(format!("{}[{}]: {}", section, slug, e));
            }
        }
    }
}

/// Apply a seed through the services, so every row gets the same
/// validation as an API create.
pub fn apply(services: &Services, seed: SeedFile) -> Result<BulkResult, RegistryError> {
    let mut result = BulkResult::default();

    for input in seed.manufacturers {
        if services.directory.get_manufacturer(&input.slug)?.is_some() {
            result.skipped += 1;
            continue;
        }
        let slug = input.slug.clone();
        result.record("manufacturers", &slug, services.directory.create_manufacturer(input));
    }

    let type_slugs: HashSet<String> = services
        .directory
        .list_fixture_types()?
        .into_iter()
        .map(|t| t.slug)
        .collect();
    for input in seed.fixture_types {
        if type_slugs.contains(&input.slug) {
            result.skipped += 1;
            continue;
        }
        let slug = input.slug.clone();
        result.record("fixtureTypes", &slug, services.directory.create_fixture_type(input));
    }

    let category_slugs: HashSet<String> = services
        .endorsements
        .categories(None)?
        .into_iter()
        .map(|c| c.slug)
        .collect();
    for input in seed.categories {
        if category_slugs.contains(&input.slug) {
            result.skipped += 1;
            continue;
        }
        let slug = input.slug.clone();
        result.record("categories", &slug, services.endorsements.create_category(input));
    }

    for input in seed.fixtures {
        if services
            .fixtures
            .get(&FixtureKey::Slug(input.slug.clone()))?
            .is_some()
        {
            result.skipped += 1;
            continue;
        }
        let slug = input.slug.clone();
        result.record("fixtures", &slug, services.fixtures.create(input));
    }

    for input in seed.vendors {
        if services.directory.get_vendor(&input.slug)?.is_some() {
            result.skipped += 1;
            continue;
        }
        let slug = input.slug.clone();
        result.record("vendors", &slug, services.directory.create_vendor(input));
    }

    info!(
        inserted = result.inserted,
        skipped = result.skipped,
        errors = result.errors.len(),
        "Seed applied"
    );
    services.events.emit(RegistryEvent::SeedLoaded {
        inserted: result.inserted,
        skipped: result.skipped,
    });

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::RegistryDb;
    use std::sync::Arc;

    const SEED: &str = r#"{
        "manufacturers": [{ "slug": "robe", "name": "Robe", "country": "CZ" }],
        "fixtureTypes": [{ "slug": "moving-head", "name": "Moving Head" }],
        "categories": [
            { "slug": "beam-quality", "name": "Beam quality" },
            { "slug": "support", "name": "Support", "appliesTo": "vendor" }
        ],
        "fixtures": [
            {
                "slug": "megapointe", "name": "MegaPointe",
                "manufacturer": "robe", "fixtureType": "moving-head"
            },
            { "slug": "broken", "name": "Broken", "manufacturer": "nobody" }
        ],
        "vendors": [{
            "slug": "stagehouse", "name": "Stagehouse",
            "vendorType": "distributor", "fixtures": ["megapointe"]
        }]
    }"#;

    #[test]
    fn test_apply_seed_twice() {
        let db = Arc::new(RegistryDb::open_in_memory().unwrap());
        let services = Services::new(db, &Config::default());
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();

        let first = apply(&services, seed.clone()).unwrap();
        assert_eq!(first.inserted, 6);
        assert_eq!(first.errors.len(), 1);
        assert!(first.errors[0].starts_with("fixtures[broken]"));

        let second = apply(&services, seed).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 6);

        let vendor = services.directory.get_vendor("stagehouse").unwrap().unwrap();
        assert_eq!(vendor.vendor_type, "distributor");
        assert_eq!(vendor.fixture_count, Some(1));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, SEED).unwrap();
        let seed = SeedFile::load(&path).unwrap();
        assert_eq!(seed.fixtures.len(), 2);
        assert_eq!(seed.categories[1].applies_to.as_str(), "vendor");
    }
}
