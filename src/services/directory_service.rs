//! Directory service - manufacturers, fixture types and vendors

use std::sync::Arc;

use crate::db::directory::{
    self, CreateFixtureTypeInput, CreateManufacturerInput, CreateVendorInput, VENDOR_TYPES,
};
use crate::db::fixtures;
use crate::db::RegistryDb;
use crate::error::RegistryError;
use crate::views::{FixtureTypeView, ManufacturerView, VendorView};

use super::events::{EventBus, RegistryEvent};
use super::fixture_service::{require_name, validate_slug};

pub struct DirectoryService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
}

impl DirectoryService {
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Manufacturers
    // =========================================================================

    /// All manufacturers with their active fixture counts
    pub fn list_manufacturers(&self) -> Result<Vec<ManufacturerView>, RegistryError> {
        self.db.with_conn(|conn| {
            let counts = fixtures::counts_by_manufacturer(conn)?;
            Ok(directory::list_manufacturers(conn)?
                .into_iter()
                .map(|m| {
                    let count = counts.get(&m.id).copied().unwrap_or(0);
                    ManufacturerView::new(m, count)
                })
                .collect())
        })
    }

    pub fn get_manufacturer(&self, slug: &str) -> Result<Option<ManufacturerView>, RegistryError> {
        self.db.with_conn(|conn| {
            let manufacturer = match directory::get_manufacturer_by_slug(conn, slug)? {
                Some(m) => m,
                None => return Ok(None),
            };
            let count = fixtures::counts_by_manufacturer(conn)?
                .get(&manufacturer.id)
                .copied()
                .unwrap_or(0);
            Ok(Some(ManufacturerView::new(manufacturer, count)))
        })
    }

    pub fn create_manufacturer(
        &self,
        input: CreateManufacturerInput,
    ) -> Result<ManufacturerView, RegistryError> {
        validate_slug("slug", &input.slug)?;
        require_name("name", &input.name)?;

        let manufacturer = self.db.with_transaction(|conn| {
            if directory::get_manufacturer_by_slug(conn, &input.slug)?.is_some() {
                return Err(RegistryError::InvalidInput(format!(
                    "Manufacturer slug '{}' already exists",
                    input.slug
                )));
            }
            directory::create_manufacturer(conn, &input)
        })?;

        self.events.emit(RegistryEvent::ManufacturerCreated {
            slug: manufacturer.slug.clone(),
        });

        Ok(ManufacturerView::new(manufacturer, 0))
    }

    // =========================================================================
    // Fixture Types
    // =========================================================================

    pub fn list_fixture_types(&self) -> Result<Vec<FixtureTypeView>, RegistryError> {
        self.db.with_conn(|conn| {
            Ok(directory::list_fixture_types(conn)?
                .into_iter()
                .map(Into::into)
                .collect())
        })
    }

    pub fn create_fixture_type(
        &self,
        input: CreateFixtureTypeInput,
    ) -> Result<FixtureTypeView, RegistryError> {
        validate_slug("slug", &input.slug)?;
        require_name("name", &input.name)?;

        self.db.with_transaction(|conn| {
            if directory::get_fixture_type_by_slug(conn, &input.slug)?.is_some() {
                return Err(RegistryError::InvalidInput(format!(
                    "Fixture type slug '{}' already exists",
                    input.slug
                )));
            }
            Ok(directory::create_fixture_type(conn, &input.slug, &input.name)?.into())
        })
    }

    // =========================================================================
    // Vendors
    // =========================================================================

    /// List vendors, optionally only `vendor` or `distributor` rows
    pub fn list_vendors(
        &self,
        vendor_type: Option<&str>,
    ) -> Result<Vec<VendorView>, RegistryError> {
        if let Some(kind) = vendor_type {
            validate_vendor_type(kind)?;
        }
        self.db.with_conn(|conn| {
            Ok(directory::list_vendors(conn, vendor_type)?
                .into_iter()
                .map(Into::into)
                .collect())
        })
    }

    pub fn get_vendor(&self, slug: &str) -> Result<Option<VendorView>, RegistryError> {
        self.db.with_conn(|conn| {
            let vendor = match directory::get_vendor_by_slug(conn, slug)? {
                Some(v) => v,
                None => return Ok(None),
            };
            let count = directory::vendor_fixture_count(conn, vendor.id)?;
            let mut view = VendorView::from(vendor);
            view.fixture_count = Some(count);
            Ok(Some(view))
        })
    }

    /// Create a vendor and link the fixtures it carries.
    ///
    /// Every listed fixture slug must exist; the whole create rolls back
    /// otherwise.
    pub fn create_vendor(&self, input: CreateVendorInput) -> Result<VendorView, RegistryError> {
        validate_slug("slug", &input.slug)?;
        require_name("name", &input.name)?;
        validate_vendor_type(&input.vendor_type)?;
        validate_coordinates(input.latitude, input.longitude)?;

        let (vendor, linked) = self.db.with_transaction(|conn| {
            if directory::get_vendor_by_slug(conn, &input.slug)?.is_some() {
                return Err(RegistryError::InvalidInput(format!(
                    "Vendor slug '{}' already exists",
                    input.slug
                )));
            }
            let vendor = directory::create_vendor(conn, &input)?;

            let mut linked = 0i64;
            for fixture_slug in &input.fixtures {
                let fixture = fixtures::get_fixture_by_slug(conn, fixture_slug)?
                    .ok_or_else(|| RegistryError::not_found("Fixture", fixture_slug))?;
                if directory::link_fixture_vendor(conn, fixture.id, vendor.id)? {
                    linked += 1;
                }
            }
            Ok((vendor, linked))
        })?;

        self.events.emit(RegistryEvent::VendorCreated {
            slug: vendor.slug.clone(),
            vendor_type: vendor.vendor_type.clone(),
        });

        let mut view = VendorView::from(vendor);
        view.fixture_count = Some(linked);
        Ok(view)
    }

    /// Record that a vendor carries a fixture. Linking twice is a no-op.
    pub fn link_fixture(
        &self,
        vendor_slug: &str,
        fixture_slug: &str,
    ) -> Result<VendorView, RegistryError> {
        self.db.with_transaction(|conn| {
            let vendor = directory::get_vendor_by_slug(conn, vendor_slug)?
                .ok_or_else(|| RegistryError::not_found("Vendor", vendor_slug))?;
            let fixture = fixtures::get_fixture_by_slug(conn, fixture_slug)?
                .ok_or_else(|| RegistryError::not_found("Fixture", fixture_slug))?;

            directory::link_fixture_vendor(conn, fixture.id, vendor.id)?;
            let count = directory::vendor_fixture_count(conn, vendor.id)?;

            let mut view = VendorView::from(vendor);
            view.fixture_count = Some(count);
            Ok(view)
        })
    }
}

fn validate_vendor_type(kind: &str) -> Result<(), RegistryError> {
    if VENDOR_TYPES.contains(&kind) {
        Ok(())
    } else {
        Err(RegistryError::InvalidInput(format!(
            "vendorType must be one of {:?}, got '{}'",
            VENDOR_TYPES, kind
        )))
    }
}

fn validate_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(), RegistryError> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(RegistryError::InvalidInput(
                "latitude must be within -90..90".into(),
            ));
        }
    }
    if let Some(lon) = longitude {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(RegistryError::InvalidInput(
                "longitude must be within -180..180".into(),
            ));
        }
    }
    Ok(())
}
