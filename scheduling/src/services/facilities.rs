// scheduling/src/services/facilities.rs
//! Facilities are public to read; only administrators manage them.

use std::sync::Arc;

use log::info;
use uuid::Uuid;

use models::{Facility, FacilityPatch, NewFacility, Validate, ValidationError};
use security::{Action, Caller, ResourceKind, Target};
use storage::EntityStore;

use crate::authorize;
use crate::errors::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct FacilityService {
    store: Arc<dyn EntityStore>,
}

impl FacilityService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        FacilityService { store }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Facility>> {
        Ok(self.store.list_facilities().await?)
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Facility> {
        self.store.get_facility(id).await?.ok_or(ServiceError::NotFound("facility"))
    }

    /// Facilities within `radius_km` of a point, nearest first.
    pub async fn within_radius(&self, latitude: f64, longitude: f64, radius_km: f64) -> ServiceResult<Vec<Facility>> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::invalid("lat", "must be between -90 and 90").into());
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::invalid("lng", "must be between -180 and 180").into());
        }
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(ValidationError::invalid("distance", "must be a non-negative number").into());
        }

        let mut nearby: Vec<(f64, Facility)> = self
            .store
            .list_facilities()
            .await?
            .into_iter()
            .map(|f| (f.location.distance_km(latitude, longitude), f))
            .filter(|(d, _)| *d <= radius_km)
            .collect();
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(nearby.into_iter().map(|(_, f)| f).collect())
    }

    pub async fn create(&self, caller: &Caller, new: NewFacility) -> ServiceResult<Facility> {
        let draft = new.validate()?;
        authorize(caller, Action::Create, Target::Kind(ResourceKind::Facility))?;
        let facility = Facility::from_draft(draft);
        self.store.insert_facility(&facility).await?;
        info!("facility {} ({}) created", facility.id, facility.name);
        Ok(facility)
    }

    pub async fn update(&self, caller: &Caller, id: Uuid, patch: FacilityPatch) -> ServiceResult<Facility> {
        let patch = patch.validate()?;
        let mut facility = self.get(id).await?;
        authorize(caller, Action::Update, Target::Facility)?;
        facility.apply_patch(patch);
        self.store.update_facility(&facility).await?;
        Ok(facility)
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        self.get(id).await?;
        authorize(caller, Action::Delete, Target::Facility)?;
        self.store.delete_facility(id).await?;
        info!("facility {} deleted by {}", id, caller.id);
        Ok(())
    }
}
