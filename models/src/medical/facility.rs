// models/src/medical/facility.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::validation::{is_blank, not_blank_if_present, require, Validate};

/// Mean equatorial radius used for the radius search, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacilityType {
    Clinic,
    Hospital,
    #[serde(rename = "GP")]
    Gp,
    Specialist,
    Other,
}

/// A point stored as `[longitude, latitude]`, plus its street address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: [f64; 2],
    pub address: String,
}

impl Location {
    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    /// Great-circle distance to a point, in kilometres.
    pub fn distance_km(&self, latitude: f64, longitude: f64) -> f64 {
        let (lat1, lat2) = (self.latitude().to_radians(), latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (longitude - self.longitude()).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }

    fn check(&self) -> ValidationResult<()> {
        let [lng, lat] = self.coordinates;
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::invalid("location.coordinates", "out of range"));
        }
        if self.address.trim().is_empty() {
            return Err(ValidationError::missing(["location.address"]));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub location: Location,
    pub facility_type: FacilityType,
    pub services: Vec<String>,
    pub operating_hours: Option<String>,
    pub contact_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Facility {
    pub fn from_draft(draft: FacilityDraft) -> Self {
        let now = Utc::now();
        Facility {
            id: Uuid::new_v4(),
            name: draft.name,
            location: draft.location,
            facility_type: draft.facility_type,
            services: draft.services,
            operating_hours: draft.operating_hours,
            contact_number: draft.contact_number,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: FacilityPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(facility_type) = patch.facility_type {
            self.facility_type = facility_type;
        }
        if let Some(services) = patch.services {
            self.services = services;
        }
        if patch.operating_hours.is_some() {
            self.operating_hours = patch.operating_hours;
        }
        if patch.contact_number.is_some() {
            self.contact_number = patch.contact_number;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFacility {
    pub name: Option<String>,
    pub location: Option<Location>,
    pub facility_type: Option<FacilityType>,
    #[serde(default)]
    pub services: Vec<String>,
    pub operating_hours: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacilityDraft {
    pub name: String,
    pub location: Location,
    pub facility_type: FacilityType,
    pub services: Vec<String>,
    pub operating_hours: Option<String>,
    pub contact_number: Option<String>,
}

impl Validate for NewFacility {
    type Valid = FacilityDraft;

    fn validate(self) -> ValidationResult<FacilityDraft> {
        require(&[
            ("name", is_blank(&self.name)),
            ("location", self.location.is_none()),
            ("facility_type", self.facility_type.is_none()),
        ])?;
        let (Some(name), Some(location), Some(facility_type)) = (self.name, self.location, self.facility_type) else {
            return Err(ValidationError::missing(["name", "location", "facility_type"]));
        };
        location.check()?;
        Ok(FacilityDraft {
            name: name.trim().to_string(),
            location,
            facility_type,
            services: self.services,
            operating_hours: self.operating_hours,
            contact_number: self.contact_number,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityPatch {
    pub name: Option<String>,
    pub location: Option<Location>,
    pub facility_type: Option<FacilityType>,
    pub services: Option<Vec<String>>,
    pub operating_hours: Option<String>,
    pub contact_number: Option<String>,
}

impl Validate for FacilityPatch {
    type Valid = FacilityPatch;

    fn validate(self) -> ValidationResult<FacilityPatch> {
        not_blank_if_present("name", &self.name)?;
        if let Some(ref location) = self.location {
            location.check()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(lng: f64, lat: f64) -> Location {
        Location { coordinates: [lng, lat], address: "1 Main St".into() }
    }

    #[test]
    fn distance_to_self_is_zero() {
        let here = location(-0.1276, 51.5072);
        assert!(here.distance_km(51.5072, -0.1276) < 1e-9);
    }

    #[test]
    fn london_to_paris_is_about_344_km() {
        let london = location(-0.1276, 51.5072);
        let d = london.distance_km(48.8566, 2.3522);
        assert!((340.0..350.0).contains(&d), "got {}", d);
    }

    #[test]
    fn facility_requires_name_location_and_type() {
        let err = NewFacility::default().validate().unwrap_err();
        assert_eq!(err.fields(), vec!["name", "location", "facility_type"]);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let new = NewFacility {
            name: Some("North Clinic".into()),
            location: Some(location(200.0, 10.0)),
            facility_type: Some(FacilityType::Clinic),
            ..Default::default()
        };
        assert_eq!(new.validate().unwrap_err().fields(), vec!["location.coordinates"]);
    }

    #[test]
    fn gp_type_serializes_upper_case() {
        assert_eq!(serde_json::to_value(FacilityType::Gp).unwrap(), "GP");
    }
}
