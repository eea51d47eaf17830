// models/src/lib.rs
//! Record types shared by every crate in the workspace: the stored entities,
//! the request payloads that create or patch them, and the schema checks that
//! turn a payload into something the services may act on.

pub mod errors;
pub mod medical;
pub mod validation;

pub use errors::{ValidationError, ValidationResult};
pub use medical::*;
pub use validation::Validate;
