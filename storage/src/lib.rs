// storage/src/lib.rs
//! Persistence for the clinic records.
//!
//! [`EntityStore`] is the only seam the services see. Both engines enforce the
//! same constraints: unique user email, one profile per user, one consultation
//! per appointment, and conditional (status-keyed) appointment writes.

pub mod errors;
pub mod inmemory;
pub mod sled_store;
pub mod store;
#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;

use log::info;

pub use errors::{StoreError, StoreResult};
pub use inmemory::InMemoryStore;
pub use sled_store::SledStore;
pub use store::EntityStore;
#[cfg(feature = "mocks")]
pub use store::MockEntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    InMemory,
    Sled,
}

impl std::str::FromStr for EngineType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inmemory" | "memory" => Ok(EngineType::InMemory),
            "sled" => Ok(EngineType::Sled),
            other => Err(StoreError::Database(format!("unknown storage engine: {}", other))),
        }
    }
}

/// Opens the configured engine. `data_directory` is only used by sled.
pub fn open_store(engine: EngineType, data_directory: &Path) -> StoreResult<Arc<dyn EntityStore>> {
    match engine {
        EngineType::InMemory => {
            info!("using in-memory entity store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        EngineType::Sled => {
            info!("opening sled entity store at {}", data_directory.display());
            Ok(Arc::new(SledStore::open(data_directory)?))
        }
    }
}
