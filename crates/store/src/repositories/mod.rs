//! Repositories over the keyed store.
//!
//! One repository per aggregate. Every write batches the entity JSON together
//! with its secondary-index memberships so the store never sees a half-indexed
//! entity.

mod equipment;
mod order;
mod queue;
mod staff;

pub use equipment::EquipmentRepository;
pub use order::{CompletionStats, OrderRepository};
pub use queue::{QueueRepository, QueueStatus};
pub use staff::StaffRepository;

use serde::{de::DeserializeOwned, Serialize};

use crate::kv::StoreError;

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(Into::into)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(Into::into)
}
