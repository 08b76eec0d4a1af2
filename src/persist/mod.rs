//! Mapping of extracted fields to storage writes.
//!
//! The crate only describes writes; a [`StorageSink`] collaborator performs
//! them. [`MemStorage`] is an in-memory sink with the same semantics.

mod mapper;
mod mem;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, extract::Fields, model::WriteOperation};

pub use mapper::PersistenceMapper;
pub use mem::MemStorage;

/// A structured description of one write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub table: String,
    pub operation: WriteOperation,
    /// natural key values, empty for inserts
    pub key: Fields,
    pub fields: Fields,
    /// column type hints, the sink coerces values
    pub field_types: HashMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WriteOutcome {
    Inserted,
    Updated,
    Replaced,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WriteResult {
    pub outcome: WriteOutcome,
    pub rows_affected: usize,
}

/// Storage collaborator receiving write requests.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Performs the write. An `update` with no matching row must fail with
    /// [`crate::JobflowError::RecordNotFound`]; other failures are
    /// [`crate::JobflowError::Persistence`].
    async fn write(
        &self,
        request: &WriteRequest,
    ) -> Result<WriteResult>;
}
