use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ResourceId, TagCondition};

/// How a multi-condition inventory query combines its predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// A resource matches if any condition holds.
    Any,
    /// A resource matches only if every condition holds.
    All,
}

/// Failure reported by an inventory backend.
#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("inventory unavailable: {0}")]
    Unavailable(String),

    #[error("access denied: {0}")]
    Unauthorized(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("inventory backend error: {0}")]
    Backend(String),
}

/// Read-only view of the resource inventory.
///
/// Implementations must evaluate `All` natively as one compound query; the
/// engine never intersects separate result sets.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn query_by_tag(
        &self,
        conditions: &[TagCondition],
        mode: QueryMode,
    ) -> Result<Vec<ResourceId>, InventoryError>;
}
