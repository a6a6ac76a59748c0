use crate::dispatch::ActionError;
use crate::inventory::InventoryError;
use crate::types::LifecycleAction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagflowError {
    #[error("not initialized: run 'tagflow init'")]
    NotInitialized,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("malformed condition '{key}': {reason}")]
    MalformedCondition { key: String, reason: String },

    #[error("inventory query failed for [{conditions}]: {source}")]
    InventoryQuery {
        conditions: String,
        #[source]
        source: InventoryError,
    },

    #[error("{action} failed for {ids}: {source}")]
    ActionExecution {
        action: LifecycleAction,
        ids: String,
        #[source]
        source: ActionError,
    },

    #[error("invalid action '{0}': expected Start or Stop")]
    InvalidAction(String),

    #[error("invalid instance state: {0}")]
    InvalidInstanceState(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("fleet error: {0}")]
    Fleet(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("run log error: {0}")]
    RunLog(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TagflowError {
    /// True for errors raised before any inventory query is issued.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            TagflowError::MalformedRequest(_)
                | TagflowError::MalformedCondition { .. }
                | TagflowError::InvalidAction(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TagflowError>;
