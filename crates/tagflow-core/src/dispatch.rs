use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Result, TagflowError};
use crate::types::{describe_ids, InstanceState, LifecycleAction, ResourceId};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Failure of a whole lifecycle call.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("lifecycle api unavailable: {0}")]
    Unavailable(String),

    #[error("access denied: {0}")]
    Unauthorized(String),

    #[error("incorrect instance state: {0}")]
    IncorrectState(String),

    #[error("unknown resource: {0}")]
    NotFound(String),

    #[error("lifecycle backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// The action took effect, or the resource was already in the target
    /// state (`previous == current`).
    Applied {
        previous: InstanceState,
        current: InstanceState,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdOutcome {
    pub id: ResourceId,
    pub outcome: Outcome,
}

impl IdOutcome {
    pub fn applied(id: ResourceId, previous: InstanceState, current: InstanceState) -> Self {
        Self {
            id,
            outcome: Outcome::Applied { previous, current },
        }
    }

    pub fn failed(id: ResourceId, reason: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Per-identifier record of one dispatch, in identifier order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub action: LifecycleAction,
    pub outcomes: Vec<IdOutcome>,
}

impl DispatchResult {
    pub fn empty(action: LifecycleAction) -> Self {
        Self {
            action,
            outcomes: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| !o.is_failed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &IdOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &IdOutcome> {
        self.outcomes.iter().filter(|o| !o.is_failed())
    }

    /// One-line description of the failed identifiers, e.g.
    /// `1 of 3 failed: i-2 (terminated)`.
    pub fn failure_summary(&self) -> Option<String> {
        let failed: Vec<String> = self
            .failed()
            .map(|o| match &o.outcome {
                Outcome::Failed { reason } => format!("{} ({reason})", o.id),
                Outcome::Applied { .. } => o.id.to_string(),
            })
            .collect();
        if failed.is_empty() {
            return None;
        }
        Some(format!(
            "{} of {} failed: {}",
            failed.len(),
            self.outcomes.len(),
            failed.join(", ")
        ))
    }
}

// ---------------------------------------------------------------------------
// LifecycleApi
// ---------------------------------------------------------------------------

/// Downstream start/stop capability.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    /// Whether `apply_action` accepts many identifiers in one call.
    fn supports_batch(&self) -> bool {
        true
    }

    async fn apply_action(
        &self,
        action: LifecycleAction,
        ids: &[ResourceId],
    ) -> std::result::Result<Vec<IdOutcome>, ActionError>;
}

// ---------------------------------------------------------------------------
// dispatch
// ---------------------------------------------------------------------------

/// Apply `action` to every identifier in `ids`.
///
/// Batched backends get one call; a failure of that call fails the dispatch.
/// Otherwise each identifier is its own call and a failing call only marks
/// that identifier as failed. Nothing is retried.
pub async fn dispatch(
    api: &dyn LifecycleApi,
    action: LifecycleAction,
    ids: &BTreeSet<ResourceId>,
) -> Result<DispatchResult> {
    if ids.is_empty() {
        return Ok(DispatchResult::empty(action));
    }
    let ordered: Vec<ResourceId> = ids.iter().cloned().collect();

    let outcomes = if api.supports_batch() {
        let reported = api
            .apply_action(action, &ordered)
            .await
            .map_err(|source| TagflowError::ActionExecution {
                action,
                ids: describe_ids(&ordered),
                source,
            })?;
        align(&ordered, reported)
    } else {
        let calls = ordered.iter().map(|id| async move {
            match api.apply_action(action, std::slice::from_ref(id)).await {
                Ok(reported) => align(std::slice::from_ref(id), reported)
                    .pop()
                    .unwrap_or_else(|| IdOutcome::failed(id.clone(), "no outcome reported")),
                Err(e) => IdOutcome::failed(id.clone(), e.to_string()),
            }
        });
        join_all(calls).await
    };

    let result = DispatchResult { action, outcomes };
    debug!(
        action = %action,
        succeeded = result.succeeded().count(),
        failed = result.failed().count(),
        "dispatch finished"
    );
    Ok(result)
}

/// Order downstream outcomes by the requested ids; ids the downstream did not
/// report on are failures, ids it reported but were not requested are dropped.
fn align(requested: &[ResourceId], reported: Vec<IdOutcome>) -> Vec<IdOutcome> {
    let mut by_id: HashMap<ResourceId, IdOutcome> =
        reported.into_iter().map(|o| (o.id.clone(), o)).collect();
    let aligned: Vec<IdOutcome> = requested
        .iter()
        .map(|id| {
            by_id
                .remove(id)
                .unwrap_or_else(|| IdOutcome::failed(id.clone(), "no outcome reported"))
        })
        .collect();
    if !by_id.is_empty() {
        warn!(
            extra = %describe_ids(by_id.keys()),
            "lifecycle api reported on identifiers that were not requested"
        );
    }
    aligned
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
