//! The run state machine.
//!
//! ```text
//! Start ─┬─ or  ─▶ EvaluateOr  ─┐
//!        └─ and ─▶ EvaluateAnd ─┴─▶ Aggregate ─┬─ count == 0 ─▶ NoOp ─────┐
//!                                               └─ otherwise ──▶ Dispatch ─┴─▶ Done
//! ```
//!
//! The whole run is bounded by a wall-clock budget. When it runs out the run
//! is reported as `TimedOut` and no further step starts; a dispatch that was
//! already issued keeps running in its own task and settles downstream.
//!
//! Runs are independent. Two runs resolving overlapping resources with
//! opposing actions (a stop and a start on overlapping schedules) are not
//! serialized against each other, and whichever reaches the downstream
//! system last wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::combine;
use crate::config::WorkflowConfig;
use crate::dispatch::{dispatch, ActionError, DispatchResult, LifecycleApi};
use crate::error::{Result, TagflowError};
use crate::filter::{evaluate, evaluate_all};
use crate::inventory::Inventory;
use crate::request::parse_request;
use crate::types::{
    describe_ids, ExecutionRequest, FilterExpression, LifecycleAction, MatchSet, TagCondition,
};

// ---------------------------------------------------------------------------
// Run result types
// ---------------------------------------------------------------------------

/// States a run passes through, recorded in order in `RunReport::trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Start,
    EvaluateOr,
    EvaluateAnd,
    Aggregate,
    NoOp,
    Dispatch,
    Done,
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    NoOp,
    Succeeded,
    Failed { reason: String },
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NoOp => "no_op",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed { .. } => "failed",
            RunStatus::TimedOut => "timed_out",
        }
    }

    /// `NoOp` and `Succeeded` are healthy outcomes.
    pub fn is_ok(&self) -> bool {
        matches!(self, RunStatus::NoOp | RunStatus::Succeeded)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub request: ExecutionRequest,
    #[serde(flatten)]
    pub status: RunStatus,
    /// Set once the run reached `Aggregate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchSet>,
    /// Set once a dispatch completed, including partially failed ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchResult>,
    pub trace: Vec<Step>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

enum State {
    Start,
    EvaluateOr,
    EvaluateAnd,
    Aggregate(Vec<MatchSet>),
    NoOp,
    Dispatch(MatchSet),
    Done(RunStatus),
}

impl State {
    fn step(&self) -> Step {
        match self {
            State::Start => Step::Start,
            State::EvaluateOr => Step::EvaluateOr,
            State::EvaluateAnd => Step::EvaluateAnd,
            State::Aggregate(_) => Step::Aggregate,
            State::NoOp => Step::NoOp,
            State::Dispatch(_) => Step::Dispatch,
            State::Done(_) => Step::Done,
        }
    }
}

/// Everything a run has produced so far. Survives a timeout abort.
#[derive(Default)]
struct Progress {
    trace: Vec<Step>,
    matched: Option<MatchSet>,
    dispatch: Option<DispatchResult>,
}

fn failed(err: TagflowError) -> State {
    State::Done(RunStatus::Failed {
        reason: err.to_string(),
    })
}

// ---------------------------------------------------------------------------
// WorkflowController
// ---------------------------------------------------------------------------

pub struct WorkflowController {
    inventory: Arc<dyn Inventory>,
    lifecycle: Arc<dyn LifecycleApi>,
    timeout: Duration,
    max_parallel_queries: usize,
    /// Each detached dispatch holds a read guard until it finishes.
    in_flight: Arc<RwLock<()>>,
}

impl WorkflowController {
    pub fn new(inventory: Arc<dyn Inventory>, lifecycle: Arc<dyn LifecycleApi>) -> Self {
        let defaults = WorkflowConfig::default();
        Self {
            inventory,
            lifecycle,
            timeout: defaults.timeout(),
            max_parallel_queries: defaults.max_parallel_queries,
            in_flight: Arc::new(RwLock::new(())),
        }
    }

    pub fn configured(mut self, config: &WorkflowConfig) -> Self {
        self.timeout = config.timeout();
        self.max_parallel_queries = config.max_parallel_queries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_parallel_queries(mut self, n: usize) -> Self {
        self.max_parallel_queries = n;
        self
    }

    /// Parse a trigger payload and run it.
    pub async fn run_payload(&self, payload: &str) -> Result<RunReport> {
        let request = parse_request(payload)?;
        self.run(request).await
    }

    /// Execute one run to a terminal status.
    ///
    /// Returns `Err` only for malformed requests, before anything is queried.
    /// Every other outcome, failures and timeouts included, is a `RunReport`.
    pub async fn run(&self, request: ExecutionRequest) -> Result<RunReport> {
        request.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            run_id = %run_id,
            action = %request.action,
            mode = request.expression.mode_name(),
            conditions = request.expression.conditions().len(),
            "run started"
        );

        let mut progress = Progress::default();
        let status = match tokio::time::timeout(self.timeout, self.drive(&request, &mut progress))
            .await
        {
            Ok(status) => status,
            Err(_) => RunStatus::TimedOut,
        };

        let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &status {
            RunStatus::NoOp | RunStatus::Succeeded => {
                info!(run_id = %run_id, status = status.as_str(), elapsed_ms, "run finished")
            }
            RunStatus::Failed { reason } => {
                warn!(run_id = %run_id, reason = %reason, elapsed_ms, "run failed")
            }
            RunStatus::TimedOut => warn!(
                run_id = %run_id,
                budget_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                "run timed out"
            ),
        }

        Ok(RunReport {
            run_id,
            request,
            status,
            matched: progress.matched,
            dispatch: progress.dispatch,
            trace: progress.trace,
            started_at,
            finished_at: Utc::now(),
            elapsed_ms,
        })
    }

    /// Wait until every dispatch this controller issued has finished,
    /// including ones whose run already timed out.
    pub async fn settle(&self) {
        let _ = self.in_flight.write().await;
    }

    /// Resolve an expression to its match set without dispatching anything.
    pub async fn resolve(&self, expression: &FilterExpression) -> Result<MatchSet> {
        expression.validate()?;
        let work = async {
            match expression {
                FilterExpression::Or(conditions) => self.evaluate_or(conditions).await.map(combine),
                FilterExpression::And(conditions) => {
                    evaluate_all(self.inventory.as_ref(), conditions).await
                }
            }
        };
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| TagflowError::Timeout(self.timeout.as_secs()))?
    }

    async fn drive(&self, request: &ExecutionRequest, progress: &mut Progress) -> RunStatus {
        let mut state = State::Start;
        loop {
            let step = state.step();
            progress.trace.push(step);
            debug!(step = ?step, "entering state");

            state = match state {
                State::Start => match &request.expression {
                    FilterExpression::Or(_) => State::EvaluateOr,
                    FilterExpression::And(_) => State::EvaluateAnd,
                },
                State::EvaluateOr => match self.evaluate_or(request.expression.conditions()).await
                {
                    Ok(sets) => State::Aggregate(sets),
                    Err(e) => failed(e),
                },
                State::EvaluateAnd => {
                    match evaluate_all(self.inventory.as_ref(), request.expression.conditions())
                        .await
                    {
                        Ok(set) => State::Aggregate(vec![set]),
                        Err(e) => failed(e),
                    }
                }
                State::Aggregate(sets) => {
                    let matched = combine(sets);
                    progress.matched = Some(matched.clone());
                    if matched.is_empty() {
                        State::NoOp
                    } else {
                        State::Dispatch(matched)
                    }
                }
                State::NoOp => State::Done(RunStatus::NoOp),
                State::Dispatch(matched) => match self.dispatch_detached(request.action, matched).await
                {
                    Ok(result) => {
                        let status = match result.failure_summary() {
                            None => RunStatus::Succeeded,
                            Some(reason) => RunStatus::Failed { reason },
                        };
                        progress.dispatch = Some(result);
                        State::Done(status)
                    }
                    Err(e) => failed(e),
                },
                State::Done(status) => return status,
            };
        }
    }

    /// One query per condition, at most `max_parallel_queries` in flight,
    /// joined before returning. The first failure ends the evaluation.
    async fn evaluate_or(&self, conditions: &[TagCondition]) -> Result<Vec<MatchSet>> {
        let inventory = self.inventory.as_ref();
        let queries: Vec<_> = conditions.iter().map(|c| evaluate(inventory, c)).collect();
        stream::iter(queries)
            .buffer_unordered(self.max_parallel_queries.max(1))
            .try_collect()
            .await
    }

    /// Runs the dispatch in its own task so that a run-level timeout does not
    /// cancel calls already issued downstream.
    async fn dispatch_detached(
        &self,
        action: LifecycleAction,
        matched: MatchSet,
    ) -> Result<DispatchResult> {
        let api = Arc::clone(&self.lifecycle);
        let ids = matched.into_ids();
        let described = describe_ids(&ids);
        let guard = Arc::clone(&self.in_flight).read_owned().await;
        let task = tokio::spawn(async move {
            let result = dispatch(api.as_ref(), action, &ids).await;
            drop(guard);
            result
        });
        match task.await {
            Ok(result) => result,
            Err(join_err) => Err(TagflowError::ActionExecution {
                action,
                ids: described,
                source: ActionError::Backend(format!("dispatch task aborted: {join_err}")),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
