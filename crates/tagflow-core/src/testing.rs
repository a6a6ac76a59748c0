//! In-memory doubles for the inventory and lifecycle seams, shared by the
//! unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::dispatch::{ActionError, IdOutcome, LifecycleApi};
use crate::inventory::{Inventory, InventoryError, QueryMode};
use crate::types::{InstanceState, LifecycleAction, ResourceId, TagCondition};

// ---------------------------------------------------------------------------
// StubInventory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StubInventory {
    any: HashMap<(String, String), Vec<ResourceId>>,
    all: Vec<ResourceId>,
    fail: Option<InventoryError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(QueryMode, Vec<TagCondition>)>>,
}

impl StubInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids returned when a single-condition query names `key=value`.
    pub fn with_any(mut self, key: &str, value: &str, ids: &[&str]) -> Self {
        self.any.insert(
            (key.to_string(), value.to_string()),
            ids.iter().copied().map(ResourceId::from).collect(),
        );
        self
    }

    /// Ids returned by any compound (`All`) query.
    pub fn with_all(mut self, ids: &[&str]) -> Self {
        self.all = ids.iter().copied().map(ResourceId::from).collect();
        self
    }

    pub fn failing(mut self, err: InventoryError) -> Self {
        self.fail = Some(err);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(QueryMode, Vec<TagCondition>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Inventory for StubInventory {
    async fn query_by_tag(
        &self,
        conditions: &[TagCondition],
        mode: QueryMode,
    ) -> Result<Vec<ResourceId>, InventoryError> {
        self.calls
            .lock()
            .unwrap()
            .push((mode, conditions.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        match mode {
            QueryMode::All => Ok(self.all.clone()),
            QueryMode::Any => {
                let mut ids = Vec::new();
                for condition in conditions {
                    for value in condition.values() {
                        let key = (condition.key().to_string(), value.clone());
                        if let Some(found) = self.any.get(&key) {
                            ids.extend(found.iter().cloned());
                        }
                    }
                }
                Ok(ids)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingLifecycle
// ---------------------------------------------------------------------------

pub struct RecordingLifecycle {
    batch: bool,
    fail_batch: Option<ActionError>,
    fail_ids: HashMap<ResourceId, ActionError>,
    omit: HashSet<ResourceId>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(LifecycleAction, Vec<ResourceId>)>>,
    completed: AtomicUsize,
}

impl RecordingLifecycle {
    pub fn new() -> Self {
        Self {
            batch: true,
            fail_batch: None,
            fail_ids: HashMap::new(),
            omit: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn unbatched(mut self) -> Self {
        self.batch = false;
        self
    }

    pub fn failing_batch(mut self, err: ActionError) -> Self {
        self.fail_batch = Some(err);
        self
    }

    /// Calls naming `id` fail (unbatched) or report it as failed (batched).
    pub fn failing_id(mut self, id: &str, err: ActionError) -> Self {
        self.fail_ids.insert(ResourceId::from(id), err);
        self
    }

    /// Leave `id` out of the reported outcomes.
    pub fn omitting(mut self, id: &str) -> Self {
        self.omit.insert(ResourceId::from(id));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(LifecycleAction, Vec<ResourceId>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LifecycleApi for RecordingLifecycle {
    fn supports_batch(&self) -> bool {
        self.batch
    }

    async fn apply_action(
        &self,
        action: LifecycleAction,
        ids: &[ResourceId],
    ) -> Result<Vec<IdOutcome>, ActionError> {
        self.calls.lock().unwrap().push((action, ids.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_batch {
            return Err(err.clone());
        }
        if !self.batch {
            if let Some(err) = ids.iter().find_map(|id| self.fail_ids.get(id)) {
                return Err(err.clone());
            }
        }
        let previous = match action {
            LifecycleAction::Start => InstanceState::Stopped,
            LifecycleAction::Stop => InstanceState::Running,
        };
        Ok(ids
            .iter()
            .filter(|id| !self.omit.contains(*id))
            .map(|id| match self.fail_ids.get(id) {
                Some(err) => IdOutcome::failed(id.clone(), err.to_string()),
                None => IdOutcome::applied(id.clone(), previous, action.target_state()),
            })
            .collect())
    }
}
