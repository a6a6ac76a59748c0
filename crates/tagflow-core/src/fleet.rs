//! File-backed fleet: a YAML list of instances with their state and tags.
//!
//! Implements both engine seams, so a project can run the whole workflow
//! locally. Tag values may use `*` and `?` wildcards, matching any run of
//! characters and exactly one character.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::dispatch::{ActionError, IdOutcome, LifecycleApi};
use crate::error::{Result, TagflowError};
use crate::inventory::{Inventory, InventoryError, QueryMode};
use crate::types::{InstanceState, LifecycleAction, ResourceId, TagCondition};

// ---------------------------------------------------------------------------
// FleetFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: ResourceId,
    pub state: InstanceState,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Instance {
    /// The instance carries `condition.key` with a value matching one of
    /// `condition.values`.
    pub fn matches(&self, condition: &TagCondition) -> bool {
        self.tags.get(condition.key()).is_some_and(|value| {
            condition
                .values()
                .iter()
                .any(|pattern| value_matches(pattern, value))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetFile {
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl FleetFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TagflowError::Fleet(format!(
                "fleet file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let fleet: FleetFile = serde_yaml::from_str(&data)?;
        Ok(fleet)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Three running instances, tagged `Instance: Instance A|B|C`, all
    /// sharing `test key: test value`.
    pub fn sample() -> Self {
        let instances = [
            ("i-0a1b2c3d4e5f60001", "Instance A"),
            ("i-0a1b2c3d4e5f60002", "Instance B"),
            ("i-0a1b2c3d4e5f60003", "Instance C"),
        ]
        .into_iter()
        .map(|(id, name)| Instance {
            id: ResourceId::from(id),
            state: InstanceState::Running,
            tags: BTreeMap::from([
                ("Instance".to_string(), name.to_string()),
                ("test key".to_string(), "test value".to_string()),
            ]),
        })
        .collect();
        Self { instances }
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Instance> {
        self.instances.iter().find(|i| &i.id == id)
    }

    pub fn select(&self, conditions: &[TagCondition], mode: QueryMode) -> Vec<ResourceId> {
        self.instances
            .iter()
            .filter(|instance| match mode {
                QueryMode::Any => conditions.iter().any(|c| instance.matches(c)),
                QueryMode::All => conditions.iter().all(|c| instance.matches(c)),
            })
            .map(|instance| instance.id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Matching and transitions
// ---------------------------------------------------------------------------

/// Match a tag value against a pattern where `*` and `?` are wildcards.
pub fn value_matches(pattern: &str, value: &str) -> bool {
    if !pattern.contains(['*', '?']) {
        return pattern == value;
    }
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).is_ok_and(|r| r.is_match(value))
}

/// The state an instance ends up in after `action`, or why it cannot.
///
/// Applying an action to an instance already in the target state is a
/// successful no-op.
pub fn transition(
    current: InstanceState,
    action: LifecycleAction,
) -> std::result::Result<InstanceState, String> {
    use InstanceState::*;
    match (action, current) {
        (_, Terminated | ShuttingDown) => Err(format!("instance is {current}")),
        (LifecycleAction::Start, Stopped | Pending | Running) => Ok(Running),
        (LifecycleAction::Start, Stopping) => Err("instance is stopping".to_string()),
        (LifecycleAction::Stop, Running | Pending | Stopping | Stopped) => Ok(Stopped),
    }
}

// ---------------------------------------------------------------------------
// Fleet
// ---------------------------------------------------------------------------

/// Handle on a fleet file. Lifecycle writes are serialized through an
/// internal lock; reads take a fresh snapshot each time.
pub struct Fleet {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Fleet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Result<FleetFile> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || FleetFile::load(&path))
            .await
            .map_err(|e| TagflowError::Fleet(format!("fleet read task failed: {e}")))?
    }

    async fn store(&self, fleet: FleetFile) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || fleet.save(&path))
            .await
            .map_err(|e| TagflowError::Fleet(format!("fleet write task failed: {e}")))?
    }
}

#[async_trait]
impl Inventory for Fleet {
    async fn query_by_tag(
        &self,
        conditions: &[TagCondition],
        mode: QueryMode,
    ) -> std::result::Result<Vec<ResourceId>, InventoryError> {
        let fleet = self
            .snapshot()
            .await
            .map_err(|e| InventoryError::Unavailable(e.to_string()))?;
        let ids = fleet.select(conditions, mode);
        debug!(mode = ?mode, count = ids.len(), "fleet query");
        Ok(ids)
    }
}

#[async_trait]
impl LifecycleApi for Fleet {
    async fn apply_action(
        &self,
        action: LifecycleAction,
        ids: &[ResourceId],
    ) -> std::result::Result<Vec<IdOutcome>, ActionError> {
        let _guard = self.write_lock.lock().await;
        let mut fleet = self
            .snapshot()
            .await
            .map_err(|e| ActionError::Unavailable(e.to_string()))?;

        let mut changed = false;
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(instance) = fleet.instances.iter_mut().find(|i| &i.id == id) else {
                outcomes.push(IdOutcome::failed(id.clone(), "unknown instance"));
                continue;
            };
            let previous = instance.state;
            match transition(previous, action) {
                Ok(next) => {
                    if next != previous {
                        instance.state = next;
                        changed = true;
                        info!(id = %id, from = %previous, to = %next, "instance state changed");
                    }
                    outcomes.push(IdOutcome::applied(id.clone(), previous, next));
                }
                Err(reason) => outcomes.push(IdOutcome::failed(id.clone(), reason)),
            }
        }

        if changed {
            self.store(fleet)
                .await
                .map_err(|e| ActionError::Backend(e.to_string()))?;
        }
        Ok(outcomes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Outcome;
    use tempfile::TempDir;

    fn cond(key: &str, values: &[&str]) -> TagCondition {
        TagCondition::new(key, values.iter().map(|v| v.to_string()).collect()).unwrap()
    }

    fn sample_fleet(dir: &TempDir) -> Fleet {
        let path = dir.path().join("fleet.yaml");
        FleetFile::sample().save(&path).unwrap();
        Fleet::new(path)
    }

    #[test]
    fn wildcard_values() {
        assert!(value_matches("Instance *", "Instance A"));
        assert!(value_matches("Instance ?", "Instance B"));
        assert!(!value_matches("Instance ?", "Instance AB"));
        assert!(value_matches("a.b", "a.b"));
        assert!(!value_matches("a.b", "axb"));
        assert!(!value_matches("a.*", "axb"));
    }

    #[test]
    fn transitions() {
        use InstanceState::*;
        assert_eq!(transition(Stopped, LifecycleAction::Start), Ok(Running));
        assert_eq!(transition(Running, LifecycleAction::Start), Ok(Running));
        assert_eq!(transition(Pending, LifecycleAction::Stop), Ok(Stopped));
        assert_eq!(transition(Stopped, LifecycleAction::Stop), Ok(Stopped));
        assert!(transition(Terminated, LifecycleAction::Start).is_err());
        assert!(transition(ShuttingDown, LifecycleAction::Stop).is_err());
        assert!(transition(Stopping, LifecycleAction::Start).is_err());
    }

    #[tokio::test]
    async fn any_and_all_queries() {
        let dir = TempDir::new().unwrap();
        let fleet = sample_fleet(&dir);

        let any = fleet
            .query_by_tag(
                &[
                    cond("Instance", &["Instance A"]),
                    cond("Instance", &["Instance B"]),
                ],
                QueryMode::Any,
            )
            .await
            .unwrap();
        assert_eq!(any.len(), 2);

        let all = fleet
            .query_by_tag(
                &[
                    cond("Instance", &["Instance A"]),
                    cond("test key", &["test value"]),
                ],
                QueryMode::All,
            )
            .await
            .unwrap();
        assert_eq!(all, vec![ResourceId::from("i-0a1b2c3d4e5f60001")]);

        let none = fleet
            .query_by_tag(
                &[cond("Instance", &["Instance A"]), cond("Instance", &["Instance B"])],
                QueryMode::All,
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let fleet = Fleet::new(dir.path().join("absent.yaml"));
        let err = fleet
            .query_by_tag(&[cond("a", &["b"])], QueryMode::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn stop_persists_and_repeats_as_noop() {
        let dir = TempDir::new().unwrap();
        let fleet = sample_fleet(&dir);
        let ids = vec![ResourceId::from("i-0a1b2c3d4e5f60001")];

        let first = fleet.apply_action(LifecycleAction::Stop, &ids).await.unwrap();
        assert_eq!(
            first[0].outcome,
            Outcome::Applied {
                previous: InstanceState::Running,
                current: InstanceState::Stopped
            }
        );
        let snapshot = fleet.snapshot().await.unwrap();
        assert_eq!(snapshot.get(&ids[0]).unwrap().state, InstanceState::Stopped);

        let second = fleet.apply_action(LifecycleAction::Stop, &ids).await.unwrap();
        assert_eq!(
            second[0].outcome,
            Outcome::Applied {
                previous: InstanceState::Stopped,
                current: InstanceState::Stopped
            }
        );
    }

    #[tokio::test]
    async fn unknown_and_terminated_ids_fail_individually() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fleet.yaml");
        let mut file = FleetFile::sample();
        file.instances[1].state = InstanceState::Terminated;
        file.save(&path).unwrap();
        let fleet = Fleet::new(path);

        let ids = vec![
            ResourceId::from("i-0a1b2c3d4e5f60001"),
            ResourceId::from("i-0a1b2c3d4e5f60002"),
            ResourceId::from("i-missing"),
        ];
        let outcomes = fleet.apply_action(LifecycleAction::Stop, &ids).await.unwrap();
        assert!(!outcomes[0].is_failed());
        assert!(outcomes[1].is_failed());
        assert!(outcomes[2].is_failed());
    }

    #[test]
    fn fleet_yaml_shape() {
        let yaml = "instances:\n- id: i-1\n  state: shutting-down\n  tags:\n    env: dev\n";
        let file: FleetFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.instances[0].state, InstanceState::ShuttingDown);
        assert_eq!(file.instances[0].tags["env"], "dev");
    }
}
