use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::{Config, WarnLevel};
use crate::error::{Result, TagflowError};
use crate::fleet::{Fleet, FleetFile};
use crate::history::RunLog;
use crate::io;
use crate::paths;
use crate::workflow::{RunReport, WorkflowController};

/// An initialized project directory: its config plus the collaborators the
/// workflow runs against.
pub struct Project {
    root: PathBuf,
    config: Config,
    fleet: Arc<Fleet>,
}

impl Project {
    /// Open an initialized project. A config that fails validation with
    /// errors is rejected; warnings are allowed.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        if config.has_errors() {
            let errors: Vec<String> = config
                .validate()
                .into_iter()
                .filter(|w| w.level == WarnLevel::Error)
                .map(|w| w.message)
                .collect();
            return Err(TagflowError::InvalidConfig(errors.join("; ")));
        }
        let fleet = Arc::new(Fleet::new(config.fleet_path(root)));
        Ok(Self {
            root: root.to_path_buf(),
            config,
            fleet,
        })
    }

    /// Scaffold `.tagflow/` with a default config and a sample fleet.
    /// Existing files are left alone. Returns the files that were written.
    pub fn init(root: &Path) -> Result<Vec<PathBuf>> {
        io::ensure_dir(&paths::tagflow_dir(root))?;
        let mut written = Vec::new();

        let config = Config::default();
        let config_path = paths::config_path(root);
        if io::write_if_missing(&config_path, serde_yaml::to_string(&config)?.as_bytes())? {
            written.push(config_path);
        }

        let fleet_path = config.fleet_path(root);
        let fleet = serde_yaml::to_string(&FleetFile::sample())?;
        if io::write_if_missing(&fleet_path, fleet.as_bytes())? {
            written.push(fleet_path);
        }

        info!(root = %root.display(), files = written.len(), "project initialized");
        Ok(written)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    /// A controller wired to this project's fleet for both seams.
    pub fn controller(&self) -> WorkflowController {
        WorkflowController::new(self.fleet.clone(), self.fleet.clone())
            .configured(&self.config.workflow)
    }

    pub fn open_run_log(&self) -> Result<RunLog> {
        RunLog::open(&paths::run_log_path(&self.root))
    }

    /// Record `report` and trim the log to the configured retention.
    pub fn record_run(&self, log: &RunLog, report: &RunReport) -> Result<()> {
        log.record(report)?;
        log.enforce_retention(self.config.history.retention)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::RunStatus;
    use tempfile::TempDir;

    #[test]
    fn open_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Project::open(dir.path()),
            Err(TagflowError::NotInitialized)
        ));
    }

    #[test]
    fn open_rejects_config_with_errors() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();
        let mut config = Config::load(dir.path()).unwrap();
        config.workflow.timeout_seconds = 0;
        config.save(dir.path()).unwrap();

        let err = Project::open(dir.path()).err().unwrap();
        assert!(matches!(err, TagflowError::InvalidConfig(_)));
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn open_allows_config_with_warnings() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();
        let mut config = Config::load(dir.path()).unwrap();
        config.history.retention = 0;
        config.save(dir.path()).unwrap();
        assert!(Project::open(dir.path()).is_ok());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let first = Project::init(dir.path()).unwrap();
        assert_eq!(first.len(), 2);
        let second = Project::init(dir.path()).unwrap();
        assert!(second.is_empty());
        assert!(paths::is_initialized(dir.path()));
    }

    #[tokio::test]
    async fn end_to_end_stop_then_start() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();
        let project = Project::open(dir.path()).unwrap();
        let controller = project.controller();

        let stop = controller
            .run_payload(
                r#"{"Tags":{"or":[{"Key":"Instance","Values":["Instance A"]},
                                 {"Key":"Instance","Values":["Instance B"]}]},
                    "Action":"Stop"}"#,
            )
            .await
            .unwrap();
        assert_eq!(stop.status, RunStatus::Succeeded);
        assert_eq!(stop.matched.as_ref().unwrap().count(), 2);

        let start = controller
            .run_payload(
                r#"{"Tags":{"and":[{"Name":"tag:Instance","Values":["Instance A"]},
                                  {"Name":"tag:test key","Values":["test value"]}]},
                    "Action":"Start"}"#,
            )
            .await
            .unwrap();
        assert_eq!(start.status, RunStatus::Succeeded);

        let fleet = project.fleet().snapshot().await.unwrap();
        let states: Vec<_> = fleet.instances.iter().map(|i| i.state.as_str()).collect();
        assert_eq!(states, vec!["running", "stopped", "running"]);

        let log = project.open_run_log().unwrap();
        project.record_run(&log, &stop).unwrap();
        project.record_run(&log, &start).unwrap();
        assert_eq!(log.list_recent(10).unwrap().len(), 2);
    }
}
