use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tagflow_core::history::RunLog;
use tagflow_core::{Project, TagflowError};

/// Shared application state passed to all route handlers.
///
/// The project and its run log are opened on first use and then shared, so
/// every run in this process goes through one fleet handle (whose writes are
/// serialized) and one run-log database.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    project: Arc<Mutex<Option<Arc<Project>>>>,
    run_log: Arc<Mutex<Option<Arc<RunLog>>>>,
}

impl AppState {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            project: Arc::new(Mutex::new(None)),
            run_log: Arc::new(Mutex::new(None)),
        }
    }

    /// Blocking: may read the config from disk.
    pub fn project(&self) -> Result<Arc<Project>, TagflowError> {
        let mut slot = self.project.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(project) = slot.as_ref() {
            return Ok(project.clone());
        }
        let project = Arc::new(Project::open(&self.root)?);
        *slot = Some(project.clone());
        Ok(project)
    }

    /// Blocking: may open the database.
    pub fn run_log(&self) -> Result<Arc<RunLog>, TagflowError> {
        let project = self.project()?;
        let mut slot = self.run_log.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(log) = slot.as_ref() {
            return Ok(log.clone());
        }
        let log = Arc::new(project.open_run_log()?);
        *slot = Some(log.clone());
        Ok(log)
    }
}
