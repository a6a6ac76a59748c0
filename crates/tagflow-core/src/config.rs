use crate::error::{Result, TagflowError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// WorkflowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Wall-clock budget for one run.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Upper bound on concurrent inventory queries in `or` mode.
    #[serde(default = "default_max_parallel_queries")]
    pub max_parallel_queries: usize,
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_max_parallel_queries() -> usize {
    8
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_parallel_queries: default_max_parallel_queries(),
        }
    }
}

impl WorkflowConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// ---------------------------------------------------------------------------
// FleetConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Fleet file, relative to the project root unless absolute.
    #[serde(default = "default_fleet_path")]
    pub path: String,
}

fn default_fleet_path() -> String {
    paths::FLEET_FILE.to_string()
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            path: default_fleet_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of most recent runs kept in the run log.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

fn default_retention() -> usize {
    50
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3150
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            workflow: WorkflowConfig::default(),
            fleet: FleetConfig::default(),
            history: HistoryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        if !paths::is_initialized(root) {
            return Err(TagflowError::NotInitialized);
        }
        let data = std::fs::read_to_string(paths::config_path(root))?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Absolute location of the fleet file for this project.
    pub fn fleet_path(&self, root: &Path) -> PathBuf {
        let path = Path::new(&self.fleet.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.workflow.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "workflow.timeout_seconds must be greater than 0".to_string(),
            });
        } else if self.workflow.timeout_seconds > 3600 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "workflow.timeout_seconds={} (runs longer than an hour are unusual)",
                    self.workflow.timeout_seconds
                ),
            });
        }

        if self.workflow.max_parallel_queries == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "workflow.max_parallel_queries must be greater than 0".to_string(),
            });
        }

        if self.fleet.path.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "fleet.path is empty".to_string(),
            });
        }

        if self.history.retention == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "history.retention is 0; runs will not be kept".to_string(),
            });
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error)
    }
}
