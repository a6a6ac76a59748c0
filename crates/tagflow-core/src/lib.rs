pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod fleet;
pub mod history;
pub mod inventory;
pub mod io;
pub mod paths;
pub mod project;
pub mod request;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use error::{Result, TagflowError};
pub use project::Project;
pub use workflow::{RunReport, RunStatus, WorkflowController};
