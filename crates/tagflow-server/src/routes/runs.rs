use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tagflow_core::RunReport;
use tracing::warn;
use uuid::Uuid;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;

/// POST /api/runs — the HTTP trigger.
///
/// The body is a trigger payload. Any run that gets past parsing answers 200
/// with its report, whatever the terminal status and whether or not it could
/// be recorded; malformed payloads are 400.
pub async fn create_run(
    State(app): State<AppState>,
    body: String,
) -> Result<Json<RunReport>, AppError> {
    let project = {
        let app = app.clone();
        blocking(move || app.project()).await?
    };

    let report = project.controller().run_payload(&body).await?;

    // The dispatch has happened; a run log failure must not hide the report.
    let recorded = report.clone();
    let result = blocking(move || {
        let log = app.run_log()?;
        project.record_run(&log, &recorded)
    })
    .await;
    if let Err(AppError(e)) = result {
        warn!(run_id = %report.run_id, error = %e, "run was not recorded");
    }

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<usize>,
}

/// GET /api/runs?limit=N — most recent runs, newest first.
pub async fn list_runs(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RunReport>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let runs = blocking(move || app.run_log()?.list_recent(limit)).await?;
    Ok(Json(runs))
}

/// GET /api/runs/{id}
pub async fn get_run(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunReport>, AppError> {
    let run_id =
        Uuid::parse_str(&id).map_err(|_| AppError::bad_request(format!("invalid run id '{id}'")))?;
    let report = blocking(move || app.run_log()?.get(run_id)).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagflow_core::{Project, RunStatus};
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_run_records_report() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();
        let app = AppState::new(dir.path().to_path_buf());

        let body = r#"{"Tags":{"or":[{"Key":"Instance","Values":["Instance C"]}]},"Action":"Stop"}"#;
        let Json(report) = create_run(State(app.clone()), body.to_string())
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Succeeded);

        let Json(loaded) = get_run(State(app), Path(report.run_id.to_string()))
            .await
            .unwrap();
        assert_eq!(loaded.run_id, report.run_id);
    }

    #[tokio::test]
    async fn create_run_returns_report_when_run_log_is_unwritable() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join(".tagflow/runs.redb")).unwrap();
        let app = AppState::new(dir.path().to_path_buf());

        let body = r#"{"Tags":{"or":[{"Key":"Instance","Values":["Instance A"]}]},"Action":"Stop"}"#;
        let Json(report) = create_run(State(app.clone()), body.to_string())
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.dispatch.unwrap().outcomes.len(), 1);
        assert!(app.run_log().is_err());
    }

    #[tokio::test]
    async fn create_run_rejects_malformed_payload() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();
        let app = AppState::new(dir.path().to_path_buf());
        let result = create_run(State(app.clone()), r#"{"Tags":{}}"#.to_string()).await;
        assert!(result.is_err());

        let Json(runs) = list_runs(State(app), Query(ListParams { limit: None }))
            .await
            .unwrap();
        assert!(runs.is_empty());
    }
}
