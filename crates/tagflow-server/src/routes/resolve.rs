use axum::extract::State;
use axum::Json;
use tagflow_core::request::parse_expression;
use tagflow_core::types::MatchSet;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// POST /api/resolve — evaluate `Tags` against the fleet without acting.
/// `Action` may be omitted.
pub async fn resolve(
    State(app): State<AppState>,
    body: String,
) -> Result<Json<MatchSet>, AppError> {
    let expression = parse_expression(&body)?;
    let project = blocking(move || app.project()).await?;
    let matched = project.controller().resolve(&expression).await?;
    Ok(Json(matched))
}
