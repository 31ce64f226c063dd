use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use tracelog_sessions::{OutcomeBucket, ResultEntry, RootSummary, TraceError, TreeNode};

use super::{trace_error, ApiError, AppState};

pub async fn list_roots(State(state): State<AppState>) -> Result<Json<Vec<RootSummary>>, ApiError> {
    Ok(Json(state.read()?.roots()))
}

pub async fn select_root(
    State(state): State<AppState>,
    Path(mach): Path<u64>,
) -> Result<Json<Vec<RootSummary>>, ApiError> {
    let mut explorer = state.write()?;
    if !explorer.select_root(mach) {
        return Err((StatusCode::NOT_FOUND, format!("No root with machine id {}", mach)));
    }
    Ok(Json(explorer.roots()))
}

pub async fn get_tree(State(state): State<AppState>) -> Result<Json<Vec<TreeNode>>, ApiError> {
    let explorer = state.read()?;
    let run = explorer
        .active()
        .ok_or_else(|| trace_error(TraceError::NoActiveRun))?;
    Ok(Json(run.nodes().to_vec()))
}

pub async fn get_outcomes(
    State(state): State<AppState>,
) -> Result<Json<Vec<OutcomeBucket>>, ApiError> {
    let explorer = state.read()?;
    let run = explorer
        .active()
        .ok_or_else(|| trace_error(TraceError::NoActiveRun))?;
    Ok(Json(run.outcome_buckets()))
}

pub async fn get_results(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResultEntry>>, ApiError> {
    let explorer = state.read()?;
    let results = explorer
        .results()
        .ok_or_else(|| trace_error(TraceError::NoActiveRun))?;
    Ok(Json(results.iter().cloned().collect()))
}
