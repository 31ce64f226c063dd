use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;

use tracelog_sessions::{Navigation, NodeLog, PathLookup};

use super::{trace_error, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct LogParams {
    #[serde(default)]
    pub raw: bool,
}

#[derive(Debug, Deserialize)]
pub struct NavigateParams {
    #[serde(default)]
    pub address: String,
}

pub async fn get_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PathLookup>, ApiError> {
    let lookup = state.read()?.resolve_path(&id).map_err(trace_error)?;
    Ok(Json(lookup))
}

pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LogParams>,
) -> Result<Json<NodeLog>, ApiError> {
    let explorer = state.read()?;
    let log = if params.raw {
        explorer.assemble_raw(&id).map(NodeLog::Raw)
    } else {
        explorer.assemble_normalized(&id).map(NodeLog::Normalized)
    };
    Ok(Json(log.map_err(trace_error)?))
}

/// Deep links always resolve to something; failures come back as
/// `cleared` with the fallback address.
pub async fn navigate(
    State(state): State<AppState>,
    Query(params): Query<NavigateParams>,
) -> Result<Json<Navigation>, ApiError> {
    Ok(Json(state.write()?.navigate(&params.address)))
}
