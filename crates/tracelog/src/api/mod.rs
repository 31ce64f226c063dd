mod nodes;
mod runs;
mod sse;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use tracelog_sessions::{Explorer, TraceError};

pub type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub explorer: Arc<RwLock<Explorer>>,
}

impl AppState {
    pub fn new(explorer: Explorer) -> Self {
        Self {
            explorer: Arc::new(RwLock::new(explorer)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Explorer>, ApiError> {
        self.explorer.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Explorer>, ApiError> {
        self.explorer.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Explorer state poisoned".to_string(),
    )
}

/// HTTP status for a lookup failure.
pub fn trace_error(e: TraceError) -> ApiError {
    let status = match e {
        TraceError::MalformedIdentifier(_) => StatusCode::BAD_REQUEST,
        TraceError::NodeNotFound(_) | TraceError::PathBroken { .. } => StatusCode::NOT_FOUND,
        TraceError::NoActiveRun => StatusCode::CONFLICT,
        TraceError::DuplicateMachId { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/roots", get(runs::list_roots))
        .route("/api/roots/{mach}/select", post(runs::select_root))
        .route("/api/tree", get(runs::get_tree))
        .route("/api/outcomes", get(runs::get_outcomes))
        .route("/api/results", get(runs::get_results))
        .route("/api/nodes/{id}/path", get(nodes::get_path))
        .route("/api/nodes/{id}/log", get(nodes::get_log))
        .route("/api/navigate", get(nodes::navigate))
        .route("/api/events", get(sse::explorer_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;
    use tracelog_sessions::{Event, EventKind, Extra, Session};

    fn state() -> AppState {
        let mut root = Session::new("1(0:1)", None);
        let mut link = Extra::default();
        link.child = Some("1(1:2)".into());
        root.records = vec![
            Event::new(EventKind::Begin, 0, "Begin"),
            Event::new(EventKind::Copy, 1, "Copy").with_extra(link),
        ];
        let mut child = Session::new("1(1:2)", Some("1(0:1)"));
        child.values = "42".into();
        child.records = vec![Event::new(EventKind::PostOp, 2, "add")];
        AppState::new(Explorer::load(vec![root, child, Session::new("3(0:3)", None)]))
    }

    async fn call(state: &AppState, method: Method, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = create_router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_run_queries_need_a_selection() {
        let state = state();
        let (status, _) = call(&state, Method::GET, "/api/tree").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, roots) = call(&state, Method::POST, "/api/roots/1/select").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(roots[0]["active"], Value::Bool(true));

        let (status, tree) = call(&state, Method::GET, "/api/tree").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tree.as_array().unwrap().len(), 2);

        let (_, outcomes) = call(&state, Method::GET, "/api/outcomes").await;
        assert_eq!(outcomes[0]["name"], "unknown");
        assert_eq!(outcomes[1]["ids"][0], "1(1:2)");

        let (status, _) = call(&state, Method::POST, "/api/roots/2/select").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_node_errors_map_to_status() {
        let state = state();
        call(&state, Method::POST, "/api/roots/1/select").await;

        let (status, path) = call(&state, Method::GET, "/api/nodes/1(1:2)/path").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(path["lookup"], "path");
        assert_eq!(path["nodes"].as_array().unwrap().len(), 2);

        let (status, _) = call(&state, Method::GET, "/api/nodes/abc/path").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&state, Method::GET, "/api/nodes/1(1:9)/log").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, log) = call(&state, Method::GET, "/api/nodes/1(1:2)/log?raw=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(log["view"], "raw");
        assert_eq!(log["rows"]["rows"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_navigate_never_fails() {
        let state = state();
        call(&state, Method::POST, "/api/roots/1/select").await;

        let (status, nav) = call(&state, Method::GET, "/api/navigate?address=%231(9:9)").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(nav["kind"], "cleared");
        assert_eq!(nav["address"], "#1(0:1)");

        let (_, nav) = call(&state, Method::GET, "/api/navigate?address=%231(1:2)").await;
        assert_eq!(nav["kind"], "log");
        assert_eq!(nav["log"]["view"], "normalized");
    }
}
