//! HTTP request handlers.

use super::AppState;
use crate::db::{CheckResult, HealthMetrics, Status, StatusDocument, StatusSnapshot, Target};
use crate::scheduler::CycleError;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn error_response(status: StatusCode, error: &str, message: Option<String>) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
        message,
    };
    (status, Json(body)).into_response()
}

fn site_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Site not found", None)
}

fn cycle_failed(e: CycleError) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to check site status",
        Some(e.to_string()),
    )
}

// ============================================================================
// API: Live status
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub refresh: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub timestamp: DateTime<Utc>,
    pub overall: Status,
    pub metrics: HealthMetrics,
    pub sites: Vec<CheckResult>,
    pub last_checked: DateTime<Utc>,
}

impl From<StatusSnapshot> for StatusResponse {
    fn from(snapshot: StatusSnapshot) -> Self {
        Self {
            timestamp: Utc::now(),
            overall: snapshot.metrics.status,
            metrics: snapshot.metrics,
            sites: snapshot.sites,
            last_checked: snapshot.last_checked,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SiteResponse {
    pub site: CheckResult,
}

pub async fn handle_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let force = query.refresh.unwrap_or(false);

    if let Some(site_id) = query.site_id {
        return site_response(&state, &site_id, force).await;
    }

    match state.monitor.current_status(force).await {
        Ok(snapshot) => Json(StatusResponse::from(snapshot)).into_response(),
        Err(e) => cycle_failed(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: Option<bool>,
}

pub async fn handle_get_site(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> impl IntoResponse {
    site_response(&state, &id, query.refresh.unwrap_or(false)).await
}

async fn site_response(state: &AppState, id: &str, force: bool) -> Response {
    match state.monitor.site_status(id, force).await {
        Some(site) => Json(SiteResponse { site }).into_response(),
        None => site_not_found(),
    }
}

pub async fn handle_refresh(State(state): State<AppState>) -> impl IntoResponse {
    match state.monitor.current_status(true).await {
        Ok(snapshot) => Json(StatusResponse::from(snapshot)).into_response(),
        Err(e) => cycle_failed(e),
    }
}

pub async fn handle_get_sites(State(state): State<AppState>) -> Json<Vec<Target>> {
    Json(state.monitor.targets().to_vec())
}

// ============================================================================
// API: History and persisted data
// ============================================================================

pub async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.monitor.site_history(&id).await {
        Some(history) => Json(history).into_response(),
        None => site_not_found(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticStatusResponse {
    #[serde(flatten)]
    pub document: StatusDocument,
    pub source: &'static str,
    pub served_at: DateTime<Utc>,
}

pub async fn handle_static_status(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.clone();
    let read = match tokio::task::spawn_blocking(move || store.read()).await {
        Ok(read) => read,
        Err(e) => {
            tracing::error!("Static status read task failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to serve static status data",
                Some(e.to_string()),
            );
        }
    };

    match read {
        Ok(Some(document)) => {
            let body = StaticStatusResponse {
                document,
                source: "static",
                served_at: Utc::now(),
            };
            (
                [(header::CACHE_CONTROL, "public, max-age=60, s-maxage=120")],
                Json(body),
            )
                .into_response()
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "Status data not found",
            Some("No check cycle has written the status document yet.".to_string()),
        ),
        Err(e) => {
            tracing::error!("Failed to serve static status data: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to serve static status data",
                Some(e.to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::Store;
    use crate::probe::{ProbeConfig, Prober};
    use crate::scheduler::{Monitor, RetentionPolicy};
    use crate::testing::{spawn_test_server, TestServer};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn app_state(server: &TestServer, dir: &TempDir) -> AppState {
        let store = Arc::new(Store::new(dir.path().join("status-data.json")));
        let prober = Prober::new(ProbeConfig {
            timeout: Duration::from_secs(1),
            max_jitter: Duration::ZERO,
        })
        .unwrap();
        let monitor = Monitor::new(
            vec![
                Target::new("ok", "OK", "", &server.url("/ok"), ""),
                Target::new("missing", "Missing", "", &server.url("/missing"), ""),
            ],
            prober,
            store.clone(),
            RetentionPolicy::default(),
            Duration::from_secs(30),
        );
        AppState {
            config: ServerConfig::default(),
            store,
            monitor: Arc::new(monitor),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_payload() {
        let server = spawn_test_server().await;
        let dir = tempdir().unwrap();
        let state = app_state(&server, &dir);

        let response = handle_status(State(state), Query(StatusQuery::default()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["overall"], "degraded");
        assert_eq!(body["metrics"]["operationalPercentage"], 50);
        assert_eq!(body["metrics"]["totalSites"], 2);
        assert_eq!(body["sites"].as_array().unwrap().len(), 2);
        assert!(body["lastChecked"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_site_is_404() {
        let server = spawn_test_server().await;
        let dir = tempdir().unwrap();
        let state = app_state(&server, &dir);

        let query = StatusQuery {
            site_id: Some("nope".to_string()),
            refresh: None,
        };
        let response = handle_status(State(state.clone()), Query(query)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Site not found");

        let response = handle_get_site(State(state), Path("ok".to_string()), Query(RefreshQuery::default()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["site"]["status"], "operational");
    }

    #[tokio::test]
    async fn test_history_not_found_vs_no_data() {
        let server = spawn_test_server().await;
        let dir = tempdir().unwrap();
        let state = app_state(&server, &dir);

        let response = handle_history(State(state.clone()), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = handle_history(State(state.clone()), Path("ok".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["hasData"], false);
        assert_eq!(body["availability"], 100);

        handle_refresh(State(state.clone())).await.into_response();
        let body = body_json(
            handle_history(State(state), Path("ok".to_string())).await.into_response(),
        )
        .await;
        assert_eq!(body["hasData"], true);
        assert_eq!(body["dailyData"][0]["checks"], 1);
        assert_eq!(body["dailyData"][0]["uptime"], 100);
    }

    #[tokio::test]
    async fn test_static_status() {
        let server = spawn_test_server().await;
        let dir = tempdir().unwrap();
        let state = app_state(&server, &dir);

        let response = handle_static_status(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        handle_refresh(State(state.clone())).await.into_response();

        let response = handle_static_status(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=60, s-maxage=120"
        );
        let body = body_json(response).await;
        assert_eq!(body["source"], "static");
        assert!(body["historical"]["hourly"]["ok"].is_object());

        std::fs::write(state.store.path(), "garbage").unwrap();
        let response = handle_static_status(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_refresh_reports_persist_failure() {
        let server = spawn_test_server().await;
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut state = app_state(&server, &dir);
        let store = Arc::new(Store::new(blocker.join("status-data.json")));
        let prober = Prober::new(ProbeConfig::default()).unwrap();
        state.monitor = Arc::new(Monitor::new(
            vec![],
            prober,
            store.clone(),
            RetentionPolicy::default(),
            Duration::from_secs(30),
        ));
        state.store = store;

        let response = handle_refresh(State(state)).await.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Failed to check site status");
    }
}
