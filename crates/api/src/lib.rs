//! Exam Integrity API Server
//!
//! REST surface for the violation ledger and the integrity review surface.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use storage::Repository;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod config;
pub mod error;
pub mod ledger;
pub mod routes;

pub use config::{IntegrityConfig, LedgerConfig, LoggingConfig, ServerConfig};
pub use error::{ApiError, ServerError};
pub use ledger::{AttemptFinalizer, IntegrityLedger, Requester};

/// Application state shared across handlers
pub struct AppState {
    pub ledger: IntegrityLedger,
    /// Prometheus handle when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(ledger: IntegrityLedger) -> Self {
        Self {
            ledger,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: String,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/v1/attempts/:attempt_id/violations",
            post(routes::violations::report_violation)
                .get(routes::violations::list_violations)
                .delete(routes::violations::clear_violations),
        )
        .route("/api/v1/attempts/:attempt_id/flag", post(routes::review::flag_attempt))
        .route(
            "/api/v1/attempts/:attempt_id/invalidate",
            post(routes::review::invalidate_attempt),
        )
        .route("/api/v1/violations/summary", get(routes::review::get_summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, code, database) = match state.ledger.repository().ping().await {
        Ok(()) => ("healthy", StatusCode::OK, "ok".to_string()),
        Err(e) => {
            warn!("Health check database ping failed: {}", e);
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database,
    };

    (code, Json(response))
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Initialize logging. RUST_LOG takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Open the ledger database and assemble shared state
pub async fn build_state(config: &IntegrityConfig) -> Result<AppState, ServerError> {
    let repo = Repository::connect(&config.server.database_url, config.server.max_connections).await?;
    let ledger = IntegrityLedger::new(repo, config.ledger.clone());
    let mut state = AppState::new(ledger);

    if config.server.enable_metrics {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| ServerError::Metrics(e.to_string()))?;
        state = state.with_metrics(handle);
    }

    Ok(state)
}

/// Run the server
pub async fn run_server(config: IntegrityConfig) -> Result<(), ServerError> {
    let state = Arc::new(build_state(&config).await?);
    let mut app = create_router(state);
    if config.server.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    info!("Starting integrity server on {}", config.server.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::seeded;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use report_client::{ClientConfig, ClientError, ReportingClient, ViolationSink};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use violation_types::{detection, ViolationReport, ViolationType};

    async fn app() -> Router {
        create_router(Arc::new(AppState::new(seeded(LedgerConfig::default()).await)))
    }

    fn request(method: Method, uri: &str, user: Option<(i64, &str)>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = user {
            builder = builder
                .header(routes::USER_ID_HEADER, id.to_string())
                .header(routes::USER_ROLE_HEADER, role);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app, request(Method::GET, "/api/v1/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_disabled_without_recorder() {
        let app = app().await;
        let response = app
            .oneshot(request(Method::GET, "/metrics", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_report_then_list() {
        let app = app().await;
        let report = json!({
            "violationType": "tab_change",
            "detectionMethod": "browser_event",
            "details": { "userAgent": "test-agent" }
        });

        let (status, body) = send(
            &app,
            request(Method::POST, "/api/v1/attempts/501/violations", None, Some(report)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["violationCount"], 1);
        assert_eq!(body["severity"], "medium");
        assert_eq!(body["autoSubmitted"], false);

        let (status, body) = send(
            &app,
            request(Method::GET, "/api/v1/attempts/501/violations", Some((1, "student")), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subjectName"], "Ada");
        assert_eq!(body["totalViolations"], 1);
        assert_eq!(body["violations"][0]["violationType"], "tab_change");
        assert_eq!(body["violations"][0]["details"]["userAgent"], "test-agent");
    }

    #[tokio::test]
    async fn test_cross_student_list_is_forbidden() {
        let app = app().await;
        let (status, body) = send(
            &app,
            request(Method::GET, "/api/v1/attempts/501/violations", Some((2, "student")), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_AUTHORIZED");

        let (status, _) = send(&app, request(Method::GET, "/api/v1/attempts/501/violations", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_attempt_is_not_found() {
        let app = app().await;
        let report = json!({ "violationType": "right_click", "detectionMethod": "browser_event" });
        let (status, body) = send(
            &app,
            request(Method::POST, "/api/v1/attempts/999/violations", None, Some(report)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_review_actions() {
        let app = app().await;
        let teacher = Some((100, "teacher"));

        let (status, body) = send(&app, request(Method::POST, "/api/v1/attempts/502/flag", teacher, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isFlagged"], true);

        let (_, body) = send(
            &app,
            request(Method::POST, "/api/v1/attempts/502/flag", teacher, Some(json!({ "flagged": false }))),
        )
        .await;
        assert_eq!(body["isFlagged"], false);

        for _ in 0..2 {
            let (status, body) =
                send(&app, request(Method::POST, "/api/v1/attempts/501/invalidate", teacher, None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "invalidated");
        }

        let (status, body) = send(
            &app,
            request(Method::GET, "/api/v1/violations/summary?quizId=10", teacher, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suspiciousAttemptCount"], 1);
        assert_eq!(body["attempts"][0]["status"], "invalidated");

        let (status, _) = send(
            &app,
            request(Method::POST, "/api/v1/attempts/501/flag", Some((1, "student")), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_clear() {
        let app = app().await;
        let report = json!({ "violationType": "paste_attempt", "detectionMethod": "browser_event" });
        send(&app, request(Method::POST, "/api/v1/attempts/501/violations", None, Some(report))).await;

        let (status, body) = send(
            &app,
            request(Method::DELETE, "/api/v1/attempts/501/violations", Some((9, "admin")), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);
    }

    async fn serve(config: LedgerConfig) -> String {
        let app = create_router(Arc::new(AppState::new(seeded(config).await)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_reporting_client_against_server() {
        let base_url = serve(LedgerConfig {
            auto_submit_threshold: 2,
            ..Default::default()
        })
        .await;
        let client = ReportingClient::new(&ClientConfig {
            base_url,
            ..Default::default()
        })
        .unwrap();

        let report = ViolationReport::new(ViolationType::NoFace, detection::CAMERA_HEURISTIC)
            .with_details(json!({ "awaySeconds": 2 }));
        let (a, b) = tokio::join!(client.report(501, &report), client.report(501, &report));
        let mut counts = vec![a.unwrap().violation_count, b.unwrap().violation_count];
        counts.sort();
        assert_eq!(counts, vec![1, 2]);

        let third = client.report(501, &report).await.unwrap();
        assert_eq!(third.violation_count, 3);
        assert!(third.auto_submitted);

        let err = client.report(999, &report).await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 404, .. }));
    }
}
