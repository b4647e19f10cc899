use std::time::Duration;

use anyhow::Result;
use axum::{middleware::from_fn, response::Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use super::request_id::{self, MakeReqId};

/// Knobs for the global middleware stack.
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub timeout: Duration,
    pub cors_enabled: bool,
    pub body_limit_bytes: usize,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cors_enabled: false,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

impl HostOptions {
    /// `timeout_sec == 0` keeps the default.
    pub fn with_timeout_secs(mut self, timeout_sec: u64) -> Self {
        if timeout_sec > 0 {
            self.timeout = Duration::from_secs(timeout_sec);
        }
        self
    }
}

/// Wrap `router` with the global middleware.
///
/// Outermost to innermost: SetRequestId -> PropagateRequestId ->
/// push_req_id_to_extensions -> Trace -> Timeout -> CORS -> BodyLimit.
/// `Router::layer` wraps everything added before, so layers are added innermost first.
pub fn apply_http_layers(router: Router, opts: &HostOptions) -> Router {
    let x_request_id = request_id::header();

    let mut router = router.layer(RequestBodyLimitLayer::new(opts.body_limit_bytes));
    if opts.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }
    router
        .layer(TimeoutLayer::new(opts.timeout))
        .layer(request_id::create_trace_layer())
        .layer(from_fn(request_id::push_req_id_to_extensions))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeReqId))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Serve until `cancel` fires, then drain in-flight requests.
pub async fn serve(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("HTTP server bound on {}", addr);

    let shutdown = async move {
        cancel.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XRequestId;
    use axum::{body::Body, http::Request, routing::get, Extension};
    use tower::ServiceExt;

    async fn echo_rid(Extension(rid): Extension<XRequestId>) -> String {
        rid.0
    }

    fn app() -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/rid", get(echo_rid));
        apply_http_layers(router, &HostOptions::default())
    }

    #[tokio::test]
    async fn generates_request_id_when_missing() {
        let resp = app()
            .oneshot(Request::get("/rid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let header = resp
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_owned();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&body), header);
        assert!(!header.is_empty());
    }

    #[tokio::test]
    async fn propagates_client_request_id() {
        let resp = app()
            .oneshot(
                Request::get("/rid")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.headers()["x-request-id"], "abc-123");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"abc-123");
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "healthy");
    }

    #[test]
    fn zero_timeout_keeps_default() {
        assert_eq!(HostOptions::default().with_timeout_secs(0).timeout, Duration::from_secs(30));
        assert_eq!(HostOptions::default().with_timeout_secs(5).timeout, Duration::from_secs(5));
    }
}
