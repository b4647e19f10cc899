use axum::http::{HeaderName, Request};
use axum::{body::Body, middleware::Next, response::Response};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::field::Empty;

/// Request id as seen by handlers (taken from `x-request-id`).
#[derive(Clone, Debug)]
pub struct XRequestId(pub String);

pub fn header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

fn request_id_of<B>(req: &Request<B>) -> Option<&str> {
    req.headers().get(header()).and_then(|v| v.to_str().ok())
}

#[derive(Clone, Default)]
pub struct MakeReqId;

impl MakeRequestId for MakeReqId {
    fn make_request_id<B>(&mut self, _req: &Request<B>) -> Option<RequestId> {
        let id = nanoid::nanoid!();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Stores the request id in extensions and records it on the current span.
pub async fn push_req_id_to_extensions(mut req: Request<Body>, next: Next) -> Response {
    let rid = request_id_of(&req).unwrap_or("n/a").to_owned();
    tracing::Span::current().record("request_id", tracing::field::display(&rid));
    req.extensions_mut().insert(XRequestId(rid));
    next.run(req).await
}

/// `http_request` span per request; status and latency are filled on response.
#[allow(clippy::type_complexity)]
pub fn create_trace_layer() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    impl Fn(&Request<Body>) -> tracing::Span + Clone,
    (),
    impl Fn(&Response, std::time::Duration, &tracing::Span) + Clone,
> {
    use tower_http::trace::TraceLayer;

    TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                uri = %req.uri().path(),
                request_id = %request_id_of(req).unwrap_or("n/a"),
                status = Empty,
                latency_ms = Empty
            )
        })
        .on_request(())
        .on_response(
            |resp: &Response, latency: std::time::Duration, span: &tracing::Span| {
                span.record("status", resp.status().as_u16());
                span.record("latency_ms", latency.as_millis() as u64);
                tracing::debug!(parent: span, "request completed");
            },
        )
}
