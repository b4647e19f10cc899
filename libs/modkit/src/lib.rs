//! # ModKit
//!
//! Shared HTTP plumbing for the users server: RFC 9457 problem responses,
//! request-id propagation, the middleware stack and graceful serving.

pub use anyhow::Result;

pub mod api;
pub mod http;
pub mod runtime;

pub use api::problem::{
    bad_request, conflict, internal_error, not_found, Problem, ProblemResponse, ValidationError,
};
pub use http::host::{apply_http_layers, health_check, serve, HostOptions};
pub use http::request_id::XRequestId;
pub use runtime::shutdown::{cancel_on_signal, wait_for_shutdown};
