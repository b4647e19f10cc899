use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};

use crate::api::rest::{handlers, openapi};
use crate::domain::service::Service;

/// Mount the users REST surface plus `GET /openapi.json` on `router`.
pub fn register_routes(router: Router, service: Arc<Service>) -> anyhow::Result<Router> {
    let doc = Arc::new(openapi::build_openapi()?);

    let router = router
        .route(
            "/users",
            post(handlers::create_user).get(handlers::list_users),
        )
        .route("/users/bulk", post(handlers::bulk_create))
        .route("/users/bulk-upsert", post(handlers::bulk_upsert))
        .route("/users/stats", get(handlers::user_stats))
        .route("/users/cursor", get(handlers::list_users_cursor))
        .route("/users/search", get(handlers::search_users))
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/users/{id}/restore", post(handlers::restore_user))
        .route(
            "/openapi.json",
            get(move || {
                let doc = doc.clone();
                async move { Json((*doc).clone()) }
            }),
        )
        .layer(Extension(service));

    tracing::info!("Users REST routes registered");
    Ok(router)
}
