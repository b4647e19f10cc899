use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::Value;
use tracing::{error, info};

use crate::api::rest::dto::{
    documents, parse_bool, parse_id, parse_int, BulkCreateResultDto, BulkUpsertResultDto,
    CreateUserReq, CursorPageDto, CursorQuery, DeleteUserReq, FindOneQuery, ListUsersQuery,
    PagedUsersDto, SearchQuery, SearchResultDto, StatsDto, UpdateUserReq,
};
use crate::api::rest::error::{from_parts, ProblemCtx};
use crate::contract::model::DeleteAudit;
use crate::domain::error::DomainError;
use crate::domain::query::{FieldSelection, Projection};
use crate::domain::service::Service;
use modkit::api::problem::ProblemResponse;

type ApiResult<T> = Result<T, ProblemResponse>;

fn json_body<T>(body: Result<Json<T>, JsonRejection>, ctx: &ProblemCtx) -> ApiResult<T> {
    match body {
        Ok(Json(v)) => Ok(v),
        Err(rejection) => {
            error!("Rejected request body: {}", rejection.body_text());
            Err(ctx.bad_body(&rejection))
        }
    }
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>, ctx: &ProblemCtx) -> ApiResult<T> {
    match query {
        Ok(Query(v)) => Ok(v),
        Err(rejection) => {
            error!("Rejected query string: {}", rejection.body_text());
            Err(ctx.bad_query(&rejection))
        }
    }
}

/// Create a new user
pub async fn create_user(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    body: Result<Json<CreateUserReq>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let req = json_body(body, &ctx)?;
    info!("Creating user: {}", req.email);

    match svc.create(req.into()).await {
        Ok(user) => Ok((
            StatusCode::CREATED,
            Json(Value::Object(Projection::default_view().project(&user))),
        )),
        Err(e) => {
            error!("Failed to create user: {}", e);
            Err(ctx.domain(&e))
        }
    }
}

/// Insert many users, skipping duplicates and invalid records
pub async fn bulk_create(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    body: Result<Json<Vec<CreateUserReq>>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BulkCreateResultDto>)> {
    let records = json_body(body, &ctx)?;
    info!("Bulk creating {} users", records.len());

    match svc
        .bulk_create(records.into_iter().map(Into::into).collect())
        .await
    {
        Ok(result) => Ok((
            StatusCode::CREATED,
            Json(BulkCreateResultDto::render(
                result,
                &Projection::default_view(),
            )),
        )),
        Err(e) => {
            error!("Failed to bulk create users: {}", e);
            Err(ctx.domain(&e))
        }
    }
}

/// Upsert many users keyed by normalized email; batch failures come back in `errors`
pub async fn bulk_upsert(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    body: Result<Json<Vec<CreateUserReq>>, JsonRejection>,
) -> ApiResult<Json<BulkUpsertResultDto>> {
    let records = json_body(body, &ctx)?;
    info!("Bulk upserting {} users", records.len());

    match svc
        .bulk_upsert(records.into_iter().map(Into::into).collect())
        .await
    {
        Ok(result) => Ok(Json(result.into())),
        Err(e) => {
            error!("Failed to bulk upsert users: {}", e);
            Err(ctx.domain(&e))
        }
    }
}

/// Filtered list, or a paginated page when any paging/sorting parameter is given
pub async fn list_users(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let query = query_params(query, &ctx)?;
    info!("Listing users with query: {:?}", query);

    let result = async {
        let params = query.list_params()?;
        let fields = query.fields();
        if query.wants_pagination() {
            let sort = query.sort()?;
            let page = query.page_request(svc.config())?;
            let page = svc.paginate(&params, &fields, sort, page).await?;
            Ok::<_, DomainError>(Json(PagedUsersDto::from(page)).into_response())
        } else {
            let items = svc.find_all(&params, &fields).await?;
            Ok(Json(documents(items)).into_response())
        }
    }
    .await;

    result.map_err(|e| {
        error!("Failed to list users: {}", e);
        ctx.domain(&e)
    })
}

/// Forward cursor pagination over active users
pub async fn list_users_cursor(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    query: Result<Query<CursorQuery>, QueryRejection>,
) -> ApiResult<Json<CursorPageDto>> {
    let query = query_params(query, &ctx)?;
    info!("Cursor listing after {:?}", query.after);

    let result = async {
        let limit = parse_int("limit", query.limit.as_deref())?;
        svc.find_with_cursor(query.after.as_deref(), limit).await
    }
    .await;

    match result {
        Ok(page) => Ok(Json(page.into())),
        Err(e) => {
            error!("Failed to list users by cursor: {}", e);
            Err(ctx.domain(&e))
        }
    }
}

/// Full-text search over name and email, best match first
pub async fn search_users(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<SearchResultDto>> {
    let query = query_params(query, &ctx)?;
    info!("Searching users: {:?}", query.q);

    let result = async {
        let limit = parse_int("limit", query.limit.as_deref())?;
        let fields = FieldSelection::parse(query.fields.as_deref());
        svc.text_search(query.q.as_deref().unwrap_or_default(), &fields, limit)
            .await
    }
    .await;

    match result {
        Ok(items) => Ok(Json(SearchResultDto { items })),
        Err(e) => {
            error!("Search failed: {}", e);
            Err(ctx.domain(&e))
        }
    }
}

/// Faceted statistics over active users
pub async fn user_stats(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
) -> ApiResult<Json<StatsDto>> {
    match svc.stats().await {
        Ok(stats) => Ok(Json(stats.into())),
        Err(e) => {
            error!("Failed to compute stats: {}", e);
            Err(ctx.domain(&e))
        }
    }
}

/// Get a specific user by ID
pub async fn get_user(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    query: Result<Query<FindOneQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let query = query_params(query, &ctx)?;
    info!("Getting user with id: {}", id);

    let result = async {
        let id = parse_id(&id)?;
        let include_deleted =
            parse_bool("includeDeleted", query.include_deleted.as_deref())?.unwrap_or(false);
        let fields = FieldSelection::parse(query.fields.as_deref());
        svc.find_one(id, include_deleted, &fields).await
    }
    .await;

    match result {
        Ok(doc) => Ok(Json(Value::Object(doc))),
        Err(e) => {
            error!("Failed to get user {}: {}", id, e);
            Err(ctx.domain(&e))
        }
    }
}

/// Update an existing user
pub async fn update_user(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserReq>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = json_body(body, &ctx)?;
    info!("Updating user {} with: {:?}", id, req);

    let result = async {
        let id = parse_id(&id)?;
        svc.update(id, req.into()).await
    }
    .await;

    match result {
        Ok(user) => Ok(Json(Value::Object(
            Projection::default_view().project(&user),
        ))),
        Err(e) => {
            error!("Failed to update user {}: {}", id, e);
            Err(ctx.domain(&e))
        }
    }
}

/// Soft-delete a user; the audit body is optional
pub async fn delete_user(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    info!("Deleting user: {}", id);

    let audit: DeleteAudit = if body.iter().all(u8::is_ascii_whitespace) {
        DeleteAudit::default()
    } else {
        serde_json::from_slice::<DeleteUserReq>(&body)
            .map_err(|e| {
                from_parts(
                    StatusCode::BAD_REQUEST,
                    "USERS_VALIDATION",
                    "Validation error",
                    format!("Invalid delete body: {e}"),
                    &ctx,
                )
            })?
            .into()
    };

    let result = async {
        let id = parse_id(&id)?;
        svc.soft_delete(id, audit).await
    }
    .await;

    match result {
        Ok(user) => Ok(Json(Value::Object(Projection::admin().project(&user)))),
        Err(e) => {
            error!("Failed to delete user {}: {}", id, e);
            Err(ctx.domain(&e))
        }
    }
}

/// Restore a soft-deleted user
pub async fn restore_user(
    ctx: ProblemCtx,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    info!("Restoring user: {}", id);

    let result = async {
        let id = parse_id(&id)?;
        svc.restore(id).await
    }
    .await;

    match result {
        Ok(user) => Ok(Json(Value::Object(Projection::admin().project(&user)))),
        Err(e) => {
            error!("Failed to restore user {}: {}", id, e);
            Err(ctx.domain(&e))
        }
    }
}
