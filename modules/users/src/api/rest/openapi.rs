//! OpenAPI document for the users REST surface.
//!
//! Component schemas come from `utoipa` derives; paths are assembled from a
//! static operation table so the document stays next to the route list.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use utoipa::OpenApi;

use crate::api::rest::dto::{
    AgeRangeDto, BulkCreateResultDto, BulkUpsertResultDto, CreateUserReq, CursorPageDto,
    DeleteUserReq, MonthDto, PageInfoDto, PageMetaDto, PagedUsersDto, SearchResultDto, SkippedDto,
    StatsDto, StatsSummaryDto, UpdateUserReq,
};
use modkit::api::problem::{Problem, ValidationError};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Users API",
        version = "0.1.0",
        description = "User records with soft delete, bulk ingest, pagination, search and stats"
    ),
    components(schemas(
        CreateUserReq,
        UpdateUserReq,
        DeleteUserReq,
        BulkCreateResultDto,
        SkippedDto,
        BulkUpsertResultDto,
        PagedUsersDto,
        PageMetaDto,
        CursorPageDto,
        PageInfoDto,
        SearchResultDto,
        StatsDto,
        StatsSummaryDto,
        AgeRangeDto,
        MonthDto,
        Problem,
        ValidationError,
    )),
    tags((name = "users", description = "User management"))
)]
pub struct UsersApiDoc;

#[derive(Clone, Copy)]
enum Body {
    Schema(&'static str),
    ArrayOf(&'static str),
    /// A projected user document; its keys depend on `fields`.
    Document,
    DocumentList,
}

struct Param {
    name: &'static str,
    location: &'static str,
    description: &'static str,
}

const fn query(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        location: "query",
        description,
    }
}

const ID: Param = Param {
    name: "id",
    location: "path",
    description: "User id (UUID)",
};

const FIELDS: Param = query("fields", "`basic`, `admin`, or a comma-separated field list");

struct OperationSpec {
    method: &'static str,
    path: &'static str,
    operation_id: &'static str,
    summary: &'static str,
    params: &'static [Param],
    request: Option<(Body, bool)>,
    success: (u16, Body),
    problems: &'static [u16],
}

const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        method: "post",
        path: "/users",
        operation_id: "users.create",
        summary: "Create a user",
        params: &[],
        request: Some((Body::Schema("CreateUserReq"), true)),
        success: (201, Body::Document),
        problems: &[400, 409, 500],
    },
    OperationSpec {
        method: "get",
        path: "/users",
        operation_id: "users.list",
        summary: "List users; any of page, pageSize, sortBy, sortOrder switches to a paginated page",
        params: &[
            query("includeDeleted", "Include soft-deleted users"),
            query("ageIn", "Comma-separated ages to include"),
            query("ageNin", "Comma-separated ages to exclude"),
            query("nameRegex", "Case-insensitive name pattern"),
            query("hasPhone", "Only users with (true) or without (false) a phone"),
            FIELDS,
            query("page", "1-based page number"),
            query("pageSize", "Items per page"),
            query("sortBy", "name, email, age, createdAt or updatedAt"),
            query("sortOrder", "asc or desc"),
        ],
        request: None,
        success: (200, Body::Schema("PagedUsersDto")),
        problems: &[400, 500],
    },
    OperationSpec {
        method: "post",
        path: "/users/bulk",
        operation_id: "users.bulk_create",
        summary: "Insert many users, skipping duplicates",
        params: &[],
        request: Some((Body::ArrayOf("CreateUserReq"), true)),
        success: (201, Body::Schema("BulkCreateResultDto")),
        problems: &[400, 500],
    },
    OperationSpec {
        method: "post",
        path: "/users/bulk-upsert",
        operation_id: "users.bulk_upsert",
        summary: "Upsert many users keyed by case-insensitive email",
        params: &[],
        request: Some((Body::ArrayOf("CreateUserReq"), true)),
        success: (200, Body::Schema("BulkUpsertResultDto")),
        problems: &[400],
    },
    OperationSpec {
        method: "get",
        path: "/users/stats",
        operation_id: "users.stats",
        summary: "Summary, age-range and creation-month facets over active users",
        params: &[],
        request: None,
        success: (200, Body::Schema("StatsDto")),
        problems: &[500],
    },
    OperationSpec {
        method: "get",
        path: "/users/cursor",
        operation_id: "users.cursor",
        summary: "Forward cursor pagination over active users",
        params: &[
            query("after", "endCursor of the previous page"),
            query("limit", "Page size"),
        ],
        request: None,
        success: (200, Body::Schema("CursorPageDto")),
        problems: &[400, 500],
    },
    OperationSpec {
        method: "get",
        path: "/users/search",
        operation_id: "users.search",
        summary: "Full-text search over name and email",
        params: &[
            query("q", "Search terms (required)"),
            FIELDS,
            query("limit", "Maximum number of hits"),
        ],
        request: None,
        success: (200, Body::Schema("SearchResultDto")),
        problems: &[400, 500],
    },
    OperationSpec {
        method: "get",
        path: "/users/{id}",
        operation_id: "users.get",
        summary: "Fetch one user",
        params: &[
            ID,
            query("includeDeleted", "Also return a soft-deleted user"),
            FIELDS,
        ],
        request: None,
        success: (200, Body::Document),
        problems: &[400, 404, 500],
    },
    OperationSpec {
        method: "put",
        path: "/users/{id}",
        operation_id: "users.update",
        summary: "Patch name, email, age or phone of an active user",
        params: &[ID],
        request: Some((Body::Schema("UpdateUserReq"), true)),
        success: (200, Body::Document),
        problems: &[400, 404, 409, 500],
    },
    OperationSpec {
        method: "delete",
        path: "/users/{id}",
        operation_id: "users.delete",
        summary: "Soft-delete a user",
        params: &[ID],
        request: Some((Body::Schema("DeleteUserReq"), false)),
        success: (200, Body::Document),
        problems: &[400, 404, 409, 500],
    },
    OperationSpec {
        method: "post",
        path: "/users/{id}/restore",
        operation_id: "users.restore",
        summary: "Restore a soft-deleted user",
        params: &[ID],
        request: None,
        success: (200, Body::Document),
        problems: &[400, 404, 409, 500],
    },
];

fn schema_for(body: Body) -> Value {
    let schema_ref = |name: &str| json!({ "$ref": format!("#/components/schemas/{name}") });
    match body {
        Body::Schema(name) => schema_ref(name),
        Body::ArrayOf(name) => json!({ "type": "array", "items": schema_ref(name) }),
        Body::Document => json!({ "type": "object", "additionalProperties": true }),
        Body::DocumentList => json!({
            "type": "array",
            "items": { "type": "object", "additionalProperties": true }
        }),
    }
}

fn operation_json(op: &OperationSpec) -> Value {
    let mut operation = Map::new();
    operation.insert("operationId".into(), op.operation_id.into());
    operation.insert("summary".into(), op.summary.into());
    operation.insert("tags".into(), json!(["users"]));

    if !op.params.is_empty() {
        let params: Vec<Value> = op
            .params
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "in": p.location,
                    "required": p.location == "path",
                    "description": p.description,
                    "schema": { "type": "string" },
                })
            })
            .collect();
        operation.insert("parameters".into(), Value::Array(params));
    }

    if let Some((body, required)) = op.request {
        operation.insert(
            "requestBody".into(),
            json!({
                "required": required,
                "content": { "application/json": { "schema": schema_for(body) } }
            }),
        );
    }

    let mut responses = Map::new();
    let (status, body) = op.success;
    responses.insert(
        status.to_string(),
        json!({
            "description": "Success",
            "content": { "application/json": { "schema": schema_for(body) } }
        }),
    );
    // GET /users answers with a bare array when no paging parameter is given
    if op.operation_id == "users.list" {
        responses.insert(
            "default".into(),
            json!({
                "description": "Unpaginated list",
                "content": { "application/json": { "schema": schema_for(Body::DocumentList) } }
            }),
        );
    }
    for status in op.problems {
        responses.insert(
            status.to_string(),
            json!({
                "description": "Problem",
                "content": {
                    "application/problem+json": { "schema": schema_for(Body::Schema("Problem")) }
                }
            }),
        );
    }
    operation.insert("responses".into(), Value::Object(responses));
    Value::Object(operation)
}

fn health_path() -> Value {
    json!({
        "get": {
            "operationId": "health",
            "summary": "Liveness probe",
            "responses": { "200": { "description": "Healthy" } }
        }
    })
}

/// Full OpenAPI 3.1 document as JSON.
pub fn build_openapi() -> anyhow::Result<Value> {
    let mut doc = serde_json::to_value(UsersApiDoc::openapi())?;

    let mut paths: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for op in OPERATIONS {
        paths
            .entry(op.path.to_owned())
            .or_default()
            .insert(op.method.to_owned(), operation_json(op));
    }

    let mut paths: Map<String, Value> = paths
        .into_iter()
        .map(|(path, ops)| (path, Value::Object(ops)))
        .collect();
    paths.insert("/health".into(), health_path());

    let Some(root) = doc.as_object_mut() else {
        anyhow::bail!("OpenAPI document is not a JSON object");
    };
    root.insert("paths".into(), Value::Object(paths));
    tracing::debug!("Built OpenAPI document with {} operations", OPERATIONS.len());
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = build_openapi().unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/users",
            "/users/bulk",
            "/users/bulk-upsert",
            "/users/stats",
            "/users/cursor",
            "/users/search",
            "/users/{id}",
            "/users/{id}/restore",
            "/health",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        let item = &paths["/users/{id}"];
        assert!(item.get("get").is_some());
        assert!(item.get("put").is_some());
        assert!(item.get("delete").is_some());
    }

    #[test]
    fn schemas_are_registered() {
        let doc = build_openapi().unwrap();
        let schemas = doc["components"]["schemas"].as_object().unwrap();
        assert!(schemas.contains_key("Problem"));
        assert!(schemas.contains_key("StatsDto"));
        assert!(schemas.contains_key("CreateUserReq"));
        assert_eq!(doc["info"]["title"], "Users API");
    }

    #[test]
    fn problem_responses_use_problem_json() {
        let doc = build_openapi().unwrap();
        let resp = &doc["paths"]["/users/search"]["get"]["responses"]["400"];
        assert!(resp["content"]["application/problem+json"].is_object());
    }
}
