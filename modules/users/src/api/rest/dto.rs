use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::UsersConfig;
use crate::contract::model::{
    BulkCreateResult, BulkUpsertResult, CursorPage, DeleteAudit, NewUser, Page, PageMeta,
    SkippedRecord, UserPatch, UserStats,
};
use crate::domain::error::DomainError;
use crate::domain::query::{Document, FieldSelection, ListParams, PageRequest, Projection, SortSpec};

/// REST DTO for creating a user (also a bulk item)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserReq {
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub phone: Option<String>,
}

/// REST DTO for updating a user (partial)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub phone: Option<String>,
}

/// Optional audit body for DELETE /users/{id}
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserReq {
    pub deleted_by: Option<String>,
    pub delete_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertResultDto {
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDto {
    pub index: usize,
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateResultDto {
    pub inserted: usize,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Document>,
    pub skipped: Vec<SkippedDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMetaDto {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PagedUsersDto {
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Document>,
    pub meta: PageMetaDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfoDto {
    pub end_cursor: Option<Uuid>,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CursorPageDto {
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Document>,
    pub page_info: PageInfoDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResultDto {
    /// Projected users plus a `score` field, best match first.
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummaryDto {
    pub total: u64,
    pub avg_age: Option<f64>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgeRangeDto {
    pub range: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonthDto {
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub summary: StatsSummaryDto,
    pub by_age_range: Vec<AgeRangeDto>,
    pub by_created_month: Vec<MonthDto>,
}

/// Query string of GET /users. Everything arrives as text and is coerced
/// here so bad input becomes a problem response instead of a bare rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub include_deleted: Option<String>,
    pub age_in: Option<String>,
    pub age_nin: Option<String>,
    pub name_regex: Option<String>,
    pub has_phone: Option<String>,
    pub fields: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListUsersQuery {
    /// Any paging or sorting parameter switches to the paginated response.
    pub fn wants_pagination(&self) -> bool {
        self.page.is_some()
            || self.page_size.is_some()
            || self.sort_by.is_some()
            || self.sort_order.is_some()
    }

    pub fn list_params(&self) -> Result<ListParams, DomainError> {
        Ok(ListParams {
            include_deleted: parse_bool("includeDeleted", self.include_deleted.as_deref())?
                .unwrap_or(false),
            age_in: parse_int_list("ageIn", self.age_in.as_deref())?,
            age_nin: parse_int_list("ageNin", self.age_nin.as_deref())?,
            name_regex: self.name_regex.clone().filter(|s| !s.is_empty()),
            has_phone: parse_bool("hasPhone", self.has_phone.as_deref())?,
        })
    }

    pub fn fields(&self) -> FieldSelection {
        FieldSelection::parse(self.fields.as_deref())
    }

    pub fn sort(&self) -> Result<SortSpec, DomainError> {
        SortSpec::parse(
            non_empty(self.sort_by.as_deref()),
            non_empty(self.sort_order.as_deref()),
        )
    }

    pub fn page_request(&self, cfg: &UsersConfig) -> Result<PageRequest, DomainError> {
        PageRequest::new(
            parse_int("page", self.page.as_deref())?,
            parse_int("pageSize", self.page_size.as_deref())?,
            cfg.default_page_size,
            cfg.max_page_size,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOneQuery {
    pub include_deleted: Option<String>,
    pub fields: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CursorQuery {
    pub after: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub fields: Option<String>,
    pub limit: Option<String>,
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_bool(field: &str, raw: Option<&str>) -> Result<Option<bool>, DomainError> {
    match non_empty(raw).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("true" | "1") => Ok(Some(true)),
        Some("false" | "0") => Ok(Some(false)),
        Some(other) => Err(DomainError::validation(
            field,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

pub fn parse_int(field: &str, raw: Option<&str>) -> Result<Option<i64>, DomainError> {
    non_empty(raw)
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| DomainError::validation(field, format!("expected an integer, got '{s}'")))
        })
        .transpose()
}

/// Comma-separated integers, e.g. `ageIn=20,30`.
pub fn parse_int_list(field: &str, raw: Option<&str>) -> Result<Option<Vec<i32>>, DomainError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .map_err(|_| DomainError::validation(field, format!("expected integers, got '{s}'")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

pub fn parse_id(raw: &str) -> Result<Uuid, DomainError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| DomainError::validation("id", format!("'{raw}' is not a valid id")))
}

// Conversion implementations between REST DTOs and contract models

impl From<CreateUserReq> for NewUser {
    fn from(req: CreateUserReq) -> Self {
        Self {
            name: req.name,
            email: req.email,
            age: req.age,
            phone: req.phone,
        }
    }
}

impl From<UpdateUserReq> for UserPatch {
    fn from(req: UpdateUserReq) -> Self {
        Self {
            name: req.name,
            email: req.email,
            age: req.age,
            phone: req.phone,
        }
    }
}

impl From<DeleteUserReq> for DeleteAudit {
    fn from(req: DeleteUserReq) -> Self {
        Self {
            deleted_by: req.deleted_by,
            reason: req.delete_reason,
        }
    }
}

impl From<BulkUpsertResult> for BulkUpsertResultDto {
    fn from(r: BulkUpsertResult) -> Self {
        Self {
            matched: r.matched,
            modified: r.modified,
            upserted: r.upserted,
            errors: r.errors,
        }
    }
}

impl From<SkippedRecord> for SkippedDto {
    fn from(s: SkippedRecord) -> Self {
        Self {
            index: s.index,
            email: s.email,
            reason: s.reason,
        }
    }
}

impl BulkCreateResultDto {
    pub fn render(r: BulkCreateResult, projection: &Projection) -> Self {
        Self {
            inserted: r.inserted,
            items: r.items.iter().map(|u| projection.project(u)).collect(),
            skipped: r.skipped.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<PageMeta> for PageMetaDto {
    fn from(m: PageMeta) -> Self {
        Self {
            total: m.total,
            page: m.page,
            page_size: m.page_size,
            total_pages: m.total_pages,
        }
    }
}

impl From<Page<Document>> for PagedUsersDto {
    fn from(p: Page<Document>) -> Self {
        Self {
            items: p.items,
            meta: p.meta.into(),
        }
    }
}

impl From<CursorPage<Document>> for CursorPageDto {
    fn from(p: CursorPage<Document>) -> Self {
        Self {
            items: p.items,
            page_info: PageInfoDto {
                end_cursor: p.end_cursor,
                has_next_page: p.has_next_page,
            },
        }
    }
}

impl From<UserStats> for StatsDto {
    fn from(s: UserStats) -> Self {
        Self {
            summary: StatsSummaryDto {
                total: s.summary.total,
                avg_age: s.summary.avg_age,
                min_age: s.summary.min_age,
                max_age: s.summary.max_age,
            },
            by_age_range: s
                .by_age_range
                .into_iter()
                .map(|b| AgeRangeDto {
                    range: b.range,
                    count: b.count,
                })
                .collect(),
            by_created_month: s
                .by_created_month
                .into_iter()
                .map(|b| MonthDto {
                    month: b.month,
                    count: b.count,
                })
                .collect(),
        }
    }
}

/// Wraps a document list for responses that need a JSON value.
pub fn documents(items: Vec<Document>) -> Value {
    Value::Array(items.into_iter().map(Value::Object).collect())
}
