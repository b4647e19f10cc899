use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Pure user model (no serde); REST renders it through a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// UUID v7, so ascending id order is creation order.
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Lowercase of `email`; the uniqueness key.
    pub email_lower: String,
    pub age: Option<i32>,
    pub phone: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub delete_reason: Option<String>,
    /// Internal write counter, never exposed.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Data for creating a new user (also the bulk create/upsert item).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub phone: Option<String>,
}

/// Partial update data for a user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub phone: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.age.is_none() && self.phone.is_none()
    }
}

/// Audit stamp recorded on soft delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteAudit {
    pub deleted_by: Option<String>,
    pub reason: Option<String>,
}

/// Outcome of a bulk upsert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkUpsertResult {
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
    pub errors: Vec<String>,
}

/// A bulk-create item that was not inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Position in the request batch.
    pub index: usize,
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BulkCreateResult {
    pub inserted: usize,
    pub items: Vec<User>,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUser {
    pub user: User,
    /// Store relevance, higher is better.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub end_cursor: Option<Uuid>,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsSummary {
    pub total: u64,
    pub avg_age: Option<f64>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeRangeBucket {
    /// "0-18", "18-25", ... or "other" for ages outside `[0,120)` and missing ages.
    pub range: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBucket {
    /// "YYYY-MM"
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub summary: StatsSummary,
    pub by_age_range: Vec<AgeRangeBucket>,
    pub by_created_month: Vec<MonthBucket>,
}
