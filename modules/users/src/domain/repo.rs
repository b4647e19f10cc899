use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::contract::model::{DeleteAudit, NewUser, ScoredUser, User, UserPatch, UserStats};
use crate::domain::query::{SortSpec, UserFilter};

/// Storage failures the service reacts to; everything else is opaque.
#[derive(Error, Debug)]
pub enum RepoError {
    /// Unique `email_lower` violated.
    #[error("duplicate email: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result of a conditional state change (soft delete / restore / update).
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(User),
    NotFound,
    /// The record exists but is not in the required state.
    WrongState,
}

/// Raw counters reported by the store for a bulk upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertCounts {
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
}

/// Port for the domain layer: persistence operations the service needs.
/// Object-safe for use as `Arc<dyn UsersRepository>`.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Load a user by id, regardless of deletion state.
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Whether a user with this normalized email exists (optionally ignoring one id).
    async fn email_lower_exists(
        &self,
        email_lower: &str,
        exclude: Option<Uuid>,
    ) -> anyhow::Result<bool>;

    /// Insert a normalized record; the store assigns id and timestamps.
    async fn insert(&self, new_user: NewUser) -> Result<User, RepoError>;

    /// Patch an active record. Deleted or missing records yield `NotFound`.
    async fn update_active(&self, id: Uuid, patch: UserPatch) -> Result<Transition, RepoError>;

    /// Active → Deleted with an audit stamp.
    async fn soft_delete(&self, id: Uuid, audit: DeleteAudit) -> anyhow::Result<Transition>;

    /// Deleted → Active, clearing the audit stamp.
    async fn restore(&self, id: Uuid) -> anyhow::Result<Transition>;

    /// Filtered, sorted window (`skip`/`limit`).
    async fn find_many(
        &self,
        filter: &UserFilter,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<User>>;

    async fn count(&self, filter: &UserFilter) -> anyhow::Result<u64>;

    /// Ascending-id scan for cursor pagination.
    async fn find_by_id_asc(&self, filter: &UserFilter, limit: u64) -> anyhow::Result<Vec<User>>;

    async fn text_index_exists(&self) -> anyhow::Result<bool>;

    /// Relevance-ranked full-text match over active records, best first.
    async fn text_search(&self, query: &str, limit: u64) -> anyhow::Result<Vec<ScoredUser>>;

    /// Upsert keyed by normalized email as one store-level batch.
    /// Input is already normalized and deduplicated.
    async fn bulk_upsert(&self, records: Vec<NewUser>) -> anyhow::Result<UpsertCounts>;

    async fn stats(&self) -> anyhow::Result<UserStats>;
}
