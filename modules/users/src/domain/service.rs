use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::UsersConfig;
use crate::contract::model::{
    BulkCreateResult, BulkUpsertResult, CursorPage, DeleteAudit, NewUser, Page, SkippedRecord,
    User, UserPatch, UserStats,
};
use crate::domain::error::DomainError;
use crate::domain::query::{
    clamp_limit, Document, FieldSelection, FilterBuilder, ListParams, PageRequest, Projection,
    SortSpec, UserFilter,
};
use crate::domain::repo::{RepoError, Transition, UsersRepository};

/// Synthetic field carrying the relevance score in search results.
pub const SCORE_FIELD: &str = "score";

/// Domain service with business rules for user management.
/// Depends only on the repository port, not on infra types.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn UsersRepository>,
    config: UsersConfig,
}

fn db_err(e: anyhow::Error) -> DomainError {
    DomainError::database(format!("{e:#}"))
}

fn repo_err(e: RepoError, email: &str) -> DomainError {
    match e {
        RepoError::Duplicate(_) => DomainError::email_already_exists(email),
        RepoError::Other(e) => db_err(e),
    }
}

impl Service {
    pub fn new(repo: Arc<dyn UsersRepository>, config: UsersConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &UsersConfig {
        &self.config
    }

    #[instrument(name = "users.service.create", skip(self, new_user), fields(email = %new_user.email))]
    pub async fn create(&self, new_user: NewUser) -> Result<User, DomainError> {
        info!("Creating new user");
        let new_user = self.normalize_new_user(new_user)?;
        let email_lower = new_user.email.to_lowercase();

        if self
            .repo
            .email_lower_exists(&email_lower, None)
            .await
            .map_err(db_err)?
        {
            return Err(DomainError::email_already_exists(new_user.email));
        }

        let email = new_user.email.clone();
        let user = self
            .repo
            .insert(new_user)
            .await
            .map_err(|e| repo_err(e, &email))?;

        info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    /// Inserts each record independently; duplicates and invalid records are
    /// reported as skipped instead of failing the batch.
    #[instrument(name = "users.service.bulk_create", skip(self, records), fields(count = records.len()))]
    pub async fn bulk_create(&self, records: Vec<NewUser>) -> Result<BulkCreateResult, DomainError> {
        self.check_batch_size(records.len())?;

        let mut result = BulkCreateResult::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, record) in records.into_iter().enumerate() {
            let raw_email = record.email.clone();
            let skip = |reason: String| SkippedRecord {
                index,
                email: raw_email.clone(),
                reason,
            };

            let record = match self.normalize_new_user(record) {
                Ok(r) => r,
                Err(e) => {
                    result.skipped.push(skip(e.to_string()));
                    continue;
                }
            };
            let email_lower = record.email.to_lowercase();
            if !seen.insert(email_lower.clone()) {
                result.skipped.push(skip("duplicate email in batch".into()));
                continue;
            }

            match self.repo.insert(record).await {
                Ok(user) => result.items.push(user),
                Err(RepoError::Duplicate(_)) => {
                    result.skipped.push(skip("email already exists".into()))
                }
                Err(RepoError::Other(e)) => return Err(db_err(e)),
            }
        }

        result.inserted = result.items.len();
        info!(
            inserted = result.inserted,
            skipped = result.skipped.len(),
            "Bulk create finished"
        );
        Ok(result)
    }

    /// Last occurrence of each normalized email wins. A store failure is
    /// reported in `errors` with all counters zeroed.
    #[instrument(name = "users.service.bulk_upsert", skip(self, records), fields(count = records.len()))]
    pub async fn bulk_upsert(&self, records: Vec<NewUser>) -> Result<BulkUpsertResult, DomainError> {
        self.check_batch_size(records.len())?;

        let normalized = records
            .into_iter()
            .map(|r| self.normalize_new_user(r))
            .collect::<Result<Vec<_>, _>>()?;
        let batch = dedup_last_wins(normalized);
        if batch.is_empty() {
            return Ok(BulkUpsertResult::default());
        }

        debug!(unique = batch.len(), "Upserting deduplicated batch");
        match self.repo.bulk_upsert(batch).await {
            Ok(counts) => Ok(BulkUpsertResult {
                matched: counts.matched,
                modified: counts.modified,
                upserted: counts.upserted,
                errors: Vec::new(),
            }),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Bulk upsert batch failed");
                Ok(BulkUpsertResult {
                    errors: vec![format!("{e:#}")],
                    ..Default::default()
                })
            }
        }
    }

    /// Plain filtered list, newest first, capped at `max_list_size`.
    #[instrument(name = "users.service.find_all", skip(self))]
    pub async fn find_all(
        &self,
        params: &ListParams,
        fields: &FieldSelection,
    ) -> Result<Vec<Document>, DomainError> {
        let filter = FilterBuilder::from_params(params)?;
        let projection = Projection::resolve(fields)?;
        let users = self
            .repo
            .find_many(&filter, &SortSpec::default(), 0, self.config.max_list_size)
            .await
            .map_err(db_err)?;
        debug!(count = users.len(), "Listed users");
        Ok(users.iter().map(|u| projection.project(u)).collect())
    }

    /// Offset pagination; the page fetch and the count run concurrently.
    #[instrument(name = "users.service.paginate", skip(self))]
    pub async fn paginate(
        &self,
        params: &ListParams,
        fields: &FieldSelection,
        sort: SortSpec,
        page: PageRequest,
    ) -> Result<Page<Document>, DomainError> {
        let filter = FilterBuilder::from_params(params)?;
        let projection = Projection::resolve(fields)?;

        let (users, total) = tokio::try_join!(
            self.repo
                .find_many(&filter, &sort, page.skip(), page.page_size),
            self.repo.count(&filter),
        )
        .map_err(db_err)?;

        Ok(Page {
            items: users.iter().map(|u| projection.project(u)).collect(),
            meta: page.meta(total),
        })
    }

    /// Forward-only pagination over active records in ascending id order.
    #[instrument(name = "users.service.find_with_cursor", skip(self))]
    pub async fn find_with_cursor(
        &self,
        after: Option<&str>,
        limit: Option<i64>,
    ) -> Result<CursorPage<Document>, DomainError> {
        let after = after
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|raw| Uuid::parse_str(raw).map_err(|_| DomainError::invalid_cursor(raw)))
            .transpose()?;
        let limit = clamp_limit(
            limit,
            self.config.cursor_default_limit,
            self.config.cursor_max_limit,
        );

        let filter = FilterBuilder::new()
            .include_deleted(false)
            .id_after(after)
            .build();
        let mut users = self
            .repo
            .find_by_id_asc(&filter, limit + 1)
            .await
            .map_err(db_err)?;

        let has_next_page = users.len() as u64 > limit;
        users.truncate(limit as usize);

        let projection = Projection::basic();
        Ok(CursorPage {
            end_cursor: users.last().map(|u| u.id),
            has_next_page,
            items: users.iter().map(|u| projection.project(u)).collect(),
        })
    }

    #[instrument(name = "users.service.text_search", skip(self))]
    pub async fn text_search(
        &self,
        q: &str,
        fields: &FieldSelection,
        limit: Option<i64>,
    ) -> Result<Vec<Document>, DomainError> {
        let q = q.trim();
        if q.is_empty() {
            return Err(DomainError::EmptySearchQuery);
        }
        let projection = Projection::resolve(fields)?;
        let limit = clamp_limit(
            limit,
            self.config.search_default_limit,
            self.config.search_max_limit,
        );

        if !self.repo.text_index_exists().await.map_err(db_err)? {
            warn!("Text search requested before the text index was provisioned");
            return Err(DomainError::TextIndexMissing);
        }

        let hits = self.repo.text_search(q, limit).await.map_err(db_err)?;
        debug!(hits = hits.len(), "Text search finished");
        Ok(hits
            .iter()
            .map(|hit| {
                let mut doc = projection.project(&hit.user);
                doc.insert(SCORE_FIELD.to_owned(), serde_json::Value::from(hit.score));
                doc
            })
            .collect())
    }

    #[instrument(name = "users.service.find_one", skip(self), fields(user_id = %id))]
    pub async fn find_one(
        &self,
        id: Uuid,
        include_deleted: bool,
        fields: &FieldSelection,
    ) -> Result<Document, DomainError> {
        let projection = Projection::resolve(fields)?;
        let user = self.get_user(id, include_deleted).await?;
        Ok(projection.project(&user))
    }

    /// Loads one user; deleted users are invisible unless `include_deleted`.
    pub async fn get_user(&self, id: Uuid, include_deleted: bool) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(db_err)?
            .filter(|u| include_deleted || u.is_active())
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    #[instrument(name = "users.service.update", skip(self, patch), fields(user_id = %id))]
    pub async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, DomainError> {
        info!("Updating user");
        let patch = self.normalize_patch(patch)?;

        if let Some(email) = &patch.email {
            if self
                .repo
                .email_lower_exists(&email.to_lowercase(), Some(id))
                .await
                .map_err(db_err)?
            {
                return Err(DomainError::email_already_exists(email.clone()));
            }
        }

        let email = patch.email.clone().unwrap_or_default();
        match self
            .repo
            .update_active(id, patch)
            .await
            .map_err(|e| repo_err(e, &email))?
        {
            Transition::Applied(user) => Ok(user),
            Transition::NotFound | Transition::WrongState => Err(DomainError::user_not_found(id)),
        }
    }

    #[instrument(name = "users.service.soft_delete", skip(self, audit), fields(user_id = %id))]
    pub async fn soft_delete(&self, id: Uuid, audit: DeleteAudit) -> Result<User, DomainError> {
        info!("Soft-deleting user");
        let audit = DeleteAudit {
            deleted_by: non_blank(audit.deleted_by),
            reason: non_blank(audit.reason),
        };
        match self.repo.soft_delete(id, audit).await.map_err(db_err)? {
            Transition::Applied(user) => Ok(user),
            Transition::NotFound => Err(DomainError::user_not_found(id)),
            Transition::WrongState => Err(DomainError::already_deleted(id)),
        }
    }

    #[instrument(name = "users.service.restore", skip(self), fields(user_id = %id))]
    pub async fn restore(&self, id: Uuid) -> Result<User, DomainError> {
        info!("Restoring user");
        match self.repo.restore(id).await.map_err(db_err)? {
            Transition::Applied(user) => Ok(user),
            Transition::NotFound => Err(DomainError::user_not_found(id)),
            Transition::WrongState => Err(DomainError::not_deleted(id)),
        }
    }

    #[instrument(name = "users.service.stats", skip(self))]
    pub async fn stats(&self) -> Result<UserStats, DomainError> {
        self.repo.stats().await.map_err(db_err)
    }

    fn check_batch_size(&self, len: usize) -> Result<(), DomainError> {
        if len > self.config.max_bulk_size {
            return Err(DomainError::validation(
                "records",
                format!("at most {} records per batch", self.config.max_bulk_size),
            ));
        }
        Ok(())
    }

    fn normalize_new_user(&self, u: NewUser) -> Result<NewUser, DomainError> {
        let name = self.validate_name(&u.name)?;
        let email = validate_email(&u.email)?;
        Ok(NewUser {
            name,
            email,
            age: u.age,
            phone: non_blank(u.phone),
        })
    }

    fn normalize_patch(&self, p: UserPatch) -> Result<UserPatch, DomainError> {
        if p.is_empty() {
            return Err(DomainError::validation("body", "no fields to update"));
        }
        Ok(UserPatch {
            name: p.name.map(|n| self.validate_name(&n)).transpose()?,
            email: p.email.map(|e| validate_email(&e)).transpose()?,
            age: p.age,
            phone: non_blank(p.phone),
        })
    }

    fn validate_name(&self, raw: &str) -> Result<String, DomainError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        let len = name.chars().count();
        if len > self.config.max_name_length {
            return Err(DomainError::name_too_long(len, self.config.max_name_length));
        }
        Ok(name.to_owned())
    }
}

fn validate_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::invalid_email(email));
    }
    Ok(email.to_owned())
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Keep the last record per normalized email, in order of last appearance.
fn dedup_last_wins(records: Vec<NewUser>) -> Vec<NewUser> {
    let mut last: HashMap<String, usize> = HashMap::new();
    for (i, r) in records.iter().enumerate() {
        last.insert(r.email.to_lowercase(), i);
    }
    records
        .into_iter()
        .enumerate()
        .filter(|(i, r)| last.get(&r.email.to_lowercase()) == Some(i))
        .map(|(_, r)| r)
        .collect()
}
