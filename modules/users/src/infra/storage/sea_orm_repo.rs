//! SeaORM-backed repository implementation for the domain port.
//!
//! Generic over the connection, so it can run on a `DatabaseConnection` or
//! inside a transaction. Filters, sorting, relevance and aggregation are all
//! executed by SQLite; nothing is post-filtered in memory.

use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbBackend, DbErr, EntityTrait, FromQueryResult,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use crate::contract::model::{
    AgeRangeBucket, DeleteAudit, MonthBucket, NewUser, ScoredUser, StatsSummary, User, UserPatch,
    UserStats,
};
use crate::domain::query::{FilterClause, SortField, SortOrder, SortSpec, UserFilter};
use crate::domain::repo::{RepoError, Transition, UpsertCounts, UsersRepository};
use crate::infra::storage::entity::{Column, Entity as UserEntity, Model};
use crate::infra::storage::indexes::TEXT_INDEX_TABLE;
use crate::infra::storage::mapper::new_active_model;

/// Age histogram labels in display order; `other` catches everything outside `[0,120)`.
pub const AGE_RANGES: [&str; 6] = ["0-18", "18-25", "25-35", "35-50", "50-120", "other"];

const SEARCH_SQL: &str = r#"
SELECT u.id, u.name, u.email, u.email_lower, u.age, u.phone, u.is_deleted,
       u.deleted_at, u.deleted_by, u.delete_reason, u.version, u.created_at, u.updated_at,
       -bm25(users_fts, 3.0, 1.0) AS score
FROM users_fts
JOIN users u ON u.seq = users_fts.rowid
WHERE users_fts MATCH ? AND u.is_deleted = 0
ORDER BY score DESC
LIMIT ?
"#;

const STATS_SQL: &str = r#"
WITH active AS (
    SELECT age, created_at FROM users WHERE is_deleted = 0
)
SELECT 'summary' AS facet, NULL AS label, COUNT(*) AS cnt,
       AVG(age) AS avg_age, MIN(age) AS min_age, MAX(age) AS max_age
FROM active
UNION ALL
SELECT 'age_range' AS facet,
       CASE
           WHEN age >= 0  AND age < 18  THEN '0-18'
           WHEN age >= 18 AND age < 25  THEN '18-25'
           WHEN age >= 25 AND age < 35  THEN '25-35'
           WHEN age >= 35 AND age < 50  THEN '35-50'
           WHEN age >= 50 AND age < 120 THEN '50-120'
           ELSE 'other'
       END AS label,
       COUNT(*) AS cnt, NULL, NULL, NULL
FROM active
GROUP BY label
UNION ALL
SELECT 'created_month' AS facet, substr(created_at, 1, 7) AS label,
       COUNT(*) AS cnt, NULL, NULL, NULL
FROM active
GROUP BY label
"#;

/// SeaORM repository impl.
/// Holds a connection object; its lifetime/ownership is up to the caller.
pub struct SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn write_err(e: DbErr, what: &'static str) -> RepoError {
    if is_unique_violation(&e) {
        RepoError::Duplicate(e.to_string())
    } else {
        RepoError::Other(anyhow::Error::new(e).context(what))
    }
}

fn clause_condition(clause: &FilterClause) -> Condition {
    let cond = Condition::all();
    match clause {
        FilterClause::NotDeleted => cond.add(Column::IsDeleted.eq(false)),
        FilterClause::AgeIn(ages) => cond.add(Column::Age.is_in(ages.clone())),
        // a record without an age is "not in" any set
        FilterClause::AgeNotIn(ages) => cond.add(
            Condition::any()
                .add(Column::Age.is_null())
                .add(Column::Age.is_not_in(ages.clone())),
        ),
        FilterClause::NameMatches(p) => cond.add(Expr::cust_with_values(
            r#""name" REGEXP ?"#,
            [p.case_insensitive()],
        )),
        FilterClause::HasPhone(true) => cond.add(Column::Phone.is_not_null()),
        FilterClause::HasPhone(false) => cond.add(Column::Phone.is_null()),
        FilterClause::IdAfter(id) => cond.add(Column::Id.gt(*id)),
    }
}

/// Conjunction of every clause; an empty filter matches everything.
pub fn filter_condition(filter: &UserFilter) -> Condition {
    filter
        .clauses()
        .iter()
        .fold(Condition::all(), |acc, c| acc.add(clause_condition(c)))
}

fn sort_column(field: SortField) -> Column {
    match field {
        SortField::Name => Column::Name,
        SortField::Email => Column::Email,
        SortField::Age => Column::Age,
        SortField::CreatedAt => Column::CreatedAt,
        SortField::UpdatedAt => Column::UpdatedAt,
    }
}

fn sort_order(order: SortOrder) -> Order {
    match order {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    }
}

fn bump_version() -> SimpleExpr {
    Expr::col(Column::Version).add(1)
}

/// Quote each whitespace-separated term and OR them, so user input never
/// reaches the FTS5 query grammar.
pub fn fts_query(q: &str) -> String {
    q.split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

impl<C> SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    /// Re-read after a conditional update that touched nothing.
    async fn classify_miss(&self, id: Uuid) -> anyhow::Result<Transition> {
        let exists = UserEntity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("find_by_id failed")?
            .is_some();
        Ok(if exists {
            Transition::WrongState
        } else {
            Transition::NotFound
        })
    }

    async fn reload(&self, id: Uuid) -> anyhow::Result<Transition> {
        let found = UserEntity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("reload failed")?;
        Ok(found.map_or(Transition::NotFound, |m| Transition::Applied(m.into())))
    }
}

#[async_trait::async_trait]
impl<C> UsersRepository for SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync + 'static,
{
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let found = UserEntity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("find_by_id failed")?;
        Ok(found.map(Into::into))
    }

    async fn email_lower_exists(
        &self,
        email_lower: &str,
        exclude: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        let mut query = UserEntity::find().filter(Column::EmailLower.eq(email_lower));
        if let Some(id) = exclude {
            query = query.filter(Column::Id.ne(id));
        }
        let count = query
            .count(&self.conn)
            .await
            .context("email_lower_exists failed")?;
        Ok(count > 0)
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, RepoError> {
        let am = new_active_model(new_user, Uuid::now_v7(), Utc::now());
        let model = sea_orm::ActiveModelTrait::insert(am, &self.conn)
            .await
            .map_err(|e| write_err(e, "insert failed"))?;
        Ok(model.into())
    }

    async fn update_active(&self, id: Uuid, patch: UserPatch) -> Result<Transition, RepoError> {
        let mut update = UserEntity::update_many()
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .col_expr(Column::Version, bump_version());
        if let Some(name) = patch.name {
            update = update.col_expr(Column::Name, Expr::value(name));
        }
        if let Some(email) = patch.email {
            update = update
                .col_expr(Column::EmailLower, Expr::value(email.to_lowercase()))
                .col_expr(Column::Email, Expr::value(email));
        }
        if let Some(age) = patch.age {
            update = update.col_expr(Column::Age, Expr::value(age));
        }
        if let Some(phone) = patch.phone {
            update = update.col_expr(Column::Phone, Expr::value(phone));
        }

        let res = update
            .filter(Column::Id.eq(id))
            .filter(Column::IsDeleted.eq(false))
            .exec(&self.conn)
            .await
            .map_err(|e| write_err(e, "update failed"))?;

        if res.rows_affected == 0 {
            return Ok(self.classify_miss(id).await?);
        }
        Ok(self.reload(id).await?)
    }

    async fn soft_delete(&self, id: Uuid, audit: DeleteAudit) -> anyhow::Result<Transition> {
        let now = Utc::now();
        let res = UserEntity::update_many()
            .col_expr(Column::IsDeleted, Expr::value(true))
            .col_expr(Column::DeletedAt, Expr::value(now))
            .col_expr(Column::DeletedBy, Expr::value(audit.deleted_by))
            .col_expr(Column::DeleteReason, Expr::value(audit.reason))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .col_expr(Column::Version, bump_version())
            .filter(Column::Id.eq(id))
            .filter(Column::IsDeleted.eq(false))
            .exec(&self.conn)
            .await
            .context("soft_delete failed")?;

        if res.rows_affected == 0 {
            return self.classify_miss(id).await;
        }
        self.reload(id).await
    }

    async fn restore(&self, id: Uuid) -> anyhow::Result<Transition> {
        let res = UserEntity::update_many()
            .col_expr(Column::IsDeleted, Expr::value(false))
            .col_expr(Column::DeletedAt, Expr::value(Option::<chrono::DateTime<Utc>>::None))
            .col_expr(Column::DeletedBy, Expr::value(Option::<String>::None))
            .col_expr(Column::DeleteReason, Expr::value(Option::<String>::None))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .col_expr(Column::Version, bump_version())
            .filter(Column::Id.eq(id))
            .filter(Column::IsDeleted.eq(true))
            .exec(&self.conn)
            .await
            .context("restore failed")?;

        if res.rows_affected == 0 {
            return self.classify_miss(id).await;
        }
        self.reload(id).await
    }

    async fn find_many(
        &self,
        filter: &UserFilter,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<User>> {
        let order = sort_order(sort.order);
        let rows = UserEntity::find()
            .filter(filter_condition(filter))
            .order_by(sort_column(sort.field), order.clone())
            .order_by(Column::Id, order)
            .offset(skip)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("find_many failed")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self, filter: &UserFilter) -> anyhow::Result<u64> {
        UserEntity::find()
            .filter(filter_condition(filter))
            .count(&self.conn)
            .await
            .context("count failed")
    }

    async fn find_by_id_asc(&self, filter: &UserFilter, limit: u64) -> anyhow::Result<Vec<User>> {
        let rows = UserEntity::find()
            .filter(filter_condition(filter))
            .order_by_asc(Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("find_by_id_asc failed")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn text_index_exists(&self) -> anyhow::Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
            [TEXT_INDEX_TABLE.into()],
        );
        let row = self
            .conn
            .query_one(stmt)
            .await
            .context("text index lookup failed")?;
        let n: i64 = match row {
            Some(r) => r.try_get("", "n").context("text index lookup: bad row")?,
            None => 0,
        };
        Ok(n > 0)
    }

    async fn text_search(&self, query: &str, limit: u64) -> anyhow::Result<Vec<ScoredUser>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Sqlite,
            SEARCH_SQL,
            [fts_query(query).into(), (limit as i64).into()],
        );
        let rows = self
            .conn
            .query_all(stmt)
            .await
            .context("text_search failed")?;

        rows.iter()
            .map(|row| {
                let model = Model::from_query_result(row, "").context("text_search: bad row")?;
                let score: f64 = row.try_get("", "score").context("text_search: bad score")?;
                Ok(ScoredUser {
                    user: model.into(),
                    score,
                })
            })
            .collect()
    }

    async fn bulk_upsert(&self, records: Vec<NewUser>) -> anyhow::Result<UpsertCounts> {
        if records.is_empty() {
            return Ok(UpsertCounts::default());
        }

        let txn = self
            .conn
            .begin()
            .await
            .context("bulk_upsert: begin failed")?;

        let keys: Vec<String> = records.iter().map(|r| r.email.to_lowercase()).collect();
        let existing: HashMap<String, Model> = UserEntity::find()
            .filter(Column::EmailLower.is_in(keys))
            .all(&txn)
            .await
            .context("bulk_upsert: lookup failed")?
            .into_iter()
            .map(|m| (m.email_lower.clone(), m))
            .collect();

        let mut counts = UpsertCounts::default();
        for r in &records {
            match existing.get(&r.email.to_lowercase()) {
                Some(m) => {
                    counts.matched += 1;
                    if m.name != r.name || m.email != r.email || m.age != r.age {
                        counts.modified += 1;
                    }
                }
                None => counts.upserted += 1,
            }
        }

        let now = Utc::now();
        let models: Vec<_> = records
            .into_iter()
            .map(|r| new_active_model(r, Uuid::now_v7(), now))
            .collect();

        // id, created_at and the deletion state are only written on insert
        UserEntity::insert_many(models)
            .on_conflict(
                OnConflict::column(Column::EmailLower)
                    .update_columns([
                        Column::Name,
                        Column::Email,
                        Column::EmailLower,
                        Column::Age,
                        Column::UpdatedAt,
                    ])
                    .value(Column::Version, bump_version())
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .context("bulk_upsert: write failed")?;

        txn.commit()
            .await
            .context("bulk_upsert: commit failed")?;
        Ok(counts)
    }

    async fn stats(&self) -> anyhow::Result<UserStats> {
        let rows = self
            .conn
            .query_all(Statement::from_string(DbBackend::Sqlite, STATS_SQL))
            .await
            .context("stats failed")?;

        let mut stats = UserStats::default();
        let mut by_range: HashMap<String, u64> = HashMap::new();
        for row in &rows {
            let facet: String = row.try_get("", "facet")?;
            let label: Option<String> = row.try_get("", "label")?;
            let count = row.try_get::<i64>("", "cnt")?.max(0) as u64;
            match (facet.as_str(), label) {
                ("summary", _) => {
                    stats.summary = StatsSummary {
                        total: count,
                        avg_age: row.try_get("", "avg_age")?,
                        min_age: row.try_get("", "min_age")?,
                        max_age: row.try_get("", "max_age")?,
                    }
                }
                ("age_range", Some(label)) => {
                    by_range.insert(label, count);
                }
                ("created_month", Some(month)) => {
                    stats.by_created_month.push(MonthBucket { month, count })
                }
                _ => {}
            }
        }

        stats.by_age_range = AGE_RANGES
            .iter()
            .filter_map(|range| {
                by_range.remove(*range).map(|count| AgeRangeBucket {
                    range: (*range).to_owned(),
                    count,
                })
            })
            .collect();
        stats.by_created_month.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(stats)
    }
}
