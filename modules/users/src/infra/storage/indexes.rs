//! Operational index maintenance: the text index and the `email_lower` backfill.

use anyhow::Context;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{info, warn};

use crate::infra::storage::entity::{Column, Entity as UserEntity};

pub const TEXT_INDEX_TABLE: &str = "users_fts";

// External-content FTS5 table over users(name, email), synced by triggers.
// Column weights (name 3, email 1) are applied at query time via bm25().
const PROVISION_SQL: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_lower ON users(email_lower);
CREATE VIRTUAL TABLE IF NOT EXISTS users_fts USING fts5(
    name, email,
    content = 'users',
    content_rowid = 'seq',
    tokenize = 'porter unicode61'
);
CREATE TRIGGER IF NOT EXISTS users_fts_ai AFTER INSERT ON users BEGIN
    INSERT INTO users_fts(rowid, name, email) VALUES (new.seq, new.name, new.email);
END;
CREATE TRIGGER IF NOT EXISTS users_fts_ad AFTER DELETE ON users BEGIN
    INSERT INTO users_fts(users_fts, rowid, name, email) VALUES ('delete', old.seq, old.name, old.email);
END;
CREATE TRIGGER IF NOT EXISTS users_fts_au AFTER UPDATE OF name, email ON users BEGIN
    INSERT INTO users_fts(users_fts, rowid, name, email) VALUES ('delete', old.seq, old.name, old.email);
    INSERT INTO users_fts(rowid, name, email) VALUES (new.seq, new.name, new.email);
END;
INSERT INTO users_fts(users_fts) VALUES ('rebuild');
"#;

/// Create the unique email index and the text index (idempotent), then
/// rebuild the text index from the current rows.
pub async fn provision_indexes<C: ConnectionTrait>(conn: &C) -> anyhow::Result<()> {
    conn.execute_unprepared(PROVISION_SQL)
        .await
        .context("failed to provision users indexes")?;
    info!(table = TEXT_INDEX_TABLE, "users indexes provisioned");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackfillReport {
    pub scanned: u64,
    pub updated: u64,
    /// Rows whose normalized email collides with another row.
    pub skipped: u64,
}

/// Recompute `email_lower` where it is stale.
pub async fn backfill_email_lower<C: ConnectionTrait>(conn: &C) -> anyhow::Result<BackfillReport> {
    let rows = UserEntity::find()
        .order_by_asc(Column::Id)
        .all(conn)
        .await
        .context("backfill: scan failed")?;

    let mut report = BackfillReport::default();
    for row in rows {
        report.scanned += 1;
        let expected = row.email.trim().to_lowercase();
        if row.email_lower == expected {
            continue;
        }

        let taken = UserEntity::find()
            .filter(Column::EmailLower.eq(expected.as_str()))
            .filter(Column::Id.ne(row.id))
            .one(conn)
            .await
            .context("backfill: collision check failed")?;
        if taken.is_some() {
            warn!(user_id = %row.id, email_lower = %expected, "backfill: collision, skipping");
            report.skipped += 1;
            continue;
        }

        UserEntity::update_many()
            .col_expr(Column::EmailLower, Expr::value(expected))
            .filter(Column::Id.eq(row.id))
            .exec(conn)
            .await
            .context("backfill: update failed")?;
        report.updated += 1;
    }

    info!(
        scanned = report.scanned,
        updated = report.updated,
        skipped = report.skipped,
        "email_lower backfill finished"
    );
    Ok(report)
}
