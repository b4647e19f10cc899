//! Operational index tooling: text index provisioning and the email backfill.

mod common;

use common::{harness, new_user};
use sea_orm::ConnectionTrait;
use users::contract::model::DeleteAudit;
use users::domain::error::DomainError;
use users::domain::query::{FieldSelection, SortSpec, UserFilter};
use users::domain::repo::UsersRepository;
use users::domain::service::SCORE_FIELD;
use users::infra::storage::indexes::{backfill_email_lower, provision_indexes, BackfillReport};

#[tokio::test]
async fn search_requires_provisioned_index() {
    let h = harness().await;
    h.svc
        .create(new_user("John Developer", "john@example.com"))
        .await
        .unwrap();

    let err = h
        .svc
        .text_search("developer", &FieldSelection::Default, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::TextIndexMissing));
}

#[tokio::test]
async fn search_ranks_matching_users_only() {
    let h = harness().await;
    h.svc
        .create(new_user("John Developer", "john@example.com"))
        .await
        .unwrap();
    h.svc
        .create(new_user("Jane Engineer", "jane@example.com"))
        .await
        .unwrap();

    provision_indexes(&h.conn).await.unwrap();
    // idempotent
    provision_indexes(&h.conn).await.unwrap();

    let hits = h
        .svc
        .text_search("developer", &FieldSelection::Default, None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "John Developer");
    assert!(hits[0][SCORE_FIELD].as_f64().unwrap() > 0.0);

    // rows written after provisioning are indexed by the triggers
    let late = h
        .svc
        .create(new_user("Dev Lead", "lead@developers.io"))
        .await
        .unwrap();
    let hits = h
        .svc
        .text_search("lead", &FieldSelection::parse(Some("basic")), Some(5))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], late.id.to_string());

    // soft-deleted users drop out of results
    h.svc
        .soft_delete(late.id, DeleteAudit::default())
        .await
        .unwrap();
    let hits = h
        .svc
        .text_search("lead", &FieldSelection::Default, None)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn search_rejects_blank_query() {
    let h = harness().await;
    provision_indexes(&h.conn).await.unwrap();
    let err = h
        .svc
        .text_search("   ", &FieldSelection::Default, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::EmptySearchQuery));
}

#[tokio::test]
async fn renamed_users_are_found_by_their_new_name() {
    let h = harness().await;
    provision_indexes(&h.conn).await.unwrap();
    let u = h.svc.create(new_user("Plain Name", "p@x.io")).await.unwrap();
    h.svc
        .update(
            u.id,
            users::contract::model::UserPatch {
                name: Some("Architect Person".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let fields = FieldSelection::Default;
    assert_eq!(h.svc.text_search("architect", &fields, None).await.unwrap().len(), 1);
    assert!(h.svc.text_search("plain", &fields, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn backfill_fixes_stale_rows_and_skips_collisions() {
    let h = harness().await;
    h.svc.create(new_user("X", "x@a.io")).await.unwrap();
    h.svc.create(new_user("Y", "y@a.io")).await.unwrap();
    h.svc.create(new_user("Z", "Z@a.io")).await.unwrap();

    // legacy rows: Y's email now normalizes onto X, Z lost its normalized value
    h.conn
        .execute_unprepared("UPDATE users SET email = 'X@A.IO' WHERE email = 'y@a.io'")
        .await
        .unwrap();
    h.conn
        .execute_unprepared("UPDATE users SET email_lower = 'stale' WHERE email = 'Z@a.io'")
        .await
        .unwrap();

    let report = backfill_email_lower(&h.conn).await.unwrap();
    assert_eq!(
        report,
        BackfillReport {
            scanned: 3,
            updated: 1,
            skipped: 1,
        }
    );

    let all = h
        .repo
        .find_many(&UserFilter::all(), &SortSpec::default(), 0, 10)
        .await
        .unwrap();
    let z = all.iter().find(|u| u.email == "Z@a.io").unwrap();
    assert_eq!(z.email_lower, "z@a.io");

    let again = backfill_email_lower(&h.conn).await.unwrap();
    assert_eq!(again.updated, 0);
    assert_eq!(again.skipped, 1);
}
