#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use users::config::UsersConfig;
use users::contract::model::NewUser;
use users::domain::service::Service;
use users::infra::storage::db;
use users::infra::storage::SeaOrmUsersRepository;

pub struct Harness {
    pub conn: DatabaseConnection,
    pub repo: Arc<SeaOrmUsersRepository<DatabaseConnection>>,
    pub svc: Arc<Service>,
}

/// Fresh in-memory database with migrations applied, and a service over it.
pub async fn harness() -> Harness {
    harness_with(UsersConfig::default()).await
}

pub async fn harness_with(cfg: UsersConfig) -> Harness {
    let conn = db::connect_memory()
        .await
        .expect("in-memory database should open");
    let repo = Arc::new(SeaOrmUsersRepository::new(conn.clone()));
    let svc = Arc::new(Service::new(repo.clone(), cfg));
    Harness { conn, repo, svc }
}

pub fn new_user(name: &str, email: &str) -> NewUser {
    NewUser {
        name: name.to_owned(),
        email: email.to_owned(),
        ..Default::default()
    }
}

pub fn aged(name: &str, email: &str, age: i32) -> NewUser {
    NewUser {
        age: Some(age),
        ..new_user(name, email)
    }
}
