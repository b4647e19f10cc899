use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tracing::{debug, info};

use crate::api::rest::routes;
use crate::config::UsersConfig;
use crate::domain::service::Service;
use crate::infra::storage::db;
use crate::infra::storage::indexes::{self, BackfillReport};
use crate::infra::storage::SeaOrmUsersRepository;

/// The users module: owns the store handle and the domain service, and
/// mounts the REST surface on a host router.
#[derive(Clone)]
pub struct UsersModule {
    conn: DatabaseConnection,
    service: Arc<Service>,
}

impl UsersModule {
    /// Apply migrations and wire the SeaORM repository into the service.
    pub async fn init(conn: DatabaseConnection, cfg: UsersConfig) -> anyhow::Result<Self> {
        info!("Initializing users module");
        debug!(
            "Loaded users config: default_page_size={}, max_page_size={}, max_bulk_size={}",
            cfg.default_page_size, cfg.max_page_size, cfg.max_bulk_size
        );

        db::migrate(&conn).await?;

        let repo = SeaOrmUsersRepository::new(conn.clone());
        let service = Arc::new(Service::new(Arc::new(repo), cfg));
        Ok(Self { conn, service })
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    pub fn register_rest(&self, router: Router) -> anyhow::Result<Router> {
        routes::register_routes(router, self.service.clone())
    }

    pub async fn provision_indexes(&self) -> anyhow::Result<()> {
        indexes::provision_indexes(&self.conn).await
    }

    pub async fn backfill_email_lower(&self) -> anyhow::Result<BackfillReport> {
        indexes::backfill_email_lower(&self.conn).await
    }
}
