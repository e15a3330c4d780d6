//! Database layer for AutoPress
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management
//! - Startup migrations

pub mod models;
mod repository;

pub use repository::{
    ArticleFilter, ArticleStatusUpdate, ArticleUpdate, CompanyUpdate, NewArticle, NewCompany,
    NewPrompt, NewWebhook, NewWebsite, PromptUpdate, Repository, WebhookUpdate, WebsiteUpdate,
    MAX_PAGE_SIZE,
};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
///
/// The connection sits behind an `Arc`: sea-orm drops `Clone` from
/// `DatabaseConnection` when its `mock` feature is on.
#[derive(Clone)]
pub struct DbPool {
    conn: Arc<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            conn: Arc::new(conn),
        }
    }

    /// Underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Statements a mock connection has seen, in order
    #[cfg(test)]
    pub(crate) fn into_statements(self) -> Vec<sea_orm::Statement> {
        Arc::try_unwrap(self.conn)
            .map(DatabaseConnection::into_transaction_log)
            .unwrap_or_default()
            .iter()
            .flat_map(|txn| txn.statements().to_vec())
            .collect()
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }

    /// Apply pending migrations from `migrations/`
    pub async fn migrate(&self) -> Result<()> {
        let pool = self.conn.get_postgres_connection_pool();

        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Migration failed: {}", e),
            })?;

        info!("Database migrations applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ArticleStatus;
    use crate::testing;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_clones_share_one_connection() {
        let article = testing::article(
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            ArticleStatus::Pending,
        );
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]]);

        let pool = DbPool::from_connection(db.into_connection());
        let clone = pool.clone();
        assert!(Arc::ptr_eq(&pool.conn, &clone.conn));

        // The row queued on the original is served through the clone
        let found = Repository::new(clone).get_article(article.id).await.unwrap();
        assert_eq!(found.id, article.id);
    }
}
