//! API handlers module

pub mod articles;
pub mod callbacks;
pub mod companies;
pub mod health;
pub mod prompts;
pub mod scheduled;
pub mod webhooks;
pub mod websites;

use std::future::Future;

use autopress_common::errors::{AppError, Result};
use serde::Deserialize;
use uuid::Uuid;

/// `?company_id=` filter shared by the list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct CompanyScope {
    pub company_id: Option<Uuid>,
}

/// Run a workflow step on its own task.
///
/// The request timeout drops the handler future; a spawned step still
/// finishes its status writes after the client has been answered.
pub(crate) async fn detached<T, F>(step: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(step).await.map_err(|e| AppError::Internal {
        message: format!("Workflow task failed: {}", e),
    })?
}
