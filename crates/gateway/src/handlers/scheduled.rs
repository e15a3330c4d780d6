//! Scheduled article handlers
//!
//! Dispatch is driven from outside: a cron job calls the dispatch route.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{detached, CompanyScope};
use crate::AppState;
use autopress_common::{
    auth::AuthUser,
    db::{models::Article, Repository, MAX_PAGE_SIZE},
    errors::Result,
    workflow::DispatchOutcome,
};

#[derive(Debug, Deserialize, Validate)]
pub struct ProgressRequest {
    /// Clamped to 0..=100
    pub progress: i32,

    #[validate(length(max = 500))]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchQuery {
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct DispatchResponse {
    pub due: usize,
    pub triggered: usize,
    pub failed: usize,
    pub results: Vec<DispatchOutcome>,
}

pub async fn list_scheduled(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<Vec<Article>>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_scheduled_articles(scope.company_id).await?))
}

pub async fn update_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(article_id): Path<Uuid>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<Article>> {
    request.validate()?;

    let article = state
        .workflow
        .update_progress(article_id, request.progress, request.message)
        .await?;

    tracing::debug!(
        article_id = %article.id,
        progress = article.progress,
        user_id = %auth.user_id,
        "Progress updated"
    );

    Ok(Json(article))
}

/// Trigger every pending article whose schedule is due
pub async fn dispatch_due(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DispatchQuery>,
) -> Result<Json<DispatchResponse>> {
    let limit = query
        .limit
        .unwrap_or(state.config.n8n.dispatch_batch_size)
        .clamp(1, MAX_PAGE_SIZE);

    tracing::info!(limit, user_id = %auth.user_id, "Dispatching due articles");

    let workflow = state.workflow.clone();
    let now = chrono::Utc::now();
    let results = detached(async move { workflow.dispatch_due(now, limit).await }).await?;
    let triggered = results.iter().filter(|r| r.triggered).count();

    Ok(Json(DispatchResponse {
        due: results.len(),
        triggered,
        failed: results.len() - triggered,
        results,
    }))
}
