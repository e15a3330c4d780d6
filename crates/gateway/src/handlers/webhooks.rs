//! Webhook configuration handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::CompanyScope;
use crate::AppState;
use autopress_common::{
    auth::AuthUser,
    db::{models::Webhook, NewWebhook, Repository, WebhookUpdate},
    errors::{AppError, Result},
};

pub async fn list_webhooks(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<Vec<Webhook>>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_webhooks(scope.company_id).await?))
}

pub async fn create_webhook(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<NewWebhook>,
) -> Result<(StatusCode, Json<Webhook>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    repo.get_company(request.company_id).await?;

    // A website-scoped webhook must belong to a website of the same company
    if let Some(website_id) = request.website_id {
        let website = repo.get_website(website_id).await?;
        if website.company_id != request.company_id {
            return Err(AppError::Validation {
                message: "website belongs to another company".to_string(),
                field: Some("website_id".to_string()),
            });
        }
    }

    let webhook = repo.create_webhook(request).await?;

    tracing::info!(
        webhook_id = %webhook.id,
        company_id = %webhook.company_id,
        event = %webhook.event,
        user_id = %auth.user_id,
        "Webhook created"
    );

    Ok((StatusCode::CREATED, Json(webhook)))
}

pub async fn get_webhook(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(webhook_id): Path<Uuid>,
) -> Result<Json<Webhook>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.get_webhook(webhook_id).await?))
}

pub async fn update_webhook(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(webhook_id): Path<Uuid>,
    Json(request): Json<WebhookUpdate>,
) -> Result<Json<Webhook>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let webhook = repo.update_webhook(webhook_id, request).await?;

    tracing::info!(webhook_id = %webhook.id, user_id = %auth.user_id, "Webhook updated");

    Ok(Json(webhook))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(webhook_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_webhook(webhook_id).await? {
        return Err(AppError::WebhookNotFound {
            id: webhook_id.to_string(),
        });
    }

    tracing::info!(webhook_id = %webhook_id, user_id = %auth.user_id, "Webhook deleted");

    Ok(StatusCode::NO_CONTENT)
}
