//! Prompt management handlers

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
    db::{models::Prompt, NewPrompt, PromptUpdate, Repository},
    errors::{AppError, Result},
};

pub async fn list_prompts(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<Vec<Prompt>>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_prompts(scope.company_id).await?))
}

/// Create a prompt. A new default prompt replaces the company's previous one.
pub async fn create_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<NewPrompt>,
) -> Result<(StatusCode, Json<Prompt>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    repo.get_company(request.company_id).await?;

    let prompt = repo.create_prompt(request).await?;

    tracing::info!(
        prompt_id = %prompt.id,
        company_id = %prompt.company_id,
        user_id = %auth.user_id,
        is_default = prompt.is_default,
        "Prompt created"
    );

    Ok((StatusCode::CREATED, Json(prompt)))
}

pub async fn get_prompt(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(prompt_id): Path<Uuid>,
) -> Result<Json<Prompt>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.get_prompt(prompt_id).await?))
}

pub async fn update_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(prompt_id): Path<Uuid>,
    Json(request): Json<PromptUpdate>,
) -> Result<Json<Prompt>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let prompt = repo.update_prompt(prompt_id, request).await?;

    tracing::info!(prompt_id = %prompt.id, user_id = %auth.user_id, "Prompt updated");

    Ok(Json(prompt))
}

pub async fn delete_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(prompt_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_prompt(prompt_id).await? {
        return Err(AppError::PromptNotFound {
            id: prompt_id.to_string(),
        });
    }

    tracing::info!(prompt_id = %prompt_id, user_id = %auth.user_id, "Prompt deleted");

    Ok(StatusCode::NO_CONTENT)
}
