//! Website management handlers

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
    db::{models::Website, NewWebsite, Repository, WebsiteUpdate},
    errors::{AppError, Result},
};

pub async fn list_websites(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<Vec<Website>>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_websites(scope.company_id).await?))
}

pub async fn create_website(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<NewWebsite>,
) -> Result<(StatusCode, Json<Website>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    // Company must exist
    repo.get_company(request.company_id).await?;

    let website = repo.create_website(request).await?;

    tracing::info!(
        website_id = %website.id,
        company_id = %website.company_id,
        user_id = %auth.user_id,
        url = %website.url,
        "Website created"
    );

    Ok((StatusCode::CREATED, Json(website)))
}

pub async fn get_website(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(website_id): Path<Uuid>,
) -> Result<Json<Website>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.get_website(website_id).await?))
}

pub async fn update_website(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(website_id): Path<Uuid>,
    Json(request): Json<WebsiteUpdate>,
) -> Result<Json<Website>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let website = repo.update_website(website_id, request).await?;

    tracing::info!(website_id = %website.id, user_id = %auth.user_id, "Website updated");

    Ok(Json(website))
}

pub async fn delete_website(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(website_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_website(website_id).await? {
        return Err(AppError::WebsiteNotFound {
            id: website_id.to_string(),
        });
    }

    tracing::info!(website_id = %website_id, user_id = %auth.user_id, "Website deleted");

    Ok(StatusCode::NO_CONTENT)
}
