//! Company management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use autopress_common::{
    auth::AuthUser,
    db::{models::Company, CompanyUpdate, NewCompany, Repository},
    errors::{AppError, Result},
};

pub async fn list_companies(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Company>>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_companies().await?))
}

pub async fn create_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<NewCompany>,
) -> Result<(StatusCode, Json<Company>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let company = repo.create_company(request).await?;

    tracing::info!(
        company_id = %company.id,
        user_id = %auth.user_id,
        name = %company.name,
        "Company created"
    );

    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn get_company(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Company>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.get_company(company_id).await?))
}

pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(request): Json<CompanyUpdate>,
) -> Result<Json<Company>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let company = repo.update_company(company_id, request).await?;

    tracing::info!(company_id = %company.id, user_id = %auth.user_id, "Company updated");

    Ok(Json(company))
}

/// Delete a company along with its websites, prompts, webhooks and articles
pub async fn delete_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_company(company_id).await? {
        return Err(AppError::CompanyNotFound {
            id: company_id.to_string(),
        });
    }

    tracing::info!(company_id = %company_id, user_id = %auth.user_id, "Company deleted");

    Ok(StatusCode::NO_CONTENT)
}
