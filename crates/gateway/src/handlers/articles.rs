//! Article management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::detached;
use crate::AppState;
use autopress_common::{
    auth::AuthUser,
    db::{
        models::{Article, ArticleStatus},
        ArticleFilter, ArticleUpdate, NewArticle, Repository, MAX_PAGE_SIZE,
    },
    errors::{AppError, Result},
};

/// Query string for the article list
#[derive(Debug, Default, Deserialize)]
pub struct ArticleListQuery {
    pub company_id: Option<Uuid>,
    pub website_id: Option<Uuid>,
    pub status: Option<ArticleStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ArticleListQuery {
    fn into_filter(self) -> ArticleFilter {
        let defaults = ArticleFilter::default();
        ArticleFilter {
            company_id: self.company_id,
            website_id: self.website_id,
            status: self.status,
            page: self.page.unwrap_or(defaults.page).max(1),
            per_page: self
                .per_page
                .unwrap_or(defaults.per_page)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// One page of articles
#[derive(Serialize)]
pub struct ArticleListResponse {
    pub items: Vec<Article>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

pub async fn list_articles(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ArticleListQuery>,
) -> Result<Json<ArticleListResponse>> {
    let filter = query.into_filter();
    let (page, per_page) = (filter.page, filter.per_page);

    let repo = Repository::new(state.db.clone());
    let (items, total) = repo.list_articles(filter).await?;

    Ok(Json(ArticleListResponse {
        items,
        total,
        page,
        per_page,
    }))
}

/// Create a pending article for a website
pub async fn create_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<NewArticle>,
) -> Result<(StatusCode, Json<Article>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let website = repo.get_website(request.website_id).await?;

    if let Some(prompt_id) = request.prompt_id {
        ensure_prompt_in_company(&repo, prompt_id, website.company_id).await?;
    }

    let article = repo.create_article(website.company_id, request).await?;

    tracing::info!(
        article_id = %article.id,
        website_id = %article.website_id,
        user_id = %auth.user_id,
        scheduled = article.scheduled_at.is_some(),
        "Article created"
    );

    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn get_article(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(article_id): Path<Uuid>,
) -> Result<Json<Article>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.get_article(article_id).await?))
}

/// Edit an article. `status` only accepts `pending`, which re-queues it.
pub async fn update_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(article_id): Path<Uuid>,
    Json(request): Json<ArticleUpdate>,
) -> Result<Json<Article>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    if let Some(prompt_id) = request.prompt_id {
        let article = repo.get_article(article_id).await?;
        ensure_prompt_in_company(&repo, prompt_id, article.company_id).await?;
    }

    let article = repo.update_article(article_id, request).await?;

    tracing::info!(
        article_id = %article.id,
        status = %article.status,
        user_id = %auth.user_id,
        "Article updated"
    );

    Ok(Json(article))
}

pub async fn delete_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(article_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_article(article_id).await? {
        return Err(AppError::ArticleNotFound {
            id: article_id.to_string(),
        });
    }

    tracing::info!(article_id = %article_id, user_id = %auth.user_id, "Article deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Send an article to n8n for generation now
pub async fn force_process(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(article_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Article>)> {
    tracing::info!(article_id = %article_id, user_id = %auth.user_id, "Force-process requested");

    let workflow = state.workflow.clone();
    let article = detached(async move { workflow.force_process(article_id).await }).await?;

    Ok((StatusCode::ACCEPTED, Json(article)))
}

async fn ensure_prompt_in_company(repo: &Repository, prompt_id: Uuid, company_id: Uuid) -> Result<()> {
    let prompt = repo.get_prompt(prompt_id).await?;
    if prompt.company_id != company_id {
        return Err(AppError::Validation {
            message: "prompt belongs to another company".to_string(),
            field: Some("prompt_id".to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let filter = ArticleListQuery::default().into_filter();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, 20);
        assert!(filter.status.is_none());
    }

    #[test]
    fn test_list_query_clamps_page_size() {
        let filter = ArticleListQuery {
            page: Some(0),
            per_page: Some(10_000),
            ..Default::default()
        }
        .into_filter();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, MAX_PAGE_SIZE);
    }
}
