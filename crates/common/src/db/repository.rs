//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Upper bound on page size for article listings
pub const MAX_PAGE_SIZE: u64 = 100;

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewCompany {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompanyUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWebsite {
    pub company_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(url)]
    pub url: String,

    pub wordpress_username: Option<String>,

    pub wordpress_app_password: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct WebsiteUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(url)]
    pub url: Option<String>,

    pub wordpress_username: Option<String>,

    pub wordpress_app_password: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPrompt {
    pub company_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 20000))]
    pub content: String,

    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PromptUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 20000))]
    pub content: Option<String>,

    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWebhook {
    pub company_id: Uuid,

    pub website_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(url)]
    pub url: String,

    pub event: WebhookEvent,

    pub secret: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct WebhookUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(url)]
    pub url: Option<String>,

    pub event: Option<WebhookEvent>,

    pub secret: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewArticle {
    pub website_id: Uuid,

    pub prompt_id: Option<Uuid>,

    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(max = 1000))]
    pub keywords: Option<String>,

    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ArticleUpdate {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,

    #[validate(length(max = 1000))]
    pub keywords: Option<String>,

    pub prompt_id: Option<Uuid>,

    pub scheduled_at: Option<DateTime<Utc>>,

    /// Only `failed -> pending` (re-queue) is meaningful here; other moves go
    /// through the workflow.
    pub status: Option<ArticleStatus>,
}

/// Fields written alongside a status change
#[derive(Debug, Clone, Default)]
pub struct ArticleStatusUpdate {
    pub progress: Option<i32>,
    pub progress_message: Option<String>,
    pub content: Option<String>,
    pub wordpress_post_id: Option<i64>,
    pub post_url: Option<String>,
    pub error_message: Option<String>,
}

/// Listing filter for articles
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub company_id: Option<Uuid>,
    pub website_id: Option<Uuid>,
    pub status: Option<ArticleStatus>,
    /// 1-based
    pub page: u64,
    pub per_page: u64,
}

impl Default for ArticleFilter {
    fn default() -> Self {
        Self {
            company_id: None,
            website_id: None,
            status: None,
            page: 1,
            per_page: 20,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Map unique violations to a conflict, everything else to a database error
fn conflict_or_db(err: DbErr, resource: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Duplicate {
            message: format!("{} already exists", resource),
        },
        _ => AppError::Database(err),
    }
}

/// Apply a status change to an article active model, stamping the
/// timestamps that belong to the target status.
fn apply_status(
    article: &mut ArticleActiveModel,
    from: ArticleStatus,
    to: ArticleStatus,
    update: ArticleStatusUpdate,
    now: DateTime<Utc>,
) -> Result<()> {
    if !from.can_transition_to(to) {
        return Err(AppError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    article.status = Set(String::from(to));

    match to {
        ArticleStatus::Pending => {
            article.progress = Set(0);
            article.progress_message = Set(None);
            article.error_message = Set(None);
            article.processing_started_at = Set(None);
        }
        ArticleStatus::Processing => {
            if from != ArticleStatus::Processing {
                article.processing_started_at = Set(Some(now.into()));
                article.progress = Set(0);
                article.error_message = Set(None);
            }
            if let Some(progress) = update.progress {
                article.progress = Set(progress.clamp(0, 100));
            }
            if update.progress_message.is_some() {
                article.progress_message = Set(update.progress_message);
            }
        }
        ArticleStatus::Posted => {
            article.posted_at = Set(Some(now.into()));
            article.progress = Set(100);
            article.error_message = Set(None);
            if update.content.is_some() {
                article.content = Set(update.content);
            }
            if update.wordpress_post_id.is_some() {
                article.wordpress_post_id = Set(update.wordpress_post_id);
            }
            if update.post_url.is_some() {
                article.post_url = Set(update.post_url);
            }
            if update.progress_message.is_some() {
                article.progress_message = Set(update.progress_message);
            }
        }
        ArticleStatus::Failed => {
            article.error_message = Set(Some(
                update
                    .error_message
                    .unwrap_or_else(|| "Article generation failed".to_string()),
            ));
        }
    }

    article.updated_at = Set(now.into());
    Ok(())
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Company Operations
    // ========================================================================

    pub async fn create_company(&self, input: NewCompany) -> Result<Company> {
        let now = Utc::now();

        let company = CompanyActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        company
            .insert(self.conn())
            .await
            .map_err(|e| conflict_or_db(e, "company"))
    }

    pub async fn find_company(&self, id: Uuid) -> Result<Option<Company>> {
        CompanyEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find a company, failing with 404 when absent
    pub async fn get_company(&self, id: Uuid) -> Result<Company> {
        self.find_company(id)
            .await?
            .ok_or_else(|| AppError::CompanyNotFound { id: id.to_string() })
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        CompanyEntity::find()
            .order_by_asc(CompanyColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_company(&self, id: Uuid, input: CompanyUpdate) -> Result<Company> {
        let mut company: CompanyActiveModel = self.get_company(id).await?.into();

        if let Some(name) = input.name {
            company.name = Set(name);
        }
        if input.description.is_some() {
            company.description = Set(input.description);
        }
        company.updated_at = Set(Utc::now().into());

        company
            .update(self.conn())
            .await
            .map_err(|e| conflict_or_db(e, "company"))
    }

    pub async fn delete_company(&self, id: Uuid) -> Result<bool> {
        let result = CompanyEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Website Operations
    // ========================================================================

    pub async fn create_website(&self, input: NewWebsite) -> Result<Website> {
        let now = Utc::now();

        let website = WebsiteActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(input.company_id),
            name: Set(input.name),
            url: Set(input.url),
            wordpress_username: Set(input.wordpress_username),
            wordpress_app_password: Set(input.wordpress_app_password),
            is_active: Set(input.is_active),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        website.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn find_website(&self, id: Uuid) -> Result<Option<Website>> {
        WebsiteEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_website(&self, id: Uuid) -> Result<Website> {
        self.find_website(id)
            .await?
            .ok_or_else(|| AppError::WebsiteNotFound { id: id.to_string() })
    }

    pub async fn list_websites(&self, company_id: Option<Uuid>) -> Result<Vec<Website>> {
        let mut query = WebsiteEntity::find();
        if let Some(cid) = company_id {
            query = query.filter(WebsiteColumn::CompanyId.eq(cid));
        }

        query
            .order_by_asc(WebsiteColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_website(&self, id: Uuid, input: WebsiteUpdate) -> Result<Website> {
        let mut website: WebsiteActiveModel = self.get_website(id).await?.into();

        if let Some(name) = input.name {
            website.name = Set(name);
        }
        if let Some(url) = input.url {
            website.url = Set(url);
        }
        if input.wordpress_username.is_some() {
            website.wordpress_username = Set(input.wordpress_username);
        }
        if input.wordpress_app_password.is_some() {
            website.wordpress_app_password = Set(input.wordpress_app_password);
        }
        if let Some(active) = input.is_active {
            website.is_active = Set(active);
        }
        website.updated_at = Set(Utc::now().into());

        website.update(self.conn()).await.map_err(Into::into)
    }

    pub async fn delete_website(&self, id: Uuid) -> Result<bool> {
        let result = WebsiteEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Prompt Operations
    // ========================================================================

    /// Create a prompt. A new default prompt clears the flag on the
    /// company's other prompts in the same transaction.
    pub async fn create_prompt(&self, input: NewPrompt) -> Result<Prompt> {
        let now = Utc::now();
        let txn = self.conn().begin().await?;

        if input.is_default {
            PromptEntity::update_many()
                .col_expr(PromptColumn::IsDefault, Expr::value(false))
                .filter(PromptColumn::CompanyId.eq(input.company_id))
                .exec(&txn)
                .await?;
        }

        let prompt = PromptActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(input.company_id),
            name: Set(input.name),
            content: Set(input.content),
            is_default: Set(input.is_default),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(prompt)
    }

    pub async fn find_prompt(&self, id: Uuid) -> Result<Option<Prompt>> {
        PromptEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_prompt(&self, id: Uuid) -> Result<Prompt> {
        self.find_prompt(id)
            .await?
            .ok_or_else(|| AppError::PromptNotFound { id: id.to_string() })
    }

    pub async fn list_prompts(&self, company_id: Option<Uuid>) -> Result<Vec<Prompt>> {
        let mut query = PromptEntity::find();
        if let Some(cid) = company_id {
            query = query.filter(PromptColumn::CompanyId.eq(cid));
        }

        query
            .order_by_desc(PromptColumn::IsDefault)
            .order_by_asc(PromptColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn default_prompt_for_company(&self, company_id: Uuid) -> Result<Option<Prompt>> {
        PromptEntity::find()
            .filter(PromptColumn::CompanyId.eq(company_id))
            .filter(PromptColumn::IsDefault.eq(true))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_prompt(&self, id: Uuid, input: PromptUpdate) -> Result<Prompt> {
        let existing = self.get_prompt(id).await?;
        let company_id = existing.company_id;
        let mut prompt: PromptActiveModel = existing.into();
        let txn = self.conn().begin().await?;

        if let Some(name) = input.name {
            prompt.name = Set(name);
        }
        if let Some(content) = input.content {
            prompt.content = Set(content);
        }
        if let Some(is_default) = input.is_default {
            if is_default {
                PromptEntity::update_many()
                    .col_expr(PromptColumn::IsDefault, Expr::value(false))
                    .filter(PromptColumn::CompanyId.eq(company_id))
                    .filter(PromptColumn::Id.ne(id))
                    .exec(&txn)
                    .await?;
            }
            prompt.is_default = Set(is_default);
        }
        prompt.updated_at = Set(Utc::now().into());

        let prompt = prompt.update(&txn).await?;
        txn.commit().await?;
        Ok(prompt)
    }

    pub async fn delete_prompt(&self, id: Uuid) -> Result<bool> {
        let result = PromptEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Webhook Operations
    // ========================================================================

    pub async fn create_webhook(&self, input: NewWebhook) -> Result<Webhook> {
        let now = Utc::now();

        let webhook = WebhookActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(input.company_id),
            website_id: Set(input.website_id),
            name: Set(input.name),
            url: Set(input.url),
            event: Set(input.event.as_str().to_string()),
            secret: Set(input.secret),
            is_active: Set(input.is_active),
            last_triggered_at: Set(None),
            last_status: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        webhook.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn find_webhook(&self, id: Uuid) -> Result<Option<Webhook>> {
        WebhookEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_webhook(&self, id: Uuid) -> Result<Webhook> {
        self.find_webhook(id)
            .await?
            .ok_or_else(|| AppError::WebhookNotFound { id: id.to_string() })
    }

    pub async fn list_webhooks(&self, company_id: Option<Uuid>) -> Result<Vec<Webhook>> {
        let mut query = WebhookEntity::find();
        if let Some(cid) = company_id {
            query = query.filter(WebhookColumn::CompanyId.eq(cid));
        }

        query
            .order_by_asc(WebhookColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Active webhooks for an event that apply to a website: the ones scoped
    /// to that website first, then the company-wide ones.
    pub async fn list_active_webhooks(
        &self,
        company_id: Uuid,
        website_id: Uuid,
        event: WebhookEvent,
    ) -> Result<Vec<Webhook>> {
        let mut hooks = WebhookEntity::find()
            .filter(WebhookColumn::CompanyId.eq(company_id))
            .filter(WebhookColumn::Event.eq(event.as_str()))
            .filter(WebhookColumn::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(WebhookColumn::WebsiteId.eq(website_id))
                    .add(WebhookColumn::WebsiteId.is_null()),
            )
            .order_by_asc(WebhookColumn::CreatedAt)
            .all(self.conn())
            .await?;

        // Stable sort keeps creation order within each group
        hooks.sort_by_key(|h| h.website_id.is_none());
        Ok(hooks)
    }

    /// The webhook a trigger for this website goes to
    pub async fn find_active_webhook(
        &self,
        company_id: Uuid,
        website_id: Uuid,
        event: WebhookEvent,
    ) -> Result<Option<Webhook>> {
        Ok(self
            .list_active_webhooks(company_id, website_id, event)
            .await?
            .into_iter()
            .next())
    }

    pub async fn update_webhook(&self, id: Uuid, input: WebhookUpdate) -> Result<Webhook> {
        let mut webhook: WebhookActiveModel = self.get_webhook(id).await?.into();

        if let Some(name) = input.name {
            webhook.name = Set(name);
        }
        if let Some(url) = input.url {
            webhook.url = Set(url);
        }
        if let Some(event) = input.event {
            webhook.event = Set(event.as_str().to_string());
        }
        if input.secret.is_some() {
            webhook.secret = Set(input.secret);
        }
        if let Some(active) = input.is_active {
            webhook.is_active = Set(active);
        }
        webhook.updated_at = Set(Utc::now().into());

        webhook.update(self.conn()).await.map_err(Into::into)
    }

    /// Remember when a webhook last fired and what it answered
    pub async fn record_webhook_delivery(&self, id: Uuid, status: Option<u16>) -> Result<()> {
        WebhookEntity::update_many()
            .col_expr(WebhookColumn::LastTriggeredAt, Expr::value(Utc::now()))
            .col_expr(WebhookColumn::LastStatus, Expr::value(status.map(i32::from)))
            .filter(WebhookColumn::Id.eq(id))
            .exec(self.conn())
            .await?;

        Ok(())
    }

    pub async fn delete_webhook(&self, id: Uuid) -> Result<bool> {
        let result = WebhookEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Article Operations
    // ========================================================================

    pub async fn create_article(&self, company_id: Uuid, input: NewArticle) -> Result<Article> {
        let now = Utc::now();

        let article = ArticleActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            website_id: Set(input.website_id),
            prompt_id: Set(input.prompt_id),
            title: Set(input.title),
            keywords: Set(input.keywords),
            status: Set(String::from(ArticleStatus::Pending)),
            content: Set(None),
            wordpress_post_id: Set(None),
            post_url: Set(None),
            error_message: Set(None),
            progress: Set(0),
            progress_message: Set(None),
            scheduled_at: Set(input.scheduled_at.map(Into::into)),
            processing_started_at: Set(None),
            posted_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        article.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn get_article(&self, id: Uuid) -> Result<Article> {
        self.find_article(id)
            .await?
            .ok_or_else(|| AppError::ArticleNotFound { id: id.to_string() })
    }

    /// List articles newest first. Returns the page and the total match count.
    pub async fn list_articles(&self, filter: ArticleFilter) -> Result<(Vec<Article>, u64)> {
        let mut query = ArticleEntity::find();
        if let Some(cid) = filter.company_id {
            query = query.filter(ArticleColumn::CompanyId.eq(cid));
        }
        if let Some(wid) = filter.website_id {
            query = query.filter(ArticleColumn::WebsiteId.eq(wid));
        }
        if let Some(status) = filter.status {
            query = query.filter(ArticleColumn::Status.eq(status.as_str()));
        }

        let per_page = filter.per_page.clamp(1, MAX_PAGE_SIZE);
        let paginator = query
            .order_by_desc(ArticleColumn::CreatedAt)
            .paginate(self.conn(), per_page);

        let total = paginator.num_items().await?;
        let articles = paginator.fetch_page(filter.page.max(1) - 1).await?;

        Ok((articles, total))
    }

    /// Pending articles whose schedule has come due, oldest schedule first
    pub async fn list_due_articles(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Article>> {
        ArticleEntity::find()
            .filter(ArticleColumn::Status.eq(ArticleStatus::Pending.as_str()))
            .filter(ArticleColumn::ScheduledAt.lte(now))
            .order_by_asc(ArticleColumn::ScheduledAt)
            .limit(limit)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Every article with a schedule, soonest first
    pub async fn list_scheduled_articles(&self, company_id: Option<Uuid>) -> Result<Vec<Article>> {
        let mut query = ArticleEntity::find().filter(ArticleColumn::ScheduledAt.is_not_null());
        if let Some(cid) = company_id {
            query = query.filter(ArticleColumn::CompanyId.eq(cid));
        }

        query
            .order_by_asc(ArticleColumn::ScheduledAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_article(&self, id: Uuid, input: ArticleUpdate) -> Result<Article> {
        let existing = self.get_article(id).await?;
        let from = existing.article_status();
        let mut article: ArticleActiveModel = existing.into();
        let now = Utc::now();

        if let Some(title) = input.title {
            article.title = Set(title);
        }
        if input.keywords.is_some() {
            article.keywords = Set(input.keywords);
        }
        if input.prompt_id.is_some() {
            article.prompt_id = Set(input.prompt_id);
        }
        if let Some(at) = input.scheduled_at {
            article.scheduled_at = Set(Some(at.into()));
        }
        if let Some(to) = input.status {
            if to != ArticleStatus::Pending {
                return Err(AppError::Validation {
                    message: "status can only be reset to pending; use force-process to start generation".to_string(),
                    field: Some("status".to_string()),
                });
            }
            if from != ArticleStatus::Pending {
                apply_status(&mut article, from, to, ArticleStatusUpdate::default(), now)?;
            }
        }
        article.updated_at = Set(now.into());

        article.update(self.conn()).await.map_err(Into::into)
    }

    /// Move an article to `status`, rejecting transitions the status model
    /// does not allow.
    pub async fn set_article_status(
        &self,
        id: Uuid,
        status: ArticleStatus,
        update: ArticleStatusUpdate,
    ) -> Result<Article> {
        let existing = self.get_article(id).await?;
        let from = existing.article_status();
        let mut article: ArticleActiveModel = existing.into();

        apply_status(&mut article, from, status, update, Utc::now())?;

        article.update(self.conn()).await.map_err(Into::into)
    }

    /// Progress report for an article that is being processed
    pub async fn update_article_progress(
        &self,
        id: Uuid,
        progress: i32,
        message: Option<String>,
    ) -> Result<Article> {
        self.set_article_status(
            id,
            ArticleStatus::Processing,
            ArticleStatusUpdate {
                progress: Some(progress),
                progress_message: message,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_article(&self, id: Uuid) -> Result<bool> {
        let result = ArticleEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // System Log Operations
    // ========================================================================

    pub async fn insert_log(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        article_id: Option<Uuid>,
        context: serde_json::Value,
    ) -> Result<SystemLog> {
        let log = SystemLogActiveModel {
            id: Set(Uuid::new_v4()),
            level: Set(level.as_str().to_string()),
            source: Set(source.to_string()),
            message: Set(message.into()),
            article_id: Set(article_id),
            context: Set(context),
            created_at: Set(Utc::now().into()),
        };

        log.insert(self.conn()).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn article_fixture(status: ArticleStatus) -> Article {
        testing::article(Uuid::new_v4(), Uuid::new_v4(), status)
    }

    fn webhook_fixture(company_id: Uuid, website_id: Option<Uuid>) -> Webhook {
        testing::webhook(
            company_id,
            website_id,
            WebhookEvent::ArticleGenerate,
            "https://n8n.example.com/webhook/abc",
        )
    }

    fn repo_with(db: MockDatabase) -> Repository {
        Repository::new(DbPool::from_connection(db.into_connection()))
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn prompt_updates(repo: Repository) -> Vec<String> {
        repo.pool
            .into_statements()
            .into_iter()
            .map(|stmt| stmt.sql)
            .filter(|sql| sql.starts_with(r#"UPDATE "prompts""#) || sql.starts_with(r#"INSERT INTO "prompts""#))
            .collect()
    }

    #[test]
    fn test_apply_status_rejects_posted_to_processing() {
        let article = article_fixture(ArticleStatus::Posted);
        let mut active: ArticleActiveModel = article.into();
        let err = apply_status(
            &mut active,
            ArticleStatus::Posted,
            ArticleStatus::Processing,
            ArticleStatusUpdate::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_apply_status_processing_resets_progress() {
        let mut article = article_fixture(ArticleStatus::Failed);
        article.progress = 40;
        article.error_message = Some("timeout".to_string());
        let mut active: ArticleActiveModel = article.into();

        apply_status(
            &mut active,
            ArticleStatus::Failed,
            ArticleStatus::Processing,
            ArticleStatusUpdate::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(active.status.clone().unwrap(), "processing");
        assert_eq!(active.progress.clone().unwrap(), 0);
        assert_eq!(active.error_message.clone().unwrap(), None);
        assert!(active.processing_started_at.clone().unwrap().is_some());
    }

    #[test]
    fn test_apply_status_posted_stores_result() {
        let article = article_fixture(ArticleStatus::Processing);
        let mut active: ArticleActiveModel = article.into();

        apply_status(
            &mut active,
            ArticleStatus::Processing,
            ArticleStatus::Posted,
            ArticleStatusUpdate {
                content: Some("<p>Body</p>".to_string()),
                wordpress_post_id: Some(42),
                post_url: Some("https://blog.example.com/?p=42".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(active.progress.clone().unwrap(), 100);
        assert_eq!(active.wordpress_post_id.clone().unwrap(), Some(42));
        assert!(active.posted_at.clone().unwrap().is_some());
    }

    #[test]
    fn test_apply_status_progress_is_clamped() {
        let article = article_fixture(ArticleStatus::Processing);
        let mut active: ArticleActiveModel = article.into();

        apply_status(
            &mut active,
            ArticleStatus::Processing,
            ArticleStatus::Processing,
            ArticleStatusUpdate {
                progress: Some(250),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(active.progress.clone().unwrap(), 100);
    }

    #[tokio::test]
    async fn test_get_article_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Article>::new()]);
        let repo = repo_with(db);

        let err = repo.get_article(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_set_article_status_rejects_terminal() {
        let posted = article_fixture(ArticleStatus::Posted);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![posted.clone()]]);
        let repo = repo_with(db);

        let err = repo
            .set_article_status(posted.id, ArticleStatus::Failed, ArticleStatusUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_find_active_webhook_prefers_website_scope() {
        let company_id = Uuid::new_v4();
        let website_id = Uuid::new_v4();
        let company_wide = webhook_fixture(company_id, None);
        let site_specific = webhook_fixture(company_id, Some(website_id));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![company_wide, site_specific.clone()]]);
        let repo = repo_with(db);

        let found = repo
            .find_active_webhook(company_id, website_id, WebhookEvent::ArticleGenerate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, site_specific.id);
    }

    #[tokio::test]
    async fn test_create_default_prompt_clears_previous_default() {
        let company_id = Uuid::new_v4();
        let created = testing::prompt(company_id, "Write about {{title}}");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok()])
            .append_query_results([vec![created.clone()]]);
        let repo = repo_with(db);

        let prompt = repo
            .create_prompt(NewPrompt {
                company_id,
                name: created.name.clone(),
                content: created.content.clone(),
                is_default: true,
            })
            .await
            .unwrap();
        assert!(prompt.is_default);

        let statements = prompt_updates(repo);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with(r#"UPDATE "prompts" SET "is_default""#));
        assert!(statements[1].starts_with(r#"INSERT INTO "prompts""#));
    }

    #[tokio::test]
    async fn test_create_plain_prompt_keeps_existing_default() {
        let company_id = Uuid::new_v4();
        let mut created = testing::prompt(company_id, "Short news item");
        created.is_default = false;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![created.clone()]]);
        let repo = repo_with(db);

        repo.create_prompt(NewPrompt {
            company_id,
            name: created.name.clone(),
            content: created.content.clone(),
            is_default: false,
        })
        .await
        .unwrap();

        let statements = prompt_updates(repo);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with(r#"INSERT INTO "prompts""#));
    }

    #[tokio::test]
    async fn test_update_prompt_to_default_clears_siblings() {
        let company_id = Uuid::new_v4();
        let mut existing = testing::prompt(company_id, "Long form guide");
        existing.is_default = false;
        let updated = testing::prompt(company_id, "Long form guide");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .append_exec_results([exec_ok()])
            .append_query_results([vec![updated]]);
        let repo = repo_with(db);

        let prompt = repo
            .update_prompt(
                existing.id,
                PromptUpdate {
                    is_default: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(prompt.is_default);

        // Siblings are cleared first, excluding the prompt being promoted
        let statements = prompt_updates(repo);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains(r#""is_default" = "#));
        assert!(statements[0].contains("<>"));
        assert!(!statements[1].contains("<>"));
    }

    #[tokio::test]
    async fn test_update_article_requeues_failed_article() {
        let mut failed = article_fixture(ArticleStatus::Failed);
        failed.error_message = Some("n8n answered 500".to_string());
        let pending = testing::with_status(&failed, ArticleStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![failed.clone()]])
            .append_query_results([vec![pending]]);
        let repo = repo_with(db);

        let article = repo
            .update_article(
                failed.id,
                ArticleUpdate {
                    status: Some(ArticleStatus::Pending),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(article.article_status(), ArticleStatus::Pending);

        let update = repo
            .pool
            .into_statements()
            .into_iter()
            .find(|stmt| stmt.sql.starts_with(r#"UPDATE "articles""#))
            .unwrap();
        assert!(format!("{:?}", update.values).contains("pending"));
    }

    #[tokio::test]
    async fn test_update_article_rejects_non_pending_status() {
        let article = article_fixture(ArticleStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([
            vec![article.clone()],
            vec![article.clone()],
            vec![article.clone()],
        ]);
        let repo = repo_with(db);

        for status in [ArticleStatus::Processing, ArticleStatus::Posted, ArticleStatus::Failed] {
            let err = repo
                .update_article(
                    article.id,
                    ArticleUpdate {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .await
                .unwrap_err();
            match err {
                AppError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("status")),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_delete_company_reports_missing_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            },
        ]);
        let repo = repo_with(db);

        assert!(!repo.delete_company(Uuid::new_v4()).await.unwrap());
    }
}
