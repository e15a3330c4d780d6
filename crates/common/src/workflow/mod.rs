//! Article generation workflow
//!
//! Drives an article through `pending -> processing -> posted | failed`:
//! - Force-processing hands an article to the n8n generation webhook
//! - n8n callbacks report progress and the final outcome
//! - Due scheduled articles are triggered in batches

use crate::db::models::*;
use crate::db::{ArticleStatusUpdate, Repository};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::prompts::{render_prompt, PromptContext};
use crate::webhooks::{to_payload, DeliveryTarget, WebhookDispatcher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const SOURCE_FORCE_PROCESS: &str = "force-process";
const SOURCE_CALLBACK: &str = "n8n-callback";
const SOURCE_SCHEDULER: &str = "scheduler";

/// Payload sent to the `article.generate` webhook
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub event: &'static str,

    pub article_id: Uuid,

    pub title: String,

    pub keywords: Vec<String>,

    /// Rendered prompt, if the article or its company has one
    pub prompt: Option<String>,

    pub website: WebsiteTarget,

    pub company: CompanyRef,

    /// Where n8n reports progress and results
    pub callback_url: String,

    pub triggered_at: DateTime<Utc>,
}

/// WordPress site n8n publishes to
#[derive(Debug, Clone, Serialize)]
pub struct WebsiteTarget {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub wordpress_username: Option<String>,
    pub wordpress_app_password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyRef {
    pub id: Uuid,
    pub name: String,
}

/// Payload sent to `article.posted` webhooks
#[derive(Debug, Clone, Serialize)]
pub struct PostedNotification {
    pub event: &'static str,
    pub article_id: Uuid,
    pub company_id: Uuid,
    pub website_id: Uuid,
    pub title: String,
    pub wordpress_post_id: Option<i64>,
    pub post_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Status report posted back by n8n
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct N8nCallback {
    pub article_id: Uuid,

    /// `processing`, `posted` or `failed`
    pub status: ArticleStatus,

    #[validate(range(min = 0, max = 100))]
    pub progress: Option<i32>,

    #[validate(length(max = 500))]
    pub message: Option<String>,

    pub content: Option<String>,

    pub wordpress_post_id: Option<i64>,

    #[validate(url)]
    pub post_url: Option<String>,

    pub error: Option<String>,
}

/// Result of triggering one due article
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub article_id: Uuid,
    pub triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Article workflow service
pub struct ArticleWorkflow {
    repo: Repository,
    dispatcher: Arc<dyn WebhookDispatcher>,
    callback_url: String,
}

impl ArticleWorkflow {
    pub fn new(
        repo: Repository,
        dispatcher: Arc<dyn WebhookDispatcher>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            dispatcher,
            callback_url: callback_url.into(),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Hand an article to its generation webhook.
    ///
    /// The article is marked `processing` before the call. If the call
    /// fails the article ends up `failed` with the delivery error and the
    /// error is returned.
    pub async fn force_process(&self, article_id: Uuid) -> Result<Article> {
        let article = self.repo.get_article(article_id).await?;
        let status = article.article_status();
        if !status.can_transition_to(ArticleStatus::Processing) {
            return Err(AppError::InvalidTransition {
                from: status.to_string(),
                to: ArticleStatus::Processing.to_string(),
            });
        }

        let website = self.repo.get_website(article.website_id).await?;
        let company = self.repo.get_company(article.company_id).await?;

        let webhook = self
            .repo
            .find_active_webhook(company.id, website.id, WebhookEvent::ArticleGenerate)
            .await?
            .ok_or_else(|| AppError::NoWebhookConfigured {
                event: WebhookEvent::ArticleGenerate.to_string(),
                website_id: website.id.to_string(),
            })?;

        let prompt = self.resolve_prompt(&article, &website, &company).await?;

        let article = self
            .repo
            .set_article_status(
                article.id,
                ArticleStatus::Processing,
                ArticleStatusUpdate {
                    progress_message: Some("Sent to n8n".to_string()),
                    ..Default::default()
                },
            )
            .await?;
        metrics::record_article_transition(ArticleStatus::Processing.as_str());

        let request = GenerationRequest {
            event: WebhookEvent::ArticleGenerate.as_str(),
            article_id: article.id,
            title: article.title.clone(),
            keywords: article.keyword_list(),
            prompt,
            website: WebsiteTarget {
                id: website.id,
                name: website.name.clone(),
                url: website.url.clone(),
                wordpress_username: website.wordpress_username.clone(),
                wordpress_app_password: website.wordpress_app_password.clone(),
            },
            company: CompanyRef {
                id: company.id,
                name: company.name.clone(),
            },
            callback_url: self.callback_url.clone(),
            triggered_at: Utc::now(),
        };
        let payload = to_payload(&request)?;

        let target = DeliveryTarget {
            url: webhook.url.clone(),
            secret: webhook.secret.clone(),
            event: WebhookEvent::ArticleGenerate,
        };

        match self.dispatcher.dispatch(&target, &payload).await {
            Ok(receipt) => {
                self.record_delivery(webhook.id, Some(receipt.status)).await;

                info!(
                    article_id = %article.id,
                    webhook_id = %webhook.id,
                    delivery_id = %receipt.delivery_id,
                    status = receipt.status,
                    "Article sent for generation"
                );
                self.log(
                    LogLevel::Info,
                    SOURCE_FORCE_PROCESS,
                    format!("Article '{}' sent to n8n", article.title),
                    Some(article.id),
                    serde_json::json!({
                        "webhook_id": webhook.id,
                        "delivery_id": receipt.delivery_id,
                        "status": receipt.status,
                        "duration_ms": receipt.duration_ms,
                    }),
                )
                .await;

                Ok(article)
            }
            Err(err) => {
                let status = match &err {
                    AppError::WebhookDelivery { status, .. } => *status,
                    _ => None,
                };

                self.repo
                    .set_article_status(
                        article.id,
                        ArticleStatus::Failed,
                        ArticleStatusUpdate {
                            error_message: Some(err.to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                metrics::record_article_transition(ArticleStatus::Failed.as_str());
                self.record_delivery(webhook.id, status).await;

                warn!(
                    article_id = %article.id,
                    webhook_id = %webhook.id,
                    error = %err,
                    "Article generation trigger failed"
                );
                self.log(
                    LogLevel::Error,
                    SOURCE_FORCE_PROCESS,
                    format!("Failed to send article '{}' to n8n", article.title),
                    Some(article.id),
                    serde_json::json!({
                        "webhook_id": webhook.id,
                        "status": status,
                        "error": err.to_string(),
                    }),
                )
                .await;

                Err(err)
            }
        }
    }

    /// Apply a status report from n8n
    pub async fn handle_callback(&self, callback: N8nCallback) -> Result<Article> {
        callback.validate()?;
        metrics::record_callback(callback.status.as_str());

        let (article, level, message) = match callback.status {
            ArticleStatus::Pending => {
                return Err(AppError::Validation {
                    message: "callback status must be processing, posted or failed".to_string(),
                    field: Some("status".to_string()),
                });
            }
            ArticleStatus::Processing => {
                let article = self
                    .repo
                    .set_article_status(
                        callback.article_id,
                        ArticleStatus::Processing,
                        ArticleStatusUpdate {
                            progress: callback.progress,
                            progress_message: callback.message.clone(),
                            ..Default::default()
                        },
                    )
                    .await?;
                let message = format!(
                    "Progress {}%{}",
                    article.progress,
                    callback
                        .message
                        .as_deref()
                        .map(|m| format!(": {}", m))
                        .unwrap_or_default()
                );
                (article, LogLevel::Info, message)
            }
            ArticleStatus::Posted => {
                let article = self
                    .repo
                    .set_article_status(
                        callback.article_id,
                        ArticleStatus::Posted,
                        ArticleStatusUpdate {
                            progress_message: callback.message.clone(),
                            content: callback.content.clone(),
                            wordpress_post_id: callback.wordpress_post_id,
                            post_url: callback.post_url.clone(),
                            ..Default::default()
                        },
                    )
                    .await?;
                let message = match &article.post_url {
                    Some(url) => format!("Article '{}' posted at {}", article.title, url),
                    None => format!("Article '{}' posted", article.title),
                };
                (article, LogLevel::Info, message)
            }
            ArticleStatus::Failed => {
                let error = callback
                    .error
                    .clone()
                    .or_else(|| callback.message.clone());
                let article = self
                    .repo
                    .set_article_status(
                        callback.article_id,
                        ArticleStatus::Failed,
                        ArticleStatusUpdate {
                            error_message: error,
                            ..Default::default()
                        },
                    )
                    .await?;
                let message = format!(
                    "Article '{}' failed: {}",
                    article.title,
                    article.error_message.as_deref().unwrap_or("unknown error")
                );
                (article, LogLevel::Error, message)
            }
        };

        if callback.status != ArticleStatus::Processing {
            metrics::record_article_transition(callback.status.as_str());
        }

        info!(
            article_id = %article.id,
            status = %callback.status,
            progress = article.progress,
            "n8n callback applied"
        );
        self.log(
            level,
            SOURCE_CALLBACK,
            message,
            Some(article.id),
            serde_json::json!({
                "status": callback.status,
                "progress": callback.progress,
                "wordpress_post_id": callback.wordpress_post_id,
            }),
        )
        .await;

        if callback.status == ArticleStatus::Posted {
            self.notify_posted(&article).await;
        }

        Ok(article)
    }

    /// Progress report for an article that is already processing.
    ///
    /// Progress is clamped to `0..=100`.
    pub async fn update_progress(
        &self,
        article_id: Uuid,
        progress: i32,
        message: Option<String>,
    ) -> Result<Article> {
        let current = self.repo.get_article(article_id).await?.article_status();
        if current != ArticleStatus::Processing {
            return Err(AppError::InvalidTransition {
                from: current.to_string(),
                to: ArticleStatus::Processing.to_string(),
            });
        }

        self.repo
            .update_article_progress(article_id, progress.clamp(0, 100), message)
            .await
    }

    /// Trigger up to `limit` pending articles whose schedule is due.
    ///
    /// Articles are processed one after another. A failure is reported in
    /// the outcome and does not stop the batch.
    pub async fn dispatch_due(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<DispatchOutcome>> {
        let due = self.repo.list_due_articles(now, limit).await?;
        let mut outcomes = Vec::with_capacity(due.len());

        for article in due {
            let outcome = match self.force_process(article.id).await {
                Ok(_) => DispatchOutcome {
                    article_id: article.id,
                    triggered: true,
                    error: None,
                },
                Err(e) => {
                    // Delivery failures were already logged by force_process
                    if !matches!(e, AppError::WebhookDelivery { .. } | AppError::HttpClient(_)) {
                        self.log(
                            LogLevel::Warn,
                            SOURCE_SCHEDULER,
                            format!("Scheduled article '{}' not triggered", article.title),
                            Some(article.id),
                            serde_json::json!({ "error": e.to_string() }),
                        )
                        .await;
                    }
                    DispatchOutcome {
                        article_id: article.id,
                        triggered: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let triggered = outcomes.iter().filter(|o| o.triggered).count();
        info!(
            due = outcomes.len(),
            triggered,
            failed = outcomes.len() - triggered,
            "Scheduled dispatch finished"
        );

        Ok(outcomes)
    }

    async fn resolve_prompt(
        &self,
        article: &Article,
        website: &Website,
        company: &Company,
    ) -> Result<Option<String>> {
        let prompt = match article.prompt_id {
            Some(id) => self.repo.find_prompt(id).await?,
            None => None,
        };
        let prompt = match prompt {
            Some(p) => Some(p),
            None => self.repo.default_prompt_for_company(company.id).await?,
        };

        Ok(prompt.map(|p| {
            let ctx = PromptContext {
                title: article.title.clone(),
                keywords: article.keyword_list(),
                website_name: website.name.clone(),
                website_url: website.url.clone(),
                company_name: company.name.clone(),
            };
            render_prompt(&p.content, &ctx)
        }))
    }

    /// Tell `article.posted` subscribers. Failures are logged, never returned.
    async fn notify_posted(&self, article: &Article) {
        let hooks = match self
            .repo
            .list_active_webhooks(article.company_id, article.website_id, WebhookEvent::ArticlePosted)
            .await
        {
            Ok(hooks) => hooks,
            Err(e) => {
                warn!(article_id = %article.id, error = %e, "Could not load article.posted webhooks");
                return;
            }
        };

        if hooks.is_empty() {
            return;
        }

        let notification = PostedNotification {
            event: WebhookEvent::ArticlePosted.as_str(),
            article_id: article.id,
            company_id: article.company_id,
            website_id: article.website_id,
            title: article.title.clone(),
            wordpress_post_id: article.wordpress_post_id,
            post_url: article.post_url.clone(),
            posted_at: article.posted_at.map(|t| t.with_timezone(&Utc)),
        };
        let payload = match to_payload(&notification) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(article_id = %article.id, error = %e, "Could not encode posted notification");
                return;
            }
        };

        for hook in hooks {
            let target = DeliveryTarget {
                url: hook.url.clone(),
                secret: hook.secret.clone(),
                event: WebhookEvent::ArticlePosted,
            };
            let status = match self.dispatcher.dispatch(&target, &payload).await {
                Ok(receipt) => Some(receipt.status),
                Err(e) => {
                    warn!(article_id = %article.id, webhook_id = %hook.id, error = %e, "Posted notification failed");
                    self.log(
                        LogLevel::Warn,
                        SOURCE_CALLBACK,
                        format!("Notification to webhook '{}' failed", hook.name),
                        Some(article.id),
                        serde_json::json!({ "webhook_id": hook.id, "error": e.to_string() }),
                    )
                    .await;
                    match e {
                        AppError::WebhookDelivery { status, .. } => status,
                        _ => None,
                    }
                }
            };
            self.record_delivery(hook.id, status).await;
        }
    }

    /// Stamp the webhook's last delivery. A failed write is traced and dropped.
    async fn record_delivery(&self, webhook_id: Uuid, status: Option<u16>) {
        if let Err(e) = self.repo.record_webhook_delivery(webhook_id, status).await {
            warn!(webhook_id = %webhook_id, error = %e, "Could not record webhook delivery");
        }
    }

    /// Write a system log row. A failed write is traced and dropped.
    async fn log(
        &self,
        level: LogLevel,
        source: &str,
        message: String,
        article_id: Option<Uuid>,
        context: serde_json::Value,
    ) {
        if let Err(e) = self
            .repo
            .insert_log(level, source, message, article_id, context)
            .await
        {
            warn!(source, error = %e, "Failed to write system log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbPool;
    use crate::testing;
    use crate::webhooks::DeliveryReceipt;
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use std::sync::Mutex;

    /// Records payloads and answers with a fixed result
    struct RecordingDispatcher {
        fail_with: Option<u16>,
        sent: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl RecordingDispatcher {
        fn ok() -> Arc<Self> {
            Arc::new(Self { fail_with: None, sent: Mutex::new(Vec::new()) })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self { fail_with: Some(status), sent: Mutex::new(Vec::new()) })
        }

        fn sent(&self) -> Vec<(String, serde_json::Value)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebhookDispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            target: &DeliveryTarget,
            payload: &serde_json::Value,
        ) -> Result<DeliveryReceipt> {
            self.sent.lock().unwrap().push((target.url.clone(), payload.clone()));
            match self.fail_with {
                Some(status) => Err(AppError::WebhookDelivery {
                    status: Some(status),
                    message: "workflow crashed".to_string(),
                }),
                None => Ok(DeliveryReceipt {
                    delivery_id: Uuid::new_v4(),
                    status: 200,
                    duration_ms: 12,
                }),
            }
        }
    }

    fn workflow(db: MockDatabase, dispatcher: Arc<RecordingDispatcher>) -> ArticleWorkflow {
        let repo = Repository::new(DbPool::from_connection(db.into_connection()));
        ArticleWorkflow::new(repo, dispatcher, "https://autopress.example.com/api/webhooks/n8n")
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult { last_insert_id: 0, rows_affected: 1 }
    }

    #[tokio::test]
    async fn test_force_process_sends_generation_request() {
        let company = testing::company();
        let website = testing::website(company.id);
        let article = testing::article(company.id, website.id, ArticleStatus::Pending);
        let processing = testing::with_status(&article, ArticleStatus::Processing);
        let hook = testing::webhook(company.id, None, WebhookEvent::ArticleGenerate, "https://n8n.example.com/gen");
        let prompt = testing::prompt(company.id, "Write about {{title}} for {{company_name}}");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![website.clone()]])
            .append_query_results([vec![company.clone()]])
            .append_query_results([vec![hook.clone()]])
            .append_query_results([vec![prompt]])
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![processing.clone()]])
            .append_exec_results([exec_ok()])
            .append_query_results([vec![testing::system_log(Some(article.id))]]);

        let dispatcher = RecordingDispatcher::ok();
        let result = workflow(db, dispatcher.clone()).force_process(article.id).await.unwrap();
        assert_eq!(result.article_status(), ArticleStatus::Processing);

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        let (url, payload) = &sent[0];
        assert_eq!(url, "https://n8n.example.com/gen");
        assert_eq!(payload["event"], "article.generate");
        assert_eq!(payload["article_id"], article.id.to_string());
        assert_eq!(payload["keywords"], serde_json::json!(["tyres", "winter"]));
        assert_eq!(payload["prompt"], "Write about Winter tyres explained for Acme Motors");
        assert_eq!(payload["website"]["url"], "https://garage.example.com");
        assert_eq!(payload["company"]["name"], "Acme Motors");
        assert_eq!(payload["callback_url"], "https://autopress.example.com/api/webhooks/n8n");
    }

    #[tokio::test]
    async fn test_force_process_marks_failed_on_delivery_error() {
        let company = testing::company();
        let website = testing::website(company.id);
        let article = testing::article(company.id, website.id, ArticleStatus::Failed);
        let processing = testing::with_status(&article, ArticleStatus::Processing);
        let failed = testing::with_status(&article, ArticleStatus::Failed);
        let hook = testing::webhook(company.id, Some(website.id), WebhookEvent::ArticleGenerate, "https://n8n.example.com/gen");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![website]])
            .append_query_results([vec![company]])
            .append_query_results([vec![hook]])
            .append_query_results([Vec::<Prompt>::new()])
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![processing.clone()]])
            .append_exec_results([exec_ok()])
            .append_query_results([vec![processing]])
            .append_query_results([vec![failed]])
            .append_query_results([vec![testing::system_log(Some(article.id))]]);

        let dispatcher = RecordingDispatcher::failing(500);
        let err = workflow(db, dispatcher.clone()).force_process(article.id).await.unwrap_err();

        match err {
            AppError::WebhookDelivery { status, .. } => assert_eq!(status, Some(500)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(dispatcher.sent().len(), 1);
        assert!(dispatcher.sent()[0].1["prompt"].is_null());
    }

    #[tokio::test]
    async fn test_force_process_marks_failed_when_delivery_stamp_fails() {
        let company = testing::company();
        let website = testing::website(company.id);
        let article = testing::article(company.id, website.id, ArticleStatus::Pending);
        let processing = testing::with_status(&article, ArticleStatus::Processing);
        let failed = testing::with_status(&article, ArticleStatus::Failed);
        let hook = testing::webhook(company.id, None, WebhookEvent::ArticleGenerate, "https://n8n.example.com/gen");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![website]])
            .append_query_results([vec![company]])
            .append_query_results([vec![hook]])
            .append_query_results([Vec::<Prompt>::new()])
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![processing.clone()]])
            .append_query_results([vec![processing]])
            .append_query_results([vec![failed]])
            .append_exec_errors([DbErr::Custom("connection reset".to_string())])
            .append_query_results([vec![testing::system_log(Some(article.id))]]);

        let err = workflow(db, RecordingDispatcher::failing(503))
            .force_process(article.id)
            .await
            .unwrap_err();

        // The delivery error surfaces, not the bookkeeping one
        match err {
            AppError::WebhookDelivery { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_force_process_succeeds_when_delivery_stamp_fails() {
        let company = testing::company();
        let website = testing::website(company.id);
        let article = testing::article(company.id, website.id, ArticleStatus::Pending);
        let processing = testing::with_status(&article, ArticleStatus::Processing);
        let hook = testing::webhook(company.id, None, WebhookEvent::ArticleGenerate, "https://n8n.example.com/gen");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![website]])
            .append_query_results([vec![company]])
            .append_query_results([vec![hook]])
            .append_query_results([Vec::<Prompt>::new()])
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![processing]])
            .append_exec_errors([DbErr::Custom("connection reset".to_string())])
            .append_query_results([vec![testing::system_log(Some(article.id))]]);

        let dispatcher = RecordingDispatcher::ok();
        let result = workflow(db, dispatcher.clone()).force_process(article.id).await.unwrap();

        assert_eq!(result.article_status(), ArticleStatus::Processing);
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_force_process_rejects_posted_article() {
        let article = testing::article(Uuid::new_v4(), Uuid::new_v4(), ArticleStatus::Posted);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![article.clone()]]);

        let dispatcher = RecordingDispatcher::ok();
        let err = workflow(db, dispatcher.clone()).force_process(article.id).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_force_process_requires_generation_webhook() {
        let company = testing::company();
        let website = testing::website(company.id);
        let article = testing::article(company.id, website.id, ArticleStatus::Pending);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![website]])
            .append_query_results([vec![company]])
            .append_query_results([Vec::<Webhook>::new()]);

        let err = workflow(db, RecordingDispatcher::ok()).force_process(article.id).await.unwrap_err();
        assert!(matches!(err, AppError::NoWebhookConfigured { .. }));
    }

    #[tokio::test]
    async fn test_posted_callback_stores_result_and_notifies() {
        let company = testing::company();
        let website = testing::website(company.id);
        let article = testing::article(company.id, website.id, ArticleStatus::Processing);
        let mut posted = testing::with_status(&article, ArticleStatus::Posted);
        posted.wordpress_post_id = Some(4211);
        posted.post_url = Some("https://garage.example.com/winter-tyres".to_string());
        let hook = testing::webhook(company.id, None, WebhookEvent::ArticlePosted, "https://hooks.example.com/posted");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![posted.clone()]])
            .append_query_results([vec![testing::system_log(Some(article.id))]])
            .append_query_results([vec![hook]])
            .append_exec_results([exec_ok()]);

        let dispatcher = RecordingDispatcher::ok();
        let callback = N8nCallback {
            article_id: article.id,
            status: ArticleStatus::Posted,
            progress: None,
            message: None,
            content: Some("<p>Tyres</p>".to_string()),
            wordpress_post_id: Some(4211),
            post_url: Some("https://garage.example.com/winter-tyres".to_string()),
            error: None,
        };

        let result = workflow(db, dispatcher.clone()).handle_callback(callback).await.unwrap();
        assert_eq!(result.article_status(), ArticleStatus::Posted);

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1["event"], "article.posted");
        assert_eq!(sent[0].1["wordpress_post_id"], 4211);
    }

    #[tokio::test]
    async fn test_processing_callback_starts_pending_article() {
        let article = testing::article(Uuid::new_v4(), Uuid::new_v4(), ArticleStatus::Pending);
        let mut processing = testing::with_status(&article, ArticleStatus::Processing);
        processing.progress = 10;
        processing.progress_message = Some("Outlining".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![article.clone()]])
            .append_query_results([vec![processing]])
            .append_query_results([vec![testing::system_log(Some(article.id))]]);

        let dispatcher = RecordingDispatcher::ok();
        let callback = N8nCallback {
            article_id: article.id,
            status: ArticleStatus::Processing,
            progress: Some(10),
            message: Some("Outlining".to_string()),
            content: None,
            wordpress_post_id: None,
            post_url: None,
            error: None,
        };

        let result = workflow(db, dispatcher.clone()).handle_callback(callback).await.unwrap();
        assert_eq!(result.article_status(), ArticleStatus::Processing);
        assert_eq!(result.progress, 10);
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_callback_rejects_pending_status() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let callback = N8nCallback {
            article_id: Uuid::new_v4(),
            status: ArticleStatus::Pending,
            progress: None,
            message: None,
            content: None,
            wordpress_post_id: None,
            post_url: None,
            error: None,
        };

        let err = workflow(db, RecordingDispatcher::ok()).handle_callback(callback).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_callback_on_posted_article_is_conflict() {
        let article = testing::article(Uuid::new_v4(), Uuid::new_v4(), ArticleStatus::Posted);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![article.clone()]]);
        let callback = N8nCallback {
            article_id: article.id,
            status: ArticleStatus::Failed,
            progress: None,
            message: None,
            content: None,
            wordpress_post_id: None,
            post_url: None,
            error: Some("late failure".to_string()),
        };

        let err = workflow(db, RecordingDispatcher::ok()).handle_callback(callback).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_update_progress_requires_processing() {
        let article = testing::article(Uuid::new_v4(), Uuid::new_v4(), ArticleStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![article.clone()]]);

        let err = workflow(db, RecordingDispatcher::ok())
            .update_progress(article.id, 40, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_due_reports_each_article() {
        let company = testing::company();
        let website = testing::website(company.id);
        let first = testing::article(company.id, website.id, ArticleStatus::Pending);
        let second = testing::article(company.id, website.id, ArticleStatus::Pending);

        // Both articles fail the same way: no generation webhook
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![first.clone(), second.clone()]])
            .append_query_results([vec![first.clone()]])
            .append_query_results([vec![website.clone()]])
            .append_query_results([vec![company.clone()]])
            .append_query_results([Vec::<Webhook>::new()])
            .append_query_results([vec![testing::system_log(Some(first.id))]])
            .append_query_results([vec![second.clone()]])
            .append_query_results([vec![website]])
            .append_query_results([vec![company]])
            .append_query_results([Vec::<Webhook>::new()])
            .append_query_results([vec![testing::system_log(Some(second.id))]]);

        let outcomes = workflow(db, RecordingDispatcher::ok())
            .dispatch_due(Utc::now(), 25)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].article_id, first.id);
        assert!(outcomes.iter().all(|o| !o.triggered));
        assert!(outcomes[0].error.as_deref().unwrap_or_default().contains("webhook"));
    }
}
