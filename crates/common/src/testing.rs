//! Row fixtures for tests
//!
//! Compiled for this crate's tests and, through the `testing` feature, for
//! downstream crates' tests.

use crate::db::models::*;
use chrono::{Duration, Utc};
use uuid::Uuid;

pub fn company() -> Company {
    let now = Utc::now();
    Company {
        id: Uuid::new_v4(),
        name: "Acme Motors".to_string(),
        description: None,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

pub fn website(company_id: Uuid) -> Website {
    let now = Utc::now();
    Website {
        id: Uuid::new_v4(),
        company_id,
        name: "Garage Blog".to_string(),
        url: "https://garage.example.com".to_string(),
        wordpress_username: Some("editor".to_string()),
        wordpress_app_password: Some("abcd efgh ijkl".to_string()),
        is_active: true,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

pub fn article(company_id: Uuid, website_id: Uuid, status: ArticleStatus) -> Article {
    let now = Utc::now();
    Article {
        id: Uuid::new_v4(),
        company_id,
        website_id,
        prompt_id: None,
        title: "Winter tyres explained".to_string(),
        keywords: Some("tyres, winter".to_string()),
        status: status.as_str().to_string(),
        content: None,
        wordpress_post_id: None,
        post_url: None,
        error_message: None,
        progress: 0,
        progress_message: None,
        scheduled_at: Some((now - Duration::minutes(5)).into()),
        processing_started_at: None,
        posted_at: None,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

/// Same row with a different status
pub fn with_status(article: &Article, status: ArticleStatus) -> Article {
    Article {
        status: status.as_str().to_string(),
        ..article.clone()
    }
}

pub fn webhook(company_id: Uuid, website_id: Option<Uuid>, event: WebhookEvent, url: &str) -> Webhook {
    let now = Utc::now();
    Webhook {
        id: Uuid::new_v4(),
        company_id,
        website_id,
        name: "n8n generator".to_string(),
        url: url.to_string(),
        event: event.as_str().to_string(),
        secret: None,
        is_active: true,
        last_triggered_at: None,
        last_status: None,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

pub fn prompt(company_id: Uuid, content: &str) -> Prompt {
    let now = Utc::now();
    Prompt {
        id: Uuid::new_v4(),
        company_id,
        name: "House style".to_string(),
        content: content.to_string(),
        is_default: true,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

pub fn system_log(article_id: Option<Uuid>) -> SystemLog {
    SystemLog {
        id: Uuid::new_v4(),
        level: LogLevel::Info.as_str().to_string(),
        source: "test".to_string(),
        message: "logged".to_string(),
        article_id,
        context: serde_json::json!({}),
        created_at: Utc::now().into(),
    }
}
