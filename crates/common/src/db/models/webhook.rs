//! Outbound webhook integration entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Events a webhook can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    /// Triggers the n8n generation workflow for an article
    #[serde(rename = "article.generate")]
    ArticleGenerate,

    /// Fired after n8n reports an article as posted
    #[serde(rename = "article.posted")]
    ArticlePosted,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::ArticleGenerate => "article.generate",
            WebhookEvent::ArticlePosted => "article.posted",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article.generate" => Ok(WebhookEvent::ArticleGenerate),
            "article.posted" => Ok(WebhookEvent::ArticlePosted),
            other => Err(format!("unknown webhook event: {}", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhooks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    /// Scopes the webhook to one website; company-wide when null
    pub website_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub url: String,

    #[sea_orm(column_type = "Text")]
    pub event: String,

    /// HMAC signing secret
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing, default)]
    pub secret: Option<String>,

    pub is_active: bool,

    pub last_triggered_at: Option<DateTimeWithTimeZone>,

    /// HTTP status of the last delivery, null when the request never got a response
    pub last_status: Option<i32>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Parsed event, `None` for rows written with an unknown event name
    pub fn webhook_event(&self) -> Option<WebhookEvent> {
        self.event.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id",
        on_delete = "Cascade"
    )]
    Company,

    #[sea_orm(
        belongs_to = "super::website::Entity",
        from = "Column::WebsiteId",
        to = "super::website::Column::Id",
        on_delete = "Cascade"
    )]
    Website,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::website::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Website.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_parse() {
        assert_eq!("article.generate".parse::<WebhookEvent>(), Ok(WebhookEvent::ArticleGenerate));
        assert_eq!("article.posted".parse::<WebhookEvent>(), Ok(WebhookEvent::ArticlePosted));
        assert!("article.deleted".parse::<WebhookEvent>().is_err());
    }

    #[test]
    fn test_event_serde_name() {
        let json = serde_json::to_string(&WebhookEvent::ArticleGenerate).unwrap();
        assert_eq!(json, "\"article.generate\"");
    }
}
