//! Article entity and its generation status

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generation status of an article
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Pending,
    Processing,
    Posted,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Processing => "processing",
            ArticleStatus::Posted => "posted",
            ArticleStatus::Failed => "failed",
        }
    }

    /// `posted` is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArticleStatus::Posted)
    }

    /// Whether an article in this status may move to `next`.
    ///
    /// `processing -> processing` is allowed so n8n can report progress.
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Posted)
                | (Processing, Failed)
                | (Failed, Processing)
                | (Failed, Pending)
        )
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ArticleStatus::Pending),
            "processing" => Ok(ArticleStatus::Processing),
            "posted" => Ok(ArticleStatus::Posted),
            "failed" => Ok(ArticleStatus::Failed),
            other => Err(format!("unknown article status: {}", other)),
        }
    }
}

impl From<ArticleStatus> for String {
    fn from(status: ArticleStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    pub website_id: Uuid,

    pub prompt_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Comma separated focus keywords
    #[sea_orm(column_type = "Text", nullable)]
    pub keywords: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Generated body, filled in by the n8n callback
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    pub wordpress_post_id: Option<i64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub post_url: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    /// 0..=100
    pub progress: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub progress_message: Option<String>,

    pub scheduled_at: Option<DateTimeWithTimeZone>,

    pub processing_started_at: Option<DateTimeWithTimeZone>,

    pub posted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Parsed status. Rows are only written through [`ArticleStatus`], so an
    /// unknown value is treated as `pending`.
    pub fn article_status(&self) -> ArticleStatus {
        self.status.parse().unwrap_or(ArticleStatus::Pending)
    }

    /// Keywords split on commas, trimmed, empties dropped
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
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

    #[sea_orm(
        belongs_to = "super::prompt::Entity",
        from = "Column::PromptId",
        to = "super::prompt::Column::Id",
        on_delete = "SetNull"
    )]
    Prompt,
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

impl Related<super::prompt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prompt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use ArticleStatus::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [Pending, Processing, Posted, Failed] {
            assert_eq!(status.as_str().parse::<ArticleStatus>(), Ok(status));
        }
        assert!("draft".parse::<ArticleStatus>().is_err());
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Posted));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));
        assert!(Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_posted_is_terminal() {
        assert!(Posted.is_terminal());
        for next in [Pending, Processing, Posted, Failed] {
            assert!(!Posted.can_transition_to(next));
        }
    }

    #[test]
    fn test_pending_cannot_skip_to_posted() {
        assert!(!Pending.can_transition_to(Posted));
        assert!(!Failed.can_transition_to(Posted));
    }
}
