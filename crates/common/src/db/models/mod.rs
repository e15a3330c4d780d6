//! SeaORM entity models
//!
//! Database entities for AutoPress

mod article;
mod company;
mod prompt;
mod system_log;
mod webhook;
mod website;

pub use company::{
    Entity as CompanyEntity,
    Model as Company,
    ActiveModel as CompanyActiveModel,
    Column as CompanyColumn,
};

pub use website::{
    Entity as WebsiteEntity,
    Model as Website,
    ActiveModel as WebsiteActiveModel,
    Column as WebsiteColumn,
};

pub use prompt::{
    Entity as PromptEntity,
    Model as Prompt,
    ActiveModel as PromptActiveModel,
    Column as PromptColumn,
};

pub use webhook::{
    Entity as WebhookEntity,
    Model as Webhook,
    ActiveModel as WebhookActiveModel,
    Column as WebhookColumn,
    WebhookEvent,
};

pub use article::{
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
    ArticleStatus,
};

pub use system_log::{
    Entity as SystemLogEntity,
    Model as SystemLog,
    ActiveModel as SystemLogActiveModel,
    Column as SystemLogColumn,
    LogLevel,
};
