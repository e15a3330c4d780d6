//! AutoPress Common Library
//!
//! Shared code for the AutoPress gateway including:
//! - Database models and repository patterns
//! - Article generation workflow
//! - Outbound webhook delivery and signing
//! - Prompt rendering
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod prompts;
pub mod webhooks;
pub mod workflow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use webhooks::{HttpWebhookClient, WebhookDispatcher};
pub use workflow::ArticleWorkflow;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
