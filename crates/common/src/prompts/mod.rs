//! Prompt template rendering
//!
//! Templates use `{{ name }}` placeholders. Unknown names are left as-is so
//! n8n can fill them in later.

use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

/// Values available to a prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub title: String,
    pub keywords: Vec<String>,
    pub website_name: String,
    pub website_url: String,
    pub company_name: String,
}

impl PromptContext {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "title" => Some(self.title.clone()),
            "keywords" => Some(self.keywords.join(", ")),
            "website_name" => Some(self.website_name.clone()),
            "website_url" => Some(self.website_url.clone()),
            "company_name" => Some(self.company_name.clone()),
            _ => None,
        }
    }
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("valid placeholder regex"))
}

/// Substitute known placeholders in `template`
pub fn render_prompt(template: &str, ctx: &PromptContext) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            ctx.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
