//! Document sources: where posts come from before scoring.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::document::{Comment, Document};

pub mod reddit;

/// Community name meaning "search the whole platform".
pub const ALL_COMMUNITIES: &str = "all";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source returned status {status} for '{target}'")]
    Status { status: u16, target: String },

    #[error("could not decode listing: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Searches one community for posts matching any keyword.
    async fn fetch(
        &self,
        community: &str,
        keywords: &[String],
        limit: u32,
    ) -> Result<Vec<Document>, SourceError>;

    /// Up to `limit` comments under one post, breadth-first through replies.
    async fn comments(&self, external_id: &str, limit: u32) -> Result<Vec<Comment>, SourceError>;
}

/// Keywords that appear, case-insensitively, in the title or body. Keeps the
/// caller's keyword order and spelling.
pub fn match_keywords(keywords: &[String], title: &str, body: &str) -> Vec<String> {
    let title = title.to_lowercase();
    let body = body.to_lowercase();
    keywords
        .iter()
        .filter(|kw| {
            let kw = kw.to_lowercase();
            title.contains(&kw) || body.contains(&kw)
        })
        .cloned()
        .collect()
}
