use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single post fetched from a community, before or after scoring.
///
/// `relevance_score` and `analysis_reason` are `None` until the relevance
/// scorer has run over the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub community: String,
    pub url: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: DateTime<Utc>,
    pub permalink: String,
    pub keywords_matched: Vec<String>,
    pub relevance_score: Option<f64>,
    pub analysis_reason: Option<String>,
}

impl Document {
    pub fn matched_keyword_count(&self) -> usize {
        self.keywords_matched.len()
    }

    /// Relevance used for ranking; unscored documents rank last.
    pub fn relevance(&self) -> f64 {
        self.relevance_score.unwrap_or(0.0)
    }
}

/// A document as stored, tagged with the run that first saved it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub external_id: String,
    pub search_id: Uuid,
    pub title: String,
    pub author: String,
    pub community: String,
    pub content: String,
    pub url: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: DateTime<Utc>,
    pub permalink: String,
    pub relevance_score: f64,
    pub analysis_reason: String,
    pub keywords_matched: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl DocumentRow {
    pub fn from_document(search_id: Uuid, document: &Document, saved_at: DateTime<Utc>) -> Self {
        Self {
            external_id: document.external_id.clone(),
            search_id,
            title: document.title.clone(),
            author: document.author.clone(),
            community: document.community.clone(),
            content: document.body.clone(),
            url: document.url.clone(),
            score: document.score,
            num_comments: document.num_comments,
            created_utc: document.created_utc,
            permalink: document.permalink.clone(),
            relevance_score: document.relevance(),
            analysis_reason: document.analysis_reason.clone().unwrap_or_default(),
            keywords_matched: document.keywords_matched.clone(),
            saved_at,
        }
    }
}

/// One comment under a post, flattened out of its reply tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
}
