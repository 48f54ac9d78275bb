use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Aggregated view of a filtered document set.
///
/// Every field defaults to empty so partial oracle payloads still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub trends: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Metadata for one pipeline execution. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRun {
    pub search_id: Uuid,
    pub keywords: Vec<String>,
    pub communities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub post_count: i64,
    pub filtered_count: i64,
    pub insights: Insights,
}

impl SearchRun {
    /// Builds a run record, capping `filtered_count` at `post_count`.
    pub fn new(
        search_id: Uuid,
        keywords: Vec<String>,
        communities: Vec<String>,
        post_count: usize,
        filtered_count: usize,
        insights: Insights,
    ) -> Self {
        let post_count = post_count as i64;
        Self {
            search_id,
            keywords,
            communities,
            created_at: Utc::now(),
            post_count,
            filtered_count: (filtered_count as i64).min(post_count),
            insights,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct SearchRunRow {
    pub search_id: Uuid,
    pub keywords: Vec<String>,
    pub communities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub post_count: i64,
    pub filtered_count: i64,
    pub insights: Json<Insights>,
}

impl From<SearchRunRow> for SearchRun {
    fn from(row: SearchRunRow) -> Self {
        Self {
            search_id: row.search_id,
            keywords: row.keywords,
            communities: row.communities,
            created_at: row.created_at,
            post_count: row.post_count,
            filtered_count: row.filtered_count,
            insights: row.insights.0,
        }
    }
}
