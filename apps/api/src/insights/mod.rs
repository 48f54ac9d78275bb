//! Insight aggregation: reduces a filtered document set to a summary, trends
//! and topics, through the LLM when it answers and a deterministic fallback
//! when it does not.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

pub mod prompts;

use crate::insights::prompts::INSIGHTS_PROMPT_TEMPLATE;
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::models::document::Document;
use crate::models::search::Insights;
use crate::scoring::oracle::{OracleError, RemoteOracle};

/// Number of top-ranked titles sent to the oracle.
pub const TOP_K: usize = 5;
pub const EMPTY_SUMMARY: &str = "No posts to analyze.";

/// Source of aggregate insights for a list of titles.
#[async_trait]
pub trait InsightOracle: Send + Sync {
    async fn summarize(&self, titles: &[String]) -> Result<Insights, OracleError>;
}

#[async_trait]
impl InsightOracle for RemoteOracle {
    async fn summarize(&self, titles: &[String]) -> Result<Insights, OracleError> {
        let prompt = build_insights_prompt(titles);
        Ok(self.llm().generate_json::<Insights>(&prompt).await?)
    }
}

pub struct InsightAggregator {
    oracle: Option<Arc<dyn InsightOracle>>,
}

impl InsightAggregator {
    pub fn new(oracle: Option<Arc<dyn InsightOracle>>) -> Self {
        Self { oracle }
    }

    /// Aggregates the filtered documents. Never fails.
    ///
    /// Oracle insights are returned as-is; on oracle failure the fallback
    /// covers the whole filtered set, not only the top titles.
    pub async fn aggregate(&self, documents: &[Document]) -> Insights {
        if documents.is_empty() {
            return empty_insights();
        }

        let Some(oracle) = &self.oracle else {
            return fallback_insights(documents);
        };

        let titles: Vec<String> = top_documents(documents, TOP_K)
            .into_iter()
            .map(|d| d.title.clone())
            .collect();

        match oracle.summarize(&titles).await {
            Ok(insights) => {
                info!(
                    "Extracted insights from top {} of {} posts",
                    titles.len(),
                    documents.len()
                );
                insights
            }
            Err(e) => {
                warn!("Insight extraction failed, using keyword summary: {e}");
                fallback_insights(documents)
            }
        }
    }
}

/// Placeholder for an empty filtered set.
pub fn empty_insights() -> Insights {
    Insights {
        summary: EMPTY_SUMMARY.to_string(),
        trends: Vec::new(),
        topics: Vec::new(),
    }
}

/// Deterministic summary: counts plus the union of matched keywords, sorted.
pub fn fallback_insights(documents: &[Document]) -> Insights {
    let count = documents.len();
    let topics: BTreeSet<&str> = documents
        .iter()
        .flat_map(|d| d.keywords_matched.iter().map(String::as_str))
        .collect();
    Insights {
        summary: format!("Analyzed {count} filtered posts."),
        trends: vec![format!("{count} posts found")],
        topics: topics.into_iter().map(str::to_string).collect(),
    }
}

/// Highest relevance first; ties keep input order.
pub fn top_documents(documents: &[Document], k: usize) -> Vec<&Document> {
    let mut ranked: Vec<&Document> = documents.iter().collect();
    ranked.sort_by(|a, b| {
        b.relevance()
            .partial_cmp(&a.relevance())
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(k);
    ranked
}

pub fn build_insights_prompt(titles: &[String]) -> String {
    let numbered = titles
        .iter()
        .enumerate()
        .map(|(i, title)| format!("{}. {}", i + 1, title))
        .collect::<Vec<_>>()
        .join("\n");
    INSIGHTS_PROMPT_TEMPLATE
        .replace("{titles}", &numbered)
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::oracle::tests::make_document;
    use std::sync::Mutex;

    struct RecordingOracle {
        seen: Mutex<Vec<String>>,
        reply: Option<Insights>,
    }

    #[async_trait]
    impl InsightOracle for RecordingOracle {
        async fn summarize(&self, titles: &[String]) -> Result<Insights, OracleError> {
            self.seen.lock().unwrap().extend(titles.iter().cloned());
            self.reply
                .clone()
                .ok_or_else(|| OracleError::MalformedResponse("not json".to_string()))
        }
    }

    fn scored(id: &str, title: &str, relevance: f64, keywords: &[&str]) -> Document {
        let mut doc = make_document(id, title, keywords);
        doc.relevance_score = Some(relevance);
        doc
    }

    #[tokio::test]
    async fn test_empty_set_returns_placeholder_without_calling_oracle() {
        let oracle = Arc::new(RecordingOracle {
            seen: Mutex::new(vec![]),
            reply: None,
        });
        let aggregator = InsightAggregator::new(Some(oracle.clone()));

        let first = aggregator.aggregate(&[]).await;
        let second = aggregator.aggregate(&[]).await;

        assert_eq!(first, second);
        assert_eq!(first.summary, EMPTY_SUMMARY);
        assert!(first.trends.is_empty());
        assert!(first.topics.is_empty());
        assert!(oracle.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oracle_insights_returned_as_is() {
        let reply = Insights {
            summary: "GC talk is hot".to_string(),
            trends: vec!["arenas".to_string()],
            topics: vec!["memory".to_string(), "memory".to_string()],
        };
        let oracle = Arc::new(RecordingOracle {
            seen: Mutex::new(vec![]),
            reply: Some(reply.clone()),
        });
        let aggregator = InsightAggregator::new(Some(oracle));
        let docs = vec![scored("i1", "Rust GC internals", 0.9, &["rust", "gc"])];

        assert_eq!(aggregator.aggregate(&docs).await, reply);
    }

    #[tokio::test]
    async fn test_oracle_sees_top_five_titles_in_rank_order() {
        let oracle = Arc::new(RecordingOracle {
            seen: Mutex::new(vec![]),
            reply: Some(Insights::default()),
        });
        let aggregator = InsightAggregator::new(Some(oracle.clone()));
        let docs = vec![
            scored("t1", "low", 0.55, &[]),
            scored("t2", "tie-a", 0.8, &[]),
            scored("t3", "best", 0.95, &[]),
            scored("t4", "tie-b", 0.8, &[]),
            scored("t5", "mid", 0.7, &[]),
            scored("t6", "lowest", 0.5, &[]),
            scored("t7", "tie-c", 0.8, &[]),
        ];

        aggregator.aggregate(&docs).await;

        let seen = oracle.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["best", "tie-a", "tie-b", "tie-c", "mid"]);
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back_over_full_set() {
        let oracle = Arc::new(RecordingOracle {
            seen: Mutex::new(vec![]),
            reply: None,
        });
        let aggregator = InsightAggregator::new(Some(oracle));
        let mut docs: Vec<Document> = (0..6)
            .map(|i| scored(&format!("f{i}"), "title", 0.9, &["rust"]))
            .collect();
        // Lowest-ranked document carries the only "gc" match.
        docs.push(scored("f6", "gc post", 0.5, &["gc"]));

        let insights = aggregator.aggregate(&docs).await;

        assert_eq!(insights.summary, "Analyzed 7 filtered posts.");
        assert_eq!(insights.trends, vec!["7 posts found".to_string()]);
        assert_eq!(insights.topics, vec!["gc".to_string(), "rust".to_string()]);
    }

    #[test]
    fn test_prompt_numbers_titles() {
        let prompt = build_insights_prompt(&["First".to_string(), "Second".to_string()]);
        assert!(prompt.contains("1. First\n2. Second"));
    }
}
