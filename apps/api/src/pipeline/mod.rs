//! Pipeline orchestrator: fetch → score → filter → aggregate → persist.
//!
//! A run either succeeds (possibly with fewer documents when some communities
//! failed to fetch) or fails at a named stage. Oracle trouble never fails a
//! run; invalid input and storage errors do.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

pub mod handlers;

use crate::insights::InsightAggregator;
use crate::models::document::Document;
use crate::models::search::{Insights, SearchRun};
use crate::scoring::oracle::ScoringCriteria;
use crate::scoring::relevance::RelevanceScorer;
use crate::source::{DocumentSource, ALL_COMMUNITIES};
use crate::store::{PersistenceError, PersistenceGateway};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    Fetching,
    Scoring,
    Aggregating,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Idle => "idle",
            RunStage::Fetching => "fetching",
            RunStage::Scoring => "scoring",
            RunStage::Aggregating => "aggregating",
            RunStage::Persisting => "persisting",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Caller-facing search parameters, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub communities: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub min_score: Option<i64>,
    #[serde(default)]
    pub min_comments: Option<i64>,
}

/// Bounds applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// Validated parameters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub keywords: Vec<String>,
    pub communities: Vec<String>,
    pub limit: u32,
    pub criteria: ScoringCriteria,
}

impl SearchRequest {
    pub fn validate(
        self,
        limits: SearchLimits,
        base_criteria: &ScoringCriteria,
    ) -> Result<SearchParams, PipelineError> {
        let keywords = clean_list(self.keywords);
        if keywords.is_empty() {
            return Err(PipelineError::InvalidInput(
                "at least one keyword is required".to_string(),
            ));
        }

        let mut communities = clean_list(self.communities.unwrap_or_default());
        if communities.is_empty() {
            communities.push(ALL_COMMUNITIES.to_string());
        }

        let limit = self.limit.unwrap_or(limits.default_limit);
        if limit == 0 || limit > limits.max_limit {
            return Err(PipelineError::InvalidInput(format!(
                "limit must be between 1 and {}",
                limits.max_limit
            )));
        }

        let mut criteria = base_criteria.clone();
        if let Some(min_score) = self.min_score {
            criteria.min_score = min_score;
        }
        if let Some(min_comments) = self.min_comments {
            criteria.min_comments = min_comments;
        }

        Ok(SearchParams {
            keywords,
            communities,
            limit,
            criteria,
        })
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !cleaned.iter().any(|c| c == item) {
            cleaned.push(item.to_string());
        }
    }
    cleaned
}

/// What a successful run hands back to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub search_id: Uuid,
    pub total_count: usize,
    pub filtered_count: usize,
    pub failed_communities: Vec<String>,
    pub insights: Insights,
    pub documents: Vec<Document>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Succeeded(RunReport),
    Failed {
        failed_at: RunStage,
        error: PipelineError,
    },
}

impl RunOutcome {
    /// Terminal state of the run.
    pub fn stage(&self) -> RunStage {
        match self {
            RunOutcome::Succeeded(_) => RunStage::Done,
            RunOutcome::Failed { .. } => RunStage::Failed,
        }
    }
}

pub struct Pipeline {
    source: Arc<dyn DocumentSource>,
    scorer: RelevanceScorer,
    aggregator: InsightAggregator,
    store: Arc<dyn PersistenceGateway>,
    limits: SearchLimits,
    criteria: ScoringCriteria,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        scorer: RelevanceScorer,
        aggregator: InsightAggregator,
        store: Arc<dyn PersistenceGateway>,
        limits: SearchLimits,
        criteria: ScoringCriteria,
    ) -> Self {
        Self {
            source,
            scorer,
            aggregator,
            store,
            limits,
            criteria,
        }
    }

    /// Executes one run end to end.
    pub async fn run(&self, request: SearchRequest) -> RunOutcome {
        let mut stage = RunStage::Idle;

        let params = match request.validate(self.limits, &self.criteria) {
            Ok(params) => params,
            Err(error) => return fail(stage, error),
        };

        let search_id = Uuid::new_v4();
        info!(
            %search_id,
            keywords = ?params.keywords,
            communities = ?params.communities,
            limit = params.limit,
            "Starting search run"
        );

        advance(&mut stage, RunStage::Fetching, search_id);
        let (documents, failed_communities) = self.fetch_all(&params).await;
        let total_count = documents.len();

        advance(&mut stage, RunStage::Scoring, search_id);
        let scoring = self
            .scorer
            .score_all(documents, &params.keywords, &params.criteria)
            .await;
        let filtered = scoring.retained;
        info!(
            %search_id,
            scored = scoring.scored.len(),
            filtered = filtered.len(),
            fallback = scoring.fallback_count,
            "Scoring complete"
        );

        advance(&mut stage, RunStage::Aggregating, search_id);
        let insights = self.aggregator.aggregate(&filtered).await;

        advance(&mut stage, RunStage::Persisting, search_id);
        let run = SearchRun::new(
            search_id,
            params.keywords.clone(),
            params.communities.clone(),
            total_count,
            filtered.len(),
            insights.clone(),
        );
        if let Err(e) = self.persist(&run, &filtered).await {
            return fail(stage, e.into());
        }

        advance(&mut stage, RunStage::Done, search_id);
        info!(
            %search_id,
            "Search run complete: {} of {} posts kept",
            filtered.len(),
            total_count
        );

        RunOutcome::Succeeded(RunReport {
            search_id,
            total_count,
            filtered_count: filtered.len(),
            failed_communities,
            insights,
            documents: filtered,
        })
    }

    /// Fetches each community on its own; failures are logged and skipped.
    async fn fetch_all(&self, params: &SearchParams) -> (Vec<Document>, Vec<String>) {
        let mut documents = Vec::new();
        let mut failed = Vec::new();
        for community in &params.communities {
            match self
                .source
                .fetch(community, &params.keywords, params.limit)
                .await
            {
                Ok(fetched) => {
                    debug!("Community '{community}' returned {} posts", fetched.len());
                    documents.extend(fetched);
                }
                Err(e) => {
                    error!("Search failed for community '{community}': {e}");
                    failed.push(community.clone());
                }
            }
        }
        (documents, failed)
    }

    /// Run metadata first, then documents.
    async fn persist(&self, run: &SearchRun, filtered: &[Document]) -> Result<(), PersistenceError> {
        self.store.save_run(run).await?;
        self.store.save_documents(run.search_id, filtered).await?;
        Ok(())
    }
}

fn advance(stage: &mut RunStage, next: RunStage, search_id: Uuid) {
    debug!(%search_id, "Stage {stage} -> {next}");
    *stage = next;
}

fn fail(failed_at: RunStage, error: PipelineError) -> RunOutcome {
    error!("Search run failed at stage {failed_at}: {error}");
    RunOutcome::Failed { failed_at, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{InsightOracle, EMPTY_SUMMARY};
    use crate::models::document::Comment;
    use crate::scoring::oracle::tests::make_document;
    use crate::scoring::oracle::{OracleError, ScoreResult, ScoringOracle};
    use crate::source::SourceError;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned documents per community; unknown communities fail.
    struct StubSource {
        by_community: HashMap<String, Vec<Document>>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(entries: Vec<(&str, Vec<Document>)>) -> Self {
            Self {
                by_community: entries
                    .into_iter()
                    .map(|(c, docs)| (c.to_string(), docs))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentSource for StubSource {
        async fn fetch(
            &self,
            community: &str,
            _keywords: &[String],
            limit: u32,
        ) -> Result<Vec<Document>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.by_community.get(community) {
                Some(docs) => Ok(docs.iter().take(limit as usize).cloned().collect()),
                None => Err(SourceError::Status {
                    status: 503,
                    target: community.to_string(),
                }),
            }
        }

        async fn comments(
            &self,
            _external_id: &str,
            _limit: u32,
        ) -> Result<Vec<Comment>, SourceError> {
            Ok(vec![])
        }
    }

    struct OfflineOracle;

    #[async_trait]
    impl ScoringOracle for OfflineOracle {
        async fn analyze(
            &self,
            _document: &Document,
            _keywords: &[String],
            _criteria: &ScoringCriteria,
        ) -> Result<ScoreResult, OracleError> {
            Err(OracleError::Unavailable("timed out".to_string()))
        }
    }

    #[async_trait]
    impl InsightOracle for OfflineOracle {
        async fn summarize(&self, _titles: &[String]) -> Result<Insights, OracleError> {
            Err(OracleError::Unavailable("timed out".to_string()))
        }
    }

    /// Accepts runs but refuses document writes.
    struct BrokenStore;

    #[async_trait]
    impl PersistenceGateway for BrokenStore {
        async fn save_run(&self, _run: &SearchRun) -> Result<(), PersistenceError> {
            Ok(())
        }

        async fn save_documents(
            &self,
            _search_id: Uuid,
            _documents: &[Document],
        ) -> Result<usize, PersistenceError> {
            Err(PersistenceError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn recent_runs(&self, _limit: i64) -> Result<Vec<SearchRun>, PersistenceError> {
            Ok(vec![])
        }

        async fn documents_for_run(
            &self,
            _search_id: Uuid,
        ) -> Result<Vec<crate::models::document::DocumentRow>, PersistenceError> {
            Ok(vec![])
        }

        async fn top_documents(
            &self,
            _since_days: i64,
            _limit: i64,
        ) -> Result<Vec<crate::models::document::DocumentRow>, PersistenceError> {
            Ok(vec![])
        }
    }

    fn pipeline(source: Arc<dyn DocumentSource>, store: Arc<dyn PersistenceGateway>) -> Pipeline {
        Pipeline::new(
            source,
            RelevanceScorer::new(Some(Arc::new(OfflineOracle)), 0.5, 2),
            InsightAggregator::new(Some(Arc::new(OfflineOracle))),
            store,
            SearchLimits::default(),
            ScoringCriteria::default(),
        )
    }

    fn request(keywords: &[&str], communities: &[&str]) -> SearchRequest {
        SearchRequest {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            communities: Some(communities.iter().map(|c| c.to_string()).collect()),
            ..SearchRequest::default()
        }
    }

    fn rust_docs() -> Vec<Document> {
        let mut gc = make_document("r1", "Rust GC internals", &["rust", "gc"]);
        gc.score = 10;
        gc.num_comments = 5;
        vec![gc, make_document("r2", "Borrow checker tips", &["rust"])]
    }

    #[tokio::test]
    async fn test_empty_keywords_rejected_before_fetch() {
        let source = Arc::new(StubSource::new(vec![("rust", rust_docs())]));
        let store = Arc::new(MemoryStore::new());
        let outcome = pipeline(source.clone(), store.clone())
            .run(request(&["  ", ""], &["rust"]))
            .await;

        match outcome {
            RunOutcome::Failed { failed_at, error } => {
                assert_eq!(failed_at, RunStage::Idle);
                assert!(matches!(error, PipelineError::InvalidInput(_)));
            }
            RunOutcome::Succeeded(_) => panic!("empty keywords must be rejected"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.run_count().await, 0);
    }

    #[tokio::test]
    async fn test_one_failing_community_is_partial_success() {
        let source = Arc::new(StubSource::new(vec![("rust", rust_docs())]));
        let store = Arc::new(MemoryStore::new());
        let outcome = pipeline(source, store.clone())
            .run(request(&["rust", "gc"], &["rust", "broken"]))
            .await;

        let RunOutcome::Succeeded(report) = outcome else {
            panic!("partial fetch failure must not fail the run");
        };
        assert_eq!(report.total_count, 2);
        assert_eq!(report.failed_communities, vec!["broken".to_string()]);
        assert!(report.filtered_count <= report.total_count);
        assert_eq!(store.run_count().await, 1);
    }

    #[tokio::test]
    async fn test_all_communities_failing_yields_empty_success() {
        let source = Arc::new(StubSource::new(vec![]));
        let store = Arc::new(MemoryStore::new());
        let outcome = pipeline(source, store.clone())
            .run(request(&["rust"], &["a", "b"]))
            .await;

        let RunOutcome::Succeeded(report) = outcome else {
            panic!("all-failed fetch completes with zero documents");
        };
        assert_eq!(report.total_count, 0);
        assert_eq!(report.filtered_count, 0);
        assert_eq!(report.insights.summary, EMPTY_SUMMARY);
        assert_eq!(store.run_count().await, 1);
    }

    #[tokio::test]
    async fn test_offline_oracle_run_uses_fallbacks_and_persists() {
        let source = Arc::new(StubSource::new(vec![("rust", rust_docs())]));
        let store = Arc::new(MemoryStore::new());
        let outcome = pipeline(source, store.clone())
            .run(request(&["rust", "gc"], &["rust"]))
            .await;

        let RunOutcome::Succeeded(report) = outcome else {
            panic!("oracle outage must not fail the run");
        };
        assert_eq!(report.filtered_count, 2);
        assert_eq!(report.documents[0].relevance_score, Some(1.0));
        assert_eq!(report.insights.trends, vec!["2 posts found".to_string()]);
        assert_eq!(
            report.insights.topics,
            vec!["gc".to_string(), "rust".to_string()]
        );

        let stored = store.document("r1").await.unwrap();
        assert_eq!(stored.search_id, report.search_id);
        assert_eq!(stored.relevance_score, 1.0);
    }

    #[tokio::test]
    async fn test_persistence_failure_fails_run_at_persisting() {
        let source = Arc::new(StubSource::new(vec![("rust", rust_docs())]));
        let outcome = pipeline(source, Arc::new(BrokenStore))
            .run(request(&["rust"], &["rust"]))
            .await;

        assert_eq!(outcome.stage(), RunStage::Failed);
        match outcome {
            RunOutcome::Failed { failed_at, error } => {
                assert_eq!(failed_at, RunStage::Persisting);
                assert!(matches!(error, PipelineError::Persistence(_)));
            }
            RunOutcome::Succeeded(_) => panic!("storage failure must fail the run"),
        }
    }

    #[test]
    fn test_validate_defaults_communities_and_limit() {
        let params = SearchRequest {
            keywords: vec![" rust ".to_string(), "rust".to_string()],
            ..SearchRequest::default()
        }
        .validate(SearchLimits::default(), &ScoringCriteria::default())
        .unwrap();

        assert_eq!(params.keywords, vec!["rust".to_string()]);
        assert_eq!(params.communities, vec![ALL_COMMUNITIES.to_string()]);
        assert_eq!(params.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_validate_rejects_out_of_range_limit() {
        for limit in [0, MAX_LIMIT + 1] {
            let result = SearchRequest {
                keywords: vec!["rust".to_string()],
                limit: Some(limit),
                ..SearchRequest::default()
            }
            .validate(SearchLimits::default(), &ScoringCriteria::default());
            assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_validate_applies_criteria_overrides() {
        let params = SearchRequest {
            keywords: vec!["rust".to_string()],
            min_score: Some(100),
            min_comments: Some(20),
            ..SearchRequest::default()
        }
        .validate(SearchLimits::default(), &ScoringCriteria::default())
        .unwrap();
        assert_eq!(params.criteria.min_score, 100);
        assert_eq!(params.criteria.min_comments, 20);
    }
}
