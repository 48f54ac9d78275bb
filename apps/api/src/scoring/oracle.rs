//! Scoring oracles: pluggable strategies that judge one document against the
//! run's keywords.
//!
//! `RemoteOracle` asks the local LLM; `HeuristicFallback` counts matched
//! keywords and never fails. `RelevanceScorer` chains them: remote first,
//! heuristic on any `OracleError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::document::Document;
use crate::scoring::prompts::{BODY_EXCERPT_CHARS, RELEVANCE_PROMPT_TEMPLATE};

/// Base relevance of the heuristic before keyword credit.
pub const HEURISTIC_BASE: f64 = 0.5;
/// Heuristic credit per matched keyword.
pub const HEURISTIC_PER_KEYWORD: f64 = 0.2;

// ────────────────────────────────────────────────────────────────────────────
// Shared data models
// ────────────────────────────────────────────────────────────────────────────

/// Evaluation criteria handed to every oracle call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringCriteria {
    pub quality_indicators: Vec<String>,
    pub negative_indicators: Vec<String>,
    /// Engagement score at or above which a document earns a bonus.
    pub min_score: i64,
    /// Comment count at or above which a document earns a bonus.
    pub min_comments: i64,
}

impl Default for ScoringCriteria {
    fn default() -> Self {
        Self {
            quality_indicators: to_strings(&[
                "detailed",
                "informative",
                "technical",
                "educational",
                "insightful",
            ]),
            negative_indicators: to_strings(&[
                "spam",
                "promotional",
                "low effort",
                "off-topic",
                "clickbait",
            ]),
            min_score: 10,
            min_comments: 5,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Which strategy produced a `ScoreResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Oracle,
    Heuristic,
}

/// One oracle verdict. `quality_score` is only present on the oracle path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub relevance_score: f64,
    pub quality_score: Option<f64>,
    pub reason: String,
    pub key_insights: Vec<String>,
    pub source: ScoreSource,
}

/// Recoverable oracle failure. Never escapes the relevance scorer.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl From<LlmError> for OracleError {
    fn from(e: LlmError) -> Self {
        if e.is_unavailable() {
            OracleError::Unavailable(e.to_string())
        } else {
            OracleError::MalformedResponse(e.to_string())
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// A scoring strategy. Stateless per call.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn analyze(
        &self,
        document: &Document,
        keywords: &[String],
        criteria: &ScoringCriteria,
    ) -> Result<ScoreResult, OracleError>;
}

// ────────────────────────────────────────────────────────────────────────────
// RemoteOracle: local LLM via llm_client
// ────────────────────────────────────────────────────────────────────────────

/// Wire shape of the oracle's verdict. Scores and reason are required.
#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    relevance_score: f64,
    quality_score: f64,
    reason: String,
    #[serde(default)]
    key_insights: Vec<String>,
}

pub struct RemoteOracle {
    llm: LlmClient,
}

impl RemoteOracle {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }
}

#[async_trait]
impl ScoringOracle for RemoteOracle {
    async fn analyze(
        &self,
        document: &Document,
        keywords: &[String],
        criteria: &ScoringCriteria,
    ) -> Result<ScoreResult, OracleError> {
        let prompt = build_relevance_prompt(document, keywords, criteria);
        let verdict: RemoteVerdict = self.llm.generate_json(&prompt).await?;
        verdict_to_result(verdict)
    }
}

fn verdict_to_result(verdict: RemoteVerdict) -> Result<ScoreResult, OracleError> {
    if !verdict.relevance_score.is_finite() || !verdict.quality_score.is_finite() {
        return Err(OracleError::MalformedResponse(
            "scores must be finite numbers".to_string(),
        ));
    }
    Ok(ScoreResult {
        relevance_score: verdict.relevance_score.clamp(0.0, 1.0),
        quality_score: Some(verdict.quality_score.clamp(0.0, 1.0)),
        reason: verdict.reason,
        key_insights: verdict.key_insights,
        source: ScoreSource::Oracle,
    })
}

pub fn build_relevance_prompt(
    document: &Document,
    keywords: &[String],
    criteria: &ScoringCriteria,
) -> String {
    let excerpt: String = document.body.chars().take(BODY_EXCERPT_CHARS).collect();
    RELEVANCE_PROMPT_TEMPLATE
        .replace("{keywords}", &keywords.join(", "))
        .replace("{title}", &document.title)
        .replace("{body}", &excerpt)
        .replace("{score}", &document.score.to_string())
        .replace("{num_comments}", &document.num_comments.to_string())
        .replace(
            "{quality_indicators}",
            &criteria.quality_indicators.join(", "),
        )
        .replace(
            "{negative_indicators}",
            &criteria.negative_indicators.join(", "),
        )
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicFallback: deterministic, keyword-count based
// ────────────────────────────────────────────────────────────────────────────

/// Rule-based scorer: `0.5 + 0.2 * matched keywords`, capped at 1.0.
pub struct HeuristicFallback;

impl HeuristicFallback {
    /// Infallible form used by the scorer chain.
    pub fn assess(&self, document: &Document) -> ScoreResult {
        let matched = document.matched_keyword_count();
        ScoreResult {
            relevance_score: heuristic_relevance(matched),
            quality_score: None,
            reason: format!("{matched} keyword(s) matched"),
            key_insights: Vec::new(),
            source: ScoreSource::Heuristic,
        }
    }
}

#[async_trait]
impl ScoringOracle for HeuristicFallback {
    async fn analyze(
        &self,
        document: &Document,
        _keywords: &[String],
        _criteria: &ScoringCriteria,
    ) -> Result<ScoreResult, OracleError> {
        Ok(self.assess(document))
    }
}

pub fn heuristic_relevance(matched_keywords: usize) -> f64 {
    (HEURISTIC_BASE + HEURISTIC_PER_KEYWORD * matched_keywords as f64).min(1.0)
}
