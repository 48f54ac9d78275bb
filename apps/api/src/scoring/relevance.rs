use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::models::document::Document;
use crate::scoring::oracle::{
    heuristic_relevance, HeuristicFallback, ScoreResult, ScoreSource, ScoringCriteria,
    ScoringOracle,
};

pub const RELEVANCE_WEIGHT: f64 = 0.7;
pub const QUALITY_WEIGHT: f64 = 0.3;
pub const ENGAGEMENT_BONUS: f64 = 0.1;
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.5;

/// Final verdict for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub combined_score: f64,
    pub reason: String,
    pub source: ScoreSource,
}

/// Result of scoring a batch: every document (enriched) plus the retained ones,
/// both in fetch order.
#[derive(Debug, Default)]
pub struct ScoringOutcome {
    pub scored: Vec<Document>,
    pub retained: Vec<Document>,
    pub fallback_count: usize,
}

/// Blends oracle output (or the heuristic) into one score and filters on it.
///
/// The threshold is ours, not the oracle's: a document survives iff its
/// combined score is at least `threshold`.
pub struct RelevanceScorer {
    primary: Option<Arc<dyn ScoringOracle>>,
    fallback: HeuristicFallback,
    threshold: f64,
    concurrency: usize,
}

impl RelevanceScorer {
    pub fn new(primary: Option<Arc<dyn ScoringOracle>>, threshold: f64, concurrency: usize) -> Self {
        Self {
            primary,
            fallback: HeuristicFallback,
            threshold: threshold.clamp(0.0, 1.0),
            concurrency: concurrency.max(1),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_retained(&self, combined_score: f64) -> bool {
        combined_score >= self.threshold
    }

    /// Scores one document. Always yields a score; oracle failures are logged
    /// and answered by the heuristic.
    pub async fn score(
        &self,
        document: &Document,
        keywords: &[String],
        criteria: &ScoringCriteria,
    ) -> ScoredDocument {
        let result = self.analyze(document, keywords, criteria).await;
        let combined_score = blend(&result, document, criteria);
        debug!(
            external_id = %document.external_id,
            combined_score,
            source = ?result.source,
            key_insights = ?result.key_insights,
            "Scored document"
        );
        ScoredDocument {
            combined_score,
            reason: result.reason,
            source: result.source,
        }
    }

    async fn analyze(
        &self,
        document: &Document,
        keywords: &[String],
        criteria: &ScoringCriteria,
    ) -> ScoreResult {
        let Some(primary) = &self.primary else {
            return self.fallback.assess(document);
        };
        match primary.analyze(document, keywords, criteria).await {
            Ok(result) => result,
            Err(e) => {
                warn!(external_id = %document.external_id, "LLM analysis failed, using keyword heuristic: {e}");
                self.fallback.assess(document)
            }
        }
    }

    /// Scores every document with at most `concurrency` oracle calls in
    /// flight. Output keeps the input order.
    pub async fn score_all(
        &self,
        documents: Vec<Document>,
        keywords: &[String],
        criteria: &ScoringCriteria,
    ) -> ScoringOutcome {
        let verdicts: Vec<(Document, ScoredDocument)> = stream::iter(documents)
            .map(|document| async move {
                let verdict = self.score(&document, keywords, criteria).await;
                (document, verdict)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcome = ScoringOutcome::default();
        for (mut document, verdict) in verdicts {
            if verdict.source == ScoreSource::Heuristic {
                outcome.fallback_count += 1;
            }
            let retained = self.is_retained(verdict.combined_score);
            document.relevance_score = Some(verdict.combined_score);
            document.analysis_reason = Some(verdict.reason);
            if retained {
                outcome.retained.push(document.clone());
            }
            outcome.scored.push(document);
        }
        outcome
    }
}

/// Combines a strategy result with engagement bonuses, clamped to `[0, 1]`.
///
/// Oracle results weigh relevance and quality 0.7/0.3. Heuristic results
/// carry no quality score and are scored by `fallback_score`.
pub fn blend(result: &ScoreResult, document: &Document, criteria: &ScoringCriteria) -> f64 {
    let bonus = engagement_bonus(
        document.score,
        document.num_comments,
        criteria.min_score,
        criteria.min_comments,
    );
    match result.quality_score {
        Some(quality) => {
            (result.relevance_score * RELEVANCE_WEIGHT + quality * QUALITY_WEIGHT + bonus)
                .clamp(0.0, 1.0)
        }
        None => fallback_score(
            document.matched_keyword_count(),
            document.score,
            document.num_comments,
            criteria.min_score,
            criteria.min_comments,
        ),
    }
}

fn engagement_bonus(score: i64, num_comments: i64, min_score: i64, min_comments: i64) -> f64 {
    let mut bonus = 0.0;
    if score >= min_score {
        bonus += ENGAGEMENT_BONUS;
    }
    if num_comments >= min_comments {
        bonus += ENGAGEMENT_BONUS;
    }
    bonus
}

/// Heuristic combined score as a pure function of its inputs.
pub fn fallback_score(
    matched_keywords: usize,
    score: i64,
    num_comments: i64,
    min_score: i64,
    min_comments: i64,
) -> f64 {
    (heuristic_relevance(matched_keywords)
        + engagement_bonus(score, num_comments, min_score, min_comments))
    .clamp(0.0, 1.0)
}
