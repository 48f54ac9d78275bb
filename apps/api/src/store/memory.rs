use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::document::{Document, DocumentRow};
use crate::models::search::SearchRun;
use crate::store::{PersistenceError, PersistenceGateway};

/// In-process gateway with the same dedup contract as `PgStore`.
/// Used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    runs: Vec<SearchRun>,
    documents: HashMap<String, DocumentRow>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn document(&self, external_id: &str) -> Option<DocumentRow> {
        self.inner.read().await.documents.get(external_id).cloned()
    }

    #[cfg(test)]
    pub(crate) async fn run_count(&self) -> usize {
        self.inner.read().await.runs.len()
    }
}

fn by_relevance_desc(a: &DocumentRow, b: &DocumentRow) -> Ordering {
    b.relevance_score
        .partial_cmp(&a.relevance_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.saved_at.cmp(&b.saved_at))
}

fn clamp_limit(limit: i64) -> usize {
    limit.max(0) as usize
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn save_run(&self, run: &SearchRun) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write().await;
        if inner.runs.iter().any(|r| r.search_id == run.search_id) {
            return Err(PersistenceError::DuplicateRun(run.search_id));
        }
        inner.runs.push(run.clone());
        Ok(())
    }

    async fn save_documents(
        &self,
        search_id: Uuid,
        documents: &[Document],
    ) -> Result<usize, PersistenceError> {
        let mut inner = self.inner.write().await;
        let mut inserted = 0;
        for document in documents {
            if inner.documents.contains_key(&document.external_id) {
                continue;
            }
            let row = DocumentRow::from_document(search_id, document, Utc::now());
            inner.documents.insert(row.external_id.clone(), row);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<SearchRun>, PersistenceError> {
        let inner = self.inner.read().await;
        let mut runs = inner.runs.clone();
        // Reverse first so runs sharing a timestamp come back newest-inserted first.
        runs.reverse();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(clamp_limit(limit));
        Ok(runs)
    }

    async fn documents_for_run(
        &self,
        search_id: Uuid,
    ) -> Result<Vec<DocumentRow>, PersistenceError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<DocumentRow> = inner
            .documents
            .values()
            .filter(|row| row.search_id == search_id)
            .cloned()
            .collect();
        rows.sort_by(by_relevance_desc);
        Ok(rows)
    }

    async fn top_documents(
        &self,
        since_days: i64,
        limit: i64,
    ) -> Result<Vec<DocumentRow>, PersistenceError> {
        let cutoff = Utc::now() - Duration::days(since_days);
        let inner = self.inner.read().await;
        let mut rows: Vec<DocumentRow> = inner
            .documents
            .values()
            .filter(|row| row.saved_at >= cutoff)
            .cloned()
            .collect();
        rows.sort_by(by_relevance_desc);
        rows.truncate(clamp_limit(limit));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::search::Insights;
    use crate::scoring::oracle::tests::make_document;

    fn scored(id: &str, relevance: f64, reason: &str) -> Document {
        let mut doc = make_document(id, &format!("title {id}"), &["rust"]);
        doc.relevance_score = Some(relevance);
        doc.analysis_reason = Some(reason.to_string());
        doc
    }

    fn run(search_id: Uuid) -> SearchRun {
        SearchRun::new(
            search_id,
            vec!["rust".to_string()],
            vec!["all".to_string()],
            2,
            1,
            Insights::default(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_run_id_is_rejected() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.save_run(&run(id)).await.unwrap();

        let err = store.save_run(&run(id)).await.unwrap_err();
        assert!(matches!(err, PersistenceError::DuplicateRun(dup) if dup == id));
        assert_eq!(store.run_count().await, 1);
    }

    #[tokio::test]
    async fn test_existing_document_is_never_overwritten_by_later_run() {
        let store = MemoryStore::new();
        let first_run = Uuid::new_v4();
        let second_run = Uuid::new_v4();

        let inserted = store
            .save_documents(first_run, &[scored("p1", 0.6, "first pass")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        let before = store.document("p1").await.unwrap();

        let inserted = store
            .save_documents(
                second_run,
                &[scored("p1", 0.95, "better score"), scored("p2", 0.7, "new")],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let after = store.document("p1").await.unwrap();
        assert_eq!(after.search_id, first_run);
        assert_eq!(after.relevance_score, 0.6);
        assert_eq!(after.analysis_reason, "first pass");
        assert_eq!(after.saved_at, before.saved_at);
        assert_eq!(store.document("p2").await.unwrap().search_id, second_run);
    }

    #[tokio::test]
    async fn test_documents_for_run_orders_by_relevance() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .save_documents(
                id,
                &[scored("a", 0.55, ""), scored("b", 0.9, ""), scored("c", 0.7, "")],
            )
            .await
            .unwrap();
        store
            .save_documents(Uuid::new_v4(), &[scored("d", 1.0, "")])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .documents_for_run(id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.external_id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_recent_runs_newest_first_and_limited() {
        let store = MemoryStore::new();
        let mut older = run(Uuid::new_v4());
        older.created_at = Utc::now() - Duration::hours(2);
        let newer = run(Uuid::new_v4());
        store.save_run(&older).await.unwrap();
        store.save_run(&newer).await.unwrap();

        let runs = store.recent_runs(10).await.unwrap();
        assert_eq!(runs[0].search_id, newer.search_id);
        assert_eq!(runs[1].search_id, older.search_id);
        assert_eq!(store.recent_runs(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_top_documents_respects_limit_and_reads_are_idempotent() {
        let store = MemoryStore::new();
        store
            .save_documents(
                Uuid::new_v4(),
                &[scored("x", 0.6, ""), scored("y", 0.8, ""), scored("z", 0.7, "")],
            )
            .await
            .unwrap();

        let first = store.top_documents(7, 2).await.unwrap();
        let second = store.top_documents(7, 2).await.unwrap();
        let ids: Vec<_> = first.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["y", "z"]);
        assert_eq!(first.len(), second.len());
        assert_eq!(store.top_documents(7, 0).await.unwrap().len(), 0);
    }
}
