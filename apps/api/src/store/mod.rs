//! Persistence gateway: idempotent storage of search runs and their documents.
//!
//! Documents are keyed by external id. The first run to save a document owns
//! the stored row; later runs that see the same post skip it and never
//! overwrite its fields.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::document::{Document, DocumentRow};
use crate::models::search::SearchRun;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("search run {0} already exists")]
    DuplicateRun(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Inserts one run record. Fails with `DuplicateRun` if the id is taken.
    async fn save_run(&self, run: &SearchRun) -> Result<(), PersistenceError>;

    /// Inserts documents not yet stored, tagged with `search_id`.
    /// Returns how many rows were inserted; existing ids are skipped.
    async fn save_documents(
        &self,
        search_id: Uuid,
        documents: &[Document],
    ) -> Result<usize, PersistenceError>;

    /// Most recent runs first.
    async fn recent_runs(&self, limit: i64) -> Result<Vec<SearchRun>, PersistenceError>;

    /// Documents first saved by `search_id`, highest relevance first.
    async fn documents_for_run(&self, search_id: Uuid)
        -> Result<Vec<DocumentRow>, PersistenceError>;

    /// Documents saved in the last `since_days` days, highest relevance first.
    async fn top_documents(
        &self,
        since_days: i64,
        limit: i64,
    ) -> Result<Vec<DocumentRow>, PersistenceError>;
}
