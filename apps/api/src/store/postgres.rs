use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::document::{Document, DocumentRow};
use crate::models::search::{SearchRun, SearchRunRow};
use crate::store::{PersistenceError, PersistenceGateway};

const DOCUMENT_COLUMNS: &str = "external_id, search_id, title, author, community, content, url, \
     score, num_comments, created_utc, permalink, relevance_score, analysis_reason, \
     keywords_matched, saved_at";

/// Postgres-backed gateway. Schema is created by `db::ensure_schema`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceGateway for PgStore {
    async fn save_run(&self, run: &SearchRun) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO search_runs
                (search_id, keywords, communities, created_at, post_count, filtered_count, insights)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(run.search_id)
        .bind(&run.keywords)
        .bind(&run.communities)
        .bind(run.created_at)
        .bind(run.post_count)
        .bind(run.filtered_count)
        .bind(Json(&run.insights))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return PersistenceError::DuplicateRun(run.search_id);
                }
            }
            PersistenceError::Database(e)
        })?;

        info!("Saved search run {}", run.search_id);
        Ok(())
    }

    async fn save_documents(
        &self,
        search_id: Uuid,
        documents: &[Document],
    ) -> Result<usize, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for document in documents {
            let row = DocumentRow::from_document(search_id, document, Utc::now());
            // Existing rows win: no column is updated on conflict.
            let result = sqlx::query(
                r#"
                INSERT INTO documents
                    (external_id, search_id, title, author, community, content, url,
                     score, num_comments, created_utc, permalink, relevance_score,
                     analysis_reason, keywords_matched, saved_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ON CONFLICT (external_id) DO NOTHING
                "#,
            )
            .bind(&row.external_id)
            .bind(row.search_id)
            .bind(&row.title)
            .bind(&row.author)
            .bind(&row.community)
            .bind(&row.content)
            .bind(&row.url)
            .bind(row.score)
            .bind(row.num_comments)
            .bind(row.created_utc)
            .bind(&row.permalink)
            .bind(row.relevance_score)
            .bind(&row.analysis_reason)
            .bind(&row.keywords_matched)
            .bind(row.saved_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        info!(
            "Saved {inserted} of {} documents for search run {search_id}",
            documents.len()
        );
        Ok(inserted)
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<SearchRun>, PersistenceError> {
        let rows: Vec<SearchRunRow> = sqlx::query_as(
            r#"
            SELECT search_id, keywords, communities, created_at, post_count, filtered_count, insights
            FROM search_runs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SearchRun::from).collect())
    }

    async fn documents_for_run(
        &self,
        search_id: Uuid,
    ) -> Result<Vec<DocumentRow>, PersistenceError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE search_id = $1 \
             ORDER BY relevance_score DESC"
        );
        let rows = sqlx::query_as(&sql)
            .bind(search_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn top_documents(
        &self,
        since_days: i64,
        limit: i64,
    ) -> Result<Vec<DocumentRow>, PersistenceError> {
        let cutoff = Utc::now() - Duration::days(since_days);
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE saved_at >= $1 \
             ORDER BY relevance_score DESC LIMIT $2"
        );
        let rows = sqlx::query_as(&sql)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
