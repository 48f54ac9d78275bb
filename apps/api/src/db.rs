use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Idempotent schema; safe to run on every boot.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS search_runs (
        search_id       UUID PRIMARY KEY,
        keywords        TEXT[] NOT NULL,
        communities     TEXT[] NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        post_count      BIGINT NOT NULL,
        filtered_count  BIGINT NOT NULL,
        insights        JSONB NOT NULL,
        CHECK (filtered_count <= post_count)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        external_id       TEXT PRIMARY KEY,
        search_id         UUID NOT NULL REFERENCES search_runs (search_id),
        title             TEXT NOT NULL,
        author            TEXT NOT NULL,
        community         TEXT NOT NULL,
        content           TEXT NOT NULL,
        url               TEXT NOT NULL,
        score             BIGINT NOT NULL,
        num_comments      BIGINT NOT NULL,
        created_utc       TIMESTAMPTZ NOT NULL,
        permalink         TEXT NOT NULL,
        relevance_score   DOUBLE PRECISION NOT NULL,
        analysis_reason   TEXT NOT NULL,
        keywords_matched  TEXT[] NOT NULL,
        saved_at          TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_search_runs_created_at ON search_runs (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_documents_search_id ON documents (search_id)",
    "CREATE INDEX IF NOT EXISTS idx_documents_saved_at ON documents (saved_at DESC)",
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}
