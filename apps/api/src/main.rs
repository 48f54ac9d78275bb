mod config;
mod db;
mod errors;
mod insights;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod scoring;
mod source;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::insights::InsightAggregator;
use crate::llm_client::LlmClient;
use crate::pipeline::{Pipeline, SearchLimits};
use crate::routes::build_router;
use crate::scoring::oracle::{RemoteOracle, ScoringCriteria};
use crate::scoring::relevance::RelevanceScorer;
use crate::source::reddit::RedditSource;
use crate::source::DocumentSource;
use crate::state::AppState;
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;
use crate::store::PersistenceGateway;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; bad values abort startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scout v{}", env!("CARGO_PKG_VERSION"));

    // Initialize storage
    let store: Arc<dyn PersistenceGateway> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; search history is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize LLM client; the model is fixed from here on
    let llm = LlmClient::new(&config.ollama_url, &config.ollama_model)?
        .resolve_model()
        .await;
    let oracle_model = llm.model().to_string();
    info!("LLM client initialized (model: {oracle_model})");
    let oracle = Arc::new(RemoteOracle::new(llm));

    let scorer = RelevanceScorer::new(
        Some(oracle.clone()),
        config.relevance_threshold,
        config.scoring_concurrency,
    );
    info!(
        "Relevance threshold {} with {} concurrent oracle calls",
        scorer.threshold(),
        config.scoring_concurrency
    );
    let aggregator = InsightAggregator::new(Some(oracle));

    let source: Arc<dyn DocumentSource> = Arc::new(RedditSource::new(&config.reddit_user_agent)?);

    let criteria = ScoringCriteria {
        min_score: config.min_post_score,
        min_comments: config.min_comments,
        ..ScoringCriteria::default()
    };
    let limits = SearchLimits {
        default_limit: config.search_default_limit,
        max_limit: config.search_max_limit,
    };

    let pipeline = Pipeline::new(source.clone(), scorer, aggregator, store.clone(), limits, criteria);

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        store,
        source,
        oracle_model,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
