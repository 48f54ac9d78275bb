use std::sync::Arc;

use crate::pipeline::Pipeline;
use crate::source::DocumentSource;
use crate::store::PersistenceGateway;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Same gateway the pipeline writes to; handlers use it for reads only.
    pub store: Arc<dyn PersistenceGateway>,
    /// Same source the pipeline fetches from; serves comment threads.
    pub source: Arc<dyn DocumentSource>,
    /// Oracle model resolved at startup, reported by /health.
    pub oracle_model: String,
}
