use std::sync::Arc;

use crate::analysis::registry::JobRegistry;
use crate::config::Config;
use crate::nlp::EngineHandle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// In-memory job map plus the per-subscriber progress fan-out.
    pub registry: Arc<JobRegistry>,
    /// Lazily initialized, process-wide NLP engine set shared by all jobs.
    pub engines: Arc<EngineHandle>,
    /// Runtime settings, kept for handlers that need them.
    #[allow(dead_code)]
    pub config: Config,
}
