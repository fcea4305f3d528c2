/// NLP engine seam — the single point of entry for all model inference in Vellum.
///
/// ARCHITECTURAL RULE: No other module may call the inference API directly.
/// The pipeline and the heuristics engine see only the three traits below,
/// so tests swap in deterministic engines without touching the network.
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::analysis::entities::Token;

pub mod inference;

use inference::InferenceClient;

#[derive(Debug, Error)]
pub enum NlpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed inference response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Model returned no usable output")]
    EmptyOutput,

    #[error("Gave up after {retries} retries")]
    Exhausted { retries: u32 },
}

/// Extractive question answering over a plain-text context.
#[async_trait]
pub trait QuestionAnswering: Send + Sync {
    /// Returns the top-ranked answer's text.
    async fn answer(&self, question: &str, context: &str) -> Result<String, NlpError>;
}

/// Per-token BIO tagging of named entities.
#[async_trait]
pub trait TokenClassification: Send + Sync {
    async fn tag(&self, text: &str) -> Result<Vec<Token>, NlpError>;
}

/// Abstractive summarization used for the one-line polish tip.
#[async_trait]
pub trait Summarization: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, NlpError>;
}

/// The three extraction engines. Built once per process and shared by all
/// jobs; the trait objects let tests replace any engine independently.
#[derive(Clone)]
pub struct Engines {
    pub qa: Arc<dyn QuestionAnswering>,
    pub ner: Arc<dyn TokenClassification>,
    pub summarizer: Arc<dyn Summarization>,
}

impl Engines {
    fn from_inference(base_url: &str, api_token: &str) -> Self {
        let client = Arc::new(InferenceClient::new(base_url, api_token));
        Self {
            qa: client.clone(),
            ner: client.clone(),
            summarizer: client,
        }
    }
}

/// Lazily initialized engine set behind a one-time-init primitive.
///
/// The first caller pays construction; every later caller reuses the same
/// instance. Held in `AppState` so the orchestrator receives an explicit
/// service handle rather than reaching for process globals.
pub struct EngineHandle {
    cell: OnceCell<Engines>,
    base_url: String,
    api_token: String,
}

impl EngineHandle {
    pub fn new(base_url: String, api_token: String) -> Self {
        Self {
            cell: OnceCell::new(),
            base_url,
            api_token,
        }
    }

    /// Handle whose engines are already built. Used by tests to inject mocks.
    pub fn preloaded(engines: Engines) -> Self {
        Self {
            cell: OnceCell::new_with(Some(engines)),
            base_url: String::new(),
            api_token: String::new(),
        }
    }

    pub async fn get(&self) -> &Engines {
        self.cell
            .get_or_init(|| async { Engines::from_inference(&self.base_url, &self.api_token) })
            .await
    }
}
