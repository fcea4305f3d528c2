//! Hosted-inference HTTP backend for the three extraction engines.
//!
//! One client serves all three tasks against fixed model ids. Retries on
//! rate limits and 5xx (the inference host answers 503 while a cold model
//! loads) with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{NlpError, QuestionAnswering, Summarization, TokenClassification};
use crate::analysis::entities::{BioTag, Token};

/// Task models are intentionally hardcoded to prevent accidental drift.
const QA_MODEL: &str = "distilbert-base-cased-distilled-squad";
const NER_MODEL: &str = "dbmdz/bert-large-cased-finetuned-conll03-english";
const SUMMARY_MODEL: &str = "sshleifer/distilbart-cnn-12-6";

const MAX_RETRIES: u32 = 3;
const SUMMARY_MIN_LENGTH: u32 = 20;
const SUMMARY_MAX_LENGTH: u32 = 40;

/// A QA call may answer with one object or a ranked list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QaResponse {
    Ranked(Vec<QaAnswer>),
    Single(QaAnswer),
}

#[derive(Debug, Deserialize)]
struct QaAnswer {
    answer: String,
}

impl QaResponse {
    /// The top-ranked answer's text.
    fn top(self) -> Option<String> {
        match self {
            QaResponse::Single(a) => Some(a.answer),
            QaResponse::Ranked(list) => list.into_iter().next().map(|a| a.answer),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaggedSpan {
    word: String,
    entity: String,
}

#[derive(Debug, Deserialize)]
struct SummaryOutput {
    summary_text: Option<String>,
    generated_text: Option<String>,
}

impl SummaryOutput {
    fn text(self) -> Option<String> {
        self.summary_text.or(self.generated_text)
    }
}

#[derive(Debug, Deserialize)]
struct InferenceApiError {
    error: String,
}

/// The shared HTTP client behind every engine trait.
pub struct InferenceClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl InferenceClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    /// Posts one inference request, retrying 429 and 5xx with backoff.
    async fn call(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, NlpError> {
        let url = format!("{}/models/{}", self.base_url, model);
        let mut last_error: Option<NlpError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "inference call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(NlpError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("inference API returned {}: {}", status, body);
                last_error = Some(NlpError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<InferenceApiError>(&body)
                    .map(|e| e.error)
                    .unwrap_or(body);
                return Err(NlpError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let value: serde_json::Value = response.json().await?;
            debug!("inference call to {model} succeeded");
            return Ok(value);
        }

        Err(last_error.unwrap_or(NlpError::Exhausted {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl QuestionAnswering for InferenceClient {
    async fn answer(&self, question: &str, context: &str) -> Result<String, NlpError> {
        let body = json!({
            "inputs": { "question": question, "context": context }
        });
        let value = self.call(QA_MODEL, &body).await?;
        let response: QaResponse = serde_json::from_value(value)?;
        response.top().ok_or(NlpError::EmptyOutput)
    }
}

#[async_trait]
impl TokenClassification for InferenceClient {
    async fn tag(&self, text: &str) -> Result<Vec<Token>, NlpError> {
        // aggregation off: raw per-token B-/I- labels with sub-word markers
        let body = json!({
            "inputs": text,
            "parameters": { "aggregation_strategy": "none" }
        });
        let value = self.call(NER_MODEL, &body).await?;
        let spans: Vec<TaggedSpan> = serde_json::from_value(value)?;
        Ok(spans
            .into_iter()
            .map(|s| Token::new(s.word, BioTag::from_label(&s.entity)))
            .collect())
    }
}

#[async_trait]
impl Summarization for InferenceClient {
    async fn summarize(&self, text: &str) -> Result<String, NlpError> {
        let body = json!({
            "inputs": text,
            "parameters": { "min_length": SUMMARY_MIN_LENGTH, "max_length": SUMMARY_MAX_LENGTH }
        });
        let value = self.call(SUMMARY_MODEL, &body).await?;
        let outputs: Vec<SummaryOutput> = serde_json::from_value(value)?;
        outputs
            .into_iter()
            .next()
            .and_then(SummaryOutput::text)
            .filter(|t| !t.is_empty())
            .ok_or(NlpError::EmptyOutput)
    }
}
