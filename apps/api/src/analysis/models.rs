//! Wire-facing data models for the analysis pipeline.

use serde::{Deserialize, Serialize};

use crate::analysis::entities::EntityKind;

/// Reason code carried by a failed terminal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    ConversionFailed,
    ExtractionFailed,
}

/// Named entities recovered from the document, one insertion-ordered,
/// deduplicated list per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityGroups {
    pub person: Vec<String>,
    pub organization: Vec<String>,
    pub location: Vec<String>,
}

impl EntityGroups {
    /// Adds a trimmed value, skipping exact duplicates.
    pub fn insert(&mut self, kind: EntityKind, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let list = match kind {
            EntityKind::Person => &mut self.person,
            EntityKind::Organization => &mut self.organization,
            EntityKind::Location => &mut self.location,
        };
        if !list.iter().any(|v| v == value) {
            list.push(value.to_string());
        }
    }
}

/// Terminal output of one analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Ordered as answered; duplicates are preserved.
    pub skills: Vec<String>,
    pub education: String,
    pub entities: EntityGroups,
    /// At most ten advisory strings, in rule-evaluation order.
    pub layout_tips: Vec<String>,
}

/// One frame on a job's progress stream.
///
/// `result` is non-null exactly on the successful terminal frame
/// (`progress == 100`); `error` appears only on a failed terminal frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressFrame {
    pub progress: u8,
    pub result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureCode>,
}
