//! Pipeline orchestration: normalize, classify, extract, reconstruct, advise.
//!
//! Progress is stage-indexed: each checkpoint fires when its stage starts,
//! regardless of elapsed time or document size.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::entities::{group_entities, untokenize, MismatchPolicy};
use crate::analysis::flavour::Flavour;
use crate::analysis::models::{AnalysisResult, FailureCode};
use crate::analysis::normalize::{self, ConvertError};
use crate::analysis::registry::JobRegistry;
use crate::analysis::tips;
use crate::nlp::{EngineHandle, NlpError};

pub const SKILLS_QUESTION: &str = "What skills does the candidate have?";
pub const EDUCATION_QUESTION: &str = "What education credentials are listed?";

const SKILL_DELIMITERS: &[char] = &[',', ';', '•', '\n'];

/// Fixed checkpoint percentages, one per stage.
mod checkpoint {
    pub const CONVERT: u8 = 10;
    pub const TEXT: u8 = 25;
    pub const ENGINES: u8 = 40;
    pub const EXTRACT: u8 = 55;
    pub const ENTITIES: u8 = 70;
    pub const HEURISTICS: u8 = 90;
    pub const DONE: u8 = 100;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    #[error(transparent)]
    Extraction(#[from] NlpError),
}

impl PipelineError {
    fn code(&self) -> FailureCode {
        match self {
            PipelineError::Conversion(_) => FailureCode::ConversionFailed,
            PipelineError::Extraction(_) => FailureCode::ExtractionFailed,
        }
    }
}

/// Runs one document through the full pipeline. The terminal frame is either
/// `progress == 100` with a result or the last checkpoint with a failure code.
pub async fn run(
    registry: Arc<JobRegistry>,
    engines: Arc<EngineHandle>,
    id: Uuid,
    bytes: Vec<u8>,
    declared_type: Option<String>,
) {
    match analyse(&registry, &engines, id, &bytes, declared_type.as_deref()).await {
        Ok(result) => {
            info!(
                job = %id,
                skills = result.skills.len(),
                tips = result.layout_tips.len(),
                "analysis complete"
            );
            registry.update(id, checkpoint::DONE, Some(result));
        }
        Err(e) => {
            error!(job = %id, "analysis failed: {e}");
            registry.fail(id, e.code());
        }
    }
}

async fn analyse(
    registry: &JobRegistry,
    engines: &EngineHandle,
    id: Uuid,
    bytes: &[u8],
    declared_type: Option<&str>,
) -> Result<AnalysisResult, PipelineError> {
    registry.update(id, checkpoint::CONVERT, None);
    let doc = normalize::convert(bytes, declared_type)?;

    registry.update(id, checkpoint::TEXT, None);
    let flavour = Flavour::detect(&doc.plain);

    registry.update(id, checkpoint::ENGINES, None);
    let engines = engines.get().await;

    // all-must-succeed: one failed call fails the job, no partial result
    registry.update(id, checkpoint::EXTRACT, None);
    let (skills_answer, education, tagged) = tokio::try_join!(
        engines.qa.answer(SKILLS_QUESTION, &doc.plain),
        engines.qa.answer(EDUCATION_QUESTION, &doc.plain),
        engines.ner.tag(&doc.plain),
    )?;

    registry.update(id, checkpoint::ENTITIES, None);
    let entities = group_entities(&untokenize(tagged), MismatchPolicy::default());

    registry.update(id, checkpoint::HEURISTICS, None);
    let layout_tips = tips::build_layout_tips(&doc, flavour, engines.summarizer.as_ref()).await;

    Ok(AnalysisResult {
        skills: split_skills(&skills_answer),
        education,
        entities,
        layout_tips,
    })
}

/// Splits the skills answer on the delimiter set, trimming each piece and
/// dropping empties. Duplicates are preserved as answered.
fn split_skills(answer: &str) -> Vec<String> {
    answer
        .split(SKILL_DELIMITERS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::entities::{BioTag, EntityKind, Token};
    use crate::nlp::{Engines, NlpError, QuestionAnswering, Summarization, TokenClassification};
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::time::Duration;
    use zip::write::{FileOptions, ZipWriter};

    struct MockQa;

    #[async_trait]
    impl QuestionAnswering for MockQa {
        async fn answer(&self, question: &str, _context: &str) -> Result<String, NlpError> {
            if question == SKILLS_QUESTION {
                Ok("Rust, Docker; Rust\n SQL".to_string())
            } else {
                Ok("BSc Computer Science".to_string())
            }
        }
    }

    struct MockNer;

    #[async_trait]
    impl TokenClassification for MockNer {
        async fn tag(&self, _text: &str) -> Result<Vec<Token>, NlpError> {
            Ok(vec![
                Token::new("John", BioTag::Begin(EntityKind::Person)),
                Token::new("##son", BioTag::Inside(EntityKind::Person)),
                Token::new("Acme", BioTag::Begin(EntityKind::Organization)),
            ])
        }
    }

    struct MockSummarizer;

    #[async_trait]
    impl Summarization for MockSummarizer {
        async fn summarize(&self, _text: &str) -> Result<String, NlpError> {
            Ok("Tighten margins".to_string())
        }
    }

    struct FailingNer;

    #[async_trait]
    impl TokenClassification for FailingNer {
        async fn tag(&self, _text: &str) -> Result<Vec<Token>, NlpError> {
            Err(NlpError::EmptyOutput)
        }
    }

    fn mock_engines(ner: Arc<dyn TokenClassification>) -> Engines {
        Engines {
            qa: Arc::new(MockQa),
            ner,
            summarizer: Arc::new(MockSummarizer),
        }
    }

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{body}</w:body>
</w:document>"#
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn registry() -> Arc<JobRegistry> {
        Arc::new(JobRegistry::new(32, Duration::from_secs(900)))
    }

    #[tokio::test]
    async fn test_successful_run_emits_monotonic_checkpoints_and_result() {
        let registry = registry();
        let engines = Arc::new(EngineHandle::preloaded(mock_engines(Arc::new(MockNer))));
        let id = Uuid::new_v4();
        registry.create_or_get(id);
        let mut sub = registry.subscribe(id).unwrap();

        run(
            registry.clone(),
            engines,
            id,
            docx_bytes(&["Seasoned engineer", "Shipped things"]),
            None,
        )
        .await;

        let mut seen = Vec::new();
        while let Ok(frame) = sub.receiver.try_recv() {
            seen.push(frame);
        }
        let progresses: Vec<u8> = seen.iter().map(|f| f.progress).collect();
        assert_eq!(progresses, vec![0, 10, 25, 40, 55, 70, 90, 100]);

        let terminal: Vec<_> = seen.iter().filter(|f| f.progress == 100).collect();
        assert_eq!(terminal.len(), 1);
        let result = terminal[0].result.as_ref().unwrap();
        assert_eq!(result.skills, vec!["Rust", "Docker", "Rust", "SQL"]);
        assert_eq!(result.education, "BSc Computer Science");
        assert_eq!(result.entities.person, vec!["Johnson"]);
        assert_eq!(result.entities.organization, vec!["Acme"]);
        assert!(seen.iter().all(|f| f.progress == 100 || f.result.is_none()));
    }

    #[tokio::test]
    async fn test_conversion_failure_emits_failed_terminal_frame() {
        let registry = registry();
        let engines = Arc::new(EngineHandle::preloaded(mock_engines(Arc::new(MockNer))));
        let id = Uuid::new_v4();
        registry.create_or_get(id);
        let mut sub = registry.subscribe(id).unwrap();

        run(
            registry.clone(),
            engines,
            id,
            b"not a document at all".to_vec(),
            Some("application/msword".to_string()),
        )
        .await;

        let mut last = None;
        while let Ok(frame) = sub.receiver.try_recv() {
            last = Some(frame);
        }
        let last = last.unwrap();
        assert_eq!(last.progress, 10);
        assert_eq!(last.result, None);
        assert_eq!(last.error, Some(FailureCode::ConversionFailed));
    }

    #[tokio::test]
    async fn test_extraction_failure_fails_the_whole_job() {
        let registry = registry();
        let engines = Arc::new(EngineHandle::preloaded(mock_engines(Arc::new(FailingNer))));
        let id = Uuid::new_v4();
        registry.create_or_get(id);
        let mut sub = registry.subscribe(id).unwrap();

        run(
            registry.clone(),
            engines,
            id,
            docx_bytes(&["Plain paragraph"]),
            None,
        )
        .await;

        let mut last = None;
        while let Ok(frame) = sub.receiver.try_recv() {
            last = Some(frame);
        }
        let last = last.unwrap();
        assert_eq!(last.progress, 55);
        assert_eq!(last.result, None);
        assert_eq!(last.error, Some(FailureCode::ExtractionFailed));
    }

    #[test]
    fn test_split_skills_trims_and_preserves_duplicates() {
        assert_eq!(
            split_skills("Rust, Docker; Rust\n SQL • Go"),
            vec!["Rust", "Docker", "Rust", "SQL", "Go"]
        );
    }

    #[test]
    fn test_split_skills_drops_empty_pieces() {
        assert_eq!(split_skills(",;\n,  ,"), Vec::<String>::new());
    }
}
