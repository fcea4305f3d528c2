//! Layout heuristics: a fixed, ordered rule pipeline over the normalized
//! document. Each rule emits zero or one advisory string; the final list is
//! truncated to the first ten.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::analysis::flavour::{CanonicalHeading, Flavour};
use crate::analysis::normalize::NormalizedDocument;
use crate::nlp::Summarization;

const MAX_TIPS: usize = 10;
const BULLET_GLYPHS: &[char] = &['•', '*', '-'];
const LOW_BULLET_RATIO: f64 = 0.15;
const HIGH_BULLET_RATIO: f64 = 0.50;
const MIN_READABLE_FONT_PT: f32 = 9.0;
const POLISH_PROMPT: &str = "One short bullet to polish this resume's formatting:\n\n";
const POLISH_CONTEXT_CHARS: usize = 2000;

static METRIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d[%$]|[\d,]{3,}\s*(users|customers|downloads|servers)")
        .expect("metric pattern")
});
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)street|road|avenue|vc\d+").expect("address pattern"));

/// Runs every rule in order. Only the polish rule can fail, and its failure
/// is swallowed — a missing tip never fails the job.
pub async fn build_layout_tips(
    doc: &NormalizedDocument,
    flavour: Flavour,
    summarizer: &dyn Summarization,
) -> Vec<String> {
    let mut tips = Vec::new();

    // 1 + 2: heading coverage, duplicate EDUCATION
    let mut present: HashSet<CanonicalHeading> = HashSet::new();
    let mut education_nodes = 0usize;
    for node in doc.heading_candidates() {
        for heading in CanonicalHeading::matching(&node.text) {
            if heading == CanonicalHeading::Education {
                education_nodes += 1;
            }
            present.insert(heading);
        }
    }
    for heading in flavour.expected_headings() {
        if !present.contains(heading) {
            tips.push(format!(
                "Add a **{}** section so employers & ATS can locate it quickly.",
                heading.name()
            ));
        }
    }
    if education_nodes > 1 {
        tips.push("Merge duplicate **EDUCATION** sections into one block.".to_string());
    }

    // 3: bullet density over raw newline-split lines
    let total_lines = doc.plain.split('\n').count();
    let bullet_lines = doc
        .plain
        .split('\n')
        .filter(|line| line.starts_with(BULLET_GLYPHS))
        .count();
    let ratio = bullet_lines as f64 / total_lines as f64;
    if ratio < LOW_BULLET_RATIO {
        tips.push("Convert dense paragraphs into concise bullet points (4-6 per role).".to_string());
    } else if ratio > HIGH_BULLET_RATIO {
        tips.push("Group related bullets under sub-headings to avoid very long lists.".to_string());
    }

    // 4: impact metrics
    if !METRIC_RE.is_match(&doc.plain) {
        tips.push(
            "Add concrete metrics ( %, $, # ) to show impact (e.g. “Cut costs by 15 %”)."
                .to_string(),
        );
    }

    // 5: address verbosity
    if ADDRESS_RE.find_iter(&doc.plain).count() > 2 {
        tips.push(
            "Trim address to **City, Country**; ATS doesn’t need the full postal code."
                .to_string(),
        );
    }

    // 6: tiny fonts
    if doc.font_sizes_pt().any(|pt| pt < MIN_READABLE_FONT_PT) {
        tips.push("Increase tiny font sizes (<9 pt) for readability.".to_string());
    }

    // 7: model polish tip
    match summarizer.summarize(&polish_prompt(&doc.plain)).await {
        Ok(extra) => {
            let extra = extra
                .trim_start_matches(|c: char| c == '-' || c == '•' || c.is_whitespace())
                .trim()
                .to_string();
            if !extra.is_empty() {
                tips.push(extra);
            }
        }
        Err(e) => debug!("polish tip unavailable: {e}"),
    }

    tips.truncate(MAX_TIPS);
    tips
}

fn polish_prompt(plain: &str) -> String {
    let prefix: String = plain.chars().take(POLISH_CONTEXT_CHARS).collect();
    format!("{POLISH_PROMPT}{prefix}")
}
