//! Entity reconstruction: sub-word untokenization and BIO-tag grouping.
//!
//! Both passes are single-sweep and order-preserving, O(n) in token count.

use crate::analysis::models::EntityGroups;

/// Leading marker a tokenizer puts on sub-word continuations ("##son").
pub const CONTINUATION_MARKER: &str = "##";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Person,
    Organization,
    Location,
}

/// Position of a token within a named-entity span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BioTag {
    Outside,
    Begin(EntityKind),
    Inside(EntityKind),
}

impl BioTag {
    /// Maps a model label such as "B-PER" or "I-LOC" onto a tag variant.
    /// Kinds the pipeline does not track (e.g. MISC) collapse to `Outside`.
    pub fn from_label(label: &str) -> Self {
        let Some((prefix, kind)) = label.split_once('-') else {
            return BioTag::Outside;
        };
        let kind = match kind {
            "PER" => EntityKind::Person,
            "ORG" => EntityKind::Organization,
            "LOC" => EntityKind::Location,
            _ => return BioTag::Outside,
        };
        match prefix {
            "B" => BioTag::Begin(kind),
            "I" => BioTag::Inside(kind),
            _ => BioTag::Outside,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub tag: BioTag,
}

impl Token {
    pub fn new(text: impl Into<String>, tag: BioTag) -> Self {
        Self {
            text: text.into(),
            tag,
        }
    }

    fn is_continuation(&self) -> bool {
        self.text.starts_with(CONTINUATION_MARKER)
    }

    fn unmarked(&self) -> &str {
        self.text
            .strip_prefix(CONTINUATION_MARKER)
            .unwrap_or(&self.text)
    }
}

/// What to do with a continuation tag whose kind differs from the open span.
///
/// The upstream behavior is to discard such tokens outright; `FlushRestart`
/// instead closes the open span and begins a new one of the token's kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    #[default]
    Drop,
    FlushRestart,
}

/// Merges sub-word continuations into the preceding word. A token without a
/// predecessor keeps its marker and starts a word; tag of the first piece wins.
pub fn untokenize(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match out.last_mut() {
            Some(prev) if token.is_continuation() => prev.text.push_str(token.unmarked()),
            _ => out.push(token),
        }
    }
    out
}

/// Groups tagged tokens into per-kind entity sets in one ordered pass.
///
/// `Begin` flushes any open span into its own kind's group and opens a new
/// one; a matching `Inside` extends the span (no separator for sub-word
/// continuations, a single space otherwise); `Outside` is ignored.
pub fn group_entities(tokens: &[Token], policy: MismatchPolicy) -> EntityGroups {
    let mut groups = EntityGroups::default();
    let mut buffer = String::new();
    let mut open: Option<EntityKind> = None;

    for token in tokens {
        match token.tag {
            BioTag::Begin(kind) => {
                flush(&mut groups, &mut buffer, open);
                buffer.push_str(token.unmarked());
                open = Some(kind);
            }
            BioTag::Inside(kind) if open == Some(kind) => {
                if token.is_continuation() {
                    buffer.push_str(token.unmarked());
                } else {
                    buffer.push(' ');
                    buffer.push_str(&token.text);
                }
            }
            BioTag::Inside(kind) => match policy {
                MismatchPolicy::Drop => {}
                MismatchPolicy::FlushRestart => {
                    flush(&mut groups, &mut buffer, open);
                    buffer.push_str(token.unmarked());
                    open = Some(kind);
                }
            },
            BioTag::Outside => {}
        }
    }
    flush(&mut groups, &mut buffer, open);
    groups
}

fn flush(groups: &mut EntityGroups, buffer: &mut String, open: Option<EntityKind>) {
    if !buffer.is_empty() {
        if let Some(kind) = open {
            groups.insert(kind, buffer);
        }
        buffer.clear();
    }
}
