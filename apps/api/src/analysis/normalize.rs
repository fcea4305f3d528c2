//! Document normalization: raw upload bytes to markup nodes plus plain text.
//!
//! PDF buffers go through text extraction (no style information survives, so
//! headings are inferred from line shape). Anything else is treated as a
//! word-processor document: a ZIP archive whose `word/document.xml` is walked
//! for paragraph styles, emphasis runs, font sizes and list markers.

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use zip::ZipArchive;

const PDF_MAGIC: &[u8] = b"%PDF";
const PDF_MIME: &str = "application/pdf";
const DOCUMENT_XML: &str = "word/document.xml";
const MAX_HEADING_CHARS: usize = 48;

/// Conversion failure. Always fatal to the job that submitted the document.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("Document archive unreadable: {0}")]
    Archive(String),

    #[error("Document XML unreadable: {0}")]
    Xml(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Heading(u8),
    /// Bold or underlined inline run; scanned as a heading candidate.
    Emphasis,
    Paragraph,
    /// Plain inline run kept only for its font-size declaration.
    Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupNode {
    pub kind: NodeKind,
    pub text: String,
    pub font_size_pt: Option<f32>,
}

/// An HTML-like view of the document: a flat node list in reading order and
/// the visible plain text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDocument {
    pub nodes: Vec<MarkupNode>,
    pub plain: String,
}

impl NormalizedDocument {
    /// Heading-level and emphasis-level nodes, in reading order.
    pub fn heading_candidates(&self) -> impl Iterator<Item = &MarkupNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Heading(_) | NodeKind::Emphasis))
    }

    /// Every inline font-size declaration, in points.
    pub fn font_sizes_pt(&self) -> impl Iterator<Item = f32> + '_ {
        self.nodes.iter().filter_map(|n| n.font_size_pt)
    }
}

/// True when the first bytes carry a PDF signature or the caller declared
/// the PDF media type.
pub fn is_pdf(bytes: &[u8], declared_type: Option<&str>) -> bool {
    bytes.starts_with(PDF_MAGIC) || declared_type == Some(PDF_MIME)
}

pub fn convert(bytes: &[u8], declared_type: Option<&str>) -> Result<NormalizedDocument, ConvertError> {
    if is_pdf(bytes, declared_type) {
        convert_pdf(bytes)
    } else {
        convert_docx(bytes)
    }
}

fn convert_pdf(bytes: &[u8]) -> Result<NormalizedDocument, ConvertError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ConvertError::Pdf(e.to_string()))?;
    let nodes = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| MarkupNode {
            kind: if looks_like_heading(line) {
                NodeKind::Heading(2)
            } else {
                NodeKind::Paragraph
            },
            text: line.to_string(),
            font_size_pt: None,
        })
        .collect();
    Ok(NormalizedDocument { nodes, plain: text })
}

/// Short unpunctuated lines, fully upper-case or colon-terminated, read as
/// section headings. Plain extracted text offers nothing better to go on.
fn looks_like_heading(line: &str) -> bool {
    if line.chars().count() > MAX_HEADING_CHARS || !line.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    if line.ends_with(':') {
        return true;
    }
    if line.ends_with('.') || line.contains(',') {
        return false;
    }
    line.chars()
        .filter(|c| c.is_alphabetic())
        .all(|c| c.is_uppercase())
}

fn convert_docx(bytes: &[u8]) -> Result<NormalizedDocument, ConvertError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ConvertError::Archive(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| ConvertError::Archive(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| ConvertError::Archive(e.to_string()))?;
    parse_document_xml(&xml)
}

/// Streaming walk over `word/document.xml`. Paragraph styles Heading1..9 and
/// Title become heading nodes, bold/underline runs become emphasis nodes,
/// `w:sz` half-point sizes become inline font sizes, and numbered paragraphs
/// get a `- ` bullet prefix in the plain text.
fn parse_document_xml(xml: &str) -> Result<NormalizedDocument, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut walker = DocxWalker::default();

    loop {
        match reader
            .read_event()
            .map_err(|e| ConvertError::Xml(e.to_string()))?
        {
            Event::Start(e) => walker.open(&e, false),
            Event::Empty(e) => walker.open(&e, true),
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| ConvertError::Xml(e.to_string()))?;
                walker.text(&text);
            }
            Event::End(e) => walker.close(e.name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(walker.finish())
}

#[derive(Default)]
struct DocxWalker {
    nodes: Vec<MarkupNode>,
    plain_lines: Vec<String>,
    // paragraph state
    para_text: String,
    para_style: Option<String>,
    para_is_list: bool,
    para_runs: Vec<MarkupNode>,
    // run state
    run_text: String,
    run_bold: bool,
    run_underline: bool,
    run_size_pt: Option<f32>,
    in_run_props: bool,
    in_text: bool,
}

impl DocxWalker {
    fn open(&mut self, e: &BytesStart<'_>, is_empty: bool) {
        match e.name().as_ref() {
            b"w:p" => {
                self.para_text.clear();
                self.para_style = None;
                self.para_is_list = false;
                self.para_runs.clear();
            }
            b"w:r" => {
                self.run_text.clear();
                self.run_bold = false;
                self.run_underline = false;
                self.run_size_pt = None;
            }
            b"w:rPr" => self.in_run_props = true,
            b"w:pStyle" => self.para_style = attr(e, b"w:val"),
            b"w:numPr" => self.para_is_list = true,
            b"w:b" | b"w:bCs" if self.in_run_props => self.run_bold = !val_off(e),
            b"w:u" if self.in_run_props => self.run_underline = !val_off(e),
            b"w:sz" if self.in_run_props => {
                // half-point units
                self.run_size_pt = attr(e, b"w:val")
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|half| half / 2.0);
            }
            b"w:t" if !is_empty => self.in_text = true,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            self.run_text.push_str(text);
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:r" => self.close_run(),
            b"w:p" => self.close_paragraph(),
            _ => {}
        }
    }

    fn close_run(&mut self) {
        if !self.run_text.is_empty() {
            if self.run_bold || self.run_underline {
                self.para_runs.push(MarkupNode {
                    kind: NodeKind::Emphasis,
                    text: self.run_text.trim().to_string(),
                    font_size_pt: self.run_size_pt,
                });
            } else if self.run_size_pt.is_some() {
                self.para_runs.push(MarkupNode {
                    kind: NodeKind::Span,
                    text: self.run_text.trim().to_string(),
                    font_size_pt: self.run_size_pt,
                });
            }
            self.para_text.push_str(&self.run_text);
        }
        self.run_text.clear();
    }

    fn close_paragraph(&mut self) {
        let text = self.para_text.trim().to_string();
        if text.is_empty() {
            self.para_runs.clear();
            return;
        }

        let line = if self.para_is_list {
            format!("- {text}")
        } else {
            text
        };
        let heading = heading_level(self.para_style.as_deref());
        self.nodes.push(MarkupNode {
            kind: heading.map(NodeKind::Heading).unwrap_or(NodeKind::Paragraph),
            text: line.clone(),
            font_size_pt: None,
        });
        for mut run in std::mem::take(&mut self.para_runs) {
            // a heading already counts once; demote its runs to plain spans
            if heading.is_some() && run.kind == NodeKind::Emphasis {
                run.kind = NodeKind::Span;
            }
            self.nodes.push(run);
        }
        self.plain_lines.push(line);
    }

    fn finish(self) -> NormalizedDocument {
        NormalizedDocument {
            nodes: self.nodes,
            plain: self.plain_lines.join("\n"),
        }
    }
}

fn heading_level(style: Option<&str>) -> Option<u8> {
    let style = style?;
    if style == "Title" {
        return Some(1);
    }
    style.strip_prefix("Heading").and_then(|d| d.parse().ok())
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(Result::ok)
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// True when `w:val` explicitly switches the property off.
fn val_off(e: &BytesStart<'_>) -> bool {
    matches!(
        attr(e, b"w:val").as_deref(),
        Some("0") | Some("false") | Some("none")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn docx_bytes(body: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{body}</w:body>
</w:document>"#
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        writer.start_file(DOCUMENT_XML, options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn para(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    fn heading(style: &str, text: &str) -> String {
        format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
        )
    }

    #[test]
    fn test_pdf_signature_is_sniffed() {
        assert!(is_pdf(b"%PDF-1.7 rest", None));
        assert!(is_pdf(b"PK\x03\x04", Some("application/pdf")));
        assert!(!is_pdf(b"PK\x03\x04", Some("application/msword")));
    }

    #[test]
    fn test_garbage_pdf_is_a_conversion_error() {
        let err = convert(b"%PDF-1.7 not really a pdf", None).unwrap_err();
        assert!(matches!(err, ConvertError::Pdf(_)));
    }

    #[test]
    fn test_garbage_docx_is_a_conversion_error() {
        let err = convert(b"not a zip archive", Some("application/msword")).unwrap_err();
        assert!(matches!(err, ConvertError::Archive(_)));
    }

    #[test]
    fn test_docx_headings_and_paragraphs() {
        let body = format!(
            "{}{}{}",
            heading("Heading1", "Education"),
            para("BSc Computer Science, 2019."),
            heading("Title", "Jane Doe")
        );
        let doc = convert(&docx_bytes(&body), None).unwrap();

        let headings: Vec<_> = doc.heading_candidates().collect();
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].kind, NodeKind::Heading(1));
        assert_eq!(headings[0].text, "Education");
        assert_eq!(headings[1].text, "Jane Doe");
        assert_eq!(
            doc.plain,
            "Education\nBSc Computer Science, 2019.\nJane Doe"
        );
    }

    #[test]
    fn test_docx_bold_run_becomes_emphasis_node() {
        let body = concat!(
            "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Skills</w:t></w:r>",
            "<w:r><w:t> include Rust</w:t></w:r></w:p>"
        );
        let doc = convert(&docx_bytes(body), None).unwrap();

        let emphasis: Vec<_> = doc.heading_candidates().collect();
        assert_eq!(emphasis.len(), 1);
        assert_eq!(emphasis[0].kind, NodeKind::Emphasis);
        assert_eq!(emphasis[0].text, "Skills");
        assert_eq!(doc.plain, "Skills include Rust");
    }

    #[test]
    fn test_docx_explicitly_disabled_bold_is_not_emphasis() {
        let body = r#"<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>Education</w:t></w:r></w:p>"#;
        let doc = convert(&docx_bytes(body), None).unwrap();
        assert_eq!(doc.heading_candidates().count(), 0);
    }

    #[test]
    fn test_docx_half_point_sizes_convert_to_points() {
        let body = r#"<w:p><w:r><w:rPr><w:sz w:val="16"/></w:rPr><w:t>fine print</w:t></w:r></w:p>"#;
        let doc = convert(&docx_bytes(body), None).unwrap();
        let sizes: Vec<f32> = doc.font_sizes_pt().collect();
        assert_eq!(sizes, vec![8.0]);
    }

    #[test]
    fn test_docx_list_paragraphs_get_bullet_prefix() {
        let body = concat!(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr>"#,
            "<w:r><w:t>Led migration</w:t></w:r></w:p>"
        );
        let doc = convert(&docx_bytes(body), None).unwrap();
        assert_eq!(doc.plain, "- Led migration");
    }

    #[test]
    fn test_docx_heading_runs_do_not_double_count() {
        // A bold run inside a styled heading must not yield a second candidate.
        let body = concat!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr>"#,
            "<w:r><w:rPr><w:b/></w:rPr><w:t>Education</w:t></w:r></w:p>"
        );
        let doc = convert(&docx_bytes(body), None).unwrap();
        assert_eq!(doc.heading_candidates().count(), 1);
    }

    #[test]
    fn test_empty_docx_paragraphs_are_skipped() {
        let body = format!("<w:p/><w:p></w:p>{}", para("Content"));
        let doc = convert(&docx_bytes(&body), None).unwrap();
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.plain, "Content");
    }

    #[test]
    fn test_heading_line_shapes() {
        assert!(looks_like_heading("EDUCATION"));
        assert!(looks_like_heading("Key Skills:"));
        assert!(!looks_like_heading("Worked at Acme for five years."));
        assert!(!looks_like_heading("EDUCATION, TRAINING AND OTHER QUALIFICATIONS OBTAINED"));
        assert!(!looks_like_heading("2019 - 2023"));
    }

    #[test]
    fn test_heading_level_parsing() {
        assert_eq!(heading_level(Some("Heading1")), Some(1));
        assert_eq!(heading_level(Some("Heading3")), Some(3));
        assert_eq!(heading_level(Some("Title")), Some(1));
        assert_eq!(heading_level(Some("ListParagraph")), None);
        assert_eq!(heading_level(None), None);
    }
}
