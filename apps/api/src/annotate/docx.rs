//! Word (.docx) highlighting.
//!
//! Only `word/document.xml` is rewritten; every other archive entry is copied
//! verbatim. For each paragraph and each keyword (sorted order) whose text
//! occurs in it, the paragraph content is cleared and rebuilt as plain runs
//! around underlined runs for each match. Paragraph properties and runs holding
//! drawings survive the rebuild. Only the paragraph's own runs (and those in
//! hyperlinks) are read, so paragraphs inside text boxes are left untouched. Several matching keywords mean several successive rebuilds, so the
//! last matching keyword decides the final run layout while every match is
//! counted.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::RegexBuilder;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::annotate::AnnotationStats;

const DOCUMENT_PART: &str = "word/document.xml";

const PARAGRAPH: &[u8] = b"w:p";
const PARAGRAPH_PROPERTIES: &[u8] = b"w:pPr";
const RUN: &[u8] = b"w:r";
const TEXT: &[u8] = b"w:t";
const TAB: &[u8] = b"w:tab";
const BREAK: &[u8] = b"w:br";
const CARRIAGE_RETURN: &[u8] = b"w:cr";
const HYPERLINK: &[u8] = b"w:hyperlink";
/// Run content that carries its own nested paragraphs or binary parts.
const EMBEDDED: &[&[u8]] = &[b"w:drawing", b"w:pict", b"w:object", b"mc:AlternateContent"];

/// A run to emit in a rebuilt paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run<'a> {
    text: &'a str,
    underline: bool,
}

impl<'a> Run<'a> {
    fn plain(text: &'a str) -> Self {
        Self {
            text,
            underline: false,
        }
    }

    fn underlined(text: &'a str) -> Self {
        Self {
            text,
            underline: true,
        }
    }
}

/// Rewrites a .docx archive with keyword matches underlined.
pub fn highlight_docx(
    bytes: &[u8],
    keywords: &BTreeSet<String>,
) -> Result<(Vec<u8>, AnnotationStats)> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("résumé is not a valid .docx archive")?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut stats = AnnotationStats::for_paragraphs(keywords.len());
    let mut found = false;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.name() == DOCUMENT_PART {
            let mut xml = Vec::new();
            entry.read_to_end(&mut xml)?;
            let rewritten = rewrite_document_xml(&xml, keywords, &mut stats)?;
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(DOCUMENT_PART, options)?;
            writer.write_all(&rewritten)?;
            found = true;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }

    if !found {
        bail!("{DOCUMENT_PART} not found in .docx archive");
    }

    let cursor = writer.finish()?;
    Ok((cursor.into_inner(), stats))
}

/// Streams the main document part, buffering one top-level paragraph at a time.
fn rewrite_document_xml(
    xml: &[u8],
    keywords: &BTreeSet<String>,
    stats: &mut AnnotationStats,
) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut paragraph: Vec<Event<'static>> = Vec::new();
    let mut depth = 0usize;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("malformed {DOCUMENT_PART}"))?;

        let boundary = match &event {
            Event::Start(e) if e.name().as_ref() == PARAGRAPH => Some(true),
            Event::End(e) if e.name().as_ref() == PARAGRAPH => Some(false),
            _ => None,
        };

        match (event, boundary) {
            (Event::Eof, _) => break,
            (event, Some(true)) => {
                depth += 1;
                paragraph.push(event.into_owned());
            }
            (event, Some(false)) if depth > 0 => {
                depth -= 1;
                paragraph.push(event.into_owned());
                if depth == 0 {
                    let events = std::mem::take(&mut paragraph);
                    for rebuilt in highlight_paragraph(events, keywords, stats)? {
                        writer.write_event(rebuilt)?;
                    }
                }
            }
            (event, _) if depth > 0 => paragraph.push(event.into_owned()),
            (event, _) => writer.write_event(event)?,
        }
        buf.clear();
    }

    if depth > 0 {
        bail!("unterminated paragraph in {DOCUMENT_PART}");
    }

    Ok(writer.into_inner())
}

/// True for the paragraph's own runs: `w:p/w:r` or `w:p/w:hyperlink/w:r`.
/// Paragraphs nested in text boxes sit deeper and never match.
fn is_own_run(path: &[Vec<u8>]) -> bool {
    match path {
        [p, r] => p.as_slice() == PARAGRAPH && r.as_slice() == RUN,
        [p, h, r] => {
            p.as_slice() == PARAGRAPH && h.as_slice() == HYPERLINK && r.as_slice() == RUN
        }
        _ => false,
    }
}

/// Text of a paragraph as a reader sees it: own run text, tabs and line breaks.
fn paragraph_text(events: &[Event<'static>]) -> Result<String> {
    let mut text = String::new();
    // Element names from the paragraph down to the current element.
    let mut path: Vec<Vec<u8>> = Vec::new();

    for event in events {
        match event {
            Event::Start(e) => path.push(e.name().as_ref().to_vec()),
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) => {
                if let Some((last, parent)) = path.split_last() {
                    if last.as_slice() == TEXT && is_own_run(parent) {
                        text.push_str(&t.unescape()?);
                    }
                }
            }
            Event::Empty(e) if is_own_run(&path) => match e.name().as_ref() {
                TAB => text.push('\t'),
                BREAK | CARRIAGE_RETURN => text.push('\n'),
                _ => {}
            },
            _ => {}
        }
    }
    Ok(text)
}

/// Splits `text` into plain and underlined runs around every match of `keyword`.
/// Returns the runs and the number of matches.
fn split_runs<'a>(text: &'a str, keyword: &str) -> Result<(Vec<Run<'a>>, usize)> {
    let pattern = RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()?;

    let mut runs = Vec::new();
    let mut last_end = 0;
    let mut matches = 0;
    for m in pattern.find_iter(text) {
        if m.start() > last_end {
            runs.push(Run::plain(&text[last_end..m.start()]));
        }
        runs.push(Run::underlined(m.as_str()));
        matches += 1;
        last_end = m.end();
    }

    if matches == 0 {
        return Ok((vec![Run::plain(text)], 0));
    }
    if last_end < text.len() {
        runs.push(Run::plain(&text[last_end..]));
    }
    Ok((runs, matches))
}

fn highlight_paragraph(
    events: Vec<Event<'static>>,
    keywords: &BTreeSet<String>,
    stats: &mut AnnotationStats,
) -> Result<Vec<Event<'static>>> {
    let text = paragraph_text(&events)?;
    let lowered = text.to_lowercase();

    let mut layout: Option<Vec<Run<'_>>> = None;
    let mut modified = false;

    for keyword in keywords {
        if !lowered.contains(keyword.as_str()) {
            continue;
        }
        let (runs, matches) = split_runs(&text, keyword)?;
        stats.highlighted_keywords += matches;
        modified |= matches > 0;
        layout = Some(runs);
    }

    let Some(runs) = layout else {
        return Ok(events);
    };

    if modified {
        if let Some(count) = stats.paragraphs_modified.as_mut() {
            *count += 1;
        }
    }

    let mut rebuilt = Vec::with_capacity(runs.len() * 6 + 8);
    let mut inner = events.into_iter();
    let (Some(open), Some(close)) = (inner.next(), inner.next_back()) else {
        bail!("paragraph without start and end tags");
    };
    rebuilt.push(open);
    rebuilt.extend(preserved_children(inner));
    for run in &runs {
        rebuilt.extend(run_events(run));
    }
    rebuilt.push(close);
    Ok(rebuilt)
}

/// Direct children of a paragraph that survive a rebuild: `w:pPr` and runs
/// holding drawings, text boxes or embedded objects, in document order.
fn preserved_children(events: impl Iterator<Item = Event<'static>>) -> Vec<Event<'static>> {
    let mut kept = Vec::new();
    let mut child: Vec<Event<'static>> = Vec::new();
    let mut depth = 0usize;
    let mut keep = false;

    for event in events {
        match &event {
            Event::Start(e) => {
                let name = e.name();
                if depth == 0 {
                    keep = name.as_ref() == PARAGRAPH_PROPERTIES;
                } else if EMBEDDED.contains(&name.as_ref()) {
                    keep = true;
                }
                depth += 1;
                child.push(event);
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                child.push(event);
                if depth == 0 {
                    if keep {
                        kept.append(&mut child);
                    } else {
                        child.clear();
                    }
                    keep = false;
                }
            }
            Event::Empty(e) if depth == 0 => {
                if e.name().as_ref() == PARAGRAPH_PROPERTIES {
                    kept.push(event);
                }
            }
            Event::Empty(e) => {
                if EMBEDDED.contains(&e.name().as_ref()) {
                    keep = true;
                }
                child.push(event);
            }
            _ => {
                if depth > 0 {
                    child.push(event);
                }
            }
        }
    }
    kept
}

fn run_events(run: &Run<'_>) -> Vec<Event<'static>> {
    let mut events = vec![Event::Start(BytesStart::new("w:r"))];
    if run.underline {
        events.push(Event::Start(BytesStart::new("w:rPr")));
        events.push(Event::Empty(
            BytesStart::new("w:u").with_attributes([("w:val", "single")]),
        ));
        events.push(Event::End(BytesEnd::new("w:rPr")));
    }

    let mut rest = run.text;
    while !rest.is_empty() {
        let split = rest.find(['\t', '\n']).unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(split);
        if !chunk.is_empty() {
            events.push(Event::Start(
                BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
            ));
            events.push(Event::Text(BytesText::new(chunk).into_owned()));
            events.push(Event::End(BytesEnd::new("w:t")));
        }
        let mut chars = tail.chars();
        match chars.next() {
            Some('\t') => events.push(Event::Empty(BytesStart::new("w:tab"))),
            Some(_) => events.push(Event::Empty(BytesStart::new("w:br"))),
            None => {}
        }
        rest = chars.as_str();
    }

    events.push(Event::End(BytesEnd::new("w:r")));
    events
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    pub(crate) fn docx_with_xml_body(body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("[Content_Types].xml", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(
                br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
            )
            .unwrap();
            zip.start_file(DOCUMENT_PART, SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><w:document xmlns:w=\"{W_NS}\"><w:body>{body}</w:body></w:document>"
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    pub(crate) fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", escape(p)))
            .collect();
        docx_with_xml_body(&body)
    }

    fn keywords(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn document_xml(docx: &[u8]) -> String {
        let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
        let mut entry = archive.by_name(DOCUMENT_PART).unwrap();
        let mut xml = String::new();
        entry.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn test_counts_every_case_insensitive_match() {
        let input = docx_with_paragraphs(&["Python et PYTHON", "Rien ici", "python"]);
        let (_, stats) = highlight_docx(&input, &keywords(&["python"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 3);
        assert_eq!(stats.paragraphs_modified, Some(2));
        assert_eq!(stats.total_keywords, 1);
    }

    #[test]
    fn test_matches_are_underlined_runs() {
        let input = docx_with_paragraphs(&["Expert Rust confirmé"]);
        let (output, _) = highlight_docx(&input, &keywords(&["rust"])).unwrap();
        let xml = document_xml(&output);
        assert!(xml.contains(r#"<w:u w:val="single"/></w:rPr><w:t xml:space="preserve">Rust</w:t>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve">Expert </w:t>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve"> confirmé</w:t>"#));
    }

    #[test]
    fn test_paragraph_counted_once_for_several_keywords() {
        let input = docx_with_paragraphs(&["Java et Spring et Java"]);
        let (output, stats) = highlight_docx(&input, &keywords(&["java", "spring"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 3);
        assert_eq!(stats.paragraphs_modified, Some(1));
        // "spring" sorts last, so its rebuild is the one left in the document.
        let xml = document_xml(&output);
        assert!(xml.contains(r#"<w:t xml:space="preserve">Spring</w:t>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve">Java et </w:t>"#));
    }

    #[test]
    fn test_unmatched_paragraphs_are_untouched() {
        let body = r#"<w:p w:rsidR="00AB"><w:r><w:rPr><w:b/></w:rPr><w:t>Gras</w:t></w:r></w:p>"#;
        let input = docx_with_xml_body(body);
        let (output, stats) = highlight_docx(&input, &keywords(&["python"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 0);
        assert_eq!(stats.paragraphs_modified, Some(0));
        assert!(document_xml(&output).contains(body));
    }

    #[test]
    fn test_paragraph_properties_survive_rebuild() {
        let body = r#"<w:p><w:pPr><w:pStyle w:val="Titre"/></w:pPr><w:r><w:t>Python</w:t></w:r><w:r><w:t> senior</w:t></w:r></w:p>"#;
        let input = docx_with_xml_body(body);
        let (output, stats) = highlight_docx(&input, &keywords(&["python"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 1);
        let xml = document_xml(&output);
        assert!(xml.contains(r#"<w:pPr><w:pStyle w:val="Titre"/></w:pPr><w:r>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve"> senior</w:t>"#));
    }

    #[test]
    fn test_match_spanning_runs_is_found() {
        let body = r#"<w:p><w:r><w:t>Pyt</w:t></w:r><w:r><w:t>hon</w:t></w:r></w:p>"#;
        let input = docx_with_xml_body(body);
        let (_, stats) = highlight_docx(&input, &keywords(&["python"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 1);
    }

    #[test]
    fn test_tabs_and_breaks_round_trip() {
        let body = r#"<w:p><w:r><w:t>Rust</w:t><w:tab/><w:t>Go</w:t><w:br/><w:t>SQL</w:t></w:r></w:p>"#;
        let input = docx_with_xml_body(body);
        let (output, _) = highlight_docx(&input, &keywords(&["sql"])).unwrap();
        let xml = document_xml(&output);
        assert!(xml.contains(r#"<w:t xml:space="preserve">Rust</w:t><w:tab/><w:t xml:space="preserve">Go</w:t><w:br/></w:r>"#));
    }

    #[test]
    fn test_other_parts_are_copied() {
        let input = docx_with_paragraphs(&["python"]);
        let (output, _) = highlight_docx(&input, &keywords(&["python"])).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(output.as_slice())).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
    }

    #[test]
    fn test_archive_without_document_part_fails() {
        let mut buf = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("other.xml", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        assert!(highlight_docx(&buf, &keywords(&["python"])).is_err());
    }

    const TEXT_BOX_BODY: &str = concat!(
        r#"<w:p><w:r><w:t>Intro </w:t></w:r><w:r><w:drawing><wps:txbx><w:txbxContent>"#,
        r#"<w:p><w:r><w:t>Python</w:t></w:r></w:p>"#,
        r#"</w:txbxContent></wps:txbx></w:drawing></w:r></w:p>"#,
    );

    #[test]
    fn test_text_box_match_leaves_outer_paragraph_alone() {
        let input = docx_with_xml_body(TEXT_BOX_BODY);
        let (output, stats) = highlight_docx(&input, &keywords(&["python"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 0);
        assert_eq!(stats.paragraphs_modified, Some(0));
        assert!(document_xml(&output).contains(TEXT_BOX_BODY));
    }

    #[test]
    fn test_rebuild_keeps_drawing_runs() {
        let body = concat!(
            r#"<w:p><w:r><w:t>Expert Rust </w:t></w:r><w:r><w:drawing><wps:txbx><w:txbxContent>"#,
            r#"<w:p><w:r><w:t>Python</w:t></w:r></w:p>"#,
            r#"</w:txbxContent></wps:txbx></w:drawing></w:r></w:p>"#,
        );
        let input = docx_with_xml_body(body);
        let (output, stats) = highlight_docx(&input, &keywords(&["python", "rust"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 1);
        assert_eq!(stats.paragraphs_modified, Some(1));
        let xml = document_xml(&output);
        assert!(xml.contains(
            r#"<w:r><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>Python</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></w:r>"#
        ));
        assert!(xml.contains(r#"<w:u w:val="single"/></w:rPr><w:t xml:space="preserve">Rust</w:t>"#));
        assert!(!xml.contains(r#"<w:t xml:space="preserve">Python</w:t>"#));
    }

    #[test]
    fn test_hyperlink_runs_count_as_paragraph_text() {
        let body = r#"<w:p><w:hyperlink><w:r><w:t>github.com/python</w:t></w:r></w:hyperlink></w:p>"#;
        let input = docx_with_xml_body(body);
        let (_, stats) = highlight_docx(&input, &keywords(&["python"])).unwrap();
        assert_eq!(stats.highlighted_keywords, 1);
    }

    #[test]
    fn test_split_runs_layout() {
        let (runs, matches) = split_runs("java, JAVA!", "java").unwrap();
        assert_eq!(matches, 2);
        assert_eq!(
            runs,
            vec![
                Run::underlined("java"),
                Run::plain(", "),
                Run::underlined("JAVA"),
                Run::plain("!"),
            ]
        );
    }
}
