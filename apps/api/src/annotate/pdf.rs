//! PDF highlighting.
//!
//! Per page: extract the text, count keyword occurrences, and when the page
//! qualifies draw one translucent yellow rectangle per occurrence. Positions
//! are estimated from the character offset of the occurrence in the extracted
//! text, which is only a rough visual cue: it ignores fonts and line wrapping.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::annotate::{AnnotationStats, PdfHighlightGate};

const CHAR_WIDTH: f32 = 7.0;
const CHARS_PER_LINE: usize = 50;
const LINE_HEIGHT: f32 = 12.0;
const HIGHLIGHT_OPACITY: f32 = 0.3;
const HIGHLIGHT_STATE: &[u8] = b"CvHighlight";
/// US letter height, used when no MediaBox can be resolved.
const DEFAULT_PAGE_HEIGHT: f32 = 792.0;
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Overlay rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl HighlightRect {
    /// `x = offset × 7`, `y = height − (offset div 50) × 12`.
    pub fn at_offset(offset: usize, keyword_chars: usize, page_height: f32) -> Self {
        Self {
            x: offset as f32 * CHAR_WIDTH,
            y: page_height - (offset / CHARS_PER_LINE) as f32 * LINE_HEIGHT,
            width: keyword_chars as f32 * CHAR_WIDTH,
            height: LINE_HEIGHT,
        }
    }
}

/// Rewrites a PDF with highlight overlays on qualifying pages.
pub fn highlight_pdf(
    bytes: &[u8],
    keywords: &BTreeSet<String>,
    gate: PdfHighlightGate,
) -> Result<(Vec<u8>, AnnotationStats)> {
    let mut doc = Document::load_mem(bytes).context("résumé is not a readable PDF")?;
    let mut stats = AnnotationStats::for_pages(keywords.len());
    let mut pages_modified = 0;
    let mut state_id: Option<ObjectId> = None;

    for (page_number, page_id) in doc.get_pages() {
        let text = match doc.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("No text extracted from page {page_number}: {e}");
                String::new()
            }
        };
        if text.trim().is_empty() {
            continue;
        }

        let lowered = text.to_lowercase();
        let page_hits = count_occurrences(&lowered, keywords);
        stats.highlighted_keywords += page_hits;

        let qualifies = match gate {
            PdfHighlightGate::PerPage => page_hits > 0,
            PdfHighlightGate::Cumulative => stats.highlighted_keywords > 0,
        };
        if !qualifies {
            continue;
        }

        let rects = highlight_rects(&lowered, keywords, page_height(&doc, page_id));
        if !rects.is_empty() {
            let gs_id = *state_id.get_or_insert_with(|| doc.add_object(highlight_state()));
            overlay_page(&mut doc, page_id, gs_id, &rects)
                .with_context(|| format!("failed to annotate page {page_number}"))?;
        }
        pages_modified += 1;
    }

    stats.pages_modified = Some(pages_modified);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .context("failed to serialise annotated PDF")?;
    Ok((out, stats))
}

/// Non-overlapping substring occurrences of every keyword present in the text.
fn count_occurrences(lowered: &str, keywords: &BTreeSet<String>) -> usize {
    keywords
        .iter()
        .filter(|keyword| lowered.contains(keyword.as_str()))
        .map(|keyword| lowered.matches(keyword.as_str()).count())
        .sum()
}

/// One rectangle per (possibly overlapping) occurrence, keyword by keyword.
pub fn highlight_rects(
    lowered: &str,
    keywords: &BTreeSet<String>,
    page_height: f32,
) -> Vec<HighlightRect> {
    let mut rects = Vec::new();
    for keyword in keywords {
        let keyword_chars = keyword.chars().count();
        let mut start = 0;
        while let Some(found) = lowered[start..].find(keyword.as_str()) {
            let position = start + found;
            let offset = lowered[..position].chars().count();
            rects.push(HighlightRect::at_offset(offset, keyword_chars, page_height));
            start = position
                + lowered[position..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
        }
    }
    rects
}

fn highlight_state() -> Dictionary {
    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("ca", Object::Real(HIGHLIGHT_OPACITY));
    state.set("CA", Object::Real(HIGHLIGHT_OPACITY));
    state
}

/// Walks the page tree upwards for an inheritable attribute (MediaBox, Resources).
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_object(current?).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn page_height(doc: &Document, page_id: ObjectId) -> f32 {
    let media_box = match inherited_attribute(doc, page_id, b"MediaBox") {
        Some(Object::Reference(id)) => doc.get_object(id).ok().cloned(),
        other => other,
    };
    media_box
        .as_ref()
        .and_then(|obj| obj.as_array().ok())
        .filter(|values| values.len() == 4)
        .and_then(|values| {
            let bottom = values[1].as_float().ok()?;
            let top = values[3].as_float().ok()?;
            Some((top - bottom).abs())
        })
        .unwrap_or(DEFAULT_PAGE_HEIGHT)
}

/// Registers the highlight graphics state in the page's resources.
/// Inherited resources are first copied onto the page itself.
fn install_graphics_state(doc: &mut Document, page_id: ObjectId, gs_id: ObjectId) -> Result<()> {
    if !doc.get_object(page_id)?.as_dict()?.has(b"Resources") {
        let inherited = inherited_attribute(doc, page_id, b"Resources")
            .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", inherited);
    }

    let resources_id = match doc.get_object(page_id)?.as_dict()?.get(b"Resources")? {
        Object::Reference(id) => Some(*id),
        _ => None,
    };

    let states_id = {
        let resources = match resources_id {
            Some(id) => doc.get_object(id)?.as_dict()?,
            None => doc.get_object(page_id)?.as_dict()?.get(b"Resources")?.as_dict()?,
        };
        match resources.get(b"ExtGState") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    let states = match states_id {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        None => {
            let resources = match resources_id {
                Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
                None => doc
                    .get_object_mut(page_id)?
                    .as_dict_mut()?
                    .get_mut(b"Resources")?
                    .as_dict_mut()?,
            };
            if !resources.has(b"ExtGState") {
                resources.set("ExtGState", Dictionary::new());
            }
            resources.get_mut(b"ExtGState")?.as_dict_mut()?
        }
    };
    states.set(HIGHLIGHT_STATE.to_vec(), Object::Reference(gs_id));
    Ok(())
}

/// Appends the overlay as a new content stream, isolating the original
/// content in `q ... Q` so its graphics state cannot leak into the overlay.
fn overlay_page(
    doc: &mut Document,
    page_id: ObjectId,
    gs_id: ObjectId,
    rects: &[HighlightRect],
) -> Result<()> {
    install_graphics_state(doc, page_id, gs_id)?;

    let mut operations = vec![
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(HIGHLIGHT_STATE.to_vec())]),
        Operation::new(
            "rg",
            vec![Object::Integer(1), Object::Integer(1), Object::Integer(0)],
        ),
    ];
    for rect in rects {
        operations.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x),
                Object::Real(rect.y),
                Object::Real(rect.width),
                Object::Real(rect.height),
            ],
        ));
    }
    operations.push(Operation::new("f", vec![]));
    operations.push(Operation::new("Q", vec![]));

    let overlay = Content { operations }.encode()?;
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let mut contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    contents.insert(0, Object::Reference(save_id));
    contents.push(Object::Reference(overlay_id));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a PDF with one Courier text line per page. Fonts and MediaBox are
    /// set on the page tree root, so pages inherit them.
    pub(crate) fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Courier".to_vec()));
        let font_id = doc.add_object(font);

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", fonts);
        let resources_id = doc.add_object(resources);

        let mut kids = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Contents", Object::Reference(content_id));
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(kids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        pages.set("Resources", Object::Reference(resources_id));
        pages.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn keywords(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn page_contents_len(pdf: &[u8], page_number: u32) -> usize {
        let doc = Document::load_mem(pdf).unwrap();
        let page_id = doc.get_pages()[&page_number];
        match doc.get_object(page_id).unwrap().as_dict().unwrap().get(b"Contents").unwrap() {
            Object::Array(items) => items.len(),
            _ => 1,
        }
    }

    const PAGES: [&str; 3] = ["Python developer", "Gardening notes", "Python and Rust"];

    #[test]
    fn test_per_page_gate_only_annotates_pages_with_hits() {
        let input = pdf_with_pages(&PAGES);
        let (output, stats) =
            highlight_pdf(&input, &keywords(&["python"]), PdfHighlightGate::PerPage).unwrap();
        assert_eq!(stats.highlighted_keywords, 2);
        assert_eq!(stats.pages_modified, Some(2));
        assert_eq!(page_contents_len(&output, 1), 3);
        assert_eq!(page_contents_len(&output, 2), 1);
    }

    #[test]
    fn test_cumulative_gate_annotates_every_page_after_first_hit() {
        let input = pdf_with_pages(&PAGES);
        let (_, stats) =
            highlight_pdf(&input, &keywords(&["python"]), PdfHighlightGate::Cumulative).unwrap();
        assert_eq!(stats.highlighted_keywords, 2);
        assert_eq!(stats.pages_modified, Some(3));
    }

    #[test]
    fn test_cumulative_gate_skips_pages_before_first_hit() {
        let input = pdf_with_pages(&["Gardening notes", "Python developer"]);
        let (_, stats) =
            highlight_pdf(&input, &keywords(&["python"]), PdfHighlightGate::Cumulative).unwrap();
        assert_eq!(stats.pages_modified, Some(1));
    }

    #[test]
    fn test_every_page_is_kept_in_order() {
        let input = pdf_with_pages(&PAGES);
        let (output, _) =
            highlight_pdf(&input, &keywords(&["python"]), PdfHighlightGate::PerPage).unwrap();
        let doc = Document::load_mem(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert!(doc.extract_text(&[2]).unwrap().contains("Gardening"));
    }

    #[test]
    fn test_graphics_state_registered_on_annotated_page() {
        let input = pdf_with_pages(&PAGES);
        let (output, _) =
            highlight_pdf(&input, &keywords(&["python"]), PdfHighlightGate::PerPage).unwrap();
        let doc = Document::load_mem(&output).unwrap();
        let page_id = doc.get_pages()[&1];
        let resources = match doc.get_object(page_id).unwrap().as_dict().unwrap().get(b"Resources").unwrap() {
            Object::Reference(id) => doc.get_object(*id).unwrap().as_dict().unwrap().clone(),
            other => other.as_dict().unwrap().clone(),
        };
        let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        assert!(states.has(HIGHLIGHT_STATE));
        // Fonts are still reachable after materialising the inherited resources.
        assert!(resources.has(b"Font"));
    }

    #[test]
    fn test_no_keywords_means_no_changes() {
        let input = pdf_with_pages(&PAGES);
        let (_, stats) =
            highlight_pdf(&input, &BTreeSet::new(), PdfHighlightGate::Cumulative).unwrap();
        assert_eq!(stats.highlighted_keywords, 0);
        assert_eq!(stats.pages_modified, Some(0));
        assert_eq!(stats.total_keywords, 0);
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        assert!(highlight_pdf(b"%PDF-garbage", &keywords(&["python"]), PdfHighlightGate::PerPage)
            .is_err());
    }

    #[test]
    fn test_rect_formula() {
        let rect = HighlightRect::at_offset(120, 6, 842.0);
        assert_eq!(rect.x, 840.0);
        assert_eq!(rect.y, 842.0 - 24.0);
        assert_eq!(rect.width, 42.0);
        assert_eq!(rect.height, 12.0);
    }

    #[test]
    fn test_rects_use_character_offsets_and_overlap() {
        let rects = highlight_rects("éé aaaa", &keywords(&["aaa"]), 100.0);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].x, 3.0 * CHAR_WIDTH);
        assert_eq!(rects[1].x, 4.0 * CHAR_WIDTH);
    }

    #[test]
    fn test_count_is_non_overlapping() {
        assert_eq!(count_occurrences("aaaa", &keywords(&["aa"])), 2);
        assert_eq!(count_occurrences("java javascript", &keywords(&["java", "script"])), 3);
    }
}
