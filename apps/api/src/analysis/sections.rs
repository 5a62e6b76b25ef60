//! Section extraction: slices a labelled block ("compétences: ...") out of free text.

use regex::Regex;

/// Returns the body of the first marker that matches, or an empty string.
///
/// Markers are tried in the given order; the first one present anywhere in the
/// text wins even when a later marker appears earlier. A marker is matched
/// case-insensitively, optionally followed by a colon, and the body runs up to
/// the next blank line or the end of the text. A marker with nothing after it
/// still wins and yields an empty body.
pub fn extract_section(text: &str, markers: &[&str]) -> String {
    for marker in markers {
        let pattern = format!(r"(?is){}\s*:?(.*?)(?:\n\n|\z)", regex::escape(marker));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!("Skipping unusable section marker {marker:?}: {e}");
                continue;
            }
        };
        if let Some(caps) = re.captures(text) {
            return caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
        }
    }
    String::new()
}
