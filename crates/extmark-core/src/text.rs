//! Raw-text passes applied before an included document is parsed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::ops::Range;

static SHORTCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{<[^\n]*?>\}\}").expect("shortcode pattern"));

static ESCAPED_SHORTCODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(\{\{<[^\n]*?>\}\})\}").expect("escaped shortcode pattern")
});

static ANY_SHORTCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\{?<[^\n]*?>\}\}\}?").expect("shortcode span pattern"));

/// Drops a leading `---` delimited metadata block.
///
/// The opening delimiter must be the first line (a UTF-8 BOM is skipped). If no
/// closing `---` line follows, the text is returned unchanged.
pub fn strip_front_matter(text: &str) -> &str {
    let body = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut lines = body.split_inclusive('\n');
    match lines.next() {
        Some(first) if is_delimiter(first) => {}
        _ => return text,
    }
    let mut offset = body.len() - lines.clone().map(str::len).sum::<usize>();
    for line in lines {
        offset += line.len();
        if is_delimiter(line) {
            return &body[offset..];
        }
    }
    text
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Wraps every `{{< ... >}}` shortcode in an extra brace pair so a generic
/// Markdown parser keeps it as literal text.
pub fn escape_shortcodes(text: &str) -> Cow<'_, str> {
    SHORTCODE.replace_all(text, "{$0}")
}

/// Reverses [`escape_shortcodes`] on rendered text.
pub fn unescape_shortcodes(text: &str) -> Cow<'_, str> {
    ESCAPED_SHORTCODE.replace_all(text, "$1")
}

/// Byte ranges of shortcodes in either form, escaped or not.
pub(crate) fn shortcode_spans(text: &str) -> impl Iterator<Item = Range<usize>> + '_ {
    ANY_SHORTCODE.find_iter(text).map(|found| found.range())
}
