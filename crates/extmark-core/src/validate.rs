//! Extension allow-list for includable resources.

/// Suffixes accepted for inclusion, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".md", ".markdown", ".qmd"];

/// Parser flavour implied by a supported file name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flavour {
    Qmd,
    Markdown,
}

pub fn is_supported(path: &str) -> bool {
    flavour_of(path).is_some()
}

/// Returns the parser flavour for a supported path, `None` otherwise.
pub fn flavour_of(path: &str) -> Option<Flavour> {
    let lowered = path.to_ascii_lowercase();
    let matched = SUPPORTED_EXTENSIONS
        .iter()
        .find(|ext| lowered.ends_with(*ext))?;
    if *matched == ".qmd" {
        Some(Flavour::Qmd)
    } else {
        Some(Flavour::Markdown)
    }
}
