use crate::ast::Block;
use crate::diagnostic::{
    Diagnostic, DiagnosticSeverity, Diagnostics, E_FETCH_FAILED, E_FRAGMENT_NOT_FOUND,
    W_INCLUDED_SOURCE, W_INVALID_SHIFT, W_UNSUPPORTED_FORMAT,
};
use crate::fetch::{FetchError, Fetcher};
use crate::locate::{find_container, find_section};
use crate::parser::{DocumentParser, MarkdownParser};
use crate::shift::shift_headers;
use crate::text::{escape_shortcodes, strip_front_matter};
use crate::validate::{Flavour, flavour_of};
use std::borrow::Cow;

pub const COMPONENT: &str = "include";

#[derive(Debug, thiserror::Error)]
pub enum InclusionError {
    #[error("unsupported format: {0} (expected .md, .markdown or .qmd)")]
    UnsupportedFormat(String),
    #[error("could not fetch {uri}: {source}")]
    FetchFailed {
        uri: String,
        #[source]
        source: FetchError,
    },
    #[error("identifier `{id}` not found in {uri}")]
    FragmentNotFound { uri: String, id: String },
}

impl InclusionError {
    pub fn severity(&self) -> DiagnosticSeverity {
        match self {
            InclusionError::UnsupportedFormat(_) => DiagnosticSeverity::Warning,
            InclusionError::FetchFailed { .. } | InclusionError::FragmentNotFound { .. } => {
                DiagnosticSeverity::Error
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InclusionError::UnsupportedFormat(_) => W_UNSUPPORTED_FORMAT,
            InclusionError::FetchFailed { .. } => E_FETCH_FAILED,
            InclusionError::FragmentNotFound { .. } => E_FRAGMENT_NOT_FOUND,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.severity(), self.code(), COMPONENT, self.to_string())
    }
}

/// A resource path with an optional `#identifier` suffix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Reference<'a> {
    pub path: &'a str,
    pub identifier: Option<&'a str>,
}

impl<'a> Reference<'a> {
    /// Splits at the first `#`; everything after it is the identifier, verbatim.
    pub fn parse(uri: &'a str) -> Self {
        match uri.split_once('#') {
            Some((path, id)) => Self {
                path,
                identifier: (!id.is_empty()).then_some(id),
            },
            None => Self {
                path: uri,
                identifier: None,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IncludeOptions {
    /// Keep the matched header at the top of an extracted section.
    pub include_heading: bool,
    /// Return a matched container itself rather than only its children.
    pub include_wrapper: bool,
    /// Drop front matter on whole-file inclusion too, not only for fragments.
    pub strip_front_matter: bool,
}

impl Default for IncludeOptions {
    fn default() -> Self {
        Self {
            include_heading: true,
            include_wrapper: false,
            strip_front_matter: true,
        }
    }
}

/// Reads the shift parameter. Bad values are reported and treated as absent.
pub fn parse_shift(value: Option<&str>, diagnostics: &mut Diagnostics) -> Option<i64> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    let value = value.strip_prefix('+').unwrap_or(value);
    match value.parse::<i64>() {
        Ok(delta) => Some(delta),
        Err(_) => {
            diagnostics.warn(
                COMPONENT,
                W_INVALID_SHIFT,
                format!("shift value `{value}` is not an integer; heading levels left unchanged"),
            );
            None
        }
    }
}

/// Resolves inclusion requests against injected fetch and parse collaborators.
///
/// Holds no per-request state: every call fetches and parses afresh.
#[derive(Clone, Debug)]
pub struct Includer<F, P = MarkdownParser> {
    fetcher: F,
    parser: P,
    options: IncludeOptions,
}

impl<F: Fetcher> Includer<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_parser(fetcher, MarkdownParser)
    }
}

impl<F: Fetcher, P: DocumentParser> Includer<F, P> {
    pub fn with_parser(fetcher: F, parser: P) -> Self {
        Self {
            fetcher,
            parser,
            options: IncludeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IncludeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> IncludeOptions {
        self.options
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Includes `uri`, recording any failure and returning an empty sequence.
    pub fn include(
        &self,
        uri: &str,
        shift: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Block> {
        match self.try_include(uri, shift, diagnostics) {
            Ok(blocks) => blocks,
            Err(err) => {
                diagnostics.push(err.to_diagnostic());
                Vec::new()
            }
        }
    }

    /// Like [`Includer::include`] but hands the failure back to the caller.
    ///
    /// Invalid shift values never fail the request; they are recorded in
    /// `diagnostics` and shifting is skipped.
    pub fn try_include(
        &self,
        uri: &str,
        shift: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Block>, InclusionError> {
        let reference = Reference::parse(uri);
        let delta = parse_shift(shift, diagnostics);

        let flavour = flavour_of(reference.path)
            .ok_or_else(|| InclusionError::UnsupportedFormat(reference.path.to_string()))?;

        let raw = self
            .fetcher
            .fetch(reference.path)
            .map_err(|source| InclusionError::FetchFailed {
                uri: reference.path.to_string(),
                source,
            })?;

        let text = if reference.identifier.is_some() || self.options.strip_front_matter {
            strip_front_matter(&raw)
        } else {
            raw.as_str()
        };
        let skipped_lines = raw[..raw.len() - text.len()].matches('\n').count();
        let text = match flavour {
            Flavour::Qmd => Cow::Borrowed(text),
            Flavour::Markdown => escape_shortcodes(text),
        };

        // Positions belong to the included file, so they go into the message
        // and the range stays empty.
        let parsed = self.parser.parse(&text, flavour);
        for diag in parsed.diagnostics {
            let location = match diag.range.map(|range| range.below(skipped_lines)) {
                Some(range) => format!(
                    "{}:{}:{}",
                    reference.path,
                    range.start.line + 1,
                    range.start.character + 1
                ),
                None => reference.path.to_string(),
            };
            diagnostics.push(Diagnostic::new(
                DiagnosticSeverity::Warning,
                W_INCLUDED_SOURCE,
                COMPONENT,
                format!("{location}: {} {}", diag.code, diag.message),
            ));
        }
        let blocks = parsed.document.blocks;

        let blocks = match reference.identifier {
            None => blocks,
            Some(id) => find_section(&blocks, id, self.options.include_heading)
                .or_else(|| find_container(&blocks, id, self.options.include_wrapper))
                .ok_or_else(|| InclusionError::FragmentNotFound {
                    uri: reference.path.to_string(),
                    id: id.to_string(),
                })?,
        };
        log::debug!(
            "included {} block(s) from {}",
            blocks.len(),
            reference.path
        );
        Ok(shift_headers(blocks, delta))
    }
}
