//! `external` directives in a host document.
//!
//! A directive is a paragraph made of a single line:
//!
//! ```text
//! external chapters/setup.md#install shift-heading-level-by=1
//! {{< external chapters/setup.md#install shift=1 >}}
//! ```

use crate::ast::{Block, BlockKind, Document, plain_text};
use crate::diagnostic::{Diagnostics, W_DIRECTIVE_SYNTAX};
use crate::fetch::Fetcher;
use crate::include::Includer;
use crate::parser::{DocumentParser, split_attr_tokens};
use crate::span::Span;
use crate::text::strip_front_matter;
use crate::validate::Flavour;

const COMPONENT: &str = "directive";
const KEYWORD: &str = "external";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Directive {
    pub uri: String,
    pub shift: Option<String>,
    /// Option keys that were not understood.
    pub ignored: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DirectiveError {
    #[error("`external` needs a resource to include")]
    MissingUri,
    #[error("malformed option `{0}` (expected key=value)")]
    MalformedOption(String),
}

impl Directive {
    /// Recognizes a directive line.
    ///
    /// `None` means the line is ordinary text. A bare line only counts as a
    /// directive when the resource looks like a path (it has a `.` or `/`) and
    /// everything after it is `key=value`; inside a shortcode the keyword alone
    /// is enough and problems become errors.
    pub fn parse(line: &str) -> Option<Result<Directive, DirectiveError>> {
        let trimmed = line.trim();
        let (body, shortcode) = match trimmed
            .strip_prefix("{{<")
            .and_then(|rest| rest.strip_suffix(">}}"))
        {
            Some(inner) => (inner, true),
            None => (trimmed, false),
        };

        let tokens = split_attr_tokens(body);
        let (first, rest) = tokens.split_first()?;
        if *first != KEYWORD {
            return None;
        }

        let Some((uri, options)) = rest.split_first() else {
            return shortcode.then_some(Err(DirectiveError::MissingUri));
        };
        if option_pair(uri).is_some() {
            return shortcode.then_some(Err(DirectiveError::MissingUri));
        }
        if !shortcode && !uri.contains(['.', '/']) {
            return None;
        }

        let mut directive = Directive {
            uri: unquote(uri).to_string(),
            ..Directive::default()
        };
        let mut long_shift = None;
        let mut short_shift = None;
        for token in options {
            let Some((key, value)) = option_pair(token) else {
                return shortcode
                    .then(|| Err(DirectiveError::MalformedOption((*token).to_string())));
            };
            match key {
                "shift-heading-level-by" => long_shift = Some(value.to_string()),
                "shift" => short_shift = Some(value.to_string()),
                _ => directive.ignored.push(key.to_string()),
            }
        }
        directive.shift = long_shift.or(short_shift);
        Some(Ok(directive))
    }
}

fn option_pair(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    let mut chars = key.chars();
    let valid_key = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    valid_key.then(|| (key, unquote(value)))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parses `source` and splices the blocks named by each standalone directive
/// paragraph in its place.
pub fn expand_directives<F, P>(
    source: &str,
    flavour: Flavour,
    includer: &Includer<F, P>,
    diagnostics: &mut Diagnostics,
) -> Document
where
    F: Fetcher,
    P: DocumentParser,
{
    let body = strip_front_matter(source);
    let skipped_lines = source[..source.len() - body.len()].matches('\n').count();

    let parsed = includer.parser().parse(body, flavour);
    for mut diag in parsed.diagnostics {
        diag.range = diag.range.map(|range| range.below(skipped_lines));
        diagnostics.push(diag);
    }

    let blocks = expand_blocks(parsed.document.blocks, body, includer, diagnostics);
    Document {
        span: Span {
            start: 0,
            end: source.len(),
        },
        blocks,
    }
}

fn expand_blocks<F, P>(
    blocks: Vec<Block>,
    source: &str,
    includer: &Includer<F, P>,
    diagnostics: &mut Diagnostics,
) -> Vec<Block>
where
    F: Fetcher,
    P: DocumentParser,
{
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        let Block { span, attr, kind } = block;
        match kind {
            BlockKind::Paragraph { content } => {
                let raw = source
                    .get(span.start..span.end)
                    .filter(|raw| !raw.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| plain_text(&content));
                let directive = if raw.trim().contains('\n') {
                    None
                } else {
                    Directive::parse(&raw)
                };
                match directive {
                    Some(Ok(directive)) => {
                        for key in &directive.ignored {
                            diagnostics.warn(
                                COMPONENT,
                                W_DIRECTIVE_SYNTAX,
                                format!("unknown option `{key}` for {}", directive.uri),
                            );
                        }
                        out.extend(includer.include(
                            &directive.uri,
                            directive.shift.as_deref(),
                            diagnostics,
                        ));
                    }
                    Some(Err(err)) => {
                        diagnostics.warn(COMPONENT, W_DIRECTIVE_SYNTAX, err.to_string());
                        out.push(Block {
                            span,
                            attr,
                            kind: BlockKind::Paragraph { content },
                        });
                    }
                    None => out.push(Block {
                        span,
                        attr,
                        kind: BlockKind::Paragraph { content },
                    }),
                }
            }
            BlockKind::Container { children } => out.push(Block {
                span,
                attr,
                kind: BlockKind::Container {
                    children: expand_blocks(children, source, includer, diagnostics),
                },
            }),
            kind => out.push(Block { span, attr, kind }),
        }
    }
    out
}
