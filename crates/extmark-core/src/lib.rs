mod ast;
mod diagnostic;
mod directive;
mod emit;
mod fetch;
mod include;
mod locate;
mod markdown;
mod parser;
mod shift;
mod source_map;
mod span;
mod text;
mod validate;

pub use ast::{
    Attr, Block, BlockKind, Document, Inline, InlineKind, InlineSeq, OtherBlock, plain_text,
};
pub use diagnostic::{
    Diagnostic, DiagnosticSeverity, Diagnostics, E_ATTR_SYNTAX, E_FETCH_FAILED,
    E_FRAGMENT_NOT_FOUND, E_TARGET_ORPHAN, W_DIRECTIVE_SYNTAX, W_INCLUDED_SOURCE,
    W_INVALID_SHIFT, W_UNSUPPORTED_FORMAT,
};
pub use directive::{Directive, DirectiveError, expand_directives};
pub use emit::{emit_html, emit_html_sanitized};
#[cfg(feature = "remote")]
pub use fetch::HttpFetcher;
pub use fetch::{DefaultFetcher, FetchError, FileFetcher, Fetcher, is_remote};
pub use include::{IncludeOptions, Includer, InclusionError, Reference, parse_shift};
pub use locate::{find_container, find_section};
pub use markdown::emit_markdown;
pub use parser::{DocumentParser, MarkdownParser, ParseResult, parse, parse_with};
pub use shift::{MAX_LEVEL, MIN_LEVEL, shift_headers};
pub use source_map::{Position, Range, SourceMap};
pub use span::{Span, SpanError};
pub use text::{escape_shortcodes, strip_front_matter, unescape_shortcodes};
pub use validate::{Flavour, SUPPORTED_EXTENSIONS, flavour_of, is_supported};
