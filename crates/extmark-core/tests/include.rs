use std::cell::RefCell;
use std::collections::HashMap;

use extmark_core::{
    Block, BlockKind, DiagnosticSeverity, Diagnostics, E_FETCH_FAILED, E_FRAGMENT_NOT_FOUND,
    FetchError, Flavour, IncludeOptions, Includer, InclusionError, ParseResult, W_INCLUDED_SOURCE,
    W_INVALID_SHIFT, W_UNSUPPORTED_FORMAT, emit_html, parse_with, plain_text,
};
use pretty_assertions::assert_eq;

const GUIDE: &str = "\
---
title: Guide
---

# Intro {#intro}

Welcome.

## Details {#details}

Fine print.

# Usage {#usage}

::: {#tip .callout}
Use it *well*.

::: {#inner}
Deep.
:::
:::
";

fn fake(files: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, FetchError> + use<> {
    let files: HashMap<String, String> = files
        .iter()
        .map(|(path, text)| (path.to_string(), text.to_string()))
        .collect();
    move |uri: &str| {
        files
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.into()))
    }
}

fn headings(blocks: &[Block]) -> Vec<(u8, String)> {
    blocks
        .iter()
        .filter_map(|block| match &block.kind {
            BlockKind::Header { level, content } => Some((*level, plain_text(content))),
            _ => None,
        })
        .collect()
}

fn codes(diagnostics: &Diagnostics) -> Vec<&'static str> {
    diagnostics.iter().map(|diag| diag.code).collect()
}

#[test]
fn section_runs_to_next_peer_header() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md#intro", None, &mut diagnostics);

    assert!(diagnostics.is_empty());
    assert_eq!(
        headings(&blocks),
        vec![(1, "Intro".to_string()), (2, "Details".to_string())]
    );
    assert_eq!(blocks.len(), 4);
}

#[test]
fn shift_applies_to_extracted_section() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md#intro", Some("1"), &mut diagnostics);
    assert_eq!(
        headings(&blocks),
        vec![(2, "Intro".to_string()), (3, "Details".to_string())]
    );
}

#[test]
fn negative_shift_demotes_top_header() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md#intro", Some("-1"), &mut diagnostics);

    assert_eq!(headings(&blocks), vec![(1, "Details".to_string())]);
    assert_eq!(emit_html(&blocks[..1]), "<p><strong>Intro</strong></p>");
}

#[test]
fn container_fallback_returns_children() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md#inner", None, &mut diagnostics);
    assert_eq!(emit_html(&blocks), "<p>Deep.</p>");

    let blocks = includer.include("guide.md#tip", None, &mut diagnostics);
    assert_eq!(
        emit_html(&blocks),
        "<p>Use it <em>well</em>.</p>\n<div id=\"inner\">\n  <p>Deep.</p>\n</div>"
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn wrapper_option_keeps_the_container() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)])).with_options(IncludeOptions {
        include_wrapper: true,
        ..IncludeOptions::default()
    });
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md#inner", None, &mut diagnostics);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].identifier(), "inner");
}

#[test]
fn unsupported_format_warns_once_without_fetching() {
    let calls = RefCell::new(Vec::new());
    let fetcher = |uri: &str| -> Result<String, FetchError> {
        calls.borrow_mut().push(uri.to_string());
        Ok("# never".to_string())
    };
    let includer = Includer::new(fetcher);
    let mut diagnostics = Diagnostics::new();

    let blocks = includer.include("notes.txt#intro", None, &mut diagnostics);

    assert!(blocks.is_empty());
    assert_eq!(codes(&diagnostics), vec![W_UNSUPPORTED_FORMAT]);
    assert_eq!(diagnostics.count(DiagnosticSeverity::Warning), 1);
    assert!(!diagnostics.has_errors());
    assert!(calls.borrow().is_empty());
}

#[test]
fn missing_fragment_is_an_error() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md#nowhere", None, &mut diagnostics);

    assert!(blocks.is_empty());
    assert_eq!(codes(&diagnostics), vec![E_FRAGMENT_NOT_FOUND]);
    assert!(diagnostics.has_errors());
    assert!(diagnostics.as_slice()[0].message.contains("nowhere"));
}

#[test]
fn fetch_failure_is_an_error() {
    let includer = Includer::new(fake(&[]));
    let mut diagnostics = Diagnostics::new();

    let err = includer
        .try_include("missing.md", None, &mut diagnostics)
        .unwrap_err();
    assert!(matches!(err, InclusionError::FetchFailed { .. }));
    assert!(diagnostics.is_empty());

    includer.include("missing.md", None, &mut diagnostics);
    assert_eq!(codes(&diagnostics), vec![E_FETCH_FAILED]);
}

#[test]
fn found_but_empty_section_is_not_an_error() {
    let source = "# A {#a}\n# B {#b}\n";
    let includer = Includer::new(fake(&[("x.md", source)])).with_options(IncludeOptions {
        include_heading: false,
        ..IncludeOptions::default()
    });
    let mut diagnostics = Diagnostics::new();
    let blocks = includer
        .try_include("x.md#a", None, &mut diagnostics)
        .expect("section exists");
    assert!(blocks.is_empty());
    assert!(diagnostics.is_empty());
}

#[test]
fn invalid_shift_warns_and_proceeds() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md#details", Some("lots"), &mut diagnostics);

    assert_eq!(headings(&blocks), vec![(2, "Details".to_string())]);
    assert_eq!(codes(&diagnostics), vec![W_INVALID_SHIFT]);
}

#[test]
fn whole_file_drops_front_matter() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md", None, &mut diagnostics);
    assert_eq!(
        headings(&blocks),
        vec![
            (1, "Intro".to_string()),
            (2, "Details".to_string()),
            (1, "Usage".to_string())
        ]
    );
    assert!(!emit_html(&blocks).contains("title: Guide"));
}

#[test]
fn whole_file_can_keep_front_matter() {
    let includer = Includer::new(fake(&[("guide.md", GUIDE)])).with_options(IncludeOptions {
        strip_front_matter: false,
        ..IncludeOptions::default()
    });
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("guide.md", None, &mut diagnostics);
    assert!(matches!(blocks[0].kind, BlockKind::Rule));

    // Fragment requests always strip it.
    let blocks = includer.include("guide.md#intro", None, &mut diagnostics);
    assert_eq!(blocks[0].identifier(), "intro");
}

#[test]
fn markdown_flavour_sees_escaped_shortcodes() {
    let seen = RefCell::new(Vec::new());
    let parser = |source: &str, flavour: Flavour| -> ParseResult {
        seen.borrow_mut().push((source.to_string(), flavour));
        parse_with(source, flavour)
    };
    let files = fake(&[
        ("a.md", "{{< kbd Ctrl >}}\n"),
        ("b.qmd", "{{< kbd Ctrl >}}\n"),
    ]);
    let includer = Includer::with_parser(files, parser);
    let mut diagnostics = Diagnostics::new();
    includer.include("a.md", None, &mut diagnostics);
    includer.include("b.qmd", None, &mut diagnostics);

    assert_eq!(
        seen.borrow().as_slice(),
        &[
            ("{{{< kbd Ctrl >}}}\n".to_string(), Flavour::Markdown),
            ("{{< kbd Ctrl >}}\n".to_string(), Flavour::Qmd),
        ]
    );
}

#[test]
fn included_parse_problems_become_warnings() {
    let includer = Includer::new(fake(&[("bad.md", "{#orphan}\n")]));
    let mut diagnostics = Diagnostics::new();
    includer.include("bad.md", None, &mut diagnostics);

    assert_eq!(codes(&diagnostics), vec![W_INCLUDED_SOURCE]);
    assert!(!diagnostics.has_errors());
    assert!(diagnostics.as_slice()[0].message.starts_with("bad.md:"));
}

#[test]
fn included_problems_report_their_own_file_position() {
    let includer = Includer::new(fake(&[("a.md", "---\na: 1\n---\n{#orphan}\n")]));
    let mut diagnostics = Diagnostics::new();
    includer.include("a.md", None, &mut diagnostics);

    assert_eq!(codes(&diagnostics), vec![W_INCLUDED_SOURCE]);
    let forwarded = &diagnostics.as_slice()[0];
    assert!(
        forwarded.message.starts_with("a.md:4:1: "),
        "unexpected message: {}",
        forwarded.message
    );
    assert_eq!(forwarded.range, None);
}

#[test]
fn included_markdown_shortcodes_render_unescaped() {
    let includer = Includer::new(fake(&[("a.md", "Press {{< kbd Ctrl >}} now.\n")]));
    let mut diagnostics = Diagnostics::new();
    let blocks = includer.include("a.md", None, &mut diagnostics);

    assert!(diagnostics.is_empty(), "{:?}", diagnostics.as_slice());
    assert_eq!(emit_html(&blocks), "<p>Press {{&lt; kbd Ctrl &gt;}} now.</p>");
}

#[test]
fn each_request_fetches_afresh() {
    let calls = RefCell::new(0);
    let fetcher = |_: &str| -> Result<String, FetchError> {
        *calls.borrow_mut() += 1;
        Ok("# A {#a}\n".to_string())
    };
    let includer = Includer::new(fetcher);
    let mut diagnostics = Diagnostics::new();
    let first = includer.include("x.md#a", None, &mut diagnostics);
    let second = includer.include("x.md#a", None, &mut diagnostics);
    assert_eq!(first, second);
    assert_eq!(*calls.borrow(), 2);
}
