use std::fs;

use extmark_core::{
    Diagnostics, FetchError, FileFetcher, Flavour, Includer, W_DIRECTIVE_SYNTAX,
    W_UNSUPPORTED_FORMAT, emit_html, emit_markdown, expand_directives,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn chapter(uri: &str) -> Result<String, FetchError> {
    match uri {
        "chapter.md" => Ok("# Setup {#setup}\n\nInstall it.\n\n# Other\n\nLater.\n".to_string()),
        _ => Err(FetchError::NotFound(uri.into())),
    }
}

#[test]
fn standalone_directive_is_replaced() {
    let host = "# Book\n\nexternal chapter.md#setup shift=1\n\nThe end.\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Markdown, &includer, &mut diagnostics);

    assert!(diagnostics.is_empty(), "{:?}", diagnostics.as_slice());
    assert_eq!(
        emit_html(&document.blocks),
        "<h1>Book</h1>\n<h2 id=\"setup\">Setup</h2>\n<p>Install it.</p>\n<p>The end.</p>"
    );
}

#[test]
fn directives_inside_containers_expand() {
    let host = "::: {#wrap}\n{{< external chapter.md#setup >}}\n:::\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Qmd, &includer, &mut diagnostics);

    assert_eq!(
        emit_html(&document.blocks),
        "<div id=\"wrap\">\n  <h1 id=\"setup\">Setup</h1>\n  <p>Install it.</p>\n</div>"
    );
}

#[test]
fn directive_inside_running_text_is_left_alone() {
    let host = "Intro line\nexternal chapter.md\nmore text\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Markdown, &includer, &mut diagnostics);

    assert_eq!(document.blocks.len(), 1);
    assert!(diagnostics.is_empty());
}

#[test]
fn prose_starting_with_the_keyword_is_kept() {
    let host = "Intro.\n\nexternal factors\n\nEnd.\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Markdown, &includer, &mut diagnostics);

    assert!(diagnostics.is_empty(), "{:?}", diagnostics.as_slice());
    assert_eq!(
        emit_html(&document.blocks),
        "<p>Intro.</p>\n<p>external factors</p>\n<p>End.</p>"
    );
}

#[test]
fn unknown_options_warn_but_include() {
    let host = "external chapter.md#setup color=blue\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Markdown, &includer, &mut diagnostics);

    assert_eq!(document.blocks.len(), 2);
    let codes: Vec<_> = diagnostics.iter().map(|diag| diag.code).collect();
    assert_eq!(codes, vec![W_DIRECTIVE_SYNTAX]);
}

#[test]
fn malformed_shortcode_stays_as_text() {
    let host = "{{< external >}}\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Qmd, &includer, &mut diagnostics);

    assert_eq!(document.blocks.len(), 1);
    let codes: Vec<_> = diagnostics.iter().map(|diag| diag.code).collect();
    assert_eq!(codes, vec![W_DIRECTIVE_SYNTAX]);
}

#[test]
fn failed_include_removes_the_directive() {
    let host = "Before.\n\nexternal notes.txt\n\nAfter.\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Markdown, &includer, &mut diagnostics);

    assert_eq!(emit_html(&document.blocks), "<p>Before.</p>\n<p>After.</p>");
    let codes: Vec<_> = diagnostics.iter().map(|diag| diag.code).collect();
    assert_eq!(codes, vec![W_UNSUPPORTED_FORMAT]);
}

#[test]
fn host_front_matter_is_dropped_and_ranges_account_for_it() {
    let host = "---\ntitle: Host\n---\n{#orphan}\n";
    let includer = Includer::new(chapter);
    let mut diagnostics = Diagnostics::new();
    let document = expand_directives(host, Flavour::Markdown, &includer, &mut diagnostics);

    assert!(document.blocks.is_empty());
    let range = diagnostics.as_slice()[0].range.expect("parser diagnostics carry ranges");
    assert_eq!(range.start.line, 3);
}

#[test]
fn files_resolve_relative_to_base_dir() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("parts")).unwrap();
    fs::write(
        dir.path().join("parts/intro.qmd"),
        "## Hello {#hello}\n\nWorld.\n",
    )
    .unwrap();

    let includer = Includer::new(FileFetcher::new(dir.path()));
    let mut diagnostics = Diagnostics::new();
    let host = "external parts/intro.qmd shift-heading-level-by=-1\n";
    let document = expand_directives(host, Flavour::Markdown, &includer, &mut diagnostics);

    assert!(diagnostics.is_empty());
    assert_eq!(emit_markdown(&document.blocks), "# Hello {#hello}\n\nWorld.\n");
}
