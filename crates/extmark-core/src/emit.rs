use crate::ast::{Attr, Block, BlockKind, Inline, InlineKind, OtherBlock, plain_text};
use crate::text::unescape_shortcodes;
use ammonia::Builder;
use std::collections::{HashMap, HashSet};

/// Emits raw, un-sanitized HTML from a slice of blocks.
pub fn emit_html(blocks: &[Block]) -> String {
    // Deterministic formatting: 2-space indentation and LF newlines.
    let mut writer = HtmlWriter::new();
    for block in blocks {
        emit_block(&mut writer, block);
    }
    writer.finish()
}

/// Emits HTML and cleans it against an allow-list, dropping raw HTML that an
/// included document may have carried in.
pub fn emit_html_sanitized(blocks: &[Block]) -> String {
    let raw_html = emit_html(blocks);

    let tags: HashSet<&'static str> = [
        "a",
        "blockquote",
        "br",
        "code",
        "div",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "img",
        "li",
        "ol",
        "p",
        "pre",
        "strong",
        "ul",
    ]
    .into_iter()
    .collect();

    let generic_attributes: HashSet<&'static str> = ["class", "id"].into_iter().collect();

    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", ["href", "title"].into_iter().collect());
    tag_attributes.insert("img", ["alt", "src", "title"].into_iter().collect());
    tag_attributes.insert("ol", ["start"].into_iter().collect());

    let generic_attribute_prefixes: HashSet<&'static str> = ["data-"].into_iter().collect();

    Builder::new()
        .tags(tags)
        .generic_attributes(generic_attributes)
        .tag_attributes(tag_attributes)
        .generic_attribute_prefixes(generic_attribute_prefixes)
        .clean(&raw_html)
        .to_string()
}

struct HtmlWriter {
    out: String,
    indent: usize,
}

impl HtmlWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, line: &str) {
        self.out.push_str(&"  ".repeat(self.indent));
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn nested(&mut self, open: &str, close: &str, children: &[Block]) {
        self.line(open);
        self.indent += 1;
        for child in children {
            emit_block(self, child);
        }
        self.indent -= 1;
        self.line(close);
    }

    fn finish(mut self) -> String {
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out
    }
}

fn emit_block(writer: &mut HtmlWriter, block: &Block) {
    let attrs = attr_html(&block.attr);
    match &block.kind {
        BlockKind::Header { level, content } => {
            writer.line(&format!(
                "<h{level}{attrs}>{}</h{level}>",
                render_inlines(content)
            ));
        }
        BlockKind::Container { children } => {
            writer.nested(&format!("<div{attrs}>"), "</div>", children);
        }
        BlockKind::Paragraph { content } => {
            writer.line(&format!("<p{attrs}>{}</p>", render_inlines(content)));
        }
        BlockKind::Rule => writer.line(&format!("<hr{attrs} />")),
        BlockKind::Other(other) => emit_other(writer, other),
    }
}

fn emit_other(writer: &mut HtmlWriter, other: &OtherBlock) {
    match other {
        OtherBlock::CodeBlock { lang, text } => {
            let class = lang
                .as_deref()
                .map(|lang| format!(" class=\"language-{}\"", escape_attr(lang)))
                .unwrap_or_default();
            // Code keeps its own line structure, so it bypasses indentation.
            let mut escaped = escape_html(text);
            if !escaped.is_empty() && !escaped.ends_with('\n') {
                escaped.push('\n');
            }
            writer.out.push_str(&format!("<pre><code{class}>{escaped}</code></pre>\n"));
        }
        OtherBlock::BlockQuote { blocks } => {
            writer.nested("<blockquote>", "</blockquote>", blocks);
        }
        OtherBlock::RawHtml { raw } => {
            for line in raw.lines() {
                writer.line(line);
            }
        }
        OtherBlock::List {
            ordered,
            start,
            items,
        } => {
            let tag = if *ordered { "ol" } else { "ul" };
            let start_attr = match start {
                Some(value) if *ordered && *value != 1 => format!(" start=\"{value}\""),
                _ => String::new(),
            };
            writer.line(&format!("<{tag}{start_attr}>"));
            writer.indent += 1;
            for item in items {
                match item.as_slice() {
                    [
                        Block {
                            kind: BlockKind::Paragraph { content },
                            ..
                        },
                    ] => writer.line(&format!("<li>{}</li>", render_inlines(content))),
                    blocks => writer.nested("<li>", "</li>", blocks),
                }
            }
            writer.indent -= 1;
            writer.line(&format!("</{tag}>"));
        }
    }
}

fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match &inline.kind {
            InlineKind::Text(text) => out.push_str(&escape_html(&unescape_shortcodes(text))),
            InlineKind::CodeSpan(text) => {
                out.push_str("<code>");
                out.push_str(&escape_html(text));
                out.push_str("</code>");
            }
            InlineKind::SoftBreak => out.push(' '),
            InlineKind::HardBreak => out.push_str("<br />"),
            InlineKind::Emph(children) => {
                out.push_str("<em>");
                out.push_str(&render_inlines(children));
                out.push_str("</em>");
            }
            InlineKind::Strong(children) => {
                out.push_str("<strong>");
                out.push_str(&render_inlines(children));
                out.push_str("</strong>");
            }
            InlineKind::Link { url, children } => {
                out.push_str("<a href=\"");
                out.push_str(&escape_url_attr(url));
                out.push_str("\">");
                out.push_str(&render_inlines(children));
                out.push_str("</a>");
            }
            InlineKind::Image { url, alt } => {
                out.push_str("<img src=\"");
                out.push_str(&escape_url_attr(url));
                out.push_str("\" alt=\"");
                out.push_str(&escape_attr(&plain_text(alt)));
                out.push_str("\">");
            }
        }
    }
    out
}

/// ` id=".." class=".." data-key=".."` for a non-empty attribute set.
fn attr_html(attr: &Attr) -> String {
    let mut out = String::new();
    if !attr.identifier.is_empty() {
        out.push_str(&format!(" id=\"{}\"", escape_attr(&attr.identifier)));
    }
    if !attr.classes.is_empty() {
        out.push_str(&format!(" class=\"{}\"", escape_attr(&attr.classes.join(" "))));
    }
    for (key, value) in &attr.attributes {
        out.push_str(&format!(
            " data-{}=\"{}\"",
            escape_attr(key),
            escape_attr(value)
        ));
    }
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

fn escape_url_attr(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    for &byte in url.as_bytes() {
        match byte {
            b' ' => encoded.push_str("%20"),
            b'\\' => encoded.push_str("%5C"),
            0x00..=0x1F | 0x7F..=0xFF => encoded.push_str(&format!("%{byte:02X}")),
            _ => encoded.push(byte as char),
        }
    }
    escape_attr(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Vec<Inline> {
        vec![Inline::text(value)]
    }

    #[test]
    fn header_attributes_become_html_attributes() {
        let mut attr = Attr::with_id("intro");
        attr.add_class("lead");
        attr.set("note", "a \"b\"");
        let block = Block::header(2, "", text("Intro & more")).with_attr(attr);
        assert_eq!(
            emit_html(&[block]),
            "<h2 id=\"intro\" class=\"lead\" data-note=\"a &quot;b&quot;\">Intro &amp; more</h2>"
        );
    }

    #[test]
    fn escaped_shortcodes_render_in_their_original_form() {
        let block = Block::paragraph(text("Press {{{< kbd Ctrl >}}} now."));
        assert_eq!(emit_html(&[block]), "<p>Press {{&lt; kbd Ctrl &gt;}} now.</p>");
    }

    #[test]
    fn containers_nest_with_two_space_indent() {
        let inner = Block::container("inner", vec![Block::paragraph(text("x"))]);
        let outer = Block::container("outer", vec![inner, Block::rule()]);
        assert_eq!(
            emit_html(&[outer]),
            "<div id=\"outer\">\n  <div id=\"inner\">\n    <p>x</p>\n  </div>\n  <hr />\n</div>"
        );
    }

    #[test]
    fn code_blocks_are_escaped_and_unindented() {
        let code = Block::new(BlockKind::Other(OtherBlock::CodeBlock {
            lang: Some("rust".into()),
            text: "a < b\n".into(),
        }));
        let quote = Block::new(BlockKind::Other(OtherBlock::BlockQuote {
            blocks: vec![code],
        }));
        assert_eq!(
            emit_html(&[quote]),
            "<blockquote>\n<pre><code class=\"language-rust\">a &lt; b\n</code></pre>\n</blockquote>"
        );
    }

    #[test]
    fn tight_list_items_render_inline() {
        let list = Block::new(BlockKind::Other(OtherBlock::List {
            ordered: true,
            start: Some(3),
            items: vec![
                vec![Block::paragraph(text("one"))],
                vec![Block::paragraph(text("two")), Block::rule()],
            ],
        }));
        assert_eq!(
            emit_html(&[list]),
            "<ol start=\"3\">\n  <li>one</li>\n  <li>\n    <p>two</p>\n    <hr />\n  </li>\n</ol>"
        );
    }

    #[test]
    fn sanitized_output_drops_scripts() {
        let raw = Block::new(BlockKind::Other(OtherBlock::RawHtml {
            raw: "<script>alert(1)</script>".into(),
        }));
        let html = emit_html_sanitized(&[Block::paragraph(text("ok")), raw]);
        assert!(html.contains("<p>ok</p>"));
        assert!(!html.contains("script"));
    }

    #[test]
    fn sanitized_output_keeps_data_attributes() {
        let mut attr = Attr::with_id("box");
        attr.set("kind", "note");
        let block = Block::new(BlockKind::Container {
            children: vec![Block::paragraph(text("x"))],
        })
        .with_attr(attr);
        let html = emit_html_sanitized(&[block]);
        assert!(html.contains("id=\"box\""));
        assert!(html.contains("data-kind=\"note\""));
    }

    #[test]
    fn link_urls_are_percent_encoded() {
        let link = Inline::new(InlineKind::Link {
            url: "a b.md".into(),
            children: text("go"),
        });
        assert_eq!(
            emit_html(&[Block::paragraph(vec![link])]),
            "<p><a href=\"a%20b.md\">go</a></p>"
        );
    }
}
