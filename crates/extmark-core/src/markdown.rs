//! Renders a block tree back to Markdown with attribute lists.

use crate::ast::{Attr, Block, BlockKind, Inline, InlineKind, OtherBlock};
use crate::text::shortcode_spans;

pub fn emit_markdown(blocks: &[Block]) -> String {
    let mut out = render_blocks(blocks);
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(block: &Block) -> String {
    match &block.kind {
        BlockKind::Header { level, content } => {
            let mut line = format!(
                "{} {}",
                "#".repeat(usize::from(*level)),
                render_inlines(content)
            );
            if !block.attr.is_empty() {
                line.push(' ');
                line.push_str(&attr_list(&block.attr));
            }
            line
        }
        BlockKind::Container { children } => {
            // A bare `:::` would read as a closing fence.
            let mut out = format!("::: {}\n", attr_list(&block.attr));
            if !children.is_empty() {
                out.push_str(&render_blocks(children));
                out.push('\n');
            }
            out.push_str(":::");
            out
        }
        BlockKind::Paragraph { content } => render_inlines(content),
        BlockKind::Rule => "* * *".to_string(),
        BlockKind::Other(other) => render_other(other),
    }
}

fn render_other(other: &OtherBlock) -> String {
    match other {
        OtherBlock::CodeBlock { lang, text } => {
            let fence = "`".repeat((longest_run(text, '`') + 1).max(3));
            let mut out = format!("{fence}{}\n", lang.as_deref().unwrap_or_default());
            out.push_str(text);
            if !text.is_empty() && !text.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&fence);
            out
        }
        OtherBlock::BlockQuote { blocks } => render_blocks(blocks)
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        OtherBlock::RawHtml { raw } => raw.trim_end().to_string(),
        OtherBlock::List {
            ordered,
            start,
            items,
        } => {
            let first = start.unwrap_or(1);
            let tight = items.iter().all(|item| item.len() <= 1);
            let rendered: Vec<String> = items
                .iter()
                .zip(first..)
                .map(|(item, number)| {
                    let marker = if *ordered {
                        format!("{number}. ")
                    } else {
                        "- ".to_string()
                    };
                    let pad = " ".repeat(marker.len());
                    let body = render_blocks(item);
                    let mut out = marker;
                    for (idx, line) in body.lines().enumerate() {
                        if idx > 0 {
                            out.push('\n');
                            if !line.is_empty() {
                                out.push_str(&pad);
                            }
                        }
                        out.push_str(line);
                    }
                    out
                })
                .collect();
            rendered.join(if tight { "\n" } else { "\n\n" })
        }
    }
}

fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match &inline.kind {
            InlineKind::Text(text) => escape_text(&mut out, text),
            InlineKind::CodeSpan(text) => {
                let ticks = "`".repeat(longest_run(text, '`') + 1);
                let pad = if text.starts_with('`') || text.ends_with('`') {
                    " "
                } else {
                    ""
                };
                out.push_str(&format!("{ticks}{pad}{text}{pad}{ticks}"));
            }
            InlineKind::SoftBreak => out.push('\n'),
            InlineKind::HardBreak => out.push_str("\\\n"),
            InlineKind::Emph(children) => {
                out.push('*');
                out.push_str(&render_inlines(children));
                out.push('*');
            }
            InlineKind::Strong(children) => {
                out.push_str("**");
                out.push_str(&render_inlines(children));
                out.push_str("**");
            }
            InlineKind::Link { url, children } => {
                out.push_str(&format!("[{}]({url})", render_inlines(children)));
            }
            InlineKind::Image { url, alt } => {
                out.push_str(&format!("![{}]({url})", render_inlines(alt)));
            }
        }
    }
    out
}

/// Shortcodes pass through untouched so a shortcode-aware tool still sees them.
fn escape_text(out: &mut String, text: &str) {
    let mut last = 0;
    for span in shortcode_spans(text) {
        escape_plain(out, &text[last..span.start]);
        out.push_str(&text[span.start..span.end]);
        last = span.end;
    }
    escape_plain(out, &text[last..]);
}

fn escape_plain(out: &mut String, text: &str) {
    for ch in text.chars() {
        if matches!(ch, '\\' | '*' | '_' | '`' | '[' | ']' | '<') {
            out.push('\\');
        }
        out.push(ch);
    }
}

fn attr_list(attr: &Attr) -> String {
    let mut items = Vec::new();
    if !attr.identifier.is_empty() {
        items.push(format!("#{}", attr.identifier));
    }
    items.extend(attr.classes.iter().map(|class| format!(".{class}")));
    for (key, value) in &attr.attributes {
        if value.is_empty() || value.contains(char::is_whitespace) {
            items.push(format!("{key}=\"{value}\""));
        } else {
            items.push(format!("{key}={value}"));
        }
    }
    format!("{{{}}}", items.join(" "))
}

fn longest_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
