use crate::ast::{Attr, Block, BlockKind, Document, Inline, InlineKind, InlineSeq, OtherBlock};
use crate::diagnostic::{Diagnostic, DiagnosticSeverity, E_ATTR_SYNTAX, E_TARGET_ORPHAN};
use crate::source_map::SourceMap;
use crate::span::Span;
use crate::validate::Flavour;

const COMPONENT: &str = "parser";

pub struct ParseResult {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
    pub source_map: SourceMap,
}

/// Turns raw text into a block tree.
pub trait DocumentParser {
    fn parse(&self, source: &str, flavour: Flavour) -> ParseResult;
}

/// The built-in parser for `.md`, `.markdown` and `.qmd` sources.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownParser;

impl DocumentParser for MarkdownParser {
    fn parse(&self, source: &str, flavour: Flavour) -> ParseResult {
        parse_with(source, flavour)
    }
}

impl<F> DocumentParser for F
where
    F: Fn(&str, Flavour) -> ParseResult,
{
    fn parse(&self, source: &str, flavour: Flavour) -> ParseResult {
        self(source, flavour)
    }
}

pub fn parse(source: &str) -> ParseResult {
    parse_with(source, Flavour::Markdown)
}

pub fn parse_with(source: &str, flavour: Flavour) -> ParseResult {
    let mut parser = Parser::new(source, flavour);
    let lines = split_lines(source);
    let blocks = parser.parse_blocks(&lines);
    ParseResult {
        document: Document {
            span: Span {
                start: 0,
                end: source.len(),
            },
            blocks,
        },
        diagnostics: parser.diagnostics,
        source_map: parser.source_map,
    }
}

struct Parser {
    flavour: Flavour,
    diagnostics: Vec<Diagnostic>,
    source_map: SourceMap,
}

/// One physical line, possibly with a container prefix already removed.
#[derive(Clone, Debug)]
struct Line {
    text: String,
    /// Source offset of `text[0]`.
    start: usize,
}

impl Line {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }

    fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end(),
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Drops `count` leading bytes, keeping offsets aligned with the source.
    fn skip(&self, count: usize) -> Line {
        let count = count.min(self.text.len());
        Line {
            text: self.text[count..].to_string(),
            start: self.start + count,
        }
    }
}

struct ListMarker {
    ordered: bool,
    start: Option<u64>,
    /// Bullet character or ordered delimiter.
    symbol: u8,
    content_offset: usize,
    content_indent: usize,
    empty: bool,
}

impl Parser {
    fn new(source: &str, flavour: Flavour) -> Self {
        Self {
            flavour,
            diagnostics: Vec::new(),
            source_map: SourceMap::new(source),
        }
    }

    fn parse_blocks(&mut self, lines: &[Line]) -> Vec<Block> {
        let mut blocks = Vec::new();
        // Target-line attributes only attach within the current container.
        let mut pending: Option<(Attr, Span)> = None;
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            if line.is_blank() {
                i += 1;
                continue;
            }

            if is_target_line(&line.text) {
                let attr = self.parse_attr_list(&line.text, line.start);
                if let Some((_, span)) = pending.replace((attr, line.span())) {
                    self.push_diag(
                        span,
                        E_TARGET_ORPHAN,
                        "attribute list has no following block",
                    );
                }
                i += 1;
                continue;
            }

            let (mut block, next) = self.parse_block(lines, i);
            if let Some((attr, span)) = pending.take() {
                self.attach_attr(&mut block, attr, span);
            }
            blocks.push(block);
            i = next;
        }

        if let Some((_, span)) = pending {
            self.push_diag(
                span,
                E_TARGET_ORPHAN,
                "attribute list has no following block",
            );
        }
        blocks
    }

    fn parse_block(&mut self, lines: &[Line], i: usize) -> (Block, usize) {
        if let Some(found) = self.parse_fenced_code(lines, i) {
            return found;
        }
        if let Some(found) = self.parse_container(lines, i) {
            return found;
        }
        if let Some(found) = self.parse_indented_code(lines, i) {
            return found;
        }
        if let Some(found) = self.parse_html(lines, i) {
            return found;
        }
        if let Some(found) = self.parse_rule(lines, i) {
            return found;
        }
        if let Some(found) = self.parse_block_quote(lines, i) {
            return found;
        }
        if let Some(found) = self.parse_list(lines, i) {
            return found;
        }
        if let Some(found) = self.parse_heading(lines, i) {
            return found;
        }
        self.parse_paragraph(lines, i)
    }

    fn attach_attr(&mut self, block: &mut Block, attr: Attr, span: Span) {
        match block.kind {
            BlockKind::Header { .. } | BlockKind::Container { .. } => {
                if !block.attr.merge(attr) {
                    self.push_diag(span, E_ATTR_SYNTAX, "duplicate identifier");
                }
            }
            _ => self.push_diag(
                span,
                E_TARGET_ORPHAN,
                "attribute list must precede a header or container",
            ),
        }
    }

    fn parse_heading(&mut self, lines: &[Line], i: usize) -> Option<(Block, usize)> {
        let line = &lines[i];
        let (level, content_start, content_end) = parse_atx_heading(&line.text)?;
        let (content, attr) = self.heading_content(
            &line.text[content_start..content_end],
            line.start + content_start,
        );
        Some((
            Block {
                span: line.span(),
                attr,
                kind: BlockKind::Header { level, content },
            },
            i + 1,
        ))
    }

    /// Splits a trailing `{...}` attribute list off a heading title.
    fn heading_content(&mut self, text: &str, offset: usize) -> (InlineSeq, Attr) {
        let mut title_end = text.len();
        let mut attr = Attr::default();
        if text.ends_with('}')
            && let Some(open) = text.rfind('{')
            && !text[..open].ends_with('{')
            && looks_like_attr_list(&text[open + 1..text.len() - 1])
        {
            attr = self.parse_attr_list(&text[open..], offset + open);
            title_end = text[..open].trim_end().len();
        }
        let title = &text[..title_end];
        let offsets: Vec<usize> = (0..=title.len()).map(|idx| offset + idx).collect();
        (self.parse_inlines(title, &offsets), attr)
    }

    fn parse_paragraph(&mut self, lines: &[Line], start: usize) -> (Block, usize) {
        let mut i = start;
        let mut content: Vec<&Line> = Vec::new();
        let mut setext = None;

        while i < lines.len() {
            let line = &lines[i];
            if line.is_blank() || (!content.is_empty() && self.interrupts_paragraph(line)) {
                break;
            }
            content.push(line);
            if let Some(next) = lines.get(i + 1)
                && let Some(level) = setext_underline_level(&next.text)
            {
                setext = Some((level, i + 1));
                break;
            }
            i += 1;
        }

        let first = content[0].start;
        if let Some((level, underline)) = setext {
            let text_lines: Vec<Line> = content.iter().map(|line| (*line).clone()).collect();
            let (buffer, offsets) = build_inline_buffer(&text_lines);
            let (content, attr) = self.setext_content(&buffer, &offsets);
            let block = Block {
                span: Span {
                    start: first,
                    end: lines[underline].end(),
                },
                attr,
                kind: BlockKind::Header { level, content },
            };
            return (block, underline + 1);
        }

        let text_lines: Vec<Line> = content.iter().map(|line| (*line).clone()).collect();
        let (buffer, offsets) = build_inline_buffer(&text_lines);
        let inlines = self.parse_inlines(&buffer, &offsets);
        let end = text_lines.last().map(Line::end).unwrap_or(first);
        (
            Block {
                span: Span { start: first, end },
                attr: Attr::default(),
                kind: BlockKind::Paragraph { content: inlines },
            },
            i,
        )
    }

    fn setext_content(&mut self, buffer: &str, offsets: &[usize]) -> (InlineSeq, Attr) {
        // Only a single-line title can carry a trailing attribute list.
        if !buffer.contains('\n') {
            return self.heading_content(buffer, offsets[0]);
        }
        (self.parse_inlines(buffer, offsets), Attr::default())
    }

    fn interrupts_paragraph(&self, line: &Line) -> bool {
        let text = line.text.as_str();
        if let Some(marker) = parse_list_marker(text) {
            return !marker.empty && (!marker.ordered || marker.start == Some(1));
        }
        parse_atx_heading(text).is_some()
            || parse_fence_open(text).is_some()
            || container_open(text).is_some()
            || is_thematic_break_line(text)
            || blockquote_content(text).is_some()
            || is_html_block_start(text)
            || is_target_line(text)
    }

    fn parse_rule(&self, lines: &[Line], i: usize) -> Option<(Block, usize)> {
        let line = &lines[i];
        if !is_thematic_break_line(&line.text) {
            return None;
        }
        let mut block = Block::rule();
        block.span = line.span();
        Some((block, i + 1))
    }

    fn parse_fenced_code(&self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        let line = &lines[start];
        let (indent, fence_len, fence_char, info) = parse_fence_open(&line.text)?;
        let mut code = Vec::new();
        let mut i = start + 1;
        while i < lines.len() {
            let candidate = &lines[i];
            i += 1;
            if is_fence_close(&candidate.text, fence_len, fence_char) {
                break;
            }
            code.push(strip_indent(&candidate.text, indent));
        }
        let lang = fence_language(&info);
        let end = lines[i - 1].end();
        let mut block = Block::new(BlockKind::Other(OtherBlock::CodeBlock {
            lang,
            text: code.join("\n"),
        }));
        block.span = Span {
            start: line.start,
            end,
        };
        Some((block, i))
    }

    fn parse_indented_code(&self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        if indent_width(&lines[start].text) < 4 {
            return None;
        }
        let mut code = Vec::new();
        let mut i = start;
        let mut last = start;
        while i < lines.len() {
            let line = &lines[i];
            if line.is_blank() {
                code.push(String::new());
            } else if indent_width(&line.text) >= 4 {
                code.push(strip_indent(&line.text, 4));
                last = i;
            } else {
                break;
            }
            i += 1;
        }
        code.truncate(last - start + 1);
        let mut block = Block::new(BlockKind::Other(OtherBlock::CodeBlock {
            lang: None,
            text: code.join("\n"),
        }));
        block.span = Span {
            start: lines[start].start,
            end: lines[last].end(),
        };
        Some((block, last + 1))
    }

    fn parse_html(&self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        if !is_html_block_start(&lines[start].text) {
            return None;
        }
        let mut raw = Vec::new();
        let mut i = start;
        while i < lines.len() && !lines[i].is_blank() {
            raw.push(lines[i].text.as_str());
            i += 1;
        }
        let mut block = Block::new(BlockKind::Other(OtherBlock::RawHtml {
            raw: raw.join("\n"),
        }));
        block.span = Span {
            start: lines[start].start,
            end: lines[i - 1].end(),
        };
        Some((block, i))
    }

    fn parse_container(&mut self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        let line = &lines[start];
        let (spec_start, spec_end) = container_open(&line.text)?;
        let attr = self.container_attr(&line.text[spec_start..spec_end], line.start + spec_start);

        let mut inner = Vec::new();
        let mut depth = 1usize;
        let mut i = start + 1;
        while i < lines.len() {
            let candidate = &lines[i];
            if let Some((_, fence_len, fence_char, _)) = parse_fence_open(&candidate.text) {
                // Colons inside code are content.
                inner.push(candidate.clone());
                i += 1;
                while i < lines.len() {
                    let code_line = &lines[i];
                    inner.push(code_line.clone());
                    i += 1;
                    if is_fence_close(&code_line.text, fence_len, fence_char) {
                        break;
                    }
                }
                continue;
            }
            if container_open(&candidate.text).is_some() {
                depth += 1;
            } else if is_container_close(&candidate.text) {
                depth -= 1;
                if depth == 0 {
                    i += 1;
                    break;
                }
            }
            inner.push(candidate.clone());
            i += 1;
        }

        let children = self.parse_blocks(&inner);
        let block = Block {
            span: Span {
                start: line.start,
                end: lines[i - 1].end(),
            },
            attr,
            kind: BlockKind::Container { children },
        };
        Some((block, i))
    }

    /// `::: {#id .class}` or `::: name`, where a bare name becomes a class.
    fn container_attr(&mut self, spec: &str, offset: usize) -> Attr {
        if spec.starts_with('{') {
            return self.parse_attr_list(spec, offset);
        }
        let (name, rest) = match spec.find(char::is_whitespace) {
            Some(idx) => (&spec[..idx], spec[idx..].trim_start()),
            None => (spec, ""),
        };
        let mut attr = Attr::default();
        attr.add_class(name);
        if rest.starts_with('{') {
            let rest_offset = offset + (spec.len() - rest.len());
            let extra = self.parse_attr_list(rest, rest_offset);
            attr.merge(extra);
        }
        attr
    }

    fn parse_block_quote(&mut self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        blockquote_content(&lines[start].text)?;
        let mut inner = Vec::new();
        let mut i = start;
        while i < lines.len() {
            let Some(skip) = blockquote_content(&lines[i].text) else {
                break;
            };
            inner.push(lines[i].skip(skip));
            i += 1;
        }
        let blocks = self.parse_blocks(&inner);
        let mut block = Block::new(BlockKind::Other(OtherBlock::BlockQuote { blocks }));
        block.span = Span {
            start: lines[start].start,
            end: lines[i - 1].end(),
        };
        Some((block, i))
    }

    fn parse_list(&mut self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        let first = parse_list_marker(&lines[start].text)?;
        let mut items = Vec::new();
        let mut i = start;
        let mut end = lines[start].end();

        while i < lines.len() {
            let Some(marker) = parse_list_marker(&lines[i].text) else {
                break;
            };
            if marker.ordered != first.ordered || marker.symbol != first.symbol {
                break;
            }
            let mut item_lines = vec![lines[i].skip(marker.content_offset)];
            end = lines[i].end();
            i += 1;
            while i < lines.len() {
                let line = &lines[i];
                if line.is_blank() {
                    let next = next_non_blank(lines, i);
                    match next {
                        Some(j) if indent_width(&lines[j].text) >= marker.content_indent => {
                            for blank in &lines[i..j] {
                                item_lines.push(blank.skip(blank.text.len()));
                            }
                            i = j;
                            continue;
                        }
                        _ => break,
                    }
                }
                if indent_width(&line.text) >= marker.content_indent {
                    item_lines.push(line.skip(indent_bytes(&line.text, marker.content_indent)));
                } else if parse_list_marker(&line.text).is_none()
                    && !self.interrupts_paragraph(line)
                    && item_lines.last().is_some_and(|prev| !prev.is_blank())
                {
                    // Lazy paragraph continuation.
                    let lead = line.text.len() - line.text.trim_start().len();
                    item_lines.push(line.skip(lead));
                } else {
                    break;
                }
                end = line.end();
                i += 1;
            }
            items.push(self.parse_blocks(&item_lines));

            match next_non_blank(lines, i) {
                Some(j) if j > i => {
                    let continues = parse_list_marker(&lines[j].text).is_some_and(|next| {
                        next.ordered == first.ordered && next.symbol == first.symbol
                    });
                    if !continues {
                        break;
                    }
                    i = j;
                }
                _ => {}
            }
        }

        let mut block = Block::new(BlockKind::Other(OtherBlock::List {
            ordered: first.ordered,
            start: first.start,
            items,
        }));
        block.span = Span {
            start: lines[start].start,
            end,
        };
        Some((block, i))
    }

    /// Parses `{#id .class key=value key="quoted value" -}`.
    fn parse_attr_list(&mut self, text: &str, offset: usize) -> Attr {
        let mut attr = Attr::default();
        let trimmed = text.trim();
        let span = Span {
            start: offset,
            end: offset + text.len(),
        };
        let Some(inner) = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        else {
            self.push_diag(span, E_ATTR_SYNTAX, "invalid attribute list");
            return attr;
        };

        for token in split_attr_tokens(inner) {
            if let Some(id) = token.strip_prefix('#') {
                if id.is_empty() {
                    self.push_diag(span, E_ATTR_SYNTAX, "empty identifier");
                } else if !attr.identifier.is_empty() {
                    self.push_diag(span, E_ATTR_SYNTAX, "duplicate identifier");
                } else {
                    attr.identifier = id.to_string();
                }
                continue;
            }
            if let Some(class) = token.strip_prefix('.') {
                if class.is_empty() {
                    self.push_diag(span, E_ATTR_SYNTAX, "empty class name");
                } else {
                    attr.add_class(class);
                }
                continue;
            }
            if token == "-" {
                attr.add_class("unnumbered");
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    let value = value
                        .strip_prefix('"')
                        .and_then(|rest| rest.strip_suffix('"'))
                        .unwrap_or(value);
                    attr.set(key, value);
                }
                _ => self.push_diag(
                    span,
                    E_ATTR_SYNTAX,
                    format!("invalid attribute item `{token}`"),
                ),
            }
        }
        attr
    }

    fn parse_inlines(&self, buffer: &str, offsets: &[usize]) -> InlineSeq {
        InlineParser {
            text: buffer,
            offsets,
            flavour: self.flavour,
        }
        .parse_range(0, buffer.len())
    }

    fn push_diag(&mut self, span: Span, code: &'static str, message: impl Into<String>) {
        let range = self.source_map.range(span);
        self.diagnostics.push(
            Diagnostic::new(DiagnosticSeverity::Error, code, COMPONENT, message).with_range(range),
        );
    }
}

struct InlineParser<'a> {
    text: &'a str,
    /// Source offset for every byte of `text`, plus one past the end.
    offsets: &'a [usize],
    flavour: Flavour,
}

impl InlineParser<'_> {
    fn span(&self, start: usize, end: usize) -> Span {
        Span {
            start: self.offsets[start],
            end: self.offsets[end],
        }
    }

    fn node(&self, start: usize, end: usize, kind: InlineKind) -> Inline {
        Inline {
            span: self.span(start, end),
            kind,
        }
    }

    fn parse_range(&self, start: usize, end: usize) -> InlineSeq {
        let bytes = self.text.as_bytes();
        let mut out = Vec::new();
        let mut pending = String::new();
        let mut pending_start = start;
        let mut i = start;

        while i < end {
            let special = match bytes[i] {
                b'\\' if i + 1 < end && bytes[i + 1] == b'\n' => {
                    Some((i + 2, self.node(i, i + 2, InlineKind::HardBreak)))
                }
                b'\\' if i + 1 < end && bytes[i + 1].is_ascii_punctuation() => {
                    if pending.is_empty() {
                        pending_start = i;
                    }
                    pending.push(bytes[i + 1] as char);
                    i += 2;
                    continue;
                }
                b'\n' => {
                    let trailing = pending.len() - pending.trim_end_matches(' ').len();
                    pending.truncate(pending.len() - trailing);
                    let kind = if trailing >= 2 {
                        InlineKind::HardBreak
                    } else {
                        InlineKind::SoftBreak
                    };
                    Some((i + 1, self.node(i, i + 1, kind)))
                }
                b'`' => self.code_span(i, end),
                b'*' | b'_' => self.emphasis(i, end),
                b'!' if i + 1 < end && bytes[i + 1] == b'[' => self.link(i + 1, end, true),
                b'[' => self.link(i, end, false),
                b'<' => self.autolink(i, end),
                b'{' if self.flavour == Flavour::Qmd => self.shortcode(i, end),
                _ => None,
            };

            match special {
                Some((next, node)) => {
                    flush_text(&mut out, &mut pending, self.span(pending_start, i));
                    push_inline(&mut out, node);
                    i = next;
                    pending_start = i;
                }
                None => {
                    let Some(ch) = self.text[i..end].chars().next() else {
                        break;
                    };
                    if pending.is_empty() {
                        pending_start = i;
                    }
                    if matches!(bytes[i], b'*' | b'_') {
                        // An unmatched delimiter run stays literal as a whole.
                        let run = run_length(bytes, i, end, bytes[i]);
                        pending.push_str(&self.text[i..i + run]);
                        i += run;
                        continue;
                    }
                    pending.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
        flush_text(&mut out, &mut pending, self.span(pending_start, end));
        out
    }

    fn code_span(&self, start: usize, end: usize) -> Option<(usize, Inline)> {
        let bytes = self.text.as_bytes();
        let run = run_length(bytes, start, end, b'`');
        let mut j = start + run;
        while j < end {
            if bytes[j] == b'`' {
                let close = run_length(bytes, j, end, b'`');
                if close == run {
                    let raw = self.text[start + run..j].replace('\n', " ");
                    let code = if raw.len() >= 2
                        && raw.starts_with(' ')
                        && raw.ends_with(' ')
                        && !raw.trim().is_empty()
                    {
                        raw[1..raw.len() - 1].to_string()
                    } else {
                        raw
                    };
                    let next = j + close;
                    return Some((next, self.node(start, next, InlineKind::CodeSpan(code))));
                }
                j += close;
                continue;
            }
            j += 1;
        }
        None
    }

    fn emphasis(&self, start: usize, end: usize) -> Option<(usize, Inline)> {
        let bytes = self.text.as_bytes();
        let ch = bytes[start];
        let run = run_length(bytes, start, end, ch);
        let width = if run >= 2 { 2 } else { 1 };
        let open_end = start + width;
        if open_end >= end || bytes[open_end].is_ascii_whitespace() {
            return None;
        }
        if ch == b'_' && start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
            return None;
        }

        let mut j = open_end;
        while j < end {
            match bytes[j] {
                b'\\' => {
                    j += 2;
                    continue;
                }
                b'`' => {
                    j = match self.code_span(j, end) {
                        Some((next, _)) => next,
                        None => j + run_length(bytes, j, end, b'`'),
                    };
                    continue;
                }
                b if b == ch => {
                    let close = run_length(bytes, j, end, ch);
                    let closes = j > open_end && !bytes[j - 1].is_ascii_whitespace();
                    let at = match close {
                        n if n == width => Some(j),
                        3 if width == 2 => Some(j + 1),
                        _ => None,
                    };
                    if closes
                        && let Some(at) = at
                        && (ch != b'_'
                            || at + width >= end
                            || !bytes[at + width].is_ascii_alphanumeric())
                    {
                        let children = self.parse_range(open_end, at);
                        let kind = if width == 2 {
                            InlineKind::Strong(children)
                        } else {
                            InlineKind::Emph(children)
                        };
                        let next = at + width;
                        return Some((next, self.node(start, next, kind)));
                    }
                    j += close;
                    continue;
                }
                _ => {}
            }
            j += 1;
        }
        None
    }

    /// `[text](url)`, or `![alt](src)` when `image` is set; `start` is the `[`.
    fn link(&self, start: usize, end: usize, image: bool) -> Option<(usize, Inline)> {
        let bytes = self.text.as_bytes();
        let close = matching_bracket(bytes, start, end, b'[', b']')?;
        if close + 1 >= end || bytes[close + 1] != b'(' {
            return None;
        }
        let paren_close = matching_bracket(bytes, close + 1, end, b'(', b')')?;
        let destination = self.text[close + 2..paren_close].trim();
        let url = destination
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_string();
        let children = self.parse_range(start + 1, close);
        let node_start = if image { start - 1 } else { start };
        let next = paren_close + 1;
        let kind = if image {
            InlineKind::Image { url, alt: children }
        } else {
            InlineKind::Link { url, children }
        };
        Some((next, self.node(node_start, next, kind)))
    }

    fn autolink(&self, start: usize, end: usize) -> Option<(usize, Inline)> {
        let rest = &self.text[start + 1..end];
        let close = rest.find('>')?;
        let url = &rest[..close];
        let (scheme, _) = url.split_once("://")?;
        if scheme.is_empty()
            || !scheme.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'+')
            || url.contains(char::is_whitespace)
        {
            return None;
        }
        let next = start + 1 + close + 1;
        let text = self.node(start + 1, start + 1 + close, InlineKind::Text(url.to_string()));
        Some((
            next,
            self.node(
                start,
                next,
                InlineKind::Link {
                    url: url.to_string(),
                    children: vec![text],
                },
            ),
        ))
    }

    /// Keeps `{{< ... >}}` verbatim so markup inside it is not interpreted.
    fn shortcode(&self, start: usize, end: usize) -> Option<(usize, Inline)> {
        let rest = &self.text[start..end];
        if !rest.starts_with("{{<") {
            return None;
        }
        let close = rest.find(">}}")? + 3;
        let next = start + close;
        Some((
            next,
            self.node(start, next, InlineKind::Text(rest[..close].to_string())),
        ))
    }
}

fn flush_text(out: &mut InlineSeq, pending: &mut String, span: Span) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    push_inline(
        out,
        Inline {
            span,
            kind: InlineKind::Text(text),
        },
    );
}

/// Appends `node`, merging it into a directly preceding text node.
fn push_inline(out: &mut InlineSeq, node: Inline) {
    if let InlineKind::Text(text) = &node.kind
        && let Some(Inline {
            span: prev_span,
            kind: InlineKind::Text(prev),
        }) = out.last_mut()
        && prev_span.end == node.span.start
    {
        prev.push_str(text);
        prev_span.end = node.span.end;
        return;
    }
    out.push(node);
}

fn split_lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            let text = source[start..idx].strip_suffix('\r').unwrap_or(&source[start..idx]);
            lines.push(Line {
                text: text.to_string(),
                start,
            });
            start = idx + 1;
        }
    }
    if start < source.len() {
        lines.push(Line {
            text: source[start..].to_string(),
            start,
        });
    }
    lines
}

/// Joins paragraph lines with `\n` after removing their indentation.
fn build_inline_buffer(lines: &[Line]) -> (String, Vec<usize>) {
    let mut buffer = String::new();
    let mut offsets = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            buffer.push('\n');
            offsets.push(lines[idx - 1].end());
        }
        let trimmed = line.text.trim_start();
        let lead = line.text.len() - trimmed.len();
        for k in 0..trimmed.len() {
            offsets.push(line.start + lead + k);
        }
        buffer.push_str(trimmed);
    }
    offsets.push(lines.last().map(Line::end).unwrap_or(0));
    (buffer, offsets)
}

/// Splits attribute-list content on whitespace outside double quotes.
pub(crate) fn split_attr_tokens(inner: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut in_quotes = false;
    let mut token_start = None;
    for (idx, ch) in inner.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
        }
        if ch.is_whitespace() && !in_quotes {
            if let Some(start) = token_start.take() {
                tokens.push(&inner[start..idx]);
            }
        } else if token_start.is_none() {
            token_start = Some(idx);
        }
    }
    if let Some(start) = token_start {
        tokens.push(&inner[start..]);
    }
    tokens
}

/// Whether trailing `{...}` heading text is meant as attributes rather than prose.
fn looks_like_attr_list(inner: &str) -> bool {
    let tokens = split_attr_tokens(inner);
    !tokens.is_empty()
        && tokens.iter().all(|token| {
            token.starts_with('#')
                || token.starts_with('.')
                || *token == "-"
                || token.split_once('=').is_some_and(|(key, _)| !key.is_empty())
        })
}

fn is_target_line(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() >= 2
        && trimmed.starts_with('{')
        && trimmed.ends_with('}')
        && !trimmed.starts_with("{{")
}

fn indent_width(text: &str) -> usize {
    let mut width = 0;
    for byte in text.bytes() {
        match byte {
            b' ' => width += 1,
            b'\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

/// Byte length of the leading whitespace that covers `columns` columns.
fn indent_bytes(text: &str, columns: usize) -> usize {
    let mut width = 0;
    for (idx, byte) in text.bytes().enumerate() {
        if width >= columns {
            return idx;
        }
        match byte {
            b' ' => width += 1,
            b'\t' => width += 4 - width % 4,
            _ => return idx,
        }
    }
    text.len()
}

fn strip_indent(text: &str, columns: usize) -> String {
    text[indent_bytes(text, columns)..].to_string()
}

fn next_non_blank(lines: &[Line], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&idx| !lines[idx].is_blank())
}

fn run_length(bytes: &[u8], start: usize, end: usize, needle: u8) -> usize {
    bytes[start..end]
        .iter()
        .take_while(|&&byte| byte == needle)
        .count()
}

fn matching_bracket(bytes: &[u8], start: usize, end: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut j = start;
    while j < end {
        match bytes[j] {
            b'\\' => {
                j += 2;
                continue;
            }
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            b'\n' if open == b'(' => return None,
            _ => {}
        }
        j += 1;
    }
    None
}

fn parse_atx_heading(text: &str) -> Option<(u8, usize, usize)> {
    if indent_width(text) > 3 {
        return None;
    }
    let indent = text.len() - text.trim_start().len();
    let bytes = &text.as_bytes()[indent..];
    let level = bytes.iter().take_while(|&&byte| byte == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    if level < bytes.len() && !is_space_or_tab(bytes[level]) {
        return None;
    }
    let mut content_start = level;
    while content_start < bytes.len() && is_space_or_tab(bytes[content_start]) {
        content_start += 1;
    }
    let mut content_end = bytes.len();
    while content_end > content_start && is_space_or_tab(bytes[content_end - 1]) {
        content_end -= 1;
    }
    // Optional closing sequence of `#`s preceded by a space.
    let mut hashes = content_end;
    while hashes > content_start && bytes[hashes - 1] == b'#' {
        hashes -= 1;
    }
    if hashes < content_end && (hashes == content_start || is_space_or_tab(bytes[hashes - 1])) {
        content_end = hashes;
        while content_end > content_start && is_space_or_tab(bytes[content_end - 1]) {
            content_end -= 1;
        }
    }
    Some((level as u8, indent + content_start, indent + content_end))
}

fn setext_underline_level(text: &str) -> Option<u8> {
    if indent_width(text) > 3 {
        return None;
    }
    let trimmed = text.trim();
    let first = *trimmed.as_bytes().first()?;
    if (first != b'=' && first != b'-') || !trimmed.bytes().all(|byte| byte == first) {
        return None;
    }
    Some(if first == b'=' { 1 } else { 2 })
}

fn is_thematic_break_line(text: &str) -> bool {
    if indent_width(text) > 3 {
        return false;
    }
    let mut marker = None;
    let mut count = 0;
    for byte in text.bytes() {
        if is_space_or_tab(byte) {
            continue;
        }
        match marker {
            None if matches!(byte, b'-' | b'*' | b'_') => marker = Some(byte),
            Some(existing) if existing == byte => {}
            _ => return false,
        }
        count += 1;
    }
    count >= 3
}

fn parse_fence_open(text: &str) -> Option<(usize, usize, u8, String)> {
    let indent = indent_width(text);
    if indent > 3 {
        return None;
    }
    let trimmed = text.trim_start();
    let fence_char = *trimmed.as_bytes().first()?;
    if fence_char != b'`' && fence_char != b'~' {
        return None;
    }
    let fence_len = run_length(trimmed.as_bytes(), 0, trimmed.len(), fence_char);
    if fence_len < 3 {
        return None;
    }
    let info = trimmed[fence_len..].trim();
    if fence_char == b'`' && info.contains('`') {
        return None;
    }
    Some((indent, fence_len, fence_char, info.to_string()))
}

fn is_fence_close(text: &str, fence_len: usize, fence_char: u8) -> bool {
    if indent_width(text) > 3 {
        return false;
    }
    let trimmed = text.trim();
    trimmed.len() >= fence_len && trimmed.bytes().all(|byte| byte == fence_char)
}

/// ```` ```rust ````, ```` ```{r} ```` and ```` ```{.python} ```` all name a language.
fn fence_language(info: &str) -> Option<String> {
    let word = info.split_whitespace().next()?;
    let word = word
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim_start_matches('.');
    let word = word.split([',', ' ']).next().unwrap_or(word);
    if word.is_empty() {
        None
    } else {
        Some(word.to_string())
    }
}

/// Returns the byte range of the container spec (`{...}` or a name).
fn container_open(text: &str) -> Option<(usize, usize)> {
    let colons = run_length(text.as_bytes(), 0, text.len(), b':');
    if colons < 3 {
        return None;
    }
    let rest = text[colons..].trim_end().trim_end_matches(':').trim_end();
    let spec = rest.trim_start();
    if spec.is_empty() {
        return None;
    }
    let start = colons + (rest.len() - spec.len());
    Some((start, start + spec.len()))
}

fn is_container_close(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.len() >= 3 && trimmed.bytes().all(|byte| byte == b':')
}

/// Number of prefix bytes (`>` plus one optional space) on a block-quote line.
fn blockquote_content(text: &str) -> Option<usize> {
    if indent_width(text) > 3 {
        return None;
    }
    let indent = text.len() - text.trim_start().len();
    let rest = text[indent..].strip_prefix('>')?;
    let space = usize::from(rest.starts_with(' '));
    Some(indent + 1 + space)
}

fn is_html_block_start(text: &str) -> bool {
    if indent_width(text) > 3 {
        return false;
    }
    let Some(rest) = text.trim_start().strip_prefix('<') else {
        return false;
    };
    if rest.starts_with("!--") || rest.starts_with('!') {
        return true;
    }
    let name = rest.strip_prefix('/').unwrap_or(rest);
    let len = name
        .bytes()
        .take_while(|byte| byte.is_ascii_alphanumeric() || *byte == b'-')
        .count();
    if len == 0 || !name.as_bytes()[0].is_ascii_alphabetic() {
        return false;
    }
    matches!(
        name.as_bytes().get(len),
        None | Some(b' ') | Some(b'\t') | Some(b'>') | Some(b'/')
    )
}

fn parse_list_marker(text: &str) -> Option<ListMarker> {
    let indent = indent_width(text);
    if indent > 3 {
        return None;
    }
    let lead = text.len() - text.trim_start().len();
    let bytes = &text.as_bytes()[lead..];
    let first = *bytes.first()?;
    let (ordered, start, symbol, marker_len) = if matches!(first, b'-' | b'+' | b'*') {
        (false, None, first, 1)
    } else {
        let digits = bytes.iter().take_while(|byte| byte.is_ascii_digit()).count();
        if digits == 0 || digits > 9 {
            return None;
        }
        let delimiter = *bytes.get(digits)?;
        if delimiter != b'.' && delimiter != b')' {
            return None;
        }
        let number = std::str::from_utf8(&bytes[..digits]).ok()?.parse().ok()?;
        (true, Some(number), delimiter, digits + 1)
    };

    let after = &bytes[marker_len..];
    if after.is_empty() {
        return Some(ListMarker {
            ordered,
            start,
            symbol,
            content_offset: lead + marker_len,
            content_indent: indent + marker_len + 1,
            empty: true,
        });
    }
    let spaces = after.iter().take_while(|&&byte| byte == b' ').count();
    if spaces == 0 {
        return None;
    }
    // Five or more spaces mean indented code inside the item.
    let spaces = if spaces > 4 { 1 } else { spaces };
    let empty = after[spaces.min(after.len())..].iter().all(|b| is_space_or_tab(*b));
    Some(ListMarker {
        ordered,
        start,
        symbol,
        content_offset: lead + marker_len + spaces,
        content_indent: indent + marker_len + spaces,
        empty,
    })
}

fn is_space_or_tab(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}
