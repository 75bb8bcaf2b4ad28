use crate::span::Span;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// The same range in a text that had `lines` lines removed from its top.
    pub fn below(self, lines: usize) -> Range {
        Range {
            start: Position {
                line: self.start.line + lines,
                ..self.start
            },
            end: Position {
                line: self.end.line + lines,
                ..self.end
            },
        }
    }
}

/// Line index used to turn parser spans into editor-style positions.
#[derive(Clone, Debug)]
pub struct SourceMap {
    len: usize,
    line_offsets: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let line_offsets = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            len: source.len(),
            line_offsets,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = self
            .line_offsets
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        Position {
            line,
            character: offset - self.line_offsets[line],
        }
    }

    pub fn range(&self, span: Span) -> Range {
        Range {
            start: self.position(span.start),
            end: self.position(span.end),
        }
    }
}
