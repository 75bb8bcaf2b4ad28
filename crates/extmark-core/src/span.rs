/// Byte range into the source a node was parsed from.
///
/// Nodes built programmatically carry the empty span at offset zero.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Result<Self, SpanError> {
        if start <= end {
            Ok(Self { start, end })
        } else {
            Err(SpanError::Inverted { start, end })
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SpanError {
    #[error("inverted span {start}..{end}")]
    Inverted { start: usize, end: usize },
}

#[cfg(test)]
mod tests {
    use super::{Span, SpanError};

    #[test]
    fn inverted_span_is_rejected() {
        assert_eq!(
            Span::new(4, 2),
            Err(SpanError::Inverted { start: 4, end: 2 })
        );
        let span = Span::new(2, 5).unwrap();
        assert_eq!(span.len(), 3);
        assert!(!span.is_empty());
        assert!(Span::default().is_empty());
    }
}
