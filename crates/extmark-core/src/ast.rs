use crate::span::Span;

pub type InlineSeq = Vec<Inline>;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub span: Span,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub attr: Attr,
    pub kind: BlockKind,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            span: Span::default(),
            attr: Attr::default(),
            kind,
        }
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    pub fn header(level: u8, identifier: &str, content: InlineSeq) -> Self {
        Self::new(BlockKind::Header { level, content }).with_attr(Attr::with_id(identifier))
    }

    pub fn container(identifier: &str, children: Vec<Block>) -> Self {
        Self::new(BlockKind::Container { children }).with_attr(Attr::with_id(identifier))
    }

    pub fn paragraph(content: InlineSeq) -> Self {
        Self::new(BlockKind::Paragraph { content })
    }

    pub fn rule() -> Self {
        Self::new(BlockKind::Rule)
    }

    /// Level of a header block, `None` for every other kind.
    pub fn header_level(&self) -> Option<u8> {
        match self.kind {
            BlockKind::Header { level, .. } => Some(level),
            _ => None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.attr.identifier
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    Header { level: u8, content: InlineSeq },
    Container { children: Vec<Block> },
    Paragraph { content: InlineSeq },
    Rule,
    Other(OtherBlock),
}

/// Blocks the inclusion engine never looks into.
#[derive(Clone, Debug, PartialEq)]
pub enum OtherBlock {
    CodeBlock { lang: Option<String>, text: String },
    BlockQuote { blocks: Vec<Block> },
    RawHtml { raw: String },
    List {
        ordered: bool,
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attr {
    pub identifier: String,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
}

impl Attr {
    pub fn with_id(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identifier.is_empty() && self.classes.is_empty() && self.attributes.is_empty()
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.classes.iter().any(|existing| existing == class) {
            self.classes.push(class.to_string());
        }
    }

    /// Inserts or replaces a key, keeping the original position of replaced keys.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Folds `other` into `self`. Returns false when both carry an identifier.
    pub fn merge(&mut self, other: Attr) -> bool {
        let mut ok = true;
        if !other.identifier.is_empty() {
            if self.identifier.is_empty() {
                self.identifier = other.identifier;
            } else {
                ok = false;
            }
        }
        for class in &other.classes {
            self.add_class(class);
        }
        for (key, value) in &other.attributes {
            self.set(key, value);
        }
        ok
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Inline {
    pub span: Span,
    pub kind: InlineKind,
}

impl Inline {
    pub fn new(kind: InlineKind) -> Self {
        Self {
            span: Span::default(),
            kind,
        }
    }

    pub fn text(value: &str) -> Self {
        Self::new(InlineKind::Text(value.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InlineKind {
    Text(String),
    Emph(InlineSeq),
    Strong(InlineSeq),
    CodeSpan(String),
    SoftBreak,
    HardBreak,
    Link { url: String, children: InlineSeq },
    Image { url: String, alt: InlineSeq },
}

/// Concatenated plain text of an inline sequence, breaks rendered as spaces.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(&mut out, inlines);
    out
}

fn push_plain_text(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match &inline.kind {
            InlineKind::Text(text) | InlineKind::CodeSpan(text) => out.push_str(text),
            InlineKind::SoftBreak | InlineKind::HardBreak => out.push(' '),
            InlineKind::Emph(children)
            | InlineKind::Strong(children)
            | InlineKind::Link { children, .. }
            | InlineKind::Image { alt: children, .. } => push_plain_text(out, children),
        }
    }
}
