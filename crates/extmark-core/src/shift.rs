use crate::ast::{Attr, Block, BlockKind, Inline, InlineKind};

pub const MIN_LEVEL: i64 = 1;
pub const MAX_LEVEL: i64 = 6;

/// Moves every top-level header by `delta` levels.
///
/// Headers pushed above level 6 clamp to 6. Headers pushed below level 1 turn
/// into a paragraph holding the title as strong text; their attributes are
/// dropped. Container children are left as they are. A zero or absent delta
/// returns the input untouched.
pub fn shift_headers(blocks: Vec<Block>, delta: Option<i64>) -> Vec<Block> {
    match delta {
        None | Some(0) => blocks,
        Some(delta) => blocks
            .into_iter()
            .map(|block| shift_block(block, delta))
            .collect(),
    }
}

fn shift_block(block: Block, delta: i64) -> Block {
    let Block { span, attr, kind } = block;
    match kind {
        BlockKind::Header { level, content } => {
            let target = i64::from(level).saturating_add(delta);
            if target < MIN_LEVEL {
                Block {
                    span,
                    attr: Attr::default(),
                    kind: BlockKind::Paragraph {
                        content: vec![Inline {
                            span,
                            kind: InlineKind::Strong(content),
                        }],
                    },
                }
            } else {
                Block {
                    span,
                    attr,
                    kind: BlockKind::Header {
                        level: target.min(MAX_LEVEL) as u8,
                        content,
                    },
                }
            }
        }
        kind => Block { span, attr, kind },
    }
}
