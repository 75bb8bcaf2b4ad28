use crate::ast::{Block, BlockKind};

/// Collects the section rooted at the first top-level header with identifier `id`.
///
/// The section runs until the next header of the same or a higher level
/// (exclusive) or the end of `blocks`. Headers nested inside containers are
/// not candidates. `Some(vec![])` means the header exists but has no body and
/// `include_heading` is false; `None` means no such header.
pub fn find_section(blocks: &[Block], id: &str, include_heading: bool) -> Option<Vec<Block>> {
    let (start, level) = blocks.iter().enumerate().find_map(|(idx, block)| {
        let level = block.header_level()?;
        (block.identifier() == id).then_some((idx, level))
    })?;

    let body = &blocks[start + 1..];
    let end = body
        .iter()
        .position(|block| block.header_level().is_some_and(|next| next <= level))
        .unwrap_or(body.len());

    let first = if include_heading { start } else { start + 1 };
    Some(blocks[first..start + 1 + end].to_vec())
}

/// Finds the first container with identifier `id` in document order.
///
/// Traversal is depth-first pre-order: a container is visited before its
/// children, siblings left to right. Returns the container's children, or a
/// one-element sequence holding the container itself when `include_wrapper`.
pub fn find_container(blocks: &[Block], id: &str, include_wrapper: bool) -> Option<Vec<Block>> {
    let found = find_container_block(blocks, id)?;
    if include_wrapper {
        return Some(vec![found.clone()]);
    }
    match &found.kind {
        BlockKind::Container { children } => Some(children.clone()),
        _ => None,
    }
}

fn find_container_block<'a>(blocks: &'a [Block], id: &str) -> Option<&'a Block> {
    for block in blocks {
        if let BlockKind::Container { children } = &block.kind {
            if block.identifier() == id {
                return Some(block);
            }
            if let Some(found) = find_container_block(children, id) {
                return Some(found);
            }
        }
    }
    None
}
