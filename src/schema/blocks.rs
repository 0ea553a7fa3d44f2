//! Rich-text blocks

use super::{Block, Field, FieldType};

/// Slug of the plain text block
pub const TEXT_BLOCK: &str = "text-block";

/// A block holding a single required line of text
pub fn text_block() -> Block {
    Block::new(
        TEXT_BLOCK,
        vec![Field::new("text", FieldType::Text).label("Text").required()],
    )
}
