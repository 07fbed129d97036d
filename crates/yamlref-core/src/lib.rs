mod document;
mod reference;

pub use document::{byte_at_utf16, utf16_col, utf16_len, Document};
pub use reference::{
    CompletionItem, ConfigKind, Existence, Location, ManifestKind, Reference, ReferenceKind,
    ResolvedReference,
};

use serde::{Deserialize, Serialize};

/// Zero-based (line, character) position. Characters are UTF-16 code units,
/// matching the protocol convention of the editors this feeds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open-or-inclusive text span; `start <= end` lexicographically.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Span on a single line from `start_character` to `end_character`.
    #[must_use]
    pub fn on_line(line: u32, start_character: u32, end_character: u32) -> Self {
        Self::new(
            Position::new(line, start_character),
            Position::new(line, end_character),
        )
    }

    /// Boundary-inclusive hit test used by detectors: a cursor sitting on
    /// either edge of the span still counts as "at" the reference.
    #[must_use]
    pub fn contains_inclusive(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }
}
