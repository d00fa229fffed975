//! Incremental line/column tracking over a source string.

use std::sync::Arc;

use weft_core::Position;

/// Tracks how far into the source the reader has advanced and converts
/// byte offsets into 1-based line / 0-based column positions.
pub(crate) struct SourceCursor {
    filename: Option<Arc<str>>,
    line: u32,
    column: u32,
    consumed: usize,
}

impl SourceCursor {
    pub(crate) fn new(filename: Option<&str>) -> Self {
        SourceCursor {
            filename: filename.map(Arc::from),
            line: 1,
            column: 0,
            consumed: 0,
        }
    }

    pub(crate) fn filename(&self) -> Option<Arc<str>> {
        self.filename.clone()
    }

    /// Advances to `offset` within `source` and returns the position there.
    pub(crate) fn position_at(&mut self, source: &str, offset: usize) -> Position {
        let offset = offset.min(source.len());
        if offset > self.consumed {
            for ch in source[self.consumed..offset].chars() {
                if ch == '\n' {
                    self.line += 1;
                    self.column = 0;
                } else {
                    self.column += 1;
                }
            }
            self.consumed = offset;
        }
        Position::new(self.filename.clone(), self.line, self.column)
    }
}
