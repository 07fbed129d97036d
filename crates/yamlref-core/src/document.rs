use crate::{Position, Range};

/// An open text buffer identified by URI.
///
/// Line starts are precomputed so detectors can work line-by-line without
/// re-scanning the whole buffer per request.
#[derive(Debug, Clone)]
pub struct Document {
    uri: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Document {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            uri: uri.into(),
            text,
            line_starts,
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Line content without the trailing newline. `None` past the end.
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&str> {
        let start = *self.line_starts.get(line as usize)?;
        let end = self
            .line_starts
            .get(line as usize + 1)
            .map_or(self.text.len(), |e| *e);
        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Iterate `(line_number, content)` pairs.
    pub fn lines(&self) -> impl Iterator<Item = (u32, &str)> {
        (0..self.line_count()).filter_map(move |n| self.line(n).map(|l| (n, l)))
    }

    /// Whether `range` lies entirely within the buffer.
    #[must_use]
    pub fn contains_range(&self, range: Range) -> bool {
        let in_bounds = |p: Position| {
            self.line(p.line)
                .is_some_and(|l| p.character <= utf16_len(l))
        };
        in_bounds(range.start) && in_bounds(range.end)
    }
}

/// Length of `s` in UTF-16 code units.
#[must_use]
pub fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// UTF-16 column of the byte offset `byte` within `line`.
#[must_use]
pub fn utf16_col(line: &str, byte: usize) -> u32 {
    utf16_len(&line[..byte.min(line.len())])
}

/// Byte offset within `line` of UTF-16 column `character`, if it lands on a
/// character boundary within the line.
#[must_use]
pub fn byte_at_utf16(line: &str, character: u32) -> Option<usize> {
    let mut units = 0u32;
    for (byte, c) in line.char_indices() {
        if units == character {
            return Some(byte);
        }
        if units > character {
            return None;
        }
        units += c.len_utf16() as u32;
    }
    (units == character).then_some(line.len())
}
