//! Forward-only cursor over a raw log buffer.

/// Cursor over a byte buffer that can search forward for a marker sequence.
///
/// Searching never moves the cursor; callers reposition explicitly with
/// [`ByteStream::set_pos`].
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteStream<'a> {
    /// Create a stream positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor position
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor. Positions past the end are clamped to [`ByteStream::end`].
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// Total buffer length
    pub fn end(&self) -> usize {
        self.data.len()
    }

    /// Offset of the next occurrence of `marker` at or after the cursor.
    ///
    /// Returns `None` when no complete occurrence starts before the end of the
    /// buffer. An empty marker never matches.
    pub fn next_offset_of(&self, marker: &[u8]) -> Option<usize> {
        if marker.is_empty() || self.pos >= self.data.len() {
            return None;
        }

        self.data[self.pos..]
            .windows(marker.len())
            .position(|window| window == marker)
            .map(|found| self.pos + found)
    }
}
