//! Delivered-length cursor for prefix diffing.

/// How much cumulative text has already reached the caller.
///
/// Lengths are counted in characters (Unicode scalar values), so a cursor
/// never splits a multi-byte character. The cursor only moves forward.
/// The byte offset of the cursor is kept alongside so an append-only
/// snapshot is sliced without rescanning the delivered prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamState {
    delivered: usize,
    delivered_bytes: usize,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Return the part of `full_text` the caller has not seen yet.
    ///
    /// Returns `None` when the snapshot adds nothing. A snapshot shorter than
    /// what was already delivered leaves the cursor where it is.
    pub fn advance<'a>(&mut self, full_text: &'a str) -> Option<&'a str> {
        let offset = if full_text.is_char_boundary(self.delivered_bytes) {
            self.delivered_bytes
        } else {
            // Cursor lands mid-character or past the end: locate it by count.
            match full_text.char_indices().nth(self.delivered) {
                Some((offset, _)) => offset,
                None => {
                    let len = full_text.chars().count();
                    if len < self.delivered {
                        tracing::warn!(
                            delivered = self.delivered,
                            snapshot_len = len,
                            "snapshot shorter than delivered text; nothing emitted"
                        );
                    }
                    return None;
                }
            }
        };

        let fresh = &full_text[offset..];
        if fresh.is_empty() {
            return None;
        }
        self.delivered += fresh.chars().count();
        self.delivered_bytes = full_text.len();
        Some(fresh)
    }
}
