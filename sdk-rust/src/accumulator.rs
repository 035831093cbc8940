use crate::ChatChunk;

/// Reassembles a streamed chat completion into its full text.
///
/// Chunks are appended strictly in the order they are added, so the final
/// text does not depend on where the provider chose to split the content.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    buffer: String,
    chunk_count: usize,
}

impl StreamAccumulator {
    /// Creates a new `StreamAccumulator`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the chunk's content (if any) and returns the running text.
    pub fn add_chunk(&mut self, chunk: &ChatChunk) -> &str {
        if let Some(delta) = &chunk.delta {
            self.buffer.push_str(delta);
        }
        self.chunk_count += 1;
        &self.buffer
    }

    /// The text accumulated so far
    #[must_use]
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Number of chunks seen, including chunks without content
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Checks if any content has been accumulated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.buffer
    }
}
