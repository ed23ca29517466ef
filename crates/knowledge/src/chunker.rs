//! Fixed-size sliding-window chunking over characters.

use advisor_core::{AppError, AppResult};

/// A window of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// 0-based position within the source
    pub index: u32,

    /// Character offset of the first character
    pub start: usize,

    /// Character offset one past the last character
    pub end: usize,

    pub text: String,
}

/// Splits text into overlapping windows of `window` characters.
///
/// Consecutive chunks share exactly `overlap` characters. Chunk text is kept
/// verbatim so that the source can be rebuilt from the chunks.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(window: usize, overlap: usize) -> AppResult<Self> {
        if window == 0 {
            return Err(AppError::Config(
                "Chunk window must be greater than zero".to_string(),
            ));
        }
        if overlap >= window {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than the window ({})",
                overlap, window
            )));
        }
        Ok(Self { window, overlap })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Number of chunks `split` produces for a text of `len` characters.
    pub fn expected_count(&self, len: usize) -> usize {
        match len {
            0 => 0,
            l if l <= self.window => 1,
            l => {
                let step = self.window - self.overlap;
                (l - self.overlap).div_ceil(step)
            }
        }
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        // Byte offset of every character, plus the end of the string
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = offsets.len() - 1;

        if len == 0 {
            return Vec::new();
        }

        let step = self.window - self.overlap;
        let mut chunks = Vec::with_capacity(self.expected_count(len));
        let mut start = 0;

        loop {
            let end = (start + self.window).min(len);
            chunks.push(TextChunk {
                index: chunks.len() as u32,
                start,
                end,
                text: text[offsets[start]..offsets[end]].to_string(),
            });

            if end == len {
                break;
            }
            start += step;
        }

        tracing::debug!(
            "Chunked {} characters into {} chunks (window: {}, overlap: {})",
            len,
            chunks.len(),
            self.window,
            self.overlap
        );

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild the source by dropping each chunk's leading overlap.
    fn rejoin(chunks: &[TextChunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            out.extend(chunk.text.chars().skip(skip));
        }
        out
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_window() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = Chunker::new(1000, 100).unwrap();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = Chunker::new(1000, 100).unwrap();
        let chunks = chunker.split("  Early withdrawal incurs a penalty.  ");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "  Early withdrawal incurs a penalty.  ");
    }

    #[test]
    fn test_count_formula_and_rejoin() {
        let chunker = Chunker::new(1000, 100).unwrap();
        for len in [999, 1000, 1001, 1900, 1901, 2500, 10_000] {
            let text: String = (0..len)
                .map(|i| char::from(b'a' + (i % 26) as u8))
                .collect();
            let chunks = chunker.split(&text);

            assert_eq!(chunks.len(), chunker.expected_count(len), "len {}", len);
            if len > 1000 {
                let expected = (len - 100 + 899) / 900;
                assert_eq!(chunks.len(), expected, "len {}", len);
            }
            assert_eq!(rejoin(&chunks, 100), text, "len {}", len);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(10);
        let chunks = chunker.split(&text);

        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(40).collect();
            let head: String = pair[1].text.chars().take(10).collect();
            assert_eq!(tail, head);
            assert_eq!(pair[1].start, pair[0].start + 40);
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let chunker = Chunker::new(4, 1).unwrap();
        let chunks = chunker.split("préstamo€");
        assert_eq!(chunks[0].text, "prés");
        assert_eq!(chunks[1].text, "stam");
        assert_eq!(chunks[2].text, "mo€");
        assert_eq!(rejoin(&chunks, 1), "préstamo€");
    }
}
