use crate::error::IngestError;
use crate::models::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::Configuration(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::Configuration(format!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }

    /// Distance in chars between consecutive chunk starts.
    pub fn step(&self) -> usize {
        self.max_chars - self.overlap_chars
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `text` into overlapping windows of at most `max_chars` chars.
///
/// Window `k` starts `k * (max_chars - overlap_chars)` chars into the text. Iteration stops
/// once the rest of the text is whitespace only, so blank input yields no chunks. The
/// returned iterator is lazy and can be cloned to replay the same sequence.
pub fn chunk_text<'a>(text: &'a str, config: &ChunkingConfig) -> Result<Chunks<'a>, IngestError> {
    config.validate()?;
    Ok(Chunks {
        text,
        max_chars: config.max_chars,
        step: config.step(),
        byte_cursor: 0,
        char_cursor: 0,
        next_index: 0,
    })
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    max_chars: usize,
    step: usize,
    byte_cursor: usize,
    char_cursor: usize,
    next_index: usize,
}

impl<'a> Chunks<'a> {
    /// Byte offset `chars` characters after `from`, clamped to the end of the text.
    fn advance(&self, from: usize, chars: usize) -> usize {
        self.text[from..]
            .char_indices()
            .nth(chars)
            .map(|(offset, _)| from + offset)
            .unwrap_or(self.text.len())
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let rest = &self.text[self.byte_cursor..];
        if rest.trim().is_empty() {
            self.byte_cursor = self.text.len();
            return None;
        }

        let end_byte = self.advance(self.byte_cursor, self.max_chars);
        let segment = &self.text[self.byte_cursor..end_byte];
        let start_offset = self.char_cursor;
        let chunk = Chunk {
            text: segment.to_string(),
            start_offset,
            end_offset: start_offset + segment.chars().count(),
            chunk_index: self.next_index,
        };

        self.byte_cursor = self.advance(self.byte_cursor, self.step);
        self.char_cursor += self.step;
        self.next_index += 1;

        Some(chunk)
    }
}
