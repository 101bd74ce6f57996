use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use unicode_segmentation::UnicodeSegmentation;

/// Packs paragraphs of cleaned filing text into chunks of bounded size.
pub struct ParagraphChunker {
    config: ChunkerConfig,
    separator_len: usize,
}

impl ParagraphChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        let separator_len = char_len(&config.paragraph_separator);
        Ok(Self {
            config,
            separator_len,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into chunks. Blank input yields no chunks.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let normalized = text.replace("\r\n", "\n");
        let max_chars = self.config.max_chars;

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for raw in normalized.split("\n\n") {
            let para = raw.trim();
            if para.is_empty() {
                continue;
            }
            let para_len = char_len(para);

            if para_len > max_chars {
                flush(&mut chunks, &mut current, &mut current_len);
                chunks.extend(wrap_words(para, max_chars));
                continue;
            }

            if current.is_empty() {
                current.push_str(para);
                current_len = para_len;
            } else if current_len + self.separator_len + para_len > max_chars {
                flush(&mut chunks, &mut current, &mut current_len);
                current.push_str(para);
                current_len = para_len;
            } else {
                current.push_str(&self.config.paragraph_separator);
                current.push_str(para);
                current_len += self.separator_len + para_len;
            }
        }
        flush(&mut chunks, &mut current, &mut current_len);

        chunks
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
    *current_len = 0;
}

/// Greedy word wrap that never breaks a word.
fn wrap_words(para: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0usize;

    for word in para.split_whitespace() {
        let word_len = char_len(word);
        if line.is_empty() {
            line.push_str(word);
            line_len = word_len;
        } else if line_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            line_len = word_len;
        } else {
            line.push(' ');
            line.push_str(word);
            line_len += 1 + word_len;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn char_len(text: &str) -> usize {
    text.graphemes(true).count()
}
