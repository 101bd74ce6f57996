use serde::{Deserialize, Serialize};

/// Configuration for paragraph chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters (grapheme clusters). Only a single word longer than
    /// this can produce a bigger chunk.
    pub max_chars: usize,

    /// Separator placed between packed paragraphs
    pub paragraph_separator: String,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 3000,
            paragraph_separator: "\n\n".to_string(),
        }
    }
}

impl ChunkerConfig {
    /// Create config with a custom character limit
    #[must_use]
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self {
            max_chars,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chars == 0 {
            return Err("max_chars must be > 0".to_string());
        }
        if self.paragraph_separator.is_empty() {
            return Err("paragraph_separator must not be empty".to_string());
        }
        Ok(())
    }
}
