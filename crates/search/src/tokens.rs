use crate::error::{Result, SearchError};
use std::path::Path;
use tokenizers::Tokenizer;

/// Token accounting for the context budget. One strategy per deployment.
pub trait TokenCounter: Send + Sync {
    fn strategy(&self) -> &str;

    /// Fails rather than substituting another strategy.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn strategy(&self) -> &str {
        "words"
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }
}

/// Subword tokens from a Hugging Face `tokenizer.json`.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
    name: String,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            SearchError::Tokenizer(format!("Tokenizer load failed ({}): {e}", path.display()))
        })?;
        Ok(Self {
            tokenizer,
            name: format!("huggingface:{}", path.display()),
        })
    }
}

impl TokenCounter for HfTokenCounter {
    fn strategy(&self) -> &str {
        &self.name
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| SearchError::Tokenizer(format!("Encoding failed: {e}")))
    }
}
