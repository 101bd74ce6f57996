use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ContextResponse;

/// Which resolution path a question needs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Numerical,
    Text,
    Hybrid,
}

impl QuestionKind {
    /// Lenient label parsing for classifier output (`"Numerical"`, `" text "`, ...).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "numerical" => Some(Self::Numerical),
            "text" => Some(Self::Text),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// A single value looked up in the relational store by the external numeric path.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct NumericalAnswer {
    pub result: serde_json::Value,
    pub company: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub period: Option<String>,
    pub function_used: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(tag = "type", content = "result", rename_all = "snake_case")]
pub enum AnswerPayload {
    Numerical(NumericalAnswer),
    Text(ContextResponse),
    Hybrid {
        numerical: NumericalAnswer,
        text: ContextResponse,
    },
}

impl AnswerPayload {
    #[must_use]
    pub const fn kind(&self) -> QuestionKind {
        match self {
            Self::Numerical(_) => QuestionKind::Numerical,
            Self::Text(_) => QuestionKind::Text,
            Self::Hybrid { .. } => QuestionKind::Hybrid,
        }
    }

    #[must_use]
    pub fn context(&self) -> Option<&ContextResponse> {
        match self {
            Self::Text(text) | Self::Hybrid { text, .. } => Some(text),
            Self::Numerical(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(QuestionKind::from_label(" Hybrid\n"), Some(QuestionKind::Hybrid));
        assert_eq!(QuestionKind::from_label("TEXT"), Some(QuestionKind::Text));
        assert_eq!(QuestionKind::from_label("sql"), None);
    }

    #[test]
    fn payload_is_tagged_by_type() {
        let payload = AnswerPayload::Text(ContextResponse::empty());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["result"]["confidence"], "insufficient");
        assert_eq!(payload.kind(), QuestionKind::Text);

        let back: AnswerPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
