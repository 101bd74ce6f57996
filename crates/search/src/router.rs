use crate::pipeline::RetrievalService;
use crate::retriever::RetrievalRequest;
use anyhow::Result;
use async_trait::async_trait;
use mark_protocol::{AnswerPayload, NumericalAnswer, QuestionKind};
use std::sync::Arc;

/// Decides which resolution path a question needs (usually an LLM call).
#[async_trait]
pub trait QuestionClassifier: Send + Sync {
    async fn classify(&self, question: &str) -> Result<QuestionKind>;
}

/// Resolves numeric questions against the relational store.
#[async_trait]
pub trait NumericResolver: Send + Sync {
    async fn resolve(&self, question: &str) -> Result<NumericalAnswer>;
}

/// Classifies a question and dispatches it to the numeric path, retrieval, or both.
pub struct QuestionRouter {
    classifier: Arc<dyn QuestionClassifier>,
    numeric: Arc<dyn NumericResolver>,
    retrieval: Arc<RetrievalService>,
}

impl QuestionRouter {
    pub fn new(
        classifier: Arc<dyn QuestionClassifier>,
        numeric: Arc<dyn NumericResolver>,
        retrieval: Arc<RetrievalService>,
    ) -> Self {
        Self {
            classifier,
            numeric,
            retrieval,
        }
    }

    /// A failed classification routes to [`QuestionKind::Text`] so retrieval is still tried.
    pub async fn classify(&self, question: &str) -> QuestionKind {
        match self.classifier.classify(question).await {
            Ok(kind) => kind,
            Err(err) => {
                log::warn!("Question classification failed, using text: {err:#}");
                QuestionKind::Text
            }
        }
    }

    /// Numeric resolver errors are returned; retrieval never fails.
    pub async fn route(&self, question: &str, request: &RetrievalRequest) -> Result<AnswerPayload> {
        let kind = self.classify(question).await;
        log::debug!("Question routed as {kind:?}");
        let payload = match kind {
            QuestionKind::Numerical => {
                AnswerPayload::Numerical(self.numeric.resolve(question).await?)
            }
            QuestionKind::Text => {
                AnswerPayload::Text(self.retrieval.answer(question, request).await)
            }
            QuestionKind::Hybrid => {
                let (numerical, text) = tokio::join!(
                    self.numeric.resolve(question),
                    self.retrieval.answer(question, request)
                );
                AnswerPayload::Hybrid {
                    numerical: numerical?,
                    text,
                }
            }
        };
        Ok(payload)
    }
}
