use clap::ValueEnum;
use mark_indexer::EmbedFailurePolicy;
use mark_vector_store::EmbeddingMode;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum EmbedMode {
    Remote,
    Stub,
}

impl EmbedMode {
    pub(crate) const fn as_domain(self) -> EmbeddingMode {
        match self {
            EmbedMode::Remote => EmbeddingMode::Remote,
            EmbedMode::Stub => EmbeddingMode::Stub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum EmbedFailureFlag {
    Abort,
    Skip,
}

impl EmbedFailureFlag {
    pub(crate) const fn as_domain(self) -> EmbedFailurePolicy {
        match self {
            EmbedFailureFlag::Abort => EmbedFailurePolicy::Abort,
            EmbedFailureFlag::Skip => EmbedFailurePolicy::Skip,
        }
    }
}
