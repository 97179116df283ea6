use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an embedding provider failure, keeping its full cause chain.
    pub fn embedding(err: &anyhow::Error) -> Self {
        Self::EmbeddingFailure(format!("{err:#}"))
    }

    /// Wrap a vector index failure, keeping its full cause chain.
    pub fn index(err: &anyhow::Error) -> Self {
        Self::IndexUnavailable(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_failure_keeps_cause_chain() {
        let err = anyhow::anyhow!("connection refused").context("loading tokenizer");
        let wrapped = Error::embedding(&err);
        assert!(matches!(wrapped, Error::EmbeddingFailure(_)));
        let msg = wrapped.to_string();
        assert!(msg.contains("loading tokenizer"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn index_failure_display() {
        let wrapped = Error::index(&anyhow::anyhow!("table missing"));
        assert_eq!(wrapped.to_string(), "Vector index unavailable: table missing");
    }

    #[test]
    fn io_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "kb.jsonl");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
