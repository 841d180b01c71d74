/// Shared error type used across all `agentrt` crates.
///
/// Variants correspond to the error taxonomy: each is a *kind*, not a
/// wire-level type — callers match on the kind to decide whether an error
/// is fatal to the calling operation or something the turn loop can recover
/// from by feeding it back to the model.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing API key, missing template, unknown provider, unsupported
    /// scorer. Fatal to the operation that raised it; no events emitted.
    #[error("config: {0}")]
    Config(String),

    /// Network/HTTP failure from a provider. Retried per policy; on
    /// exhaustion surfaced as a Monitor error and fails the turn.
    #[error("transport: {message}")]
    Transport { message: String, retryable: bool },

    /// Malformed chunk or unparseable tool arguments. Never fatal — the
    /// engine substitutes an empty input and lets the tool reject by schema.
    #[error("protocol: {0}")]
    Protocol(String),

    /// A tool returned failure, timed out, or was unknown.
    #[error("tool: {0}")]
    Tool(String),

    /// HITL or permission-gate denial.
    #[error("middleware rejected: {0}")]
    MiddlewareReject(String),

    /// The calling context was cancelled.
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        Error::Transport {
            message: message.into(),
            retryable,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
