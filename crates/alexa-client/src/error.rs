use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AlexaError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("unexpected backend response: {0}")]
    Protocol(String),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("timed out waiting for {waiting_for} after {attempts} polls")]
    Timeout {
        waiting_for: &'static str,
        attempts: u32,
    },
    #[error("no conversation id available to poll")]
    NoConversation,
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AlexaError {
    pub(crate) fn transport(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Transport { operation, source }
    }

    pub(crate) fn decode(what: &str, err: serde_json::Error) -> Self {
        Self::Protocol(format!("failed to parse {what} response: {err}"))
    }

    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::Auth(_) | Self::Config(_) | Self::InvalidArgument(_)
        )
    }
}
