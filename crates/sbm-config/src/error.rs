use thiserror::Error;

/// Error taxonomy for document and rule operations.
///
/// `Parse` and `Invalid` are always recoverable (the caller surfaces the
/// message verbatim); `NotFound`/`RuleNotFound`/`Io` are terminal for the
/// single operation that raised them. No partial write ever precedes an
/// error return.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
    #[error("rule not found")]
    RuleNotFound,
    #[error("set not found: {0}")]
    SetNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
