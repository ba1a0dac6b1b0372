use thiserror::Error;

use sbm_config::OutboundNode;

#[derive(Debug, Error)]
pub enum SubsError {
    #[error("unsupported scheme: {0}")]
    Scheme(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported content")]
    Unsupported,
}

impl SubsError {
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }
}

/// Outcome of one subscription-body parse. Malformed lines in a URI list
/// are skipped and counted, never failing the batch.
#[derive(Debug, Default)]
pub struct ParsedSubscription {
    pub nodes: Vec<OutboundNode>,
    pub skipped: usize,
}

impl ParsedSubscription {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
