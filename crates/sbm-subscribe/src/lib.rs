//! Subscription content ingestion
//! 订阅内容摄取
//!
//! Turns raw subscription bodies (fetched or pasted) into the node
//! records consumed by the config synthesizer. Per-link decoding lives
//! in [`link`], format detection and batch extraction in [`parse`].

pub mod link;
pub mod model;
pub mod parse;
pub mod parse_clash;

pub use link::{decode_link, is_supported_link};
pub use model::{ParsedSubscription, SubsError};
pub use parse::{parse, ContentKind};
