//! Configuration-document synthesis and rule-set reconciliation
//! 配置文档合成与规则集对账
//!
//! This crate is the document engine behind a sing-box front-end: it
//! turns normalized outbound nodes into a live configuration document,
//! and keeps the user's named rule sets coherent with the `route.rules`
//! array of that document while the document is also mutated out-of-band
//! (manual edits, kernel restarts).
//!
//! Key pieces:
//! - [`outbound`]: the tagged node model encoded into `outbounds`;
//! - [`synth`]: outbound-list rewrite plus the settings overlay;
//! - [`rule`]: field catalog, rule builder, payload codec, owning-set
//!   matcher;
//! - [`ruleset`]: the shared rule-set document store;
//! - [`mutator`]: transactional add/update/remove against both documents.
//!
//! The two documents overlap on the rule list but share no IDs; all
//! reconciliation is structural (deep JSON equality or the matcher's
//! truncation-tolerant comparison).

pub mod error;
pub mod fsio;
pub mod mutator;
pub mod outbound;
pub mod overlay;
pub mod rule;
pub mod ruleset;
pub mod subscription;
pub mod synth;

pub use error::ConfigError;
pub use mutator::{canonical_insert_index, RuleMutator};
pub use outbound::{OutboundNode, Transport};
pub use overlay::OverlaySettings;
pub use rule::{
    build_rule, field_by_key, find_owning_set, normalize_proxy_label, parse_payload,
    RuleEditData, RuleFieldDescriptor, RuleItem, DEFAULT_SET, RULE_FIELDS,
};
pub use ruleset::{RuleSet, RuleSetDocument, RuleSetStore};
pub use subscription::{
    new_subscription_id, SubscriptionInfo, SubscriptionOrigin, SubscriptionStore, UsageCounters,
};
pub use synth::{passthrough, skeleton, synthesize};
