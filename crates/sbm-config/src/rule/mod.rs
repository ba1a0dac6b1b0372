//! Route-rule engine: the static field catalog, the validate-then-build
//! step, the payload codec and the owning-set matcher.

pub mod builder;
pub mod fields;
pub mod matcher;
pub mod payload;

pub use builder::{build_rule, RuleEditData};
pub use fields::{field_by_key, RuleFieldDescriptor, RULE_FIELDS};
pub use matcher::{find_owning_set, find_rule_index};
pub use payload::{normalize_proxy_label, parse_payload, ParsedPayload, RuleItem};

/// Name of the conceptually always-present rule set.
pub const DEFAULT_SET: &str = "default";
