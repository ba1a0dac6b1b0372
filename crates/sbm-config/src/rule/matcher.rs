//! Rule Matcher / Lookup.
//!
//! The live configuration document and the rule-set document share no
//! IDs, so associating a displayed rule with its owning set is purely
//! structural. Pass 1 requires outbound equality; pass 2 retries without
//! it, because the displayed outbound label and the stored tag can
//! disagree in formatting. Truncated queries fall back from exact value
//! set equality to a superset containment test over the stripped tokens.

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use crate::rule::payload::{
    normalize_proxy_label, parse_payload, rule_action_is_route, rule_outbound, rule_values,
    RuleItem,
};
use crate::ruleset::RuleSetDocument;

struct Query {
    key: String,
    exact: BTreeSet<String>,
    truncated: Option<BTreeSet<String>>,
    outbound: String,
}

fn build_query(item: &RuleItem) -> Option<Query> {
    let parsed = parse_payload(&item.payload)?;
    let truncated = if parsed.truncated {
        let tokens = parsed.truncated_tokens();
        if tokens.is_empty() {
            None
        } else {
            Some(tokens)
        }
    } else {
        None
    };
    Some(Query {
        exact: parsed.value_set(),
        key: parsed.key,
        truncated,
        outbound: normalize_proxy_label(&item.proxy),
    })
}

fn rule_matches(rule: &Value, query: &Query, require_outbound: bool) -> bool {
    if !rule_action_is_route(rule) {
        return false;
    }
    let Some(values) = rule_values(rule, &query.key) else {
        return false;
    };
    if require_outbound {
        match rule_outbound(rule) {
            Some(tag) if normalize_proxy_label(tag) == query.outbound => {}
            _ => return false,
        }
    }
    if values == query.exact {
        return true;
    }
    // Truncation is lossy, so containment replaces equality. Tokens are
    // matched as exact members, never as substrings.
    match &query.truncated {
        Some(tokens) => tokens.iter().all(|t| values.contains(t)),
        None => false,
    }
}

/// Find which named set owns the rule the item describes. `None` means
/// the caller should treat the rule as belonging to the implicit
/// built-in `"default"` set.
pub fn find_owning_set(doc: &RuleSetDocument, item: &RuleItem) -> Option<String> {
    let query = build_query(item)?;
    for require_outbound in [true, false] {
        for set in &doc.sets {
            for rule in &set.rules {
                if rule_matches(rule, &query, require_outbound) {
                    debug!(set = %set.name, key = %query.key, pass = if require_outbound { 1 } else { 2 }, "rule matched");
                    return Some(set.name.clone());
                }
            }
        }
    }
    None
}

/// Exact structural lookup inside a flat rule list (the active config
/// document's `route.rules`): same parse logic as the set matcher but
/// with no truncation tolerance and outbound equality always required.
pub fn find_rule_index(rules: &[Value], item: &RuleItem) -> Option<usize> {
    let parsed = parse_payload(&item.payload)?;
    let query = Query {
        exact: parsed.value_set(),
        key: parsed.key,
        truncated: None,
        outbound: normalize_proxy_label(&item.proxy),
    };
    rules
        .iter()
        .position(|rule| rule_matches(rule, &query, true))
}
