//! Payload codec shared by the matcher and the mutator.
//!
//! A displayed rule round-trips through a `key=v1,v2` payload string.
//! The display layer may elide long value lists with a trailing `...`
//! marker; parsing keeps both the literal tokens and a secondary
//! truncation-stripped token set so lookups stay resolvable.

use serde_json::Value;
use std::collections::BTreeSet;

/// Denormalized view of a rule as the presentation layer shows it.
#[derive(Debug, Clone, Default)]
pub struct RuleItem {
    /// Display label of the rule kind (informational only).
    pub rule_type: String,
    /// `key=v1,v2` payload string, possibly display-truncated.
    pub payload: String,
    /// Outbound label as displayed (may be wrapped, e.g. `Proxy(tag)`).
    pub proxy: String,
    /// Owning set name as last known to the UI.
    pub set_name: String,
    pub is_custom: bool,
}

/// Parsed form of a payload string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayload {
    pub key: String,
    /// Literal tokens in display order (markers intact).
    pub values: Vec<String>,
    /// True when any token carried a `...` elision marker.
    pub truncated: bool,
}

impl ParsedPayload {
    /// Sorted deduplicated literal value set.
    pub fn value_set(&self) -> BTreeSet<String> {
        self.values.iter().cloned().collect()
    }

    /// Tokens with one trailing `...` marker stripped. Only meaningful
    /// when `truncated`; empty tokens vanish.
    pub fn truncated_tokens(&self) -> BTreeSet<String> {
        self.values
            .iter()
            .map(|v| v.strip_suffix("...").unwrap_or(v).to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

/// Parse `key=v1,v2` or `key=["v1", "v2"]` into key and value tokens.
/// Returns `None` when there is no `=` separator or the key is blank.
pub fn parse_payload(payload: &str) -> Option<ParsedPayload> {
    let (key, rest) = payload.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let rest = rest.trim();
    let inner = rest
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(rest);

    let mut values = Vec::new();
    for token in inner.split(',') {
        let token = token.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if token.is_empty() {
            continue;
        }
        values.push(token.to_string());
    }
    if values.is_empty() {
        return None;
    }
    let truncated = values.iter().any(|v| v.ends_with("..."));
    Some(ParsedPayload {
        key: key.to_string(),
        values,
        truncated,
    })
}

/// Normalize an outbound label for comparison: unwrap `Proxy(...)`,
/// `route(...)` and `[...]` display decorations, then case-fold the
/// built-in `direct`/`reject` targets.
pub fn normalize_proxy_label(label: &str) -> String {
    let mut s = label.trim();
    loop {
        let unwrapped = s
            .strip_prefix("Proxy(")
            .or_else(|| s.strip_prefix("proxy("))
            .or_else(|| s.strip_prefix("route("))
            .and_then(|rest| rest.strip_suffix(')'))
            .or_else(|| s.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')));
        match unwrapped {
            Some(inner) => s = inner.trim(),
            None => break,
        }
    }
    if s.eq_ignore_ascii_case("direct") {
        "direct".to_string()
    } else if s.eq_ignore_ascii_case("reject") {
        "reject".to_string()
    } else {
        s.to_string()
    }
}

/// Extract the value set a stored rule object holds under `key`, using
/// the same array/scalar/boolean normalization the builder encodes with.
/// Returns `None` when the key is absent.
pub fn rule_values(rule: &Value, key: &str) -> Option<BTreeSet<String>> {
    let v = rule.get(key)?;
    let mut out = BTreeSet::new();
    match v {
        Value::Array(items) => {
            for item in items {
                if let Some(s) = scalar_token(item) {
                    out.insert(s);
                }
            }
        }
        other => {
            if let Some(s) = scalar_token(other) {
                out.insert(s);
            }
        }
    }
    Some(out)
}

fn scalar_token(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A rule participates in matching when its action is `route` or absent.
pub fn rule_action_is_route(rule: &Value) -> bool {
    match rule.get("action") {
        None => true,
        Some(Value::String(s)) => s == "route",
        Some(_) => false,
    }
}

pub fn rule_outbound(rule: &Value) -> Option<&str> {
    rule.get("outbound").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comma_list_payload_parses() {
        let p = parse_payload("domain_suffix=a.com, b.com").unwrap();
        assert_eq!(p.key, "domain_suffix");
        assert_eq!(p.values, ["a.com", "b.com"]);
        assert!(!p.truncated);
    }

    #[test]
    fn bracketed_quoted_payload_parses() {
        let p = parse_payload(r#"domain=["a.com", 'b.com']"#).unwrap();
        assert_eq!(p.values, ["a.com", "b.com"]);
    }

    #[test]
    fn truncation_marker_is_detected_and_stripped() {
        let p = parse_payload("domain_suffix=example...,other.com").unwrap();
        assert!(p.truncated);
        let tokens = p.truncated_tokens();
        assert!(tokens.contains("example"));
        assert!(tokens.contains("other.com"));
        // literal set keeps the marker
        assert!(p.value_set().contains("example..."));
    }

    #[test]
    fn missing_separator_or_values_is_none() {
        assert!(parse_payload("no separator here").is_none());
        assert!(parse_payload("domain=").is_none());
        assert!(parse_payload("= a.com").is_none());
    }

    #[test]
    fn proxy_label_unwrapping() {
        assert_eq!(normalize_proxy_label("Proxy(hk-01)"), "hk-01");
        assert_eq!(normalize_proxy_label("route(DIRECT)"), "direct");
        assert_eq!(normalize_proxy_label("[Reject]"), "reject");
        assert_eq!(normalize_proxy_label("  my-node "), "my-node");
    }

    #[test]
    fn rule_values_normalizes_scalar_array_and_bool() {
        let scalar = json!({ "port": 443 });
        assert_eq!(rule_values(&scalar, "port").unwrap(), BTreeSet::from(["443".to_string()]));
        let arr = json!({ "domain": ["a", "b"] });
        assert_eq!(rule_values(&arr, "domain").unwrap().len(), 2);
        let b = json!({ "ip_is_private": true });
        assert_eq!(
            rule_values(&b, "ip_is_private").unwrap(),
            BTreeSet::from(["true".to_string()])
        );
        assert!(rule_values(&scalar, "domain").is_none());
    }
}
