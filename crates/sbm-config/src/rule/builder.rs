//! Rule Builder: validate a rule-edit request, then emit the canonical
//! route-rule fragment. Pure; nothing is written here.

use serde_json::{Map, Number, Value};

use crate::error::ConfigError;
use crate::rule::fields::field_by_key;
use crate::rule::DEFAULT_SET;

/// A structured rule-edit request coming from the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct RuleEditData {
    /// Match key from the field catalog (e.g. `domain_suffix`).
    pub key: String,
    /// Ordered match values; trimmed and deduplicated during build.
    pub values: Vec<String>,
    /// Target outbound tag.
    pub outbound: String,
    /// Target rule-set name; blank means `"default"`.
    pub target_set: String,
}

impl RuleEditData {
    pub fn target_set(&self) -> &str {
        let name = self.target_set.trim();
        if name.is_empty() {
            DEFAULT_SET
        } else {
            name
        }
    }
}

/// Build the canonical `RouteRuleObject`:
/// `{ <key>: <value|array>, "action": "route", "outbound": <tag> }`.
///
/// Encoding invariants:
/// - `ip_is_private` encodes as a single boolean, never an array;
/// - numeric keys encode a singleton as a scalar, several values as an
///   array of numbers;
/// - every other key follows the same singleton-vs-array rule with
///   string values.
///
/// Validation order: key → values → key-specific checks → outbound.
/// Any failure returns a human-readable reason and builds nothing.
pub fn build_rule(edit: &RuleEditData) -> Result<Value, ConfigError> {
    let key = edit.key.trim();
    if key.is_empty() {
        return Err(ConfigError::invalid("match key must not be empty"));
    }

    let mut values: Vec<String> = Vec::new();
    for raw in &edit.values {
        let v = raw.trim();
        if v.is_empty() {
            continue;
        }
        if !values.iter().any(|seen| seen == v) {
            values.push(v.to_string());
        }
    }
    if values.is_empty() {
        return Err(ConfigError::invalid("at least one match value is required"));
    }

    let numeric = field_by_key(key).map(|f| f.numeric).unwrap_or(false);

    let encoded = if key == "ip_is_private" {
        if values.len() != 1 {
            return Err(ConfigError::invalid(
                "ip_is_private takes exactly one value (true or false)",
            ));
        }
        match values[0].to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => {
                return Err(ConfigError::invalid(format!(
                    "ip_is_private must be true or false, got '{other}'"
                )))
            }
        }
    } else if numeric {
        let mut nums: Vec<Value> = Vec::with_capacity(values.len());
        for v in &values {
            let n: i64 = v.parse().map_err(|_| {
                ConfigError::invalid(format!("'{v}' is not a valid integer for {key}"))
            })?;
            nums.push(Value::Number(Number::from(n)));
        }
        if nums.len() == 1 {
            nums.remove(0)
        } else {
            Value::Array(nums)
        }
    } else if values.len() == 1 {
        Value::String(values.remove(0))
    } else {
        Value::Array(values.into_iter().map(Value::String).collect())
    };

    let outbound = edit.outbound.trim();
    if outbound.is_empty() {
        return Err(ConfigError::invalid("outbound tag must not be empty"));
    }

    let mut rule = Map::new();
    rule.insert(key.to_string(), encoded);
    rule.insert("action".into(), Value::String("route".into()));
    rule.insert("outbound".into(), Value::String(outbound.to_string()));
    Ok(Value::Object(rule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edit(key: &str, values: &[&str], outbound: &str) -> RuleEditData {
        RuleEditData {
            key: key.into(),
            values: values.iter().map(|s| s.to_string()).collect(),
            outbound: outbound.into(),
            target_set: String::new(),
        }
    }

    #[test]
    fn singleton_string_encodes_as_scalar() {
        let rule = build_rule(&edit("domain_suffix", &["example.com"], "proxy")).unwrap();
        assert_eq!(
            rule,
            json!({ "domain_suffix": "example.com", "action": "route", "outbound": "proxy" })
        );
    }

    #[test]
    fn multiple_strings_encode_as_array_after_trim_dedup() {
        let rule = build_rule(&edit(
            "domain_suffix",
            &[" a.com ", "b.com", "a.com", ""],
            "proxy",
        ))
        .unwrap();
        assert_eq!(rule["domain_suffix"], json!(["a.com", "b.com"]));
    }

    #[test]
    fn numeric_key_encodes_numbers() {
        let one = build_rule(&edit("port", &["443"], "direct")).unwrap();
        assert_eq!(one["port"], json!(443));
        let many = build_rule(&edit("port", &["80", "443"], "direct")).unwrap();
        assert_eq!(many["port"], json!([80, 443]));
    }

    #[test]
    fn numeric_key_rejects_non_integers() {
        let err = build_rule(&edit("port", &["https"], "direct")).unwrap_err();
        assert!(err.to_string().contains("not a valid integer"));
    }

    #[test]
    fn ip_is_private_is_a_single_case_insensitive_boolean() {
        let rule = build_rule(&edit("ip_is_private", &["TRUE"], "direct")).unwrap();
        assert_eq!(rule["ip_is_private"], json!(true));
        assert!(build_rule(&edit("ip_is_private", &["yes"], "direct")).is_err());
        assert!(build_rule(&edit("ip_is_private", &["true", "false"], "direct")).is_err());
    }

    #[test]
    fn validation_order_reports_values_before_outbound() {
        // Empty values AND empty outbound: the values error must win.
        let err = build_rule(&edit("domain", &["  "], "")).unwrap_err();
        assert!(err.to_string().contains("match value"));
        let err = build_rule(&edit("domain", &["a.com"], " ")).unwrap_err();
        assert!(err.to_string().contains("outbound tag"));
    }

    #[test]
    fn blank_target_set_defaults() {
        let e = edit("domain", &["a.com"], "proxy");
        assert_eq!(e.target_set(), "default");
    }
}
