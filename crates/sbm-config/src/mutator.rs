//! Active-Config Rule Mutator.
//!
//! Add/Update/Remove run against the in-memory copy of the active
//! configuration document and write back once; the rule-set store is
//! only touched after the document write succeeds. The active file is
//! shared with the kernel and with manual edits, so the write is
//! last-write-wins with no lock (known gap, tolerated).

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::fsio;
use crate::rule::builder::{build_rule, RuleEditData};
use crate::rule::matcher::{find_owning_set, find_rule_index};
use crate::rule::payload::RuleItem;
use crate::ruleset::RuleSetStore;

/// Position new rules one past the later of the `clash_mode: direct` and
/// `clash_mode: global` marker rules, so mode-compat rules keep leading
/// the list. No markers (or an empty list) means the front.
pub fn canonical_insert_index(rules: &[Value]) -> usize {
    let mut anchor: Option<usize> = None;
    for (idx, rule) in rules.iter().enumerate() {
        match rule.get("clash_mode").and_then(Value::as_str) {
            Some("direct") | Some("global") => anchor = Some(anchor.map_or(idx, |a| a.max(idx))),
            _ => {}
        }
    }
    anchor.map_or(0, |a| a + 1)
}

/// Mutates the active configuration document and the shared rule-set
/// store in lockstep. Both collaborators are injected; nothing here is
/// resolved through globals.
pub struct RuleMutator<'a> {
    config_path: PathBuf,
    store: &'a mut RuleSetStore,
}

impl<'a> RuleMutator<'a> {
    pub fn new<P: AsRef<Path>>(config_path: P, store: &'a mut RuleSetStore) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            store,
        }
    }

    /// Add a rule built from `edit`. A structurally identical rule that
    /// already sits past the canonical index is reordered forward rather
    /// than duplicated; one at or before the index is left alone.
    pub fn add(&mut self, edit: &RuleEditData) -> Result<(), ConfigError> {
        let rule = build_rule(edit)?;
        let mut doc = self.load()?;
        {
            let rules = route_rules_mut(&mut doc)?;
            let idx = canonical_insert_index(rules);
            match rules.iter().position(|r| *r == rule) {
                Some(pos) if pos > idx => {
                    let existing = rules.remove(pos);
                    rules.insert(idx, existing);
                    debug!(from = pos, to = idx, "reordered existing rule instead of duplicating");
                }
                Some(_) => debug!("rule already present at canonical position"),
                None => rules.insert(idx, rule.clone()),
            }
        }
        self.save(&doc)?;

        // Store write is reconciliation, not part of the transaction.
        if let Err(e) = self.store.add_rule(edit.target_set(), rule) {
            warn!(set = edit.target_set(), error = %e, "rule-set store insert failed");
        }
        Ok(())
    }

    /// Replace the rule described by `old` with one built from `edit`,
    /// relocating it between sets when the target set changed.
    pub fn update(&mut self, old: &RuleItem, edit: &RuleEditData) -> Result<(), ConfigError> {
        let mut doc = self.load()?;
        let new_rule = build_rule(edit)?;
        let old_rule;
        {
            let rules = route_rules_mut(&mut doc)?;
            let pos = find_rule_index(rules, old).ok_or(ConfigError::RuleNotFound)?;
            old_rule = rules.remove(pos);
            let idx = canonical_insert_index(rules);
            rules.insert(idx, new_rule.clone());
        }
        self.save(&doc)?;

        let owner = self
            .store
            .find_set_containing(&old_rule)
            .map(str::to_string);
        let result = match owner {
            Some(set) if set == edit.target_set() => {
                self.store.replace_rule(&set, &old_rule, new_rule)
            }
            Some(set) => self
                .store
                .remove_rule(&set, &old_rule)
                .and_then(|_| self.store.add_rule(edit.target_set(), new_rule)),
            None => self.store.add_rule(edit.target_set(), new_rule),
        };
        if let Err(e) = result {
            warn!(set = edit.target_set(), error = %e, "rule-set store update failed");
        }
        Ok(())
    }

    /// Remove the rule described by `item` from the document, then from
    /// whichever set the store reports as owner (sweeping all sets when
    /// no owner is found).
    pub fn remove(&mut self, item: &RuleItem) -> Result<(), ConfigError> {
        let mut doc = self.load()?;
        let removed;
        {
            let rules = route_rules_mut(&mut doc)?;
            let pos = find_rule_index(rules, item).ok_or(ConfigError::RuleNotFound)?;
            removed = rules.remove(pos);
        }
        self.save(&doc)?;

        let owner = find_owning_set(self.store.document(), item);
        let result = match owner {
            Some(set) => self.store.remove_rule(&set, &removed).and_then(|hit| {
                if hit {
                    Ok(1)
                } else {
                    self.store.remove_rule_everywhere(&removed)
                }
            }),
            None => self.store.remove_rule_everywhere(&removed),
        };
        if let Err(e) = result {
            warn!(error = %e, "rule-set store removal failed");
        }
        Ok(())
    }

    fn load(&self) -> Result<Map<String, Value>, ConfigError> {
        let text = match fs::read_to_string(&self.config_path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(
                    self.config_path.display().to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ConfigError::parse(format!("active config: {e}")))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::invalid("active config is not a JSON object")),
        }
    }

    fn save(&self, doc: &Map<String, Value>) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(doc)
            .map_err(|e| ConfigError::parse(e.to_string()))?;
        fsio::save_with_backup(&self.config_path, text.as_bytes())?;
        Ok(())
    }
}

fn route_rules_mut(doc: &mut Map<String, Value>) -> Result<&mut Vec<Value>, ConfigError> {
    let route = doc
        .entry("route")
        .or_insert_with(|| Value::Object(Map::new()));
    let route = route
        .as_object_mut()
        .ok_or_else(|| ConfigError::invalid("route is not a JSON object"))?;
    route
        .entry("rules")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| ConfigError::invalid("route.rules is not an array"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_index_sits_after_both_markers() {
        let rules = vec![
            json!({ "clash_mode": "direct", "outbound": "direct" }),
            json!({ "clash_mode": "global", "outbound": "proxy" }),
            json!({ "domain": "a.com", "outbound": "p" }),
        ];
        assert_eq!(canonical_insert_index(&rules), 2);
    }

    #[test]
    fn insert_index_single_marker() {
        let rules = vec![json!({ "clash_mode": "direct", "outbound": "direct" })];
        assert_eq!(canonical_insert_index(&rules), 1);
    }

    #[test]
    fn insert_index_empty_and_unmarked() {
        assert_eq!(canonical_insert_index(&[]), 0);
        let rules = vec![json!({ "domain": "a.com", "outbound": "p" })];
        assert_eq!(canonical_insert_index(&rules), 0);
    }
}
