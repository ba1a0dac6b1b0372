//! Shared Rule-Set Store.
//! 共享规则集文档的 CRUD。
//!
//! The document `{ "sets": [ { "name", "rules": [...] } ] }` is persisted
//! independently from the active configuration document; the two overlap
//! on the rule list and are reconciled structurally by the matcher and
//! the mutator. Rule equality here is deep JSON-object equality, which in
//! serde_json is key-order independent.
//!
//! A set named `"default"` is conceptually always present: it is
//! materialized lazily on first write and can be neither renamed nor
//! removed. Rules are single-owned — inserting a rule removes structural
//! duplicates from every other set first.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;
use crate::fsio;
use crate::rule::DEFAULT_SET;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetDocument {
    #[serde(default)]
    pub sets: Vec<RuleSet>,
}

/// File-backed store over a [`RuleSetDocument`]. Every mutating call
/// persists before returning.
#[derive(Debug)]
pub struct RuleSetStore {
    path: PathBuf,
    doc: RuleSetDocument,
}

impl RuleSetStore {
    /// Open the store; a missing file is an empty document, not an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| ConfigError::parse(format!("rule-set document: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RuleSetDocument::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, doc })
    }

    pub fn document(&self) -> &RuleSetDocument {
        &self.doc
    }

    /// Set names as the UI lists them; `"default"` is reported first even
    /// before it has been materialized.
    pub fn set_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        if !self.doc.sets.iter().any(|s| s.name == DEFAULT_SET) {
            names.push(DEFAULT_SET.to_string());
        }
        names.extend(self.doc.sets.iter().map(|s| s.name.clone()));
        names
    }

    /// Rules of one set. The unmaterialized `"default"` set reads as
    /// empty; any other missing set is `None`. Names are trimmed here and
    /// at every other name-keyed entry point.
    pub fn rules(&self, name: &str) -> Option<Vec<Value>> {
        let name = name.trim();
        match self.doc.sets.iter().find(|s| s.name == name) {
            Some(set) => Some(set.rules.clone()),
            None if name == DEFAULT_SET => Some(Vec::new()),
            None => None,
        }
    }

    /// Replace a set's whole rule array, materializing the set if needed.
    pub fn replace_rules(&mut self, name: &str, rules: Vec<Value>) -> Result<(), ConfigError> {
        self.set_mut(name).rules = rules;
        self.save()
    }

    /// Insert a rule into `set`, enforcing single ownership: any
    /// structurally equal rule is removed from every set first.
    pub fn add_rule(&mut self, set: &str, rule: Value) -> Result<(), ConfigError> {
        for s in &mut self.doc.sets {
            s.rules.retain(|r| *r != rule);
        }
        self.set_mut(set).rules.push(rule);
        self.save()
    }

    /// Swap `old` for `new` inside `set`. Falls back to a plain insert
    /// when `old` is not present.
    pub fn replace_rule(&mut self, set: &str, old: &Value, new: Value) -> Result<(), ConfigError> {
        let set = set.trim();
        for s in &mut self.doc.sets {
            if s.name != set {
                s.rules.retain(|r| *r != new);
            }
        }
        let target = self.set_mut(set);
        match target.rules.iter().position(|r| r == old) {
            Some(idx) => target.rules[idx] = new,
            None => target.rules.push(new),
        }
        self.save()
    }

    /// Remove one structurally equal rule from `set`. Returns whether
    /// anything was removed; removal persists, a miss does not.
    pub fn remove_rule(&mut self, set: &str, rule: &Value) -> Result<bool, ConfigError> {
        let set = set.trim();
        let Some(s) = self.doc.sets.iter_mut().find(|s| s.name == set) else {
            return Ok(false);
        };
        let before = s.rules.len();
        s.rules.retain(|r| r != rule);
        if s.rules.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Sweep a rule out of every set.
    pub fn remove_rule_everywhere(&mut self, rule: &Value) -> Result<usize, ConfigError> {
        let mut removed = 0;
        for s in &mut self.doc.sets {
            let before = s.rules.len();
            s.rules.retain(|r| r != rule);
            removed += before - s.rules.len();
        }
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// Equality scan: which set currently contains this exact rule
    /// object. Distinct from the matcher's fuzzy lookup; used when the
    /// caller already holds the built rule.
    pub fn find_set_containing(&self, rule: &Value) -> Option<&str> {
        self.doc
            .sets
            .iter()
            .find(|s| s.rules.iter().any(|r| r == rule))
            .map(|s| s.name.as_str())
    }

    /// Rename a set. `"default"` cannot be renamed; names are trimmed and
    /// case-sensitive.
    pub fn rename_set(&mut self, old: &str, new: &str) -> Result<(), ConfigError> {
        let old = old.trim();
        if old == DEFAULT_SET {
            return Err(ConfigError::invalid("the default set cannot be renamed"));
        }
        let new = new.trim();
        if new.is_empty() {
            return Err(ConfigError::invalid("set name must not be empty"));
        }
        if self.doc.sets.iter().any(|s| s.name == new) || new == DEFAULT_SET {
            return Err(ConfigError::invalid(format!("set '{new}' already exists")));
        }
        let set = self
            .doc
            .sets
            .iter_mut()
            .find(|s| s.name == old)
            .ok_or_else(|| ConfigError::SetNotFound(old.to_string()))?;
        set.name = new.to_string();
        self.save()
    }

    /// Remove a set. `"default"` cannot be removed; whether at least one
    /// set must remain is left to the caller.
    pub fn remove_set(&mut self, name: &str) -> Result<(), ConfigError> {
        let name = name.trim();
        if name == DEFAULT_SET {
            return Err(ConfigError::invalid("the default set cannot be removed"));
        }
        let before = self.doc.sets.len();
        self.doc.sets.retain(|s| s.name != name);
        if self.doc.sets.len() == before {
            return Err(ConfigError::SetNotFound(name.to_string()));
        }
        self.save()
    }

    fn set_mut(&mut self, name: &str) -> &mut RuleSet {
        let name = name.trim();
        if let Some(idx) = self.doc.sets.iter().position(|s| s.name == name) {
            return &mut self.doc.sets[idx];
        }
        debug!(set = name, "materializing rule set");
        let idx = self.doc.sets.len();
        self.doc.sets.push(RuleSet {
            name: name.to_string(),
            rules: Vec::new(),
        });
        &mut self.doc.sets[idx]
    }

    fn save(&self) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| ConfigError::parse(e.to_string()))?;
        fsio::write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, RuleSetStore) {
        let dir = tempfile::tempdir().unwrap();
        let s = RuleSetStore::open(dir.path().join("rulesets.json")).unwrap();
        (dir, s)
    }

    fn rule(domain: &str) -> Value {
        json!({ "domain": domain, "action": "route", "outbound": "p" })
    }

    #[test]
    fn default_set_is_listed_before_materialization() {
        let (_d, s) = store();
        assert_eq!(s.set_names(), ["default"]);
        assert_eq!(s.rules("default").unwrap().len(), 0);
        assert!(s.rules("nope").is_none());
    }

    #[test]
    fn add_rule_materializes_and_persists() {
        let (dir, mut s) = store();
        s.add_rule("default", rule("a.com")).unwrap();
        s.add_rule("work", rule("b.com")).unwrap();

        let reopened = RuleSetStore::open(dir.path().join("rulesets.json")).unwrap();
        assert_eq!(reopened.set_names(), ["default", "work"]);
        assert_eq!(reopened.rules("work").unwrap(), vec![rule("b.com")]);
    }

    #[test]
    fn rules_are_single_owned() {
        let (_d, mut s) = store();
        s.add_rule("a", rule("x.com")).unwrap();
        s.add_rule("b", rule("x.com")).unwrap();
        assert_eq!(s.rules("a").unwrap().len(), 0);
        assert_eq!(s.find_set_containing(&rule("x.com")), Some("b"));
    }

    #[test]
    fn equality_is_key_order_independent() {
        let (_d, mut s) = store();
        s.add_rule("a", rule("x.com")).unwrap();
        let reordered = json!({ "outbound": "p", "domain": "x.com", "action": "route" });
        assert_eq!(s.find_set_containing(&reordered), Some("a"));
        assert!(s.remove_rule("a", &reordered).unwrap());
    }

    #[test]
    fn default_set_is_protected() {
        let (_d, mut s) = store();
        assert!(s.rename_set("default", "x").is_err());
        assert!(s.remove_set("default").is_err());
    }

    #[test]
    fn rename_rejects_collisions_and_missing() {
        let (_d, mut s) = store();
        s.add_rule("a", rule("1.com")).unwrap();
        s.add_rule("b", rule("2.com")).unwrap();
        assert!(s.rename_set("a", "b").is_err());
        assert!(s.rename_set("a", "default").is_err());
        assert!(s.rename_set("missing", "c").is_err());
        s.rename_set("a", "c").unwrap();
        assert_eq!(s.find_set_containing(&rule("1.com")), Some("c"));
    }

    #[test]
    fn name_lookups_trim_whitespace() {
        let (_d, mut s) = store();
        s.add_rule(" work ", rule("a.com")).unwrap();
        assert_eq!(s.set_names(), ["default", "work"]);
        assert_eq!(s.rules("work ").unwrap(), vec![rule("a.com")]);
        assert!(s.remove_rule(" work", &rule("a.com")).unwrap());
        s.rename_set("work ", "home").unwrap();
        s.remove_set(" home ").unwrap();
        assert!(s.rules("home").is_none());
    }

    #[test]
    fn replace_rule_swaps_in_place() {
        let (_d, mut s) = store();
        s.add_rule("a", rule("old.com")).unwrap();
        s.replace_rule("a", &rule("old.com"), rule("new.com")).unwrap();
        assert_eq!(s.rules("a").unwrap(), vec![rule("new.com")]);
    }
}
