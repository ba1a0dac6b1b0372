//! Subscription-body format detection and node extraction.
//!
//! Detection order for fetched content: native JSON (a node array or a
//! full document with `outbounds`), then a Clash YAML document, then a
//! base64-wrapped body (unwrapped once and re-detected), then a
//! newline/comma-separated link list. Node order is preserved as
//! encountered; duplicate tags are left for the synthesizer to resolve.

use serde_json::Value;
use tracing::{debug, warn};

use sbm_config::OutboundNode;

use crate::link::{base64_any, decode_link, is_supported_link};
use crate::model::{ParsedSubscription, SubsError};
use crate::parse_clash;

/// Caller's hint about the body. `Auto` is what a fetched subscription
/// gets; the explicit kinds skip detection for user-pasted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// JSON the user pasted as "manual nodes": a node array or a full
    /// document carrying `outbounds`.
    ManualNodes,
    /// One proxy link per line (or comma-separated).
    UriList,
    /// Fetched bytes of unknown layout.
    Auto,
}

/// Parse a subscription body into nodes.
pub fn parse(text: &str, kind: ContentKind) -> Result<ParsedSubscription, SubsError> {
    match kind {
        ContentKind::ManualNodes => parse_manual_nodes(text),
        ContentKind::UriList => Ok(parse_uri_list(text)),
        ContentKind::Auto => parse_auto(text, true),
    }
}

fn parse_auto(text: &str, try_base64: bool) -> Result<ParsedSubscription, SubsError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SubsError::Unsupported);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(parsed) = nodes_from_json(&value) {
            debug!(nodes = parsed.nodes.len(), "subscription body is native JSON");
            return Ok(parsed);
        }
    }

    if parse_clash::looks_like_clash(trimmed) {
        debug!("subscription body looks like a Clash document");
        return parse_clash::parse(trimmed);
    }

    if trimmed.lines().any(is_supported_link) {
        return Ok(parse_uri_list(trimmed));
    }

    // Providers commonly ship the whole link list base64-wrapped.
    if try_base64 {
        if let Ok(raw) = base64_any(trimmed) {
            if let Ok(inner) = String::from_utf8(raw) {
                debug!("unwrapped base64 subscription body");
                return parse_auto(&inner, false);
            }
        }
    }

    Err(SubsError::Unsupported)
}

fn parse_manual_nodes(text: &str) -> Result<ParsedSubscription, SubsError> {
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|e| SubsError::parse(format!("manual nodes: {e}")))?;
    nodes_from_json(&value).ok_or_else(|| SubsError::parse("manual nodes: no node-shaped entries"))
}

/// A JSON body qualifies when it is an array of node-shaped objects or a
/// document whose `outbounds` array contains at least one. Non-node
/// entries (selectors, `direct`, `block`) are passed over silently.
fn nodes_from_json(value: &Value) -> Option<ParsedSubscription> {
    let entries = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map.get("outbounds")?.as_array()?.as_slice(),
        _ => return None,
    };
    let nodes: Vec<OutboundNode> = entries.iter().filter_map(OutboundNode::from_value).collect();
    if nodes.is_empty() {
        return None;
    }
    Some(ParsedSubscription { nodes, skipped: 0 })
}

/// Decode a link list line by line; malformed lines are skipped and
/// counted so one bad entry never sinks the batch.
fn parse_uri_list(text: &str) -> ParsedSubscription {
    let mut out = ParsedSubscription::default();
    for line in split_links(text) {
        match decode_link(&line) {
            Ok(node) => out.nodes.push(node),
            Err(e) => {
                out.skipped += 1;
                warn!(line = %preview(&line), error = %e, "skipping malformed subscription line");
            }
        }
    }
    out
}

/// Some providers join links with commas instead of newlines; split on
/// a comma only when the next token starts a known scheme.
fn split_links(text: &str) -> Vec<String> {
    let mut normalized = text.to_string();
    for scheme in ["vmess://", "vless://", "trojan://", "ss://", "hysteria2://", "hy2://"] {
        normalized = normalized.replace(&format!(",{scheme}"), &format!("\n{scheme}"));
    }
    normalized
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("//"))
        .map(str::to_string)
        .collect()
}

fn preview(line: &str) -> String {
    line.chars().take(48).collect()
}
