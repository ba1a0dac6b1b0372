//! Config Synthesizer: builds or rewrites a configuration document's
//! outbound list from node records, then applies the settings overlay.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::ConfigError;
use crate::outbound::OutboundNode;
use crate::overlay::OverlaySettings;

/// Fresh base document used when no prior config exists.
pub fn skeleton() -> Value {
    json!({
        "log": { "level": "info" },
        "inbounds": [],
        "outbounds": [],
        "route": { "rules": [] },
    })
}

/// Replace the document's outbound list with `nodes` and apply the
/// overlay. Tag collisions resolve last-write-wins, keeping the position
/// of the first occurrence. An empty node list is accepted and yields a
/// structurally valid, outbound-less document.
pub fn synthesize(
    base: Value,
    nodes: &[OutboundNode],
    overlay: &OverlaySettings,
) -> Result<Value, ConfigError> {
    let mut doc = match base {
        Value::Object(map) => map,
        _ => return Err(ConfigError::invalid("base document is not a JSON object")),
    };

    let mut order: Vec<&str> = Vec::new();
    let mut by_tag: std::collections::HashMap<&str, Value> = std::collections::HashMap::new();
    for node in nodes {
        let tag = node.tag();
        if !by_tag.contains_key(tag) {
            order.push(tag);
        } else {
            debug!(tag, "duplicate outbound tag, keeping the later node");
        }
        by_tag.insert(tag, node.to_value());
    }
    let outbounds: Vec<Value> = order
        .into_iter()
        .filter_map(|tag| by_tag.remove(tag))
        .collect();
    doc.insert("outbounds".into(), Value::Array(outbounds));

    ensure_route_rules(&mut doc);
    overlay.apply(&mut doc);
    Ok(Value::Object(doc))
}

/// Pass-through mode for "use original config" subscriptions: the raw
/// document is kept verbatim apart from the port overlay. No node
/// extraction happens here.
pub fn passthrough(raw: &str, overlay: &OverlaySettings) -> Result<Value, ConfigError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ConfigError::parse(format!("original config: {e}")))?;
    let mut doc = match value {
        Value::Object(map) => map,
        _ => return Err(ConfigError::invalid("original config is not a JSON object")),
    };
    overlay.apply_ports(&mut doc);
    Ok(Value::Object(doc))
}

fn ensure_route_rules(doc: &mut Map<String, Value>) {
    let route = doc
        .entry("route")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(route) = route.as_object_mut() {
        route
            .entry("rules")
            .or_insert_with(|| Value::Array(Vec::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::TrojanNode;

    fn trojan(tag: &str, server: &str) -> OutboundNode {
        OutboundNode::Trojan(TrojanNode {
            tag: tag.into(),
            server: server.into(),
            server_port: 443,
            password: "pw".into(),
            ..Default::default()
        })
    }

    #[test]
    fn tag_collision_is_last_write_wins() {
        let nodes = vec![trojan("a", "old.example"), trojan("b", "b.example"), trojan("a", "new.example")];
        let doc = synthesize(skeleton(), &nodes, &OverlaySettings::default()).unwrap();
        let outs = doc["outbounds"].as_array().unwrap();
        assert_eq!(outs.len(), 2);
        assert_eq!(outs[0]["tag"], "a");
        assert_eq!(outs[0]["server"], "new.example");
        assert_eq!(outs[1]["tag"], "b");
    }

    #[test]
    fn empty_node_list_still_yields_valid_document() {
        let doc = synthesize(skeleton(), &[], &OverlaySettings::default()).unwrap();
        assert!(doc["outbounds"].as_array().unwrap().is_empty());
        assert!(doc["route"]["rules"].as_array().unwrap().is_empty());
    }

    #[test]
    fn non_object_base_is_a_hard_failure() {
        let err = synthesize(json!([1, 2]), &[], &OverlaySettings::default()).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn passthrough_only_touches_ports() {
        let raw = r#"{"outbounds":[{"type":"direct","tag":"keep-me"}],"route":{"rules":[{"port":22,"action":"route","outbound":"keep-me"}]}}"#;
        let doc = passthrough(raw, &OverlaySettings::default()).unwrap();
        assert_eq!(doc["outbounds"][0]["tag"], "keep-me");
        assert_eq!(doc["route"]["rules"][0]["port"], 22);
        assert_eq!(doc["inbounds"][0]["type"], "mixed");
    }

    #[test]
    fn passthrough_rejects_non_object() {
        assert!(passthrough("[1,2]", &OverlaySettings::default()).is_err());
        assert!(passthrough("not json", &OverlaySettings::default()).is_err());
    }
}
