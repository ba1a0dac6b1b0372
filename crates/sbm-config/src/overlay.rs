//! User-preference overlay applied onto a configuration document.
//! 用户偏好叠加层：监听端口 / TUN / DNS。
//!
//! The overlay never touches `route.rules` or the outbound list; those
//! belong to the rule engine and the synthesizer respectively. The
//! system-proxy bypass list rides along in [`OverlaySettings`] for the
//! OS-glue collaborator but has no representation inside the document.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Mixed (HTTP+SOCKS) inbound listen port.
    #[serde(default = "default_mixed_port")]
    pub mixed_port: u16,
    /// Clash-compatible control API port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// System-proxy bypass hosts, consumed by the OS glue, not the kernel.
    #[serde(default)]
    pub bypass: Vec<String>,
    #[serde(default)]
    pub tun: TunOptions,
    #[serde(default)]
    pub dns: DnsOptions,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            mixed_port: default_mixed_port(),
            api_port: default_api_port(),
            bypass: Vec::new(),
            tun: TunOptions::default(),
            dns: DnsOptions::default(),
        }
    }
}

fn default_mixed_port() -> u16 {
    2080
}

fn default_api_port() -> u16 {
    9090
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunOptions {
    #[serde(default)]
    pub enabled: bool,
    /// 协议栈 (system, gvisor, mixed)
    #[serde(default = "default_tun_stack")]
    pub stack: String,
    #[serde(default = "default_true")]
    pub auto_route: bool,
}

impl Default for TunOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            stack: default_tun_stack(),
            auto_route: true,
        }
    }
}

fn default_tun_stack() -> String {
    "system".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsOptions {
    /// Resolver used for proxied traffic.
    #[serde(default = "default_remote_dns")]
    pub remote: String,
    /// Resolver used for direct traffic.
    #[serde(default = "default_direct_dns")]
    pub direct: String,
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            remote: default_remote_dns(),
            direct: default_direct_dns(),
        }
    }
}

fn default_remote_dns() -> String {
    "tls://8.8.8.8".to_string()
}

fn default_direct_dns() -> String {
    "223.5.5.5".to_string()
}

impl OverlaySettings {
    /// Full overlay: ports, TUN inbound, DNS block.
    pub fn apply(&self, doc: &mut Map<String, Value>) {
        self.apply_ports(doc);
        self.apply_tun(doc);
        self.apply_dns(doc);
    }

    /// Port-only overlay, used by the pass-through path where the raw
    /// document is otherwise kept verbatim.
    pub fn apply_ports(&self, doc: &mut Map<String, Value>) {
        let inbounds = doc
            .entry("inbounds")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(list) = inbounds.as_array_mut() {
            match list
                .iter_mut()
                .find(|ib| ib.get("type").and_then(Value::as_str) == Some("mixed"))
            {
                Some(ib) => {
                    if let Some(obj) = ib.as_object_mut() {
                        obj.insert("listen_port".into(), json!(self.mixed_port));
                    }
                }
                None => list.push(json!({
                    "type": "mixed",
                    "tag": "mixed-in",
                    "listen": "127.0.0.1",
                    "listen_port": self.mixed_port,
                })),
            }
        }

        let experimental = doc
            .entry("experimental")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(obj) = experimental.as_object_mut() {
            let api = obj
                .entry("clash_api")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(api) = api.as_object_mut() {
                api.insert(
                    "external_controller".into(),
                    json!(format!("127.0.0.1:{}", self.api_port)),
                );
            }
        }
    }

    fn apply_tun(&self, doc: &mut Map<String, Value>) {
        let Some(list) = doc
            .entry("inbounds")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
        else {
            return;
        };
        let has_tun = |ib: &Value| ib.get("type").and_then(Value::as_str) == Some("tun");
        if self.tun.enabled {
            if !list.iter().any(has_tun) {
                list.push(json!({
                    "type": "tun",
                    "tag": "tun-in",
                    "auto_route": self.tun.auto_route,
                    "stack": self.tun.stack,
                }));
            }
        } else {
            list.retain(|ib| !has_tun(ib));
        }
    }

    fn apply_dns(&self, doc: &mut Map<String, Value>) {
        // Keep a user-authored dns block untouched.
        if doc.contains_key("dns") {
            return;
        }
        doc.insert(
            "dns".into(),
            json!({
                "servers": [
                    { "tag": "remote", "address": self.dns.remote },
                    { "tag": "local", "address": self.dns.direct, "detour": "direct" },
                ],
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_doc() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn ports_overlay_inserts_mixed_inbound_and_api() {
        let settings = OverlaySettings::default();
        let mut doc = empty_doc();
        settings.apply_ports(&mut doc);
        assert_eq!(doc["inbounds"][0]["type"], "mixed");
        assert_eq!(doc["inbounds"][0]["listen_port"], 2080);
        assert_eq!(
            doc["experimental"]["clash_api"]["external_controller"],
            "127.0.0.1:9090"
        );
    }

    #[test]
    fn ports_overlay_rewrites_existing_mixed_port() {
        let settings = OverlaySettings {
            mixed_port: 7890,
            ..Default::default()
        };
        let mut doc = empty_doc();
        doc.insert(
            "inbounds".into(),
            json!([{ "type": "mixed", "tag": "in", "listen_port": 1080 }]),
        );
        settings.apply_ports(&mut doc);
        let list = doc["inbounds"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["listen_port"], 7890);
    }

    #[test]
    fn tun_toggle_adds_and_removes_inbound() {
        let mut settings = OverlaySettings::default();
        settings.tun.enabled = true;
        let mut doc = empty_doc();
        settings.apply(&mut doc);
        assert!(doc["inbounds"]
            .as_array()
            .unwrap()
            .iter()
            .any(|ib| ib["type"] == "tun"));

        settings.tun.enabled = false;
        settings.apply(&mut doc);
        assert!(!doc["inbounds"]
            .as_array()
            .unwrap()
            .iter()
            .any(|ib| ib["type"] == "tun"));
    }

    #[test]
    fn user_dns_block_is_preserved() {
        let settings = OverlaySettings::default();
        let mut doc = empty_doc();
        doc.insert("dns".into(), json!({ "servers": [] }));
        settings.apply(&mut doc);
        assert_eq!(doc["dns"], json!({ "servers": [] }));
    }
}
