//! Outbound node model
//! 出站节点模型
//!
//! One [`OutboundNode`] becomes one element of the configuration
//! document's `outbounds` array. The node is a tagged sum type over the
//! supported protocols so that encode/decode is exhaustive per protocol
//! instead of branching on dynamic key presence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single proxy server entry, keyed by `tag` within an outbound list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundNode {
    Vmess(VmessNode),
    Vless(VlessNode),
    Shadowsocks(ShadowsocksNode),
    Trojan(TrojanNode),
    Tuic(TuicNode),
    Hysteria2(Hysteria2Node),
}

impl OutboundNode {
    pub fn tag(&self) -> &str {
        match self {
            Self::Vmess(n) => &n.tag,
            Self::Vless(n) => &n.tag,
            Self::Shadowsocks(n) => &n.tag,
            Self::Trojan(n) => &n.tag,
            Self::Tuic(n) => &n.tag,
            Self::Hysteria2(n) => &n.tag,
        }
    }

    pub fn server(&self) -> &str {
        match self {
            Self::Vmess(n) => &n.server,
            Self::Vless(n) => &n.server,
            Self::Shadowsocks(n) => &n.server,
            Self::Trojan(n) => &n.server,
            Self::Tuic(n) => &n.server,
            Self::Hysteria2(n) => &n.server,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Vmess(n) => n.server_port,
            Self::Vless(n) => n.server_port,
            Self::Shadowsocks(n) => n.server_port,
            Self::Trojan(n) => n.server_port,
            Self::Tuic(n) => n.server_port,
            Self::Hysteria2(n) => n.server_port,
        }
    }

    pub fn protocol(&self) -> &'static str {
        match self {
            Self::Vmess(_) => "vmess",
            Self::Vless(_) => "vless",
            Self::Shadowsocks(_) => "shadowsocks",
            Self::Trojan(_) => "trojan",
            Self::Tuic(_) => "tuic",
            Self::Hysteria2(_) => "hysteria2",
        }
    }

    /// Encode as a configuration-document fragment.
    ///
    /// Absent transport means plain TCP and stays absent in the output;
    /// emitting a literal `"type": "tcp"` transport breaks the kernel.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode a node-shaped object. Returns `None` for entries whose
    /// `type` is unsupported, whose `tag` is empty or whose port is 0.
    pub fn from_value(v: &Value) -> Option<Self> {
        let node: Self = serde_json::from_value(v.clone()).ok()?;
        if node.tag().is_empty() || node.port() == 0 {
            return None;
        }
        Some(node)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmessNode {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    /// 用户 UUID
    pub uuid: String,
    /// 加密方式 (auto, aes-128-gcm, chacha20-poly1305, none)
    #[serde(default = "default_vmess_security")]
    pub security: String,
    /// AlterId (legacy, 0 for AEAD)
    #[serde(default)]
    pub alter_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

impl Default for VmessNode {
    fn default() -> Self {
        Self {
            tag: String::new(),
            server: String::new(),
            server_port: 0,
            uuid: String::new(),
            security: default_vmess_security(),
            alter_id: 0,
            tls: None,
            transport: None,
        }
    }
}

fn default_vmess_security() -> String {
    "auto".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VlessNode {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub uuid: String,
    /// 流控模式 (xtls-rprx-vision)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShadowsocksNode {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    /// 加密方法 (aes-256-gcm, chacha20-ietf-poly1305, 2022-*)
    pub method: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrojanNode {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TuicNode {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// 拥塞控制算法 (bbr, cubic, new_reno)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congestion_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hysteria2Node {
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfs: Option<ObfsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
}

/// Salamander obfuscation for hysteria2.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObfsOptions {
    #[serde(rename = "type")]
    pub kind: String,
    pub password: String,
}

/// TLS options for an outbound connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TlsOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
    /// Skip certificate verification (insecure)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<RealityOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utls: Option<UtlsOptions>,
}

/// REALITY handshake parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RealityOptions {
    #[serde(default)]
    pub enabled: bool,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

/// uTLS client fingerprint mimicry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UtlsOptions {
    #[serde(default)]
    pub enabled: bool,
    pub fingerprint: String,
}

/// V2Ray-style stream transport. Plain TCP is modeled as `None` on the
/// node, never as a variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transport {
    Ws {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
    },
    Grpc {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_name: Option<String>,
    },
    Http {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        host: Vec<String>,
    },
}

impl Transport {
    /// Map a wire-format network kind onto a transport. `tcp`, empty and
    /// unknown kinds collapse to `None`.
    pub fn from_network(
        network: &str,
        path: Option<String>,
        host: Option<String>,
        service_name: Option<String>,
    ) -> Option<Self> {
        match network.to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Some(Self::Ws {
                path,
                headers: host.map(|h| {
                    let mut m = HashMap::new();
                    m.insert("Host".to_string(), h);
                    m
                }),
            }),
            "grpc" => Some(Self::Grpc { service_name }),
            "http" | "h2" => Some(Self::Http {
                path,
                host: host.into_iter().collect(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_transport_stays_absent_in_output() {
        let node = OutboundNode::Vmess(VmessNode {
            tag: "n1".into(),
            server: "1.2.3.4".into(),
            server_port: 443,
            uuid: "uuid".into(),
            ..Default::default()
        });
        let v = node.to_value();
        assert_eq!(v["type"], "vmess");
        assert_eq!(v["tag"], "n1");
        assert!(v.get("transport").is_none());
    }

    #[test]
    fn unknown_network_collapses_to_none() {
        assert!(Transport::from_network("tcp", None, None, None).is_none());
        assert!(Transport::from_network("", None, None, None).is_none());
        assert!(Transport::from_network("kcp", None, None, None).is_none());
    }

    #[test]
    fn ws_transport_carries_host_header() {
        let t = Transport::from_network("ws", Some("/sub".into()), Some("cdn.example.com".into()), None)
            .expect("ws transport");
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["type"], "ws");
        assert_eq!(v["path"], "/sub");
        assert_eq!(v["headers"]["Host"], "cdn.example.com");
    }

    #[test]
    fn from_value_rejects_empty_tag_and_zero_port() {
        let bad_tag = serde_json::json!({
            "type": "trojan", "tag": "", "server": "a", "server_port": 443, "password": "p"
        });
        assert!(OutboundNode::from_value(&bad_tag).is_none());
        let bad_port = serde_json::json!({
            "type": "trojan", "tag": "t", "server": "a", "server_port": 0, "password": "p"
        });
        assert!(OutboundNode::from_value(&bad_port).is_none());
    }
}
