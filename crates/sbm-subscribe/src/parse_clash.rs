//! Clash-document ingestion: map each `proxies:` entry onto a node.
//! Unsupported proxy types are skipped and counted, not fatal.

use serde::Deserialize;
use tracing::debug;

use sbm_config::outbound::{
    Hysteria2Node, ObfsOptions, RealityOptions, ShadowsocksNode, TlsOptions, TrojanNode, TuicNode,
    UtlsOptions, VlessNode, VmessNode,
};
use sbm_config::{OutboundNode, Transport};

use crate::model::{ParsedSubscription, SubsError};

#[derive(Deserialize)]
struct ClashDoc {
    #[serde(default)]
    proxies: Vec<ClashProxy>,
}

/// Superset of the per-type Clash proxy fields; irrelevant keys stay at
/// their defaults for types that do not use them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClashProxy {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    server: String,
    port: u16,
    uuid: String,
    password: String,
    cipher: String,
    #[serde(rename = "alterId")]
    alter_id: u16,
    flow: String,
    tls: bool,
    servername: String,
    sni: String,
    alpn: Vec<String>,
    #[serde(rename = "skip-cert-verify")]
    skip_cert_verify: bool,
    #[serde(rename = "client-fingerprint")]
    client_fingerprint: String,
    network: String,
    #[serde(rename = "ws-opts")]
    ws_opts: Option<WsOpts>,
    #[serde(rename = "grpc-opts")]
    grpc_opts: Option<GrpcOpts>,
    #[serde(rename = "reality-opts")]
    reality_opts: Option<RealityOpts>,
    obfs: String,
    #[serde(rename = "obfs-password")]
    obfs_password: String,
    #[serde(rename = "congestion-controller")]
    congestion_controller: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsOpts {
    path: String,
    headers: std::collections::HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GrpcOpts {
    #[serde(rename = "grpc-service-name")]
    service_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RealityOpts {
    #[serde(rename = "public-key")]
    public_key: String,
    #[serde(rename = "short-id")]
    short_id: String,
}

/// Parse a Clash YAML document into nodes, preserving proxy order.
pub fn parse(yaml: &str) -> Result<ParsedSubscription, SubsError> {
    let doc: ClashDoc = serde_yaml::from_str(yaml).map_err(|e| SubsError::parse(e.to_string()))?;
    let mut out = ParsedSubscription::default();
    for proxy in doc.proxies {
        match map_proxy(proxy) {
            Some(node) => out.nodes.push(node),
            None => out.skipped += 1,
        }
    }
    Ok(out)
}

/// Whether the body even looks like a Clash document, before committing
/// to a YAML parse.
pub fn looks_like_clash(text: &str) -> bool {
    text.lines().any(|l| {
        let t = l.trim_start();
        t.starts_with("proxies:") || t.starts_with("proxy-groups:")
    })
}

fn map_proxy(p: ClashProxy) -> Option<OutboundNode> {
    if p.name.is_empty() || p.server.is_empty() || p.port == 0 {
        debug!(name = %p.name, kind = %p.kind, "skipping incomplete proxy entry");
        return None;
    }
    let node = match p.kind.as_str() {
        "vmess" => OutboundNode::Vmess(VmessNode {
            tag: p.name.clone(),
            server: p.server.clone(),
            server_port: p.port,
            uuid: p.uuid.clone(),
            security: if p.cipher.is_empty() { "auto".into() } else { p.cipher.clone() },
            alter_id: p.alter_id,
            tls: p.tls_options(p.tls),
            transport: p.transport(),
        }),
        "vless" => OutboundNode::Vless(VlessNode {
            tag: p.name.clone(),
            server: p.server.clone(),
            server_port: p.port,
            uuid: p.uuid.clone(),
            flow: non_empty(&p.flow),
            tls: p.tls_options(p.tls || p.reality_opts.is_some()),
            transport: p.transport(),
        }),
        "ss" => OutboundNode::Shadowsocks(ShadowsocksNode {
            tag: p.name.clone(),
            server: p.server.clone(),
            server_port: p.port,
            method: p.cipher.clone(),
            password: p.password.clone(),
        }),
        "trojan" => OutboundNode::Trojan(TrojanNode {
            tag: p.name.clone(),
            server: p.server.clone(),
            server_port: p.port,
            password: p.password.clone(),
            tls: p.tls_options(true),
            transport: p.transport(),
        }),
        "tuic" => OutboundNode::Tuic(TuicNode {
            tag: p.name.clone(),
            server: p.server.clone(),
            server_port: p.port,
            uuid: p.uuid.clone(),
            password: non_empty(&p.password),
            congestion_control: non_empty(&p.congestion_controller),
            tls: p.tls_options(true),
        }),
        "hysteria2" => OutboundNode::Hysteria2(Hysteria2Node {
            tag: p.name.clone(),
            server: p.server.clone(),
            server_port: p.port,
            password: p.password.clone(),
            obfs: match (non_empty(&p.obfs), non_empty(&p.obfs_password)) {
                (Some(kind), Some(password)) => Some(ObfsOptions { kind, password }),
                _ => None,
            },
            tls: p.tls_options(true),
        }),
        other => {
            debug!(name = %p.name, kind = %other, "unsupported proxy type");
            return None;
        }
    };
    Some(node)
}

impl ClashProxy {
    fn tls_options(&self, enabled: bool) -> Option<TlsOptions> {
        if !enabled {
            return None;
        }
        let reality = self.reality_opts.as_ref().map(|r| RealityOptions {
            enabled: true,
            public_key: r.public_key.clone(),
            short_id: non_empty(&r.short_id),
        });
        Some(TlsOptions {
            enabled: true,
            server_name: non_empty(&self.servername).or_else(|| non_empty(&self.sni)),
            alpn: self.alpn.clone(),
            insecure: self.skip_cert_verify,
            reality,
            utls: non_empty(&self.client_fingerprint).map(|fingerprint| UtlsOptions {
                enabled: true,
                fingerprint,
            }),
        })
    }

    fn transport(&self) -> Option<Transport> {
        let path = self.ws_opts.as_ref().and_then(|w| non_empty(&w.path));
        let host = self
            .ws_opts
            .as_ref()
            .and_then(|w| w.headers.get("Host").cloned());
        let service = self.grpc_opts.as_ref().and_then(|g| non_empty(&g.service_name));
        Transport::from_network(&self.network, path, host, service)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
port: 7890
proxies:
  - name: "hk-vmess"
    type: vmess
    server: 1.2.3.4
    port: 443
    uuid: uuid-1
    alterId: 0
    cipher: auto
    tls: true
    servername: cdn.example.com
    network: ws
    ws-opts:
      path: /sub
      headers:
        Host: cdn.example.com
  - name: "jp-ss"
    type: ss
    server: 5.6.7.8
    port: 8388
    cipher: aes-256-gcm
    password: secret
  - name: "weird"
    type: snell
    server: 9.9.9.9
    port: 1
proxy-groups: []
rules: []
"#;

    #[test]
    fn maps_supported_and_counts_unsupported() {
        let parsed = parse(DOC).unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.nodes[0].tag(), "hk-vmess");
        assert_eq!(parsed.nodes[1].protocol(), "shadowsocks");
    }

    #[test]
    fn vmess_ws_options_survive_mapping() {
        let parsed = parse(DOC).unwrap();
        let OutboundNode::Vmess(n) = &parsed.nodes[0] else { panic!("wrong variant") };
        assert!(n.tls.as_ref().unwrap().enabled);
        match n.transport.as_ref().unwrap() {
            Transport::Ws { path, headers } => {
                assert_eq!(path.as_deref(), Some("/sub"));
                assert_eq!(headers.as_ref().unwrap()["Host"], "cdn.example.com");
            }
            other => panic!("wrong transport: {other:?}"),
        }
    }

    #[test]
    fn detection_heuristic() {
        assert!(looks_like_clash(DOC));
        assert!(!looks_like_clash("vmess://abc\nss://def"));
    }
}
