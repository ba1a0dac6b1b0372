//! Proxy-link decoder
//! 代理分享链接解码
//!
//! Each scheme has its own field layout: vmess carries a base64 JSON
//! body, the others are URL-shaped with query parameters, and ss hides
//! base64 in either the userinfo or the whole body. The schemes are
//! decoded by dedicated functions rather than one generic URL parser.

use std::collections::HashMap;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::Value;

use sbm_config::outbound::{
    Hysteria2Node, ObfsOptions, RealityOptions, ShadowsocksNode, TlsOptions, TrojanNode,
    UtlsOptions, VlessNode, VmessNode,
};
use sbm_config::{OutboundNode, Transport};

use crate::model::SubsError;

/// Decode one scheme-prefixed proxy link into a node.
pub fn decode_link(link: &str) -> Result<OutboundNode, SubsError> {
    let link = link.trim();
    if let Some(body) = link.strip_prefix("vmess://") {
        decode_vmess(body)
    } else if let Some(body) = link.strip_prefix("vless://") {
        decode_vless(body)
    } else if let Some(body) = link.strip_prefix("trojan://") {
        decode_trojan(body)
    } else if let Some(body) = link.strip_prefix("ss://") {
        decode_shadowsocks(body)
    } else if let Some(body) = link.strip_prefix("hysteria2://").or_else(|| link.strip_prefix("hy2://")) {
        decode_hysteria2(body)
    } else {
        let scheme = link.split("://").next().unwrap_or(link);
        Err(SubsError::Scheme(scheme.chars().take(24).collect()))
    }
}

/// Whether a line looks like a link this decoder understands.
pub fn is_supported_link(line: &str) -> bool {
    ["vmess://", "vless://", "trojan://", "ss://", "hysteria2://", "hy2://"]
        .iter()
        .any(|s| line.starts_with(s))
}

// ---------------------------------------------------------------- vmess

/// vmess share body: base64 of a flat JSON object. Numeric fields appear
/// both quoted and bare in the wild, hence `Value` and the coercers.
#[derive(Debug, Default, Deserialize)]
struct VmessBody {
    #[serde(default)]
    ps: String,
    #[serde(default)]
    add: String,
    #[serde(default)]
    port: Value,
    #[serde(default)]
    id: String,
    #[serde(default)]
    aid: Value,
    #[serde(default)]
    scy: String,
    #[serde(default)]
    net: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    tls: String,
    #[serde(default)]
    sni: String,
    #[serde(default)]
    alpn: String,
    #[serde(default)]
    fp: String,
}

fn decode_vmess(body: &str) -> Result<OutboundNode, SubsError> {
    let raw = base64_any(body)?;
    let text = String::from_utf8(raw).map_err(|_| SubsError::decode("vmess body is not UTF-8"))?;
    let b: VmessBody =
        serde_json::from_str(&text).map_err(|e| SubsError::decode(format!("vmess body: {e}")))?;

    if b.add.is_empty() {
        return Err(SubsError::decode("vmess link missing server"));
    }
    let port = coerce_u16(&b.port)
        .filter(|p| *p > 0)
        .ok_or_else(|| SubsError::decode("vmess link missing port"))?;
    let tag = if b.ps.trim().is_empty() {
        format!("{}:{port}", b.add)
    } else {
        b.ps.trim().to_string()
    };

    let tls = if b.tls.eq_ignore_ascii_case("tls") {
        let server_name = non_empty(&b.sni).or_else(|| non_empty(&b.host));
        Some(TlsOptions {
            enabled: true,
            server_name,
            alpn: split_alpn(&b.alpn),
            utls: utls(&b.fp),
            ..Default::default()
        })
    } else {
        None
    };
    let transport = Transport::from_network(&b.net, non_empty(&b.path), non_empty(&b.host), None);

    Ok(OutboundNode::Vmess(VmessNode {
        tag,
        server: b.add,
        server_port: port,
        uuid: b.id,
        security: if b.scy.is_empty() { "auto".into() } else { b.scy },
        alter_id: coerce_u16(&b.aid).unwrap_or(0),
        tls,
        transport,
    }))
}

fn coerce_u16(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => u16::try_from(n.as_u64()?).ok(),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }
}

// ------------------------------------------------------------- URL form

/// Pieces of a `scheme://userinfo@host:port?query#fragment` link,
/// percent-decoded where the share format expects it.
struct UrlParts {
    userinfo: String,
    host: String,
    port: u16,
    params: HashMap<String, String>,
    fragment: String,
}

fn split_url(scheme: &str, body: &str) -> Result<UrlParts, SubsError> {
    let (body, fragment) = match body.split_once('#') {
        Some((b, f)) => (b, pct(f)),
        None => (body, String::new()),
    };
    let (body, query) = match body.split_once('?') {
        Some((b, q)) => (b, q),
        None => (body, ""),
    };
    let (userinfo, authority) = match body.rsplit_once('@') {
        Some((u, a)) => (pct(u), a),
        None => (String::new(), body),
    };

    // IPv6 literals keep their brackets in share links.
    let (host, port_str) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| SubsError::decode(format!("{scheme} link: unclosed IPv6 literal")))?;
        (host.to_string(), tail.strip_prefix(':').unwrap_or(""))
    } else {
        match authority.rsplit_once(':') {
            Some((h, p)) => (h.to_string(), p),
            None => (authority.to_string(), ""),
        }
    };
    if host.is_empty() {
        return Err(SubsError::decode(format!("{scheme} link missing server")));
    }
    let port = port_str
        .parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| SubsError::decode(format!("{scheme} link missing port")))?;

    let mut params = HashMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(k.to_string(), pct(v));
    }

    Ok(UrlParts {
        userinfo,
        host,
        port,
        params,
        fragment,
    })
}

fn pct(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

impl UrlParts {
    fn tag(&self) -> String {
        if self.fragment.trim().is_empty() {
            format!("{}:{}", self.host, self.port)
        } else {
            self.fragment.trim().to_string()
        }
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// TLS block from `security`/`sni`/`alpn`/`insecure`/`pbk`/`sid`/`fp`.
    /// `force` covers schemes that are TLS-carried unless opted out.
    fn tls(&self, force: bool) -> Option<TlsOptions> {
        let security = self.param("security").unwrap_or("");
        let enabled = match security {
            "tls" | "reality" => true,
            "none" => false,
            _ => force,
        };
        if !enabled {
            return None;
        }
        let reality = match (security, self.param("pbk")) {
            ("reality", Some(pbk)) => Some(RealityOptions {
                enabled: true,
                public_key: pbk.to_string(),
                short_id: self.param("sid").map(str::to_string),
            }),
            _ => None,
        };
        Some(TlsOptions {
            enabled: true,
            server_name: self.param("sni").map(str::to_string),
            alpn: split_alpn(self.param("alpn").unwrap_or("")),
            insecure: matches!(self.param("insecure"), Some("1") | Some("true")),
            reality,
            utls: utls(self.param("fp").unwrap_or("")),
        })
    }

    /// Transport block from `type`/`path`/`host`/`serviceName`.
    fn transport(&self) -> Option<Transport> {
        Transport::from_network(
            self.param("type").unwrap_or(""),
            self.param("path").map(str::to_string),
            self.param("host").map(str::to_string),
            self.param("serviceName").map(str::to_string),
        )
    }
}

fn decode_vless(body: &str) -> Result<OutboundNode, SubsError> {
    let url = split_url("vless", body)?;
    if url.userinfo.is_empty() {
        return Err(SubsError::decode("vless link missing uuid"));
    }
    Ok(OutboundNode::Vless(VlessNode {
        tag: url.tag(),
        server: url.host.clone(),
        server_port: url.port,
        uuid: url.userinfo.clone(),
        flow: url.param("flow").map(str::to_string),
        tls: url.tls(false),
        transport: url.transport(),
    }))
}

fn decode_trojan(body: &str) -> Result<OutboundNode, SubsError> {
    let url = split_url("trojan", body)?;
    if url.userinfo.is_empty() {
        return Err(SubsError::decode("trojan link missing password"));
    }
    Ok(OutboundNode::Trojan(TrojanNode {
        tag: url.tag(),
        server: url.host.clone(),
        server_port: url.port,
        password: url.userinfo.clone(),
        // trojan rides TLS unless the link opts out explicitly
        tls: url.tls(true),
        transport: url.transport(),
    }))
}

fn decode_hysteria2(body: &str) -> Result<OutboundNode, SubsError> {
    let url = split_url("hysteria2", body)?;
    if url.userinfo.is_empty() {
        return Err(SubsError::decode("hysteria2 link missing password"));
    }
    let obfs = match (url.param("obfs"), url.param("obfs-password")) {
        (Some(kind), Some(pw)) => Some(ObfsOptions {
            kind: kind.to_string(),
            password: pw.to_string(),
        }),
        _ => None,
    };
    Ok(OutboundNode::Hysteria2(Hysteria2Node {
        tag: url.tag(),
        server: url.host.clone(),
        server_port: url.port,
        password: url.userinfo.clone(),
        obfs,
        tls: url.tls(true),
    }))
}

// -------------------------------------------------------------------- ss

/// Two layouts circulate: `ss://base64(method:password)@host:port#tag`
/// and the legacy `ss://base64(method:password@host:port)#tag`. Plugin
/// query parameters are ignored.
fn decode_shadowsocks(body: &str) -> Result<OutboundNode, SubsError> {
    let (body, fragment) = match body.split_once('#') {
        Some((b, f)) => (b, pct(f)),
        None => (body, String::new()),
    };
    let body = body.split_once('?').map_or(body, |(b, _)| b);

    let (method, password, host, port) = if body.contains('@') {
        let url = split_url("ss", body)?;
        let (method, password) = split_credentials(&url.userinfo)?;
        (method, password, url.host, url.port)
    } else {
        let raw = base64_any(body)?;
        let text =
            String::from_utf8(raw).map_err(|_| SubsError::decode("ss body is not UTF-8"))?;
        let (creds, authority) = text
            .rsplit_once('@')
            .ok_or_else(|| SubsError::decode("ss link missing server"))?;
        let (method, password) = split_credentials(creds)?;
        let (host, port_str) = authority
            .rsplit_once(':')
            .ok_or_else(|| SubsError::decode("ss link missing port"))?;
        let port = port_str
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| SubsError::decode("ss link missing port"))?;
        (method, password, host.to_string(), port)
    };

    let tag = if fragment.trim().is_empty() {
        format!("{host}:{port}")
    } else {
        fragment.trim().to_string()
    };
    Ok(OutboundNode::Shadowsocks(ShadowsocksNode {
        tag,
        server: host,
        server_port: port,
        method,
        password,
    }))
}

/// `method:password`, either plain (possibly percent-encoded, already
/// decoded by the caller) or base64-wrapped.
fn split_credentials(userinfo: &str) -> Result<(String, String), SubsError> {
    let text = match base64_any(userinfo) {
        Ok(raw) => String::from_utf8(raw).unwrap_or_else(|_| userinfo.to_string()),
        Err(_) => userinfo.to_string(),
    };
    let (method, password) = text
        .split_once(':')
        .ok_or_else(|| SubsError::decode("ss link missing method"))?;
    if method.is_empty() {
        return Err(SubsError::decode("ss link missing method"));
    }
    Ok((method.to_string(), password.to_string()))
}

// ---------------------------------------------------------------- shared

/// Share links mix standard/URL-safe alphabets and padded/unpadded
/// bodies; try all four engines before giving up.
pub(crate) fn base64_any(s: &str) -> Result<Vec<u8>, SubsError> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    for engine in [&STANDARD, &URL_SAFE, &STANDARD_NO_PAD, &URL_SAFE_NO_PAD] {
        if let Ok(raw) = engine.decode(&s) {
            return Ok(raw);
        }
    }
    Err(SubsError::decode("not valid base64"))
}

fn split_alpn(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn utls(fp: &str) -> Option<UtlsOptions> {
    non_empty(fp).map(|fingerprint| UtlsOptions {
        enabled: true,
        fingerprint,
    })
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        STANDARD.encode(s)
    }

    #[test]
    fn vmess_base64_json_body() {
        let body = r#"{"v":"2","ps":"n1","add":"1.2.3.4","port":"443","id":"uuid-1","aid":"0","net":"ws","path":"/sub","host":"cdn.example.com","tls":"tls","sni":"sni.example.com"}"#;
        let node = decode_link(&format!("vmess://{}", b64(body))).unwrap();
        let OutboundNode::Vmess(n) = node else { panic!("wrong variant") };
        assert_eq!(n.tag, "n1");
        assert_eq!(n.server, "1.2.3.4");
        assert_eq!(n.server_port, 443);
        assert_eq!(n.uuid, "uuid-1");
        assert_eq!(n.security, "auto");
        let tls = n.tls.unwrap();
        assert!(tls.enabled);
        assert_eq!(tls.server_name.as_deref(), Some("sni.example.com"));
        match n.transport.unwrap() {
            Transport::Ws { path, headers } => {
                assert_eq!(path.as_deref(), Some("/sub"));
                assert_eq!(headers.unwrap()["Host"], "cdn.example.com");
            }
            other => panic!("wrong transport: {other:?}"),
        }
    }

    #[test]
    fn vmess_numeric_port_and_blank_name() {
        let body = r#"{"add":"h.example.com","port":8443,"id":"u","aid":0}"#;
        let node = decode_link(&format!("vmess://{}", b64(body))).unwrap();
        assert_eq!(node.tag(), "h.example.com:8443");
        assert_eq!(node.port(), 8443);
    }

    #[test]
    fn vmess_rejects_garbage_body() {
        assert!(matches!(decode_link("vmess://%%%"), Err(SubsError::Decode(_))));
        assert!(matches!(
            decode_link(&format!("vmess://{}", b64("not json"))),
            Err(SubsError::Decode(_))
        ));
    }

    #[test]
    fn vless_reality_link() {
        let node = decode_link(
            "vless://uuid-2@example.com:443?security=reality&pbk=PUBKEY&sid=0123&fp=chrome&flow=xtls-rprx-vision&type=grpc&serviceName=svc#US%201",
        )
        .unwrap();
        let OutboundNode::Vless(n) = node else { panic!("wrong variant") };
        assert_eq!(n.tag, "US 1");
        assert_eq!(n.flow.as_deref(), Some("xtls-rprx-vision"));
        let tls = n.tls.unwrap();
        let reality = tls.reality.unwrap();
        assert_eq!(reality.public_key, "PUBKEY");
        assert_eq!(reality.short_id.as_deref(), Some("0123"));
        assert_eq!(tls.utls.unwrap().fingerprint, "chrome");
        assert!(matches!(n.transport, Some(Transport::Grpc { .. })));
    }

    #[test]
    fn trojan_defaults_to_tls_and_reads_insecure() {
        let node = decode_link("trojan://pw@[2001:db8::1]:8443?insecure=1&sni=t.example.com#hk").unwrap();
        let OutboundNode::Trojan(n) = node else { panic!("wrong variant") };
        assert_eq!(n.server, "2001:db8::1");
        assert_eq!(n.server_port, 8443);
        assert_eq!(n.password, "pw");
        let tls = n.tls.unwrap();
        assert!(tls.enabled && tls.insecure);
        assert_eq!(tls.server_name.as_deref(), Some("t.example.com"));
    }

    #[test]
    fn trojan_security_none_drops_tls() {
        let node = decode_link("trojan://pw@h:443?security=none").unwrap();
        let OutboundNode::Trojan(n) = node else { panic!("wrong variant") };
        assert!(n.tls.is_none());
    }

    #[test]
    fn ss_userinfo_form() {
        let link = format!("ss://{}@ss.example.com:8388#jp", b64("aes-256-gcm:secret"));
        let OutboundNode::Shadowsocks(n) = decode_link(&link).unwrap() else {
            panic!("wrong variant")
        };
        assert_eq!(n.method, "aes-256-gcm");
        assert_eq!(n.password, "secret");
        assert_eq!(n.tag, "jp");
    }

    #[test]
    fn ss_whole_body_form() {
        let link = format!("ss://{}", b64("chacha20-ietf-poly1305:pw@1.2.3.4:8388"));
        let OutboundNode::Shadowsocks(n) = decode_link(&link).unwrap() else {
            panic!("wrong variant")
        };
        assert_eq!(n.server, "1.2.3.4");
        assert_eq!(n.server_port, 8388);
        assert_eq!(n.tag, "1.2.3.4:8388");
    }

    #[test]
    fn hysteria2_obfs_and_alias() {
        let node = decode_link(
            "hysteria2://pw@hy.example.com:443?obfs=salamander&obfs-password=op&sni=hy.example.com#hy",
        )
        .unwrap();
        let OutboundNode::Hysteria2(n) = node else { panic!("wrong variant") };
        let obfs = n.obfs.unwrap();
        assert_eq!(obfs.kind, "salamander");
        assert_eq!(obfs.password, "op");
        assert!(n.tls.unwrap().enabled);

        assert!(decode_link("hy2://pw@h:443").is_ok());
    }

    #[test]
    fn unknown_scheme_and_missing_port_fail() {
        assert!(matches!(decode_link("socks5://x@h:1"), Err(SubsError::Scheme(_))));
        assert!(decode_link("vless://u@example.com").is_err());
        assert!(decode_link("trojan://pw@h:0").is_err());
    }
}
