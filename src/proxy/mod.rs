//! Proxy subscriptions: canonical model, parsing, stages and producers.
//!
//! The canonical record follows the Clash proxy vocabulary, so a Clash
//! document round-trips through the model without renaming.

pub mod flag;
pub mod parser;
pub mod preprocess;
pub mod producer;
pub mod stages;

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::producer::Capable;
use crate::{Error, Platform, Result};

pub use parser::{parse, ClashRecordParser, ProxyParser, ShadowsocksLinkParser};
pub use preprocess::preprocess;
pub use producer::produce;
pub use stages::ProxyStage;

/// A proxy node in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proxy {
    /// Display name; not required to be unique
    pub name: String,
    /// Server host
    pub server: String,
    /// Server port
    #[serde(deserialize_with = "de_port")]
    pub port: u16,
    /// Protocol tag and protocol-specific attributes
    #[serde(flatten)]
    pub kind: ProxyKind,
    /// TLS enabled
    #[serde(default)]
    pub tls: bool,
    /// TLS server name
    #[serde(default, alias = "servername", skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    /// Skip certificate verification
    #[serde(rename = "skip-cert-verify", default, skip_serializing_if = "Option::is_none")]
    pub skip_cert_verify: Option<bool>,
    /// TCP fast open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfo: Option<bool>,
    /// UDP relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<bool>,
    /// Per-platform capability map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported: Option<BTreeMap<String, bool>>,
}

/// Protocol-specific part of a proxy, tagged by `type`.
///
/// Types without a dedicated struct are kept verbatim in [`ProxyKind::Other`]
/// so a Clash document can be re-emitted without losing nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyKind {
    Shadowsocks(Shadowsocks),
    ShadowsocksR(ShadowsocksR),
    Vmess(Vmess),
    Trojan(Trojan),
    Http(Http),
    Other { kind: String, fields: Map<String, Value> },
}

impl ProxyKind {
    /// The `type` tag of this kind.
    pub fn type_name(&self) -> &str {
        match self {
            ProxyKind::Shadowsocks(_) => "ss",
            ProxyKind::ShadowsocksR(_) => "ssr",
            ProxyKind::Vmess(_) => "vmess",
            ProxyKind::Trojan(_) => "trojan",
            ProxyKind::Http(_) => "http",
            ProxyKind::Other { kind, .. } => kind,
        }
    }
}

impl Serialize for ProxyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = match self {
            ProxyKind::Shadowsocks(ss) => serde_json::to_value(ss),
            ProxyKind::ShadowsocksR(ssr) => serde_json::to_value(ssr),
            ProxyKind::Vmess(vmess) => serde_json::to_value(vmess),
            ProxyKind::Trojan(trojan) => serde_json::to_value(trojan),
            ProxyKind::Http(http) => serde_json::to_value(http),
            ProxyKind::Other { fields, .. } => Ok(Value::Object(fields.clone())),
        }
        .map_err(<S::Error as serde::ser::Error>::custom)?;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.type_name())?;
        if let Value::Object(fields) = fields {
            for (key, value) in &fields {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProxyKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(serde::de::Error::custom(format!("invalid proxy type: {}", other)))
            }
            None => return Err(serde::de::Error::missing_field("type")),
        };

        let parsed = match kind.as_str() {
            "ss" => serde_json::from_value(Value::Object(fields)).map(ProxyKind::Shadowsocks),
            "ssr" => serde_json::from_value(Value::Object(fields)).map(ProxyKind::ShadowsocksR),
            "vmess" => serde_json::from_value(Value::Object(fields)).map(ProxyKind::Vmess),
            "trojan" => serde_json::from_value(Value::Object(fields)).map(ProxyKind::Trojan),
            "http" => serde_json::from_value(Value::Object(fields)).map(ProxyKind::Http),
            _ => return Ok(ProxyKind::Other { kind, fields }),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadowsocks {
    pub cipher: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(rename = "plugin-opts", default, skip_serializing_if = "Option::is_none")]
    pub plugin_opts: Option<PluginOpts>,
    /// Attributes without a typed field, re-emitted as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options of a shadowsocks plugin (obfs or v2ray-plugin).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tls: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowsocksR {
    pub cipher: String,
    pub password: String,
    pub protocol: String,
    #[serde(rename = "protocol-param", default, skip_serializing_if = "Option::is_none")]
    pub protocol_param: Option<String>,
    pub obfs: String,
    #[serde(rename = "obfs-param", default, skip_serializing_if = "Option::is_none")]
    pub obfs_param: Option<String>,
    /// Attributes without a typed field, re-emitted as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vmess {
    pub uuid: String,
    #[serde(default = "default_vmess_cipher")]
    pub cipher: String,
    #[serde(rename = "alterId", default)]
    pub alter_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(rename = "ws-path", default, skip_serializing_if = "Option::is_none")]
    pub ws_path: Option<String>,
    #[serde(rename = "ws-headers", default, skip_serializing_if = "Option::is_none")]
    pub ws_headers: Option<BTreeMap<String, String>>,
    #[serde(rename = "ws-opts", default, skip_serializing_if = "Option::is_none")]
    pub ws_opts: Option<WsOpts>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Websocket transport options in the nested `ws-opts` form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WsOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn host_header(headers: Option<&BTreeMap<String, String>>) -> Option<&str> {
    headers
        .and_then(|h| h.get("Host").or_else(|| h.get("host")))
        .map(String::as_str)
}

impl Vmess {
    /// Websocket path; `ws-opts` wins over the flat `ws-path`.
    pub fn ws_path(&self) -> Option<&str> {
        self.ws_opts
            .as_ref()
            .and_then(|o| o.path.as_deref())
            .or(self.ws_path.as_deref())
    }

    /// The `Host` websocket header, if any.
    pub fn ws_host(&self) -> Option<&str> {
        host_header(self.ws_opts.as_ref().and_then(|o| o.headers.as_ref()))
            .or_else(|| host_header(self.ws_headers.as_ref()))
    }
}

fn default_vmess_cipher() -> String {
    "auto".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trojan {
    pub password: String,
    /// Attributes without a typed field, re-emitted as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Http {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Attributes without a typed field, re-emitted as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Proxy {
    /// Create a proxy with default transport flags.
    pub fn new(name: impl Into<String>, server: impl Into<String>, port: u16, kind: ProxyKind) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            port,
            kind,
            tls: false,
            sni: None,
            skip_cert_verify: None,
            tfo: None,
            udp: None,
            supported: None,
        }
    }

    /// The `type` tag of this proxy.
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// Force one named attribute to `value`.
    ///
    /// Keys without a typed field are stored as extra attributes. Fails,
    /// leaving the proxy untouched, when the value does not fit a typed
    /// attribute.
    pub fn set_property(&mut self, key: &str, value: Value) -> Result<()> {
        let mut raw = serde_json::to_value(&*self)?;
        let object = raw
            .as_object_mut()
            .ok_or_else(|| Error::InvalidProperty(key.to_string()))?;
        object.insert(key.to_string(), value.clone());

        let updated: Proxy = serde_json::from_value(raw)?;
        let stored = serde_json::to_value(&updated)?
            .get(key)
            .cloned()
            .unwrap_or(Value::Null);
        if stored != value {
            return Err(Error::InvalidProperty(key.to_string()));
        }

        *self = updated;
        Ok(())
    }
}

impl Capable for Proxy {
    fn supports(&self, platform: Platform) -> bool {
        self.supported
            .as_ref()
            .and_then(|s| s.get(platform.as_str()))
            .copied()
            .unwrap_or(true)
    }
}

/// Accept ports written as numbers or strings.
fn de_port<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn ss(name: &str) -> Proxy {
        Proxy::new(
            name,
            "1.2.3.4",
            8388,
            ProxyKind::Shadowsocks(Shadowsocks {
                cipher: "aes-128-gcm".to_string(),
                password: "pass".to_string(),
                plugin: None,
                plugin_opts: None,
                extra: Map::new(),
            }),
        )
    }

    pub(crate) fn trojan(name: &str) -> Proxy {
        Proxy::new(
            name,
            "example.com",
            443,
            ProxyKind::Trojan(Trojan {
                password: "secret".to_string(),
                extra: Map::new(),
            }),
        )
    }

    #[test]
    fn test_deserialize_clash_record() {
        let proxy: Proxy = serde_json::from_value(json!({
            "name": "HK 01",
            "type": "vmess",
            "server": "hk.example.com",
            "port": "443",
            "uuid": "b831381d-6324-4d53-ad4f-8cda48b30811",
            "alterId": 0,
            "cipher": "auto",
            "tls": true,
            "servername": "hk.example.com",
            "network": "ws",
            "ws-path": "/ray",
            "ws-headers": {"Host": "cdn.example.com"}
        }))
        .unwrap();

        assert_eq!(proxy.port, 443);
        assert!(proxy.tls);
        assert_eq!(proxy.sni.as_deref(), Some("hk.example.com"));
        let ProxyKind::Vmess(vmess) = &proxy.kind else {
            panic!("expected vmess");
        };
        assert_eq!(vmess.ws_host(), Some("cdn.example.com"));
        assert_eq!(proxy.type_name(), "vmess");
    }

    #[test]
    fn test_serialize_keeps_clash_names() {
        let mut proxy = ss("a");
        proxy.skip_cert_verify = Some(true);
        let value = serde_json::to_value(&proxy).unwrap();
        assert_eq!(value["type"], "ss");
        assert_eq!(value["skip-cert-verify"], true);
        assert_eq!(value["cipher"], "aes-128-gcm");
        assert!(value.get("supported").is_none());
    }

    #[test]
    fn test_set_property() {
        let mut proxy = ss("a");
        proxy.set_property("skip-cert-verify", json!(true)).unwrap();
        assert_eq!(proxy.skip_cert_verify, Some(true));

        proxy.set_property("udp", json!(false)).unwrap();
        assert_eq!(proxy.udp, Some(false));

        proxy.set_property("tls", json!(false)).unwrap();
        assert!(!proxy.tls);

        proxy.set_property("cipher", json!("chacha20-ietf-poly1305")).unwrap();
        let ProxyKind::Shadowsocks(ss) = &proxy.kind else {
            panic!("expected ss");
        };
        assert_eq!(ss.cipher, "chacha20-ietf-poly1305");
    }

    #[test]
    fn test_set_untyped_property() {
        let mut proxy = trojan("a");
        proxy.set_property("cipher", json!("none")).unwrap();
        let ProxyKind::Trojan(trojan) = &proxy.kind else {
            panic!("expected trojan");
        };
        assert_eq!(trojan.extra.get("cipher"), Some(&json!("none")));
        assert_eq!(serde_json::to_value(&proxy).unwrap()["cipher"], "none");
    }

    #[test]
    fn test_set_mistyped_property_fails() {
        let mut proxy = ss("a");
        assert!(proxy.set_property("port", json!("not a port")).is_err());
        assert!(proxy.set_property("udp", json!("yes")).is_err());
        assert_eq!(proxy, ss("a"));
    }

    #[test]
    fn test_ws_opts_and_unknown_fields_survive() {
        let record = json!({
            "name": "JP ws",
            "type": "vmess",
            "server": "jp.example.com",
            "port": 443,
            "uuid": "u",
            "network": "ws",
            "tls": true,
            "client-fingerprint": "chrome",
            "ws-opts": {"path": "/ray", "headers": {"Host": "cdn.example.com"}, "max-early-data": 2048}
        });
        let proxy: Proxy = serde_json::from_value(record.clone()).unwrap();
        let ProxyKind::Vmess(vmess) = &proxy.kind else {
            panic!("expected vmess");
        };
        assert_eq!(vmess.ws_path(), Some("/ray"));
        assert_eq!(vmess.ws_host(), Some("cdn.example.com"));

        let value = serde_json::to_value(&proxy).unwrap();
        assert_eq!(value["client-fingerprint"], "chrome");
        assert_eq!(value["ws-opts"], record["ws-opts"]);
    }

    #[test]
    fn test_unknown_type_is_kept_verbatim() {
        let record = json!({
            "name": "socks",
            "type": "socks5",
            "server": "s.example.com",
            "port": 1080,
            "username": "u",
            "password": "p"
        });
        let proxy: Proxy = serde_json::from_value(record).unwrap();
        assert_eq!(proxy.type_name(), "socks5");
        let ProxyKind::Other { fields, .. } = &proxy.kind else {
            panic!("expected other");
        };
        assert_eq!(fields.get("username"), Some(&json!("u")));

        let value = serde_json::to_value(&proxy).unwrap();
        assert_eq!(value["type"], "socks5");
        assert_eq!(value["password"], "p");
        assert_eq!(value["port"], 1080);
    }

    #[test]
    fn test_missing_type_fails() {
        let result: serde_json::Result<Proxy> =
            serde_json::from_value(json!({"name": "a", "server": "b", "port": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_capability_map() {
        let mut proxy = ss("a");
        assert!(proxy.supports(Platform::Surge));

        proxy.supported = Some(BTreeMap::from([("Surge".to_string(), false)]));
        assert!(!proxy.supports(Platform::Surge));
        assert!(proxy.supports(Platform::Qx));
    }
}
