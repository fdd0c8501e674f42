//! Line parsers producing canonical proxies.
//!
//! Raw text is pre-processed into one record per line, then each line is
//! offered to an ordered list of [`ProxyParser`]s. A line no parser accepts,
//! or one its parser rejects, is logged and skipped.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use serde_json::Map;

use super::preprocess::{decode_base64, preprocess};
use super::{PluginOpts, Proxy, ProxyKind, Shadowsocks};
use crate::{Error, Result};

/// Parser for one line-level proxy format.
pub trait ProxyParser {
    /// Display name used in log lines.
    fn name(&self) -> &str;

    /// Whether this parser handles `line`.
    fn test(&self, line: &str) -> bool;

    /// Parse `line` into a proxy.
    fn parse(&self, line: &str) -> Result<Proxy>;
}

/// One JSON object per line in the Clash proxy schema.
pub struct ClashRecordParser;

impl ProxyParser for ClashRecordParser {
    fn name(&self) -> &str {
        "Clash Record Parser"
    }

    fn test(&self, line: &str) -> bool {
        line.starts_with('{')
    }

    fn parse(&self, line: &str) -> Result<Proxy> {
        Ok(serde_json::from_str(line)?)
    }
}

/// SIP002 `ss://` links, including the legacy fully-encoded form.
pub struct ShadowsocksLinkParser;

impl ProxyParser for ShadowsocksLinkParser {
    fn name(&self) -> &str {
        "Shadowsocks Link Parser"
    }

    fn test(&self, line: &str) -> bool {
        line.starts_with("ss://")
    }

    fn parse(&self, line: &str) -> Result<Proxy> {
        let invalid = || Error::InvalidLink(line.to_string());
        let rest = line.strip_prefix("ss://").ok_or_else(invalid)?;

        let (body, tag) = match rest.split_once('#') {
            Some((body, tag)) => (body, Some(percent_decode(tag))),
            None => (rest, None),
        };
        let (body, query) = match body.split_once('?') {
            Some((body, query)) => (body.trim_end_matches('/'), Some(query)),
            None => (body.trim_end_matches('/'), None),
        };

        let (userinfo, host_port) = match body.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                let decoded = decode_base64(userinfo)
                    .ok()
                    .filter(|d| d.contains(':'))
                    .unwrap_or_else(|| percent_decode(userinfo));
                (decoded, host_port.to_string())
            }
            None => {
                let decoded = decode_base64(body)?;
                let (userinfo, host_port) = decoded.rsplit_once('@').ok_or_else(invalid)?;
                (userinfo.to_string(), host_port.to_string())
            }
        };

        let (cipher, password) = userinfo.split_once(':').ok_or_else(invalid)?;
        let (server, port) = split_host_port(&host_port).ok_or_else(invalid)?;

        let (plugin, plugin_opts) = match query.and_then(|q| query_param(q, "plugin")) {
            Some(plugin_arg) => parse_plugin(&plugin_arg),
            None => (None, None),
        };

        let name = tag.unwrap_or_else(|| format!("{}:{}", server, port));
        Ok(Proxy::new(
            name,
            server,
            port,
            ProxyKind::Shadowsocks(Shadowsocks {
                cipher: cipher.to_string(),
                password: password.to_string(),
                plugin,
                plugin_opts,
                extra: Map::new(),
            }),
        ))
    }
}

fn percent_decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn split_host_port(s: &str) -> Option<(String, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| percent_decode(&v.replace('+', " ")))
    })
}

/// Parse a SIP003 plugin argument such as `obfs-local;obfs=http;obfs-host=a.com`.
fn parse_plugin(plugin_arg: &str) -> (Option<String>, Option<PluginOpts>) {
    let mut parts = plugin_arg.split(';');
    let name = parts.next().unwrap_or_default().trim();
    let mut options: HashMap<&str, &str> = HashMap::new();
    let mut tls = false;
    for part in parts {
        match part.split_once('=') {
            Some((k, v)) => {
                options.insert(k.trim(), v.trim());
            }
            None if part.trim() == "tls" => tls = true,
            None => {}
        }
    }

    match name {
        "obfs-local" | "simple-obfs" | "obfs" => (
            Some("obfs".to_string()),
            Some(PluginOpts {
                mode: options.get("obfs").map(|s| s.to_string()),
                host: options.get("obfs-host").map(|s| s.to_string()),
                ..Default::default()
            }),
        ),
        "v2ray-plugin" => (
            Some("v2ray-plugin".to_string()),
            Some(PluginOpts {
                mode: options.get("mode").map(|s| s.to_string()),
                host: options.get("host").map(|s| s.to_string()),
                path: options.get("path").map(|s| s.to_string()),
                tls,
                ..Default::default()
            }),
        ),
        "" => (None, None),
        other => (Some(other.to_string()), None),
    }
}

/// Pre-process `raw` and parse it with the built-in parsers.
pub fn parse(raw: &str) -> Vec<Proxy> {
    let parsers: [&dyn ProxyParser; 2] = [&ClashRecordParser, &ShadowsocksLinkParser];
    parse_with(raw, &parsers)
}

/// Pre-process `raw` and parse it with `parsers`, tried in order per line.
pub fn parse_with(raw: &str, parsers: &[&dyn ProxyParser]) -> Vec<Proxy> {
    let text = preprocess(raw);
    let mut proxies = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(parser) = parsers.iter().find(|p| p.test(line)) else {
            log::warn!("No parser accepts line, skipped: {}", line);
            continue;
        };

        match parser.parse(line) {
            Ok(proxy) => proxies.push(proxy),
            Err(e) => log::warn!("[{}] failed to parse line: {}\n Reason: {}", parser.name(), line, e),
        }
    }

    proxies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::preprocess::encode_base64;

    #[test]
    fn test_parse_ss_link() {
        let link = format!("ss://{}@1.2.3.4:8388#HK%2001", encode_base64("aes-256-gcm:pw"));
        let proxy = ShadowsocksLinkParser.parse(&link).unwrap();

        assert_eq!(proxy.name, "HK 01");
        assert_eq!(proxy.server, "1.2.3.4");
        assert_eq!(proxy.port, 8388);
        let ProxyKind::Shadowsocks(ss) = &proxy.kind else {
            panic!("expected ss");
        };
        assert_eq!(ss.cipher, "aes-256-gcm");
        assert_eq!(ss.password, "pw");
        assert_eq!(ss.plugin, None);
    }

    #[test]
    fn test_parse_ss_link_with_plugin() {
        let link = format!(
            "ss://{}@a.example.com:443/?plugin=obfs-local%3Bobfs%3Dtls%3Bobfs-host%3Dcdn.com#node",
            encode_base64("chacha20-ietf-poly1305:pw")
        );
        let proxy = ShadowsocksLinkParser.parse(&link).unwrap();
        let ProxyKind::Shadowsocks(ss) = &proxy.kind else {
            panic!("expected ss");
        };
        assert_eq!(ss.plugin.as_deref(), Some("obfs"));
        let opts = ss.plugin_opts.as_ref().unwrap();
        assert_eq!(opts.mode.as_deref(), Some("tls"));
        assert_eq!(opts.host.as_deref(), Some("cdn.com"));
    }

    #[test]
    fn test_parse_legacy_ss_link() {
        let link = format!("ss://{}#legacy", encode_base64("rc4-md5:pw@[::1]:8000"));
        let proxy = ShadowsocksLinkParser.parse(&link).unwrap();
        assert_eq!(proxy.server, "::1");
        assert_eq!(proxy.port, 8000);
        assert_eq!(proxy.name, "legacy");
    }

    #[test]
    fn test_parse_plain_userinfo() {
        let proxy = ShadowsocksLinkParser
            .parse("ss://2022-blake3-aes-128-gcm:abc%3D@host.example:443#x")
            .unwrap();
        let ProxyKind::Shadowsocks(ss) = &proxy.kind else {
            panic!("expected ss");
        };
        assert_eq!(ss.cipher, "2022-blake3-aes-128-gcm");
        assert_eq!(ss.password, "abc=");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let raw = format!(
            "ss://{}@1.2.3.4:1#ok\nss://garbage\nvless://unsupported\n{{\"name\":\"x\"}}\n\n",
            encode_base64("aes-128-gcm:pw")
        );
        let proxies = parse(&raw);
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].name, "ok");
    }

    #[test]
    fn test_parse_clash_document() {
        let raw = r#"
proxies:
  - {name: "HK 01", type: ss, server: 1.1.1.1, port: 8388, cipher: aes-128-gcm, password: p, udp: true}
  - {name: "US 01", type: trojan, server: us.example.com, port: 443, password: q, sni: us.example.com}
  - {name: "bad", type: ss, port: 1, cipher: none}
"#;
        let proxies = parse(raw);
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].udp, Some(true));
        assert_eq!(proxies[1].type_name(), "trojan");
        assert_eq!(proxies[1].sni.as_deref(), Some("us.example.com"));
    }
}
