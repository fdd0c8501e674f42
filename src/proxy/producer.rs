//! Proxy producers for each target platform.

use super::{PluginOpts, Proxy, ProxyKind, Shadowsocks};
use crate::producer::{self, Producer, ProducerMode};
use crate::{Error, Platform, Result};

fn unsupported_kind(platform: Platform, proxy: &Proxy) -> Error {
    Error::UnsupportedProxy {
        platform: platform.to_string(),
        kind: proxy.type_name().to_string(),
    }
}

fn unsupported_plugin(platform: Platform, plugin: &str) -> Error {
    Error::UnsupportedPlugin {
        platform: platform.to_string(),
        plugin: plugin.to_string(),
    }
}

/// `obfs` plugin options, failing for any other plugin.
fn obfs_only<'a>(platform: Platform, ss: &'a Shadowsocks) -> Result<Option<&'a PluginOpts>> {
    match ss.plugin.as_deref() {
        None => Ok(None),
        Some("obfs") => Ok(Some(ss.plugin_opts.as_ref().ok_or_else(|| {
            unsupported_plugin(platform, "obfs without options")
        })?)),
        Some(other) => Err(unsupported_plugin(platform, other)),
    }
}

fn flag(value: Option<bool>) -> bool {
    value.unwrap_or(false)
}

/// Quantumult X `[server_local]` lines.
pub struct QxProducer;

impl QxProducer {
    fn transport(proxy: &Proxy) -> String {
        format!(
            "fast-open={},udp-relay={}",
            flag(proxy.tfo),
            flag(proxy.udp)
        )
    }

    fn tls_verification(proxy: &Proxy) -> String {
        format!("tls-verification={}", !flag(proxy.skip_cert_verify))
    }
}

impl Producer<Proxy> for QxProducer {
    fn platform(&self) -> Platform {
        Platform::Qx
    }

    fn produce_one(&self, proxy: &Proxy) -> Result<Option<String>> {
        let address = format!("{}:{}", proxy.server, proxy.port);
        let mut fields = Vec::new();

        match &proxy.kind {
            ProxyKind::Shadowsocks(ss) => {
                fields.push(format!("shadowsocks={}", address));
                fields.push(format!("method={}", ss.cipher));
                fields.push(format!("password={}", ss.password));
                let opts = ss.plugin_opts.clone().unwrap_or_default();
                match ss.plugin.as_deref() {
                    None => {}
                    Some("obfs") => {
                        fields.push(format!("obfs={}", opts.mode.unwrap_or_default()));
                        if let Some(host) = opts.host {
                            fields.push(format!("obfs-host={}", host));
                        }
                    }
                    Some("v2ray-plugin") => {
                        fields.push(format!("obfs={}", if opts.tls { "wss" } else { "ws" }));
                        if let Some(host) = opts.host {
                            fields.push(format!("obfs-host={}", host));
                        }
                        if let Some(path) = opts.path {
                            fields.push(format!("obfs-uri={}", path));
                        }
                    }
                    Some(other) => return Err(unsupported_plugin(self.platform(), other)),
                }
                fields.push(Self::transport(proxy));
            }
            ProxyKind::ShadowsocksR(ssr) => {
                fields.push(format!("shadowsocks={}", address));
                fields.push(format!("method={}", ssr.cipher));
                fields.push(format!("password={}", ssr.password));
                fields.push(format!("ssr-protocol={}", ssr.protocol));
                if let Some(param) = &ssr.protocol_param {
                    fields.push(format!("ssr-protocol-param={}", param));
                }
                if !ssr.obfs.is_empty() {
                    fields.push(format!("obfs={}", ssr.obfs));
                }
                if let Some(param) = &ssr.obfs_param {
                    fields.push(format!("obfs-host={}", param));
                }
                fields.push(Self::transport(proxy));
            }
            ProxyKind::Vmess(vmess) => {
                fields.push(format!("vmess={}", address));
                let method = if vmess.cipher == "auto" { "none" } else { vmess.cipher.as_str() };
                fields.push(format!("method={}", method));
                fields.push(format!("password={}", vmess.uuid));
                if vmess.network.as_deref() == Some("ws") {
                    if proxy.tls {
                        fields.push("obfs=wss".to_string());
                        if let Some(sni) = &proxy.sni {
                            fields.push(format!("obfs-host={}", sni));
                        }
                    } else {
                        fields.push("obfs=ws".to_string());
                        if let Some(host) = vmess.ws_host() {
                            fields.push(format!("obfs-host={}", host));
                        }
                    }
                    if let Some(path) = vmess.ws_path() {
                        fields.push(format!("obfs-uri={}", path));
                    }
                    if proxy.tls {
                        fields.push(Self::tls_verification(proxy));
                    }
                } else if proxy.tls {
                    fields.push("obfs=over-tls".to_string());
                    if let Some(sni) = &proxy.sni {
                        fields.push(format!("obfs-host={}", sni));
                    }
                    fields.push(Self::tls_verification(proxy));
                }
                fields.push(Self::transport(proxy));
            }
            ProxyKind::Trojan(trojan) => {
                fields.push(format!("trojan={}", address));
                fields.push(format!("password={}", trojan.password));
                if let Some(sni) = &proxy.sni {
                    fields.push(format!("tls-host={}", sni));
                }
                fields.push("over-tls=true".to_string());
                fields.push(Self::tls_verification(proxy));
                fields.push(Self::transport(proxy));
            }
            ProxyKind::Http(http) => {
                fields.push(format!("http={}", address));
                if let Some(username) = &http.username {
                    fields.push(format!("username={}", username));
                }
                if let Some(password) = &http.password {
                    fields.push(format!("password={}", password));
                }
                if proxy.tls {
                    fields.push("over-tls=true".to_string());
                    fields.push(Self::tls_verification(proxy));
                    if let Some(sni) = &proxy.sni {
                        fields.push(format!("tls-host={}", sni));
                    }
                }
                fields.push(format!("fast-open={}", flag(proxy.tfo)));
            }
            ProxyKind::Other { .. } => return Err(unsupported_kind(self.platform(), proxy)),
        }

        fields.push(format!("tag={}", proxy.name));
        Ok(Some(fields.join(",")))
    }
}

/// Surge `[Proxy]` lines.
pub struct SurgeProducer;

impl Producer<Proxy> for SurgeProducer {
    fn platform(&self) -> Platform {
        Platform::Surge
    }

    fn produce_one(&self, proxy: &Proxy) -> Result<Option<String>> {
        let mut fields = Vec::new();

        match &proxy.kind {
            ProxyKind::Shadowsocks(ss) => {
                fields.push(format!("{}=ss", proxy.name));
                fields.push(proxy.server.clone());
                fields.push(proxy.port.to_string());
                fields.push(format!("encrypt-method={}", ss.cipher));
                fields.push(format!("password={}", ss.password));
                if let Some(opts) = obfs_only(self.platform(), ss)? {
                    fields.push(format!("obfs={}", opts.mode.as_deref().unwrap_or_default()));
                    if let Some(host) = &opts.host {
                        fields.push(format!("obfs-host={}", host));
                    }
                }
                fields.push(format!("tfo={}", flag(proxy.tfo)));
                fields.push(format!("udp-relay={}", flag(proxy.udp)));
            }
            ProxyKind::Vmess(vmess) => {
                fields.push(format!("{}=vmess", proxy.name));
                fields.push(proxy.server.clone());
                fields.push(proxy.port.to_string());
                fields.push(format!("username={}", vmess.uuid));
                fields.push(format!("tls={}", proxy.tls));
                fields.push(format!("tfo={}", flag(proxy.tfo)));
                if vmess.network.as_deref() == Some("ws") {
                    fields.push("ws=true".to_string());
                    fields.push(format!("ws-path={}", vmess.ws_path().unwrap_or("/")));
                    if let Some(host) = vmess.ws_host() {
                        fields.push(format!("ws-headers=HOST:{}", host));
                    }
                }
                if proxy.tls {
                    if let Some(skip) = proxy.skip_cert_verify {
                        fields.push(format!("skip-cert-verify={}", skip));
                    }
                    if let Some(sni) = &proxy.sni {
                        fields.push(format!("sni={}", sni));
                    }
                }
            }
            ProxyKind::Trojan(trojan) => {
                fields.push(format!("{}=trojan", proxy.name));
                fields.push(proxy.server.clone());
                fields.push(proxy.port.to_string());
                fields.push(format!("password={}", trojan.password));
                if let Some(skip) = proxy.skip_cert_verify {
                    fields.push(format!("skip-cert-verify={}", skip));
                }
                if let Some(sni) = &proxy.sni {
                    fields.push(format!("sni={}", sni));
                }
                fields.push(format!("tfo={}", flag(proxy.tfo)));
            }
            ProxyKind::Http(http) => {
                let kind = if proxy.tls { "https" } else { "http" };
                fields.push(format!("{}={}", proxy.name, kind));
                fields.push(proxy.server.clone());
                fields.push(proxy.port.to_string());
                if let Some(username) = &http.username {
                    fields.push(format!("username={}", username));
                }
                if let Some(password) = &http.password {
                    fields.push(format!("password={}", password));
                }
                if proxy.tls {
                    fields.push(format!("skip-cert-verify={}", flag(proxy.skip_cert_verify)));
                    if let Some(sni) = &proxy.sni {
                        fields.push(format!("sni={}", sni));
                    }
                }
                fields.push(format!("tfo={}", flag(proxy.tfo)));
            }
            ProxyKind::ShadowsocksR(_) | ProxyKind::Other { .. } => {
                return Err(unsupported_kind(self.platform(), proxy))
            }
        }

        Ok(Some(fields.join(",")))
    }
}

/// Loon `[Proxy]` lines.
pub struct LoonProducer;

impl Producer<Proxy> for LoonProducer {
    fn platform(&self) -> Platform {
        Platform::Loon
    }

    fn produce_one(&self, proxy: &Proxy) -> Result<Option<String>> {
        let address = format!("{},{}", proxy.server, proxy.port);
        let line = match &proxy.kind {
            ProxyKind::Shadowsocks(ss) => {
                let obfs = match obfs_only(self.platform(), ss)? {
                    Some(opts) => format!(
                        "{},{}",
                        opts.mode.as_deref().unwrap_or_default(),
                        opts.host.as_deref().unwrap_or_default()
                    ),
                    None => ",".to_string(),
                };
                format!(
                    "{}=shadowsocks,{},{},\"{}\",{}",
                    proxy.name, address, ss.cipher, ss.password, obfs
                )
            }
            ProxyKind::ShadowsocksR(ssr) => format!(
                "{}=shadowsocksr,{},{},\"{}\",{},{{{}}},{},{{{}}}",
                proxy.name,
                address,
                ssr.cipher,
                ssr.password,
                ssr.protocol,
                ssr.protocol_param.as_deref().unwrap_or_default(),
                ssr.obfs,
                ssr.obfs_param.as_deref().unwrap_or_default()
            ),
            ProxyKind::Vmess(vmess) => {
                let method = if vmess.cipher == "auto" { "none" } else { vmess.cipher.as_str() };
                let mut line = format!(
                    "{}=vmess,{},{},\"{}\",over-tls:{}",
                    proxy.name, address, method, vmess.uuid, proxy.tls
                );
                if vmess.network.as_deref() == Some("ws") {
                    let host = vmess.ws_host().unwrap_or(&proxy.server);
                    let path = vmess.ws_path().unwrap_or("/");
                    line.push_str(&format!(",transport:ws,host:{},path:{}", host, path));
                } else {
                    line.push_str(",transport:tcp");
                }
                if proxy.tls {
                    line.push_str(&loon_tls(proxy));
                }
                line
            }
            ProxyKind::Trojan(trojan) => format!(
                "{}=trojan,{},\"{}\"{}",
                proxy.name,
                address,
                trojan.password,
                loon_tls(proxy)
            ),
            ProxyKind::Http(http) => {
                let kind = if proxy.tls { "https" } else { "http" };
                let mut line = format!(
                    "{}={},{},{},{}",
                    proxy.name,
                    kind,
                    address,
                    http.username.as_deref().unwrap_or_default(),
                    http.password.as_deref().unwrap_or_default()
                );
                if proxy.tls {
                    line.push_str(&loon_tls(proxy));
                }
                line
            }
            ProxyKind::Other { .. } => return Err(unsupported_kind(self.platform(), proxy)),
        };
        Ok(Some(line))
    }
}

fn loon_tls(proxy: &Proxy) -> String {
    let mut opts = String::new();
    if let Some(sni) = &proxy.sni {
        opts.push_str(&format!(",tls-name:{}", sni));
    }
    opts.push_str(&format!(",skip-cert-verify:{}", flag(proxy.skip_cert_verify)));
    opts
}

/// Clash `proxies:` document, one flow-style entry per proxy.
pub struct ClashProducer;

impl Producer<Proxy> for ClashProducer {
    fn platform(&self) -> Platform {
        Platform::Clash
    }

    fn mode(&self) -> ProducerMode {
        ProducerMode::All
    }

    fn produce_all(&self, proxies: &[Proxy]) -> Result<String> {
        let mut output = String::from("proxies:\n");
        for proxy in proxies {
            let mut proxy = proxy.clone();
            proxy.supported = None;
            output.push_str("  - ");
            output.push_str(&serde_json::to_string(&proxy)?);
            output.push('\n');
        }
        Ok(output)
    }
}

/// Producer registered for `platform`.
pub fn producer_for(platform: Platform) -> &'static dyn Producer<Proxy> {
    match platform {
        Platform::Qx => &QxProducer,
        Platform::Surge => &SurgeProducer,
        Platform::Loon => &LoonProducer,
        Platform::Clash => &ClashProducer,
    }
}

/// Render `proxies` for the named target platform.
pub fn produce(proxies: &[Proxy], target: &str) -> Result<String> {
    let platform: Platform = target.parse()?;
    producer::produce(producer_for(platform), proxies)
}
