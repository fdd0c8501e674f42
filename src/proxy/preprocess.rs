//! Raw subscription pre-processing.
//!
//! Detectors are tried in a fixed order; the first whose test matches
//! rewrites the text into one record per line. A detector that fails is
//! treated as not matching, and text no detector accepts passes through
//! unchanged.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use serde::Deserialize;

use crate::Result;

/// Standard alphabet, padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// URL-safe alphabet without padding, used for generated userinfo.
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_encode_padding(false),
);

/// Characters escaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Characters escaped in a URL fragment.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%');

/// Decode base64 leniently: whitespace ignored, URL-safe alphabet and
/// missing padding accepted.
pub fn decode_base64(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    let bytes = LENIENT.decode(cleaned.trim_end_matches('='))?;
    Ok(String::from_utf8(bytes)?)
}

/// Encode base64 with the URL-safe alphabet and no padding.
pub fn encode_base64(raw: &str) -> String {
    URL_SAFE.encode(raw)
}

/// A test-and-transform pair recognising one raw input dialect.
pub trait Detector {
    /// Display name used in log lines.
    fn name(&self) -> &str;

    /// Whether this detector recognises `raw`.
    fn test(&self, raw: &str) -> bool;

    /// Rewrite `raw` into line records.
    fn transform(&self, raw: &str) -> Result<String>;
}

/// Base64-wrapped link list.
pub struct Base64Detector;

impl Base64Detector {
    /// Base64 fragments of `vmess`, `ssr://`, `trojan`, `ss://` and `ssd://`.
    const KEYS: [&'static str; 5] = ["dm1lc3M", "c3NyOi8v", "dHJvamFu", "c3M6Ly", "c3NkOi8v"];
}

impl Detector for Base64Detector {
    fn name(&self) -> &str {
        "Base64 Pre-processor"
    }

    fn test(&self, raw: &str) -> bool {
        Self::KEYS.iter().any(|k| raw.contains(k))
    }

    fn transform(&self, raw: &str) -> Result<String> {
        decode_base64(raw)
    }
}

/// Top-level shape of a Clash document.
#[derive(Debug, Deserialize)]
struct ClashDocument {
    #[serde(default)]
    proxies: Vec<serde_json::Value>,
}

/// Clash YAML document with a `proxies` list.
pub struct ClashDetector;

impl Detector for ClashDetector {
    fn name(&self) -> &str {
        "Clash Pre-processor"
    }

    fn test(&self, raw: &str) -> bool {
        raw.contains("proxies:")
    }

    fn transform(&self, raw: &str) -> Result<String> {
        let document: ClashDocument = serde_yaml::from_str(raw)?;
        let lines = document
            .proxies
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }
}

/// SSD bundle: `ssd://` followed by base64 JSON.
#[derive(Debug, Deserialize)]
struct SsdBundle {
    #[serde(default)]
    airport: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    encryption: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    servers: Vec<SsdServer>,
}

#[derive(Debug, Deserialize)]
struct SsdServer {
    server: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    encryption: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    remarks: Option<String>,
    #[serde(default)]
    plugin: Option<String>,
    #[serde(default)]
    plugin_options: Option<String>,
}

/// SSD subscription bundle.
pub struct SsdDetector;

impl Detector for SsdDetector {
    fn name(&self) -> &str {
        "SSD Pre-processor"
    }

    fn test(&self, raw: &str) -> bool {
        raw.starts_with("ssd://")
    }

    fn transform(&self, raw: &str) -> Result<String> {
        let encoded = raw.trim_start_matches("ssd://");
        let bundle: SsdBundle = serde_json::from_str(&decode_base64(encoded)?)?;
        log::debug!(
            "SSD bundle {} with {} servers",
            bundle.airport.as_deref().unwrap_or("<unnamed>"),
            bundle.servers.len()
        );

        let mut port = bundle.port;
        let mut links = Vec::with_capacity(bundle.servers.len());
        for (i, server) in bundle.servers.iter().enumerate() {
            let method = server
                .encryption
                .as_deref()
                .or(bundle.encryption.as_deref())
                .unwrap_or_default();
            let password = server
                .password
                .as_deref()
                .or(bundle.password.as_deref())
                .unwrap_or_default();
            port = server.port.or(port);
            let Some(server_port) = port else {
                log::warn!("SSD server {} has no port, skipped", server.server);
                continue;
            };

            let userinfo = encode_base64(&format!("{}:{}", method, password));
            let plugin = match (&server.plugin, &server.plugin_options) {
                (Some(plugin), Some(options)) if !options.is_empty() => {
                    let value = format!("{};{}", plugin, options);
                    format!("/?plugin={}", utf8_percent_encode(&value, COMPONENT))
                }
                _ => String::new(),
            };
            let tag = server.remarks.clone().unwrap_or_else(|| i.to_string());

            links.push(format!(
                "ss://{}@{}:{}{}#{}",
                userinfo,
                server.server,
                server_port,
                plugin,
                utf8_percent_encode(&tag, FRAGMENT)
            ));
        }
        Ok(links.join("\n"))
    }
}

/// Run the built-in detectors over `raw`.
pub fn preprocess(raw: &str) -> String {
    let detectors: [&dyn Detector; 3] = [&Base64Detector, &ClashDetector, &SsdDetector];
    preprocess_with(raw, &detectors)
}

/// Run `detectors` in order over `raw`.
pub fn preprocess_with(raw: &str, detectors: &[&dyn Detector]) -> String {
    for detector in detectors {
        if !detector.test(raw) {
            continue;
        }
        match detector.transform(raw) {
            Ok(output) => {
                log::info!("Pre-processor [{}] activated", detector.name());
                return output;
            }
            Err(e) => log::warn!("Pre-processor [{}] failed: {}", detector.name(), e),
        }
    }
    raw.to_string()
}
