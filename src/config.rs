//! Job configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::StageDescriptor;
use crate::{Error, Platform, Result};

/// Entity type a job converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Proxy subscription
    Proxy,
    /// Rule set
    Rule,
}

impl JobKind {
    /// Parse a job kind from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "proxy" | "proxies" => Some(JobKind::Proxy),
            "rule" | "rules" => Some(JobKind::Rule),
            _ => None,
        }
    }
}

/// One conversion job: what to parse, how to reshape it and what to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub kind: JobKind,
    /// Target platform name, e.g. `Surge`
    pub target: String,
    /// Ordered pipeline stages
    #[serde(default)]
    pub process: Vec<StageDescriptor>,
}

impl JobConfig {
    pub fn new(kind: JobKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            process: Vec::new(),
        }
    }

    /// Parse a YAML (or JSON) document.
    pub fn from_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from a file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Self::from_str(&text)
        }
    }

    /// The target platform, failing on unknown names.
    pub fn platform(&self) -> Result<Platform> {
        self.target.parse()
    }

    /// Check that the target is a registered platform.
    pub fn validate(&self) -> Result<()> {
        self.platform().map(|_| ()).map_err(|e| match e {
            Error::UnsupportedPlatform(name) => {
                Error::Config(format!("unknown target platform: {}", name))
            }
            other => other,
        })
    }
}
