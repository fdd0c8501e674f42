//! Error types for subflow.

use thiserror::Error;

/// Error type for subflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested target platform has no registered producer
    #[error("target platform {0} is not supported")]
    UnsupportedPlatform(String),

    /// Proxy kind cannot be rendered for a platform
    #[error("platform {platform} does not support proxy type: {kind}")]
    UnsupportedProxy { platform: String, kind: String },

    /// Shadowsocks plugin cannot be rendered for a platform
    #[error("platform {platform} does not support plugin: {plugin}")]
    UnsupportedPlugin { platform: String, plugin: String },

    /// Sort operator called with an unknown order
    #[error("unknown sort option: {0}")]
    UnknownSortOrder(String),

    /// Stage name not present in the registry
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// Stage arguments could not be converted
    #[error("invalid arguments for {stage}: {reason}")]
    InvalidArguments { stage: String, reason: String },

    /// Set-property value does not fit the named attribute
    #[error("mistyped property: {0}")]
    InvalidProperty(String),

    /// Remote script could not be downloaded
    #[error("error when downloading remote script {url}: {reason}")]
    ScriptFetch { url: String, reason: String },

    /// Script body failed to evaluate
    #[error("script error: {0}")]
    Script(String),

    /// Filter returned a mask whose length does not match the input
    #[error("selection mask has {actual} entries, expected {expected}")]
    MaskLength { expected: usize, actual: usize },

    /// Malformed proxy link or record
    #[error("invalid link: {0}")]
    InvalidLink(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error
    #[error("base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded content is not UTF-8
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid regular expression
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for subflow operations.
pub type Result<T> = std::result::Result<T, Error>;
