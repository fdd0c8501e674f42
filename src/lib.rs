//! subflow - subscription conversion for proxy clients.
//!
//! This crate ingests proxy subscriptions and rule sets published in
//! different client dialects, normalizes them into canonical entities,
//! reshapes them with an ordered pipeline of filters and operators, and
//! emits the result for a target client.
//!
//! # Features
//!
//! - **Format detection**: base64 link lists, Clash documents, SSD bundles
//!   and the Surge, Quantumult X and Clash rule dialects
//! - **Stage pipeline**: ordered filters (selection masks) and operators
//!   (transformations) with per-stage failure isolation
//! - **Script stages**: sandboxed stage compositions loaded inline or
//!   through a [`fetch::ScriptFetcher`]
//! - **Producers**: Quantumult X, Surge, Loon and Clash output
//!
//! # Quick Start
//!
//! ```ignore
//! use serde_json::json;
//! use subflow::pipeline::StageDescriptor;
//!
//! let stages = vec![
//!     StageDescriptor::named("Useless Filter"),
//!     StageDescriptor::new("Region Filter", json!(["HK", "SG"])),
//!     StageDescriptor::named("Flag Operator"),
//! ];
//! let surge = subflow::job::convert_proxies(&raw, &stages, "Surge", None)?;
//! ```
//!
//! # Failure model
//!
//! Malformed input lines, failing stages and entities a target cannot
//! express are logged and skipped. Only an unknown target platform and an
//! unreachable remote script abort a conversion.

mod error;
mod platform;
mod rule_type;

pub mod config;
pub mod fetch;
pub mod job;
pub mod pipeline;
pub mod producer;
pub mod proxy;
pub mod rules;

// Re-export core types
pub use error::{Error, Result};
pub use platform::Platform;
pub use rule_type::RuleType;

pub use config::{JobConfig, JobKind};
pub use pipeline::{Pipeline, StageDescriptor, StageKind};
pub use proxy::Proxy;
pub use rules::Rule;
