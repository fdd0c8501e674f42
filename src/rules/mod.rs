//! Rule sets: canonical model, dialect parsers, stages and producers.

pub mod parser;
pub mod producer;
pub mod stages;

use serde::{Deserialize, Serialize};

use crate::producer::Capable;
use crate::{Platform, RuleType};

pub use parser::{parse, ClashRuleProvider, QxFilter, RuleParser, SurgeRuleSet};
pub use producer::produce;
pub use stages::{RemoveDuplicate, RuleStage};

/// A routing rule in canonical (Surge) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub content: String,
    /// Modifiers such as `no-resolve`, kept in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Rule {
    pub fn new(rule_type: RuleType, content: impl Into<String>) -> Self {
        Self {
            rule_type,
            content: content.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// Key identifying duplicates: type, content and sorted options.
    pub fn dedup_key(&self) -> (RuleType, &str, Vec<&str>) {
        let mut options: Vec<&str> = self.options.iter().map(String::as_str).collect();
        options.sort_unstable();
        (self.rule_type, self.content.as_str(), options)
    }
}

impl Capable for Rule {
    fn supports(&self, _platform: Platform) -> bool {
        true
    }
}
