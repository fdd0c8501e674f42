//! Rule operators.

use std::collections::HashSet;

use serde_json::Value;

use super::Rule;
use crate::pipeline::{Operator, Stage, StageCatalog, StageKind};
use crate::Result;

/// Registry of rule stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStage {
    RemoveDuplicate,
}

impl StageCatalog for RuleStage {
    type Item = Rule;

    fn lookup(name: &str) -> Option<Self> {
        match name {
            "Remove Duplicate" => Some(RuleStage::RemoveDuplicate),
            _ => None,
        }
    }

    fn kind(&self) -> StageKind {
        StageKind::Operator
    }

    fn build(&self, _args: &Value, _script: Option<&str>) -> Result<Stage<Rule>> {
        match self {
            RuleStage::RemoveDuplicate => Ok(Stage::Operator(Box::new(RemoveDuplicate))),
        }
    }
}

/// Keeps the first rule of every `(type, content, sorted options)` key.
pub struct RemoveDuplicate;

impl Operator<Rule> for RemoveDuplicate {
    fn name(&self) -> &str {
        "Remove Duplicate"
    }

    fn apply(&self, rules: &mut Vec<Rule>) -> Result<Option<Vec<Rule>>> {
        let mut seen = HashSet::with_capacity(rules.len());
        let mut unique = Vec::with_capacity(rules.len());
        for rule in rules.iter() {
            if seen.insert(rule.dedup_key()) {
                unique.push(rule.clone());
            }
        }
        Ok(Some(unique))
    }
}
