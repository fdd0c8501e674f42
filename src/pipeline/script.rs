//! Dynamic-script stages.
//!
//! A script stage evaluates a user-supplied body against the current
//! sequence. Scripts only see the entities and a [`ScriptHost`], which
//! exposes catalog lookup and the filter/operator helpers; there is no
//! path from a script to the filesystem, network or process.
//!
//! The built-in [`StageScript`] engine reads the body as a YAML (or JSON)
//! document:
//!
//! ```yaml
//! # operator script: stages applied in order
//! - type: Keyword Delete Operator
//!   args: ["[Premium]"]
//! - type: Flag Operator
//! ```
//!
//! ```yaml
//! # filter script: a boolean expression over filter stages
//! and:
//!   - type: Type Filter
//!     args: [ss, trojan]
//!   - not:
//!       type: Keyword Filter
//!       args: { keywords: [expire] }
//! ```

use std::marker::PhantomData;

use serde::Deserialize;
use serde_json::Value;

use super::{
    and_mask, full_mask, not_mask, or_mask, process_filter, process_operator, Filter, Operator,
    Stage, StageCatalog, StageDescriptor,
};
use crate::{Error, Result};

/// Narrow capability object handed to scripts.
pub struct ScriptHost<C> {
    _catalog: PhantomData<C>,
}

impl<C: StageCatalog> ScriptHost<C> {
    pub fn new() -> Self {
        Self {
            _catalog: PhantomData,
        }
    }

    /// Build a built-in stage by name. Script stages cannot be nested.
    pub fn get(&self, name: &str, args: &Value) -> Result<Stage<C::Item>> {
        let entry = C::lookup(name).ok_or_else(|| Error::UnknownStage(name.to_string()))?;
        if entry.is_script() {
            return Err(Error::Script(format!("{} cannot be used inside a script", name)));
        }
        entry.build(args, None)
    }

    /// Apply a filter with the engine's mask semantics.
    pub fn filter(&self, filter: &dyn Filter<C::Item>, items: Vec<C::Item>) -> Vec<C::Item> {
        process_filter(filter, items)
    }

    /// Apply an operator with the engine's copy-then-adopt semantics.
    pub fn operate(&self, operator: &dyn Operator<C::Item>, items: Vec<C::Item>) -> Vec<C::Item> {
        process_operator(operator, items)
    }

    /// Apply any stage with the semantics matching its kind.
    pub fn process(&self, stage: &Stage<C::Item>, items: Vec<C::Item>) -> Vec<C::Item> {
        match stage {
            Stage::Filter(f) => self.filter(f.as_ref(), items),
            Stage::Operator(o) => self.operate(o.as_ref(), items),
        }
    }
}

impl<C: StageCatalog> Default for ScriptHost<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluation boundary for script bodies.
pub trait ScriptEngine<C: StageCatalog> {
    /// Evaluate a filter script to a selection mask.
    fn filter(&self, script: &str, items: &[C::Item], host: &ScriptHost<C>) -> Result<Vec<bool>>;

    /// Evaluate an operator script, with the same contract as [`Operator::apply`].
    fn operate(
        &self,
        script: &str,
        items: &mut Vec<C::Item>,
        host: &ScriptHost<C>,
    ) -> Result<Option<Vec<C::Item>>>;
}

/// Boolean expression evaluated by filter scripts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    And { and: Vec<FilterExpr> },
    Or { or: Vec<FilterExpr> },
    Not { not: Box<FilterExpr> },
    Stage(StageDescriptor),
}

/// Built-in engine whose scripts are compositions of catalog stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageScript;

impl StageScript {
    fn eval<C: StageCatalog>(
        &self,
        expr: &FilterExpr,
        items: &[C::Item],
        host: &ScriptHost<C>,
    ) -> Result<Vec<bool>> {
        match expr {
            FilterExpr::And { and } => and.iter().try_fold(full_mask(items.len(), true), |acc, e| {
                Ok(and_mask(&acc, &self.eval(e, items, host)?))
            }),
            FilterExpr::Or { or } => or.iter().try_fold(full_mask(items.len(), false), |acc, e| {
                Ok(or_mask(&acc, &self.eval(e, items, host)?))
            }),
            FilterExpr::Not { not } => Ok(not_mask(&self.eval(not, items, host)?)),
            FilterExpr::Stage(descriptor) => match host.get(&descriptor.name, &descriptor.args)? {
                Stage::Filter(filter) => {
                    let mask = filter.select(items)?;
                    if mask.len() != items.len() {
                        return Err(Error::MaskLength {
                            expected: items.len(),
                            actual: mask.len(),
                        });
                    }
                    Ok(mask)
                }
                Stage::Operator(_) => Err(Error::Script(format!(
                    "{} is an operator and cannot be used in a filter expression",
                    descriptor.name
                ))),
            },
        }
    }
}

impl<C: StageCatalog> ScriptEngine<C> for StageScript {
    fn filter(&self, script: &str, items: &[C::Item], host: &ScriptHost<C>) -> Result<Vec<bool>> {
        let expr: FilterExpr =
            serde_yaml::from_str(script).map_err(|e| Error::Script(e.to_string()))?;
        self.eval(&expr, items, host)
    }

    fn operate(
        &self,
        script: &str,
        items: &mut Vec<C::Item>,
        host: &ScriptHost<C>,
    ) -> Result<Option<Vec<C::Item>>> {
        let steps: Vec<StageDescriptor> =
            serde_yaml::from_str(script).map_err(|e| Error::Script(e.to_string()))?;

        // Build everything first so a bad step fails the script as a whole.
        let stages = steps
            .iter()
            .map(|step| host.get(&step.name, &step.args))
            .collect::<Result<Vec<_>>>()?;

        let mut output = std::mem::take(items);
        for stage in &stages {
            output = host.process(stage, output);
        }
        Ok(Some(output))
    }
}

/// Filter stage backed by a script body.
pub struct ScriptFilter<C, E = StageScript> {
    script: String,
    engine: E,
    host: ScriptHost<C>,
}

impl<C: StageCatalog, E: ScriptEngine<C>> ScriptFilter<C, E> {
    pub fn new(script: impl Into<String>, engine: E) -> Self {
        Self {
            script: script.into(),
            engine,
            host: ScriptHost::new(),
        }
    }
}

impl<C: StageCatalog, E: ScriptEngine<C>> Filter<C::Item> for ScriptFilter<C, E> {
    fn name(&self) -> &str {
        "Script Filter"
    }

    fn select(&self, items: &[C::Item]) -> Result<Vec<bool>> {
        self.engine.filter(&self.script, items, &self.host)
    }
}

/// Operator stage backed by a script body.
pub struct ScriptOperator<C, E = StageScript> {
    script: String,
    engine: E,
    host: ScriptHost<C>,
}

impl<C: StageCatalog, E: ScriptEngine<C>> ScriptOperator<C, E> {
    pub fn new(script: impl Into<String>, engine: E) -> Self {
        Self {
            script: script.into(),
            engine,
            host: ScriptHost::new(),
        }
    }
}

impl<C: StageCatalog, E: ScriptEngine<C>> Operator<C::Item> for ScriptOperator<C, E> {
    fn name(&self) -> &str {
        "Script Operator"
    }

    fn apply(&self, items: &mut Vec<C::Item>) -> Result<Option<Vec<C::Item>>> {
        self.engine.operate(&self.script, items, &self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_expr_shapes() {
        let expr: FilterExpr = serde_yaml::from_str(
            r#"
and:
  - type: Type Filter
    args: [ss]
  - not:
      type: Useless Filter
"#,
        )
        .unwrap();

        let FilterExpr::And { and } = expr else {
            panic!("expected and");
        };
        assert_eq!(and.len(), 2);
        assert!(matches!(and[0], FilterExpr::Stage(ref d) if d.name == "Type Filter"));
        assert!(matches!(and[1], FilterExpr::Not { .. }));
    }

    #[test]
    fn test_operator_script_shape() {
        let steps: Vec<StageDescriptor> = serde_yaml::from_str(
            r#"
- type: Sort Operator
  args: desc
- type: Flag Operator
"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].args, Value::Null);
    }
}
