//! Ordered stage pipeline shared by the proxy and rule subsystems.
//!
//! A pipeline is configured as an ordered list of [`StageDescriptor`]s.
//! Each descriptor names a stage in a fixed catalog (see [`StageCatalog`]);
//! the engine resolves it, builds the stage from its arguments and applies
//! it to the current entity sequence:
//!
//! - **Filters** produce a selection mask over the whole sequence. The mask
//!   is AND-ed into an all-true accumulator and the sequence is compacted.
//!   A failing filter leaves the mask all-true, so the stage is a no-op.
//! - **Operators** run on a clone of the sequence. A failing operator
//!   discards the clone, so the sequence keeps its pre-stage value.
//!
//! Unknown stage names are logged and skipped. The one failure that is not
//! isolated is resolving a remote script body: if the [`ScriptFetcher`]
//! fails, the whole run aborts with [`Error::ScriptFetch`].

pub mod script;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fetch::ScriptFetcher;
use crate::{Error, Result};

pub use script::{FilterExpr, ScriptEngine, ScriptHost, StageScript};

/// Kind of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Read-only selection over the sequence
    Filter,
    /// Transformation of the sequence
    Operator,
}

/// Externally supplied description of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Registered stage name, e.g. `"Keyword Filter"`
    #[serde(rename = "type")]
    pub name: String,
    /// Stage-specific arguments
    #[serde(default)]
    pub args: Value,
    /// Expected kind; when set, a catalog entry of the other kind is ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StageKind>,
}

impl StageDescriptor {
    /// Create a descriptor with the given name and arguments.
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
            kind: None,
        }
    }

    /// Create a descriptor without arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }
}

/// A stage that selects entities without modifying them.
pub trait Filter<T> {
    /// Display name used in log lines.
    fn name(&self) -> &str;

    /// Compute one selection bit per entity of `items`.
    fn select(&self, items: &[T]) -> Result<Vec<bool>>;
}

/// A stage that transforms the entity sequence.
pub trait Operator<T> {
    /// Display name used in log lines.
    fn name(&self) -> &str;

    /// Transform `items`, which is a private copy of the current sequence.
    ///
    /// Returning `Some` replaces the sequence with the returned value;
    /// returning `None` keeps `items` as mutated in place.
    fn apply(&self, items: &mut Vec<T>) -> Result<Option<Vec<T>>>;
}

/// An executable stage built from a descriptor.
pub enum Stage<T> {
    Filter(Box<dyn Filter<T>>),
    Operator(Box<dyn Operator<T>>),
}

impl<T> Stage<T> {
    /// Kind of this stage.
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Filter(_) => StageKind::Filter,
            Stage::Operator(_) => StageKind::Operator,
        }
    }

    /// Display name of this stage.
    pub fn name(&self) -> &str {
        match self {
            Stage::Filter(f) => f.name(),
            Stage::Operator(o) => o.name(),
        }
    }
}

/// A closed catalog of named built-in stages for one entity type.
pub trait StageCatalog: Sized {
    /// Entity type the stages operate on.
    type Item: Clone;

    /// Resolve a registered stage name.
    fn lookup(name: &str) -> Option<Self>;

    /// Kind of stage this entry builds.
    fn kind(&self) -> StageKind;

    /// Whether this entry needs a resolved script body.
    fn is_script(&self) -> bool {
        false
    }

    /// Build an executable stage. `script` carries the resolved script body
    /// for script entries and is `None` otherwise.
    fn build(&self, args: &Value, script: Option<&str>) -> Result<Stage<Self::Item>>;
}

/// Arguments of a script stage.
#[derive(Debug, Clone, Deserialize)]
struct ScriptArgs {
    #[serde(default)]
    mode: Option<String>,
    content: String,
}

/// Build a mask of `len` entries all set to `value`.
pub fn full_mask(len: usize, value: bool) -> Vec<bool> {
    vec![value; len]
}

/// Element-wise logical AND.
pub fn and_mask(a: &[bool], b: &[bool]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| *x && *y).collect()
}

/// Element-wise logical OR.
pub fn or_mask(a: &[bool], b: &[bool]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| *x || *y).collect()
}

/// Element-wise logical NOT.
pub fn not_mask(a: &[bool]) -> Vec<bool> {
    a.iter().map(|x| !x).collect()
}

/// Apply a filter to `items`, keeping entities whose mask bit is set.
pub fn process_filter<T>(filter: &dyn Filter<T>, items: Vec<T>) -> Vec<T> {
    let mut selected = full_mask(items.len(), true);
    match filter.select(&items) {
        Ok(mask) if mask.len() == items.len() => selected = and_mask(&selected, &mask),
        Ok(mask) => {
            let err = Error::MaskLength {
                expected: items.len(),
                actual: mask.len(),
            };
            log::warn!("Cannot apply filter {}: {}", filter.name(), err);
        }
        Err(e) => log::warn!("Cannot apply filter {}: {}", filter.name(), e),
    }

    items
        .into_iter()
        .zip(selected)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

/// Apply an operator to a copy of `items`; on failure `items` is returned unchanged.
pub fn process_operator<T: Clone>(operator: &dyn Operator<T>, items: Vec<T>) -> Vec<T> {
    let mut output = items.clone();
    match operator.apply(&mut output) {
        Ok(Some(replaced)) => replaced,
        Ok(None) => output,
        Err(e) => {
            log::warn!("Cannot apply operator {}: {}", operator.name(), e);
            items
        }
    }
}

/// Apply a built stage with the matching semantics.
pub fn process_stage<T: Clone>(stage: &Stage<T>, items: Vec<T>) -> Vec<T> {
    match stage {
        Stage::Filter(f) => process_filter(f.as_ref(), items),
        Stage::Operator(o) => process_operator(o.as_ref(), items),
    }
}

/// Sequential stage executor.
pub struct Pipeline<'a> {
    fetcher: Option<&'a dyn ScriptFetcher>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline that cannot resolve remote scripts.
    pub fn new() -> Self {
        Self { fetcher: None }
    }

    /// Create a pipeline that resolves remote scripts through `fetcher`.
    pub fn with_fetcher(fetcher: &'a dyn ScriptFetcher) -> Self {
        Self {
            fetcher: Some(fetcher),
        }
    }

    /// Run `stages` in order over `items`.
    ///
    /// Returns an error only when a remote script body cannot be fetched.
    pub fn run<C: StageCatalog>(
        &self,
        mut items: Vec<C::Item>,
        stages: &[StageDescriptor],
    ) -> Result<Vec<C::Item>> {
        for descriptor in stages {
            let Some(entry) = C::lookup(&descriptor.name) else {
                log::error!("Unknown stage: \"{}\"", descriptor.name);
                continue;
            };

            if let Some(expected) = descriptor.kind {
                if expected != entry.kind() {
                    log::warn!(
                        "Stage \"{}\" is a {:?}, not a {:?}; ignored",
                        descriptor.name,
                        entry.kind(),
                        expected
                    );
                    continue;
                }
            }

            let script = if entry.is_script() {
                match self.resolve_script(descriptor)? {
                    Some(script) => Some(script),
                    None => continue,
                }
            } else {
                None
            };

            log::info!(
                "Applying {:?} \"{}\" with arguments: {}",
                entry.kind(),
                descriptor.name,
                descriptor.args
            );

            let stage = match entry.build(&descriptor.args, script.as_deref()) {
                Ok(stage) => stage,
                Err(e) => {
                    log::warn!("Failed to apply \"{}\": {}", descriptor.name, e);
                    continue;
                }
            };

            items = process_stage(&stage, items);
        }
        Ok(items)
    }

    /// Resolve the body of a script stage.
    ///
    /// `Ok(None)` means the arguments are malformed and the stage is skipped;
    /// a failed remote fetch is returned as an error.
    fn resolve_script(&self, descriptor: &StageDescriptor) -> Result<Option<String>> {
        let args: ScriptArgs = match serde_json::from_value(descriptor.args.clone()) {
            Ok(args) => args,
            Err(e) => {
                log::warn!("Invalid script arguments for \"{}\": {}", descriptor.name, e);
                return Ok(None);
            }
        };

        if args.mode.as_deref() != Some("link") {
            return Ok(Some(args.content));
        }

        let fetcher = self.fetcher.ok_or_else(|| Error::ScriptFetch {
            url: args.content.clone(),
            reason: "no script fetcher configured".to_string(),
        })?;
        let body = fetcher.fetch(&args.content).map_err(|e| match e {
            Error::ScriptFetch { .. } => e,
            other => Error::ScriptFetch {
                url: args.content.clone(),
                reason: other.to_string(),
            },
        })?;
        Ok(Some(body))
    }
}

impl Default for Pipeline<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert free-form stage arguments into a typed argument struct.
pub fn parse_args<A: serde::de::DeserializeOwned>(stage: &str, args: &Value) -> Result<A> {
    serde_json::from_value(args.clone()).map_err(|e| Error::InvalidArguments {
        stage: stage.to_string(),
        reason: e.to_string(),
    })
}
