//! Platform producers shared by proxies and rules.
//!
//! A producer renders entities into one platform's text format. `Single`
//! producers render one line per entity; entities the platform cannot
//! express are skipped with a warning. `All` producers render the whole
//! sequence at once.

use crate::{Platform, Result};

/// Entities that may declare per-platform support.
pub trait Capable {
    /// Whether this entity can be rendered for `platform`.
    fn supports(&self, platform: Platform) -> bool;
}

/// How a producer consumes its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerMode {
    /// One output line per entity
    Single,
    /// The whole sequence in one document
    All,
}

/// Renders entities of type `T` for one platform.
pub trait Producer<T> {
    /// Platform this producer targets.
    fn platform(&self) -> Platform;

    /// Input mode.
    fn mode(&self) -> ProducerMode {
        ProducerMode::Single
    }

    /// Render one entity. `Ok(None)` drops the entity silently.
    fn produce_one(&self, _item: &T) -> Result<Option<String>> {
        Ok(None)
    }

    /// Render the whole sequence.
    fn produce_all(&self, _items: &[T]) -> Result<String> {
        Ok(String::new())
    }
}

/// Render `items` with `producer`.
pub fn produce<T: Capable>(producer: &dyn Producer<T>, items: &[T]) -> Result<String> {
    let platform = producer.platform();
    if producer.mode() == ProducerMode::All {
        return producer.produce_all(items);
    }

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        if !item.supports(platform) {
            log::warn!("Skipped unsupported entity for {}", platform);
            continue;
        }
        match producer.produce_one(item) {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => {}
            Err(e) => log::warn!("Cannot produce entity for {}: {}", platform, e),
        }
    }
    Ok(lines.join("\n"))
}
