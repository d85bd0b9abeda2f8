//! Stream catalog and selection

use super::types::StreamDefinition;
use super::{entities, reports};
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Ordered set of stream definitions. Parents always precede their children.
#[derive(Debug, Clone)]
pub struct Catalog {
    streams: Vec<StreamDefinition>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::amazon_ads()
    }
}

impl Catalog {
    /// Every stream the tap supports
    pub fn amazon_ads() -> Self {
        Self::from_streams(vec![
            entities::campaigns(),
            entities::adgroups(),
            entities::keywords(),
            entities::targets(),
            entities::negative_keywords(),
            entities::productads(),
            entities::campaign_budgets(),
            reports::campaign_performance(),
            reports::search_terms(),
            reports::advertised_product(),
            reports::sd_advertised_product(),
            reports::keywords_targeting_summary(),
        ])
    }

    /// Build a catalog from explicit definitions
    pub fn from_streams(streams: Vec<StreamDefinition>) -> Self {
        Self { streams }
    }

    /// All definitions, in run order
    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Stream names, in run order
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Resolve a selection. An empty list selects everything.
    ///
    /// Parents of selected children are added to the run but not emitted.
    pub fn select(&self, names: &[String]) -> Result<Selection> {
        let mut emit = BTreeSet::new();
        if names.is_empty() {
            emit.extend(self.streams.iter().map(|s| s.name.clone()));
        } else {
            for name in names {
                let name = name.trim();
                if self.get(name).is_none() {
                    return Err(Error::StreamNotFound {
                        stream: name.to_string(),
                    });
                }
                emit.insert(name.to_string());
            }
        }

        let mut needed = emit.clone();
        let mut frontier: Vec<String> = emit.iter().cloned().collect();
        while let Some(name) = frontier.pop() {
            let parent = self
                .get(&name)
                .and_then(|s| s.parent.as_ref())
                .map(|link| link.parent.clone());
            if let Some(parent) = parent {
                if self.get(&parent).is_none() {
                    return Err(Error::StreamNotFound { stream: parent });
                }
                if needed.insert(parent.clone()) {
                    frontier.push(parent);
                }
            }
        }

        let run = self
            .streams
            .iter()
            .filter(|s| needed.contains(&s.name))
            .cloned()
            .collect();

        Ok(Selection { run, emit })
    }

    /// `discover` output
    pub fn to_json(&self) -> Value {
        json!({
            "streams": self.streams.iter().map(StreamDefinition::catalog_entry).collect::<Vec<_>>()
        })
    }
}

/// Streams to run for one invocation
#[derive(Debug, Clone)]
pub struct Selection {
    /// Streams to iterate, parents first
    pub run: Vec<StreamDefinition>,
    /// Streams whose records are emitted
    pub emit: BTreeSet<String>,
}

impl Selection {
    /// Check if a stream's records are emitted
    pub fn should_emit(&self, name: &str) -> bool {
        self.emit.contains(name)
    }

    /// Check if any stream in the run is a child of `name`
    pub fn has_children(&self, name: &str) -> bool {
        self.run
            .iter()
            .any(|s| s.parent.as_ref().is_some_and(|link| link.parent == name))
    }
}
