use std::collections::HashSet;

use tracing::info;

use crate::analyzer::table_registry::TableRegistry;
use crate::config::Configuration;
use crate::error::Result;
use crate::usage::accumulator::{field_tag, new_rows_tag, METRICS_TARGET};

/// A committed write to a content table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A row was created.
    Insert {
        /// Table that received the row.
        table: String,
    },
    /// Some fields of a row were changed.
    Update {
        /// Table of the changed row.
        table: String,
        /// Names of the changed fields.
        fields: Vec<String>,
    },
}

impl Mutation {
    /// Table the mutation touched.
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table } | Self::Update { table, .. } => table,
        }
    }
}

/// Page cache that can drop every entry carrying one of a set of tags.
pub trait CacheBackend {
    /// Invalidate every cache entry tagged with any of `tags`.
    fn flush_by_tags(&mut self, tags: &[String]) -> Result<()>;
}

/// Write-side counterpart of the accumulator: turns mutations into flushes of
/// the tags a render would have attached.
///
/// A tag is flushed at most once per flusher, so a batch of writes touching
/// the same table flushes it once.
#[derive(Debug)]
pub struct TagFlusher {
    config: Configuration,
    already_flushed: HashSet<String>,
}

impl TagFlusher {
    /// Create a flusher for one write batch.
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            already_flushed: HashSet::new(),
        }
    }

    /// React to `mutation`, returning the tags that were (or, in metrics-only
    /// mode, would have been) flushed.
    pub fn process(
        &mut self,
        mutation: &Mutation,
        registry: &TableRegistry,
        backend: &mut dyn CacheBackend,
    ) -> Result<Vec<String>> {
        let table = mutation.table();
        if registry.is_excluded(table) {
            return Ok(Vec::new());
        }

        let candidates = match mutation {
            Mutation::Insert { .. } if self.config.flush_cache_on_new => vec![new_rows_tag(table)],
            Mutation::Update { fields, .. } if self.config.flush_cache_on_conditional_field => {
                fields.iter().map(|field| field_tag(table, field)).collect()
            }
            _ => Vec::new(),
        };

        let to_flush: Vec<String> = candidates
            .into_iter()
            .filter(|tag| self.already_flushed.insert(tag.clone()))
            .collect();
        if to_flush.is_empty() {
            return Ok(to_flush);
        }

        info!(
            target: METRICS_TARGET,
            event = "tags_flushed",
            count = to_flush.len(),
            tags = %to_flush.join(", ")
        );
        if !self.config.metrics_only {
            backend.flush_by_tags(&to_flush)?;
        }
        Ok(to_flush)
    }
}
