use std::cell::{Cell, RefCell};
use std::sync::Arc;

use tracing::{debug, info};

use crate::analyzer::dependency::UID_FIELD;
use crate::analyzer::table_registry::{tag_table, TableRegistry};
use crate::config::Configuration;
use crate::usage::sink::PageCacheSink;

/// Target of the metrics events.
pub const METRICS_TARGET: &str = "cache_autotag::metrics";

/// Lifetime bound of a render that depends on no timestamp.
pub const UNBOUNDED: i64 = i64::MAX;

/// Everything a single page render depended on.
///
/// Recording methods take `&self` so that several open result cursors can
/// report into the same render at once. All sets keep insertion order.
#[derive(Debug)]
pub struct UsageAccumulator {
    registry: Arc<TableRegistry>,
    config: Configuration,
    now: i64,
    rows: RefCell<Vec<(String, Vec<i64>)>>,
    lists: RefCell<Vec<String>>,
    fields: RefCell<Vec<(String, Vec<String>)>>,
    lifetime: Cell<i64>,
}

impl UsageAccumulator {
    /// Start a render at unix time `now`.
    pub fn new(registry: Arc<TableRegistry>, config: Configuration, now: i64) -> Self {
        Self {
            registry,
            config,
            now,
            rows: RefCell::new(Vec::new()),
            lists: RefCell::new(Vec::new()),
            fields: RefCell::new(Vec::new()),
            lifetime: Cell::new(UNBOUNDED),
        }
    }

    /// Render time used for visibility and lifetime decisions.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Registry used for the exclusion policy.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The render depends on `field` of `table`.
    pub fn record_field_usage(&self, table: &str, field: &str) {
        insert_grouped(&mut self.fields.borrow_mut(), table, field.to_string());
    }

    /// The render lists `table`, so new rows change its output.
    pub fn record_list_usage(&self, table: &str) {
        let mut lists = self.lists.borrow_mut();
        if !lists.iter().any(|t| t == table) {
            lists.push(table.to_string());
        }
    }

    /// The render showed row `id` of `table`. Id 0 is not a row.
    pub fn record_row_usage(&self, table: &str, id: i64) {
        if id == 0 {
            return;
        }
        insert_grouped(&mut self.rows.borrow_mut(), table, id);
    }

    /// Narrow the lifetime bound to `timestamp` when it lies in the future and
    /// before the current bound. Zero means "no timestamp".
    pub fn bound_lifetime(&self, timestamp: i64) {
        if timestamp == 0 || timestamp <= self.now || timestamp >= self.lifetime.get() {
            return;
        }
        let bound = match self.config.default_cache_timeout {
            Some(timeout) => {
                let page_bound = self
                    .now
                    .saturating_add(i64::try_from(timeout).unwrap_or(i64::MAX));
                timestamp.min(page_bound)
            }
            None => timestamp,
        };
        self.lifetime.set(bound);
        debug!(timestamp, bound, "cache lifetime narrowed");
    }

    /// Absolute unix time until which the render output stays valid.
    pub fn lifetime_bound(&self) -> i64 {
        self.lifetime.get()
    }

    /// Seconds the render may be cached for, if any timestamp bounded it.
    pub fn cache_timeout(&self) -> Option<i64> {
        let bound = self.lifetime.get();
        (bound != UNBOUNDED).then(|| bound - self.now)
    }

    /// Tags for everything recorded so far: rows, then lists, then fields.
    pub fn synthesize_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();

        if self.config.flush_cache_on_uid {
            for (table, ids) in self.rows.borrow().iter() {
                if self.registry.is_excluded(table) {
                    continue;
                }
                let prefix = tag_table(table);
                tags.extend(ids.iter().map(|id| format!("{prefix}_{id}")));
            }
        }

        if self.config.flush_cache_on_new {
            tags.extend(
                self.lists
                    .borrow()
                    .iter()
                    .filter(|table| !self.registry.is_excluded(table))
                    .map(|table| new_rows_tag(table)),
            );
        }

        if self.config.flush_cache_on_conditional_field {
            for (table, fields) in self.fields.borrow().iter() {
                if self.registry.is_excluded(table) {
                    continue;
                }
                tags.extend(
                    fields
                        .iter()
                        .filter(|field| *field != UID_FIELD)
                        .map(|field| field_tag(table, field)),
                );
            }
        }

        tags
    }

    /// End the render: report the metrics and hand tags and the cache timeout
    /// to `sink` unless running in metrics-only mode.
    pub fn finish(&self, sink: &mut dyn PageCacheSink) -> Vec<String> {
        let tags = self.synthesize_tags();
        let timeout = self.cache_timeout();

        info!(
            target: METRICS_TARGET,
            event = "tags_added",
            count = tags.len(),
            tags = %tags.join(", ")
        );
        if let Some(seconds) = timeout {
            info!(target: METRICS_TARGET, event = "cache_timeout", seconds);
        }

        if self.config.metrics_only {
            return tags;
        }
        sink.add_cache_tags(&tags);
        if let Some(seconds) = timeout {
            sink.set_cache_timeout(seconds);
        }
        tags
    }
}

/// Tag flushed when a row is added to `table`.
pub fn new_rows_tag(table: &str) -> String {
    format!("{table}--new")
}

/// Tag flushed when `field` of some row of `table` changes.
pub fn field_tag(table: &str, field: &str) -> String {
    format!("{table}-{field}")
}

fn insert_grouped<T: PartialEq>(groups: &mut Vec<(String, Vec<T>)>, table: &str, value: T) {
    let index = match groups.iter().position(|(t, _)| t == table) {
        Some(index) => index,
        None => {
            groups.push((table.to_string(), Vec::new()));
            groups.len() - 1
        }
    };
    let values = &mut groups[index].1;
    if !values.contains(&value) {
        values.push(value);
    }
}
