use serde::Serialize;

/// Receiver of the render's cache metadata, called once at the end of a render.
pub trait PageCacheSink {
    /// Attach invalidation tags to the rendered page.
    fn add_cache_tags(&mut self, tags: &[String]);

    /// Limit the page's cache lifetime to `seconds`.
    fn set_cache_timeout(&mut self, seconds: i64);
}

/// Sink that keeps what it was handed, for reports and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectedPageCache {
    /// Tags in the order they were added.
    pub tags: Vec<String>,
    /// Last timeout set, in seconds.
    pub timeout: Option<i64>,
}

impl PageCacheSink for CollectedPageCache {
    fn add_cache_tags(&mut self, tags: &[String]) {
        for tag in tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
    }

    fn set_cache_timeout(&mut self, seconds: i64) {
        self.timeout = Some(seconds);
    }
}
