/// Render-scoped usage accumulation and tag synthesis.
pub mod accumulator;
/// Write-side tag flushing.
pub mod flusher;
/// End-of-render receivers of tags and lifetimes.
pub mod sink;

pub use accumulator::UsageAccumulator;
pub use flusher::{CacheBackend, Mutation, TagFlusher};
pub use sink::{CollectedPageCache, PageCacheSink};
