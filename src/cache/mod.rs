/// The `AnalysisCache` trait and typed JSON helpers on top of it.
pub mod analysis_cache;
/// Directory-backed cache shared across processes.
pub mod file_cache;
/// Process-local in-memory cache.
pub mod memory_cache;

pub use analysis_cache::AnalysisCache;
pub use file_cache::FileCache;
pub use memory_cache::MemoryCache;
