pub mod memory;
pub mod stats;

pub use memory::MemoryCache;
pub use stats::{CacheStats, CacheStatsSnapshot};
