//! Author biography lookups behind a cache.
//!
//! A miss runs the configured [`BioSource`]; the result is kept for the
//! life of the cache. Concurrent misses for the same name share a single
//! fetch unless coalescing is turned off.

mod cache;
mod source;

pub use cache::{BioCache, BioCacheConfig, BioCacheStats};
pub use source::{biography_for, BioSource, Delay, SimulatedBioSource, ThreadSleep};
