//! Request caching for offline navigation.
//!
//! Responses are partitioned into two named, versioned generations:
//! - a static generation, seeded wholesale from a manifest at install time
//! - a dynamic generation, populated opportunistically from successful
//!   same-origin fetches
//!
//! Generations are replaced as a unit: activation deletes every generation
//! whose name is not in the current allow-list.

mod layer;
mod storage;
mod types;

pub use layer::CacheLayer;
pub use storage::{CacheStore, SqliteStore};
pub use types::{CachedResponse, FetchOutcome, FetchRequest, ResponseSource};
