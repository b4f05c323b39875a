//! Client-side query cache: keyed entries with stale/gc times, prefix
//! invalidation, request de-duplication, retries and rollback snapshots.

pub mod query_cache;
pub mod query_key;
pub mod retry;

pub use query_cache::{CacheSnapshot, QueryCache, QueryOptions};
pub use query_key::{QueryKey, keys};
pub use retry::RetryPolicy;
