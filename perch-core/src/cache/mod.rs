//! Multi-layer TTL cache over a shared persistent store.
//!
//! Defines the typed key namespaces, the async key-value backend interface
//! with memory and JSON-file implementations, and the TTL layer that the
//! catalog, media, and fallback paths read through.

pub mod file_store;
pub mod keys;
pub mod store;
pub mod ttl;

pub use file_store::JsonFileStore;
pub use keys::{CacheKey, CacheNamespace, RegionCode, SpeciesCode};
pub use store::{KeyValueStore, MemoryKeyValueStore, StoreError};
pub use ttl::{CacheEntry, CacheStatistics, TtlCache};
