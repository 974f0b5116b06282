//! # Infrastructure Adapters
//!
//! Implementations of the tenant directory, window store and delivery cache
//! interfaces.

pub mod caching_directory;
pub mod memory_delivery_cache;
pub mod memory_directory;
pub mod memory_window_store;

#[cfg(feature = "redis")]
pub mod redis_window_store;

pub use caching_directory::{CacheSettings, CachingTenantDirectory};
pub use memory_delivery_cache::InMemoryDeliveryCache;
pub use memory_directory::InMemoryTenantDirectory;
pub use memory_window_store::InMemoryWindowStore;

#[cfg(feature = "redis")]
pub use redis_window_store::RedisWindowStore;
