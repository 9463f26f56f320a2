//! skillfeed adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `http`: Shared HTTP client settings, retry policy and status mapping
//! - `platforms`: X, Bluesky, YouTube and DEV.to adapters plus a scripted stub
//! - `store`: SQLite and in-memory post store, raw cache and job leases

pub mod http;
pub mod platforms;
mod store_memory;
mod store_sqlite;

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryStore;
    pub use crate::store_sqlite::SqliteStore;
}
