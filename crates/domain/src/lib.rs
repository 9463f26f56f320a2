//! skillfeed domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `filter`: Keyword relevance filter
//! - `usecases`: Ingestion orchestration and scheduling

pub mod filter;
pub mod model;
pub mod ports;
pub mod usecases;

pub use filter::ContentFilter;
pub use model::*;
pub use ports::*;
