//! Search-index access: the gateway seam, the Elasticsearch-backed
//! client, an in-memory gateway for tests and local development, the
//! per-pass query builder, sequential id allocation, and the
//! circle→polygon approximator.

pub mod allocator;
pub mod gateway;
pub mod geo;
pub mod memory;
pub mod query;

pub use allocator::{AtomicSeedAllocator, IdAllocator};
pub use gateway::{EsGateway, SearchIndexGateway};
pub use memory::MemoryGateway;
