//! The externally-facing reconciliation service (OpenRefine
//! Reconciliation Service API v0.2 compatible): batch query processing,
//! the data-extension sub-protocol, the service manifest, and the
//! entity/property suggest endpoints.
//!
//! Requests are synchronous, stateless, and read-only against the index;
//! they are freely concurrent with each other and with alignment runs.
//! A failure inside one batch item never aborts the batch.

pub mod batch;
pub mod extend;
pub mod manifest;
pub mod routes;
pub mod suggest;
pub mod validate;

pub use batch::{run_batch, scale_score};
pub use routes::{recon_router, ReconState};
