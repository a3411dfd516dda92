//! Cascading multi-pass candidate lookup.
//!
//! Two contexts share the relaxation philosophy but differ in detail:
//! aligning a place to an external authority's combined index
//! ([`external`]) stops at the first non-empty tier; aligning to the
//! system's own merged index ([`merged`]) accumulates deduplicated hits
//! across an identifier pass, a single transitive identifier hop, and an
//! always-run name pass.
//!
//! Index-query failures propagate — a failure inside one place's lookup
//! aborts the whole dataset run.

pub mod external;
pub mod merged;

pub use external::{lookup_external, ExternalLookup};
pub use merged::{lookup_merged, MergedOutcome};
