//! Error types for the alignment core and the reconciliation service.
//!
//! Two failure surfaces with different contracts:
//! - [`AlignError`] propagates and fails a whole dataset alignment run
//!   (fail-fast, no retry) — surfaced to the job queue as a job failure.
//! - [`ReconError`] is a per-query validation failure inside a
//!   reconciliation batch; it fails only that query and is reported as a
//!   structured payload, never crashing the batch.

use thiserror::Error;

/// Errors raised on the alignment path (index queries, persistence,
/// id allocation).
#[derive(Error, Debug)]
pub enum AlignError {
    #[error("index query failed: {0}")]
    Index(String),

    #[error("index transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("hit {source_id} could not be normalized: {reason}")]
    Normalize { source_id: String, reason: String },

    #[error("id allocation failed: {0}")]
    Allocator(String),
}

/// Per-query validation errors in the reconciliation protocol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconError {
    #[error("query must supply free text, a spatial constraint, or a dataset filter")]
    EmptyQuery,

    #[error("invalid coordinates: lat {lat}, lng {lng}")]
    BadCoordinates { lat: f64, lng: f64 },

    #[error("invalid radius {radius} km (must be > 0 and <= {max} km)")]
    BadRadius { radius: f64, max: f64 },

    #[error("invalid feature class '{code}'; allowed: {allowed}")]
    BadFeatureClass { code: String, allowed: String },

    #[error("malformed query payload: {0}")]
    Malformed(String),
}
