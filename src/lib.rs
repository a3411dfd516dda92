//! Gazetteer alignment core.
//!
//! Decides, for any newly contributed place record or externally sourced
//! record, which previously known place(s) it refers to — entity resolution
//! over a full-text + geospatial search index. The pieces:
//!
//! - [`index`] — the search-index gateway, structured per-pass query
//!   building, sequential id allocation for seeded parents, and the
//!   circle→polygon approximator used for geo-shape filters
//! - [`lookup`] — the cascading multi-pass candidate lookup for the two
//!   alignment contexts (external authority, merged index)
//! - [`normalize`] — per-source hit normalization into one canonical
//!   [`models::HitRecord`] shape
//! - [`cluster`] — parent/child aggregation when populating the merged
//!   index, plus promotion of unmatched places as new seed parents
//! - [`review`] — the persisted human-review queue
//! - [`align`] — per-dataset alignment runs tying the above together
//! - [`recon`] — the OpenRefine-compatible reconciliation service
//!   (batch queries, extend, manifest, suggest)

pub mod align;
pub mod cluster;
pub mod config;
pub mod error;
pub mod index;
pub mod lookup;
pub mod models;
pub mod normalize;
pub mod recon;
pub mod review;

pub use error::{AlignError, ReconError};
