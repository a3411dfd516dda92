//! The persisted human-review queue.
//!
//! Alignment runs append one review row per candidate cluster; humans
//! accept or reject them in the review surface (out of scope here). Rows
//! are append-only — `record` never merges with an existing row for the
//! same key, so repeated runs over the same dataset can create duplicate
//! rows. The only mutations this core makes to a place are the
//! per-authority review flag and the indexed flag.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AlignError;
use crate::models::ReviewState;

/// One review row to persist.
#[derive(Debug, Clone)]
pub struct NewReviewRow {
    /// Alignment run id.
    pub task_id: Uuid,
    pub authority: String,
    pub dataset: String,
    pub place_id: i64,
    pub src_id: String,
    /// Candidate record id in the authority's namespace (or the merged
    /// parent id).
    pub authrecord_id: String,
    /// Pass tag(s) that produced the candidate.
    pub query_pass: String,
    pub score: f64,
    /// Representative geometry, when any.
    pub geom: Option<Value>,
    /// Canonical candidate payload (normalized record or cluster).
    pub json: Value,
}

/// Where alignment runs write review rows and place-flag updates.
#[async_trait]
pub trait ReviewSink: Send + Sync {
    /// Append one review row. Never merges with an existing row.
    async fn record(&self, row: &NewReviewRow) -> Result<(), AlignError>;

    /// Flip a place's per-authority review flag. This core only ever
    /// writes [`ReviewState::Unreviewed`].
    async fn set_review_state(
        &self,
        place_id: i64,
        authority: &str,
        state: ReviewState,
    ) -> Result<(), AlignError>;

    /// Mark a place as indexed (seeded into the merged index).
    async fn mark_indexed(&self, place_id: i64, whg_id: i64) -> Result<(), AlignError>;
}

/// Postgres-backed review queue.
pub struct ReviewQueue {
    pool: PgPool,
}

impl ReviewQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewSink for ReviewQueue {
    async fn record(&self, row: &NewReviewRow) -> Result<(), AlignError> {
        sqlx::query(
            r#"
            INSERT INTO hits (
                hit_id, task_id, authority, dataset, place_id, src_id,
                authrecord_id, query_pass, score, geom, json,
                reviewed, matched, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, false, NULL, $12)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.task_id)
        .bind(&row.authority)
        .bind(&row.dataset)
        .bind(row.place_id)
        .bind(&row.src_id)
        .bind(&row.authrecord_id)
        .bind(&row.query_pass)
        .bind(row.score)
        .bind(&row.geom)
        .bind(&row.json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_review_state(
        &self,
        place_id: i64,
        authority: &str,
        state: ReviewState,
    ) -> Result<(), AlignError> {
        sqlx::query(
            r#"
            INSERT INTO place_review (place_id, authority, state)
            VALUES ($1, $2, $3)
            ON CONFLICT (place_id, authority) DO UPDATE SET state = $3
            "#,
        )
        .bind(place_id)
        .bind(authority)
        .bind(state.as_i16())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_indexed(&self, place_id: i64, whg_id: i64) -> Result<(), AlignError> {
        sqlx::query("UPDATE places SET indexed = true, whg_id = $2 WHERE id = $1")
            .bind(place_id)
            .bind(whg_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub mod memory {
    //! In-memory sink for tests: captures rows and flag transitions in
    //! insertion order.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryReviewSink {
        pub rows: Mutex<Vec<NewReviewRow>>,
        pub states: Mutex<Vec<(i64, String, ReviewState)>>,
        pub indexed: Mutex<Vec<(i64, i64)>>,
    }

    impl MemoryReviewSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn row_count(&self) -> usize {
            self.rows.lock().expect("sink lock poisoned").len()
        }
    }

    #[async_trait]
    impl ReviewSink for MemoryReviewSink {
        async fn record(&self, row: &NewReviewRow) -> Result<(), AlignError> {
            self.rows.lock().expect("sink lock poisoned").push(row.clone());
            Ok(())
        }

        async fn set_review_state(
            &self,
            place_id: i64,
            authority: &str,
            state: ReviewState,
        ) -> Result<(), AlignError> {
            self.states
                .lock()
                .expect("sink lock poisoned")
                .push((place_id, authority.to_string(), state));
            Ok(())
        }

        async fn mark_indexed(&self, place_id: i64, whg_id: i64) -> Result<(), AlignError> {
            self.indexed
                .lock()
                .expect("sink lock poisoned")
                .push((place_id, whg_id));
            Ok(())
        }
    }
}

pub use memory::MemoryReviewSink;
