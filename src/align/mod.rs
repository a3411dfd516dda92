//! Per-dataset alignment runs.
//!
//! One long-lived run per dataset, iterating its place set strictly
//! sequentially — review-row creation order matches place-iteration
//! order, and there is no internal parallelism. An index-query failure
//! on any place aborts the whole run (fail-fast, no retry, no partial
//! salvage); rows already written stay in place. The surrounding job
//! queue owns scheduling and cancellation.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cluster::{cluster_hits, promote_unmatched};
use crate::error::AlignError;
use crate::index::{IdAllocator, SearchIndexGateway};
use crate::lookup::{lookup_external, lookup_merged, ExternalLookup, MergedOutcome};
use crate::models::{CandidateQuery, HitRecord, MissedMatch, Place, ReviewState};
use crate::normalize::{normalize_batch, SourceVariant};
use crate::review::{NewReviewRow, ReviewSink};

/// Parameters of one external-authority alignment run.
#[derive(Debug, Clone)]
pub struct ExternalRunSpec {
    pub authority: String,
    pub index: String,
    /// Dataset-level flag excluding one low-quality source contributor.
    pub exclude_contributor: Option<String>,
    /// Caller's requested label language.
    pub lang: String,
    /// Service default label language.
    pub default_lang: String,
    /// Named study-area hull applied to every place lacking geometry.
    pub area_hull: Option<Value>,
}

/// Parameters of one merged-index alignment run.
#[derive(Debug, Clone)]
pub struct MergedRunSpec {
    pub index: String,
    pub area_hull: Option<Value>,
}

/// What one run did.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dataset: String,
    pub total: usize,
    /// Places with at least one candidate.
    pub matched: usize,
    /// Places with zero hits (merged context records title + id).
    pub missed: Vec<MissedMatch>,
    /// Places promoted as new seed parents (merged context only).
    pub seeded: usize,
    pub rows_written: usize,
}

/// Align every place of a dataset to an external authority.
pub async fn run_external(
    gateway: &dyn SearchIndexGateway,
    sink: &dyn ReviewSink,
    dataset: &str,
    places: &[Place],
    spec: &ExternalRunSpec,
) -> Result<RunSummary, AlignError> {
    let run_id = Uuid::new_v4();
    info!(%run_id, dataset, authority = %spec.authority, places = places.len(), "external alignment run starting");

    let lookup = ExternalLookup {
        index: spec.index.clone(),
        authority: spec.authority.clone(),
        exclude_contributor: spec.exclude_contributor.clone(),
    };
    let variant = SourceVariant::ExternalCombined {
        lang: spec.lang.clone(),
        default_lang: spec.default_lang.clone(),
    };

    let mut summary = RunSummary {
        run_id,
        dataset: dataset.to_string(),
        total: places.len(),
        matched: 0,
        missed: Vec::new(),
        seeded: 0,
        rows_written: 0,
    };

    for place in places {
        let cq = CandidateQuery::from_place(place, spec.area_hull.clone());
        let hits = lookup_external(gateway, &cq, &lookup).await?;
        if hits.is_empty() {
            continue;
        }

        summary.matched += 1;
        for record in normalize_batch(&variant, &hits) {
            sink.record(&review_row(run_id, &spec.authority, place, &record))
                .await?;
            summary.rows_written += 1;
        }
        sink.set_review_state(place.id, &spec.authority, ReviewState::Unreviewed)
            .await?;
    }

    info!(%run_id, matched = summary.matched, rows = summary.rows_written, "external alignment run finished");
    Ok(summary)
}

/// Align every place of a dataset to the system's own merged index.
/// Unmatched places are promoted immediately as new seed parents,
/// bypassing human review.
pub async fn run_merged(
    gateway: &dyn SearchIndexGateway,
    allocator: &dyn IdAllocator,
    sink: &dyn ReviewSink,
    dataset: &str,
    places: &[Place],
    spec: &MergedRunSpec,
) -> Result<RunSummary, AlignError> {
    let run_id = Uuid::new_v4();
    info!(%run_id, dataset, places = places.len(), "merged-index alignment run starting");

    let mut summary = RunSummary {
        run_id,
        dataset: dataset.to_string(),
        total: places.len(),
        matched: 0,
        missed: Vec::new(),
        seeded: 0,
        rows_written: 0,
    };

    for place in places {
        let cq = CandidateQuery::from_place(place, spec.area_hull.clone());
        match lookup_merged(gateway, &cq, &spec.index, place).await? {
            MergedOutcome::Missed(missed) => {
                warn!(place_id = missed.place_id, title = %missed.title, "missed match; promoting as seed");
                let whg_id =
                    promote_unmatched(gateway, allocator, &spec.index, place, &cq).await?;
                sink.mark_indexed(place.id, whg_id).await?;
                summary.missed.push(missed);
                summary.seeded += 1;
            }
            MergedOutcome::Matched(hits) => {
                summary.matched += 1;
                let mut records: HashMap<String, HitRecord> = HashMap::new();
                for hit in &hits {
                    match SourceVariant::MergedIndex.normalize(hit) {
                        Ok(record) => {
                            records.insert(hit.id.clone(), record);
                        }
                        Err(err) => {
                            warn!(source_id = %hit.id, %err, "dropping unnormalizable hit")
                        }
                    }
                }
                // one review row per parent cluster; no index mutation
                for cluster in cluster_hits(&hits, &records) {
                    let geom = cluster.geometries.first().map(|g| g.geom.clone());
                    sink.record(&NewReviewRow {
                        task_id: run_id,
                        authority: "whg".to_string(),
                        dataset: place.dataset.clone(),
                        place_id: place.id,
                        src_id: place.src_id.clone(),
                        authrecord_id: cluster.merged_id.clone(),
                        query_pass: cluster.passes.join(","),
                        score: cluster.score,
                        geom,
                        json: serde_json::to_value(&cluster)?,
                    })
                    .await?;
                    summary.rows_written += 1;
                }
                sink.set_review_state(place.id, "whg", ReviewState::Unreviewed)
                    .await?;
            }
        }
    }

    info!(
        %run_id,
        matched = summary.matched,
        seeded = summary.seeded,
        rows = summary.rows_written,
        "merged-index alignment run finished"
    );
    Ok(summary)
}

fn review_row(run_id: Uuid, authority: &str, place: &Place, record: &HitRecord) -> NewReviewRow {
    NewReviewRow {
        task_id: run_id,
        authority: authority.to_string(),
        dataset: place.dataset.clone(),
        place_id: place.id,
        src_id: place.src_id.clone(),
        authrecord_id: record.record_id.clone(),
        query_pass: record.pass.clone(),
        score: record.score,
        geom: record.geometries.first().map(|g| g.geom.clone()),
        json: serde_json::to_value(record).unwrap_or(Value::Null),
    }
}
