//! Per-pass structured query construction.
//!
//! Every builder is a pure function of the place's query facts and the
//! pass tier, returning a fresh JSON query document — passes are
//! independently testable and order-independent, and no query is ever
//! mutated between passes.
//!
//! Document fields queried: `title` / `names` / `searchy` (exact term
//! name matching), `links` (qualified external ids), `authrecord_id`
//! (an authority's own record id), `types` (structured type-authority
//! identifiers), `fclasses`, `ccodes`, `geom` (geo-shape), `dataset`
//! (contributing source).

use serde_json::{json, Value};

use crate::error::AlignError;
use crate::models::{CandidateQuery, Pass};

/// Options shared across the passes of one external-authority lookup.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Authority slug (`wd`, `tgn`, …) whose own record ids should match
    /// directly in pass 0.
    pub authority: String,
    /// Dataset-level flag: exclude one lower-quality source contributor
    /// from every pass.
    pub exclude_contributor: Option<String>,
}

/// Pass 0, external context: exact identifier match — any qualified
/// external id on the place, or direct equality against the authority's
/// own record id. `None` when the place carries no usable ids.
pub fn external_ids(cq: &CandidateQuery, opts: &QueryOptions) -> Option<Value> {
    let own_ids: Vec<&str> = cq
        .links
        .iter()
        .filter_map(|l| l.strip_prefix(&format!("{}:", opts.authority)))
        .collect();
    if cq.links.is_empty() && own_ids.is_empty() {
        return None;
    }

    let mut should = vec![json!({"terms": {"links": cq.links}})];
    if !own_ids.is_empty() {
        should.push(json!({"terms": {"authrecord_id": own_ids}}));
    }
    let mut bool_q = json!({
        "should": should,
        "minimum_should_match": 1
    });
    apply_exclusion(&mut bool_q, opts);
    Some(json!({"query": {"bool": bool_q}}))
}

/// Passes 1 and 2, external context.
///
/// Pass 1: exact term match on title/alternate-name/search blob, spatial
/// filter when available (own hull before study area) with country codes
/// as a score boost, type match as a boost only; with no spatial
/// constraint at all, country codes become a hard filter instead.
///
/// Pass 2: identical except the type boost is dropped in favor of a
/// broader feature-class filter.
pub fn external_relaxed(cq: &CandidateQuery, pass: Pass, opts: &QueryOptions) -> Result<Value, AlignError> {
    let mut must = vec![name_clause(cq)];
    let mut filter = Vec::new();
    let mut should = Vec::new();

    match spatial_clause(cq) {
        Some(shape) => {
            filter.push(shape);
            if !cq.countries.is_empty() {
                should.push(json!({"terms": {"ccodes": cq.countries}}));
            }
        }
        None => {
            if !cq.countries.is_empty() {
                must.push(json!({"terms": {"ccodes": cq.countries}}));
            }
        }
    }

    match pass {
        Pass::External1 => {
            if !cq.placetypes.is_empty() {
                should.push(json!({"terms": {"types": cq.placetypes}}));
            }
        }
        Pass::External2 => {
            if !cq.fclasses.is_empty() {
                filter.push(json!({"terms": {"fclasses": cq.fclasses}}));
            }
        }
        other => {
            return Err(AlignError::Index(format!(
                "external_relaxed called with non-relaxed pass {:?}",
                other
            )))
        }
    }

    let mut bool_q = json!({"must": must});
    if !filter.is_empty() {
        bool_q["filter"] = Value::Array(filter);
    }
    if !should.is_empty() {
        bool_q["should"] = Value::Array(should);
    }
    apply_exclusion(&mut bool_q, opts);
    Ok(json!({"query": {"bool": bool_q}}))
}

/// Identifier query for the merged-index passes 0a/0b: any of `ids`
/// appearing in a document's link list.
pub fn merged_ids(ids: &[String]) -> Value {
    json!({"query": {"bool": {"must": [{"terms": {"links": ids}}]}}})
}

/// Merged-index pass 1: exact term name match; spatial constraint when
/// available (own hull first, country boost next, study area last);
/// type-identifier match as a score boost only.
pub fn merged_name(cq: &CandidateQuery) -> Value {
    let must = vec![name_clause(cq)];
    let mut filter = Vec::new();
    let mut should = Vec::new();

    if let Some(hull) = &cq.geom_hull {
        filter.push(geo_shape(hull));
    } else if !cq.countries.is_empty() {
        should.push(json!({"terms": {"ccodes": cq.countries}}));
    } else if let Some(area) = &cq.area_hull {
        filter.push(geo_shape(area));
    }

    if !cq.placetypes.is_empty() {
        should.push(json!({"terms": {"types": cq.placetypes}}));
    }

    let mut bool_q = json!({"must": must});
    if !filter.is_empty() {
        bool_q["filter"] = Value::Array(filter);
    }
    if !should.is_empty() {
        bool_q["should"] = Value::Array(should);
    }
    json!({"query": {"bool": bool_q}})
}

/// Exact term match against title, alternate names, and the search blob.
fn name_clause(cq: &CandidateQuery) -> Value {
    json!({
        "bool": {
            "should": [
                {"terms": {"title": cq.variants}},
                {"terms": {"names": cq.variants}},
                {"terms": {"searchy": cq.variants}}
            ],
            "minimum_should_match": 1
        }
    })
}

/// The hard spatial filter for the external context: own geometry hull
/// first, the named study area as fallback.
fn spatial_clause(cq: &CandidateQuery) -> Option<Value> {
    cq.geom_hull
        .as_ref()
        .or(cq.area_hull.as_ref())
        .map(geo_shape)
}

fn geo_shape(shape: &Value) -> Value {
    json!({
        "geo_shape": {
            "geom": { "shape": shape, "relation": "intersects" }
        }
    })
}

fn apply_exclusion(bool_q: &mut Value, opts: &QueryOptions) {
    if let Some(excluded) = &opts.exclude_contributor {
        bool_q["must_not"] = json!([{"term": {"dataset": excluded}}]);
    }
}
