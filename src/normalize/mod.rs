//! Per-source hit normalization into the canonical [`HitRecord`] shape.
//!
//! Each index population has its own document layout; a tagged
//! [`SourceVariant`] dispatches once to the right `normalize`
//! implementation. A normalization failure on one hit is caught, logged
//! with the source id, and that hit is dropped — never fabricated, never
//! aborting the batch.

pub mod tables;

use serde_json::Value;
use tracing::warn;

use crate::error::AlignError;
use crate::models::{HitGeometry, HitRecord, SearchHit, TimeSpan};

pub use tables::{class_label, country_label, DEFAULT_TYPE_LABEL, FCLASS_WHITELIST};

/// The low-structure contributor whose records always use their first
/// listed name, regardless of language.
const FIRST_NAME_SOURCE: &str = "dplace";

/// Which index population a raw hit document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceVariant {
    /// The system's own merged index (parent/child documents).
    MergedIndex,
    /// An external authority's remote record form (label/aliases shape).
    ExternalRemote { authority: String },
    /// The combined external-authority index; labels are selected
    /// language-aware against the caller's requested language, falling
    /// back to the service default.
    ExternalCombined { lang: String, default_lang: String },
}

impl SourceVariant {
    /// Map one raw hit into the canonical record shape.
    pub fn normalize(&self, hit: &SearchHit) -> Result<HitRecord, AlignError> {
        match self {
            SourceVariant::MergedIndex => normalize_merged(hit),
            SourceVariant::ExternalRemote { authority } => normalize_remote(hit, authority),
            SourceVariant::ExternalCombined { lang, default_lang } => {
                normalize_combined(hit, lang, default_lang)
            }
        }
    }
}

/// Normalize a batch, dropping (and logging) any hit that fails.
pub fn normalize_batch(variant: &SourceVariant, hits: &[SearchHit]) -> Vec<HitRecord> {
    hits.iter()
        .filter_map(|hit| match variant.normalize(hit) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(source_id = %hit.id, %err, "dropping unnormalizable hit");
                None
            }
        })
        .collect()
}

fn normalize_merged(hit: &SearchHit) -> Result<HitRecord, AlignError> {
    let src = &hit.source;
    let title = src
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| fail(&hit.id, "merged document has no title"))?;
    let dataset = src
        .get("dataset")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(HitRecord {
        record_id: src
            .get("place_id")
            .map(id_string)
            .unwrap_or_else(|| hit.id.clone()),
        title: title.to_string(),
        dataset: dataset.to_string(),
        score: hit.score,
        pass: hit.pass.tag().to_string(),
        variants: name_list(src),
        types: type_labels(src),
        countries: decode_countries(src),
        parents: src
            .get("relation")
            .and_then(|r| r.get("parent"))
            .and_then(Value::as_str)
            .map(|p| vec![p.to_string()])
            .unwrap_or_default(),
        geometries: representative_geometry(src, &hit.id, dataset),
        links: string_list(src, "links"),
        when: timespans(src),
    })
}

fn normalize_remote(hit: &SearchHit, authority: &str) -> Result<HitRecord, AlignError> {
    let src = &hit.source;
    let title = src
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| fail(&hit.id, "remote record has no label"))?;

    let mut variants = vec![title.to_string()];
    for alias in string_list(src, "aliases") {
        if !variants.contains(&alias) {
            variants.push(alias);
        }
    }

    Ok(HitRecord {
        record_id: src
            .get("id")
            .map(id_string)
            .unwrap_or_else(|| hit.id.clone()),
        title: title.to_string(),
        dataset: authority.to_string(),
        score: hit.score,
        pass: hit.pass.tag().to_string(),
        variants,
        types: {
            let labels: Vec<String> = string_list(src, "types");
            if labels.is_empty() {
                vec![DEFAULT_TYPE_LABEL.to_string()]
            } else {
                labels
            }
        },
        countries: src
            .get("country_codes")
            .and_then(Value::as_array)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(country_label)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        parents: Vec::new(),
        geometries: src
            .get("location")
            .filter(|g| !g.is_null())
            .map(|g| {
                vec![HitGeometry {
                    geom: g.clone(),
                    src_id: hit.id.clone(),
                    origin: authority.to_string(),
                }]
            })
            .unwrap_or_default(),
        links: string_list(src, "links"),
        when: timespans(src),
    })
}

fn normalize_combined(hit: &SearchHit, lang: &str, default_lang: &str) -> Result<HitRecord, AlignError> {
    let src = &hit.source;
    let dataset = src
        .get("dataset")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let names = src
        .get("names")
        .and_then(Value::as_array)
        .ok_or_else(|| fail(&hit.id, "combined document has no names"))?;
    if names.is_empty() {
        return Err(fail(&hit.id, "combined document has an empty name list"));
    }

    let title = if dataset == FIRST_NAME_SOURCE {
        toponym(&names[0])
    } else {
        pick_label(names, lang)
            .or_else(|| pick_label(names, default_lang))
            .or_else(|| toponym(&names[0]))
    }
    .ok_or_else(|| fail(&hit.id, "no usable name label"))?;

    Ok(HitRecord {
        record_id: src
            .get("authrecord_id")
            .map(id_string)
            .unwrap_or_else(|| hit.id.clone()),
        title,
        dataset,
        score: hit.score,
        pass: hit.pass.tag().to_string(),
        variants: name_list(src),
        types: type_labels(src),
        countries: decode_countries(src),
        parents: string_list(src, "parents"),
        geometries: representative_geometry(
            src,
            &hit.id,
            src.get("dataset").and_then(Value::as_str).unwrap_or(""),
        ),
        links: string_list(src, "links"),
        when: timespans(src),
    })
}

fn fail(source_id: &str, reason: &str) -> AlignError {
    AlignError::Normalize {
        source_id: source_id.to_string(),
        reason: reason.to_string(),
    }
}

/// Ids come through as numbers or strings depending on the source.
fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn toponym(name: &Value) -> Option<String> {
    name.get("toponym")
        .and_then(Value::as_str)
        .map(String::from)
}

fn pick_label(names: &[Value], lang: &str) -> Option<String> {
    names
        .iter()
        .find(|n| n.get("lang").and_then(Value::as_str) == Some(lang))
        .and_then(toponym)
}

fn name_list(src: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(names) = src.get("names").and_then(Value::as_array) {
        for n in names {
            if let Some(t) = toponym(n) {
                if !out.contains(&t) {
                    out.push(t);
                }
            }
        }
    }
    out
}

fn string_list(src: &Value, field: &str) -> Vec<String> {
    src.get(field)
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Structured type-authority identifier when present, class-label
/// fallback otherwise, generic settlement label for anything unmapped.
fn type_labels(src: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(types) = src.get("types").and_then(Value::as_array) {
        for t in types {
            let label = t
                .get("identifier")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .unwrap_or_else(|| {
                    t.get("label")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .unwrap_or_else(|| DEFAULT_TYPE_LABEL.to_string())
                });
            if !out.contains(&label) {
                out.push(label);
            }
        }
    }
    if out.is_empty() {
        for fclass in string_list(src, "fclasses") {
            let label = class_label(&fclass).to_string();
            if !out.contains(&label) {
                out.push(label);
            }
        }
    }
    out
}

/// Decode 2-letter codes to display labels; empty and placeholder
/// entries normalize to an empty list.
fn decode_countries(src: &Value) -> Vec<String> {
    string_list(src, "ccodes")
        .iter()
        .filter_map(|c| country_label(c))
        .map(String::from)
        .collect()
}

/// At most one representative geometry per record, tagged with source id
/// and origin.
fn representative_geometry(src: &Value, src_id: &str, origin: &str) -> Vec<HitGeometry> {
    let geom = src
        .get("geoms")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|g| g.get("location").or(Some(g)))
        .cloned()
        .or_else(|| src.get("geom").filter(|g| !g.is_null()).cloned());
    geom.map(|g| {
        vec![HitGeometry {
            geom: g,
            src_id: src_id.to_string(),
            origin: origin.to_string(),
        }]
    })
    .unwrap_or_default()
}

/// Timespans sorted descending by start year.
fn timespans(src: &Value) -> Vec<TimeSpan> {
    let mut spans: Vec<TimeSpan> = src
        .get("timespans")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(|s| {
                    let arr = s.as_array()?;
                    Some(TimeSpan {
                        start: arr.first()?.as_i64()? as i32,
                        end: arr.get(1).and_then(Value::as_i64).unwrap_or(arr.first()?.as_i64()?)
                            as i32,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    spans.sort_by(|a, b| b.start.cmp(&a.start));
    spans
}
