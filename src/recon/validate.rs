//! Per-query validation for the reconciliation protocol. Bad input fails
//! only the query that carried it, as a structured error payload.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ReconError;
use crate::index::geo::{self, max_radius_km, DEFAULT_VERTICES};
use crate::normalize::FCLASS_WHITELIST;

/// Default result limit per query.
pub const DEFAULT_LIMIT: usize = 10;

/// One incoming reconciliation query, as posted by the client.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReconQuery {
    /// Free-text name to match.
    #[serde(default)]
    pub query: Option<String>,
    /// Center+radius "nearby" constraint; takes precedence over
    /// `bounds` when both are given.
    #[serde(default)]
    pub nearby: Option<Nearby>,
    /// Explicit bounding polygon (GeoJSON).
    #[serde(default)]
    pub bounds: Option<Value>,
    /// Restrict matches to one contributing dataset.
    #[serde(default)]
    pub dataset: Option<String>,
    /// Feature-class codes to filter on.
    #[serde(default)]
    pub fclasses: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Nearby {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
}

/// A query that passed validation, with the spatial constraint already
/// reduced to one index-ready shape.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub text: Option<String>,
    pub shape: Option<Value>,
    pub dataset: Option<String>,
    pub fclasses: Vec<String>,
    pub limit: usize,
}

/// Validate one query. At least one of free text, a spatial constraint,
/// or a dataset filter is required; the nearby circle wins over an
/// explicit polygon; feature-class codes are case-normalized and checked
/// against the fixed whitelist.
pub fn validate(q: &ReconQuery) -> Result<ValidatedQuery, ReconError> {
    let text = q
        .query
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);
    let dataset = q
        .dataset
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);

    let shape = match (&q.nearby, &q.bounds) {
        (Some(circle), _) => Some(circle_shape(circle)?),
        (None, Some(bounds)) if !bounds.is_null() => Some(bounds.clone()),
        _ => None,
    };

    if text.is_none() && shape.is_none() && dataset.is_none() {
        return Err(ReconError::EmptyQuery);
    }

    let mut fclasses = Vec::new();
    for code in q.fclasses.iter().flatten() {
        let upper = code.trim().to_ascii_uppercase();
        if upper.is_empty() {
            continue;
        }
        if !FCLASS_WHITELIST.contains(&upper.as_str()) {
            return Err(ReconError::BadFeatureClass {
                code: code.clone(),
                allowed: FCLASS_WHITELIST.join(", "),
            });
        }
        if !fclasses.contains(&upper) {
            fclasses.push(upper);
        }
    }

    Ok(ValidatedQuery {
        text,
        shape,
        dataset,
        fclasses,
        limit: q.limit.unwrap_or(DEFAULT_LIMIT).max(1),
    })
}

fn circle_shape(circle: &Nearby) -> Result<Value, ReconError> {
    if !(-90.0..=90.0).contains(&circle.lat) || !(-180.0..=180.0).contains(&circle.lng) {
        return Err(ReconError::BadCoordinates { lat: circle.lat, lng: circle.lng });
    }
    if circle.radius_km <= 0.0 || circle.radius_km > max_radius_km() {
        return Err(ReconError::BadRadius {
            radius: circle.radius_km,
            max: max_radius_km(),
        });
    }
    Ok(geo::circle_to_geojson(circle.lat, circle.lng, circle.radius_km, DEFAULT_VERTICES))
}

/// Build the index query for a validated reconciliation query.
pub fn to_index_query(v: &ValidatedQuery) -> Value {
    let mut must = Vec::new();
    let mut filter = Vec::new();

    if let Some(text) = &v.text {
        must.push(json!({
            "multi_match": {
                "query": text,
                "fields": ["title", "names", "searchy"],
                "fuzziness": "AUTO"
            }
        }));
    }
    if let Some(shape) = &v.shape {
        filter.push(json!({
            "geo_shape": { "geom": { "shape": shape, "relation": "intersects" } }
        }));
    }
    if let Some(dataset) = &v.dataset {
        filter.push(json!({"term": {"dataset": dataset}}));
    }
    if !v.fclasses.is_empty() {
        filter.push(json!({"terms": {"fclasses": v.fclasses}}));
    }

    let mut bool_q = json!({});
    if !must.is_empty() {
        bool_q["must"] = Value::Array(must);
    }
    if !filter.is_empty() {
        bool_q["filter"] = Value::Array(filter);
    }
    json!({"query": {"bool": bool_q}})
}
