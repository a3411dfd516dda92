//! The data-extension sub-protocol: given record ids and a fixed small
//! property vocabulary, return one row per id with one typed cell per
//! property.
//!
//! Protocol quirk, preserved deliberately: a geometry request emits a
//! side-channel of GeoJSON Feature objects for all requested records and
//! collapses its own cell to a boolean flag.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ReconError;
use crate::index::SearchIndexGateway;

/// One property in the extend vocabulary.
pub struct ExtendProperty {
    pub id: &'static str,
    pub name: &'static str,
    /// Cell type: `string[]`, `range`, `string`, or `geojson-ref`.
    pub kind: &'static str,
}

/// The fixed property vocabulary.
pub const EXTEND_PROPERTIES: &[ExtendProperty] = &[
    ExtendProperty { id: "whg:variants", name: "alternate names", kind: "string[]" },
    ExtendProperty { id: "whg:when", name: "temporal range", kind: "range" },
    ExtendProperty { id: "whg:dataset", name: "dataset", kind: "string" },
    ExtendProperty { id: "whg:ccodes", name: "country codes", kind: "string[]" },
    ExtendProperty { id: "whg:geom", name: "geometry", kind: "geojson-ref" },
];

/// An extend request: record ids plus requested properties.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtendRequest {
    pub ids: Vec<String>,
    pub properties: Vec<PropertyRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyRef {
    pub id: String,
}

/// Run an extend request against the merged index.
pub async fn run_extend(
    gateway: &dyn SearchIndexGateway,
    index: &str,
    request: &ExtendRequest,
) -> Result<Value, ReconError> {
    for p in &request.properties {
        if !EXTEND_PROPERTIES.iter().any(|known| known.id == p.id) {
            return Err(ReconError::Malformed(format!("unknown property '{}'", p.id)));
        }
    }

    let query = json!({"query": {"ids": {"values": request.ids}}});
    let resp = gateway
        .search(index, &query)
        .await
        .map_err(|e| ReconError::Malformed(e.to_string()))?;

    let wants_geom = request.properties.iter().any(|p| p.id == "whg:geom");
    let mut rows = Map::new();
    let mut features = Vec::new();

    for id in &request.ids {
        let doc = resp.hits.iter().find(|h| &h.id == id).map(|h| &h.source);
        let mut cells = Map::new();
        for p in &request.properties {
            cells.insert(p.id.clone(), cell(p.id.as_str(), doc));
        }
        rows.insert(id.clone(), Value::Object(cells));

        if wants_geom {
            if let Some(feature) = feature_for(id, doc) {
                features.push(feature);
            }
        }
    }

    let meta: Vec<Value> = request
        .properties
        .iter()
        .filter_map(|p| EXTEND_PROPERTIES.iter().find(|known| known.id == p.id))
        .map(|p| json!({"id": p.id, "name": p.name}))
        .collect();

    let mut out = json!({"meta": meta, "rows": rows});
    if wants_geom {
        out["features"] = Value::Array(features);
    }
    Ok(out)
}

/// One typed cell. Records absent from the index get the property's
/// empty value rather than an error.
fn cell(property: &str, doc: Option<&Value>) -> Value {
    match property {
        "whg:variants" => doc
            .and_then(|d| d.get("names"))
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| {
                        n.get("toponym")
                            .and_then(Value::as_str)
                            .or_else(|| n.as_str())
                    })
                    .collect::<Vec<_>>()
            })
            .map(|v| json!(v))
            .unwrap_or_else(|| json!([])),
        "whg:when" => doc
            .and_then(|d| d.get("timespans"))
            .and_then(Value::as_array)
            .filter(|spans| !spans.is_empty())
            .map(|spans| {
                let starts: Vec<i64> = spans
                    .iter()
                    .filter_map(|s| s.as_array()?.first()?.as_i64())
                    .collect();
                let ends: Vec<i64> = spans
                    .iter()
                    .filter_map(|s| {
                        let arr = s.as_array()?;
                        arr.get(1).or_else(|| arr.first())?.as_i64()
                    })
                    .collect();
                match (starts.iter().min(), ends.iter().max()) {
                    (Some(start), Some(end)) => json!({"start": start, "end": end}),
                    _ => json!({}),
                }
            })
            .unwrap_or_else(|| json!({})),
        "whg:dataset" => doc
            .and_then(|d| d.get("dataset"))
            .and_then(Value::as_str)
            .map(|s| json!(s))
            .unwrap_or_else(|| json!("")),
        "whg:ccodes" => doc
            .and_then(|d| d.get("ccodes"))
            .cloned()
            .unwrap_or_else(|| json!([])),
        // cell collapses to a flag; the geometry itself travels in the
        // side-channel feature list
        "whg:geom" => json!(doc.map(has_geometry).unwrap_or(false)),
        _ => Value::Null,
    }
}

fn has_geometry(doc: &Value) -> bool {
    doc.get("geom").map(|g| !g.is_null()).unwrap_or(false)
        || doc
            .get("geoms")
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false)
}

fn feature_for(id: &str, doc: Option<&Value>) -> Option<Value> {
    let doc = doc?;
    let geometry = doc
        .get("geom")
        .filter(|g| !g.is_null())
        .cloned()
        .or_else(|| {
            doc.get("geoms")
                .and_then(Value::as_array)
                .and_then(|a| a.first())
                .and_then(|g| g.get("location").or(Some(g)))
                .cloned()
        })?;
    Some(json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "id": id,
            "title": doc.get("title").cloned().unwrap_or(Value::Null),
        }
    }))
}
