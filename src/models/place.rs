//! The place read model and the ephemeral per-run query facts.
//!
//! `Place` mirrors the dataset system's source-of-truth record; this core
//! only reads it and writes review/indexed flags back. `CandidateQuery` is
//! built fresh for each alignment run and discarded after.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-authority human-review state for a place.
///
/// This core only ever writes `Unreviewed` (on any non-zero lookup
/// outcome); `Reviewed` is set exclusively by a human action in the
/// review surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    Unreviewed,
    Reviewed,
    Deferred,
}

impl ReviewState {
    /// Integer encoding used by the places table (0/1/2).
    pub fn as_i16(self) -> i16 {
        match self {
            ReviewState::Unreviewed => 0,
            ReviewState::Reviewed => 1,
            ReviewState::Deferred => 2,
        }
    }
}

/// A name attested for a place, with optional language tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceName {
    pub toponym: String,
    #[serde(default)]
    pub lang: Option<String>,
}

/// A place type, optionally carrying a structured type-authority
/// identifier (e.g. an AAT concept id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceType {
    pub label: String,
    #[serde(default)]
    pub identifier: Option<String>,
}

/// A concordance link to an external authority record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceLink {
    pub authority: String,
    pub identifier: String,
}

impl PlaceLink {
    /// Qualified form used in index documents, e.g. `wd:Q5806`.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.authority, self.identifier)
    }

    /// Parse a qualified `authority:identifier` string.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (authority, identifier) = qualified.split_once(':')?;
        if authority.is_empty() || identifier.is_empty() {
            return None;
        }
        Some(Self {
            authority: authority.to_string(),
            identifier: identifier.to_string(),
        })
    }
}

/// A geometry attached to a place (GeoJSON value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceGeometry {
    pub geom: Value,
    #[serde(default)]
    pub src: Option<String>,
}

/// Source-of-truth place record being aligned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub title: String,
    pub src_id: String,
    pub dataset: String,
    #[serde(default)]
    pub ccodes: Vec<String>,
    #[serde(default)]
    pub fclasses: Vec<String>,
    #[serde(default)]
    pub names: Vec<PlaceName>,
    #[serde(default)]
    pub types: Vec<PlaceType>,
    #[serde(default)]
    pub links: Vec<PlaceLink>,
    #[serde(default)]
    pub geoms: Vec<PlaceGeometry>,
    /// Temporal extent as [earliest, latest] years, when known.
    #[serde(default)]
    pub minmax: Option<[i32; 2]>,
}

/// Ephemeral per-place query facts, built once per alignment run.
#[derive(Debug, Clone, Default)]
pub struct CandidateQuery {
    /// Title plus all attested toponyms, order-preserving-deduplicated.
    pub variants: Vec<String>,
    /// Structured type-authority identifiers mapped from the place types.
    pub placetypes: Vec<String>,
    pub countries: Vec<String>,
    pub fclasses: Vec<String>,
    /// Convex hull (or sole geometry) of the place's own geometries,
    /// as a GeoJSON value ready for a geo-shape filter.
    pub geom_hull: Option<Value>,
    /// Named study-area hull supplied by the caller; used only when the
    /// place itself has no geometry.
    pub area_hull: Option<Value>,
    /// Qualified external ids (`authority:identifier`).
    pub links: Vec<String>,
}

impl CandidateQuery {
    /// Build query facts from a place. `area_hull` is the optional named
    /// study-area geometry supplied by the surrounding dataset system.
    pub fn from_place(place: &Place, area_hull: Option<Value>) -> Self {
        let mut variants: Vec<String> = Vec::new();
        let mut push_variant = |v: &str| {
            if !v.is_empty() && !variants.iter().any(|x| x == v) {
                variants.push(v.to_string());
            }
        };
        push_variant(&place.title);
        for name in &place.names {
            push_variant(&name.toponym);
        }

        let placetypes = place
            .types
            .iter()
            .filter_map(|t| t.identifier.clone())
            .collect();

        Self {
            variants,
            placetypes,
            countries: place.ccodes.clone(),
            fclasses: place.fclasses.clone(),
            geom_hull: geometry_hull(&place.geoms),
            area_hull,
            links: place.links.iter().map(PlaceLink::qualified).collect(),
        }
    }

    /// Whether any spatial constraint (own hull or study area) exists.
    pub fn has_spatial(&self) -> bool {
        self.geom_hull.is_some() || self.area_hull.is_some()
    }
}

/// Reduce a place's geometries to one GeoJSON shape for a geo-shape
/// filter: a sole geometry passes through; multiple point geometries
/// collapse to their bounding envelope; anything else falls back to the
/// first geometry.
fn geometry_hull(geoms: &[PlaceGeometry]) -> Option<Value> {
    match geoms.len() {
        0 => None,
        1 => Some(geoms[0].geom.clone()),
        _ => {
            let mut min_lng = f64::MAX;
            let mut min_lat = f64::MAX;
            let mut max_lng = f64::MIN;
            let mut max_lat = f64::MIN;
            let mut points = 0usize;
            for g in geoms {
                if g.geom.get("type").and_then(Value::as_str) == Some("Point") {
                    if let Some(coords) = g.geom.get("coordinates").and_then(Value::as_array) {
                        if let (Some(lng), Some(lat)) =
                            (coords.first().and_then(Value::as_f64), coords.get(1).and_then(Value::as_f64))
                        {
                            min_lng = min_lng.min(lng);
                            max_lng = max_lng.max(lng);
                            min_lat = min_lat.min(lat);
                            max_lat = max_lat.max(lat);
                            points += 1;
                        }
                    }
                }
            }
            if points == geoms.len() && points > 0 {
                // Elasticsearch envelope: [[min_lng, max_lat], [max_lng, min_lat]]
                Some(serde_json::json!({
                    "type": "envelope",
                    "coordinates": [[min_lng, max_lat], [max_lng, min_lat]]
                }))
            } else {
                Some(geoms[0].geom.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(lng: f64, lat: f64) -> PlaceGeometry {
        PlaceGeometry {
            geom: json!({"type": "Point", "coordinates": [lng, lat]}),
            src: None,
        }
    }

    #[test]
    fn variants_dedupe_preserving_order() {
        let place = Place {
            id: 1,
            title: "Abydos".to_string(),
            src_id: "a1".to_string(),
            dataset: "demo".to_string(),
            ccodes: vec![],
            fclasses: vec![],
            names: vec![
                PlaceName { toponym: "Abydos".to_string(), lang: Some("en".to_string()) },
                PlaceName { toponym: "Abdju".to_string(), lang: None },
            ],
            types: vec![],
            links: vec![],
            geoms: vec![],
            minmax: None,
        };
        let cq = CandidateQuery::from_place(&place, None);
        assert_eq!(cq.variants, vec!["Abydos", "Abdju"]);
    }

    #[test]
    fn multiple_points_collapse_to_envelope() {
        let hull = geometry_hull(&[point(31.0, 26.0), point(32.0, 27.0)]).unwrap();
        assert_eq!(hull["type"], "envelope");
        assert_eq!(hull["coordinates"][0][0], 31.0);
        assert_eq!(hull["coordinates"][0][1], 27.0);
    }

    #[test]
    fn sole_geometry_passes_through() {
        let hull = geometry_hull(&[point(31.0, 26.0)]).unwrap();
        assert_eq!(hull["type"], "Point");
    }

    #[test]
    fn qualified_link_roundtrip() {
        let link = PlaceLink::parse("wd:Q5806").unwrap();
        assert_eq!(link.authority, "wd");
        assert_eq!(link.qualified(), "wd:Q5806");
        assert!(PlaceLink::parse("no-colon").is_none());
    }
}
