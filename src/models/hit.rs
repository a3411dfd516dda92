//! Raw index hits, the canonical normalized hit record, and the
//! parent/child cluster candidate used when populating the merged index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tier of the cascading relaxation strategy.
///
/// External-authority lookups cascade `External0 → External1 → External2`,
/// stopping at the first non-empty tier. Merged-index lookups run
/// `Merged0a`, at most one `Merged0b` hop, then always `Merged1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pass {
    External0,
    External1,
    External2,
    Merged0a,
    Merged0b,
    Merged1,
}

impl Pass {
    /// Full tag, distinguishing sub-tiers.
    pub fn tag(self) -> &'static str {
        match self {
            Pass::External0 => "pass0",
            Pass::External1 => "pass1",
            Pass::External2 => "pass2",
            Pass::Merged0a => "pass0a",
            Pass::Merged0b => "pass0b",
            Pass::Merged1 => "pass1",
        }
    }

    /// Coarse bucket, collapsing sub-tier distinctions (`pass0a` and
    /// `pass0b` both report as `pass0`). Used on cluster source profiles.
    pub fn coarse(self) -> &'static str {
        match self {
            Pass::External0 | Pass::Merged0a | Pass::Merged0b => "pass0",
            Pass::External1 | Pass::Merged1 => "pass1",
            Pass::External2 => "pass2",
        }
    }
}

/// Parent/child structural relation carried by merged-index documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitRelation {
    /// A parent document, listing its own children's document ids.
    Parent { children: Vec<String> },
    /// A child document, pointing at its parent.
    Child { parent: Option<String> },
}

/// A raw search-index hit, tagged with the pass that produced it.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub source: Value,
    pub pass: Pass,
}

impl SearchHit {
    /// Parse the merged-index parent/child relation from the source
    /// document. Documents without a relation block default to parents
    /// with no children.
    pub fn relation(&self) -> HitRelation {
        let rel = &self.source["relation"];
        match rel.get("name").and_then(Value::as_str) {
            Some("child") => HitRelation::Child {
                parent: rel.get("parent").and_then(Value::as_str).map(String::from),
            },
            _ => HitRelation::Parent {
                children: self.source["children"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        }
    }
}

/// Result of one index search call.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

/// One representative geometry on a normalized hit, tagged with where it
/// came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitGeometry {
    pub geom: Value,
    pub src_id: String,
    pub origin: String,
}

/// A temporal span in years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: i32,
    pub end: i32,
}

/// Canonical normalized candidate record — every source variant maps its
/// raw hit document into this one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitRecord {
    /// Place or source record id in the hit's own namespace.
    pub record_id: String,
    pub title: String,
    pub dataset: String,
    pub score: f64,
    /// Full pass tag (`pass0`, `pass0a`, …).
    pub pass: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub geometries: Vec<HitGeometry>,
    #[serde(default)]
    pub links: Vec<String>,
    /// Temporal extent, sorted descending by start year.
    #[serde(default)]
    pub when: Vec<TimeSpan>,
}

/// One contributing record inside a cluster candidate, keeping its own
/// coarse pass tag, variants, types, and temporal extent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProfile {
    pub record_id: String,
    pub dataset: String,
    /// Coarse pass bucket (sub-tiers collapsed).
    pub pass: String,
    pub variants: Vec<String>,
    pub types: Vec<String>,
    pub when: Vec<TimeSpan>,
}

/// Aggregated parent+children candidate, one per parent in a merged-index
/// result batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCandidate {
    /// The parent's merged-index document id.
    pub merged_id: String,
    /// Parent score plus the sum of attached children's scores.
    pub score: f64,
    pub titles: Vec<String>,
    pub countries: Vec<String>,
    pub geometries: Vec<HitGeometry>,
    pub links: Vec<String>,
    /// One profile per contributing record (parent first, then attached
    /// children).
    pub sources: Vec<SourceProfile>,
    /// Deduplicated union of all sources' pass tags.
    pub passes: Vec<String>,
}

/// A place that yielded zero hits in a merged-index lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedMatch {
    pub place_id: i64,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coarse_bucket_collapses_sub_tiers() {
        assert_eq!(Pass::Merged0a.coarse(), "pass0");
        assert_eq!(Pass::Merged0b.coarse(), "pass0");
        assert_eq!(Pass::Merged0a.tag(), "pass0a");
        assert_eq!(Pass::External2.coarse(), "pass2");
    }

    #[test]
    fn relation_parses_child_and_parent() {
        let child = SearchHit {
            id: "14".to_string(),
            score: 1.0,
            source: json!({"relation": {"name": "child", "parent": "12"}}),
            pass: Pass::Merged1,
        };
        assert_eq!(
            child.relation(),
            HitRelation::Child { parent: Some("12".to_string()) }
        );

        let parent = SearchHit {
            id: "12".to_string(),
            score: 2.0,
            source: json!({"relation": {"name": "parent"}, "children": ["14", "15"]}),
            pass: Pass::Merged1,
        };
        assert_eq!(
            parent.relation(),
            HitRelation::Parent { children: vec!["14".to_string(), "15".to_string()] }
        );
    }
}
