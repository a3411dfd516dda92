//! Core data model: the place read model, ephemeral query facts, raw and
//! normalized hits, and cluster candidates.

pub mod hit;
pub mod place;

pub use hit::{
    ClusterCandidate, HitGeometry, HitRecord, HitRelation, MissedMatch, Pass, SearchHit,
    SearchResponse, SourceProfile, TimeSpan,
};
pub use place::{
    CandidateQuery, Place, PlaceGeometry, PlaceLink, PlaceName, PlaceType, ReviewState,
};
