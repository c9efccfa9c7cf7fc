use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, image},
    common::photo::Photo,
    db::candidate::Candidate,
};
use crate::service::CandidateRegistration;

/// A candidate to register on a roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// The enrolled voter standing as a candidate.
    pub voter_id: ApiId,
    pub party_name: String,
    #[serde(default)]
    pub party_symbol: String,
    #[serde(default)]
    pub manifesto: String,
    #[serde(default, with = "image::option")]
    pub photo: Option<Photo>,
}

impl From<CandidateSpec> for CandidateRegistration {
    fn from(spec: CandidateSpec) -> Self {
        Self {
            voter_id: spec.voter_id.into(),
            party_name: spec.party_name,
            party_symbol: spec.party_symbol,
            manifesto: spec.manifesto,
            photo: spec.photo,
        }
    }
}

/// A photo to attach to an existing candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoUpload {
    #[serde(with = "image")]
    pub photo: Photo,
}

/// An API-friendly candidate description. Photos are not inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub voter_id: ApiId,
    /// Registration order, starting at 1.
    pub position: u64,
    pub party_name: String,
    pub party_symbol: String,
    pub manifesto: String,
    pub has_photo: bool,
    pub registered_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let (id, position) = (candidate.id.into(), candidate.position);
        let candidate = candidate.candidate;
        Self {
            id,
            election_id: candidate.election_id.into(),
            voter_id: candidate.voter_id.into(),
            position,
            party_name: candidate.party_name,
            party_symbol: candidate.party_symbol,
            manifesto: candidate.manifesto,
            has_photo: candidate.photo.is_some(),
            registered_at: candidate.registered_at,
        }
    }
}
