use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, image},
    common::photo::Photo,
    db::voter::{EnrolledVoter, NewVoter},
};

/// A voter identity to enrol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterSpec {
    pub full_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, with = "image::option")]
    pub reference_photo: Option<Photo>,
}

impl From<VoterSpec> for NewVoter {
    fn from(spec: VoterSpec) -> Self {
        Self {
            full_name: spec.full_name,
            state: spec.state,
            city: spec.city,
            reference_photo: spec.reference_photo,
        }
    }
}

/// An API-friendly voter description. The reference photo never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: ApiId,
    pub full_name: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub has_reference_photo: bool,
}

impl From<EnrolledVoter> for VoterDescription {
    fn from(voter: EnrolledVoter) -> Self {
        let id = voter.id.into();
        let voter = voter.voter;
        Self {
            id,
            full_name: voter.full_name,
            state: voter.state,
            city: voter.city,
            has_reference_photo: voter.reference_photo.is_some(),
        }
    }
}
