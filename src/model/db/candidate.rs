use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        election::{ElectionId, VoterId},
        photo::Photo,
    },
    mongodb::Id,
};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Foreign Key election ID.
    pub election_id: ElectionId,
    /// Foreign Key voter ID: every candidate is also an enrolled voter.
    pub voter_id: VoterId,
    pub party_name: String,
    pub party_symbol: String,
    pub manifesto: String,
    /// Set at most once unless the deployment allows overwriting.
    pub photo: Option<Photo>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
}

/// A candidate without an ID or roster position.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID and roster position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Registration order within the election, used to break ranking ties.
    pub position: u64,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    pub fn new(candidate: NewCandidate, position: u64) -> Self {
        Self {
            id: Id::new(),
            position,
            candidate,
        }
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
