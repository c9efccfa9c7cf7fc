use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, image},
    common::photo::Photo,
    db::ballot::Ballot,
};

/// A vote the caller wishes to cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: ApiId,
    /// Freshly captured photo of the voter's face.
    #[serde(with = "image")]
    pub live_image: Photo,
}

/// What the voter gets back for a recorded ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub ballot_id: ApiId,
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub cast_at: DateTime<Utc>,
    /// Hex SHA-256 digest identifying this ballot.
    pub receipt: String,
}

impl From<Ballot> for BallotReceipt {
    fn from(ballot: Ballot) -> Self {
        Self {
            ballot_id: ballot.id.into(),
            election_id: ballot.election_id.into(),
            candidate_id: ballot.candidate_id.into(),
            cast_at: ballot.cast_at,
            receipt: ballot.receipt,
        }
    }
}

/// Advisory voted flag, for disabling the vote button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotedStatus {
    pub has_voted: bool,
}
