use chrono::{DateTime, Duration, Utc};
use data_encoding::HEXLOWER;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::common::election::{BallotId, CandidateId, ElectionId, VoterId};

/// A cast ballot. Ballots are append-only: once written they are never
/// updated or deleted, and at most one exists per (voter, election).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: BallotId,
    /// Foreign Key election ID.
    pub election_id: ElectionId,
    /// Foreign Key voter ID.
    pub voter_id: VoterId,
    /// Foreign Key candidate ID.
    pub candidate_id: CandidateId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// Embedding distance observed when the voter was verified, kept for audit.
    pub verification_distance: f64,
    /// Hex SHA-256 digest handed back to the voter as a receipt.
    pub receipt: String,
}

impl Ballot {
    /// Create a new ballot, stamping it with the current time and its receipt digest.
    pub fn new(
        election_id: ElectionId,
        voter_id: VoterId,
        candidate_id: CandidateId,
        verification_distance: f64,
    ) -> Self {
        let id = BallotId::new();
        // Millisecond precision is all that survives a round trip through BSON.
        let now = Utc::now();
        let cast_at = now - Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos() % 1_000_000));
        let receipt = receipt_digest(id, election_id, voter_id, candidate_id, cast_at);
        Self {
            id,
            election_id,
            voter_id,
            candidate_id,
            cast_at,
            verification_distance,
            receipt,
        }
    }
}

fn receipt_digest(
    id: BallotId,
    election_id: ElectionId,
    voter_id: VoterId,
    candidate_id: CandidateId,
    cast_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.bytes());
    hasher.update(election_id.bytes());
    hasher.update(voter_id.bytes());
    hasher.update(candidate_id.bytes());
    hasher.update(cast_at.timestamp_millis().to_le_bytes());
    HEXLOWER.encode(&hasher.finalize())
}
