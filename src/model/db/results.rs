use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionId};

/// The most recent tally of an election. There is exactly one snapshot per
/// election, keyed by the election ID, and recalculation replaces it whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    #[serde(rename = "_id")]
    pub election_id: ElectionId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub calculated_at: DateTime<Utc>,
    /// Per-candidate standings, best first.
    pub standings: Vec<Standing>,
    pub report: ElectionReport,
}

/// One candidate's line in the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub candidate_id: CandidateId,
    pub vote_count: u64,
    /// Share of all ballots, to two decimal places.
    pub vote_percentage: f64,
    /// Competition rank: tied candidates share a rank and the next rank is skipped.
    pub rank_position: u32,
}

/// Summary figures computed alongside each tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionReport {
    pub total_ballots: u64,
    pub total_candidates: u64,
    pub registered_voters: u64,
    pub turnout_percentage: f64,
    /// The first-ranked candidate, absent when the roster is empty.
    pub winning_candidate: Option<CandidateId>,
    /// Votes between first and second place.
    pub winning_margin: Option<u64>,
}
