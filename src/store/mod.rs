//! Persistence for voters, elections, candidates, ballots and results.
//!
//! Every operation that must stay correct under concurrency is expressed as a
//! single atomic store call: ballot uniqueness is enforced by the store itself,
//! and status changes are compare-and-set on the current value.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    common::{
        election::{CandidateId, ElectionId, ElectionStatus, VoterId},
        photo::Photo,
    },
    db::{
        ballot::Ballot,
        candidate::{Candidate, NewCandidate},
        election::Election,
        results::ResultSnapshot,
        voter::EnrolledVoter,
    },
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[rocket::async_trait]
pub trait Store: Send + Sync {
    async fn insert_voter(&self, voter: &EnrolledVoter) -> Result<()>;

    async fn voter(&self, id: VoterId) -> Result<Option<EnrolledVoter>>;

    async fn count_voters(&self) -> Result<u64>;

    /// Insert a new election and set up its roster position sequence.
    async fn insert_election(&self, election: &Election) -> Result<()>;

    async fn election(&self, id: ElectionId) -> Result<Option<Election>>;

    /// Elections in any of the given states, by start time. No states means all.
    async fn elections(&self, statuses: &[ElectionStatus]) -> Result<Vec<Election>>;

    /// Move an election from `from` to `to`, only if it is still in `from`.
    /// Returns whether the update happened.
    async fn transition_status(
        &self,
        id: ElectionId,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool>;

    /// Flip the published flag, only if it is currently `current`.
    /// Returns whether the update happened.
    async fn set_result_published(
        &self,
        id: ElectionId,
        current: bool,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Add a candidate to the end of its election's roster.
    ///
    /// Fails with `AlreadyCandidate` if the voter is already on that roster.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>>;

    /// The roster of an election, in registration order.
    async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>>;

    /// Set a candidate's photo. Without `overwrite`, only succeeds if the
    /// candidate has no photo yet. Returns whether the update happened.
    async fn set_candidate_photo(
        &self,
        id: CandidateId,
        photo: &Photo,
        overwrite: bool,
    ) -> Result<bool>;

    /// Append a ballot.
    ///
    /// Fails with `AlreadyVoted` if the voter already has a ballot for the
    /// election, no matter how many inserts race.
    async fn insert_ballot(&self, ballot: &Ballot) -> Result<()>;

    async fn ballot_for(&self, voter_id: VoterId, election_id: ElectionId)
        -> Result<Option<Ballot>>;

    /// A consistent view of every ballot cast in an election.
    async fn ballots(&self, election_id: ElectionId) -> Result<Vec<Ballot>>;

    /// Store a results snapshot, replacing any previous one for the election.
    async fn replace_results(&self, snapshot: &ResultSnapshot) -> Result<()>;

    async fn results(&self, election_id: ElectionId) -> Result<Option<ResultSnapshot>>;
}

pub type SharedStore = Arc<dyn Store>;
