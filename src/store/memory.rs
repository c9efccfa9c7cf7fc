use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::tokio::sync::RwLock;

use crate::error::{Error, Result};
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

use super::Store;

#[derive(Default)]
struct Tables {
    voters: HashMap<VoterId, EnrolledVoter>,
    elections: HashMap<ElectionId, Election>,
    candidates: HashMap<CandidateId, Candidate>,
    ballots: HashMap<(VoterId, ElectionId), Ballot>,
    results: HashMap<ElectionId, ResultSnapshot>,
    /// Next roster position per election.
    positions: HashMap<ElectionId, u64>,
}

/// A process-local store, used for single-node deployments and tests.
///
/// Every operation takes the table lock once, so each call is atomic in the
/// same way a single-document write is atomic in MongoDB.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ballots held across all elections.
    #[cfg(test)]
    pub async fn ballot_count(&self) -> usize {
        self.tables.read().await.ballots.len()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_voter(&self, voter: &EnrolledVoter) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.voters.insert(voter.id, voter.clone());
        Ok(())
    }

    async fn voter(&self, id: VoterId) -> Result<Option<EnrolledVoter>> {
        Ok(self.tables.read().await.voters.get(&id).cloned())
    }

    async fn count_voters(&self) -> Result<u64> {
        Ok(self.tables.read().await.voters.len() as u64)
    }

    async fn insert_election(&self, election: &Election) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.positions.insert(election.id, 1);
        tables.elections.insert(election.id, election.clone());
        Ok(())
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.tables.read().await.elections.get(&id).cloned())
    }

    async fn elections(&self, statuses: &[ElectionStatus]) -> Result<Vec<Election>> {
        let tables = self.tables.read().await;
        let mut elections: Vec<Election> = tables
            .elections
            .values()
            .filter(|e| statuses.is_empty() || statuses.contains(&e.status))
            .cloned()
            .collect();
        elections.sort_by_key(|e| (e.start_time, e.id));
        Ok(elections)
    }

    async fn transition_status(
        &self,
        id: ElectionId,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.elections.get_mut(&id) {
            Some(election) if election.status == from => {
                election.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_result_published(
        &self,
        id: ElectionId,
        current: bool,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.elections.get_mut(&id) {
            Some(election) if election.result_published == current => {
                election.result_published = !current;
                election.result_published_at = published_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.candidates.values().any(|c| {
            c.election_id == candidate.election_id && c.voter_id == candidate.voter_id
        });
        if duplicate {
            return Err(Error::AlreadyCandidate {
                voter: candidate.voter_id,
                election: candidate.election_id,
            });
        }
        let next = tables
            .positions
            .get_mut(&candidate.election_id)
            .ok_or_else(|| {
                Error::Internal(format!("Roster counter {} is missing", candidate.election_id))
            })?;
        let position = *next;
        *next += 1;

        let candidate = Candidate::new(candidate, position);
        tables.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
        Ok(self.tables.read().await.candidates.get(&id).cloned())
    }

    async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        let tables = self.tables.read().await;
        let mut roster: Vec<Candidate> = tables
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect();
        roster.sort_by_key(|c| c.position);
        Ok(roster)
    }

    async fn set_candidate_photo(
        &self,
        id: CandidateId,
        photo: &Photo,
        overwrite: bool,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.candidates.get_mut(&id) {
            Some(candidate) if overwrite || candidate.photo.is_none() => {
                candidate.photo = Some(photo.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = (ballot.voter_id, ballot.election_id);
        if tables.ballots.contains_key(&key) {
            return Err(Error::AlreadyVoted {
                voter: ballot.voter_id,
                election: ballot.election_id,
            });
        }
        tables.ballots.insert(key, ballot.clone());
        Ok(())
    }

    async fn ballot_for(
        &self,
        voter_id: VoterId,
        election_id: ElectionId,
    ) -> Result<Option<Ballot>> {
        let tables = self.tables.read().await;
        Ok(tables.ballots.get(&(voter_id, election_id)).cloned())
    }

    async fn ballots(&self, election_id: ElectionId) -> Result<Vec<Ballot>> {
        let tables = self.tables.read().await;
        let mut ballots: Vec<Ballot> = tables
            .ballots
            .values()
            .filter(|b| b.election_id == election_id)
            .cloned()
            .collect();
        ballots.sort_by_key(|b| (b.cast_at, b.id));
        Ok(ballots)
    }

    async fn replace_results(&self, snapshot: &ResultSnapshot) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .results
            .insert(snapshot.election_id, snapshot.clone());
        Ok(())
    }

    async fn results(&self, election_id: ElectionId) -> Result<Option<ResultSnapshot>> {
        Ok(self.tables.read().await.results.get(&election_id).cloned())
    }
}
