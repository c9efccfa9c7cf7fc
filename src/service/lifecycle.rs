use std::sync::Arc;

use rocket::tokio::sync::OwnedRwLockWriteGuard;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{ElectionId, ElectionStatus},
    db::{
        candidate::Candidate,
        election::{Election, NewElection},
        voter::EnrolledVoter,
    },
};
use crate::store::SharedStore;

use super::{CandidateRegistration, CandidateRegistry, ElectionLocks};

/// Owns every election's lifecycle.
#[derive(Clone)]
pub struct ElectionMachine {
    store: SharedStore,
    locks: Arc<ElectionLocks>,
}

impl ElectionMachine {
    pub fn new(store: SharedStore, locks: Arc<ElectionLocks>) -> Self {
        Self { store, locks }
    }

    /// Create a new election. It always starts out as a draft.
    pub async fn create(&self, election: NewElection) -> Result<Election> {
        let (election, _guard) = self.insert_draft(election).await?;
        Ok(election)
    }

    /// Create a new draft election together with its initial roster.
    ///
    /// The whole roster is checked before anything is written, and the
    /// election stays locked until every candidate is on it, so nobody can
    /// advance it halfway through. A storage failure part way leaves a draft
    /// with a partial roster, which can still be completed one candidate at
    /// a time.
    pub async fn create_with_roster(
        &self,
        election: NewElection,
        roster: Vec<CandidateRegistration>,
        registry: &CandidateRegistry,
    ) -> Result<(Election, Vec<Candidate>)> {
        registry.check_roster(&roster).await?;

        let (election, _guard) = self.insert_draft(election).await?;
        let mut candidates = Vec::with_capacity(roster.len());
        for registration in roster {
            candidates.push(registry.add_to_roster(election.id, registration).await?);
        }
        Ok((election, candidates))
    }

    /// Insert a fresh draft, returning it still write-locked.
    async fn insert_draft(
        &self,
        election: NewElection,
    ) -> Result<(Election, OwnedRwLockWriteGuard<()>)> {
        let mut election = Election::new(election);
        election.status = ElectionStatus::Draft;
        election.result_published = false;
        election.result_published_at = None;

        let guard = self.locks.write(election.id).await;
        self.store.insert_election(&election).await?;
        info!("Created election {} ({})", election.id, election.name);
        Ok((election, guard))
    }

    pub async fn get(&self, id: ElectionId) -> Result<Election> {
        self.store
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))
    }

    /// Every election in one of the given states, or all of them.
    pub async fn list(&self, statuses: &[ElectionStatus]) -> Result<Vec<Election>> {
        self.store.elections(statuses).await
    }

    /// Elections a voter may see. Drafts are never visible; elections that
    /// have not finished yet are limited to the voter's region.
    pub async fn visible_to(
        &self,
        voter: &EnrolledVoter,
        statuses: &[ElectionStatus],
    ) -> Result<Vec<Election>> {
        let statuses: Vec<ElectionStatus> = if statuses.is_empty() {
            vec![ElectionStatus::Active, ElectionStatus::Completed]
        } else {
            statuses.iter().copied().filter(|s| s.is_public()).collect()
        };
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let elections = self.store.elections(&statuses).await?;
        Ok(elections
            .into_iter()
            .filter(|e| {
                e.status == ElectionStatus::Completed
                    || e.scope.includes(voter.state.as_deref(), voter.city.as_deref())
            })
            .collect())
    }

    /// Move an election one step along its lifecycle.
    ///
    /// With a `target`, it must be the immediate successor of the current
    /// state. Holds the election's write lock, so the move waits for any
    /// in-flight ballot or registration and no new one starts until it is done.
    pub async fn advance(&self, id: ElectionId, target: Option<ElectionStatus>) -> Result<Election> {
        let _guard = self.locks.write(id).await;

        let mut election = self.get(id).await?;
        let from = election.status;
        let to = match target {
            Some(target) => from.advance_to(target)?,
            None => from.advance()?,
        };
        // Another server may have got there first.
        if !self.store.transition_status(id, from, to).await? {
            return Err(Error::InvalidStateTransition { from, to });
        }

        info!("Election {id} moved from {from} to {to}");
        election.status = to;
        Ok(election)
    }
}
