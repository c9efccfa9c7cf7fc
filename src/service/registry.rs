use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::config::PhotoPolicy;
use crate::error::{Error, Result};
use crate::model::{
    common::{
        election::{CandidateId, ElectionId, VoterId},
        photo::Photo,
    },
    db::candidate::{Candidate, NewCandidate},
};
use crate::store::SharedStore;

use super::ElectionLocks;

/// Everything needed to put a voter on a roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRegistration {
    pub voter_id: VoterId,
    pub party_name: String,
    pub party_symbol: String,
    pub manifesto: String,
    pub photo: Option<Photo>,
}

impl CandidateRegistration {
    fn validate(&self) -> Result<()> {
        if self.party_name.trim().is_empty() {
            return Err(Error::BadRequest("`party_name` is required".to_string()));
        }
        if self.photo.as_ref().map_or(false, Photo::is_empty) {
            return Err(Error::BadRequest("Candidate photo is empty".to_string()));
        }
        Ok(())
    }
}

/// The roster of candidates for each election.
#[derive(Clone)]
pub struct CandidateRegistry {
    store: SharedStore,
    locks: Arc<ElectionLocks>,
    photo_policy: PhotoPolicy,
}

impl CandidateRegistry {
    pub fn new(store: SharedStore, locks: Arc<ElectionLocks>, photo_policy: PhotoPolicy) -> Self {
        Self {
            store,
            locks,
            photo_policy,
        }
    }

    /// Check a batch of registrations up front, so an election created with
    /// an initial roster is not left half-populated by a bad entry.
    pub async fn check_roster(&self, registrations: &[CandidateRegistration]) -> Result<()> {
        let mut seen = HashSet::new();
        for registration in registrations {
            registration.validate()?;
            if !seen.insert(registration.voter_id) {
                return Err(Error::BadRequest(format!(
                    "Voter {} is listed more than once",
                    registration.voter_id
                )));
            }
            self.ensure_voter_exists(registration.voter_id).await?;
        }
        Ok(())
    }

    /// Add a candidate to an election's roster. Only allowed while the
    /// election is a draft; each voter may stand at most once per election.
    pub async fn register(
        &self,
        election_id: ElectionId,
        registration: CandidateRegistration,
    ) -> Result<Candidate> {
        registration.validate()?;
        self.ensure_voter_exists(registration.voter_id).await?;

        let _guard = self.locks.read(election_id).await;
        self.add_to_roster(election_id, registration).await
    }

    /// Append to the roster. The caller must hold the election's lock.
    pub(super) async fn add_to_roster(
        &self,
        election_id: ElectionId,
        registration: CandidateRegistration,
    ) -> Result<Candidate> {
        let election = self
            .store
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        if !election.status.accepts_candidates() {
            return Err(Error::RosterFrozen {
                election: election_id,
                status: election.status,
            });
        }

        let candidate = self
            .store
            .insert_candidate(NewCandidate {
                election_id,
                voter_id: registration.voter_id,
                party_name: registration.party_name.trim().to_string(),
                party_symbol: registration.party_symbol,
                manifesto: registration.manifesto,
                photo: registration.photo,
                registered_at: Utc::now(),
            })
            .await?;
        info!(
            "Registered candidate {} ({}) in election {election_id} at position {}",
            candidate.id, candidate.party_name, candidate.position
        );
        Ok(candidate)
    }

    /// Attach a photo to a candidate, subject to the configured [`PhotoPolicy`].
    pub async fn attach_photo(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
        photo: Photo,
    ) -> Result<()> {
        if photo.is_empty() {
            return Err(Error::BadRequest("Candidate photo is empty".to_string()));
        }
        self.roster_member(election_id, candidate_id).await?;

        let overwrite = self.photo_policy == PhotoPolicy::Overwrite;
        if !self
            .store
            .set_candidate_photo(candidate_id, &photo, overwrite)
            .await?
        {
            return Err(Error::PhotoAlreadyAttached(candidate_id));
        }
        debug!("Attached {photo:?} to candidate {candidate_id}");
        Ok(())
    }

    /// The roster, in registration order.
    pub async fn list(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        if self.store.election(election_id).await?.is_none() {
            return Err(Error::not_found(format!("Election {election_id}")));
        }
        self.store.candidates(election_id).await
    }

    /// Look up a candidate on a particular election's roster.
    pub async fn roster_member(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<Candidate> {
        match self.store.candidate(candidate_id).await? {
            Some(candidate) if candidate.election_id == election_id => Ok(candidate),
            _ => Err(Error::UnknownCandidate {
                election: election_id,
                candidate: candidate_id,
            }),
        }
    }

    async fn ensure_voter_exists(&self, voter_id: VoterId) -> Result<()> {
        match self.store.voter(voter_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("Voter {voter_id}"))),
        }
    }
}
