use std::time::Duration;

use rocket::tokio::time::timeout;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        election::{CandidateId, ElectionId, VoterId},
        photo::Photo,
    },
    db::ballot::Ballot,
};
use crate::store::SharedStore;
use crate::verifier::{ImageRole, SharedVerifier};

use super::{BallotLedger, CandidateRegistry};

/// A live capture matches the enrolled identity only when the embedding
/// distance is strictly below the threshold.
pub fn is_match(distance: f64, threshold: f64) -> bool {
    distance < threshold
}

/// Casts votes: verify the voter's face, then record their ballot at most once.
///
/// Fails closed. A slow, failing or confused verifier never lets a ballot
/// through, and never uses up the voter's one ballot either.
pub struct VoteGate {
    store: SharedStore,
    verifier: SharedVerifier,
    registry: CandidateRegistry,
    ledger: BallotLedger,
    threshold: f64,
    verifier_timeout: Duration,
}

impl VoteGate {
    pub fn new(
        store: SharedStore,
        verifier: SharedVerifier,
        registry: CandidateRegistry,
        ledger: BallotLedger,
        threshold: f64,
        verifier_timeout: Duration,
    ) -> Self {
        Self {
            store,
            verifier,
            registry,
            ledger,
            threshold,
            verifier_timeout,
        }
    }

    /// Cast `voter_id`'s vote for `candidate_id` in `election_id`.
    ///
    /// Checks, in order: the election is active, the candidate is on its
    /// roster, the voter has not voted yet, the voter has an enrolled photo,
    /// and the live image matches it. Only then is the ballot written; that
    /// write is the authoritative uniqueness check. Any failure leaves no trace.
    pub async fn cast_vote(
        &self,
        voter_id: VoterId,
        election_id: ElectionId,
        candidate_id: CandidateId,
        live_image: &Photo,
    ) -> Result<Ballot> {
        let election = self
            .store
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        if !election.status.accepts_votes() {
            return Err(Error::VotingNotOpen(election_id));
        }

        self.registry
            .roster_member(election_id, candidate_id)
            .await?;

        if self.ledger.has_voted(voter_id, election_id).await? {
            return Err(Error::AlreadyVoted {
                voter: voter_id,
                election: election_id,
            });
        }

        let reference = self
            .store
            .voter(voter_id)
            .await?
            .and_then(|voter| voter.voter.reference_photo)
            .filter(|photo| !photo.is_empty())
            .ok_or(Error::NoEnrolledIdentity(voter_id))?;

        let distance = self.verify(voter_id, &reference, live_image).await?;

        let ballot = self
            .ledger
            .record_ballot(voter_id, election_id, candidate_id, distance)
            .await?;
        info!(
            "Voter {voter_id} cast ballot {} in election {election_id}",
            ballot.id
        );
        Ok(ballot)
    }

    /// Compare the live image against the reference, returning the distance on a match.
    /// No locks are held while the verifier runs.
    async fn verify(&self, voter_id: VoterId, reference: &Photo, live_image: &Photo) -> Result<f64> {
        if live_image.is_empty() {
            return Err(Error::NoFaceDetected(ImageRole::Captured));
        }

        let comparison = match timeout(
            self.verifier_timeout,
            self.verifier.compare(reference, live_image),
        )
        .await
        {
            Ok(Ok(comparison)) => comparison,
            Ok(Err(e)) => {
                warn!("Verification of voter {voter_id} failed: {e}");
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    "Verification of voter {voter_id} timed out after {}ms",
                    self.verifier_timeout.as_millis()
                );
                return Err(Error::VerificationServiceUnavailable(format!(
                    "no answer within {}ms",
                    self.verifier_timeout.as_millis()
                )));
            }
        };

        let distance = comparison.distance;
        if !distance.is_finite() || distance < 0.0 {
            warn!("Verifier returned nonsense distance {distance} for voter {voter_id}");
            return Err(Error::VerificationServiceUnavailable(format!(
                "invalid distance {distance}"
            )));
        }
        if !is_match(distance, self.threshold) {
            warn!(
                "Voter {voter_id} rejected: distance {distance:.4} >= threshold {}",
                self.threshold
            );
            return Err(Error::IdentityMismatch { distance });
        }
        info!(
            "Voter {voter_id} verified: distance {distance:.4} < threshold {}",
            self.threshold
        );
        Ok(distance)
    }
}
