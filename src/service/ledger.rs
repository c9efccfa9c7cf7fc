use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionId, VoterId},
    db::ballot::Ballot,
};
use crate::store::SharedStore;

use super::ElectionLocks;

/// The append-only record of cast ballots.
#[derive(Clone)]
pub struct BallotLedger {
    store: SharedStore,
    locks: Arc<ElectionLocks>,
}

impl BallotLedger {
    pub fn new(store: SharedStore, locks: Arc<ElectionLocks>) -> Self {
        Self { store, locks }
    }

    /// Record a ballot, provided the election is open.
    ///
    /// The store's uniqueness constraint on (voter, election) is the only
    /// thing deciding which of several racing ballots wins; every other
    /// caller gets `AlreadyVoted`. The election's read lock is held across the
    /// status check and the insert so the election cannot close in between.
    pub async fn record_ballot(
        &self,
        voter_id: VoterId,
        election_id: ElectionId,
        candidate_id: CandidateId,
        verification_distance: f64,
    ) -> Result<Ballot> {
        let _guard = self.locks.read(election_id).await;

        let election = self
            .store
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        if !election.status.accepts_votes() {
            return Err(Error::VotingNotOpen(election_id));
        }

        let ballot = Ballot::new(election_id, voter_id, candidate_id, verification_distance);
        self.store.insert_ballot(&ballot).await?;
        Ok(ballot)
    }

    /// Whether the voter has a ballot in this election. Advisory only.
    pub async fn has_voted(&self, voter_id: VoterId, election_id: ElectionId) -> Result<bool> {
        Ok(self
            .store
            .ballot_for(voter_id, election_id)
            .await?
            .is_some())
    }

    pub async fn ballots(&self, election_id: ElectionId) -> Result<Vec<Ballot>> {
        self.store.ballots(election_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::model::common::election::ElectionStatus;
    use crate::service::fixtures::Harness;
    use crate::store::Store;

    use super::*;

    #[rocket::async_test]
    async fn one_ballot_per_voter() {
        let harness = Harness::new();
        let (election, roster) = harness
            .election_with_roster(ElectionStatus::Active, &["Red", "Blue"])
            .await;
        let ledger = &harness.services.ledger;
        let voter = harness.voter().await;

        assert!(!ledger.has_voted(voter.id, election.id).await.unwrap());
        let ballot = ledger
            .record_ballot(voter.id, election.id, roster[0].id, 0.2)
            .await
            .unwrap();
        assert_eq!(ballot.candidate_id, roster[0].id);
        assert_eq!(ballot.verification_distance, 0.2);
        assert!(ledger.has_voted(voter.id, election.id).await.unwrap());

        let err = ledger
            .record_ballot(voter.id, election.id, roster[1].id, 0.2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted { .. }));
        assert_eq!(ledger.ballots(election.id).await.unwrap(), vec![ballot]);
    }

    #[rocket::async_test]
    async fn racing_ballots_produce_exactly_one() {
        let harness = Harness::new();
        let (election, roster) = harness
            .election_with_roster(ElectionStatus::Active, &["Red", "Green", "Blue"])
            .await;
        let voter_id = harness.voter().await.id;
        let election_id = election.id;

        let attempts: Vec<_> = (0..30)
            .map(|i| {
                let ledger = harness.services.ledger.clone();
                let candidate_id = roster[i % roster.len()].id;
                rocket::tokio::spawn(async move {
                    ledger
                        .record_ballot(voter_id, election_id, candidate_id, 0.1)
                        .await
                })
            })
            .collect();

        let (mut accepted, mut duplicates) = (0, 0);
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(Error::AlreadyVoted { .. }) => duplicates += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 29);
        assert_eq!(harness.store.ballot_count().await, 1);
    }

    #[rocket::async_test]
    async fn closed_elections_refuse_ballots() {
        let harness = Harness::new();
        let voter = harness.voter().await;
        for status in [
            ElectionStatus::Draft,
            ElectionStatus::Scheduled,
            ElectionStatus::Completed,
        ] {
            let (election, roster) = harness.election_with_roster(status, &["Red"]).await;
            let err = harness
                .services
                .ledger
                .record_ballot(voter.id, election.id, roster[0].id, 0.1)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::VotingNotOpen(id) if id == election.id));
        }
        assert_eq!(harness.store.ballot_count().await, 0);
    }

    #[rocket::async_test]
    async fn closing_waits_for_an_in_flight_ballot() {
        let harness = Harness::new();
        let (election, roster) = harness
            .election_with_roster(ElectionStatus::Active, &["Red"])
            .await;
        let voter = harness.voter().await;

        // Hold the read side as a ballot in flight would.
        let in_flight = harness.services.ledger.locks.read(election.id).await;
        let machine = harness.services.elections.clone();
        let election_id = election.id;
        let close = rocket::tokio::spawn(async move { machine.advance(election_id, None).await });
        rocket::tokio::task::yield_now().await;
        assert_eq!(
            harness.store.election(election.id).await.unwrap().unwrap().status,
            ElectionStatus::Active
        );
        drop(in_flight);

        let closed = close.await.unwrap().unwrap();
        assert_eq!(closed.status, ElectionStatus::Completed);
        let err = harness
            .services
            .ledger
            .record_ballot(voter.id, election.id, roster[0].id, 0.1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VotingNotOpen(_)));
    }
}
