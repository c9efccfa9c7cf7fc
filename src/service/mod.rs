//! The election components: lifecycle, roster, ledger, vote gate and results.
//!
//! Each component is cheap to clone and shares the store, the verifier and
//! the per-election locks with its siblings.

use std::sync::Arc;

use crate::config::Config;
use crate::store::SharedStore;
use crate::verifier::SharedVerifier;

mod gate;
mod ledger;
mod lifecycle;
mod locks;
mod registry;
mod results;
mod voters;

pub use gate::{is_match, VoteGate};
pub use ledger::BallotLedger;
pub use lifecycle::ElectionMachine;
pub use locks::ElectionLocks;
pub use registry::{CandidateRegistration, CandidateRegistry};
pub use results::{percentage, tally, ResultsEngine, Viewer};
pub use voters::VoterRoll;

/// Every component, wired together over one store and verifier.
pub struct Services {
    pub elections: ElectionMachine,
    pub registry: CandidateRegistry,
    pub ledger: BallotLedger,
    pub gate: VoteGate,
    pub results: ResultsEngine,
    pub voters: VoterRoll,
}

impl Services {
    pub fn new(store: SharedStore, verifier: SharedVerifier, config: &Config) -> Self {
        let locks = Arc::new(ElectionLocks::default());
        let elections = ElectionMachine::new(store.clone(), locks.clone());
        let registry = CandidateRegistry::new(store.clone(), locks.clone(), config.photo_policy());
        let ledger = BallotLedger::new(store.clone(), locks.clone());
        let gate = VoteGate::new(
            store.clone(),
            verifier,
            registry.clone(),
            ledger.clone(),
            config.match_threshold(),
            config.verifier_timeout(),
        );
        let results = ResultsEngine::new(store.clone(), locks);
        let voters = VoterRoll::new(store);
        Self {
            elections,
            registry,
            ledger,
            gate,
            results,
            voters,
        }
    }
}

/// Fixtures shared by the component tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::time::Duration;

    use super::*;
    use crate::config::PhotoPolicy;
    use crate::model::{
        common::election::ElectionStatus,
        db::{
            candidate::{Candidate, CandidateCore},
            election::{Election, ElectionCore},
            voter::{EnrolledVoter, VoterCore},
        },
    };
    use crate::store::{MemoryStore, Store};
    use crate::verifier::StubVerifier;

    pub struct Harness {
        pub store: MemoryStore,
        pub verifier: StubVerifier,
        pub services: Services,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_policy(PhotoPolicy::Once)
        }

        pub fn with_policy(policy: PhotoPolicy) -> Self {
            let store = MemoryStore::new();
            let verifier = StubVerifier::default();
            let shared: SharedStore = Arc::new(store.clone());
            let locks = Arc::new(ElectionLocks::default());
            let registry = CandidateRegistry::new(shared.clone(), locks.clone(), policy);
            let ledger = BallotLedger::new(shared.clone(), locks.clone());
            let services = Services {
                elections: ElectionMachine::new(shared.clone(), locks.clone()),
                gate: VoteGate::new(
                    shared.clone(),
                    Arc::new(verifier.clone()),
                    registry.clone(),
                    ledger.clone(),
                    0.4,
                    Duration::from_millis(200),
                ),
                registry,
                ledger,
                results: ResultsEngine::new(shared.clone(), locks),
                voters: VoterRoll::new(shared),
            };
            Self {
                store,
                verifier,
                services,
            }
        }

        pub async fn voter(&self) -> EnrolledVoter {
            let voter = EnrolledVoter::new(VoterCore::example());
            self.store.insert_voter(&voter).await.unwrap();
            voter
        }

        pub async fn election(&self, status: ElectionStatus) -> Election {
            let election = Election::new(ElectionCore::example_in(status));
            self.store.insert_election(&election).await.unwrap();
            election
        }

        /// An election in `status` with one candidate per party.
        pub async fn election_with_roster(
            &self,
            status: ElectionStatus,
            parties: &[&str],
        ) -> (Election, Vec<Candidate>) {
            let election = self.election(ElectionStatus::Draft).await;
            let mut roster = Vec::new();
            for party in parties {
                let voter = self.voter().await;
                let candidate = self
                    .store
                    .insert_candidate(CandidateCore::example(election.id, voter.id, party))
                    .await
                    .unwrap();
                roster.push(candidate);
            }
            let mut current = ElectionStatus::Draft;
            while current != status {
                let next = current.advance().unwrap();
                self.store
                    .transition_status(election.id, current, next)
                    .await
                    .unwrap();
                current = next;
            }
            let election = self.store.election(election.id).await.unwrap().unwrap();
            (election, roster)
        }
    }
}
