use chrono::{DateTime, Utc};
use mongodb::{
    bson::{
        doc,
        spec::BinarySubtype,
        Binary, Bson, DateTime as BsonDateTime,
    },
    options::{FindOptions, ReplaceOptions, SessionOptions},
    Client, Database,
};
use rocket::futures::TryStreamExt;

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
    mongodb::{is_duplicate_key_error, Coll, Counter},
};

use super::Store;

/// The production store, backed by MongoDB.
///
/// Requires the indexes from `ensure_indexes_exist`: the unique ballot index
/// is what rejects a second ballot from the same voter.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    voters: Coll<EnrolledVoter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    ballots: Coll<Ballot>,
    results: Coll<ResultSnapshot>,
    counters: Coll<Counter>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            voters: Coll::from_db(db),
            elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            ballots: Coll::from_db(db),
            results: Coll::from_db(db),
            counters: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_voter(&self, voter: &EnrolledVoter) -> Result<()> {
        self.voters.insert_one(voter, None).await?;
        Ok(())
    }

    async fn voter(&self, id: VoterId) -> Result<Option<EnrolledVoter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn count_voters(&self) -> Result<u64> {
        Ok(self.voters.count_documents(None, None).await?)
    }

    async fn insert_election(&self, election: &Election) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        self.elections
            .insert_one_with_session(election, None, &mut session)
            .await?;
        // Roster positions start at 1.
        self.counters
            .insert_one_with_session(Counter::new(election.id, 1), None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(())
    }

    async fn election(&self, id: ElectionId) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self, statuses: &[ElectionStatus]) -> Result<Vec<Election>> {
        let filter = if statuses.is_empty() {
            doc! {}
        } else {
            let statuses: Vec<Bson> = statuses.iter().map(|s| Bson::from(*s)).collect();
            doc! { "status": { "$in": statuses } }
        };
        let options = FindOptions::builder()
            .sort(doc! { "start_time": 1, "_id": 1 })
            .build();
        let elections = self.elections.find(filter, options).await?;
        Ok(elections.try_collect().await?)
    }

    async fn transition_status(
        &self,
        id: ElectionId,
        from: ElectionStatus,
        to: ElectionStatus,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "status": from,
        };
        let update = doc! {
            "$set": {
                "status": to,
            }
        };
        let result = self.elections.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn set_result_published(
        &self,
        id: ElectionId,
        current: bool,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "result_published": current,
        };
        let published_at = published_at.map_or(Bson::Null, |at| {
            Bson::DateTime(BsonDateTime::from_chrono(at))
        });
        let update = doc! {
            "$set": {
                "result_published": !current,
                "result_published_at": published_at,
            }
        };
        let result = self.elections.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let position = Counter::next(&self.counters, candidate.election_id).await?;
        let (voter, election) = (candidate.voter_id, candidate.election_id);
        let candidate = Candidate::new(candidate, position);
        match self.candidates.insert_one(&candidate, None).await {
            Ok(_) => Ok(candidate),
            Err(err) if is_duplicate_key_error(&err) => {
                Err(Error::AlreadyCandidate { voter, election })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn candidates(&self, election_id: ElectionId) -> Result<Vec<Candidate>> {
        let filter = doc! { "election_id": election_id };
        let options = FindOptions::builder().sort(doc! { "position": 1 }).build();
        let roster = self.candidates.find(filter, options).await?;
        Ok(roster.try_collect().await?)
    }

    async fn set_candidate_photo(
        &self,
        id: CandidateId,
        photo: &Photo,
        overwrite: bool,
    ) -> Result<bool> {
        let mut filter = id.as_doc();
        if !overwrite {
            // Matches both a missing and a null field.
            filter.insert("photo", Bson::Null);
        }
        let photo = Binary {
            subtype: BinarySubtype::Generic,
            bytes: photo.to_vec(),
        };
        let update = doc! {
            "$set": {
                "photo": photo,
            }
        };
        let result = self.candidates.update_one(filter, update, None).await?;
        Ok(result.matched_count == 1)
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> Result<()> {
        match self.ballots.insert_one(ballot, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key_error(&err) => Err(Error::AlreadyVoted {
                voter: ballot.voter_id,
                election: ballot.election_id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn ballot_for(
        &self,
        voter_id: VoterId,
        election_id: ElectionId,
    ) -> Result<Option<Ballot>> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        Ok(self.ballots.find_one(filter, None).await?)
    }

    async fn ballots(&self, election_id: ElectionId) -> Result<Vec<Ballot>> {
        // Read every ballot at a single point in time.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let filter = doc! { "election_id": election_id };
        let mut cursor = self
            .ballots
            .find_with_session(filter, None, &mut session)
            .await?;
        let mut ballots = Vec::new();
        while let Some(ballot) = cursor.next(&mut session).await {
            ballots.push(ballot?);
        }
        Ok(ballots)
    }

    async fn replace_results(&self, snapshot: &ResultSnapshot) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.results
            .replace_one(snapshot.election_id.as_doc(), snapshot, options)
            .await?;
        Ok(())
    }

    async fn results(&self, election_id: ElectionId) -> Result<Option<ResultSnapshot>> {
        Ok(self.results.find_one(election_id.as_doc(), None).await?)
    }
}

#[cfg(test)]
mod tests {
    use backend_test::backend_test;

    use crate::model::db::{
        candidate::CandidateCore,
        election::ElectionCore,
        results::{ElectionReport, Standing},
        voter::VoterCore,
    };

    use super::*;

    async fn election_in(store: &MongoStore, status: ElectionStatus) -> Election {
        let election = Election::new(ElectionCore::example_in(status));
        store.insert_election(&election).await.unwrap();
        election
    }

    #[backend_test]
    async fn duplicate_ballots_are_rejected(store: MongoStore) {
        let election = election_in(&store, ElectionStatus::Active).await;
        let voter = VoterId::new();

        let first = Ballot::new(election.id, voter, CandidateId::new(), 0.1);
        let second = Ballot::new(election.id, voter, CandidateId::new(), 0.2);
        store.insert_ballot(&first).await.unwrap();
        let err = store.insert_ballot(&second).await.unwrap_err();

        assert!(matches!(err, Error::AlreadyVoted { .. }));
        assert_eq!(store.ballots(election.id).await.unwrap(), vec![first.clone()]);
        assert_eq!(
            store.ballot_for(voter, election.id).await.unwrap(),
            Some(first)
        );
    }

    #[backend_test]
    async fn voters_cannot_stand_twice(store: MongoStore) {
        let election = election_in(&store, ElectionStatus::Draft).await;
        let voter = VoterId::new();
        store
            .insert_candidate(CandidateCore::example(election.id, voter, "Red"))
            .await
            .unwrap();
        let err = store
            .insert_candidate(CandidateCore::example(election.id, voter, "Blue"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyCandidate { .. }));
        assert_eq!(store.candidates(election.id).await.unwrap().len(), 1);
    }

    #[backend_test]
    async fn roster_positions_follow_registration_order(store: MongoStore) {
        let election = election_in(&store, ElectionStatus::Draft).await;
        let mut ids = Vec::new();
        for party in ["Red", "Green", "Blue"] {
            let voter = EnrolledVoter::new(VoterCore::example());
            store.insert_voter(&voter).await.unwrap();
            let candidate = store
                .insert_candidate(CandidateCore::example(election.id, voter.id, party))
                .await
                .unwrap();
            ids.push(candidate.id);
        }

        let roster = store.candidates(election.id).await.unwrap();
        assert_eq!(roster.iter().map(|c| c.id).collect::<Vec<_>>(), ids);
        assert_eq!(
            roster.iter().map(|c| c.position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(store.count_voters().await.unwrap(), 3);
    }

    #[backend_test]
    async fn stale_status_updates_change_nothing(store: MongoStore) {
        let election = election_in(&store, ElectionStatus::Active).await;
        assert!(!store
            .transition_status(election.id, ElectionStatus::Draft, ElectionStatus::Scheduled)
            .await
            .unwrap());
        assert!(store
            .transition_status(election.id, ElectionStatus::Active, ElectionStatus::Completed)
            .await
            .unwrap());
        assert!(!store
            .transition_status(election.id, ElectionStatus::Active, ElectionStatus::Completed)
            .await
            .unwrap());

        let stored = store.election(election.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ElectionStatus::Completed);
        let completed = store.elections(&[ElectionStatus::Completed]).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert!(store.elections(&[ElectionStatus::Active]).await.unwrap().is_empty());
    }

    #[backend_test]
    async fn publishing_is_compare_and_set(store: MongoStore) {
        let election = election_in(&store, ElectionStatus::Completed).await;
        assert!(store
            .set_result_published(election.id, false, Some(Utc::now()))
            .await
            .unwrap());
        assert!(!store
            .set_result_published(election.id, false, Some(Utc::now()))
            .await
            .unwrap());
        let stored = store.election(election.id).await.unwrap().unwrap();
        assert!(stored.result_published);
        assert!(stored.result_published_at.is_some());

        assert!(store.set_result_published(election.id, true, None).await.unwrap());
        let stored = store.election(election.id).await.unwrap().unwrap();
        assert!(!stored.result_published);
        assert!(stored.result_published_at.is_none());
    }

    #[backend_test]
    async fn photos_are_set_once_unless_overwriting(store: MongoStore) {
        let election = election_in(&store, ElectionStatus::Draft).await;
        let candidate = store
            .insert_candidate(CandidateCore::example(election.id, VoterId::new(), "Red"))
            .await
            .unwrap();
        let first = Photo::from(b"first".to_vec());
        let second = Photo::from(b"second".to_vec());

        assert!(store.set_candidate_photo(candidate.id, &first, false).await.unwrap());
        assert!(!store.set_candidate_photo(candidate.id, &second, false).await.unwrap());
        let stored = store.candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.photo, Some(first));

        assert!(store.set_candidate_photo(candidate.id, &second, true).await.unwrap());
        let stored = store.candidate(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.photo, Some(second));
    }

    #[backend_test]
    async fn results_are_replaced_whole(store: MongoStore) {
        let election = election_in(&store, ElectionStatus::Completed).await;
        let winner = CandidateId::new();
        let snapshot = |votes: u64| ResultSnapshot {
            election_id: election.id,
            calculated_at: Utc::now(),
            standings: vec![Standing {
                candidate_id: winner,
                vote_count: votes,
                vote_percentage: 100.0,
                rank_position: 1,
            }],
            report: ElectionReport {
                total_ballots: votes,
                total_candidates: 1,
                registered_voters: 10,
                turnout_percentage: votes as f64 * 10.0,
                winning_candidate: Some(winner),
                winning_margin: None,
            },
        };

        assert_eq!(store.results(election.id).await.unwrap(), None);
        store.replace_results(&snapshot(2)).await.unwrap();
        store.replace_results(&snapshot(3)).await.unwrap();

        let stored = store.results(election.id).await.unwrap().unwrap();
        assert_eq!(stored.standings[0].vote_count, 3);
        assert_eq!(stored.report.total_ballots, 3);
    }
}
