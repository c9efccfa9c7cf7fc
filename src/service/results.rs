use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionId, ElectionStatus},
    db::{
        ballot::Ballot,
        candidate::Candidate,
        election::Election,
        results::{ElectionReport, ResultSnapshot, Standing},
    },
};
use crate::store::SharedStore;

use super::ElectionLocks;

/// Who is asking for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Sees results whether or not they are published.
    Admin,
    Public,
}

/// `part` as a percentage of `total`, rounded half-up to two decimal places.
/// Zero when `total` is zero.
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // Basis points, rounded half-up in integer arithmetic.
    let (part, total) = (u128::from(part), u128::from(total));
    let basis_points = (part * 20_000 + total) / (2 * total);
    basis_points as f64 / 100.0
}

/// Count the ballots for each candidate on the roster and rank them.
///
/// Ranking is standard competition ranking ("1224"): tied candidates share a
/// rank and the following rank is skipped. Within a tie, candidates keep their
/// roster order. Ballots for candidates not on the roster are ignored.
pub fn tally(roster: &[Candidate], ballots: &[Ballot]) -> Vec<Standing> {
    let mut counts: HashMap<CandidateId, u64> = roster.iter().map(|c| (c.id, 0)).collect();
    for ballot in ballots {
        if let Some(count) = counts.get_mut(&ballot.candidate_id) {
            *count += 1;
        }
    }
    let counted: u64 = counts.values().sum();

    let mut entries: Vec<(u64, u64, CandidateId)> = roster
        .iter()
        .map(|c| (counts[&c.id], c.position, c.id))
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut standings: Vec<Standing> = Vec::with_capacity(entries.len());
    for (index, (vote_count, _, candidate_id)) in entries.into_iter().enumerate() {
        let rank_position = match standings.last() {
            Some(previous) if previous.vote_count == vote_count => previous.rank_position,
            _ => index as u32 + 1,
        };
        standings.push(Standing {
            candidate_id,
            vote_count,
            vote_percentage: percentage(vote_count, counted),
            rank_position,
        });
    }
    standings
}

fn report(standings: &[Standing], total_ballots: u64, registered_voters: u64) -> ElectionReport {
    let winning_margin = match standings {
        [] => None,
        [only] => Some(only.vote_count),
        [first, second, ..] => Some(first.vote_count - second.vote_count),
    };
    ElectionReport {
        total_ballots,
        total_candidates: standings.len() as u64,
        registered_voters,
        turnout_percentage: percentage(total_ballots, registered_voters),
        winning_candidate: standings.first().map(|s| s.candidate_id),
        winning_margin,
    }
}

/// Tallies completed elections and controls who can see the results.
#[derive(Clone)]
pub struct ResultsEngine {
    store: SharedStore,
    locks: Arc<ElectionLocks>,
}

impl ResultsEngine {
    pub fn new(store: SharedStore, locks: Arc<ElectionLocks>) -> Self {
        Self { store, locks }
    }

    async fn election(&self, id: ElectionId) -> Result<Election> {
        self.store
            .election(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {id}")))
    }

    /// Tally a completed election, replacing any previous snapshot.
    /// Safe to repeat: the ballot set of a completed election never changes.
    pub async fn calculate(&self, election_id: ElectionId) -> Result<ResultSnapshot> {
        let election = self.election(election_id).await?;
        if !election.status.allows_tally() {
            return Err(Error::ElectionNotCompleted(election_id));
        }

        let roster = self.store.candidates(election_id).await?;
        let ballots = self.store.ballots(election_id).await?;
        let registered_voters = self.store.count_voters().await?;

        let standings = tally(&roster, &ballots);
        let report = report(&standings, ballots.len() as u64, registered_voters);
        let snapshot = ResultSnapshot {
            election_id,
            calculated_at: Utc::now(),
            standings,
            report,
        };
        self.store.replace_results(&snapshot).await?;

        info!(
            "Tallied election {election_id}: {} ballots across {} candidates",
            snapshot.report.total_ballots, snapshot.report.total_candidates
        );
        Ok(snapshot)
    }

    /// Flip whether the election's results are visible to the public.
    /// Never touches the tally itself.
    pub async fn toggle_publish(&self, election_id: ElectionId) -> Result<Election> {
        let _guard = self.locks.write(election_id).await;

        let mut election = self.election(election_id).await?;
        if !election.status.allows_tally() {
            return Err(Error::ElectionNotCompleted(election_id));
        }
        let current = election.result_published;
        let published_at = (!current).then(Utc::now);
        if !self
            .store
            .set_result_published(election_id, current, published_at)
            .await?
        {
            return Err(Error::BadRequest(format!(
                "Publication of election {election_id} changed concurrently, try again"
            )));
        }

        info!(
            "Results of election {election_id} {}",
            if current { "withdrawn" } else { "published" }
        );
        election.result_published = !current;
        election.result_published_at = published_at;
        Ok(election)
    }

    /// The latest snapshot, if the viewer is allowed to see it.
    pub async fn results(&self, election_id: ElectionId, viewer: Viewer) -> Result<ResultSnapshot> {
        let election = self.election(election_id).await?;
        if viewer == Viewer::Public && !election.result_published {
            return Err(Error::ResultsNotPublished(election_id));
        }
        self.store
            .results(election_id)
            .await?
            .ok_or(Error::ResultsNotCalculated(election_id))
    }

    /// Every published election that has been tallied, with its results.
    pub async fn published(&self) -> Result<Vec<(Election, ResultSnapshot)>> {
        let completed = self
            .store
            .elections(&[ElectionStatus::Completed])
            .await?;
        let mut published = Vec::new();
        for election in completed.into_iter().filter(|e| e.result_published) {
            if let Some(snapshot) = self.store.results(election.id).await? {
                published.push((election, snapshot));
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        common::election::VoterId,
        db::{candidate::CandidateCore, election::ElectionCore},
    };
    use crate::service::fixtures::Harness;
    use crate::store::Store;

    use super::*;

    fn roster(parties: usize) -> Vec<Candidate> {
        let election = ElectionId::new();
        (0..parties)
            .map(|i| {
                Candidate::new(
                    CandidateCore::example(election, VoterId::new(), &format!("Party {i}")),
                    i as u64 + 1,
                )
            })
            .collect()
    }

    fn ballots_for(candidate: &Candidate, n: usize) -> Vec<Ballot> {
        (0..n)
            .map(|_| Ballot::new(candidate.election_id, VoterId::new(), candidate.id, 0.1))
            .collect()
    }

    /// Cast `counts[i]` ballots for the i-th candidate of a completed election.
    async fn completed_with_votes(harness: &Harness, counts: &[usize]) -> (Election, Vec<Candidate>) {
        let parties: Vec<String> = (0..counts.len()).map(|i| format!("Party {i}")).collect();
        let parties: Vec<&str> = parties.iter().map(String::as_str).collect();
        let (election, roster) = harness
            .election_with_roster(ElectionStatus::Completed, &parties)
            .await;
        for (candidate, &n) in roster.iter().zip(counts) {
            for ballot in ballots_for(candidate, n) {
                harness.store.insert_ballot(&ballot).await.unwrap();
            }
        }
        (election, roster)
    }

    #[test]
    fn percentages_round_half_up() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(1, 8), 12.5);
        assert_eq!(percentage(1, 16_000), 0.01);
        assert_eq!(percentage(5, 5), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 0), 0.0);
    }

    #[test]
    fn example_tally() {
        let roster = roster(3);
        let (a, b, c) = (&roster[0], &roster[1], &roster[2]);
        let ballots: Vec<Ballot> = [ballots_for(a, 3), ballots_for(b, 5), ballots_for(c, 2)].concat();

        let standings = tally(&roster, &ballots);
        let summary: Vec<_> = standings
            .iter()
            .map(|s| (s.candidate_id, s.vote_count, s.vote_percentage, s.rank_position))
            .collect();
        assert_eq!(
            summary,
            vec![(b.id, 5, 50.0, 1), (a.id, 3, 30.0, 2), (c.id, 2, 20.0, 3)]
        );
    }

    #[test]
    fn ties_share_a_rank_in_roster_order() {
        let roster = roster(4);
        let ballots: Vec<Ballot> = [
            ballots_for(&roster[0], 2),
            ballots_for(&roster[1], 4),
            ballots_for(&roster[2], 2),
            ballots_for(&roster[3], 4),
        ]
        .concat();

        let standings = tally(&roster, &ballots);
        let order: Vec<_> = standings.iter().map(|s| s.candidate_id).collect();
        let ranks: Vec<_> = standings.iter().map(|s| s.rank_position).collect();
        assert_eq!(order, vec![roster[1].id, roster[3].id, roster[0].id, roster[2].id]);
        assert_eq!(ranks, vec![1, 1, 3, 3]);
    }

    #[test]
    fn empty_ballot_box_gives_zero_percentages() {
        let roster = roster(3);
        let standings = tally(&roster, &[]);
        assert_eq!(standings.len(), 3);
        assert!(standings
            .iter()
            .all(|s| s.vote_count == 0 && s.vote_percentage == 0.0 && s.rank_position == 1));
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let roster = roster(3);
        let ballots: Vec<Ballot> = [
            ballots_for(&roster[0], 1),
            ballots_for(&roster[1], 1),
            ballots_for(&roster[2], 1),
        ]
        .concat();
        let total: f64 = tally(&roster, &ballots)
            .iter()
            .map(|s| s.vote_percentage)
            .sum();
        assert!((total - 100.0).abs() <= 0.01 * roster.len() as f64);
    }

    #[test]
    fn report_names_winner_and_margin() {
        let roster = roster(3);
        let ballots: Vec<Ballot> = [ballots_for(&roster[0], 3), ballots_for(&roster[1], 5)].concat();
        let standings = tally(&roster, &ballots);
        let summary = report(&standings, 8, 16);
        assert_eq!(summary.winning_candidate, Some(roster[1].id));
        assert_eq!(summary.winning_margin, Some(2));
        assert_eq!(summary.total_candidates, 3);
        assert_eq!(summary.turnout_percentage, 50.0);

        let empty = report(&[], 0, 0);
        assert_eq!(empty.winning_candidate, None);
        assert_eq!(empty.winning_margin, None);
        assert_eq!(empty.turnout_percentage, 0.0);
    }

    #[rocket::async_test]
    async fn only_completed_elections_are_tallied() {
        let harness = Harness::new();
        for status in [
            ElectionStatus::Draft,
            ElectionStatus::Scheduled,
            ElectionStatus::Active,
        ] {
            let election = harness.election(status).await;
            let err = harness
                .services
                .results
                .calculate(election.id)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ElectionNotCompleted(_)), "{status}");
            assert!(harness.store.results(election.id).await.unwrap().is_none());
        }
    }

    #[rocket::async_test]
    async fn recalculation_is_idempotent() {
        let harness = Harness::new();
        let (election, roster) = completed_with_votes(&harness, &[3, 5, 2]).await;
        let results = &harness.services.results;

        let first = results.calculate(election.id).await.unwrap();
        let second = results.calculate(election.id).await.unwrap();
        assert_eq!(first.standings, second.standings);
        assert_eq!(first.report, second.report);
        assert_eq!(first.standings[0].candidate_id, roster[1].id);
        assert_eq!(first.report.total_ballots, 10);

        let stored = harness.store.results(election.id).await.unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[rocket::async_test]
    async fn publication_gates_public_visibility_only() {
        let harness = Harness::new();
        let (election, _) = completed_with_votes(&harness, &[1, 2]).await;
        let results = &harness.services.results;

        let err = results.results(election.id, Viewer::Admin).await.unwrap_err();
        assert!(matches!(err, Error::ResultsNotCalculated(_)));

        let tallied = results.calculate(election.id).await.unwrap();
        assert_eq!(results.results(election.id, Viewer::Admin).await.unwrap(), tallied);
        let err = results.results(election.id, Viewer::Public).await.unwrap_err();
        assert!(matches!(err, Error::ResultsNotPublished(_)));

        let published = results.toggle_publish(election.id).await.unwrap();
        assert!(published.result_published);
        assert!(published.result_published_at.is_some());
        assert_eq!(results.results(election.id, Viewer::Public).await.unwrap(), tallied);
        assert_eq!(results.published().await.unwrap(), vec![(published, tallied.clone())]);

        let withdrawn = results.toggle_publish(election.id).await.unwrap();
        assert!(!withdrawn.result_published);
        assert!(withdrawn.result_published_at.is_none());
        assert!(results.published().await.unwrap().is_empty());
        assert_eq!(results.results(election.id, Viewer::Admin).await.unwrap(), tallied);
    }

    #[rocket::async_test]
    async fn publishing_requires_a_completed_election() {
        let harness = Harness::new();
        let election = Election::new(ElectionCore::example_in(ElectionStatus::Active));
        harness.store.insert_election(&election).await.unwrap();
        let err = harness
            .services
            .results
            .toggle_publish(election.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElectionNotCompleted(_)));
    }
}
