use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{election::ElectionDescription, id::ApiId},
    db::{
        candidate::Candidate,
        election::Election,
        results::{ElectionReport, ResultSnapshot},
    },
};

/// One line of the results table, with the party details filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingDescription {
    pub candidate_id: ApiId,
    pub party_name: String,
    pub party_symbol: String,
    pub vote_count: u64,
    pub vote_percentage: f64,
    pub rank_position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDescription {
    pub total_ballots: u64,
    pub total_candidates: u64,
    pub registered_voters: u64,
    pub turnout_percentage: f64,
    pub winning_candidate: Option<ApiId>,
    pub winning_margin: Option<u64>,
}

impl From<ElectionReport> for ReportDescription {
    fn from(report: ElectionReport) -> Self {
        Self {
            total_ballots: report.total_ballots,
            total_candidates: report.total_candidates,
            registered_voters: report.registered_voters,
            turnout_percentage: report.turnout_percentage,
            winning_candidate: report.winning_candidate.map(ApiId::from),
            winning_margin: report.winning_margin,
        }
    }
}

/// The results of one election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election: ElectionDescription,
    pub calculated_at: DateTime<Utc>,
    /// Best first.
    pub standings: Vec<StandingDescription>,
    pub report: ReportDescription,
}

impl ElectionResults {
    /// Combine a snapshot with the election and its roster.
    pub fn new(election: Election, snapshot: ResultSnapshot, roster: &[Candidate]) -> Self {
        let standings = snapshot
            .standings
            .into_iter()
            .map(|standing| {
                let party = roster.iter().find(|c| c.id == standing.candidate_id);
                StandingDescription {
                    candidate_id: standing.candidate_id.into(),
                    party_name: party.map(|c| c.party_name.clone()).unwrap_or_default(),
                    party_symbol: party.map(|c| c.party_symbol.clone()).unwrap_or_default(),
                    vote_count: standing.vote_count,
                    vote_percentage: standing.vote_percentage,
                    rank_position: standing.rank_position,
                }
            })
            .collect();
        Self {
            election: election.into(),
            calculated_at: snapshot.calculated_at,
            standings,
            report: snapshot.report.into(),
        }
    }
}
