use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{candidate::CandidateSpec, id::ApiId},
    common::election::{ElectionScope, ElectionStatus},
    db::election::{Election, NewElection},
};

/// An election specification, as submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election name.
    pub name: String,
    /// Election type, plus the region for state and local elections.
    #[serde(flatten)]
    pub scope: ElectionScope,
    /// Published start time.
    pub start_time: DateTime<Utc>,
    /// Published end time.
    pub end_time: DateTime<Utc>,
    /// Initial roster.
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
}

impl ElectionSpec {
    /// Check the request makes sense, and split it into the election and its initial roster.
    pub fn into_parts(self) -> Result<(NewElection, Vec<CandidateSpec>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::BadRequest("`name` must not be blank".to_string()));
        }
        self.scope.validate().map_err(Error::BadRequest)?;
        if self.end_time <= self.start_time {
            return Err(Error::BadRequest(
                "`end_time` must be after `start_time`".to_string(),
            ));
        }
        let election = NewElection::draft(
            name.to_string(),
            self.scope,
            self.start_time,
            self.end_time,
        );
        Ok((election, self.candidates))
    }
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    #[serde(flatten)]
    pub scope: ElectionScope,
    pub status: ElectionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub result_published: bool,
    pub result_published_at: Option<DateTime<Utc>>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let id = election.id.into();
        let election = election.election;
        Self {
            id,
            name: election.name,
            scope: election.scope,
            status: election.status,
            start_time: election.start_time,
            end_time: election.end_time,
            result_published: election.result_published,
            result_published_at: election.result_published_at,
        }
    }
}

/// Body of an advance request. Naming the target guards against
/// double-submitted clicks moving an election two steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvanceRequest {
    #[serde(default)]
    pub target: Option<ElectionStatus>,
}
