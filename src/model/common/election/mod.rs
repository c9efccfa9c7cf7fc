mod scope;
mod state;

pub use scope::ElectionScope;
pub use state::ElectionStatus;

use crate::model::mongodb::Id;

/// Elections, candidates, voters and ballots are all identified by database IDs.
pub type ElectionId = Id;
pub type CandidateId = Id;
pub type VoterId = Id;
pub type BallotId = Id;
