use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// States in the Election lifecycle.
///
/// Elections only ever move forward, one step at a time:
/// `Draft -> Scheduled -> Active -> Completed`.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromFormField,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionStatus {
    /// Under construction, only visible to admins. The roster is open.
    Draft,
    /// Roster frozen, waiting for the published start time.
    Scheduled,
    /// Accepting ballots.
    Active,
    /// Closed; results may be calculated and published.
    Completed,
}

impl ElectionStatus {
    /// The immediate successor state, if any.
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::Scheduled),
            Self::Scheduled => Some(Self::Active),
            Self::Active => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Validate a transition to `target`, which must be the immediate successor.
    pub fn advance_to(self, target: Self) -> Result<Self> {
        match self.successor() {
            Some(next) if next == target => Ok(next),
            _ => Err(Error::InvalidStateTransition {
                from: self,
                to: target,
            }),
        }
    }

    /// Validate a transition to the immediate successor, whatever it is.
    pub fn advance(self) -> Result<Self> {
        self.successor().ok_or(Error::InvalidStateTransition {
            from: self,
            to: self,
        })
    }

    pub const fn accepts_candidates(self) -> bool {
        matches!(self, Self::Draft)
    }

    pub const fn accepts_votes(self) -> bool {
        matches!(self, Self::Active)
    }

    pub const fn allows_tally(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether non-administrators may see the election at all.
    pub const fn is_public(self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Draft => "DRAFT",
            Self::Scheduled => "SCHEDULED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        Bson::String(status.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ElectionStatus::*;

    #[test]
    fn only_the_immediate_successor_is_reachable() {
        assert_eq!(Draft.advance_to(Scheduled).unwrap(), Scheduled);
        assert_eq!(Scheduled.advance_to(Active).unwrap(), Active);
        assert_eq!(Active.advance_to(Completed).unwrap(), Completed);

        // Skipping a state.
        assert!(matches!(
            Draft.advance_to(Active),
            Err(Error::InvalidStateTransition {
                from: Draft,
                to: Active
            })
        ));
        // Going backwards.
        assert!(Completed.advance_to(Active).is_err());
        assert!(Active.advance_to(Draft).is_err());
        // Staying put.
        assert!(Scheduled.advance_to(Scheduled).is_err());
    }

    #[test]
    fn completed_is_terminal() {
        assert_eq!(Completed.successor(), None);
        assert!(matches!(
            Completed.advance(),
            Err(Error::InvalidStateTransition { .. })
        ));
        assert_eq!(Draft.advance().unwrap(), Scheduled);
    }

    #[test]
    fn legality_table() {
        let table = [
            (Draft, true, false, false),
            (Scheduled, false, false, false),
            (Active, false, true, false),
            (Completed, false, false, true),
        ];
        for (status, candidates, votes, tally) in table {
            assert_eq!(status.accepts_candidates(), candidates, "{status}");
            assert_eq!(status.accepts_votes(), votes, "{status}");
            assert_eq!(status.allows_tally(), tally, "{status}");
        }
    }

    #[test]
    fn serialises_in_upper_case() {
        assert_eq!(Bson::from(Active), Bson::String("ACTIVE".to_string()));
        assert_eq!(Completed.to_string(), "COMPLETED");
    }
}
