use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::photo::Photo, mongodb::Id};

/// Core data for an enrolled voter identity.
///
/// Registration and profile management happen elsewhere; this is the subset
/// the election services need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub full_name: String,
    pub state: Option<String>,
    pub city: Option<String>,
    /// Identity photo captured at enrolment, compared against live captures at the ballot box.
    pub reference_photo: Option<Photo>,
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// An enrolled voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledVoter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl EnrolledVoter {
    pub fn new(voter: NewVoter) -> Self {
        Self {
            id: Id::new(),
            voter,
        }
    }
}

impl Deref for EnrolledVoter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for EnrolledVoter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
