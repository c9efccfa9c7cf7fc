use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{ElectionScope, ElectionStatus},
    mongodb::{optional_bson_datetime, Id},
};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// General, state or local.
    pub scope: ElectionScope,
    /// Lifecycle state.
    pub status: ElectionStatus,
    /// Published start time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Published end time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Whether voters may see the results.
    pub result_published: bool,
    /// When the results were last published, cleared on unpublish.
    #[serde(default, with = "optional_bson_datetime")]
    pub result_published_at: Option<DateTime<Utc>>,
}

impl ElectionCore {
    /// A fresh election always starts out as an unpublished draft.
    pub fn draft(
        name: String,
        scope: ElectionScope,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            scope,
            status: ElectionStatus::Draft,
            start_time,
            end_time,
            result_published: false,
            result_published_at: None,
        }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    pub fn new(election: NewElection) -> Self {
        Self {
            id: Id::new(),
            election,
        }
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
