use crate::error::{Error, Result};
use crate::model::{
    common::election::VoterId,
    db::voter::{EnrolledVoter, NewVoter},
};
use crate::store::SharedStore;

/// Enrolled voter identities.
#[derive(Clone)]
pub struct VoterRoll {
    store: SharedStore,
}

impl VoterRoll {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Enrol a new voter. Names are trimmed; empty region names are dropped.
    pub async fn enroll(&self, mut voter: NewVoter) -> Result<EnrolledVoter> {
        voter.full_name = voter.full_name.trim().to_string();
        if voter.full_name.is_empty() {
            return Err(Error::BadRequest("`full_name` is required".to_string()));
        }
        let tidy = |region: Option<String>| {
            region
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
        };
        voter.state = tidy(voter.state);
        voter.city = tidy(voter.city);
        if voter.reference_photo.as_ref().map_or(false, |p| p.is_empty()) {
            voter.reference_photo = None;
        }
        if voter.reference_photo.is_none() {
            warn!("Enrolling {} without a reference photo; they cannot vote", voter.full_name);
        }

        let voter = EnrolledVoter::new(voter);
        self.store.insert_voter(&voter).await?;
        info!("Enrolled voter {}", voter.id);
        Ok(voter)
    }

    pub async fn get(&self, id: VoterId) -> Result<EnrolledVoter> {
        self.store
            .voter(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {id}")))
    }
}
