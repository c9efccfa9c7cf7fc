//! The identity verification capability.
//!
//! The face-embedding technology behind it is a swappable detail: the vote
//! gate only ever sees [`IdentityVerifier::compare`].

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

mod http;
#[cfg(test)]
mod stub;

pub use http::HttpVerifier;
#[cfg(test)]
pub use stub::{StubResponse, StubVerifier};

/// Which of the two compared images a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRole {
    /// The photo captured at enrolment.
    Reference,
    /// The live photo captured at the ballot box.
    Captured,
}

impl Display for ImageRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Captured => f.write_str("captured"),
        }
    }
}

/// Outcome of comparing two face images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// The verifier's own opinion, using its own threshold. Informational only.
    #[serde(rename = "match")]
    pub matched: bool,
    /// Embedding distance; lower means more similar.
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    #[error("no face detected in the {0} image")]
    NoFace(ImageRole),
    #[error("verification service failure: {0}")]
    Service(String),
}

impl From<VerifierError> for Error {
    fn from(err: VerifierError) -> Self {
        match err {
            VerifierError::NoFace(role) => Error::NoFaceDetected(role),
            VerifierError::Service(msg) => Error::VerificationServiceUnavailable(msg),
        }
    }
}

/// Compares a stored reference image against a freshly captured one.
#[rocket::async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn compare(&self, reference: &[u8], probe: &[u8]) -> Result<Comparison, VerifierError>;
}

pub type SharedVerifier = Arc<dyn IdentityVerifier>;
