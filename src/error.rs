use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::{Error as DbError, ErrorKind as DbErrorKind};
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestTrace;
use crate::model::common::election::{CandidateId, ElectionId, ElectionStatus, VoterId};
use crate::verifier::ImageRole;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while serving a request.
///
/// Variants fall into four families, which clients can tell apart by the
/// `error` field of the response body:
///
/// - *Policy violations* are final: retrying the same request will fail again.
/// - *Verification failures* leave no trace and invite a retake of the photo.
/// - *Infrastructure failures* are transient and safe to retry.
/// - *Request errors* are malformed or unauthorised requests.
#[derive(Debug, Error)]
pub enum Error {
    // Policy violations.
    #[error("Cannot move election from {from} to {to}")]
    InvalidStateTransition {
        from: ElectionStatus,
        to: ElectionStatus,
    },
    #[error("Election {0} is not open for voting")]
    VotingNotOpen(ElectionId),
    #[error("Candidate {candidate} is not on the roster of election {election}")]
    UnknownCandidate {
        election: ElectionId,
        candidate: CandidateId,
    },
    #[error("Voter {voter} has already voted in election {election}")]
    AlreadyVoted {
        voter: VoterId,
        election: ElectionId,
    },
    #[error("Election {0} is not completed")]
    ElectionNotCompleted(ElectionId),
    #[error("Voter {0} has no enrolled identity photo")]
    NoEnrolledIdentity(VoterId),
    #[error("Voter {voter} is already a candidate in election {election}")]
    AlreadyCandidate {
        voter: VoterId,
        election: ElectionId,
    },
    #[error("Candidate {0} already has a photo")]
    PhotoAlreadyAttached(CandidateId),
    #[error("The roster of election {election} is frozen ({status})")]
    RosterFrozen {
        election: ElectionId,
        status: ElectionStatus,
    },
    #[error("Results for election {0} are not published")]
    ResultsNotPublished(ElectionId),
    #[error("Results for election {0} have not been calculated")]
    ResultsNotCalculated(ElectionId),

    // Verification failures.
    #[error("No face detected in the {0} image")]
    NoFaceDetected(ImageRole),
    #[error("Live capture does not match the enrolled identity (distance {distance:.4})")]
    IdentityMismatch { distance: f64 },

    // Infrastructure failures.
    #[error("Identity verification service unavailable: {0}")]
    VerificationServiceUnavailable(String),
    #[error(transparent)]
    Db(#[from] DbError),
    /// A broken internal invariant, e.g. an election without its roster counter.
    #[error("Internal error: {0}")]
    Internal(String),

    // Request errors.
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Stable machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::VotingNotOpen(_) => "VOTING_NOT_OPEN",
            Self::UnknownCandidate { .. } => "UNKNOWN_CANDIDATE",
            Self::AlreadyVoted { .. } => "ALREADY_VOTED",
            Self::ElectionNotCompleted(_) => "ELECTION_NOT_COMPLETED",
            Self::NoEnrolledIdentity(_) => "NO_ENROLLED_IDENTITY",
            Self::AlreadyCandidate { .. } => "ALREADY_CANDIDATE",
            Self::PhotoAlreadyAttached(_) => "PHOTO_ALREADY_ATTACHED",
            Self::RosterFrozen { .. } => "ROSTER_FROZEN",
            Self::ResultsNotPublished(_) => "RESULTS_NOT_PUBLISHED",
            Self::ResultsNotCalculated(_) => "RESULTS_NOT_CALCULATED",
            Self::NoFaceDetected(_) => "NO_FACE_DETECTED",
            Self::IdentityMismatch { .. } => "IDENTITY_MISMATCH",
            Self::VerificationServiceUnavailable(_) => "VERIFICATION_SERVICE_UNAVAILABLE",
            Self::Db(_) if self.is_transient() => "STORAGE_UNAVAILABLE",
            Self::Db(_) | Self::Internal(_) => "INTERNAL_ERROR",
            Self::Jwt(_) | Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
        }
    }

    /// Transient failures that the client is expected to retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::VerificationServiceUnavailable(_) => true,
            // Documents that cannot be (de)serialised will not fix themselves.
            Self::Db(err) => !matches!(
                *err.kind,
                DbErrorKind::BsonDeserialization(_)
                    | DbErrorKind::BsonSerialization(_)
                    | DbErrorKind::InvalidArgument { .. }
            ),
            _ => false,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::InvalidStateTransition { .. }
            | Self::VotingNotOpen(_)
            | Self::AlreadyVoted { .. }
            | Self::ElectionNotCompleted(_)
            | Self::AlreadyCandidate { .. }
            | Self::PhotoAlreadyAttached(_)
            | Self::RosterFrozen { .. }
            | Self::ResultsNotCalculated(_) => Status::Conflict,
            Self::UnknownCandidate { .. } | Self::NotFound(_) => Status::NotFound,
            Self::ResultsNotPublished(_) => Status::Forbidden,
            Self::NoEnrolledIdentity(_)
            | Self::NoFaceDetected(_)
            | Self::IdentityMismatch { .. } => Status::UnprocessableEntity,
            Self::VerificationServiceUnavailable(_) => Status::ServiceUnavailable,
            Self::Db(_) if self.is_transient() => Status::ServiceUnavailable,
            Self::Db(_) | Self::Internal(_) => Status::InternalServerError,
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let id = RequestTrace::of(req).id;
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("req{id}: {self}"),
            _ => debug!("req{id}: {self}"),
        }
        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}
