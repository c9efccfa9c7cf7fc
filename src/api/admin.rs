use rocket::{post, put, routes, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        candidate::{CandidateDescription, CandidateSpec, PhotoUpload},
        election::{AdvanceRequest, ElectionDescription, ElectionSpec},
        results::ElectionResults,
        voter::{VoterDescription, VoterSpec},
    },
    common::election::{CandidateId, ElectionId},
};
use crate::service::{
    CandidateRegistration, CandidateRegistry, ElectionMachine, ResultsEngine, VoterRoll,
};

use super::check_image_size;

pub fn routes() -> Vec<Route> {
    routes![
        enroll_voter,
        create_election,
        advance_election,
        register_candidate,
        attach_candidate_photo,
        calculate_results,
        toggle_publish,
    ]
}

#[post("/admin/voters", data = "<spec>", format = "json")]
async fn enroll_voter(
    _token: AuthToken<Admin>,
    spec: Json<VoterSpec>,
    voters: &State<VoterRoll>,
    config: &State<Config>,
) -> Result<Json<VoterDescription>> {
    if let Some(photo) = &spec.reference_photo {
        check_image_size(photo, config)?;
    }
    let voter = voters.enroll(spec.0.into()).await?;
    Ok(Json(voter.into()))
}

#[post("/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: &State<ElectionMachine>,
    registry: &State<CandidateRegistry>,
    config: &State<Config>,
) -> Result<Json<ElectionDescription>> {
    let (election, roster) = spec.0.into_parts()?;
    for photo in roster.iter().filter_map(|c| c.photo.as_ref()) {
        check_image_size(photo, config)?;
    }
    let roster: Vec<CandidateRegistration> = roster.into_iter().map(Into::into).collect();

    let (election, _) = elections
        .create_with_roster(election, roster, registry)
        .await?;

    Ok(Json(election.into()))
}

#[post("/admin/elections/<election_id>/advance", data = "<body>")]
async fn advance_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    body: String,
    elections: &State<ElectionMachine>,
) -> Result<Json<ElectionDescription>> {
    // The body is optional; an empty one advances to whatever comes next.
    let request: AdvanceRequest = if body.trim().is_empty() {
        AdvanceRequest::default()
    } else {
        rocket::serde::json::from_str(&body)
            .map_err(|e| Error::BadRequest(format!("Invalid advance request: {e}")))?
    };
    let election = elections.advance(election_id, request.target).await?;
    Ok(Json(election.into()))
}

#[post(
    "/admin/elections/<election_id>/candidates",
    data = "<spec>",
    format = "json"
)]
async fn register_candidate(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<CandidateSpec>,
    registry: &State<CandidateRegistry>,
    config: &State<Config>,
) -> Result<Json<CandidateDescription>> {
    if let Some(photo) = &spec.photo {
        check_image_size(photo, config)?;
    }
    let candidate = registry.register(election_id, spec.0.into()).await?;
    Ok(Json(candidate.into()))
}

#[put(
    "/admin/elections/<election_id>/candidates/<candidate_id>/photo",
    data = "<upload>",
    format = "json"
)]
async fn attach_candidate_photo(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    candidate_id: CandidateId,
    upload: Json<PhotoUpload>,
    registry: &State<CandidateRegistry>,
    config: &State<Config>,
) -> Result<Json<CandidateDescription>> {
    check_image_size(&upload.photo, config)?;
    registry
        .attach_photo(election_id, candidate_id, upload.0.photo)
        .await?;
    let candidate = registry.roster_member(election_id, candidate_id).await?;
    Ok(Json(candidate.into()))
}

#[post("/admin/elections/<election_id>/results")]
async fn calculate_results(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: &State<ElectionMachine>,
    registry: &State<CandidateRegistry>,
    results: &State<ResultsEngine>,
) -> Result<Json<ElectionResults>> {
    let snapshot = results.calculate(election_id).await?;
    let election = elections.get(election_id).await?;
    let roster = registry.list(election_id).await?;
    Ok(Json(ElectionResults::new(election, snapshot, &roster)))
}

#[post("/admin/elections/<election_id>/publish")]
async fn toggle_publish(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    results: &State<ResultsEngine>,
) -> Result<Json<ElectionDescription>> {
    let election = results.toggle_publish(election_id).await?;
    Ok(Json(election.into()))
}
