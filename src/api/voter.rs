use rocket::{get, post, routes, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, Voter},
        ballot::{BallotReceipt, VoteRequest, VotedStatus},
    },
    common::election::ElectionId,
};
use crate::service::{BallotLedger, VoteGate};

use super::check_image_size;

pub fn routes() -> Vec<Route> {
    routes![has_voted, cast_vote]
}

#[get("/elections/<election_id>/voted")]
async fn has_voted(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    ledger: &State<BallotLedger>,
) -> Result<Json<VotedStatus>> {
    let has_voted = ledger.has_voted(token.id, election_id).await?;
    Ok(Json(VotedStatus { has_voted }))
}

#[post("/elections/<election_id>/vote", data = "<vote>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    vote: Json<VoteRequest>,
    gate: &State<VoteGate>,
    config: &State<Config>,
) -> Result<Json<BallotReceipt>> {
    check_image_size(&vote.live_image, config)?;
    let ballot = gate
        .cast_vote(token.id, election_id, *vote.candidate_id, &vote.live_image)
        .await?;
    Ok(Json(ballot.into()))
}
