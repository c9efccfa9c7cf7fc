use rocket::{get, routes, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AuthToken, Voter},
        candidate::CandidateDescription,
        election::ElectionDescription,
        results::ElectionResults,
    },
    common::election::{ElectionId, ElectionStatus},
    db::election::Election,
};
use crate::service::{CandidateRegistry, ElectionMachine, ResultsEngine, Viewer, VoterRoll};

pub fn routes() -> Vec<Route> {
    routes![
        elections_admin,
        elections_voter,
        elections_anonymous,
        election_admin,
        election_voter,
        candidates_admin,
        candidates_voter,
        results_admin,
        results_public,
        published_results,
    ]
}

fn describe(elections: Vec<Election>) -> Json<Vec<ElectionDescription>> {
    Json(elections.into_iter().map(Into::into).collect())
}

#[get("/elections?<status>", rank = 1)]
async fn elections_admin(
    _token: AuthToken<Admin>,
    status: Vec<ElectionStatus>,
    elections: &State<ElectionMachine>,
) -> Result<Json<Vec<ElectionDescription>>> {
    Ok(describe(elections.list(&status).await?))
}

#[get("/elections?<status>", rank = 2)]
async fn elections_voter(
    token: AuthToken<Voter>,
    status: Vec<ElectionStatus>,
    elections: &State<ElectionMachine>,
    voters: &State<VoterRoll>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let voter = voters.get(token.id).await?;
    Ok(describe(elections.visible_to(&voter, &status).await?))
}

#[get("/elections", rank = 3)]
async fn elections_anonymous() -> Result<Json<Vec<ElectionDescription>>> {
    Err(Error::Unauthorized("Sign in to see elections".to_string()))
}

#[get("/elections/<election_id>", rank = 1)]
async fn election_admin(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: &State<ElectionMachine>,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(elections.get(election_id).await?.into()))
}

/// Get a non-draft election; drafts do not exist as far as voters are concerned.
async fn public_election(elections: &ElectionMachine, election_id: ElectionId) -> Result<Election> {
    let election = elections.get(election_id).await?;
    if !election.status.is_public() {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    Ok(election)
}

#[get("/elections/<election_id>", rank = 2)]
async fn election_voter(
    _token: AuthToken<Voter>,
    election_id: ElectionId,
    elections: &State<ElectionMachine>,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(public_election(elections, election_id).await?.into()))
}

#[get("/elections/<election_id>/candidates", rank = 1)]
async fn candidates_admin(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    registry: &State<CandidateRegistry>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let roster = registry.list(election_id).await?;
    Ok(Json(roster.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>/candidates", rank = 2)]
async fn candidates_voter(
    _token: AuthToken<Voter>,
    election_id: ElectionId,
    elections: &State<ElectionMachine>,
    registry: &State<CandidateRegistry>,
) -> Result<Json<Vec<CandidateDescription>>> {
    public_election(elections, election_id).await?;
    let roster = registry.list(election_id).await?;
    Ok(Json(roster.into_iter().map(Into::into).collect()))
}

async fn election_results(
    election_id: ElectionId,
    viewer: Viewer,
    elections: &ElectionMachine,
    registry: &CandidateRegistry,
    results: &ResultsEngine,
) -> Result<Json<ElectionResults>> {
    let snapshot = results.results(election_id, viewer).await?;
    let election = elections.get(election_id).await?;
    let roster = registry.list(election_id).await?;
    Ok(Json(ElectionResults::new(election, snapshot, &roster)))
}

#[get("/elections/<election_id>/results", rank = 1)]
async fn results_admin(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: &State<ElectionMachine>,
    registry: &State<CandidateRegistry>,
    results: &State<ResultsEngine>,
) -> Result<Json<ElectionResults>> {
    election_results(election_id, Viewer::Admin, elections, registry, results).await
}

#[get("/elections/<election_id>/results", rank = 2)]
async fn results_public(
    election_id: ElectionId,
    elections: &State<ElectionMachine>,
    registry: &State<CandidateRegistry>,
    results: &State<ResultsEngine>,
) -> Result<Json<ElectionResults>> {
    election_results(election_id, Viewer::Public, elections, registry, results).await
}

#[get("/results")]
async fn published_results(
    registry: &State<CandidateRegistry>,
    results: &State<ResultsEngine>,
) -> Result<Json<Vec<ElectionResults>>> {
    let mut published = Vec::new();
    for (election, snapshot) in results.published().await? {
        let roster = registry.list(election.id).await?;
        published.push(ElectionResults::new(election, snapshot, &roster));
    }
    Ok(Json(published))
}

#[cfg(test)]
mod tests {
    use backend_test::backend_test;
    use rocket::{
        http::Status,
        local::asynchronous::{Client, LocalResponse},
        uri,
    };

    use crate::error::ErrorBody;
    use crate::model::{
        common::election::ElectionScope,
        db::{
            candidate::CandidateCore,
            election::ElectionCore,
            voter::{EnrolledVoter, VoterCore},
        },
    };
    use crate::store::{MemoryStore, Store};
    use crate::testing::{admin_cookie, enrolled_voter, voter_cookie};

    use super::*;

    async fn insert(store: &MemoryStore, election: ElectionCore) -> Election {
        let election = Election::new(election);
        store.insert_election(&election).await.unwrap();
        election
    }

    async fn error_kind(response: LocalResponse<'_>) -> String {
        response.into_json::<ErrorBody>().await.unwrap().error
    }

    #[backend_test]
    async fn admins_see_everything(client: Client, store: MemoryStore) {
        for status in [ElectionStatus::Draft, ElectionStatus::Active, ElectionStatus::Completed] {
            insert(&store, ElectionCore::example_in(status)).await;
        }

        let all: Vec<ElectionDescription> = client
            .get("/elections")
            .cookie(admin_cookie(&client))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let drafts: Vec<ElectionDescription> = client
            .get("/elections?status=DRAFT")
            .cookie(admin_cookie(&client))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].status, ElectionStatus::Draft);
    }

    #[backend_test]
    async fn voters_see_their_own_elections(client: Client, store: MemoryStore) {
        let voter = enrolled_voter(&store).await;
        let general = insert(&store, ElectionCore::example_in(ElectionStatus::Active)).await;
        let local = insert(&store, ElectionCore::local_example(ElectionStatus::Active)).await;
        let mut elsewhere = ElectionCore::example_in(ElectionStatus::Active);
        elsewhere.scope = ElectionScope::State {
            state: "Goa".to_string(),
        };
        insert(&store, elsewhere).await;
        insert(&store, ElectionCore::example_in(ElectionStatus::Draft)).await;

        let visible: Vec<ElectionDescription> = client
            .get("/elections")
            .cookie(voter_cookie(&client, voter.id))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        let mut ids: Vec<_> = visible.iter().map(|e| *e.id).collect();
        ids.sort();
        let mut expected = vec![general.id, local.id];
        expected.sort();
        assert_eq!(ids, expected);

        let response = client.get("/elections").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn drafts_are_hidden_from_voters(client: Client, store: MemoryStore) {
        let voter = enrolled_voter(&store).await;
        let draft = insert(&store, ElectionCore::example()).await;

        let response = client
            .get(uri!(election_voter(draft.id)))
            .cookie(voter_cookie(&client, voter.id))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .get(uri!(candidates_voter(draft.id)))
            .cookie(voter_cookie(&client, voter.id))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .get(uri!(election_admin(draft.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test]
    async fn rosters_are_listed_in_registration_order(client: Client, store: MemoryStore) {
        let voter = enrolled_voter(&store).await;
        let election = insert(&store, ElectionCore::example()).await;
        for party in ["Red", "Green", "Blue"] {
            let candidate = enrolled_voter(&store).await;
            store
                .insert_candidate(CandidateCore::example(election.id, candidate.id, party))
                .await
                .unwrap();
        }
        store
            .transition_status(election.id, ElectionStatus::Draft, ElectionStatus::Scheduled)
            .await
            .unwrap();

        let roster: Vec<CandidateDescription> = client
            .get(uri!(candidates_voter(election.id)))
            .cookie(voter_cookie(&client, voter.id))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        let parties: Vec<_> = roster.iter().map(|c| c.party_name.as_str()).collect();
        assert_eq!(parties, vec!["Red", "Green", "Blue"]);
        assert_eq!(
            roster.iter().map(|c| c.position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[backend_test]
    async fn results_stay_private_until_published(client: Client, store: MemoryStore) {
        let election = insert(&store, ElectionCore::example_in(ElectionStatus::Completed)).await;
        let voter = EnrolledVoter::new(VoterCore::example());
        store.insert_voter(&voter).await.unwrap();

        let response = client
            .get(uri!(results_public(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(error_kind(response).await, "RESULTS_NOT_PUBLISHED");

        let response = client
            .get(uri!(results_admin(election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(error_kind(response).await, "RESULTS_NOT_CALCULATED");

        let results = client.rocket().state::<ResultsEngine>().unwrap();
        results.calculate(election.id).await.unwrap();
        let response = client
            .get(uri!(results_admin(election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let feed: Vec<ElectionResults> = client
            .get(uri!(published_results))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(feed.is_empty());

        results.toggle_publish(election.id).await.unwrap();
        let response = client
            .get(uri!(results_public(election.id)))
            .cookie(voter_cookie(&client, voter.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let published: ElectionResults = response.into_json().await.unwrap();
        assert_eq!(*published.election.id, election.id);
        assert_eq!(published.report.registered_voters, 1);

        let feed: Vec<ElectionResults> = client
            .get(uri!(published_results))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(feed, vec![published]);
    }
}
