use rocket::{State, get, post, http::CookieJar, serde::json::Json};
use tracing::{debug, instrument};
use shared::{CastVoteRequest, CastVoteResponse, TestVoteResponse, VoteStatus, VoteSummary};
use crate::{
   error::ApiError,
   store::VoteStore,
   utils::{parse_choice, vote_cookie},
};

pub struct AppState {
    pub store: VoteStore,
}

impl AppState {
    pub fn new(store: VoteStore) -> Self {
        Self { store }
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> rocket::http::Status {
    rocket::http::Status::Ok
}

/// Current counts. Like every page render, this first makes sure both
/// counters exist.
#[get("/votes")]
pub async fn get_votes(state: &State<AppState>) -> Json<VoteSummary> {
    let init_error = state.store.ensure_initialized().await;
    let mut snapshot = state.store.load().await;
    if snapshot.error.is_none() {
        snapshot.error = init_error;
    }
    Json(snapshot.into())
}

#[get("/session")]
pub async fn get_session(status: VoteStatus) -> Json<VoteStatus> {
    Json(status)
}

#[instrument(skip(state, request, cookies), fields(choice))]
#[post("/vote", format = "json", data = "<request>")]
pub async fn cast_vote(
    state: &State<AppState>,
    request: Json<CastVoteRequest>,
    status: VoteStatus,
    cookies: &CookieJar<'_>,
) -> Json<CastVoteResponse> {
    let choice = request.into_inner().choice;
    tracing::Span::current().record("choice", choice.as_str());

    let (next, transition, snapshot) = state.store.cast(status, choice).await;
    debug!(?status, ?next, "Session vote updated");

    if let Some(current) = next.choice() {
        cookies.add(vote_cookie(current));
    }

    Json(CastVoteResponse {
        status: next,
        transition,
        notice: transition.notice(),
        summary: snapshot.into(),
    })
}

#[post("/reset")]
pub async fn reset_votes(state: &State<AppState>) -> Json<VoteSummary> {
    Json(state.store.reset_all().await.into())
}

/// Unconditional increment for load testing; bypasses the session guard.
#[get("/test-vote?<vote>")]
pub async fn test_vote(state: &State<AppState>, vote: Option<&str>) -> Result<Json<TestVoteResponse>, ApiError> {
    let choice = parse_choice(vote.ok_or(ApiError::MissingVote)?)?;
    let snapshot = state.store.increment(choice).await;

    Ok(Json(TestVoteResponse {
        success: !snapshot.is_degraded(),
        choice,
        count: snapshot.counts.get(choice),
        error: snapshot.error,
    }))
}
