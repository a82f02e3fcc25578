pub mod config;
pub mod error;
pub mod retry;
pub mod store;
pub mod redis_store;
pub mod sqlite_store;
pub mod routes;
pub mod cors;
pub mod utils;
pub mod catchers;
pub use shared::{models::*, error::*, session::*};

use rocket::{Build, Rocket, catchers, routes};

use crate::{
    catchers::{bad_request, internal_error, not_found, unprocessable},
    cors::CORS,
    routes::{all_options, cast_vote, get_session, get_votes, reset_votes, test_vote, AppState},
    store::VoteStore,
};

/// Assembles the API around an already configured store.
pub fn build_rocket(store: VoteStore) -> Rocket<Build> {
    rocket::build()
        .attach(CORS)
        .manage(AppState::new(store))
        .mount(
            "/api",
            routes![
                get_votes,
                get_session,
                cast_vote,
                reset_votes,
                test_vote,
                all_options
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                not_found,
                unprocessable,
                internal_error
            ],
        )
}
