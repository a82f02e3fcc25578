use crate::error::ApiError;
use rocket::http::{Cookie, SameSite};
use shared::{Choice, VOTE_COOKIE};

pub fn parse_choice(raw: &str) -> Result<Choice, ApiError> {
    shared::parse_choice(raw).map_err(ApiError::from)
}

pub fn vote_cookie(choice: Choice) -> Cookie<'static> {
    Cookie::build((VOTE_COOKIE, choice.as_str()))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .build()
}
