pub mod error;
pub mod models;
pub mod validation;
pub mod session;

pub use error::{Error, ErrorCode};
pub use models::*;
pub use validation::*;
pub use session::{VoteStatus, VoteTransition, VOTE_COOKIE};

#[cfg(test)]
mod tests;
