use crate::models::Choice;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown choice: {0:?} (expected one of classic_music, rock_music)")]
    UnknownChoice(String),
}

pub fn parse_choice(raw: &str) -> Result<Choice, ValidationError> {
    raw.parse()
}

/// Reads a stored counter value. Missing, non-numeric and negative values all
/// count as zero.
pub fn coerce_count(raw: Option<&str>) -> u64 {
    raw.map(str::trim)
        .and_then(|value| value.parse::<i64>().ok())
        .map(|count| count.max(0) as u64)
        .unwrap_or(0)
}

pub fn coerce_signed(raw: i64) -> u64 {
    raw.max(0) as u64
}
