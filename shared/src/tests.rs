#[cfg(test)]
mod tests {
    use crate::models::{Choice, VoteCounts, VoteSnapshot, VoteSummary};
    use crate::session::{VoteStatus, VoteTransition};
    use crate::validation::{coerce_count, parse_choice, ValidationError};
    use crate::error::{Error, ErrorCode};

    fn counts(classic_music: u64, rock_music: u64) -> VoteCounts {
        VoteCounts { classic_music, rock_music }
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!(parse_choice("classic_music").unwrap(), Choice::ClassicMusic);
        assert_eq!(parse_choice("rock_music").unwrap(), Choice::RockMusic);
        assert!(parse_choice(" rock_music ").is_err());
        assert!(matches!(
            parse_choice("jazz_music"),
            Err(ValidationError::UnknownChoice(ref s)) if s == "jazz_music"
        ));
        assert!(parse_choice("").is_err());
        assert!(parse_choice("Classic_Music").is_err());
    }

    #[test]
    fn test_choice_serde_matches_store_keys() {
        for choice in Choice::ALL {
            let json = serde_json::to_string(&choice).unwrap();
            assert_eq!(json, format!("\"{}\"", choice.as_str()));
            let back: Choice = serde_json::from_str(&json).unwrap();
            assert_eq!(back, choice);
        }
    }

    #[test]
    fn test_counts_accessors() {
        let mut c = VoteCounts::zero();
        c.set(Choice::RockMusic, 4);
        assert_eq!(c.get(Choice::RockMusic), 4);
        assert_eq!(c.get(Choice::ClassicMusic), 0);
        assert_eq!(c.total(), 4);

        let collected: VoteCounts = [(Choice::ClassicMusic, 2), (Choice::RockMusic, 1)].into_iter().collect();
        assert_eq!(collected, counts(2, 1));
    }

    #[test]
    fn test_tally_percentages_and_leader() {
        let tally = counts(3, 1).tally();
        assert_eq!(tally.total_votes, 4);
        assert!((tally.classic_music_percentage - 75.0).abs() < f64::EPSILON);
        assert!((tally.rock_music_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(tally.leader, Some(Choice::ClassicMusic));

        assert_eq!(counts(0, 7).tally().leader, Some(Choice::RockMusic));
    }

    #[test]
    fn test_tally_ties() {
        let empty = VoteCounts::zero().tally();
        assert_eq!(empty.total_votes, 0);
        assert_eq!(empty.classic_music_percentage, 0.0);
        assert_eq!(empty.rock_music_percentage, 0.0);
        assert!(empty.is_tie());

        assert!(counts(5, 5).tally().is_tie());
    }

    #[test]
    fn test_coerce_malformed_values() {
        assert_eq!(coerce_count(Some("12")), 12);
        assert_eq!(coerce_count(Some(" 3\n")), 3);
        assert_eq!(coerce_count(None), 0);
        assert_eq!(coerce_count(Some("")), 0);
        assert_eq!(coerce_count(Some("abc")), 0);
        assert_eq!(coerce_count(Some("-4")), 0);
        assert_eq!(coerce_count(Some("1.5")), 0);
    }

    #[test]
    fn test_first_vote() {
        let (status, transition) = VoteStatus::NotVoted.vote(Choice::RockMusic);
        assert_eq!(status, VoteStatus::Voted(Choice::RockMusic));
        assert_eq!(transition, VoteTransition::FirstVote { choice: Choice::RockMusic });
        assert!(transition.touches_store());
        assert_eq!(transition.notice(), "You voted for Rock Music!");
    }

    #[test]
    fn test_changed_vote() {
        let (status, transition) = VoteStatus::Voted(Choice::RockMusic).vote(Choice::ClassicMusic);
        assert_eq!(status, VoteStatus::Voted(Choice::ClassicMusic));
        assert_eq!(
            transition,
            VoteTransition::Changed { from: Choice::RockMusic, to: Choice::ClassicMusic }
        );
        assert_eq!(transition.notice(), "You changed your vote to Classic Music!");
    }

    #[test]
    fn test_repeat_vote_is_noop() {
        let (status, transition) = VoteStatus::Voted(Choice::ClassicMusic).vote(Choice::ClassicMusic);
        assert_eq!(status, VoteStatus::Voted(Choice::ClassicMusic));
        assert!(!transition.touches_store());
        assert_eq!(transition.notice(), "You already voted for Classic Music!");
    }

    #[test]
    fn test_no_way_back_to_not_voted() {
        let mut status = VoteStatus::NotVoted;
        for choice in [Choice::ClassicMusic, Choice::RockMusic, Choice::RockMusic, Choice::ClassicMusic] {
            status = status.vote(choice).0;
            assert!(status.has_voted());
            assert_eq!(status.choice(), Some(choice));
        }
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_value(VoteStatus::Voted(Choice::RockMusic)).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "voted", "choice": "rock_music" }));
        let json = serde_json::to_value(VoteStatus::NotVoted).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "notVoted" }));
    }

    #[test]
    fn test_summary_from_degraded_snapshot() {
        let summary: VoteSummary = VoteSnapshot::degraded(VoteCounts::zero(), "connection refused").into();
        assert_eq!(summary.counts, VoteCounts::zero());
        assert!(summary.tally.is_tie());
        assert_eq!(summary.error.as_deref(), Some("connection refused"));

        let json = serde_json::to_value(VoteSummary::from(VoteSnapshot::ok(counts(1, 0)))).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["counts"]["classic_music"], 1);
    }

    #[test]
    fn test_validation_error_maps_to_invalid_input() {
        let err: Error = parse_choice("polka").unwrap_err().into();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(err.message, "Invalid choice");
        assert!(err.details.as_ref().unwrap().contains("polka"));
        assert!(err.to_string().contains("polka"));
    }
}
