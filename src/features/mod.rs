//! Feature extraction
//!
//! Stateful trackers that turn an ordered match stream into model-ready rows.

pub mod elo;
pub mod export;
pub mod form;
pub mod identity;
pub mod pipeline;

pub use elo::{expected_win_prob, EloFeatures, RatingEngine};
pub use export::FeatureRecord;
pub use form::{FormSnapshot, FormTracker};
pub use identity::{Assignment, IdentityAssigner};
pub use pipeline::{DifferenceFeatures, FeaturePipeline, FeatureRow, PlayerSnapshot};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use crate::{Hand, MatchRecord, PlayerId, PlayerInfo, Surface};

    pub fn player(id: i64) -> PlayerInfo {
        PlayerInfo {
            id: PlayerId(id),
            name: format!("Player {id}"),
            hand: Hand::Right,
            height_cm: 180.0 + id as f64,
            ioc: "ESP".to_string(),
            age: 20.0 + id as f64,
            rank: 10 * id as u32 + 1,
            rank_points: 1000.0 - id as f64,
            seed: None,
            entry: None,
        }
    }

    pub fn make_match_on(
        date: NaiveDate,
        winner: i64,
        loser: i64,
        match_num: u32,
        surface: Surface,
    ) -> MatchRecord {
        MatchRecord {
            date,
            tourney_id: "2024-0001".to_string(),
            tourney_name: "Test Open".to_string(),
            tourney_level: Some("A".to_string()),
            match_num,
            surface,
            round: Some("R32".to_string()),
            best_of: Some(3),
            winner: player(winner),
            loser: player(loser),
            winner_stats: None,
            loser_stats: None,
        }
    }

    pub fn make_match(winner: i64, loser: i64, match_num: u32, surface: Surface) -> MatchRecord {
        make_match_on(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            winner,
            loser,
            match_num,
            surface,
        )
    }
}
