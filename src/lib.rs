//! Tennis match prediction features
//!
//! Builds a leakage-free, chronologically ordered feature table from
//! historical ATP match records: rolling form, per-surface win ratios and
//! a hybrid (overall + surface) Elo rating for both players of every match.

pub mod data;
pub mod evaluate;
pub mod features;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// Court surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    Carpet,
}

impl Surface {
    pub const ALL: [Surface; 4] = [Surface::Hard, Surface::Clay, Surface::Grass, Surface::Carpet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Hard => "Hard",
            Surface::Clay => "Clay",
            Surface::Grass => "Grass",
            Surface::Carpet => "Carpet",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = TennisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hard" => Ok(Surface::Hard),
            "clay" => Ok(Surface::Clay),
            "grass" => Ok(Surface::Grass),
            "carpet" => Ok(Surface::Carpet),
            other => Err(TennisError::Parse(format!("unknown surface: {other:?}"))),
        }
    }
}

/// Playing hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Hand {
    Right,
    Left,
    Ambidextrous,
    #[default]
    Unknown,
}

impl Hand {
    pub fn code(&self) -> &'static str {
        match self {
            Hand::Right => "R",
            Hand::Left => "L",
            Hand::Ambidextrous => "A",
            Hand::Unknown => "U",
        }
    }

    /// Parse the single-letter code; anything unrecognised is `Unknown`
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "R" => Hand::Right,
            "L" => Hand::Left,
            "A" => Hand::Ambidextrous,
            _ => Hand::Unknown,
        }
    }
}

/// Per-player attributes as recorded at the time of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub hand: Hand,
    pub height_cm: f64,
    pub ioc: String,
    pub age: f64,
    pub rank: u32,
    pub rank_points: f64,
    pub seed: Option<u32>,
    pub entry: Option<String>,
}

/// In-match serve statistics for one player
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServeStats {
    pub aces: f64,
    pub double_faults: f64,
    pub serve_points: f64,
    pub first_in: f64,
    pub first_won: f64,
    pub second_won: f64,
    pub service_games: f64,
    pub bp_saved: f64,
    pub bp_faced: f64,
}

/// `num / den * 100`, or 0 when nothing was played
fn pct(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den * 100.0
    } else {
        0.0
    }
}

impl ServeStats {
    pub fn first_serve_pct(&self) -> f64 {
        pct(self.first_in, self.serve_points)
    }

    pub fn first_serve_win_pct(&self) -> f64 {
        pct(self.first_won, self.first_in)
    }

    pub fn second_serve_win_pct(&self) -> f64 {
        pct(self.second_won, self.serve_points - self.first_in)
    }

    pub fn bp_saved_pct(&self) -> f64 {
        pct(self.bp_saved, self.bp_faced)
    }
}

/// A single cleaned match record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub tourney_id: String,
    pub tourney_name: String,
    pub tourney_level: Option<String>,
    /// Sequence number within the event, tie-breaker for same-date matches
    pub match_num: u32,
    pub surface: Surface,
    pub round: Option<String>,
    pub best_of: Option<u8>,
    pub winner: PlayerInfo,
    pub loser: PlayerInfo,
    pub winner_stats: Option<ServeStats>,
    pub loser_stats: Option<ServeStats>,
}

impl MatchRecord {
    /// Key the whole pipeline is ordered by
    pub fn order_key(&self) -> (NaiveDate, u32) {
        (self.date, self.match_num)
    }
}

/// Which side of a match record a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Winner,
    Loser,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Winner => write!(f, "winner"),
            Side::Loser => write!(f, "loser"),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum TennisError {
    #[error(
        "Match stream out of order at index {index}: {current:?} follows {previous:?} \
         (expected non-decreasing (date, match_num))"
    )]
    OrderingViolation {
        index: usize,
        previous: (NaiveDate, u32),
        current: (NaiveDate, u32),
    },

    #[error("Match {tourney_id}#{match_num} has no {side} identity")]
    MissingIdentity {
        tourney_id: String,
        match_num: u32,
        side: Side,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No data: {0}")]
    NoData(String),
}

pub type Result<T> = std::result::Result<T, TennisError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub elo: EloConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Hybrid Elo configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    /// K-factor: how much ratings change per match
    pub k_factor: f64,
    /// Share of the surface rating in the blended rating (0 = overall only)
    pub surface_weight: f64,
    /// Starting rating for unseen players and surfaces
    pub start_rating: f64,
}

impl EloConfig {
    /// Reject values the rating update is not defined for
    pub fn validate(&self) -> Result<()> {
        if !(self.k_factor > 0.0) {
            return Err(TennisError::Config(format!(
                "elo.k_factor must be > 0, got {}",
                self.k_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.surface_weight) {
            return Err(TennisError::Config(format!(
                "elo.surface_weight must be within [0, 1], got {}",
                self.surface_weight
            )));
        }
        if !self.start_rating.is_finite() {
            return Err(TennisError::Config("elo.start_rating must be finite".to_string()));
        }
        Ok(())
    }
}

impl Default for EloConfig {
    fn default() -> Self {
        EloConfig {
            k_factor: 32.0,
            surface_weight: 0.5,
            start_rating: 1500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Number of most recent outcomes kept per player
    pub window: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        FormConfig { window: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed for the player1/player2 assignment
    pub seed: u64,
    /// Export in-match serve ratios alongside the pre-match features
    pub include_match_stats: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            seed: 42,
            include_match_stats: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Leading share of the chronological feature table used for training
    pub train_ratio: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig { train_ratio: 0.8 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub database_path: String,
    pub features_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/tennis.db".to_string(),
            features_path: "data/features.csv".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TennisError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TennisError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TennisError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values outside the ranges the pipeline is defined for
    pub fn validate(&self) -> Result<()> {
        self.elo.validate()?;
        if self.form.window == 0 {
            return Err(TennisError::Config("form.window must be >= 1".to_string()));
        }
        let ratio = self.evaluation.train_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(TennisError::Config(format!(
                "evaluation.train_ratio must be within (0, 1), got {}",
                ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_parse() {
        assert_eq!("Hard".parse::<Surface>().unwrap(), Surface::Hard);
        assert_eq!(" clay ".parse::<Surface>().unwrap(), Surface::Clay);
        assert_eq!("GRASS".parse::<Surface>().unwrap(), Surface::Grass);
        assert!("sand".parse::<Surface>().is_err());
    }

    #[test]
    fn test_hand_codes() {
        assert_eq!(Hand::from_code("R"), Hand::Right);
        assert_eq!(Hand::from_code("l"), Hand::Left);
        assert_eq!(Hand::from_code(""), Hand::Unknown);
        assert_eq!(Hand::Ambidextrous.code(), "A");
    }

    #[test]
    fn test_serve_ratios_zero_denominator() {
        let stats = ServeStats::default();
        assert_eq!(stats.first_serve_pct(), 0.0);
        assert_eq!(stats.second_serve_win_pct(), 0.0);
        assert_eq!(stats.bp_saved_pct(), 0.0);

        let stats = ServeStats {
            serve_points: 80.0,
            first_in: 48.0,
            first_won: 36.0,
            second_won: 16.0,
            bp_saved: 3.0,
            bp_faced: 4.0,
            ..ServeStats::default()
        };
        assert!((stats.first_serve_pct() - 60.0).abs() < 1e-9);
        assert!((stats.first_serve_win_pct() - 75.0).abs() < 1e-9);
        assert!((stats.second_serve_win_pct() - 50.0).abs() < 1e-9);
        assert!((stats.bp_saved_pct() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.form.window, 5);
        assert_eq!(config.pipeline.seed, 42);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.elo.surface_weight = 1.5;
        assert!(matches!(config.validate(), Err(TennisError::Config(_))));

        let mut config = Config::default();
        config.elo.k_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.form.window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_partial_toml() {
        let config: Config = toml::from_str("[elo]\nk_factor = 20.0\n").unwrap();
        assert_eq!(config.elo.k_factor, 20.0);
        assert_eq!(config.elo.surface_weight, 0.5);
        assert_eq!(config.form.window, 5);
    }
}
