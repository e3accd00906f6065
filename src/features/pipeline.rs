//! Match-by-match feature generation
//!
//! Every match goes through three phases in order: assign player1/player2,
//! snapshot both players from pre-match state, then advance the form and
//! rating trackers with the real result. A row therefore never sees its own
//! outcome.

use chrono::NaiveDate;

use crate::data::MatchStream;
use crate::features::elo::{BlendedRating, RatingEngine};
use crate::features::form::{FormSnapshot, FormTracker};
use crate::features::identity::IdentityAssigner;
use crate::{
    Config, EloConfig, Hand, MatchRecord, PlayerId, PlayerInfo, Result, ServeStats, Surface,
    TennisError,
};

/// One player's attributes and pre-match state within a feature row
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
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
    pub recent_form: f64,
    pub surface_win_pct: f64,
    /// Blended Elo used as the feature
    pub elo: f64,
    pub elo_overall: f64,
    pub elo_surface: f64,
    /// Serve statistics of the match itself (post-match information)
    pub match_stats: Option<ServeStats>,
}

impl PlayerSnapshot {
    fn new(
        info: &PlayerInfo,
        form: FormSnapshot,
        rating: BlendedRating,
        match_stats: Option<ServeStats>,
    ) -> Self {
        PlayerSnapshot {
            id: info.id,
            name: info.name.clone(),
            hand: info.hand,
            height_cm: info.height_cm,
            ioc: info.ioc.clone(),
            age: info.age,
            rank: info.rank,
            rank_points: info.rank_points,
            seed: info.seed,
            entry: info.entry.clone(),
            recent_form: form.recent_form,
            surface_win_pct: form.surface_win_pct,
            elo: rating.blended,
            elo_overall: rating.overall,
            elo_surface: rating.surface,
            match_stats,
        }
    }
}

/// Player1 minus player2 differences used by downstream models
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DifferenceFeatures {
    pub rank_diff: f64,
    pub rank_points_diff: f64,
    pub age_diff: f64,
    pub height_diff: f64,
    pub form_diff: f64,
    pub surface_pct_diff: f64,
    pub elo_diff: f64,
}

/// One output row per match
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub tourney_id: String,
    pub tourney_name: String,
    pub match_num: u32,
    pub surface: Surface,
    pub round: Option<String>,
    pub best_of: Option<u8>,
    pub player1: PlayerSnapshot,
    pub player2: PlayerSnapshot,
    /// 1 if player1 won
    pub target: u8,
    pub elo_diff: f64,
}

impl FeatureRow {
    pub fn differences(&self) -> DifferenceFeatures {
        let (p1, p2) = (&self.player1, &self.player2);
        DifferenceFeatures {
            rank_diff: p1.rank as f64 - p2.rank as f64,
            rank_points_diff: p1.rank_points - p2.rank_points,
            age_diff: p1.age - p2.age,
            height_diff: p1.height_cm - p2.height_cm,
            form_diff: p1.recent_form - p2.recent_form,
            surface_pct_diff: p1.surface_win_pct - p2.surface_win_pct,
            elo_diff: self.elo_diff,
        }
    }

    pub fn winner(&self) -> PlayerId {
        if self.target == 1 {
            self.player1.id
        } else {
            self.player2.id
        }
    }
}

/// Drives the assigner and both trackers over a time-ordered stream
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    form: FormTracker,
    elo: RatingEngine,
    assigner: IdentityAssigner,
    last_key: Option<(NaiveDate, u32)>,
    processed: usize,
}

impl FeaturePipeline {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::with_settings(config.elo, config.form.window, config.pipeline.seed)
    }

    /// Fails on out-of-range Elo settings or an empty form window
    pub fn with_settings(elo: EloConfig, window: usize, seed: u64) -> Result<Self> {
        if window == 0 {
            return Err(TennisError::Config("form.window must be >= 1".to_string()));
        }
        Ok(FeaturePipeline {
            form: FormTracker::new(window),
            elo: RatingEngine::new(elo)?,
            assigner: IdentityAssigner::new(seed),
            last_key: None,
            processed: 0,
        })
    }

    /// Process the next match; it must not precede the previous one
    pub fn process(&mut self, record: &MatchRecord) -> Result<FeatureRow> {
        let key = record.order_key();
        if let Some(previous) = self.last_key {
            if key < previous {
                return Err(TennisError::OrderingViolation {
                    index: self.processed,
                    previous,
                    current: key,
                });
            }
        }

        // Assign
        let assignment = self.assigner.assign(record);
        let (p1, p2) = (assignment.player1, assignment.player2);
        let surface = record.surface;

        // Snapshot
        let p1_form = self.form.query(p1.id, surface);
        let p2_form = self.form.query(p2.id, surface);
        let p1_rating = self.elo.blended_rating(p1.id, surface);
        let p2_rating = self.elo.blended_rating(p2.id, surface);
        let (p1_stats, p2_stats) = assignment.pair(record.winner_stats, record.loser_stats);

        let row = FeatureRow {
            date: record.date,
            tourney_id: record.tourney_id.clone(),
            tourney_name: record.tourney_name.clone(),
            match_num: record.match_num,
            surface,
            round: record.round.clone(),
            best_of: record.best_of,
            player1: PlayerSnapshot::new(p1, p1_form, p1_rating, p1_stats),
            player2: PlayerSnapshot::new(p2, p2_form, p2_rating, p2_stats),
            target: assignment.target(),
            elo_diff: p1_rating.blended - p2_rating.blended,
        };

        // Advance
        let (winner, loser) = (assignment.winner(), assignment.loser());
        self.form.update(winner, loser, surface);
        self.elo.update(winner, loser, surface);

        self.last_key = Some(key);
        self.processed += 1;
        Ok(row)
    }

    /// Process a whole stream; any failure discards all rows
    pub fn run(&mut self, stream: &MatchStream) -> Result<Vec<FeatureRow>> {
        let rows = stream
            .iter()
            .map(|record| self.process(record))
            .collect::<Result<Vec<_>>>()?;

        let p1_wins = rows.iter().filter(|r| r.target == 1).count();
        log::info!(
            "Generated {} feature rows for {} players (player1 won {:.1}%)",
            rows.len(),
            self.elo.player_count(),
            if rows.is_empty() {
                0.0
            } else {
                100.0 * p1_wins as f64 / rows.len() as f64
            }
        );
        Ok(rows)
    }

    pub fn form(&self) -> &FormTracker {
        &self.form
    }

    pub fn elo(&self) -> &RatingEngine {
        &self.elo
    }

    /// Matches processed since creation or the last reset
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Back to the initial state, replaying the same assignment sequence
    pub fn reset(&mut self) {
        self.form.reset();
        self.elo.reset();
        self.assigner.reset();
        self.last_key = None;
        self.processed = 0;
    }
}
