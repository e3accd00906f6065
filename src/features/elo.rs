//! Hybrid Elo rating system
//!
//! Each player carries an overall rating and one rating per surface. The
//! rating used for prediction is a weighted blend of the two, and a single
//! delta computed from the blended ratings moves both components.

use std::collections::HashMap;

use crate::{EloConfig, PlayerId, Result, Surface};

/// Expected score (0-1) of a player rated `rating_a` against `rating_b`
pub fn expected_win_prob(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / 400.0))
}

/// Rating state for a single player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRatingState {
    pub overall: f64,
    surfaces: HashMap<Surface, f64>,
}

impl PlayerRatingState {
    fn new(start_rating: f64) -> Self {
        PlayerRatingState {
            overall: start_rating,
            surfaces: HashMap::new(),
        }
    }

    /// Surface rating, if the player has been rated on that surface
    pub fn surface(&self, surface: Surface) -> Option<f64> {
        self.surfaces.get(&surface).copied()
    }
}

/// Blended rating together with the components it was built from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendedRating {
    pub blended: f64,
    pub overall: f64,
    pub surface: f64,
}

/// Who played whom, in player1/player2 terms, and who won
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub surface: Surface,
    pub player1_won: bool,
}

/// Pre-match Elo features for one match
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EloFeatures {
    pub p1_elo: f64,
    pub p2_elo: f64,
    pub elo_diff: f64,
}

/// Overall + surface Elo ratings for every player seen so far
#[derive(Debug, Clone)]
pub struct RatingEngine {
    ratings: HashMap<PlayerId, PlayerRatingState>,
    config: EloConfig,
}

impl Default for RatingEngine {
    fn default() -> Self {
        RatingEngine {
            ratings: HashMap::new(),
            config: EloConfig::default(),
        }
    }
}

impl RatingEngine {
    /// Create an engine; fails on a non-positive K or a surface weight outside [0, 1]
    pub fn new(config: EloConfig) -> Result<Self> {
        config.validate()?;
        Ok(RatingEngine {
            ratings: HashMap::new(),
            config,
        })
    }

    /// Current blended rating (call BEFORE update); unseen players and
    /// surfaces fall back to the start rating
    pub fn blended_rating(&self, player: PlayerId, surface: Surface) -> BlendedRating {
        let start = self.config.start_rating;
        let (overall, surface_rating) = match self.ratings.get(&player) {
            Some(state) => (state.overall, state.surface(surface).unwrap_or(start)),
            None => (start, start),
        };
        let w = self.config.surface_weight;
        BlendedRating {
            blended: (1.0 - w) * overall + w * surface_rating,
            overall,
            surface: surface_rating,
        }
    }

    /// Update ratings after a match and return the delta applied
    ///
    /// The winner gains and the loser drops the same amount on both the
    /// overall and the surface component.
    pub fn update(&mut self, winner: PlayerId, loser: PlayerId, surface: Surface) -> f64 {
        let w = self.blended_rating(winner, surface);
        let l = self.blended_rating(loser, surface);

        let delta = self.config.k_factor * (1.0 - expected_win_prob(w.blended, l.blended));
        log::debug!(
            "elo {} beats {} on {}: {:.1} vs {:.1}, delta {:.3}",
            winner,
            loser,
            surface,
            w.blended,
            l.blended,
            delta
        );

        self.apply(winner, surface, w.overall + delta, w.surface + delta);
        self.apply(loser, surface, l.overall - delta, l.surface - delta);
        delta
    }

    fn apply(&mut self, player: PlayerId, surface: Surface, overall: f64, surface_rating: f64) {
        let start = self.config.start_rating;
        let state = self
            .ratings
            .entry(player)
            .or_insert_with(|| PlayerRatingState::new(start));
        state.overall = overall;
        state.surfaces.insert(surface, surface_rating);
    }

    /// Walk a time-ordered slice of matches, recording each match's pre-match
    /// ratings before applying its result
    pub fn fit_transform<T, F>(&mut self, matches: &[T], pairing_of: F) -> Vec<EloFeatures>
    where
        F: Fn(&T) -> Pairing,
    {
        let mut features = Vec::with_capacity(matches.len());
        for m in matches {
            let pairing = pairing_of(m);
            let p1 = self.blended_rating(pairing.player1, pairing.surface).blended;
            let p2 = self.blended_rating(pairing.player2, pairing.surface).blended;
            features.push(EloFeatures {
                p1_elo: p1,
                p2_elo: p2,
                elo_diff: p1 - p2,
            });

            if pairing.player1_won {
                self.update(pairing.player1, pairing.player2, pairing.surface);
            } else {
                self.update(pairing.player2, pairing.player1, pairing.surface);
            }
        }
        features
    }

    pub fn get(&self, player: PlayerId) -> Option<&PlayerRatingState> {
        self.ratings.get(&player)
    }

    /// All rated players, in no particular order
    pub fn ratings(&self) -> impl Iterator<Item = (PlayerId, &PlayerRatingState)> + '_ {
        self.ratings.iter().map(|(id, state)| (*id, state))
    }

    pub fn player_count(&self) -> usize {
        self.ratings.len()
    }

    /// Reset all ratings
    pub fn reset(&mut self) {
        self.ratings.clear();
    }
}
