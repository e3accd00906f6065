//! Recent form and surface win-rate tracking
//!
//! Rolling window of match outcomes plus career (wins, played) counters per
//! surface, keyed by player.

use std::collections::{HashMap, VecDeque};

use crate::{PlayerId, Surface};

/// Default number of outcomes kept in the rolling window
pub const DEFAULT_WINDOW: usize = 5;

/// Wins and matches played on one surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceRecord {
    pub wins: u32,
    pub played: u32,
}

impl SurfaceRecord {
    /// Win ratio (0-1), 0 when nothing has been played
    pub fn win_pct(&self) -> f64 {
        if self.played == 0 {
            0.0
        } else {
            self.wins as f64 / self.played as f64
        }
    }
}

/// Form state for a single player
#[derive(Debug, Clone, Default)]
pub struct PlayerFormState {
    /// Most recent outcomes, oldest first (1 = win, 0 = loss)
    recent: VecDeque<u8>,
    surfaces: HashMap<Surface, SurfaceRecord>,
}

impl PlayerFormState {
    /// Mean of the outcome window, 0 with no history
    pub fn recent_form(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let wins: u32 = self.recent.iter().map(|&o| o as u32).sum();
        wins as f64 / self.recent.len() as f64
    }

    pub fn surface_record(&self, surface: Surface) -> SurfaceRecord {
        self.surfaces.get(&surface).copied().unwrap_or_default()
    }

    pub fn window(&self) -> impl Iterator<Item = u8> + '_ {
        self.recent.iter().copied()
    }

    pub fn window_len(&self) -> usize {
        self.recent.len()
    }

    fn record(&mut self, won: bool, surface: Surface, window: usize) {
        self.recent.push_back(won as u8);
        while self.recent.len() > window {
            self.recent.pop_front();
        }

        let entry = self.surfaces.entry(surface).or_default();
        if won {
            entry.wins += 1;
        }
        entry.played += 1;
    }
}

/// Pre-match form snapshot for one player
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FormSnapshot {
    pub recent_form: f64,
    pub surface_win_pct: f64,
}

/// Tracks rolling form and surface records for every player seen so far
#[derive(Debug, Clone)]
pub struct FormTracker {
    window: usize,
    players: HashMap<PlayerId, PlayerFormState>,
}

impl Default for FormTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl FormTracker {
    /// Create a tracker keeping the last `window` outcomes (at least 1)
    pub fn new(window: usize) -> Self {
        FormTracker {
            window: window.max(1),
            players: HashMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Form as of now (call BEFORE update)
    pub fn query(&self, player: PlayerId, surface: Surface) -> FormSnapshot {
        match self.players.get(&player) {
            Some(state) => FormSnapshot {
                recent_form: state.recent_form(),
                surface_win_pct: state.surface_record(surface).win_pct(),
            },
            None => FormSnapshot::default(),
        }
    }

    /// Record a finished match for both players
    pub fn update(&mut self, winner: PlayerId, loser: PlayerId, surface: Surface) {
        let window = self.window;
        self.players
            .entry(winner)
            .or_default()
            .record(true, surface, window);
        self.players
            .entry(loser)
            .or_default()
            .record(false, surface, window);
    }

    pub fn get(&self, player: PlayerId) -> Option<&PlayerFormState> {
        self.players.get(&player)
    }

    /// Number of players with recorded state
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Reset all state
    pub fn reset(&mut self) {
        self.players.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_player() {
        let tracker = FormTracker::default();
        let snap = tracker.query(PlayerId(1), Surface::Hard);
        assert_eq!(snap.recent_form, 0.0);
        assert_eq!(snap.surface_win_pct, 0.0);
        assert_eq!(tracker.player_count(), 0);
    }

    #[test]
    fn test_update_both_players() {
        let mut tracker = FormTracker::default();
        tracker.update(PlayerId(1), PlayerId(2), Surface::Clay);

        let winner = tracker.query(PlayerId(1), Surface::Clay);
        assert_eq!(winner.recent_form, 1.0);
        assert_eq!(winner.surface_win_pct, 1.0);

        let loser = tracker.query(PlayerId(2), Surface::Clay);
        assert_eq!(loser.recent_form, 0.0);
        assert_eq!(loser.surface_win_pct, 0.0);
        assert_eq!(
            tracker.get(PlayerId(2)).unwrap().surface_record(Surface::Clay),
            SurfaceRecord { wins: 0, played: 1 }
        );
    }

    #[test]
    fn test_surface_without_plays_is_zero() {
        let mut tracker = FormTracker::default();
        tracker.update(PlayerId(1), PlayerId(2), Surface::Clay);

        // Played on clay only
        let snap = tracker.query(PlayerId(1), Surface::Grass);
        assert_eq!(snap.surface_win_pct, 0.0);
        assert!(!snap.surface_win_pct.is_nan());
        assert_eq!(snap.recent_form, 1.0);
    }

    #[test]
    fn test_window_bound() {
        let mut tracker = FormTracker::new(5);

        // W W W L L L L: the window keeps the last five (W L L L L)
        for _ in 0..3 {
            tracker.update(PlayerId(1), PlayerId(9), Surface::Hard);
        }
        for _ in 0..4 {
            tracker.update(PlayerId(9), PlayerId(1), Surface::Hard);
        }

        let state = tracker.get(PlayerId(1)).unwrap();
        assert_eq!(state.window_len(), 5);
        assert_eq!(state.window().collect::<Vec<_>>(), vec![1, 0, 0, 0, 0]);
        assert!((tracker.query(PlayerId(1), Surface::Hard).recent_form - 0.2).abs() < 1e-12);

        // Surface counters are not windowed
        assert_eq!(
            state.surface_record(Surface::Hard),
            SurfaceRecord { wins: 3, played: 7 }
        );
    }

    #[test]
    fn test_short_history_mean() {
        let mut tracker = FormTracker::new(5);
        tracker.update(PlayerId(1), PlayerId(2), Surface::Hard);
        tracker.update(PlayerId(3), PlayerId(1), Surface::Hard);

        assert_eq!(tracker.get(PlayerId(1)).unwrap().window_len(), 2);
        assert_eq!(tracker.query(PlayerId(1), Surface::Hard).recent_form, 0.5);
    }

    #[test]
    fn test_zero_window_clamped() {
        let mut tracker = FormTracker::new(0);
        assert_eq!(tracker.window(), 1);
        tracker.update(PlayerId(1), PlayerId(2), Surface::Hard);
        tracker.update(PlayerId(2), PlayerId(1), Surface::Hard);
        assert_eq!(tracker.query(PlayerId(1), Surface::Hard).recent_form, 0.0);
    }
}
