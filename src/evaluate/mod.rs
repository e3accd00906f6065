//! Baseline evaluation of the feature table
//!
//! Rows are split chronologically (never shuffled) and simple pre-match
//! predictors are scored on the later part.

pub mod metrics;

pub use metrics::Metrics;

use chrono::NaiveDate;
use std::fmt;

use crate::features::{expected_win_prob, FeatureRow};
use crate::{Result, TennisError};

/// Split rows into a leading train part and a trailing test part
pub fn chronological_split(rows: &[FeatureRow], train_ratio: f64) -> (&[FeatureRow], &[FeatureRow]) {
    let ratio = train_ratio.clamp(0.0, 1.0);
    let cut = ((rows.len() as f64) * ratio).floor() as usize;
    rows.split_at(cut.min(rows.len()))
}

/// Predictors that need no training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// Expected score from the pre-match blended ratings
    Elo,
    /// The better ranked player wins
    HigherRank,
}

impl Baseline {
    pub const ALL: [Baseline; 2] = [Baseline::Elo, Baseline::HigherRank];

    pub fn name(&self) -> &'static str {
        match self {
            Baseline::Elo => "elo",
            Baseline::HigherRank => "higher-rank",
        }
    }

    /// Probability that player1 wins
    pub fn probability(&self, row: &FeatureRow) -> f64 {
        match self {
            Baseline::Elo => expected_win_prob(row.player1.elo, row.player2.elo),
            Baseline::HigherRank => match row.player1.rank.cmp(&row.player2.rank) {
                std::cmp::Ordering::Less => 1.0,
                std::cmp::Ordering::Greater => 0.0,
                std::cmp::Ordering::Equal => 0.5,
            },
        }
    }

    pub fn score(&self, rows: &[FeatureRow]) -> Metrics {
        let probs: Vec<f64> = rows.iter().map(|r| self.probability(r)).collect();
        let labels: Vec<u8> = rows.iter().map(|r| r.target).collect();
        Metrics::from_predictions(&probs, &labels)
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Baseline scores on the test part of a split
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub train_size: usize,
    pub test_size: usize,
    /// Date of the first test row
    pub test_start: Option<NaiveDate>,
    /// Share of test rows where player1 won
    pub test_target_rate: f64,
    pub results: Vec<(Baseline, Metrics)>,
}

/// Score every baseline on the chronological test split
pub fn evaluate_baselines(rows: &[FeatureRow], train_ratio: f64) -> Result<EvaluationReport> {
    let (train, test) = chronological_split(rows, train_ratio);
    if test.is_empty() {
        return Err(TennisError::NoData(format!(
            "no test rows after a {:.0}% chronological split of {} rows",
            train_ratio * 100.0,
            rows.len()
        )));
    }

    let positives = test.iter().filter(|r| r.target == 1).count();
    let results: Vec<(Baseline, Metrics)> = Baseline::ALL
        .iter()
        .map(|b| (*b, b.score(test)))
        .collect();

    for (baseline, metrics) in &results {
        log::debug!("{:<12} {}", baseline.name(), metrics);
    }

    Ok(EvaluationReport {
        train_size: train.len(),
        test_size: test.len(),
        test_start: test.first().map(|r| r.date),
        test_target_rate: positives as f64 / test.len() as f64,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::make_match_on;
    use crate::features::FeaturePipeline;
    use crate::{EloConfig, Surface};

    fn rows(n: u32) -> Vec<FeatureRow> {
        let mut pipeline = FeaturePipeline::with_settings(EloConfig::default(), 5, 7).unwrap();
        (0..n)
            .map(|i| {
                let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Days::new(i as u64);
                // Player 1 is the best ranked and wins everything
                let opponent = 2 + (i as i64 % 3);
                let record = make_match_on(date, 1, opponent, i, Surface::Hard);
                pipeline.process(&record).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_split_keeps_order() {
        let rows = rows(10);
        let (train, test) = chronological_split(&rows, 0.8);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert!(train.last().unwrap().date < test[0].date);

        let (train, test) = chronological_split(&rows, 0.25);
        assert_eq!((train.len(), test.len()), (2, 8));
    }

    #[test]
    fn test_higher_rank_probability() {
        let rows = rows(1);
        let row = &rows[0];
        let p = Baseline::HigherRank.probability(row);
        // Player 1 has the lowest rank number in the fixtures
        if row.player1.id.0 == 1 {
            assert_eq!(p, 1.0);
        } else {
            assert_eq!(p, 0.0);
        }
        // No history yet, both at the starting rating
        assert_eq!(Baseline::Elo.probability(row), 0.5);
    }

    #[test]
    fn test_baselines_on_dominant_player() {
        let rows = rows(40);
        let report = evaluate_baselines(&rows, 0.5).unwrap();
        assert_eq!(report.train_size, 20);
        assert_eq!(report.test_size, 20);
        assert_eq!(report.test_start, Some(rows[20].date));

        for (baseline, metrics) in &report.results {
            assert_eq!(metrics.count, 20);
            // By then player 1 is rated above every opponent, and ranked above them
            assert_eq!(metrics.accuracy, 1.0, "{baseline} should call every match");
        }
    }

    #[test]
    fn test_no_test_rows() {
        let rows = rows(3);
        assert!(matches!(
            evaluate_baselines(&rows, 1.0),
            Err(TennisError::NoData(_))
        ));
        assert!(matches!(
            evaluate_baselines(&[], 0.8),
            Err(TennisError::NoData(_))
        ));
    }
}
