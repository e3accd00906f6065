//! Flat CSV export of the feature table

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::features::pipeline::{FeatureRow, PlayerSnapshot};
use crate::Result;

/// One CSV line of the feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub tourney_date: String,
    pub tourney_id: String,
    pub match_num: u32,
    pub surface: String,
    pub round: Option<String>,
    pub best_of: Option<u8>,

    pub p1_id: i64,
    pub p1_name: String,
    pub p1_hand: String,
    pub p1_ht: f64,
    pub p1_ioc: String,
    pub p1_age: f64,
    pub p1_rank: u32,
    pub p1_rank_points: f64,
    pub p1_seed: Option<u32>,
    pub p1_entry: Option<String>,
    pub p1_recent_form: f64,
    pub p1_surface_win_pct: f64,
    pub p1_elo: f64,

    pub p2_id: i64,
    pub p2_name: String,
    pub p2_hand: String,
    pub p2_ht: f64,
    pub p2_ioc: String,
    pub p2_age: f64,
    pub p2_rank: u32,
    pub p2_rank_points: f64,
    pub p2_seed: Option<u32>,
    pub p2_entry: Option<String>,
    pub p2_recent_form: f64,
    pub p2_surface_win_pct: f64,
    pub p2_elo: f64,

    pub rank_diff: f64,
    pub rank_points_diff: f64,
    pub age_diff: f64,
    pub ht_diff: f64,
    pub form_diff: f64,
    pub surface_pct_diff: f64,
    pub elo_diff: f64,

    // In-match serve ratios, empty unless requested
    pub p1_1st_serve_pct: Option<f64>,
    pub p1_1st_serve_win_pct: Option<f64>,
    pub p1_2nd_serve_win_pct: Option<f64>,
    pub p1_bp_saved_pct: Option<f64>,
    pub p2_1st_serve_pct: Option<f64>,
    pub p2_1st_serve_win_pct: Option<f64>,
    pub p2_2nd_serve_win_pct: Option<f64>,
    pub p2_bp_saved_pct: Option<f64>,

    pub target: u8,
}

fn serve_ratios(p: &PlayerSnapshot, include: bool) -> [Option<f64>; 4] {
    match p.match_stats.filter(|_| include) {
        Some(s) => [
            Some(s.first_serve_pct()),
            Some(s.first_serve_win_pct()),
            Some(s.second_serve_win_pct()),
            Some(s.bp_saved_pct()),
        ],
        None => [None; 4],
    }
}

impl FeatureRecord {
    pub fn from_row(row: &FeatureRow, include_match_stats: bool) -> Self {
        let (p1, p2) = (&row.player1, &row.player2);
        let diffs = row.differences();
        let [p1_fs, p1_fsw, p1_ssw, p1_bp] = serve_ratios(p1, include_match_stats);
        let [p2_fs, p2_fsw, p2_ssw, p2_bp] = serve_ratios(p2, include_match_stats);

        FeatureRecord {
            tourney_date: row.date.format("%Y-%m-%d").to_string(),
            tourney_id: row.tourney_id.clone(),
            match_num: row.match_num,
            surface: row.surface.to_string(),
            round: row.round.clone(),
            best_of: row.best_of,

            p1_id: p1.id.0,
            p1_name: p1.name.clone(),
            p1_hand: p1.hand.code().to_string(),
            p1_ht: p1.height_cm,
            p1_ioc: p1.ioc.clone(),
            p1_age: p1.age,
            p1_rank: p1.rank,
            p1_rank_points: p1.rank_points,
            p1_seed: p1.seed,
            p1_entry: p1.entry.clone(),
            p1_recent_form: p1.recent_form,
            p1_surface_win_pct: p1.surface_win_pct,
            p1_elo: p1.elo,

            p2_id: p2.id.0,
            p2_name: p2.name.clone(),
            p2_hand: p2.hand.code().to_string(),
            p2_ht: p2.height_cm,
            p2_ioc: p2.ioc.clone(),
            p2_age: p2.age,
            p2_rank: p2.rank,
            p2_rank_points: p2.rank_points,
            p2_seed: p2.seed,
            p2_entry: p2.entry.clone(),
            p2_recent_form: p2.recent_form,
            p2_surface_win_pct: p2.surface_win_pct,
            p2_elo: p2.elo,

            rank_diff: diffs.rank_diff,
            rank_points_diff: diffs.rank_points_diff,
            age_diff: diffs.age_diff,
            ht_diff: diffs.height_diff,
            form_diff: diffs.form_diff,
            surface_pct_diff: diffs.surface_pct_diff,
            elo_diff: diffs.elo_diff,

            p1_1st_serve_pct: p1_fs,
            p1_1st_serve_win_pct: p1_fsw,
            p1_2nd_serve_win_pct: p1_ssw,
            p1_bp_saved_pct: p1_bp,
            p2_1st_serve_pct: p2_fs,
            p2_1st_serve_win_pct: p2_fsw,
            p2_2nd_serve_win_pct: p2_ssw,
            p2_bp_saved_pct: p2_bp,

            target: row.target,
        }
    }
}

/// Write the feature table as CSV, returning the number of rows written
pub fn write_features<W: Write>(
    writer: W,
    rows: &[FeatureRow],
    include_match_stats: bool,
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(FeatureRecord::from_row(row, include_match_stats))?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// Write the feature table to a file, creating parent directories
pub fn write_features_file<P: AsRef<Path>>(
    path: P,
    rows: &[FeatureRow],
    include_match_stats: bool,
) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let count = write_features(File::create(path)?, rows, include_match_stats)?;
    log::info!("Wrote {} feature rows to {}", count, path.display());
    Ok(count)
}
