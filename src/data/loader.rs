//! ATP match CSV loading and cleaning
//!
//! Reads `atp_matches_*.csv` files, rejects rows that cannot be placed in
//! the stream, imputes missing serve statistics with per-column medians and
//! returns an ordered [`MatchStream`].

use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::data::MatchStream;
use crate::{
    Hand, MatchRecord, PlayerId, PlayerInfo, Result, ServeStats, Side, Surface, TennisError,
};

const FILE_PREFIX: &str = "atp_matches_";

/// Number of serve statistic columns per player
const STAT_COLUMNS: usize = 9;

/// One CSV row as found in the source files; every cell may be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMatchRow {
    pub tourney_id: Option<String>,
    pub tourney_name: Option<String>,
    pub surface: Option<String>,
    pub tourney_level: Option<String>,
    pub tourney_date: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub match_num: Option<u32>,

    #[serde(deserialize_with = "csv::invalid_option")]
    pub winner_id: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub winner_seed: Option<f64>,
    pub winner_entry: Option<String>,
    pub winner_name: Option<String>,
    pub winner_hand: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub winner_ht: Option<f64>,
    pub winner_ioc: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub winner_age: Option<f64>,

    #[serde(deserialize_with = "csv::invalid_option")]
    pub loser_id: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub loser_seed: Option<f64>,
    pub loser_entry: Option<String>,
    pub loser_name: Option<String>,
    pub loser_hand: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub loser_ht: Option<f64>,
    pub loser_ioc: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub loser_age: Option<f64>,

    #[serde(deserialize_with = "csv::invalid_option")]
    pub best_of: Option<u8>,
    pub round: Option<String>,

    #[serde(deserialize_with = "csv::invalid_option")]
    pub w_ace: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub w_df: Option<f64>,
    #[serde(rename = "w_svpt", deserialize_with = "csv::invalid_option")]
    pub w_svpt: Option<f64>,
    #[serde(rename = "w_1stIn", deserialize_with = "csv::invalid_option")]
    pub w_first_in: Option<f64>,
    #[serde(rename = "w_1stWon", deserialize_with = "csv::invalid_option")]
    pub w_first_won: Option<f64>,
    #[serde(rename = "w_2ndWon", deserialize_with = "csv::invalid_option")]
    pub w_second_won: Option<f64>,
    #[serde(rename = "w_SvGms", deserialize_with = "csv::invalid_option")]
    pub w_sv_gms: Option<f64>,
    #[serde(rename = "w_bpSaved", deserialize_with = "csv::invalid_option")]
    pub w_bp_saved: Option<f64>,
    #[serde(rename = "w_bpFaced", deserialize_with = "csv::invalid_option")]
    pub w_bp_faced: Option<f64>,

    #[serde(deserialize_with = "csv::invalid_option")]
    pub l_ace: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub l_df: Option<f64>,
    #[serde(rename = "l_svpt", deserialize_with = "csv::invalid_option")]
    pub l_svpt: Option<f64>,
    #[serde(rename = "l_1stIn", deserialize_with = "csv::invalid_option")]
    pub l_first_in: Option<f64>,
    #[serde(rename = "l_1stWon", deserialize_with = "csv::invalid_option")]
    pub l_first_won: Option<f64>,
    #[serde(rename = "l_2ndWon", deserialize_with = "csv::invalid_option")]
    pub l_second_won: Option<f64>,
    #[serde(rename = "l_SvGms", deserialize_with = "csv::invalid_option")]
    pub l_sv_gms: Option<f64>,
    #[serde(rename = "l_bpSaved", deserialize_with = "csv::invalid_option")]
    pub l_bp_saved: Option<f64>,
    #[serde(rename = "l_bpFaced", deserialize_with = "csv::invalid_option")]
    pub l_bp_faced: Option<f64>,

    #[serde(deserialize_with = "csv::invalid_option")]
    pub winner_rank: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub winner_rank_points: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub loser_rank: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub loser_rank_points: Option<f64>,
}

impl RawMatchRow {
    fn winner_stat_cells(&self) -> [Option<f64>; STAT_COLUMNS] {
        let cells = [
            self.w_ace,
            self.w_df,
            self.w_svpt,
            self.w_first_in,
            self.w_first_won,
            self.w_second_won,
            self.w_sv_gms,
            self.w_bp_saved,
            self.w_bp_faced,
        ];
        cells.map(finite)
    }

    fn loser_stat_cells(&self) -> [Option<f64>; STAT_COLUMNS] {
        let cells = [
            self.l_ace,
            self.l_df,
            self.l_svpt,
            self.l_first_in,
            self.l_first_won,
            self.l_second_won,
            self.l_sv_gms,
            self.l_bp_saved,
            self.l_bp_faced,
        ];
        cells.map(finite)
    }

    fn label(&self) -> (String, u32) {
        (
            self.tourney_id.clone().unwrap_or_else(|| "?".to_string()),
            self.match_num.unwrap_or(0),
        )
    }

    /// Convert to a typed record, filling serve statistic gaps from `medians`
    pub fn into_record(self, medians: &StatMedians) -> Result<MatchRecord> {
        let (tourney_id, match_num) = self.label();
        let missing = |side| TennisError::MissingIdentity {
            tourney_id: tourney_id.clone(),
            match_num,
            side,
        };
        let winner_id = self.winner_id.ok_or_else(|| missing(Side::Winner))?;
        let loser_id = self.loser_id.ok_or_else(|| missing(Side::Loser))?;

        let field = |name: &str| {
            TennisError::Parse(format!("{}#{}: missing {}", tourney_id, match_num, name))
        };

        let date_str = self.tourney_date.as_deref().ok_or_else(|| field("tourney_date"))?;
        let date = parse_date(date_str)?;
        let surface: Surface = self.surface.as_deref().ok_or_else(|| field("surface"))?.parse()?;
        let match_num = self.match_num.ok_or_else(|| field("match_num"))?;

        let winner = PlayerInfo {
            id: PlayerId(winner_id),
            name: self.winner_name.clone().unwrap_or_default(),
            hand: Hand::from_code(self.winner_hand.as_deref().unwrap_or("")),
            height_cm: finite(self.winner_ht).ok_or_else(|| field("winner_ht"))?,
            ioc: self.winner_ioc.clone().unwrap_or_default(),
            age: finite(self.winner_age).ok_or_else(|| field("winner_age"))?,
            rank: to_rank(self.winner_rank).ok_or_else(|| field("winner_rank"))?,
            rank_points: finite(self.winner_rank_points)
                .ok_or_else(|| field("winner_rank_points"))?,
            seed: to_rank(self.winner_seed),
            entry: self.winner_entry.clone(),
        };
        let loser = PlayerInfo {
            id: PlayerId(loser_id),
            name: self.loser_name.clone().unwrap_or_default(),
            hand: Hand::from_code(self.loser_hand.as_deref().unwrap_or("")),
            height_cm: finite(self.loser_ht).ok_or_else(|| field("loser_ht"))?,
            ioc: self.loser_ioc.clone().unwrap_or_default(),
            age: finite(self.loser_age).ok_or_else(|| field("loser_age"))?,
            rank: to_rank(self.loser_rank).ok_or_else(|| field("loser_rank"))?,
            rank_points: finite(self.loser_rank_points)
                .ok_or_else(|| field("loser_rank_points"))?,
            seed: to_rank(self.loser_seed),
            entry: self.loser_entry.clone(),
        };

        let winner_stats = medians.impute(&self.winner_stat_cells(), 0);
        let loser_stats = medians.impute(&self.loser_stat_cells(), STAT_COLUMNS);

        Ok(MatchRecord {
            date,
            tourney_id,
            tourney_name: self.tourney_name.unwrap_or_default(),
            tourney_level: self.tourney_level,
            match_num,
            surface,
            round: self.round,
            best_of: self.best_of,
            winner,
            loser,
            winner_stats,
            loser_stats,
        })
    }
}

/// Accepts `YYYYMMDD` (source format) or `YYYY-MM-DD`
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|e| TennisError::Parse(format!("bad tourney_date {s:?}: {e}")))
}

/// `nan` and `inf` cells count as missing
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn to_rank(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v >= 0.0 && v.is_finite()).map(|v| v as u32)
}

/// Median of the present values, `None` when there are none
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Per-column medians of the winner (0..9) and loser (9..18) serve columns
#[derive(Debug, Clone, PartialEq)]
pub struct StatMedians {
    columns: [Option<f64>; 2 * STAT_COLUMNS],
}

impl StatMedians {
    pub fn from_rows(rows: &[RawMatchRow]) -> Self {
        let mut columns = [None; 2 * STAT_COLUMNS];
        for (col, slot) in columns.iter_mut().enumerate() {
            let mut values: Vec<f64> = rows
                .iter()
                .filter_map(|r| {
                    if col < STAT_COLUMNS {
                        r.winner_stat_cells()[col]
                    } else {
                        r.loser_stat_cells()[col - STAT_COLUMNS]
                    }
                })
                .collect();
            *slot = median(&mut values);
        }
        StatMedians { columns }
    }

    /// Fill gaps; `None` if a column has neither a value nor a median
    fn impute(&self, cells: &[Option<f64>; STAT_COLUMNS], offset: usize) -> Option<ServeStats> {
        let mut v = [0.0; STAT_COLUMNS];
        for (i, cell) in cells.iter().enumerate() {
            v[i] = cell.or(self.columns[offset + i])?;
        }
        Some(ServeStats {
            aces: v[0],
            double_faults: v[1],
            serve_points: v[2],
            first_in: v[3],
            first_won: v[4],
            second_won: v[5],
            service_games: v[6],
            bp_saved: v[7],
            bp_faced: v[8],
        })
    }
}

/// What cleaning did to the loaded rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub total_rows: usize,
    pub missing_identity: usize,
    pub incomplete: usize,
    pub imputed_cells: usize,
    pub kept: usize,
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows: kept {}, dropped {} without identity, {} incomplete, imputed {} stat cells",
            self.total_rows, self.kept, self.missing_identity, self.incomplete, self.imputed_cells
        )
    }
}

/// Read raw rows from any CSV source with a header line
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawMatchRow>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let rows = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<RawMatchRow>, _>>()?;
    Ok(rows)
}

pub fn read_rows_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawMatchRow>> {
    let path = path.as_ref();
    let rows = read_rows(File::open(path)?)?;
    log::debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// `atp_matches_*.csv` files in a directory, sorted by name
pub fn find_match_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let is_match_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".csv"));
        if is_match_file && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Drop unusable rows and impute serve statistics
pub fn clean(rows: Vec<RawMatchRow>) -> (Vec<MatchRecord>, CleaningReport) {
    let medians = StatMedians::from_rows(&rows);
    let mut report = CleaningReport {
        total_rows: rows.len(),
        ..CleaningReport::default()
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let gaps = row
            .winner_stat_cells()
            .iter()
            .chain(row.loser_stat_cells().iter())
            .filter(|c| c.is_none())
            .count();

        match row.into_record(&medians) {
            Ok(record) => {
                report.imputed_cells += gaps;
                records.push(record);
            }
            Err(TennisError::MissingIdentity { tourney_id, match_num, side }) => {
                log::warn!("Rejecting {}#{}: no {} id", tourney_id, match_num, side);
                report.missing_identity += 1;
            }
            Err(e) => {
                log::debug!("Dropping row: {}", e);
                report.incomplete += 1;
            }
        }
    }

    report.kept = records.len();
    (records, report)
}

/// Load, clean and order every match file in a directory
pub fn load_directory<P: AsRef<Path>>(dir: P) -> Result<(MatchStream, CleaningReport)> {
    let dir = dir.as_ref();
    let files = find_match_files(dir)?;
    if files.is_empty() {
        return Err(TennisError::NoData(format!(
            "no {}*.csv files in {}",
            FILE_PREFIX,
            dir.display()
        )));
    }

    let mut rows = Vec::new();
    for file in &files {
        rows.extend(read_rows_file(file)?);
    }
    log::info!("Loaded {} rows from {} files", rows.len(), files.len());

    let (records, report) = clean(rows);
    log::info!("Cleaning: {}", report);
    Ok((MatchStream::from_unsorted(records), report))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "tourney_id,tourney_name,surface,draw_size,tourney_level,tourney_date,match_num,\
winner_id,winner_seed,winner_entry,winner_name,winner_hand,winner_ht,winner_ioc,winner_age,\
loser_id,loser_seed,loser_entry,loser_name,loser_hand,loser_ht,loser_ioc,loser_age,\
score,best_of,round,minutes,\
w_ace,w_df,w_svpt,w_1stIn,w_1stWon,w_2ndWon,w_SvGms,w_bpSaved,w_bpFaced,\
l_ace,l_df,l_svpt,l_1stIn,l_1stWon,l_2ndWon,l_SvGms,l_bpSaved,l_bpFaced,\
winner_rank,winner_rank_points,loser_rank,loser_rank_points";

    fn sample_csv() -> String {
        let rows = [
            // complete row
            "2023-339,Brisbane,Hard,32,A,20230102,300,106421,1,,Daniil Medvedev,R,198,RUS,26.8,\
126774,,Q,Yosuke Watanuki,R,178,JPN,24.6,6-3 6-4,3,R32,80,\
10,2,60,40,32,12,9,1,2,3,4,62,35,22,14,9,5,9,7,3100,100,560",
            // missing loser serve stats: imputed
            "2023-339,Brisbane,Hard,32,A,20230102,301,104925,,,Novak Djokovic,R,188,SRB,35.6,\
105138,,,Roberto Bautista Agut,R,183,ESP,34.7,6-2 6-1,3,R32,70,\
8,1,50,35,30,10,8,0,0,,,,,,,,,,1,7000,20,1500",
            // no loser id: rejected
            "2023-339,Brisbane,Hard,32,A,20230103,302,104925,,,Novak Djokovic,R,188,SRB,35.6,\
,,,Unknown,R,,,,6-0 6-0,3,R16,50,\
5,0,40,30,25,8,6,0,0,1,2,45,25,12,10,6,2,6,1,7000,,",
            // missing height: dropped as incomplete
            "2023-339,Brisbane,Clay,32,A,20230103,303,106421,1,,Daniil Medvedev,R,198,RUS,26.8,\
200000,,,Someone,L,,USA,21.0,7-6 6-4,3,R16,100,\
9,3,70,45,35,14,10,2,4,4,5,66,40,26,12,10,3,6,7,3100,250,400",
            // bad surface: dropped as incomplete
            "2023-339,Brisbane,Sand,32,A,20230104,304,106421,1,,Daniil Medvedev,R,198,RUS,26.8,\
104925,,,Novak Djokovic,R,188,SRB,35.6,6-4 6-4,3,QF,90,\
9,3,70,45,35,14,10,2,4,4,5,66,40,26,12,10,3,6,7,3100,1,7000",
        ];
        format!("{}\n{}\n", HEADER, rows.join("\n"))
    }

    #[test]
    fn test_read_rows() {
        let rows = read_rows(sample_csv().as_bytes()).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].winner_id, Some(106421));
        assert_eq!(rows[0].w_first_in, Some(40.0));
        assert_eq!(rows[0].loser_entry.as_deref(), Some("Q"));
        assert_eq!(rows[1].l_ace, None);
        assert_eq!(rows[2].loser_id, None);
    }

    #[test]
    fn test_clean_report() {
        let rows = read_rows(sample_csv().as_bytes()).unwrap();
        let (records, report) = clean(rows);

        assert_eq!(report.total_rows, 5);
        assert_eq!(report.missing_identity, 1);
        assert_eq!(report.incomplete, 2);
        assert_eq!(report.kept, 2);
        assert_eq!(report.imputed_cells, 9);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(first.surface, Surface::Hard);
        assert_eq!(first.winner.seed, Some(1));
        assert_eq!(first.winner.rank, 7);
        assert_eq!(first.loser.hand, Hand::Right);
        assert_eq!(first.winner_stats.unwrap().first_in, 40.0);
    }

    #[test]
    fn test_imputation_uses_column_median() {
        let rows = read_rows(sample_csv().as_bytes()).unwrap();
        let (records, _) = clean(rows);

        // l_ace over the rows that have it: 3, 4, 4, 1 -> median 3.5
        let imputed = records[1].loser_stats.unwrap();
        assert_eq!(imputed.aces, 3.5);
        // Present cells are untouched
        assert_eq!(records[1].winner_stats.unwrap().aces, 8.0);
    }

    #[test]
    fn test_non_finite_cells_are_missing() {
        let rows = [
            // nan height: dropped as incomplete
            "2023-339,Brisbane,Hard,32,A,20230102,310,106421,1,,Daniil Medvedev,R,nan,RUS,26.8,\
126774,,Q,Yosuke Watanuki,R,178,JPN,24.6,6-3 6-4,3,R32,80,\
10,2,60,40,32,12,9,1,2,3,4,62,35,22,14,9,5,9,7,3100,100,560",
            // inf rank points: dropped as incomplete
            "2023-339,Brisbane,Hard,32,A,20230102,311,106421,1,,Daniil Medvedev,R,198,RUS,26.8,\
126774,,Q,Yosuke Watanuki,R,178,JPN,24.6,6-3 6-4,3,R32,80,\
12,2,60,40,32,12,9,1,2,3,4,62,35,22,14,9,5,9,7,3100,100,inf",
            // NaN ace count: imputed from the finite cells (10, 12)
            "2023-339,Brisbane,Hard,32,A,20230103,312,106421,1,,Daniil Medvedev,R,198,RUS,26.8,\
126774,,Q,Yosuke Watanuki,R,178,JPN,24.6,6-3 6-4,3,R16,80,\
NaN,2,60,40,32,12,9,1,2,3,4,62,35,22,14,9,5,9,7,3100,100,560",
        ];
        let csv = format!("{}\n{}\n", HEADER, rows.join("\n"));
        let (records, report) = clean(read_rows(csv.as_bytes()).unwrap());

        assert_eq!(report.incomplete, 2);
        assert_eq!(report.kept, 1);
        assert_eq!(report.imputed_cells, 1);
        let stats = records[0].winner_stats.unwrap();
        assert_eq!(stats.aces, 11.0);
        assert!(records[0].winner.height_cm.is_finite());

        // Stored records read back intact
        let db = crate::data::Database::in_memory().unwrap();
        db.upsert_matches(&records).unwrap();
        assert_eq!(db.get_all_matches().unwrap(), records);
    }

    #[test]
    fn test_missing_identity_error() {
        let rows = read_rows(sample_csv().as_bytes()).unwrap();
        let medians = StatMedians::from_rows(&rows);
        let err = rows[2].clone().into_record(&medians).unwrap_err();
        assert!(matches!(
            err,
            TennisError::MissingIdentity { side: Side::Loser, match_num: 302, .. }
        ));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2019, 12, 30).unwrap();
        assert_eq!(parse_date("20191230").unwrap(), expected);
        assert_eq!(parse_date("2019-12-30").unwrap(), expected);
        assert!(parse_date("30/12/2019").is_err());
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("atp_matches_2023.csv"), sample_csv()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = find_match_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);

        let (stream, report) = load_directory(dir.path()).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(report.kept, 2);
        assert!(MatchStream::new(stream.into_inner()).is_ok());
    }

    #[test]
    fn test_load_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_directory(dir.path()),
            Err(TennisError::NoData(_))
        ));
    }
}
