//! SQLite storage for cleaned matches and end-of-run ratings

use crate::features::RatingEngine;
use crate::{MatchRecord, PlayerId, PlayerInfo, Result, ServeStats, Surface};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                hand TEXT NOT NULL,
                ioc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                tourney_id TEXT NOT NULL,
                tourney_name TEXT NOT NULL,
                tourney_level TEXT,
                match_num INTEGER NOT NULL,
                surface TEXT NOT NULL,
                round TEXT,
                best_of INTEGER,
                winner_id INTEGER NOT NULL REFERENCES players(id),
                loser_id INTEGER NOT NULL REFERENCES players(id),
                winner TEXT NOT NULL,
                loser TEXT NOT NULL,
                winner_stats TEXT,
                loser_stats TEXT,
                UNIQUE(tourney_id, match_num, winner_id, loser_id)
            );

            CREATE TABLE IF NOT EXISTS ratings (
                player_id INTEGER PRIMARY KEY REFERENCES players(id),
                overall REAL NOT NULL,
                hard REAL,
                clay REAL,
                grass REAL,
                carpet REAL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_matches_order ON matches(date, match_num);
            CREATE INDEX IF NOT EXISTS idx_matches_players ON matches(winner_id, loser_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Player Operations ====================

    fn upsert_player(&self, player: &PlayerInfo) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO players (id, name, hand, ioc) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                hand = excluded.hand,
                ioc = excluded.ioc
            "#,
            params![player.id.0, player.name, player.hand.code(), player.ioc],
        )?;
        Ok(())
    }

    /// Get a player's name by ID
    pub fn player_name(&self, id: PlayerId) -> Result<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM players WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    // ==================== Match Operations ====================

    /// Insert or update a match record
    pub fn upsert_match(&self, record: &MatchRecord) -> Result<()> {
        self.upsert_player(&record.winner)?;
        self.upsert_player(&record.loser)?;

        let winner_stats = record
            .winner_stats
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let loser_stats = record
            .loser_stats
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO matches (date, tourney_id, tourney_name, tourney_level, match_num,
                                 surface, round, best_of, winner_id, loser_id,
                                 winner, loser, winner_stats, loser_stats)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(tourney_id, match_num, winner_id, loser_id) DO UPDATE SET
                date = excluded.date,
                surface = excluded.surface,
                winner = excluded.winner,
                loser = excluded.loser,
                winner_stats = COALESCE(excluded.winner_stats, winner_stats),
                loser_stats = COALESCE(excluded.loser_stats, loser_stats)
            "#,
            params![
                record.date.format("%Y-%m-%d").to_string(),
                record.tourney_id,
                record.tourney_name,
                record.tourney_level,
                record.match_num,
                record.surface.as_str(),
                record.round,
                record.best_of,
                record.winner.id.0,
                record.loser.id.0,
                serde_json::to_string(&record.winner)?,
                serde_json::to_string(&record.loser)?,
                winner_stats,
                loser_stats,
            ],
        )?;
        Ok(())
    }

    /// Insert multiple match records in one transaction
    pub fn upsert_matches(&self, records: &[MatchRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        for record in records {
            self.upsert_match(record)?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    /// Get all matches in stream order
    pub fn get_all_matches(&self) -> Result<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, tourney_id, tourney_name, tourney_level, match_num,
                    surface, round, best_of, winner, loser, winner_stats, loser_stats
             FROM matches
             ORDER BY date, match_num, id",
        )?;

        let matches = stmt
            .query_map([], Self::row_to_match)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(matches)
    }

    /// Get matches a player took part in, in stream order
    pub fn get_player_matches(&self, player: PlayerId) -> Result<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, tourney_id, tourney_name, tourney_level, match_num,
                    surface, round, best_of, winner, loser, winner_stats, loser_stats
             FROM matches
             WHERE winner_id = ?1 OR loser_id = ?1
             ORDER BY date, match_num, id",
        )?;

        let matches = stmt
            .query_map(params![player.0], Self::row_to_match)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(matches)
    }

    fn row_to_match(row: &rusqlite::Row) -> rusqlite::Result<MatchRecord> {
        let date_str: String = row.get(0)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

        let surface_str: String = row.get(5)?;
        let surface: Surface = surface_str
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(MatchRecord {
            date,
            tourney_id: row.get(1)?,
            tourney_name: row.get(2)?,
            tourney_level: row.get(3)?,
            match_num: row.get(4)?,
            surface,
            round: row.get(6)?,
            best_of: row.get(7)?,
            winner: json_column(row, 8)?,
            loser: json_column(row, 9)?,
            winner_stats: optional_json_column::<ServeStats>(row, 10)?,
            loser_stats: optional_json_column::<ServeStats>(row, 11)?,
        })
    }

    // ==================== Rating Operations ====================

    /// Replace stored ratings with the engine's end state
    pub fn save_ratings(&self, engine: &RatingEngine) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute("DELETE FROM ratings", [])?;
        let mut count = 0;
        for (player, state) in engine.ratings() {
            self.conn.execute(
                "INSERT INTO ratings (player_id, overall, hard, clay, grass, carpet)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    player.0,
                    state.overall,
                    state.surface(Surface::Hard),
                    state.surface(Surface::Clay),
                    state.surface(Surface::Grass),
                    state.surface(Surface::Carpet),
                ],
            )?;
            count += 1;
        }
        tx.commit()?;
        log::info!("Saved ratings for {} players", count);
        Ok(count)
    }

    /// Highest rated players, by overall rating or by one surface
    pub fn top_ratings(&self, limit: usize, surface: Option<Surface>) -> Result<Vec<RatingEntry>> {
        let column = match surface {
            None => "overall",
            Some(Surface::Hard) => "hard",
            Some(Surface::Clay) => "clay",
            Some(Surface::Grass) => "grass",
            Some(Surface::Carpet) => "carpet",
        };
        let query = format!(
            "SELECT r.player_id, COALESCE(p.name, ''), r.overall, r.{column}
             FROM ratings r LEFT JOIN players p ON p.id = r.player_id
             WHERE r.{column} IS NOT NULL
             ORDER BY r.{column} DESC, r.player_id
             LIMIT ?1"
        );

        let mut stmt = self.conn.prepare(&query)?;
        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RatingEntry {
                    player: PlayerId(row.get(0)?),
                    name: row.get(1)?,
                    overall: row.get(2)?,
                    ranked_by: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let player_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?;

        let match_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))?;

        let rated_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ratings", [], |row| row.get(0))?;

        let (min_date, max_date): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM matches",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DatabaseStats {
            player_count: player_count as usize,
            match_count: match_count as usize,
            rated_count: rated_count as usize,
            earliest_match: min_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            latest_match: max_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        })
    }
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        serde_json::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// One leaderboard line
#[derive(Debug, Clone, PartialEq)]
pub struct RatingEntry {
    pub player: PlayerId,
    pub name: String,
    pub overall: f64,
    /// The rating the list is ordered by (overall or the chosen surface)
    pub ranked_by: f64,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub player_count: usize,
    pub match_count: usize,
    pub rated_count: usize,
    pub earliest_match: Option<NaiveDate>,
    pub latest_match: Option<NaiveDate>,
}
