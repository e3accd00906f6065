//! Tennis Prediction Features CLI
//!
//! Imports ATP match CSVs and builds a leakage-free feature table with rolling
//! form and hybrid surface Elo ratings.

use clap::{Parser, Subcommand};
use tennis::{Config, Result};

#[derive(Parser)]
#[command(name = "tennis")]
#[command(about = "Leakage-free tennis match features with hybrid surface Elo", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Build the feature table from stored matches
    Features {
        /// Output CSV path (defaults to data.features_path)
        #[arg(long)]
        output: Option<String>,
        /// Also export in-match serve ratios
        #[arg(long)]
        match_stats: bool,
    },
    /// Compute end-of-stream ratings and show the leaderboard
    Ratings {
        /// Number of players to show
        #[arg(long, default_value = "20")]
        top: usize,
        /// Rank by one surface instead of the overall rating
        #[arg(long)]
        surface: Option<String>,
    },
    /// Score baseline predictors on a chronological test split
    Evaluate {
        /// Override the train share of the split
        #[arg(long)]
        train_ratio: Option<f64>,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Load, clean and store atp_matches_*.csv files from a directory
    Import {
        /// Directory containing the CSV files
        dir: String,
    },
    /// Show database status
    Status,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { dir } => commands::data_import(&config, &dir),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Features {
            output,
            match_stats,
        } => commands::features(&config, output, match_stats),
        Commands::Ratings { top, surface } => commands::ratings(&config, top, surface),
        Commands::Evaluate { train_ratio } => commands::evaluate(&config, train_ratio),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use tennis::data::{load_directory, Database, MatchStream};
    use tennis::evaluate::evaluate_baselines;
    use tennis::features::export::write_features_file;
    use tennis::features::{FeaturePipeline, FeatureRow};
    use tennis::{Surface, TennisError};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'tennis data import <dir>' to load atp_matches_*.csv files");
        println!("  3. Run 'tennis features' to build the feature table");
        println!("  4. Run 'tennis evaluate' to score the baselines");

        Ok(())
    }

    pub fn data_import(config: &Config, dir: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        println!("Loading match files from {}...", dir);
        let (stream, report) = load_directory(dir)?;
        println!("{}", report);

        let count = db.upsert_matches(stream.as_slice())?;
        println!("Stored {} matches in database", count);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Players:  {}", stats.player_count);
        println!("  Matches:  {}", stats.match_count);
        println!("  Rated:    {}", stats.rated_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_match, stats.latest_match) {
            println!("  Range:    {} to {}", earliest, latest);
        }

        Ok(())
    }

    /// Run the pipeline over every stored match
    fn build_rows(config: &Config, db: &Database) -> Result<(FeaturePipeline, Vec<FeatureRow>)> {
        let matches = db.get_all_matches()?;
        if matches.is_empty() {
            return Err(TennisError::NoData(
                "No matches in database. Run 'tennis data import <dir>' first.".to_string(),
            ));
        }

        let stream = MatchStream::new(matches)?;
        let mut pipeline = FeaturePipeline::new(config)?;
        let rows = pipeline.run(&stream)?;
        Ok((pipeline, rows))
    }

    pub fn features(config: &Config, output: Option<String>, match_stats: bool) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let (_, rows) = build_rows(config, &db)?;

        let path = output.unwrap_or_else(|| config.data.features_path.clone());
        let include = match_stats || config.pipeline.include_match_stats;
        let count = write_features_file(&path, &rows, include)?;

        let p1_wins = rows.iter().filter(|r| r.target == 1).count();
        println!("Wrote {} feature rows to {}", count, path);
        println!(
            "  player1 won {:.1}% of rows",
            p1_wins as f64 / rows.len() as f64 * 100.0
        );

        Ok(())
    }

    pub fn ratings(config: &Config, top: usize, surface: Option<String>) -> Result<()> {
        let surface = surface.map(|s| s.parse::<Surface>()).transpose()?;

        let db = Database::open(&config.data.database_path)?;
        let (pipeline, _) = build_rows(config, &db)?;
        db.save_ratings(pipeline.elo())?;

        let entries = db.top_ratings(top, surface)?;
        let label = surface.map(|s| s.as_str()).unwrap_or("Overall");

        println!("Top {} Players ({})", entries.len(), label);
        println!("───────────────────────────────────────────────");
        for (i, entry) in entries.iter().enumerate() {
            println!(
                "{:>3}. {:<28} {:>7.1}  (overall {:.1})",
                i + 1,
                entry.name,
                entry.ranked_by,
                entry.overall
            );
        }

        Ok(())
    }

    pub fn evaluate(config: &Config, train_ratio: Option<f64>) -> Result<()> {
        let ratio = train_ratio.unwrap_or(config.evaluation.train_ratio);
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(TennisError::Config(format!(
                "train ratio must be within (0, 1), got {}",
                ratio
            )));
        }

        let db = Database::open(&config.data.database_path)?;
        let (_, rows) = build_rows(config, &db)?;
        let report = evaluate_baselines(&rows, ratio)?;

        println!("Baseline Evaluation");
        println!("───────────────────────────────");
        println!("  Train rows:  {}", report.train_size);
        println!("  Test rows:   {}", report.test_size);
        if let Some(start) = report.test_start {
            println!("  Test from:   {}", start);
        }
        println!("  P1 win rate: {:.1}%", report.test_target_rate * 100.0);
        println!();
        for (baseline, metrics) in &report.results {
            println!("  {:<12} {}", baseline.name(), metrics);
        }

        Ok(())
    }
}
