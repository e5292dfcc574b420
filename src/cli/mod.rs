//! Command-line interface for the canopy pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::analysis::{fire_risk, pai, soil, trends};
use crate::config::{CleaningMode, EdgePolicy};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "canopy-pipeline")]
#[command(about = "Canopy PAI and soil moisture analysis pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Drop rows missing a critical field instead of keeping them
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monthly mean PAI per plot and plot ranking
    Pai {
        /// PAI measurement file
        #[arg(long)]
        pai: Option<PathBuf>,
    },

    /// Rolling-mean trends of soil moisture and PAI
    Trends {
        /// PAI measurement file
        #[arg(long)]
        pai: Option<PathBuf>,
        /// Soil moisture measurement file
        #[arg(long)]
        soil: Option<PathBuf>,
        /// Rolling window length in observations (odd)
        #[arg(short, long)]
        window: Option<usize>,
        /// Average whatever the window holds at the series edges
        #[arg(long)]
        partial_edges: bool,
    },

    /// Join soil readings to their locations and aggregate moisture
    Soil {
        /// Soil moisture measurement file
        #[arg(long)]
        soil: Option<PathBuf>,
        /// Location points (.shp or delimited ID_LOC/X/Y text)
        #[arg(long)]
        locations: Option<PathBuf>,
        /// UTM zone of the location coordinates
        #[arg(long)]
        utm_zone: Option<u8>,
    },

    /// Classify fire risk from PAI and soil moisture
    FireRisk {
        /// PAI measurement file
        #[arg(long)]
        pai: Option<PathBuf>,
        /// Soil moisture measurement file
        #[arg(long)]
        soil: Option<PathBuf>,
        /// Mean moisture at or below which the soil counts as dry
        #[arg(long)]
        moisture_threshold: Option<f64>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn fail(what: &str, e: anyhow::Error) -> ! {
    error!("{} failed: {:#}", what, e);
    std::process::exit(1);
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    if cli.strict {
        config.cleaning.mode = CleaningMode::Strict;
    }

    // Dispatch to subcommands
    match cli.command {
        Commands::Pai { pai } => {
            override_path(&mut config.inputs.pai_path, pai);
            validate_or_exit(&config);
            cmd_pai(&config);
        }
        Commands::Trends { pai, soil, window, partial_edges } => {
            override_path(&mut config.inputs.pai_path, pai);
            override_path(&mut config.inputs.soil_path, soil);
            if let Some(window) = window {
                config.analysis.rolling_window = window;
            }
            if partial_edges {
                config.analysis.edge_policy = EdgePolicy::Partial;
            }
            validate_or_exit(&config);
            cmd_trends(&config);
        }
        Commands::Soil { soil, locations, utm_zone } => {
            override_path(&mut config.inputs.soil_path, soil);
            override_path(&mut config.inputs.locations_path, locations);
            if let Some(zone) = utm_zone {
                config.analysis.utm_zone = zone;
            }
            validate_or_exit(&config);
            cmd_soil(&config);
        }
        Commands::FireRisk { pai, soil, moisture_threshold } => {
            override_path(&mut config.inputs.pai_path, pai);
            override_path(&mut config.inputs.soil_path, soil);
            if let Some(threshold) = moisture_threshold {
                config.analysis.moisture_low_risk_threshold = threshold;
            }
            validate_or_exit(&config);
            cmd_fire_risk(&config);
        }
    }
}

fn override_path(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(path) = value {
        *target = path;
    }
}

fn validate_or_exit(config: &PipelineConfig) {
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
}

fn cmd_pai(config: &PipelineConfig) {
    let start = Instant::now();

    println!("Analyzing canopy PAI...");
    println!("Input: {}", config.inputs.pai_path.display());

    let spinner = create_spinner("Loading and aggregating PAI readings...");
    let report = match pai::run(config) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_and_clear();
            fail("PAI analysis", e);
        }
    };
    spinner.finish_and_clear();

    println!("{}", report);

    print_summary(
        "PAI Analysis Complete",
        &[
            ("Input file", config.inputs.pai_path.display().to_string()),
            ("Rows kept", report.cleaning.rows_out.to_string()),
            ("Flagged rows dropped", report.cleaning.flagged_dropped.to_string()),
            ("Plots", report.plot_averages.len().to_string()),
            ("Months", report.month_end.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_trends(config: &PipelineConfig) {
    let start = Instant::now();

    println!("Computing rolling trends...");
    println!("PAI input: {}", config.inputs.pai_path.display());
    println!("Soil input: {}", config.inputs.soil_path.display());
    println!("Window: {}", config.analysis.rolling_window);

    let spinner = create_spinner("Loading and smoothing series...");
    let report = match trends::run(config) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_and_clear();
            fail("Trend analysis", e);
        }
    };
    spinner.finish_and_clear();

    println!("{}", report);

    print_summary(
        "Trend Analysis Complete",
        &[
            ("Moisture readings", report.moisture.values.len().to_string()),
            ("PAI readings", report.pai.values.len().to_string()),
            ("Window", report.moisture.window.to_string()),
            ("Edge policy", format!("{:?}", report.moisture.policy)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_soil(config: &PipelineConfig) {
    let start = Instant::now();

    println!("Analyzing soil moisture by location...");
    println!("Soil input: {}", config.inputs.soil_path.display());
    println!("Locations: {}", config.inputs.locations_path.display());

    let spinner = create_spinner("Loading locations and joining readings...");
    let report = match soil::run(config) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_and_clear();
            fail("Soil analysis", e);
        }
    };
    spinner.finish_and_clear();

    println!("{}", report);

    print_summary(
        "Soil Analysis Complete",
        &[
            ("Joined readings", report.records.len().to_string()),
            ("Unmatched locations", report.unmatched_points.to_string()),
            ("Unmatched readings", report.unmatched_records.to_string()),
            ("High moisture plots", report.high_moisture_plots.len().to_string()),
            ("Low moisture plots", report.low_moisture_plots.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_fire_risk(config: &PipelineConfig) {
    let start = Instant::now();

    println!("Assessing fire risk...");
    println!("PAI input: {}", config.inputs.pai_path.display());
    println!("Soil input: {}", config.inputs.soil_path.display());

    let spinner = create_spinner("Loading readings and classifying risk...");
    let report = match fire_risk::run(config) {
        Ok(r) => r,
        Err(e) => {
            spinner.finish_and_clear();
            fail("Fire risk assessment", e);
        }
    };
    spinner.finish_and_clear();

    println!("{}", report);

    let dominant = report
        .fire_distribution
        .first()
        .map_or_else(|| "n/a".to_string(), |share| share.label.to_string());

    print_summary(
        "Fire Risk Assessment Complete",
        &[
            ("Shared days", report.daily.pairs.len().to_string()),
            ("PAI records", report.pai_levels.len().to_string()),
            ("Unclassified PAI", report.unclassified().to_string()),
            ("Dominant fire risk", dominant),
            (
                "Moisture threshold",
                config.analysis.moisture_low_risk_threshold.to_string(),
            ),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}
