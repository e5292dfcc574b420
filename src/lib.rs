//! Data-preparation pipeline for canopy PAI and soil moisture field measurements.
//!
//! This crate provides tools for:
//! - Loading tab-delimited measurement files and point location layers
//! - Cleaning quality-flagged rows and decimal-comma values
//! - Parsing measurement timestamps into day and month periods
//! - Joining readings to locations and aligning daily series
//! - Grouped, rolling and month-end aggregates with quantile summaries
//! - PAI-only and combined PAI/moisture fire-risk classification
//!
//! # Example
//!
//! ```no_run
//! use canopy_pipeline::{analysis::fire_risk, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let report = fire_risk::run(&config).unwrap();
//! println!("{}", report);
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{AnalysisConfig, CleaningConfig, ColumnConfig, InputConfig, PipelineConfig};
pub use core::records::{LocationPoint, PaiRecord, SoilRecord};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
