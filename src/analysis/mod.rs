//! End-to-end analyses built from the pipeline stages.
//!
//! Each submodule loads its inputs, runs Loader → Cleaner → Temporal
//! Normalizer → Joiner → Aggregator → Risk Classifier in that order, and
//! returns a report that renders as plain text.
//!
//! Submodules:
//! - `pai` — per-plot monthly PAI and plot ranking
//! - `trends` — centered rolling means and descriptive statistics
//! - `soil` — location join, elapsed days and moisture extremes
//! - `fire_risk` — daily pairing and the two risk classifications

pub mod fire_risk;
pub mod pai;
pub mod soil;
pub mod trends;

use anyhow::{Context, Result};
use log::info;

use crate::config::{FlagRule, PipelineConfig};
use crate::core::loaders;
use crate::core::records::{PaiRecord, SoilRecord};
use crate::processors::cleaning::{self, CleanReport, FlagFilter, SoilField};

/// Load and clean the canopy PAI file named in the configuration.
///
/// `rule` picks which quality flags drop a row.
pub fn load_clean_pai(config: &PipelineConfig, rule: FlagRule) -> Result<(Vec<PaiRecord>, CleanReport)> {
    let path = &config.inputs.pai_path;
    let rows = loaders::load_pai_rows(path, config.inputs.delimiter_byte()?, &config.columns)
        .with_context(|| format!("Failed to load PAI data from {}", path.display()))?;

    let filter = FlagFilter::from_rule(rule, &config.columns.error_sentinel);
    let (records, report) = cleaning::clean_pai(rows, &filter, config.cleaning.mode);
    info!("PAI cleaning: {}", report);
    Ok((records, report))
}

/// Load and clean the soil moisture file named in the configuration.
pub fn load_clean_soil(
    config: &PipelineConfig,
    required: &[SoilField],
) -> Result<(Vec<SoilRecord>, CleanReport)> {
    let path = &config.inputs.soil_path;
    let rows = loaders::load_soil_rows(path, config.inputs.delimiter_byte()?, &config.columns)
        .with_context(|| format!("Failed to load soil moisture data from {}", path.display()))?;

    let (records, report) = cleaning::clean_soil(rows, config.cleaning.mode, required);
    info!("Soil cleaning: {}", report);
    Ok((records, report))
}

/// Format an optional statistic for report tables.
pub(crate) fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| format!("{:.6}", v))
}
