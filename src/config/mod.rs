//! Configuration types for the field measurement pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while reading or writing a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the cleaner treats rows whose critical fields are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningMode {
    /// Unparseable values become missing and the row is kept.
    #[default]
    Permissive,
    /// Rows missing any critical field are dropped.
    Strict,
}

/// Layout of the raw calendar-date field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateLayout {
    /// `YYYYMMDD`
    #[default]
    Compact,
    /// `YYYY-MM-DD`
    Dashed,
}

impl DateLayout {
    /// chrono format string for this layout.
    pub fn format(self) -> &'static str {
        match self {
            DateLayout::Compact => "%Y%m%d",
            DateLayout::Dashed => "%Y-%m-%d",
        }
    }
}

/// Which quality flags mark a PAI reading as bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagRule {
    /// Only the configured error sentinel.
    Sentinel,
    /// Any non-empty quality flag.
    #[default]
    AnyFlag,
}

/// Edge handling for the centered rolling mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Positions without a full window of values are missing.
    #[default]
    Pad,
    /// Positions average whatever observations the truncated window holds.
    Partial,
}

/// Input file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_pai_path")]
    pub pai_path: PathBuf,

    #[serde(default = "default_soil_path")]
    pub soil_path: PathBuf,

    #[serde(default = "default_locations_path")]
    pub locations_path: PathBuf,

    /// Field delimiter for the text files
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_pai_path() -> PathBuf {
    PathBuf::from("SENTHYMED_MEDOAK_canopy_plant_area_index_data.txt")
}

fn default_soil_path() -> PathBuf {
    PathBuf::from("SENTHYMED_MEDOAK_soil_moisture_data.txt")
}

fn default_locations_path() -> PathBuf {
    PathBuf::from("SENTHYMED_MEDOAK_soil_moisture_coord_P.shp")
}

fn default_delimiter() -> char {
    '\t'
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pai_path: default_pai_path(),
            soil_path: default_soil_path(),
            locations_path: default_locations_path(),
            delimiter: default_delimiter(),
        }
    }
}

impl InputConfig {
    /// Delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .map_err(|_| ConfigError::Invalid(format!("delimiter {:?} is not ASCII", self.delimiter)))
    }
}

/// Column names of the input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_site")]
    pub site: String,

    #[serde(default = "default_site_plot")]
    pub site_plot: String,

    #[serde(default = "default_location_id")]
    pub location_id: String,

    #[serde(default = "default_date")]
    pub date: String,

    #[serde(default = "default_time")]
    pub time: String,

    #[serde(default = "default_pai")]
    pub pai: String,

    #[serde(default = "default_quality")]
    pub quality: String,

    #[serde(default = "default_moisture")]
    pub moisture: String,

    #[serde(default = "default_temperature")]
    pub temperature: String,

    /// Value of the quality column that marks a bad reading
    #[serde(default = "default_error_sentinel")]
    pub error_sentinel: String,
}

fn default_site() -> String {
    "SITE".to_string()
}

fn default_site_plot() -> String {
    "SITE_PLOT".to_string()
}

fn default_location_id() -> String {
    "ID_LOC".to_string()
}

fn default_date() -> String {
    "MEAS_DATE".to_string()
}

fn default_time() -> String {
    "MEAS_TIME".to_string()
}

fn default_pai() -> String {
    "PAI".to_string()
}

fn default_quality() -> String {
    "BAD_READINGS".to_string()
}

fn default_moisture() -> String {
    "Volumetric soil moisture".to_string()
}

fn default_temperature() -> String {
    "Soil temperature".to_string()
}

fn default_error_sentinel() -> String {
    "ERROR".to_string()
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            site_plot: default_site_plot(),
            location_id: default_location_id(),
            date: default_date(),
            time: default_time(),
            pai: default_pai(),
            quality: default_quality(),
            moisture: default_moisture(),
            temperature: default_temperature(),
            error_sentinel: default_error_sentinel(),
        }
    }
}

/// Cleaning and parsing behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningConfig {
    #[serde(default)]
    pub mode: CleaningMode,

    #[serde(default)]
    pub date_layout: DateLayout,

    /// Flag rule of the monthly PAI analysis; the other runs drop the sentinel only
    #[serde(default)]
    pub pai_flag_rule: FlagRule,
}

/// Parameters of the aggregation and risk stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Width of the centered rolling window, in observations
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,

    #[serde(default)]
    pub edge_policy: EdgePolicy,

    /// Mean moisture at or below which the combined risk counts as dry
    #[serde(default = "default_moisture_threshold")]
    pub moisture_low_risk_threshold: f64,

    #[serde(default = "default_pai_low_quantile")]
    pub pai_low_quantile: f64,

    #[serde(default = "default_pai_high_quantile")]
    pub pai_high_quantile: f64,

    #[serde(default = "default_moisture_low_quantile")]
    pub moisture_low_quantile: f64,

    #[serde(default = "default_moisture_high_quantile")]
    pub moisture_high_quantile: f64,

    /// UTM zone of the location geometry (EPSG:32633 is zone 33 north)
    #[serde(default = "default_utm_zone")]
    pub utm_zone: u8,

    #[serde(default = "default_northern")]
    pub northern_hemisphere: bool,
}

fn default_rolling_window() -> usize {
    7
}

fn default_moisture_threshold() -> f64 {
    5.0
}

fn default_pai_low_quantile() -> f64 {
    0.25
}

fn default_pai_high_quantile() -> f64 {
    0.75
}

fn default_moisture_low_quantile() -> f64 {
    0.1
}

fn default_moisture_high_quantile() -> f64 {
    0.9
}

fn default_utm_zone() -> u8 {
    33
}

fn default_northern() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rolling_window: default_rolling_window(),
            edge_policy: EdgePolicy::default(),
            moisture_low_risk_threshold: default_moisture_threshold(),
            pai_low_quantile: default_pai_low_quantile(),
            pai_high_quantile: default_pai_high_quantile(),
            moisture_low_quantile: default_moisture_low_quantile(),
            moisture_high_quantile: default_moisture_high_quantile(),
            utm_zone: default_utm_zone(),
            northern_hemisphere: default_northern(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub inputs: InputConfig,

    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub cleaning: CleaningConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.inputs.delimiter_byte()?;
        if self.analysis.rolling_window == 0 || self.analysis.rolling_window % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "rolling_window must be odd and positive, got {}",
                self.analysis.rolling_window
            )));
        }
        let quantiles = [
            self.analysis.pai_low_quantile,
            self.analysis.pai_high_quantile,
            self.analysis.moisture_low_quantile,
            self.analysis.moisture_high_quantile,
        ];
        if quantiles.iter().any(|q| !(0.0..=1.0).contains(q)) {
            return Err(ConfigError::Invalid("quantiles must lie in [0, 1]".to_string()));
        }
        if !(1..=60).contains(&self.analysis.utm_zone) {
            return Err(ConfigError::Invalid(format!(
                "utm_zone must be 1..=60, got {}",
                self.analysis.utm_zone
            )));
        }
        Ok(())
    }
}
