//! Rolling-mean trends of soil moisture and PAI over time.

use std::fmt;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::config::{AnalysisConfig, EdgePolicy, FlagRule, PipelineConfig};
use crate::core::temporal::{self, Timed};
use crate::processors::aggregation::{self, Summary};
use crate::processors::cleaning::SoilField;
use super::{fmt_opt, load_clean_pai, load_clean_soil};

/// One measured series with its centered rolling mean.
#[derive(Debug, Clone)]
pub struct SeriesTrend {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<Option<f64>>,
    pub rolling: Vec<Option<f64>>,
    pub window: usize,
    pub policy: EdgePolicy,
    pub summary: Summary,
}

impl SeriesTrend {
    /// Build a trend from records put in time order.
    ///
    /// The sort is stable, so readings sharing a timestamp keep file order.
    pub fn from_records<R, F>(name: &str, records: &[Timed<R>], value_fn: F, analysis: &AnalysisConfig) -> Self
    where
        F: Fn(&R) -> Option<f64>,
    {
        let mut ordered: Vec<&Timed<R>> = records.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);

        let dates: Vec<NaiveDate> = ordered.iter().map(|r| r.timestamp.date()).collect();
        let values: Vec<Option<f64>> = ordered.iter().map(|r| value_fn(&r.record)).collect();
        let rolling = aggregation::rolling_mean(&values, analysis.rolling_window, analysis.edge_policy);
        let summary = Summary::describe(&aggregation::present(values.iter().copied()));

        Self {
            name: name.to_string(),
            dates,
            values,
            rolling,
            window: analysis.rolling_window,
            policy: analysis.edge_policy,
            summary,
        }
    }

    /// Number of positions with a defined rolling mean.
    pub fn defined_rolling(&self) -> usize {
        self.rolling.iter().flatten().count()
    }
}

/// Moisture and PAI trends.
#[derive(Debug, Clone)]
pub struct TrendsReport {
    pub moisture: SeriesTrend,
    pub pai: SeriesTrend,
}

/// Load both files and compute the rolling trends.
///
/// Only the measurement date is used for the time axis.
pub fn run(config: &PipelineConfig) -> Result<TrendsReport> {
    let layout = config.cleaning.date_layout;

    let (soil, _) = load_clean_soil(config, &[SoilField::Moisture])?;
    let soil = temporal::stamp_dates(soil, layout).context("Failed to parse soil measurement dates")?;

    let (pai, _) = load_clean_pai(config, FlagRule::Sentinel)?;
    let pai = temporal::stamp_dates(pai, layout).context("Failed to parse PAI measurement dates")?;

    Ok(TrendsReport {
        moisture: SeriesTrend::from_records("Soil Moisture", &soil, |r| r.moisture, &config.analysis),
        pai: SeriesTrend::from_records("PAI", &pai, |r| r.pai, &config.analysis),
    })
}

impl fmt::Display for SeriesTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} Descriptive Statistics:", self.name)?;
        write!(f, "{}", self.summary)?;
        writeln!(
            f,
            "{}-observation rolling mean ({:?} edges): {} of {} positions defined",
            self.window,
            self.policy,
            self.defined_rolling(),
            self.rolling.len()
        )?;
        for ((date, value), rolled) in self.dates.iter().zip(&self.values).zip(&self.rolling) {
            writeln!(
                f,
                "{:<12}{:>14}{:>14}",
                date.format("%Y-%m-%d").to_string(),
                fmt_opt(*value),
                fmt_opt(*rolled)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for TrendsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.moisture)?;
        write!(f, "{}", self.pai)
    }
}
