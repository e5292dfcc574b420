//! Spatially joined soil moisture analysis.

use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::{AnalysisConfig, PipelineConfig};
use crate::core::geo::Crs;
use crate::core::loaders;
use crate::core::records::{LocationPoint, SoilRecord};
use crate::core::temporal::{self, PeriodKind, Timed};
use crate::processors::aggregation::{self, Bucket, Summary};
use crate::processors::cleaning::{CleanReport, SoilField};
use crate::processors::joining::{self, PairedValue, SpatialSoilRecord};
use super::fmt_opt;

/// Geographic extent of the joined locations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Results of the spatial soil analysis.
#[derive(Debug, Clone)]
pub struct SoilReport {
    pub cleaning: CleanReport,
    pub unmatched_points: usize,
    pub unmatched_records: usize,
    pub records: Vec<SpatialSoilRecord>,
    pub summary: Summary,
    /// Mean moisture per whole day since the first observation.
    pub mean_by_day: Vec<Bucket<i64>>,
    /// Plots with a reading above the upper moisture quantile, first-seen order.
    pub high_moisture_plots: Vec<String>,
    /// Plots with a reading below the lower moisture quantile, first-seen order.
    pub low_moisture_plots: Vec<String>,
    /// Mean moisture per site plot.
    pub by_location: Vec<Bucket<String>>,
    /// Daily mean moisture (left) and temperature (right).
    pub daily: Vec<PairedValue>,
    pub extent: Option<Extent>,
}

/// Distinct plots, in order of first appearance, of records matching `pred`.
fn plots_where<F>(records: &[SpatialSoilRecord], pred: F) -> Vec<String>
where
    F: Fn(f64) -> bool,
{
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.record.moisture.map_or(false, &pred))
        .filter(|r| seen.insert(r.record.site_plot.clone()))
        .map(|r| r.record.site_plot.clone())
        .collect()
}

fn extent(records: &[SpatialSoilRecord]) -> Option<Extent> {
    records.iter().map(|r| r.display).fold(None, |acc, c| {
        Some(match acc {
            None => Extent {
                min_lon: c.x,
                min_lat: c.y,
                max_lon: c.x,
                max_lat: c.y,
            },
            Some(e) => Extent {
                min_lon: e.min_lon.min(c.x),
                min_lat: e.min_lat.min(c.y),
                max_lon: e.max_lon.max(c.x),
                max_lat: e.max_lat.max(c.y),
            },
        })
    })
}

/// Join stamped soil records to their locations and aggregate.
pub fn analyze(
    points: &[LocationPoint],
    records: Vec<Timed<SoilRecord>>,
    cleaning: CleanReport,
    analysis: &AnalysisConfig,
) -> SoilReport {
    let outcome = joining::join_on_location(points, records, |r: &Timed<SoilRecord>| {
        r.record.location_id.as_str()
    });
    if outcome.unmatched_records > 0 {
        warn!("{} soil readings have no matching location", outcome.unmatched_records);
    }

    let source = Crs::Utm {
        zone: analysis.utm_zone,
        north: analysis.northern_hemisphere,
    };
    let spatial = joining::to_spatial(outcome.joined, source);

    let moisture = aggregation::present(spatial.iter().map(|r| r.record.moisture));
    let summary = Summary::describe(&moisture);

    let mean_by_day = aggregation::group_mean(&spatial, |r| r.days_since_start, |r| r.record.moisture);

    let (high_moisture_plots, low_moisture_plots) = match (
        aggregation::quantile(&moisture, analysis.moisture_high_quantile),
        aggregation::quantile(&moisture, analysis.moisture_low_quantile),
    ) {
        (Some(high), Some(low)) => (
            plots_where(&spatial, |m| m > high),
            plots_where(&spatial, |m| m < low),
        ),
        _ => (Vec::new(), Vec::new()),
    };

    let by_location = aggregation::group_mean(&spatial, |r| r.record.site_plot.clone(), |r| r.record.moisture);

    // daily moisture vs temperature uses only rows carrying both
    let complete: Vec<&SpatialSoilRecord> = spatial
        .iter()
        .filter(|r| r.record.moisture.is_some() && r.record.temperature.is_some())
        .collect();
    let day = |r: &&SpatialSoilRecord| temporal::Period::of_timestamp(r.timestamp, PeriodKind::Day);
    let daily_moisture = aggregation::group_mean(&complete, day, |r| r.record.moisture);
    let daily_temperature = aggregation::group_mean(&complete, day, |r| r.record.temperature);
    let daily = joining::pair_by_period(&daily_moisture, &daily_temperature).pairs;

    SoilReport {
        cleaning,
        unmatched_points: outcome.unmatched_points,
        unmatched_records: outcome.unmatched_records,
        extent: extent(&spatial),
        records: spatial,
        summary,
        mean_by_day,
        high_moisture_plots,
        low_moisture_plots,
        by_location,
        daily,
    }
}

/// Load the location geometry and soil file, then analyze.
pub fn run(config: &PipelineConfig) -> Result<SoilReport> {
    let delimiter = config.inputs.delimiter_byte()?;
    let locations_path = &config.inputs.locations_path;
    let points = loaders::load_locations(locations_path, delimiter, &config.columns.location_id)
        .with_context(|| format!("Failed to load locations from {}", locations_path.display()))?;
    info!("Loaded {} location points", points.len());

    let (records, cleaning) = super::load_clean_soil(config, &[SoilField::Moisture])?;
    let records = temporal::stamp_all(records, config.cleaning.date_layout)
        .context("Failed to parse soil measurement timestamps")?;

    Ok(analyze(&points, records, cleaning, &config.analysis))
}

impl fmt::Display for SoilReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cleaning: {}", self.cleaning)?;
        writeln!(
            f,
            "Joined {} readings ({} locations and {} readings unmatched)",
            self.records.len(),
            self.unmatched_points,
            self.unmatched_records
        )?;
        if let Some(e) = &self.extent {
            writeln!(
                f,
                "Extent ({}): lon {:.6}..{:.6}, lat {:.6}..{:.6}",
                Crs::Wgs84,
                e.min_lon,
                e.max_lon,
                e.min_lat,
                e.max_lat
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Descriptive Statistics for Soil Moisture:")?;
        write!(f, "{}", self.summary)?;
        writeln!(f)?;

        writeln!(f, "Mean Soil Moisture by Day:")?;
        for bucket in &self.mean_by_day {
            writeln!(f, "{:<8}{:>14.6}", bucket.key, bucket.mean)?;
        }
        writeln!(f)?;

        writeln!(f, "Areas with High Moisture: {:?}", self.high_moisture_plots)?;
        writeln!(f, "Areas with Low Moisture: {:?}", self.low_moisture_plots)?;
        writeln!(f)?;

        writeln!(f, "Volumetric Soil Moisture by Location:")?;
        for bucket in &self.by_location {
            writeln!(f, "{:<12}{:>14.6}  (n={})", bucket.key, bucket.mean, bucket.count)?;
        }
        writeln!(f)?;

        writeln!(f, "Daily Average Soil Moisture and Temperature:")?;
        for pair in &self.daily {
            writeln!(
                f,
                "{:<12}{:>14}{:>14}",
                pair.period.to_string(),
                fmt_opt(Some(pair.left)),
                fmt_opt(Some(pair.right))
            )?;
        }
        Ok(())
    }
}
