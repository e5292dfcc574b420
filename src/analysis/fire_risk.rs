//! Fire risk from canopy density and soil moisture.

use std::fmt;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::{AnalysisConfig, FlagRule, PipelineConfig};
use crate::core::records::{PaiRecord, SoilRecord};
use crate::core::temporal::{self, PeriodKind, Timed};
use crate::processors::aggregation::{self, Bucket, QuantileThresholds};
use crate::processors::cleaning::{self, SoilField};
use crate::processors::joining::{self, PairOutcome};
use crate::processors::risk::{self, FireRisk, LabelShare, PaiRiskLevel};
use super::{load_clean_pai, load_clean_soil};

/// Results of the fire-risk run.
#[derive(Debug, Clone)]
pub struct FireRiskReport {
    /// Daily mean PAI (left) against daily mean moisture (right).
    pub daily: PairOutcome,
    pub thresholds: Option<QuantileThresholds>,
    /// PAI risk bin per PAI record, in file order.
    pub pai_levels: Vec<Option<PaiRiskLevel>>,
    pub pai_distribution: Vec<LabelShare<PaiRiskLevel>>,
    /// Dataset-wide mean moisture applied to every plot.
    pub mean_moisture: Option<f64>,
    pub fire_risk: Vec<FireRisk>,
    pub fire_distribution: Vec<LabelShare<FireRisk>>,
    pub pai_by_day_of_month: Vec<Bucket<u32>>,
}

impl FireRiskReport {
    /// PAI records with a value outside every risk bin.
    pub fn unclassified(&self) -> usize {
        self.pai_levels.iter().filter(|l| l.is_none()).count()
    }
}

/// Classify stamped PAI records against the soil moisture readings.
pub fn assess(pai: &[Timed<PaiRecord>], soil: &[Timed<SoilRecord>], analysis: &AnalysisConfig) -> FireRiskReport {
    let daily_pai = aggregation::group_mean(pai, |r| r.period(PeriodKind::Day), |r| r.record.pai);
    let daily_moisture = aggregation::group_mean(soil, |r| r.period(PeriodKind::Day), |r| r.record.moisture);
    let daily = joining::pair_by_period(&daily_pai, &daily_moisture);

    let values = aggregation::present(pai.iter().map(|r| r.record.pai));
    let thresholds = QuantileThresholds::from_values(&values, analysis.pai_low_quantile, analysis.pai_high_quantile);

    let pai_levels: Vec<Option<PaiRiskLevel>> = pai
        .iter()
        .map(|r| r.record.pai.zip(thresholds).and_then(|(v, t)| risk::classify_pai(v, &t)))
        .collect();
    let classified: Vec<PaiRiskLevel> = pai_levels.iter().flatten().copied().collect();
    let pai_distribution = risk::risk_distribution(&classified);

    let moisture = aggregation::present(soil.iter().map(|r| r.record.moisture));
    let mean_moisture = aggregation::mean(&moisture);

    let fire_risk: Vec<FireRisk> = match (thresholds, mean_moisture) {
        (Some(t), Some(m)) => values
            .iter()
            .map(|&v| risk::classify_fire_risk(v, m, t.high, analysis.moisture_low_risk_threshold))
            .collect(),
        (_, None) => {
            warn!("No soil moisture values available, skipping combined fire risk");
            Vec::new()
        }
        (None, _) => Vec::new(),
    };
    let fire_distribution = risk::risk_distribution(&fire_risk);

    FireRiskReport {
        pai_by_day_of_month: aggregation::mean_by_day_of_month(&daily_pai),
        daily,
        thresholds,
        pai_levels,
        pai_distribution,
        mean_moisture,
        fire_risk,
        fire_distribution,
    }
}

/// Load both files and assess fire risk.
pub fn run(config: &PipelineConfig) -> Result<FireRiskReport> {
    let layout = config.cleaning.date_layout;

    let (pai, _) = load_clean_pai(config, FlagRule::Sentinel)?;
    let pai = temporal::stamp_all(pai, layout).context("Failed to parse PAI measurement timestamps")?;

    let (soil, _) = load_clean_soil(config, &[SoilField::Moisture])?;
    let (soil, dropped) = cleaning::drop_missing(soil, &[SoilField::Moisture]);
    if dropped > 0 {
        info!("{} soil readings without moisture left out of the daily means", dropped);
    }
    let soil = temporal::stamp_all(soil, layout).context("Failed to parse soil measurement timestamps")?;

    Ok(assess(&pai, &soil, &config.analysis))
}

fn write_shares<L: fmt::Display>(f: &mut fmt::Formatter<'_>, shares: &[LabelShare<L>]) -> fmt::Result {
    for share in shares {
        writeln!(f, "{:<16}{:>12.6}  (n={})", share.label.to_string(), share.percent, share.count)?;
    }
    Ok(())
}

impl fmt::Display for FireRiskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Days with both PAI and Soil Moisture: {} ({} PAI-only, {} moisture-only)",
            self.daily.pairs.len(),
            self.daily.left_only,
            self.daily.right_only
        )?;
        for pair in &self.daily.pairs {
            writeln!(f, "{:<12}{:>12.6}{:>14.6}", pair.period.to_string(), pair.left, pair.right)?;
        }
        writeln!(f)?;

        match &self.thresholds {
            Some(t) => writeln!(
                f,
                "PAI thresholds: low {:.6}, median {:.6}, high {:.6}, max {:.6}",
                t.low, t.median, t.high, t.max
            )?,
            None => writeln!(f, "PAI thresholds: no PAI values")?,
        }
        writeln!(f, "Distribution of PAI Risk Levels (%):")?;
        write_shares(f, &self.pai_distribution)?;
        if self.unclassified() > 0 {
            writeln!(f, "{} PAI records outside every risk bin", self.unclassified())?;
        }
        writeln!(f)?;

        match self.mean_moisture {
            Some(m) => writeln!(f, "Mean Volumetric Soil Moisture: {:.6}", m)?,
            None => writeln!(f, "Mean Volumetric Soil Moisture: NaN")?,
        }
        writeln!(f, "Distribution of Fire Risk Levels (%):")?;
        write_shares(f, &self.fire_distribution)?;
        writeln!(f)?;

        writeln!(f, "Average PAI changes per date:")?;
        for bucket in &self.pai_by_day_of_month {
            writeln!(f, "{:<6}{:>12.6}", bucket.key, bucket.mean)?;
        }
        Ok(())
    }
}
