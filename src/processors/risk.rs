//! Fire-risk classification of canopy plots.
//!
//! Two independent three-level scales exist and must not be mixed:
//! [`PaiRiskLevel`] bins PAI alone by data-derived quantiles, while
//! [`FireRisk`] combines PAI with soil moisture through a fixed 2x2 table.

use std::collections::BTreeMap;
use std::fmt;

use super::aggregation::QuantileThresholds;

/// PAI-only risk bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PaiRiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for PaiRiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaiRiskLevel::Low => write!(f, "Low"),
            PaiRiskLevel::Medium => write!(f, "Medium"),
            PaiRiskLevel::High => write!(f, "High"),
        }
    }
}

/// Bin a PAI value into `(0, low] / (low, high] / (high, max]`.
///
/// Bins are closed on the right, so a value equal to a cut point falls in
/// the lower bin. Values at or below zero, above the maximum, or NaN are
/// outside every bin.
pub fn classify_pai(value: f64, thresholds: &QuantileThresholds) -> Option<PaiRiskLevel> {
    if !(value > 0.0 && value <= thresholds.max) {
        return None;
    }
    if value <= thresholds.low {
        Some(PaiRiskLevel::Low)
    } else if value <= thresholds.high {
        Some(PaiRiskLevel::Medium)
    } else {
        Some(PaiRiskLevel::High)
    }
}

/// Combined PAI and soil-moisture risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FireRisk {
    LowRisk,
    ModerateRisk,
    HighRisk,
}

impl fmt::Display for FireRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FireRisk::LowRisk => write!(f, "Low Risk"),
            FireRisk::ModerateRisk => write!(f, "Moderate Risk"),
            FireRisk::HighRisk => write!(f, "High Risk"),
        }
    }
}

/// Decision table indexed by `[dense canopy][dry soil]`.
const FIRE_RISK_TABLE: [[FireRisk; 2]; 2] = [
    // sparse canopy: wet soil, dry soil
    [FireRisk::LowRisk, FireRisk::ModerateRisk],
    // dense canopy: wet soil, dry soil
    [FireRisk::ModerateRisk, FireRisk::HighRisk],
];

/// Combine a PAI value and a moisture value into a [`FireRisk`].
///
/// The canopy counts as dense when `pai >= pai_threshold`, the soil as dry
/// when `moisture <= moisture_threshold`. Ties therefore land on the dense
/// and dry sides respectively.
pub fn classify_fire_risk(pai: f64, moisture: f64, pai_threshold: f64, moisture_threshold: f64) -> FireRisk {
    let dense = pai >= pai_threshold;
    let dry = moisture <= moisture_threshold;
    FIRE_RISK_TABLE[usize::from(dense)][usize::from(dry)]
}

/// Share of one label in a classified set.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelShare<L> {
    pub label: L,
    pub count: usize,
    /// Percentage of all labels, 0..=100
    pub percent: f64,
}

/// Percentage share of each label, most frequent first.
///
/// Ties keep the labels' natural order.
pub fn risk_distribution<L>(labels: &[L]) -> Vec<LabelShare<L>>
where
    L: Ord + Copy,
{
    let mut counts: BTreeMap<L, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(*label).or_insert(0) += 1;
    }

    let total = labels.len() as f64;
    let mut shares: Vec<LabelShare<L>> = counts
        .into_iter()
        .map(|(label, count)| LabelShare {
            label,
            count,
            percent: count as f64 / total * 100.0,
        })
        .collect();

    // stable sort keeps key order among equal counts
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(low: f64, high: f64, max: f64) -> QuantileThresholds {
        QuantileThresholds {
            low,
            median: (low + high) / 2.0,
            high,
            max,
        }
    }

    #[test]
    fn test_classify_pai_bins() {
        let t = thresholds(1.0, 2.0, 4.0);
        assert_eq!(classify_pai(0.5, &t), Some(PaiRiskLevel::Low));
        assert_eq!(classify_pai(1.5, &t), Some(PaiRiskLevel::Medium));
        assert_eq!(classify_pai(3.0, &t), Some(PaiRiskLevel::High));
    }

    #[test]
    fn test_classify_pai_cut_points_go_low() {
        let t = thresholds(1.0, 2.0, 4.0);
        assert_eq!(classify_pai(1.0, &t), Some(PaiRiskLevel::Low));
        assert_eq!(classify_pai(2.0, &t), Some(PaiRiskLevel::Medium));
        assert_eq!(classify_pai(4.0, &t), Some(PaiRiskLevel::High));
    }

    #[test]
    fn test_classify_pai_out_of_range() {
        let t = thresholds(1.0, 2.0, 4.0);
        assert_eq!(classify_pai(0.0, &t), None);
        assert_eq!(classify_pai(-1.0, &t), None);
        assert_eq!(classify_pai(4.1, &t), None);
        assert_eq!(classify_pai(f64::NAN, &t), None);
    }

    #[test]
    fn test_classify_pai_degenerate_thresholds() {
        let t = thresholds(2.0, 2.0, 2.0);
        assert_eq!(classify_pai(2.0, &t), Some(PaiRiskLevel::Low));
    }

    #[test]
    fn test_fire_risk_quadrants() {
        assert_eq!(classify_fire_risk(3.0, 4.0, 2.0, 5.0), FireRisk::HighRisk);
        assert_eq!(classify_fire_risk(1.0, 6.0, 2.0, 5.0), FireRisk::LowRisk);
        assert_eq!(classify_fire_risk(3.0, 6.0, 2.0, 5.0), FireRisk::ModerateRisk);
        assert_eq!(classify_fire_risk(1.0, 4.0, 2.0, 5.0), FireRisk::ModerateRisk);
    }

    #[test]
    fn test_fire_risk_ties() {
        // PAI tie counts as dense, moisture tie counts as dry
        assert_eq!(classify_fire_risk(2.0, 5.0, 2.0, 5.0), FireRisk::HighRisk);
        assert_eq!(classify_fire_risk(2.0, 5.1, 2.0, 5.0), FireRisk::ModerateRisk);
        assert_eq!(classify_fire_risk(1.9, 5.0, 2.0, 5.0), FireRisk::ModerateRisk);
    }

    #[test]
    fn test_fire_risk_covers_exactly_three_labels() {
        let mut seen = std::collections::BTreeSet::new();
        for pai in [0.5, 2.0, 3.5] {
            for moisture in [1.0, 5.0, 9.0] {
                seen.insert(classify_fire_risk(pai, moisture, 2.0, 5.0));
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_labels_display() {
        assert_eq!(FireRisk::ModerateRisk.to_string(), "Moderate Risk");
        assert_eq!(PaiRiskLevel::Medium.to_string(), "Medium");
    }

    #[test]
    fn test_risk_distribution() {
        let labels = vec![
            FireRisk::ModerateRisk,
            FireRisk::HighRisk,
            FireRisk::ModerateRisk,
            FireRisk::LowRisk,
        ];
        let shares = risk_distribution(&labels);
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].label, FireRisk::ModerateRisk);
        assert_eq!(shares[0].percent, 50.0);
        assert_eq!(shares[1].label, FireRisk::LowRisk);
        assert_eq!(shares[2].label, FireRisk::HighRisk);
        assert!(risk_distribution::<FireRisk>(&[]).is_empty());
    }
}
