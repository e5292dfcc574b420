//! Data processing stages.

pub mod aggregation;
pub mod cleaning;
pub mod joining;
pub mod risk;

// Re-export key types for convenience
pub use aggregation::{group_mean, resample_month_end, rolling_mean, Bucket, QuantileThresholds, Summary};
pub use cleaning::{clean_pai, clean_soil, coerce_decimal, drop_flagged, CleanReport, FlagFilter, SoilField};
pub use joining::{join_on_location, pair_by_period, JoinOutcome, PairOutcome};
pub use risk::{classify_fire_risk, classify_pai, risk_distribution, FireRisk, PaiRiskLevel};
