//! Grouped means, rolling windows, month-end resampling and quantiles.
//!
//! All functions take plain slices of records plus key/value accessors and
//! return ordered vectors. Missing values (`None`) never contribute to a
//! mean or a quantile, and a group with no value is never filled with zero.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::config::EdgePolicy;
use crate::core::temporal::{self, Period};

/// Mean of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<K> {
    pub key: K,
    pub mean: f64,
    /// Number of values that contributed.
    pub count: usize,
}

/// Present values of an optional sequence, in order.
pub fn present<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().flatten().collect()
}

/// Arithmetic mean, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean value per distinct key, ordered by key.
///
/// Keys only ever appear if at least one of their items has a value.
pub fn group_mean<T, K, FK, FV>(items: &[T], key_fn: FK, value_fn: FV) -> Vec<Bucket<K>>
where
    K: Ord,
    FK: Fn(&T) -> K,
    FV: Fn(&T) -> Option<f64>,
{
    let mut sums: BTreeMap<K, (f64, usize)> = BTreeMap::new();

    for item in items {
        if let Some(value) = value_fn(item) {
            let entry = sums.entry(key_fn(item)).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(key, (sum, count))| Bucket {
            key,
            mean: sum / count as f64,
            count,
        })
        .collect()
}

/// Centered moving average over a time-ordered sequence.
///
/// The output has the same length as the input. With [`EdgePolicy::Pad`]
/// a position is `None` unless its full window exists and holds no missing
/// value. With [`EdgePolicy::Partial`] each position averages the values
/// present in its (possibly truncated) window.
pub fn rolling_mean(values: &[Option<f64>], window: usize, policy: EdgePolicy) -> Vec<Option<f64>> {
    let n = values.len();
    if window == 0 {
        return vec![None; n];
    }
    let half = window / 2;

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let slice = &values[lo..hi];

            match policy {
                EdgePolicy::Pad => {
                    if i < half || i + half >= n {
                        return None;
                    }
                    let full: Option<Vec<f64>> = slice.iter().copied().collect();
                    full.and_then(|vals| mean(&vals))
                }
                EdgePolicy::Partial => mean(&present(slice.iter().copied())),
            }
        })
        .collect()
}

/// One month-end bucket of a per-group resampling.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyValue<G> {
    pub group: G,
    /// Last day of the month this value covers.
    pub month_end: NaiveDate,
    /// Mean over the month, `None` for a month without values.
    pub mean: Option<f64>,
}

/// Resample each group to calendar months, labelled by month end.
///
/// Every month from the group's first to its last observation gets an entry,
/// computed only from observations dated inside that month.
pub fn resample_month_end<T, G, FG, FD, FV>(
    items: &[T],
    group_fn: FG,
    date_fn: FD,
    value_fn: FV,
) -> temporal::Result<Vec<MonthlyValue<G>>>
where
    G: Ord + Clone,
    FG: Fn(&T) -> G,
    FD: Fn(&T) -> NaiveDate,
    FV: Fn(&T) -> Option<f64>,
{
    let mut groups: BTreeMap<G, BTreeMap<(i32, u32), (f64, usize)>> = BTreeMap::new();

    for item in items {
        let date = date_fn(item);
        let months = groups.entry(group_fn(item)).or_default();
        let entry = months.entry((date.year(), date.month())).or_insert((0.0, 0));
        if let Some(value) = value_fn(item) {
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let mut out = Vec::new();
    for (group, months) in groups {
        let (Some(&first), Some(&last)) = (months.keys().next(), months.keys().next_back()) else {
            continue;
        };

        let mut current = first;
        loop {
            let mean = months
                .get(&current)
                .filter(|(_, count)| *count > 0)
                .map(|(sum, count)| sum / *count as f64);

            out.push(MonthlyValue {
                group: group.clone(),
                month_end: temporal::month_end(current.0, current.1)?,
                mean,
            });

            if current == last {
                break;
            }
            current = temporal::next_month(current.0, current.1);
        }
    }

    Ok(out)
}

/// Quantile by linear interpolation between order statistics.
///
/// `q` is clamped to `[0, 1]`; returns `None` for an empty input.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(quantile_sorted(&sorted, q))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Data-derived cut points, recomputed on every run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileThresholds {
    /// Lower cut point (25th percentile by default)
    pub low: f64,
    pub median: f64,
    /// Upper cut point (75th percentile by default)
    pub high: f64,
    pub max: f64,
}

impl QuantileThresholds {
    /// Thresholds at the given lower and upper quantile levels.
    pub fn from_values(values: &[f64], low_q: f64, high_q: f64) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Some(Self {
            low: quantile_sorted(&sorted, low_q),
            median: quantile_sorted(&sorted, 0.5),
            high: quantile_sorted(&sorted, high_q),
            max: sorted[sorted.len() - 1],
        })
    }

    /// 25th / 50th / 75th percentiles and maximum.
    pub fn quartiles(values: &[f64]) -> Option<Self> {
        Self::from_values(values, 0.25, 0.75)
    }
}

/// Descriptive statistics of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 denominator)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl Summary {
    pub fn describe(values: &[f64]) -> Self {
        let count = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let avg = mean(values);
        let std = match (avg, count) {
            (Some(m), n) if n > 1 => {
                let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
                Some((ss / (n - 1) as f64).sqrt())
            }
            _ => None,
        };

        let q = |level: f64| (!sorted.is_empty()).then(|| quantile_sorted(&sorted, level));

        Self {
            count,
            mean: avg,
            std,
            min: sorted.first().copied(),
            q25: q(0.25),
            q50: q(0.5),
            q75: q(0.75),
            max: sorted.last().copied(),
        }
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| format!("{:.6}", v))
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("count", format!("{:.6}", self.count as f64)),
            ("mean", fmt_stat(self.mean)),
            ("std", fmt_stat(self.std)),
            ("min", fmt_stat(self.min)),
            ("25%", fmt_stat(self.q25)),
            ("50%", fmt_stat(self.q50)),
            ("75%", fmt_stat(self.q75)),
            ("max", fmt_stat(self.max)),
        ];
        for (name, value) in rows {
            writeln!(f, "{:<6}{:>16}", name, value)?;
        }
        Ok(())
    }
}

/// Collapse a daily series onto calendar day-of-month (1..=31).
pub fn mean_by_day_of_month(series: &[Bucket<Period>]) -> Vec<Bucket<u32>> {
    group_mean(series, |bucket| bucket.key.start().day(), |bucket| Some(bucket.mean))
}
