//! Joins between measurement tables.
//!
//! Two modes exist: an exact inner join on the location identifier, and an
//! inner alignment of two aggregated per-period series. Rows that find no
//! partner are dropped silently; only their counts are reported.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;
use log::debug;

use crate::core::geo::{Coordinate, Crs};
use crate::core::records::{LocationPoint, SoilRecord};
use crate::core::temporal::{Period, Timed};
use super::aggregation::Bucket;

/// A record matched with a location point.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined<R> {
    pub point: LocationPoint,
    pub record: R,
}

/// Result of a key join, with mismatch counts.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome<R> {
    pub joined: Vec<Joined<R>>,
    /// Points whose id matched no record.
    pub unmatched_points: usize,
    /// Records whose id matched no point.
    pub unmatched_records: usize,
}

/// Inner join of location points and records on the location id.
///
/// Output follows point order; each point is followed by every record that
/// shares its id, in record order, so the output size equals the number of
/// matching pairs.
pub fn join_on_location<R, F>(points: &[LocationPoint], records: Vec<R>, key_fn: F) -> JoinOutcome<R>
where
    R: Clone,
    F: for<'a> Fn(&'a R) -> &'a str,
{
    let mut by_id: HashMap<&str, Vec<&R>> = HashMap::new();
    for record in &records {
        by_id.entry(key_fn(record)).or_default().push(record);
    }

    let mut joined = Vec::with_capacity(records.len());
    let mut unmatched_points = 0;

    for point in points {
        match by_id.get(point.location_id.as_str()) {
            Some(matches) => {
                for record in matches {
                    joined.push(Joined {
                        point: point.clone(),
                        record: (*record).clone(),
                    });
                }
            }
            None => unmatched_points += 1,
        }
    }

    let point_ids: HashSet<&str> = points.iter().map(|p| p.location_id.as_str()).collect();
    let unmatched_records = records
        .iter()
        .filter(|record| !point_ids.contains(key_fn(*record)))
        .count();

    debug!(
        "Location join: {} pairs, {} points and {} records unmatched",
        joined.len(),
        unmatched_points,
        unmatched_records
    );

    JoinOutcome {
        joined,
        unmatched_points,
        unmatched_records,
    }
}

/// A soil reading with its location, ready for time-series or map display.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialSoilRecord {
    pub record: SoilRecord,
    pub timestamp: NaiveDateTime,
    /// Whole days since the earliest timestamp of the joined set.
    pub days_since_start: i64,
    /// Location in the source projection.
    pub position: Coordinate,
    /// Location reprojected to geographic WGS84.
    pub display: Coordinate,
}

/// Whole days elapsed since the earliest timestamp, per timestamp.
pub fn elapsed_days(timestamps: &[NaiveDateTime]) -> Vec<i64> {
    let Some(start) = timestamps.iter().min().copied() else {
        return Vec::new();
    };
    timestamps
        .iter()
        .map(|ts| (*ts - start).num_days())
        .collect()
}

/// Attach elapsed days and coordinates to joined soil readings.
pub fn to_spatial(joined: Vec<Joined<Timed<SoilRecord>>>, source: Crs) -> Vec<SpatialSoilRecord> {
    let timestamps: Vec<NaiveDateTime> = joined.iter().map(|j| j.record.timestamp).collect();
    let days = elapsed_days(&timestamps);

    joined
        .into_iter()
        .zip(days)
        .map(|(j, days_since_start)| {
            let position = Coordinate::new(j.point.x, j.point.y, source);
            SpatialSoilRecord {
                record: j.record.record,
                timestamp: j.record.timestamp,
                days_since_start,
                display: position.to_wgs84(),
                position,
            }
        })
        .collect()
}

/// Two series values that share a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairedValue {
    pub period: Period,
    pub left: f64,
    pub right: f64,
}

/// Result of aligning two per-period series.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub pairs: Vec<PairedValue>,
    /// Periods present only in the left series.
    pub left_only: usize,
    /// Periods present only in the right series.
    pub right_only: usize,
}

/// Align two aggregated series on their period, keeping shared periods only.
///
/// No interpolation or forward fill: a period missing on either side is
/// simply absent from the output, which is ordered by period.
pub fn pair_by_period(left: &[Bucket<Period>], right: &[Bucket<Period>]) -> PairOutcome {
    let right_by_period: BTreeMap<Period, f64> = right.iter().map(|b| (b.key, b.mean)).collect();
    let left_by_period: BTreeMap<Period, f64> = left.iter().map(|b| (b.key, b.mean)).collect();

    let pairs: Vec<PairedValue> = left_by_period
        .iter()
        .filter_map(|(period, &l)| {
            right_by_period.get(period).map(|&r| PairedValue {
                period: *period,
                left: l,
                right: r,
            })
        })
        .collect();

    let left_only = left_by_period.len() - pairs.len();
    let right_only = right_by_period.len() - pairs.len();

    debug!(
        "Period pairing: {} shared, {} left-only, {} right-only",
        pairs.len(),
        left_only,
        right_only
    );

    PairOutcome {
        pairs,
        left_only,
        right_only,
    }
}
