//! Date/time parsing and calendar period buckets.
//!
//! Raw measurement files carry the calendar day and the clock time in two
//! separate fields. Both must match their fixed layout exactly; there is no
//! fallback format.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::config::DateLayout;

/// Clock-time layout of the `MEAS_TIME` field.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Errors raised while normalizing temporal fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Parse error: {field} value '{value}' does not match '{format}'")]
    Parse {
        field: &'static str,
        value: String,
        format: &'static str,
    },

    #[error("Invalid calendar month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Result type for temporal operations.
pub type Result<T> = std::result::Result<T, TemporalError>;

/// Parse a calendar-date field.
pub fn parse_date(raw: &str, layout: DateLayout) -> Result<NaiveDate> {
    let format = layout.format();
    // chrono accepts a shorter year for %Y, so pin the length first
    let expected_len = match layout {
        DateLayout::Compact => 8,
        DateLayout::Dashed => 10,
    };
    if raw.len() != expected_len {
        return Err(parse_error("date", raw, format));
    }
    NaiveDate::parse_from_str(raw, format).map_err(|_| parse_error("date", raw, format))
}

/// Parse a clock-time field.
pub fn parse_time(raw: &str) -> Result<NaiveTime> {
    if raw.len() != 8 {
        return Err(parse_error("time", raw, TIME_FORMAT));
    }
    NaiveTime::parse_from_str(raw, TIME_FORMAT).map_err(|_| parse_error("time", raw, TIME_FORMAT))
}

/// Combine a date field and a time field into one timestamp.
pub fn parse_timestamp(date: &str, time: &str, layout: DateLayout) -> Result<NaiveDateTime> {
    let date = parse_date(date, layout)?;
    let time = parse_time(time)?;
    Ok(date.and_time(time))
}

fn parse_error(field: &'static str, value: &str, format: &'static str) -> TemporalError {
    TemporalError::Parse {
        field,
        value: value.to_string(),
        format,
    }
}

/// Records that carry raw date and time fields.
pub trait Stamped {
    fn raw_date(&self) -> &str;
    fn raw_time(&self) -> &str;

    /// Combined date + time timestamp.
    fn timestamp(&self, layout: DateLayout) -> Result<NaiveDateTime> {
        parse_timestamp(self.raw_date(), self.raw_time(), layout)
    }

    /// Midnight of the record's calendar day; the time field is ignored.
    fn date_only(&self, layout: DateLayout) -> Result<NaiveDateTime> {
        Ok(parse_date(self.raw_date(), layout)?.and_time(NaiveTime::MIN))
    }
}

/// A record paired with its normalized timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<R> {
    pub timestamp: NaiveDateTime,
    pub record: R,
}

impl<R> Timed<R> {
    /// Period bucket of this record's timestamp.
    pub fn period(&self, kind: PeriodKind) -> Period {
        Period::of_timestamp(self.timestamp, kind)
    }
}

/// Attach date + time timestamps to every record, in order.
///
/// The first malformed field aborts the whole batch.
pub fn stamp_all<R: Stamped>(records: Vec<R>, layout: DateLayout) -> Result<Vec<Timed<R>>> {
    records
        .into_iter()
        .map(|record| {
            let timestamp = record.timestamp(layout)?;
            Ok(Timed { timestamp, record })
        })
        .collect()
}

/// Like [`stamp_all`] for data where only the date field is meaningful.
pub fn stamp_dates<R: Stamped>(records: Vec<R>, layout: DateLayout) -> Result<Vec<Timed<R>>> {
    records
        .into_iter()
        .map(|record| {
            let timestamp = record.date_only(layout)?;
            Ok(Timed { timestamp, record })
        })
        .collect()
}

/// Granularity of a period bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKind {
    Day,
    Month,
}

/// A calendar bucket used as an aggregation key.
///
/// Ordering is chronological within one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl Period {
    /// Bucket a date into the requested period kind.
    pub fn of(date: NaiveDate, kind: PeriodKind) -> Self {
        match kind {
            PeriodKind::Day => Period::Day(date),
            PeriodKind::Month => Period::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }

    /// Bucket a timestamp, ignoring its clock time.
    pub fn of_timestamp(ts: NaiveDateTime, kind: PeriodKind) -> Self {
        Self::of(ts.date(), kind)
    }

    /// First calendar day covered by this period.
    pub fn start(&self) -> NaiveDate {
        match *self {
            Period::Day(date) => date,
            // Month periods are only built from valid dates
            Period::Month { year, month } => {
                NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Period::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

/// Last calendar day of the given month.
pub fn month_end(year: i32, month: u32) -> Result<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .filter(|_| (1..=12).contains(&month))
        .ok_or(TemporalError::InvalidMonth { year, month })
}

/// Month following `(year, month)`.
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// English month name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    NAMES.get(month.wrapping_sub(1) as usize).copied().unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_compact() {
        let ts = parse_timestamp("20210512", "10:30:05", DateLayout::Compact).unwrap();
        assert_eq!(ts.to_string(), "2021-05-12 10:30:05");
    }

    #[test]
    fn test_parse_date_dashed() {
        let date = parse_date("2021-05-12", DateLayout::Dashed).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2021, 5, 12).unwrap());
    }

    #[test]
    fn test_no_fallback_layout() {
        assert!(parse_date("2021-05-12", DateLayout::Compact).is_err());
        assert!(parse_date("20210512", DateLayout::Dashed).is_err());
        assert!(parse_date("2021512", DateLayout::Compact).is_err());
        assert!(parse_date("20211312", DateLayout::Compact).is_err());
    }

    #[test]
    fn test_time_must_be_exact() {
        assert!(parse_time("10:30").is_err());
        assert!(parse_time("9:30:00").is_err());
        assert!(parse_time("25:00:00").is_err());

        let err = parse_timestamp("20210512", "10h30", DateLayout::Compact).unwrap_err();
        assert!(matches!(err, TemporalError::Parse { field: "time", .. }));
    }

    #[test]
    fn test_period_buckets() {
        let date = NaiveDate::from_ymd_opt(2021, 7, 19).unwrap();
        assert_eq!(Period::of(date, PeriodKind::Day), Period::Day(date));
        assert_eq!(
            Period::of(date, PeriodKind::Month),
            Period::Month { year: 2021, month: 7 }
        );
        assert_eq!(
            Period::of(date, PeriodKind::Month).start(),
            NaiveDate::from_ymd_opt(2021, 7, 1).unwrap()
        );
        assert_eq!(Period::of(date, PeriodKind::Month).to_string(), "2021-07");
    }

    #[test]
    fn test_month_end() {
        assert_eq!(month_end(2021, 2).unwrap(), NaiveDate::from_ymd_opt(2021, 2, 28).unwrap());
        assert_eq!(month_end(2020, 2).unwrap(), NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
        assert_eq!(month_end(2021, 12).unwrap(), NaiveDate::from_ymd_opt(2021, 12, 31).unwrap());
        assert!(month_end(2021, 13).is_err());
    }

    struct Raw(&'static str, &'static str);

    impl Stamped for Raw {
        fn raw_date(&self) -> &str {
            self.0
        }

        fn raw_time(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_stamp_all_keeps_order() {
        let stamped = stamp_all(
            vec![Raw("20210601", "12:00:00"), Raw("20210501", "08:00:00")],
            DateLayout::Compact,
        )
        .unwrap();
        assert_eq!(stamped.len(), 2);
        assert_eq!(stamped[0].timestamp.to_string(), "2021-06-01 12:00:00");
        assert_eq!(stamped[1].period(PeriodKind::Month), Period::Month { year: 2021, month: 5 });
    }

    #[test]
    fn test_stamp_all_aborts_on_bad_row() {
        let result = stamp_all(
            vec![Raw("20210601", "12:00:00"), Raw("2021-06-02", "12:00:00")],
            DateLayout::Compact,
        );
        assert!(matches!(result, Err(TemporalError::Parse { field: "date", .. })));
    }

    #[test]
    fn test_stamp_dates_ignores_time() {
        let stamped = stamp_dates(vec![Raw("20210601", "")], DateLayout::Compact).unwrap();
        assert_eq!(stamped[0].timestamp.to_string(), "2021-06-01 00:00:00");
    }

    #[test]
    fn test_month_helpers() {
        assert_eq!(next_month(2021, 12), (2022, 1));
        assert_eq!(next_month(2021, 3), (2021, 4));
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(0), "Unknown");
    }
}
