//! Record cleaning: quality flags, locale decimals and missing fields.

use std::fmt;

use log::{debug, warn};

use crate::config::{CleaningMode, FlagRule};
use crate::core::records::{PaiRecord, PaiRow, SoilRecord, SoilRow};

/// Outcome of converting one numeric text field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coercion {
    Value(f64),
    /// Empty or whitespace-only field.
    Empty,
    /// Text that is not a number even after decimal-comma normalization.
    Invalid,
}

impl Coercion {
    pub fn value(self) -> Option<f64> {
        match self {
            Coercion::Value(v) => Some(v),
            Coercion::Empty | Coercion::Invalid => None,
        }
    }
}

/// Convert a locale-formatted number, accepting `,` or `.` as the decimal mark.
pub fn coerce(raw: &str) -> Coercion {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Coercion::Empty;
    }

    match trimmed.replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() => Coercion::Value(v),
        // "nan" parses, but is no more a value than garbage text
        Ok(_) | Err(_) => Coercion::Invalid,
    }
}

/// Convert a locale-formatted number; anything unparseable becomes missing.
///
/// ```
/// use canopy_pipeline::processors::cleaning::coerce_decimal;
///
/// assert_eq!(coerce_decimal("12,5"), Some(12.5));
/// assert_eq!(coerce_decimal("12.5"), Some(12.5));
/// assert_eq!(coerce_decimal("  "), None);
/// ```
pub fn coerce_decimal(raw: &str) -> Option<f64> {
    coerce(raw).value()
}

/// Counters collected while cleaning one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub rows_in: usize,
    /// Rows dropped because their quality flag matched the sentinel.
    pub flagged_dropped: usize,
    /// Non-empty numeric fields that failed to parse and became missing.
    pub coercion_warnings: usize,
    /// Rows dropped in strict mode for a missing critical field.
    pub missing_dropped: usize,
    pub rows_out: usize,
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows in, {} flagged, {} coerced to missing, {} dropped as incomplete, {} rows out",
            self.rows_in, self.flagged_dropped, self.coercion_warnings, self.missing_dropped, self.rows_out
        )
    }
}

fn coerce_counted(raw: &str, field: &str, warnings: &mut usize) -> Option<f64> {
    match coerce(raw) {
        Coercion::Value(v) => Some(v),
        Coercion::Empty => None,
        Coercion::Invalid => {
            debug!("{} value '{}' is not numeric, treating as missing", field, raw);
            *warnings += 1;
            None
        }
    }
}

/// Predicate deciding which quality flags mark a bad reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagFilter {
    /// Drop rows whose flag equals this value exactly.
    Sentinel(String),
    /// Drop rows carrying any flag at all.
    AnyFlag,
}

impl FlagFilter {
    pub fn from_rule(rule: FlagRule, sentinel: &str) -> Self {
        match rule {
            FlagRule::Sentinel => FlagFilter::Sentinel(sentinel.to_string()),
            FlagRule::AnyFlag => FlagFilter::AnyFlag,
        }
    }

    /// True when a row with this flag must be dropped.
    pub fn rejects(&self, flag: Option<&str>) -> bool {
        match self {
            FlagFilter::Sentinel(sentinel) => flag == Some(sentinel.as_str()),
            FlagFilter::AnyFlag => flag.is_some(),
        }
    }
}

/// Remove PAI rows rejected by `filter`, keeping order.
///
/// Returns the kept rows and the number dropped.
pub fn drop_flagged(rows: Vec<PaiRow>, filter: &FlagFilter) -> (Vec<PaiRow>, usize) {
    let before = rows.len();
    let kept: Vec<PaiRow> = rows
        .into_iter()
        .filter(|row| !filter.rejects(row.quality.as_deref()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Clean raw PAI rows.
///
/// Rows rejected by `filter` are always dropped. In strict mode rows without a PAI value,
/// date or time are dropped as well; in permissive mode they are kept with a
/// missing PAI.
pub fn clean_pai(rows: Vec<PaiRow>, filter: &FlagFilter, mode: CleaningMode) -> (Vec<PaiRecord>, CleanReport) {
    let mut report = CleanReport {
        rows_in: rows.len(),
        ..CleanReport::default()
    };

    let (rows, flagged) = drop_flagged(rows, filter);
    report.flagged_dropped = flagged;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let pai = coerce_counted(&row.pai, "PAI", &mut report.coercion_warnings);

        if mode == CleaningMode::Strict && (pai.is_none() || row.date.is_empty() || row.time.is_empty()) {
            report.missing_dropped += 1;
            continue;
        }

        records.push(PaiRecord {
            site: row.site,
            site_plot: row.site_plot,
            plot: row.plot,
            date: row.date,
            time: row.time,
            pai,
            quality: row.quality,
        });
    }

    report.rows_out = records.len();
    if report.coercion_warnings > 0 {
        warn!("{} PAI values could not be parsed and were set to missing", report.coercion_warnings);
    }
    (records, report)
}

/// Numeric soil fields that can be required present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoilField {
    Moisture,
    Temperature,
}

impl SoilField {
    fn is_missing(self, record: &SoilRecord) -> bool {
        match self {
            SoilField::Moisture => record.moisture.is_none(),
            SoilField::Temperature => record.temperature.is_none(),
        }
    }
}

/// Clean raw soil rows.
///
/// Both numeric fields go through decimal-comma coercion. In strict mode a
/// row is dropped when its date, time or any field in `required` is missing.
pub fn clean_soil(
    rows: Vec<SoilRow>,
    mode: CleaningMode,
    required: &[SoilField],
) -> (Vec<SoilRecord>, CleanReport) {
    let mut report = CleanReport {
        rows_in: rows.len(),
        ..CleanReport::default()
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let moisture = coerce_counted(&row.moisture, "moisture", &mut report.coercion_warnings);
        let temperature = coerce_counted(&row.temperature, "temperature", &mut report.coercion_warnings);

        let record = SoilRecord {
            site: row.site,
            site_plot: row.site_plot,
            plot: row.plot,
            location_id: row.location_id,
            date: row.date,
            time: row.time,
            moisture,
            temperature,
        };

        if mode == CleaningMode::Strict
            && (record.date.is_empty()
                || record.time.is_empty()
                || required.iter().any(|field| field.is_missing(&record)))
        {
            report.missing_dropped += 1;
            continue;
        }

        records.push(record);
    }

    report.rows_out = records.len();
    if report.coercion_warnings > 0 {
        warn!("{} soil values could not be parsed and were set to missing", report.coercion_warnings);
    }
    (records, report)
}

/// Drop soil records missing any of `fields`, whatever the cleaning mode.
pub fn drop_missing(records: Vec<SoilRecord>, fields: &[SoilField]) -> (Vec<SoilRecord>, usize) {
    let before = records.len();
    let kept: Vec<SoilRecord> = records
        .into_iter()
        .filter(|record| !fields.iter().any(|field| field.is_missing(record)))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pai_row(plot: &str, pai: &str, quality: Option<&str>) -> PaiRow {
        PaiRow {
            site: "PSL".to_string(),
            site_plot: plot.to_string(),
            plot: format!("PSL_{}", plot),
            date: "20210512".to_string(),
            time: "10:00:00".to_string(),
            pai: pai.to_string(),
            quality: quality.map(str::to_string),
        }
    }

    fn soil_row(moisture: &str, temperature: &str, time: &str) -> SoilRow {
        SoilRow {
            site: "PSL".to_string(),
            site_plot: "P01".to_string(),
            plot: "PSL_P01".to_string(),
            location_id: "L1".to_string(),
            date: "20210512".to_string(),
            time: time.to_string(),
            moisture: moisture.to_string(),
            temperature: temperature.to_string(),
        }
    }

    #[test]
    fn test_coerce_comma_and_dot_agree() {
        assert_eq!(coerce_decimal("12,5"), Some(12.5));
        assert_eq!(coerce_decimal("12.5"), Some(12.5));
        assert_eq!(coerce_decimal(" 7 "), Some(7.0));
        assert_eq!(coerce_decimal("-0,25"), Some(-0.25));
    }

    #[test]
    fn test_coerce_empty_is_missing_not_zero() {
        assert_eq!(coerce(""), Coercion::Empty);
        assert_eq!(coerce("   "), Coercion::Empty);
        assert_eq!(coerce_decimal("\t"), None);
    }

    #[test]
    fn test_coerce_invalid() {
        assert_eq!(coerce("n/a"), Coercion::Invalid);
        assert_eq!(coerce("1,2,3"), Coercion::Invalid);
        assert_eq!(coerce("NaN"), Coercion::Invalid);
    }

    #[test]
    fn test_drop_flagged_keeps_order() {
        let rows = vec![
            pai_row("P01", "1.0", None),
            pai_row("P02", "2.0", Some("ERROR")),
            pai_row("P03", "3.0", Some("CHECKED")),
        ];
        let (kept, dropped) = drop_flagged(rows, &FlagFilter::Sentinel("ERROR".to_string()));
        assert_eq!(dropped, 1);
        let plots: Vec<&str> = kept.iter().map(|r| r.site_plot.as_str()).collect();
        assert_eq!(plots, vec!["P01", "P03"]);
    }

    #[test]
    fn test_drop_flagged_any_flag() {
        let rows = vec![
            pai_row("P01", "1.0", None),
            pai_row("P02", "2.0", Some("ERROR")),
            pai_row("P03", "3.0", Some("SATURATED")),
            pai_row("P04", "4.0", None),
        ];
        let filter = FlagFilter::from_rule(FlagRule::AnyFlag, "ERROR");
        let (kept, dropped) = drop_flagged(rows, &filter);
        assert_eq!(dropped, 2);
        let plots: Vec<&str> = kept.iter().map(|r| r.site_plot.as_str()).collect();
        assert_eq!(plots, vec!["P01", "P04"]);
    }

    #[test]
    fn test_flag_filter_from_rule() {
        let filter = FlagFilter::from_rule(FlagRule::Sentinel, "ERROR");
        assert!(filter.rejects(Some("ERROR")));
        assert!(!filter.rejects(Some("SATURATED")));
        assert!(!filter.rejects(None));
        assert!(!FlagFilter::AnyFlag.rejects(None));
    }

    #[test]
    fn test_clean_pai_never_keeps_sentinel() {
        let rows = vec![
            pai_row("P01", "1,5", None),
            pai_row("P02", "2.0", Some("ERROR")),
            pai_row("P03", "bad", None),
        ];
        let (records, report) = clean_pai(rows, &FlagFilter::Sentinel("ERROR".to_string()), CleaningMode::Permissive);

        assert!(records.iter().all(|r| r.quality.as_deref() != Some("ERROR")));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pai, Some(1.5));
        assert_eq!(records[1].pai, None);
        assert_eq!(report.flagged_dropped, 1);
        assert_eq!(report.coercion_warnings, 1);
        assert_eq!(report.rows_out, 2);
    }

    #[test]
    fn test_clean_pai_strict_drops_missing() {
        let rows = vec![pai_row("P01", "1.5", None), pai_row("P03", "", None)];
        let (records, report) = clean_pai(rows, &FlagFilter::Sentinel("ERROR".to_string()), CleaningMode::Strict);
        assert_eq!(records.len(), 1);
        assert_eq!(report.missing_dropped, 1);
        assert_eq!(report.coercion_warnings, 0);
    }

    #[test]
    fn test_clean_soil_permissive_keeps_rows() {
        let rows = vec![soil_row("12,5", "14,1", "10:00:00"), soil_row("x", "", "10:05:00")];
        let (records, report) = clean_soil(rows, CleaningMode::Permissive, &[SoilField::Moisture]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].moisture, Some(12.5));
        assert_eq!(records[0].temperature, Some(14.1));
        assert_eq!(records[1].moisture, None);
        assert_eq!(records[1].temperature, None);
        assert_eq!(report.coercion_warnings, 1);
    }

    #[test]
    fn test_clean_soil_strict_drops_incomplete() {
        let rows = vec![
            soil_row("12,5", "", "10:00:00"),
            soil_row("", "14,0", "10:05:00"),
            soil_row("13,0", "14,0", ""),
        ];
        let (records, report) = clean_soil(rows, CleaningMode::Strict, &[SoilField::Moisture]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].moisture, Some(12.5));
        assert_eq!(report.missing_dropped, 2);

        let rows = vec![soil_row("12,5", "", "10:00:00")];
        let (records, _) = clean_soil(
            rows,
            CleaningMode::Strict,
            &[SoilField::Moisture, SoilField::Temperature],
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_drop_missing() {
        let rows = vec![soil_row("12,5", "", "10:00:00"), soil_row("12,5", "3", "10:00:00")];
        let (records, _) = clean_soil(rows, CleaningMode::Permissive, &[]);
        let (kept, dropped) = drop_missing(records, &[SoilField::Moisture, SoilField::Temperature]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 1);
        assert_eq!(kept[0].temperature, Some(3.0));
    }
}
