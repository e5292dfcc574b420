//! Per-plot monthly canopy PAI.

use std::fmt;

use anyhow::{Context, Result};
use chrono::Datelike;

use crate::config::PipelineConfig;
use crate::core::records::PaiRecord;
use crate::core::temporal::{self, Period, PeriodKind, Timed};
use crate::processors::aggregation::{self, Bucket, MonthlyValue, Summary};
use crate::processors::cleaning::CleanReport;
use super::{fmt_opt, load_clean_pai};

/// Monthly PAI per plot and the plot ranking derived from it.
#[derive(Debug, Clone)]
pub struct PaiReport {
    pub cleaning: CleanReport,
    pub summary: Summary,
    /// Mean PAI per (plot, calendar month), months with data only.
    pub monthly_by_plot: Vec<Bucket<(String, Period)>>,
    /// Month-end resampling per plot, gaps left missing.
    pub month_end: Vec<MonthlyValue<String>>,
    /// Mean of each plot's monthly values, highest first.
    pub plot_averages: Vec<(String, f64)>,
}

/// Aggregate date-stamped PAI records.
pub fn summarize(records: &[Timed<PaiRecord>], cleaning: CleanReport) -> Result<PaiReport> {
    let values = aggregation::present(records.iter().map(|r| r.record.pai));
    let summary = Summary::describe(&values);

    let monthly_by_plot = aggregation::group_mean(
        records,
        |r| (r.record.plot.clone(), r.period(PeriodKind::Month)),
        |r| r.record.pai,
    );

    let month_end = aggregation::resample_month_end(
        records,
        |r| r.record.plot.clone(),
        |r| r.timestamp.date(),
        |r| r.record.pai,
    )?;

    let mut plot_averages: Vec<(String, f64)> =
        aggregation::group_mean(&month_end, |m| m.group.clone(), |m| m.mean)
            .into_iter()
            .map(|b| (b.key, b.mean))
            .collect();
    plot_averages.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(PaiReport {
        cleaning,
        summary,
        monthly_by_plot,
        month_end,
        plot_averages,
    })
}

/// Load, clean and aggregate the PAI file.
pub fn run(config: &PipelineConfig) -> Result<PaiReport> {
    let (records, cleaning) = load_clean_pai(config, config.cleaning.pai_flag_rule)?;
    let stamped = temporal::stamp_dates(records, config.cleaning.date_layout)
        .context("Failed to parse PAI measurement dates")?;
    summarize(&stamped, cleaning)
}

impl fmt::Display for PaiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cleaning: {}", self.cleaning)?;
        writeln!(f)?;
        writeln!(f, "Summary Statistics of PAI Values:")?;
        write!(f, "{}", self.summary)?;
        writeln!(f)?;

        writeln!(f, "Mean PAI by Plot and Month:")?;
        for bucket in &self.monthly_by_plot {
            let (plot, period) = &bucket.key;
            writeln!(f, "{:<12}{:<10}{:>12.6}", plot, period.to_string(), bucket.mean)?;
        }
        writeln!(f)?;

        writeln!(f, "Monthly PAI Distribution by Plot:")?;
        for m in &self.month_end {
            writeln!(
                f,
                "{:<12}{:<12}{:<11}{:>12}",
                m.group,
                m.month_end.format("%Y-%m-%d").to_string(),
                temporal::month_name(m.month_end.month()),
                fmt_opt(m.mean)
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Average PAI by Plot (Descending Order):")?;
        for (plot, mean) in &self.plot_averages {
            writeln!(f, "{:<12}{:>12.6}", plot, mean)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures;
    use crate::config::FlagRule;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn pai_line(plot: &str, date: &str, pai: &str, flag: &str) -> String {
        format!("PSL\t{}\t{}\t10:00:00\t{}\t{}", plot, date, pai, flag)
    }

    #[test]
    fn test_run_monthly_by_plot() {
        let dir = TempDir::new().unwrap();
        let pai = vec![
            pai_line("P01", "20210405", "2,0", ""),
            pai_line("P01", "20210420", "4.0", ""),
            pai_line("P01", "20210610", "5.0", ""),
            pai_line("P01", "20210611", "50.0", "ERROR"),
            pai_line("P02", "20210415", "1.0", ""),
        ];
        let config = fixtures::config_for(dir.path(), &pai, &[], &[]);

        let report = run(&config).unwrap();

        assert_eq!(report.cleaning.flagged_dropped, 1);
        assert_eq!(report.summary.count, 4);
        assert_eq!(report.summary.max, Some(5.0));

        assert_eq!(report.monthly_by_plot.len(), 3);
        assert_eq!(report.monthly_by_plot[0].key.0, "PSL_P01");
        assert_eq!(report.monthly_by_plot[0].key.1, Period::Month { year: 2021, month: 4 });
        assert_eq!(report.monthly_by_plot[0].mean, 3.0);

        // April, May (empty) and June for P01; April for P02
        assert_eq!(report.month_end.len(), 4);
        assert_eq!(report.month_end[1].month_end, NaiveDate::from_ymd_opt(2021, 5, 31).unwrap());
        assert_eq!(report.month_end[1].mean, None);

        assert_eq!(report.plot_averages[0], ("PSL_P01".to_string(), 4.0));
        assert_eq!(report.plot_averages[1], ("PSL_P02".to_string(), 1.0));

        let text = report.to_string();
        assert!(text.contains("Average PAI by Plot (Descending Order):"));
        assert!(text.contains("May"));
    }

    #[test]
    fn test_run_drops_any_flagged_row() {
        let dir = TempDir::new().unwrap();
        let pai = vec![
            pai_line("P01", "20210405", "2.0", ""),
            pai_line("P01", "20210406", "9.0", "SATURATED"),
        ];
        let config = fixtures::config_for(dir.path(), &pai, &[], &[]);

        let report = run(&config).unwrap();
        assert_eq!(report.cleaning.flagged_dropped, 1);
        assert_eq!(report.summary.count, 1);
        assert_eq!(report.summary.mean, Some(2.0));
    }

    #[test]
    fn test_sentinel_rule_keeps_other_flags() {
        let dir = TempDir::new().unwrap();
        let pai = vec![
            pai_line("P01", "20210405", "2.0", ""),
            pai_line("P01", "20210406", "9.0", "SATURATED"),
            pai_line("P01", "20210407", "7.0", "ERROR"),
        ];
        let mut config = fixtures::config_for(dir.path(), &pai, &[], &[]);
        config.cleaning.pai_flag_rule = FlagRule::Sentinel;

        let report = run(&config).unwrap();
        assert_eq!(report.summary.count, 2);
        assert_eq!(report.summary.mean, Some(5.5));
    }

    #[test]
    fn test_run_rejects_bad_date() {
        let dir = TempDir::new().unwrap();
        let pai = vec![pai_line("P01", "2021-04-05", "2.0", "")];
        let config = fixtures::config_for(dir.path(), &pai, &[], &[]);

        assert!(run(&config).is_err());
    }
}
