//! Data loaders for delimited measurement files and point geometry.
//!
//! This module provides:
//! - A generic delimited-text reader that keeps every field as text
//! - Typed row extraction for the canopy PAI and soil moisture files
//! - Location point readers for the ESRI shapefile and its text export

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use log::debug;
use shapefile::dbase::{FieldValue, Record};
use thiserror::Error;

use crate::config::ColumnConfig;
use super::records::{plot_key, LocationPoint, PaiRow, SoilRow};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Format error in {path} at line {line}: expected {expected} fields, found {found}")]
    Format {
        path: PathBuf,
        line: u64,
        expected: u64,
        found: u64,
    },

    #[error("Missing required columns in {path}: {columns}")]
    MissingColumns { path: PathBuf, columns: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LoaderError {
    /// True for errors caused by the file layout rather than by I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            LoaderError::Format { .. } | LoaderError::MissingColumns { .. } | LoaderError::EmptyFile(_)
        )
    }
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Rows of a delimited text file with named columns.
///
/// Every field is kept as the raw text found in the file.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<StringRecord>,
    source: PathBuf,
}

impl Table {
    /// Column names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Path the table was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Position of a named column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Resolve several columns at once, failing with every missing name.
    pub fn require_columns(&self, names: &[&str]) -> Result<Vec<usize>> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !self.index.contains_key(*name))
            .collect();

        if !missing.is_empty() {
            return Err(LoaderError::MissingColumns {
                path: self.source.clone(),
                columns: missing.join(", "),
            });
        }

        Ok(names.iter().map(|name| self.index[*name]).collect())
    }

    /// Field text at `(row, column)`, empty when out of range.
    pub fn field(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|record| record.get(column))
            .unwrap_or("")
    }

    /// Field text by column name.
    pub fn value(&self, row: usize, name: &str) -> Option<&str> {
        let column = self.column(name)?;
        self.rows.get(row)?.get(column)
    }
}

/// Load a delimited text file with a header row.
///
/// Every row must split into exactly as many fields as the header; a
/// mismatch means the declared delimiter does not fit the file.
///
/// # Errors
///
/// Returns `LoaderError::Format` on a ragged row and `LoaderError::EmptyFile`
/// when the file has no header or no data rows.
pub fn load_table<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format_error(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let index = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect();

    let mut rows = Vec::with_capacity(1024);
    for result in reader.records() {
        let record = result.map_err(|e| format_error(path, e))?;
        rows.push(record);
    }

    if rows.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    debug!("Loaded {} rows x {} columns from {}", rows.len(), headers.len(), path.display());

    Ok(Table {
        headers,
        index,
        rows,
        source: path.to_path_buf(),
    })
}

fn format_error(path: &Path, err: csv::Error) -> LoaderError {
    if let csv::ErrorKind::UnequalLengths { pos, expected_len, len } = err.kind() {
        return LoaderError::Format {
            path: path.to_path_buf(),
            line: pos.as_ref().map_or(0, |p| p.line()),
            expected: *expected_len,
            found: *len,
        };
    }
    LoaderError::Csv(err)
}

fn optional(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extract canopy PAI rows from a loaded table.
pub fn pai_rows(table: &Table, columns: &ColumnConfig) -> Result<Vec<PaiRow>> {
    let idx = table.require_columns(&[
        columns.site.as_str(),
        columns.site_plot.as_str(),
        columns.date.as_str(),
        columns.time.as_str(),
        columns.pai.as_str(),
        columns.quality.as_str(),
    ])?;

    let rows = (0..table.len())
        .map(|row| {
            let site = table.field(row, idx[0]).trim().to_string();
            let site_plot = table.field(row, idx[1]).trim().to_string();
            PaiRow {
                plot: plot_key(&site, &site_plot),
                site,
                site_plot,
                date: table.field(row, idx[2]).trim().to_string(),
                time: table.field(row, idx[3]).trim().to_string(),
                pai: table.field(row, idx[4]).to_string(),
                quality: optional(table.field(row, idx[5])),
            }
        })
        .collect();

    Ok(rows)
}

/// Extract soil moisture rows from a loaded table.
pub fn soil_rows(table: &Table, columns: &ColumnConfig) -> Result<Vec<SoilRow>> {
    let idx = table.require_columns(&[
        columns.site.as_str(),
        columns.site_plot.as_str(),
        columns.location_id.as_str(),
        columns.date.as_str(),
        columns.time.as_str(),
        columns.moisture.as_str(),
        columns.temperature.as_str(),
    ])?;

    let rows = (0..table.len())
        .map(|row| {
            let site = table.field(row, idx[0]).trim().to_string();
            let site_plot = table.field(row, idx[1]).trim().to_string();
            SoilRow {
                plot: plot_key(&site, &site_plot),
                site,
                site_plot,
                location_id: table.field(row, idx[2]).trim().to_string(),
                date: table.field(row, idx[3]).trim().to_string(),
                time: table.field(row, idx[4]).trim().to_string(),
                moisture: table.field(row, idx[5]).to_string(),
                temperature: table.field(row, idx[6]).to_string(),
            }
        })
        .collect();

    Ok(rows)
}

/// Load the canopy PAI file.
pub fn load_pai_rows<P: AsRef<Path>>(path: P, delimiter: u8, columns: &ColumnConfig) -> Result<Vec<PaiRow>> {
    let table = load_table(path, delimiter)?;
    pai_rows(&table, columns)
}

/// Load the soil moisture file.
pub fn load_soil_rows<P: AsRef<Path>>(path: P, delimiter: u8, columns: &ColumnConfig) -> Result<Vec<SoilRow>> {
    let table = load_table(path, delimiter)?;
    soil_rows(&table, columns)
}

/// Load measurement locations from a point shapefile.
///
/// The `.dbf` attribute table next to the `.shp` must contain `id_column`.
pub fn load_location_points<P: AsRef<Path>>(path: P, id_column: &str) -> Result<Vec<LocationPoint>> {
    let path = path.as_ref();
    let mut reader = shapefile::Reader::from_path(path)?;
    let mut points = Vec::new();

    for result in reader.iter_shapes_and_records_as::<shapefile::Point, Record>() {
        let (point, record) = result?;
        let value = record.get(id_column).ok_or_else(|| LoaderError::MissingColumns {
            path: path.to_path_buf(),
            columns: id_column.to_string(),
        })?;

        let location_id = field_text(value).ok_or_else(|| {
            LoaderError::ParseError(format!("unsupported {} value: {:?}", id_column, value))
        })?;

        points.push(LocationPoint {
            location_id,
            x: point.x,
            y: point.y,
        });
    }

    if points.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    debug!("Loaded {} location points from {}", points.len(), path.display());
    Ok(points)
}

/// Render a dBase attribute as the text used for joining.
///
/// Whole numbers drop their fractional part so `12.0` joins with `"12"`.
fn field_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(text)) => Some(text.trim().to_string()),
        FieldValue::Numeric(Some(n)) => Some(number_text(*n)),
        FieldValue::Float(Some(n)) => Some(number_text(f64::from(*n))),
        FieldValue::Double(n) => Some(number_text(*n)),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Load measurement locations from a delimited export with id, x and y columns.
pub fn load_location_points_table<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    id_column: &str,
) -> Result<Vec<LocationPoint>> {
    let table = load_table(path, delimiter)?;
    let idx = table.require_columns(&[id_column, "X", "Y"])?;

    (0..table.len())
        .map(|row| {
            let coord = |column: usize| -> Result<f64> {
                let raw = table.field(row, column).trim();
                raw.replace(',', ".")
                    .parse::<f64>()
                    .map_err(|_| LoaderError::ParseError(format!("Invalid coordinate: '{}'", raw)))
            };
            Ok(LocationPoint {
                location_id: table.field(row, idx[0]).trim().to_string(),
                x: coord(idx[1])?,
                y: coord(idx[2])?,
            })
        })
        .collect()
}

/// Pick the location loader from the file extension.
pub fn load_locations<P: AsRef<Path>>(path: P, delimiter: u8, id_column: &str) -> Result<Vec<LocationPoint>> {
    let path = path.as_ref();
    let is_shapefile = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("shp"))
        .unwrap_or(false);

    if is_shapefile {
        load_location_points(path, id_column)
    } else {
        load_location_points_table(path, delimiter, id_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_pai_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SITE\tSITE_PLOT\tMEAS_DATE\tMEAS_TIME\tPAI\tBAD_READINGS").unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_table_keeps_text() -> Result<()> {
        let file = write_pai_file(&["PSL\tP01\t20210512\t10:00:00\t2,5\t"]);

        let table = load_table(file.path(), b'\t')?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.headers().len(), 6);
        assert_eq!(table.value(0, "PAI"), Some("2,5"));
        assert_eq!(table.value(0, "BAD_READINGS"), Some(""));
        assert_eq!(table.value(0, "MISSING"), None);

        Ok(())
    }

    #[test]
    fn test_ragged_row_is_format_error() {
        let file = write_pai_file(&[
            "PSL\tP01\t20210512\t10:00:00\t2.5\t",
            "PSL\tP01\t20210512\t10:05:00\t2.5",
        ]);

        let err = load_table(file.path(), b'\t').unwrap_err();
        assert!(err.is_format_error());
        assert!(matches!(err, LoaderError::Format { expected: 6, found: 5, .. }));
    }

    #[test]
    fn test_wrong_delimiter_is_format_error() {
        let file = write_pai_file(&["PSL\tP01\t20210512\t10:00:00\t2.5\t"]);

        let table = load_table(file.path(), b',').unwrap();
        let err = pai_rows(&table, &ColumnConfig::default()).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_header_only_is_empty() {
        let file = write_pai_file(&[]);
        assert!(matches!(load_table(file.path(), b'\t'), Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_pai_rows_build_plot_key() -> Result<()> {
        let file = write_pai_file(&[
            "PSL\tP01\t20210512\t10:00:00\t2.5\t",
            "PUE\tP02\t20210512\t10:00:00\t1.5\tERROR",
        ]);

        let rows = load_pai_rows(file.path(), b'\t', &ColumnConfig::default())?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].plot, "PSL_P01");
        assert_eq!(rows[0].quality, None);
        assert_eq!(rows[1].plot, "PUE_P02");
        assert_eq!(rows[1].quality.as_deref(), Some("ERROR"));

        Ok(())
    }

    #[test]
    fn test_soil_rows() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "SITE\tSITE_PLOT\tID_LOC\tMEAS_DATE\tMEAS_TIME\tVolumetric soil moisture\tSoil temperature"
        )
        .unwrap();
        writeln!(file, "PSL\tP01\tL1\t20210512\t10:00:00\t12,5\t14,1").unwrap();
        file.flush().unwrap();

        let rows = load_soil_rows(file.path(), b'\t', &ColumnConfig::default())?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location_id, "L1");
        assert_eq!(rows[0].moisture, "12,5");
        assert_eq!(rows[0].temperature, "14,1");

        Ok(())
    }

    #[test]
    fn test_location_points_table() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ID_LOC\tX\tY").unwrap();
        writeln!(file, "L1\t500000\t4650000,5").unwrap();
        writeln!(file, "L2\t500100.25\t4650100").unwrap();
        file.flush().unwrap();

        let points = load_locations(file.path(), b'\t', "ID_LOC")?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].y, 4650000.5);
        assert_eq!(points[1].location_id, "L2");
        assert_eq!(points[1].x, 500100.25);

        Ok(())
    }

    fn write_point_shapefile(path: &Path, points: &[(&str, f64, f64, f64)]) {
        use shapefile::dbase::{FieldName, TableWriterBuilder};

        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("ID_LOC").unwrap(), 10)
            .add_numeric_field(FieldName::try_from("NUM_ID").unwrap(), 10, 0);
        let mut writer = shapefile::Writer::from_path(path, table).unwrap();

        for (id, num, x, y) in points {
            let mut record = Record::default();
            record.insert("ID_LOC".to_string(), FieldValue::Character(Some(id.to_string())));
            record.insert("NUM_ID".to_string(), FieldValue::Numeric(Some(*num)));
            writer
                .write_shape_and_record(&shapefile::Point::new(*x, *y), &record)
                .unwrap();
        }
    }

    #[test]
    fn test_location_points_shapefile() -> Result<()> {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("locations.shp");
        write_point_shapefile(
            &path,
            &[("L1", 12.0, 500_000.0, 4_649_776.225), ("L2", 13.0, 500_100.0, 4_649_876.5)],
        );

        let points = load_locations(&path, b'\t', "ID_LOC")?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].location_id, "L1");
        assert_eq!(points[0].x, 500_000.0);
        assert_eq!(points[0].y, 4_649_776.225);
        assert_eq!(points[1].location_id, "L2");

        // numeric ids come back without a fractional part
        let by_number = load_location_points(&path, "NUM_ID")?;
        assert_eq!(by_number[0].location_id, "12");
        assert_eq!(by_number[1].location_id, "13");
        Ok(())
    }

    #[test]
    fn test_location_points_shapefile_missing_id_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("locations.shp");
        write_point_shapefile(&path, &[("L1", 1.0, 500_000.0, 4_649_776.225)]);

        let err = load_location_points(&path, "SITE_ID").unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumns { .. }));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_number_text() {
        assert_eq!(number_text(12.0), "12");
        assert_eq!(number_text(12.5), "12.5");
        assert_eq!(field_text(&FieldValue::Integer(7)), Some("7".to_string()));
        assert_eq!(
            field_text(&FieldValue::Character(Some(" L3 ".to_string()))),
            Some("L3".to_string())
        );
    }
}
