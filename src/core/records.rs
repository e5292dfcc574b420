//! Measurement record types.
//!
//! Rows come in two shapes: the raw text rows produced by the loaders, and the
//! cleaned records produced by the cleaner once numeric fields are coerced and
//! flagged readings are gone.

use super::temporal::Stamped;

/// Composite plot identifier, e.g. `PSL` + `P01` -> `PSL_P01`.
pub fn plot_key(site: &str, site_plot: &str) -> String {
    format!("{}_{}", site, site_plot)
}

/// One raw line of the canopy PAI file.
#[derive(Debug, Clone, PartialEq)]
pub struct PaiRow {
    pub site: String,
    pub site_plot: String,
    pub plot: String,
    pub date: String,
    pub time: String,
    pub pai: String,
    /// Quality flag, `None` when the field is empty.
    pub quality: Option<String>,
}

/// One raw line of the soil moisture file.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilRow {
    pub site: String,
    pub site_plot: String,
    pub plot: String,
    pub location_id: String,
    pub date: String,
    pub time: String,
    pub moisture: String,
    pub temperature: String,
}

/// A cleaned canopy plant-area-index reading.
#[derive(Debug, Clone, PartialEq)]
pub struct PaiRecord {
    pub site: String,
    pub site_plot: String,
    pub plot: String,
    pub date: String,
    pub time: String,
    pub pai: Option<f64>,
    pub quality: Option<String>,
}

/// A cleaned soil moisture/temperature reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilRecord {
    pub site: String,
    pub site_plot: String,
    pub plot: String,
    pub location_id: String,
    pub date: String,
    pub time: String,
    /// Volumetric soil moisture (%)
    pub moisture: Option<f64>,
    /// Soil temperature (°C)
    pub temperature: Option<f64>,
}

/// A measurement location from the point geometry file.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPoint {
    pub location_id: String,
    /// Easting in the source projection
    pub x: f64,
    /// Northing in the source projection
    pub y: f64,
}

impl Stamped for PaiRecord {
    fn raw_date(&self) -> &str {
        &self.date
    }

    fn raw_time(&self) -> &str {
        &self.time
    }
}

impl Stamped for SoilRecord {
    fn raw_date(&self) -> &str {
        &self.date
    }

    fn raw_time(&self) -> &str {
        &self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_key() {
        assert_eq!(plot_key("PSL", "P01"), "PSL_P01");
        assert_eq!(plot_key("PUE", ""), "PUE_");
    }
}
