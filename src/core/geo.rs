//! Coordinate reference systems for measurement locations.
//!
//! The location geometry is stored in UTM (EPSG:32633 for the field sites)
//! and reprojected to geographic WGS84 (EPSG:4326) for display.

use std::fmt;

/// WGS84 semi-major axis in meters.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// UTM central meridian scale factor.
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Coordinate reference system tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// WGS84 / UTM projected meters.
    Utm { zone: u8, north: bool },
    /// WGS84 geographic degrees.
    Wgs84,
}

impl Crs {
    /// EPSG code of this reference system.
    pub fn epsg(&self) -> u32 {
        match *self {
            Crs::Utm { zone, north: true } => 32600 + u32::from(zone),
            Crs::Utm { zone, north: false } => 32700 + u32::from(zone),
            Crs::Wgs84 => 4326,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// A coordinate pair tagged with its reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Easting or longitude
    pub x: f64,
    /// Northing or latitude
    pub y: f64,
    pub crs: Crs,
}

impl Coordinate {
    pub fn new(x: f64, y: f64, crs: Crs) -> Self {
        Self { x, y, crs }
    }

    /// Reproject to geographic WGS84; already-geographic coordinates pass through.
    pub fn to_wgs84(&self) -> Coordinate {
        match self.crs {
            Crs::Wgs84 => *self,
            Crs::Utm { zone, north } => {
                let (lon, lat) = utm_to_wgs84(self.x, self.y, zone, north);
                Coordinate::new(lon, lat, Crs::Wgs84)
            }
        }
    }
}

/// Inverse transverse Mercator on the WGS84 ellipsoid.
///
/// Returns `(longitude, latitude)` in degrees. Accuracy is well below a
/// millimeter inside the zone, which is plenty for plotting field plots.
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u8, north: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);

    let x = easting - UTM_FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - UTM_FALSE_NORTHING_SOUTH
    };

    let m = y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let sqrt_1me2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);

    // footpoint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi, cos_phi) = phi1.sin_cos();
    let tan_phi = phi1.tan();
    let c1 = ep2 * cos_phi.powi(2);
    let t1 = tan_phi.powi(2);
    let w = 1.0 - e2 * sin_phi.powi(2);
    let n1 = WGS84_A / w.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / w.powf(1.5);
    let d = x / (n1 * UTM_K0);

    let lat = phi1
        - (n1 * tan_phi / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2) - 252.0 * ep2 - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2)) * d.powi(5)
            / 120.0)
        / cos_phi;

    (central_meridian(zone) + lon.to_degrees(), lat.to_degrees())
}

/// Central meridian of a UTM zone, in degrees.
pub fn central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn test_crs_tags() {
        assert_eq!(Crs::Utm { zone: 33, north: true }.to_string(), "EPSG:32633");
        assert_eq!(Crs::Utm { zone: 33, north: false }.epsg(), 32733);
        assert_eq!(Crs::Wgs84.to_string(), "EPSG:4326");
        assert_eq!(central_meridian(33), 15.0);
    }

    #[test]
    fn test_equator_on_central_meridian() {
        let (lon, lat) = utm_to_wgs84(500_000.0, 0.0, 33, true);
        assert!((lon - 15.0).abs() < TOL);
        assert!(lat.abs() < TOL);
    }

    #[test]
    fn test_known_points_zone_33() {
        let (lon, lat) = utm_to_wgs84(500_000.0, 4_649_776.225, 33, true);
        assert!((lon - 15.0).abs() < TOL);
        assert!((lat - 42.0).abs() < TOL);

        let (lon, lat) = utm_to_wgs84(601_681.806_906, 4_483_946.325_264, 33, true);
        assert!((lon - 16.2).abs() < TOL);
        assert!((lat - 40.5).abs() < TOL);

        let (lon, lat) = utm_to_wgs84(292_624.875_243, 4_641_695.878_088, 33, true);
        assert!((lon - 12.5).abs() < TOL);
        assert!((lat - 41.9).abs() < TOL);
    }

    #[test]
    fn test_coordinate_reprojection() {
        let utm = Coordinate::new(500_000.0, 4_649_776.225, Crs::Utm { zone: 33, north: true });
        let geo = utm.to_wgs84();
        assert_eq!(geo.crs, Crs::Wgs84);
        assert!((geo.y - 42.0).abs() < TOL);
        assert_eq!(geo.to_wgs84(), geo);
    }
}
