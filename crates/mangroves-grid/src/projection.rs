//! Ellipsoidal Mercator projection used by the Pacific grid.
//!
//! EPSG:3832 ("WGS 84 / PDC Mercator") is a Mercator (variant A) projection
//! on the WGS84 ellipsoid with the central meridian at 150°E and no false
//! easting or northing. Centring on 150°E keeps the Pacific island nations,
//! which straddle the antimeridian, in one continuous coordinate space.
//!
//! ## Longitude wrapping
//!
//! Longitudes are measured relative to the central meridian and wrapped into
//! `[-180, 180)` before projecting, so 179°E and 179°W land 2° apart in grid
//! space rather than 358° apart.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// EPSG code for geographic WGS84 coordinates.
pub const WGS84_EPSG: u32 = 4326;

/// EPSG code for the Pacific grid CRS (WGS 84 / PDC Mercator).
pub const PACIFIC_EPSG: u32 = 3832;

/// Central meridian of the PDC Mercator projection in degrees.
pub const PACIFIC_CENTRAL_MERIDIAN: f64 = 150.0;

/// WGS84 semi-major axis in metres.
const WGS84_A: f64 = 6_378_137.0;

/// WGS84 first eccentricity.
const WGS84_E: f64 = 0.081_819_190_842_621_49;

/// Latitudes are clamped to this before projecting (Mercator diverges at the poles).
const MAX_LATITUDE: f64 = 85.0;

/// Convergence tolerance for the inverse latitude iteration (radians).
const INVERSE_TOLERANCE: f64 = 1e-12;

/// Maximum iterations for the inverse latitude series.
const INVERSE_MAX_ITER: usize = 16;

/// Wrap an angle in degrees into `[-180, 180)`.
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Mercator projection on an ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mercator {
    /// Semi-major axis in metres.
    a: f64,
    /// First eccentricity.
    e: f64,
    /// Central meridian in degrees.
    lon0: f64,
}

impl Mercator {
    /// The PDC Mercator projection (EPSG:3832).
    pub const fn pacific() -> Self {
        Self {
            a: WGS84_A,
            e: WGS84_E,
            lon0: PACIFIC_CENTRAL_MERIDIAN,
        }
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        self.lon0
    }

    /// Project a longitude/latitude pair (degrees) to grid metres.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let dlon = wrap_longitude(lon - self.lon0);
        let phi = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let e_sin = self.e * phi.sin();

        let x = self.a * dlon.to_radians();
        let y = self.a
            * ((FRAC_PI_4 + phi / 2.0).tan() * ((1.0 - e_sin) / (1.0 + e_sin)).powf(self.e / 2.0))
                .ln();

        (x, y)
    }

    /// Inverse-project grid metres to longitude/latitude, with the longitude
    /// wrapped into `[-180, 180)`.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let (lon, lat) = self.inverse_unwrapped(x, y);
        (wrap_longitude(lon), lat)
    }

    /// Inverse-project without wrapping the longitude.
    ///
    /// The result is `central_meridian + Δλ`, which may exceed 180°. Useful
    /// for building outlines that cross the antimeridian without a jump.
    pub fn inverse_unwrapped(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = self.lon0 + (x / self.a).to_degrees();

        let t = (-y / self.a).exp();
        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..INVERSE_MAX_ITER {
            let e_sin = self.e * phi.sin();
            let next =
                FRAC_PI_2 - 2.0 * (t * ((1.0 - e_sin) / (1.0 + e_sin)).powf(self.e / 2.0)).atan();
            let delta = (next - phi).abs();
            phi = next;
            if delta < INVERSE_TOLERANCE {
                break;
            }
        }

        (lon, phi.to_degrees())
    }
}

impl Default for Mercator {
    fn default() -> Self {
        Self::pacific()
    }
}
