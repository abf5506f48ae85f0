//! Lambert Conformal Conic projection (ellipsoidal, two standard parallels).
//!
//! This is the projection behind RGF93 / Lambert-93 (EPSG:2154), the CRS the
//! parcels arrive in and the products are stored in. It maps a cone secant
//! to the ellipsoid at two standard parallels onto a flat plane.
//!
//! The projection parameters include:
//! - Latitude of origin (lat0) and central meridian (lon0)
//! - Standard parallels: latin1 and latin2
//! - False easting / northing: x0, y0

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::Ellipsoid;

const MAX_ITERATIONS: usize = 15;
const TOLERANCE: f64 = 1e-12;

/// Lambert Conformal Conic projection parameters.
///
/// Converts geographic (lon/lat) coordinates to projected (x, y) meters and
/// back. Axis order is always (longitude, latitude) / (easting, northing).
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian in radians
    pub lon0: f64,
    /// Latitude of origin in radians
    pub lat0: f64,
    /// First standard parallel in radians
    pub latin1: f64,
    /// Second standard parallel in radians
    pub latin2: f64,
    /// False easting (meters)
    pub x0: f64,
    /// False northing (meters)
    pub y0: f64,
    ellipsoid: Ellipsoid,
    /// Eccentricity
    e: f64,
    /// Cone constant (n)
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl LambertConformal {
    /// Create a secant Lambert Conformal projection.
    ///
    /// # Arguments
    /// * `lat0_deg` - Latitude of origin (degrees)
    /// * `lon0_deg` - Central meridian (degrees)
    /// * `latin1_deg` - First standard parallel (degrees)
    /// * `latin2_deg` - Second standard parallel (degrees)
    /// * `x0` - False easting (meters)
    /// * `y0` - False northing (meters)
    pub fn new(
        ellipsoid: Ellipsoid,
        lat0_deg: f64,
        lon0_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        x0: f64,
        y0: f64,
    ) -> Self {
        let to_rad = PI / 180.0;

        let lat0 = lat0_deg * to_rad;
        let lon0 = lon0_deg * to_rad;
        let latin1 = latin1_deg * to_rad;
        let latin2 = latin2_deg * to_rad;
        let e = ellipsoid.e();

        let m1 = m(e, latin1);
        let m2 = m(e, latin2);
        let t1 = t(e, latin1);
        let t2 = t(e, latin2);

        // Cone constant n
        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone (single standard parallel)
            latin1.sin()
        } else {
            (m1.ln() - m2.ln()) / (t1.ln() - t2.ln())
        };

        let f = m1 / (n * t1.powf(n));
        let rho0 = ellipsoid.a * f * t(e, lat0).powf(n);

        Self {
            lon0,
            lat0,
            latin1,
            latin2,
            x0,
            y0,
            ellipsoid,
            e,
            n,
            f,
            rho0,
        }
    }

    /// RGF93 / Lambert-93 (EPSG:2154).
    ///
    /// - Origin: 46.5°N, 3°E
    /// - Standard parallels: 49°N and 44°N
    /// - False origin: (700000, 6600000)
    pub fn lambert93() -> Self {
        Self::new(
            Ellipsoid::GRS80,
            46.5,      // lat0
            3.0,       // lon0
            49.0,      // latin1
            44.0,      // latin2
            700000.0,  // x0
            6600000.0, // y0
        )
    }

    /// Project geographic coordinates (degrees) to (x, y) meters.
    pub fn project(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;
        let lon = lon_deg * to_rad;

        // Normalize longitude difference to [-π, π]
        let mut dlon = lon - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let rho = self.ellipsoid.a * self.f * t(self.e, lat).powf(self.n);
        let theta = self.n * dlon;

        let x = self.x0 + rho * theta.sin();
        let y = self.y0 + self.rho0 - rho * theta.cos();

        (x, y)
    }

    /// Inverse projection: (x, y) meters to (lon, lat) degrees.
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;

        let dx = x - self.x0;
        let dy = self.rho0 - (y - self.y0);

        let sign = self.n.signum();
        let rho = sign * (dx * dx + dy * dy).sqrt();
        let theta = (sign * dx).atan2(sign * dy);

        let t_prime = (rho / (self.ellipsoid.a * self.f)).powf(1.0 / self.n);

        // Latitude by fixed-point iteration on the isometric latitude
        let mut lat = FRAC_PI_2 - 2.0 * t_prime.atan();
        for _ in 0..MAX_ITERATIONS {
            let esin = self.e * lat.sin();
            let next =
                FRAC_PI_2 - 2.0 * (t_prime * ((1.0 - esin) / (1.0 + esin)).powf(self.e / 2.0)).atan();
            let converged = (next - lat).abs() < TOLERANCE;
            lat = next;
            if converged {
                break;
            }
        }

        let lon = self.lon0 + theta / self.n;

        (lon * to_deg, lat * to_deg)
    }

    /// Cone constant.
    pub fn cone_constant(&self) -> f64 {
        self.n
    }
}

fn m(e: f64, lat: f64) -> f64 {
    let esin = e * lat.sin();
    lat.cos() / (1.0 - esin * esin).sqrt()
}

fn t(e: f64, lat: f64) -> f64 {
    let esin = e * lat.sin();
    (FRAC_PI_4 - lat / 2.0).tan() / ((1.0 - esin) / (1.0 + esin)).powf(e / 2.0)
}
