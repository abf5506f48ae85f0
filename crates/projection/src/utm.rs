//! Transverse Mercator projection (UTM zones).
//!
//! Sentinel-2 L2A tiles are gridded in WGS84 / UTM. The forward and inverse
//! mappings use Krüger's series in the third flattening, truncated at n³,
//! which stays well below a millimetre within a zone.

use std::f64::consts::PI;

use crate::Ellipsoid;

/// UTM scale factor on the central meridian.
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500000.0;
const FALSE_NORTHING_SOUTH: f64 = 10000000.0;

#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian in radians
    pub lon0: f64,
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    e: f64,
    /// Rectifying radius
    big_a: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl TransverseMercator {
    pub fn new(
        ellipsoid: Ellipsoid,
        lon0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let n = ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;

        let big_a = ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
            n2 / 48.0 + n3 / 15.0,
            17.0 * n3 / 480.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
            56.0 * n3 / 15.0,
        ];

        Self {
            lon0: lon0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            e: ellipsoid.e(),
            big_a,
            alpha,
            beta,
            delta,
        }
    }

    /// WGS84 / UTM zone `zone` (1-60), northern or southern hemisphere.
    pub fn utm(zone: u8, north: bool) -> Self {
        let lon0 = -183.0 + 6.0 * zone as f64;
        let false_northing = if north { 0.0 } else { FALSE_NORTHING_SOUTH };
        Self::new(Ellipsoid::WGS84, lon0, K0, FALSE_EASTING, false_northing)
    }

    /// Project (lon, lat) degrees to (easting, northing) meters.
    pub fn project(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let mut dlon = lon_deg.to_radians() - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        // Conformal latitude, expressed through its tangent
        let sin_lat = lat.sin();
        let tau = (sin_lat.atanh() - self.e * (self.e * sin_lat).atanh()).sinh();

        let xi_prime = tau.atan2(dlon.cos());
        let eta_prime = (dlon.sin() / (1.0 + tau * tau).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += a * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += a * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let easting = self.false_easting + self.k0 * self.big_a * eta;
        let northing = self.false_northing + self.k0 * self.big_a * xi;

        (easting, northing)
    }

    /// Inverse projection: (easting, northing) meters to (lon, lat) degrees.
    pub fn unproject(&self, easting: f64, northing: f64) -> (f64, f64) {
        let xi = (northing - self.false_northing) / (self.k0 * self.big_a);
        let eta = (easting - self.false_easting) / (self.k0 * self.big_a);

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_prime -= b * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
        let mut lat = chi;
        for (j, d) in self.delta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            lat += d * (k * chi).sin();
        }

        let lon = self.lon0 + eta_prime.sinh().atan2(xi_prime.cos());

        (lon.to_degrees(), lat.to_degrees())
    }
}
