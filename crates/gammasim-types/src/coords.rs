//! Spherical sky coordinates.
//!
//! All angles are in degrees. Longitudes are normalised to `[0, 360)`,
//! latitudes lie in `[-90, 90]`. The frame (celestial or galactic) is a
//! property of the surrounding geometry, not of the coordinate itself.

use serde::{Deserialize, Serialize};

/// A position on the sky.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    /// Longitude in degrees (right ascension or galactic longitude).
    pub lon: f64,
    /// Latitude in degrees (declination or galactic latitude).
    pub lat: f64,
}

impl SkyCoord {
    /// Create a coordinate, wrapping the longitude into `[0, 360)`.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon: wrap_longitude(lon),
            lat,
        }
    }

    /// Great-circle separation to `other`, in degrees.
    ///
    /// Uses the Vincenty formula, which stays accurate for both tiny and
    /// antipodal separations.
    pub fn separation(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlon = (other.lon - self.lon).to_radians();

        let num1 = lat2.cos() * dlon.sin();
        let num2 = lat1.cos().mul_add(lat2.sin(), -(lat1.sin() * lat2.cos() * dlon.cos()));
        let denominator = lat1.sin().mul_add(lat2.sin(), lat1.cos() * lat2.cos() * dlon.cos());

        num1.hypot(num2).atan2(denominator).to_degrees()
    }

    /// Position angle of `other` as seen from this coordinate, in degrees
    /// east of north, in `[0, 360)`.
    pub fn position_angle(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlon = (other.lon - self.lon).to_radians();

        let x = dlon.sin() * lat2.cos();
        let y = lat1.cos().mul_add(lat2.sin(), -(lat1.sin() * lat2.cos() * dlon.cos()));

        wrap_longitude(x.atan2(y).to_degrees())
    }

    /// The coordinate reached by moving `separation` degrees along the
    /// great circle leaving this point at `position_angle` degrees east of
    /// north.
    pub fn offset_by(&self, position_angle: f64, separation: f64) -> Self {
        let lat1 = self.lat.to_radians();
        let pa = position_angle.to_radians();
        let sep = separation.to_radians();

        let sin_lat2 = lat1.sin().mul_add(sep.cos(), lat1.cos() * sep.sin() * pa.cos());
        let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

        let dlon = (pa.sin() * sep.sin() * lat1.cos())
            .atan2(lat1.sin().mul_add(-sin_lat2, sep.cos()));

        Self::new(self.lon + dlon.to_degrees(), lat2.to_degrees())
    }
}

/// Wrap a longitude in degrees into `[0, 360)`.
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = lon.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed longitude difference `lon - reference`, wrapped into `(-180, 180]`.
pub fn longitude_difference(lon: f64, reference: f64) -> f64 {
    let diff = wrap_longitude(lon - reference);
    if diff > 180.0 { diff - 360.0 } else { diff }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn longitude_wraps_into_range() {
        assert!(close(SkyCoord::new(-10.0, 0.0).lon, 350.0));
        assert!(close(SkyCoord::new(370.0, 0.0).lon, 10.0));
        assert!(close(wrap_longitude(-1e-20), 0.0));
    }

    #[test]
    fn separation_along_equator() {
        let a = SkyCoord::new(10.0, 0.0);
        let b = SkyCoord::new(13.0, 0.0);
        assert!(close(a.separation(&b), 3.0));
    }

    #[test]
    fn separation_across_zero_longitude() {
        let a = SkyCoord::new(359.0, 0.0);
        let b = SkyCoord::new(1.0, 0.0);
        assert!(close(a.separation(&b), 2.0));
    }

    #[test]
    fn position_angle_cardinal_directions() {
        let origin = SkyCoord::new(83.6, 22.0);
        let north = SkyCoord::new(83.6, 23.0);
        let east = origin.offset_by(90.0, 0.5);
        assert!(close(origin.position_angle(&north), 0.0));
        assert!((origin.position_angle(&east) - 90.0).abs() < 1e-6);
    }

    #[test]
    fn offset_by_inverts_separation_and_angle() {
        let origin = SkyCoord::new(266.4, -28.9);
        for &(pa, sep) in &[(0.0, 0.1), (45.0, 1.2), (200.0, 0.01), (315.0, 2.5)] {
            let moved = origin.offset_by(pa, sep);
            assert!((origin.separation(&moved) - sep).abs() < 1e-9);
            assert!((origin.position_angle(&moved) - pa).abs() < 1e-6);
        }
    }

    #[test]
    fn longitude_difference_is_signed() {
        assert!(close(longitude_difference(1.0, 359.0), 2.0));
        assert!(close(longitude_difference(359.0, 1.0), -2.0));
    }
}
