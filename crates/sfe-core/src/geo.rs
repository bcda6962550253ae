//! GPS helpers: great-circle distance and check-in radius tests.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius (IUGG), in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Default check-in radius around a customer location, in meters.
pub const DEFAULT_CHECKIN_RADIUS_M: f64 = 200.0;

/// A WGS 84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub lat: f64,
  pub lng: f64,
}

impl GeoPoint {
  pub fn new(lat: f64, lng: f64) -> Result<Self> {
    let point = Self { lat, lng };
    point.validate()?;
    Ok(point)
  }

  pub fn validate(&self) -> Result<()> {
    let ok = self.lat.is_finite()
      && self.lng.is_finite()
      && (-90.0..=90.0).contains(&self.lat)
      && (-180.0..=180.0).contains(&self.lng);
    if ok {
      Ok(())
    } else {
      Err(Error::InvalidCoordinates { lat: self.lat, lng: self.lng })
    }
  }
}

/// Great-circle distance between `a` and `b` in meters (Haversine).
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
  let lat1 = a.lat.to_radians();
  let lat2 = b.lat.to_radians();
  let d_lat = (b.lat - a.lat).to_radians();
  let d_lng = (b.lng - a.lng).to_radians();

  let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
  // Rounding can push `h` a hair past 1 for antipodal points.
  let c = 2.0 * h.sqrt().min(1.0).asin();

  EARTH_RADIUS_M * c
}

pub fn within_radius(a: GeoPoint, b: GeoPoint, radius_m: f64) -> bool {
  haversine_m(a, b) <= radius_m
}

/// Result of comparing a reported position with a customer location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proximity {
  pub distance_m:    f64,
  pub radius_m:      f64,
  pub within_radius: bool,
}

impl Proximity {
  pub fn measure(from: GeoPoint, to: GeoPoint, radius_m: f64) -> Self {
    let distance_m = haversine_m(from, to);
    Self { distance_m, radius_m, within_radius: distance_m <= radius_m }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pt(lat: f64, lng: f64) -> GeoPoint { GeoPoint { lat, lng } }

  #[test]
  fn zero_distance_to_self() {
    let p = pt(13.7563, 100.5018);
    assert_eq!(haversine_m(p, p), 0.0);
  }

  #[test]
  fn bangkok_to_chiang_mai() {
    // Roughly 580 km as the crow flies.
    let bkk = pt(13.7563, 100.5018);
    let cnx = pt(18.7883, 98.9853);
    let d = haversine_m(bkk, cnx);
    assert!((575_000.0..590_000.0).contains(&d), "distance {d}");
    assert!((haversine_m(cnx, bkk) - d).abs() < 1e-6);
  }

  #[test]
  fn one_degree_of_longitude_at_equator() {
    let d = haversine_m(pt(0.0, 0.0), pt(0.0, 1.0));
    assert!((d - 111_195.0).abs() < 10.0, "distance {d}");
  }

  #[test]
  fn antipodes_do_not_produce_nan() {
    let d = haversine_m(pt(0.0, 0.0), pt(0.0, 180.0));
    assert!(d.is_finite());
    assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
  }

  #[test]
  fn radius_boundary() {
    let shop = pt(13.7563, 100.5018);
    // ~111 m north.
    let near = pt(13.7573, 100.5018);
    assert!(within_radius(shop, near, DEFAULT_CHECKIN_RADIUS_M));
    assert!(!within_radius(shop, near, 100.0));
    let p = Proximity::measure(near, shop, 100.0);
    assert!(!p.within_radius);
    assert!(p.distance_m > 100.0);
  }

  #[test]
  fn coordinate_validation() {
    assert!(GeoPoint::new(91.0, 0.0).is_err());
    assert!(GeoPoint::new(0.0, -180.5).is_err());
    assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    assert!(GeoPoint::new(-90.0, 180.0).is_ok());
  }
}
