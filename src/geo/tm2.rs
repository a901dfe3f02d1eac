//! TWD97 TM2 (EPSG:3826) → WGS84 inverse Transverse Mercator.
//!
//! Uses the series expansion from Snyder, "Map Projections: A Working
//! Manual" (USGS PP 1395), eq. 8-18 to 8-25, on the GRS80 ellipsoid. TWD97
//! and WGS84 agree to well under a metre, so no datum shift is applied.
//! Accuracy is sub-metre across the TM2 zone, far tighter than the
//! bounding-box gate that consumes it.

/// GRS80 semi-major axis (m)
const A: f64 = 6_378_137.0;

/// GRS80 flattening
const F: f64 = 1.0 / 298.257_222_101;

/// Central meridian of zone 121 (degrees)
const LON0_DEG: f64 = 121.0;

const K0: f64 = 0.9999;

const FALSE_EASTING: f64 = 250_000.0;

const FALSE_NORTHING: f64 = 0.0;

/// Convert a TM2 `(easting, northing)` pair in metres to `(lng, lat)` in degrees.
///
/// Returns `None` when the series produces a non-finite value.
pub fn tm2_to_wgs84(easting: f64, northing: f64) -> Option<(f64, f64)> {
    let e2 = F * (2.0 - F);
    let ep2 = e2 / (1.0 - e2);
    let sqrt_1_e2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);

    // Footpoint latitude from the rectifying latitude
    let m = (northing - FALSE_NORTHING) / K0;
    let mu = m / (A * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = phi1.sin_cos();
    let tan1 = phi1.tan();
    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let denom = 1.0 - e2 * sin1 * sin1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - e2) / denom.powf(1.5);
    let d = (easting - FALSE_EASTING) / (n1 * K0);

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lon = LON0_DEG.to_radians()
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / cos1;

    let (lng, lat) = (lon.to_degrees(), lat.to_degrees());
    (lng.is_finite() && lat.is_finite()).then_some((lng, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64), tol: f64) {
        assert!(
            (actual.0 - expected.0).abs() < tol && (actual.1 - expected.1).abs() < tol,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn test_central_meridian_maps_to_121() {
        let (lng, _) = tm2_to_wgs84(250_000.0, 2_700_000.0).unwrap();
        assert!((lng - 121.0).abs() < 1e-12);
    }

    #[test]
    fn test_origin_maps_to_equator() {
        assert_close(tm2_to_wgs84(250_000.0, 0.0).unwrap(), (121.0, 0.0), 1e-9);
    }

    #[test]
    fn test_taipei_main_station() {
        // Roughly Taipei Main Station
        assert_close(
            tm2_to_wgs84(302_000.0, 2_770_000.0).unwrap(),
            (121.515_308, 25.037_228),
            1e-5,
        );
    }

    #[test]
    fn test_kaohsiung_area() {
        let (lng, lat) = tm2_to_wgs84(180_000.0, 2_500_000.0).unwrap();
        assert!((120.2..120.4).contains(&lng), "lng {lng}");
        assert!((22.5..22.7).contains(&lat), "lat {lat}");
    }

    #[test]
    fn test_non_finite_input_yields_none() {
        assert!(tm2_to_wgs84(f64::NAN, 2_700_000.0).is_none());
        assert!(tm2_to_wgs84(250_000.0, f64::INFINITY).is_none());
    }
}
