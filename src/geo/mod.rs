//! Great-circle math shared by the nearby-community search.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two latitude/longitude points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Approximate degree window around a point, used to prefilter rows in SQL
/// before the exact distance check. 1 degree of latitude is roughly 111 km.
pub fn bounding_box(lat: f64, lon: f64, radius_km: f64) -> (f64, f64) {
    let lat_range = radius_km / 111.0;
    let lon_range = radius_km / (111.0 * lat.to_radians().cos().abs().max(1e-6));
    (lat_range, lon_range)
}

/// A community with no radius (or a zero one) is reachable within the default.
pub fn effective_radius_km(radius_km: Option<f64>, default_km: f64) -> f64 {
    match radius_km {
        Some(r) if r > 0.0 => r,
        _ => default_km,
    }
}

pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero_distance() {
        assert_eq!(haversine_km(40.7128, -74.0060, 40.7128, -74.0060), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = haversine_km(40.7128, -74.0060, 51.5074, -0.1278);
        let b = haversine_km(51.5074, -0.1278, 40.7128, -74.0060);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn known_distance_new_york_to_london() {
        // NYC to London is roughly 5570 km.
        let d = haversine_km(40.7128, -74.0060, 51.5074, -0.1278);
        assert!((d - 5570.0).abs() < 20.0, "got {}", d);
    }

    #[test]
    fn antipodal_points_do_not_blow_up() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        // Half the Earth's circumference.
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1.0);
    }

    #[test]
    fn missing_or_zero_radius_falls_back_to_default() {
        assert_eq!(effective_radius_km(None, 10.0), 10.0);
        assert_eq!(effective_radius_km(Some(0.0), 10.0), 10.0);
        assert_eq!(effective_radius_km(Some(-3.0), 10.0), 10.0);
        assert_eq!(effective_radius_km(Some(2.5), 10.0), 2.5);
    }

    #[test]
    fn coordinate_validation() {
        assert!(is_valid_coordinate(40.7128, -74.0060));
        assert!(is_valid_coordinate(-90.0, 180.0));
        assert!(!is_valid_coordinate(90.5, 0.0));
        assert!(!is_valid_coordinate(0.0, -180.5));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
    }
}
