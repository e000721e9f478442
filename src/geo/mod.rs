use crate::models::courier::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    // Rounding can push this a hair outside [0, 1] for identical or antipodal points.
    let haversine = (sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng).clamp(0.0, 1.0);
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Range sanity only: finite, lat within -90..=90, lng within -180..=180.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{haversine_km, is_valid_coordinate};
    use crate::models::courier::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: -6.2088,
            lng: 106.8456,
        };
        let distance = haversine_km(&p, &p);
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let a = GeoPoint { lat: 0.0, lng: 0.0 };
        let b = GeoPoint { lat: 0.0, lng: 180.0 };
        let distance = haversine_km(&a, &b);
        assert!(distance.is_finite());
        assert!((distance - std::f64::consts::PI * 6_371.0).abs() < 1e-6);

        let north = GeoPoint { lat: 90.0, lng: 0.0 };
        let south = GeoPoint { lat: -90.0, lng: 0.0 };
        assert!(haversine_km(&north, &south).is_finite());
    }

    #[rstest]
    #[case(-6.2088, 106.8456, -6.1751, 106.8650)]
    #[case(51.5074, -0.1278, 40.7128, -74.0060)]
    #[case(-33.8688, 151.2093, 35.6762, 139.6503)]
    #[case(89.9, -179.9, -89.9, 179.9)]
    fn distance_is_symmetric(#[case] lat1: f64, #[case] lng1: f64, #[case] lat2: f64, #[case] lng2: f64) {
        let a = GeoPoint { lat: lat1, lng: lng1 };
        let b = GeoPoint { lat: lat2, lng: lng2 };
        assert!((haversine_km(&a, &b) - haversine_km(&b, &a)).abs() < 1e-9);
    }

    #[rstest]
    #[case(0.0, 0.0, true)]
    #[case(90.0, 180.0, true)]
    #[case(-90.0, -180.0, true)]
    #[case(90.1, 0.0, false)]
    #[case(0.0, -180.5, false)]
    #[case(f64::NAN, 0.0, false)]
    fn coordinate_range_sanity(#[case] lat: f64, #[case] lng: f64, #[case] expected: bool) {
        assert_eq!(is_valid_coordinate(lat, lng), expected);
    }
}
