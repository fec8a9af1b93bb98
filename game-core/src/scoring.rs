//! Distance and round scoring.
//!
//! A round score is the sum of a distance component and a year
//! component (each worth up to 497.5 points, decaying linearly) plus a
//! speed bonus of at most 5 points that only ever breaks ties.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance at which the distance component reaches zero, roughly half
/// Earth's circumference.
pub const MAX_DISTANCE_KM: f64 = 20_000.0;

/// Year error at which the year component reaches zero.
pub const MAX_YEAR_ERROR: f64 = 2_000.0;

pub const ROUND_LENGTH_SECONDS: f64 = 30.0;

/// Flat penalty applied by the coordinator when an answer arrives with
/// no time remaining. Scores may go negative.
pub const TIMEOUT_PENALTY: i32 = 50;

/// Great-circle distance in kilometers between two points given in
/// degrees, via the haversine formula.
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // rounding can push a past 1.0 at antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Composite round score for a standard 30-second round.
pub fn round_score(distance_km: f64, year_error: i32, time_left: f64) -> i32 {
    round_score_with_round_length(distance_km, year_error, time_left, ROUND_LENGTH_SECONDS)
}

pub fn round_score_with_round_length(
    distance_km: f64,
    year_error: i32,
    time_left: f64,
    round_length: f64,
) -> i32 {
    let distance_score = (497.5 * (1.0 - distance_km / MAX_DISTANCE_KM)).max(0.0);
    let year_score = (497.5 * (1.0 - (year_error.abs() as f64) / MAX_YEAR_ERROR)).max(0.0);
    let speed_bonus = (5.0 * (time_left / round_length)).max(0.0);

    (distance_score + year_score + speed_bonus).round() as i32
}
