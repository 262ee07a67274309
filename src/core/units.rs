pub const WATTS_PER_KILOWATT: u32 = 1_000;

/// Round to the given number of decimal places, halves away from zero.
///
/// Matches the presentation precision used for published demand and yield
/// figures (two places for kWh, one for percentage proportions).
pub fn round_half_up(value: f64, decimal_places: u32) -> f64 {
    let scale = 10f64.powi(decimal_places as i32);
    (value * scale).round() / scale
}
