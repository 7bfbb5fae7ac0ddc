//! Grid arithmetic for axis-aligned fits.
//!
//! Floor and ceiling divisions used to count how many units of an item fit
//! along a container axis or under a payload ceiling.

use crate::types::Dims3;

/// Number of whole units of length `item_len` that fit into `container_len`.
///
/// Equivalent to floor division, with a relative tolerance so quotients that
/// land a hair below an integer through float rounding still count.
///
/// # Example
/// ```
/// use packfit::geometry::units_along;
///
/// assert_eq!(units_along(9750.0, 1100.0, 1e-9), 8);
/// assert_eq!(units_along(0.3, 0.1, 1e-9), 3);
/// ```
pub fn units_along(container_len: f64, item_len: f64, epsilon: f64) -> u64 {
    if item_len <= 0.0 || container_len <= 0.0 {
        return 0;
    }
    let quotient = container_len / item_len;
    // `as` saturates, so absurd ratios clamp to u64::MAX instead of wrapping.
    (quotient + epsilon * quotient.max(1.0)).floor() as u64
}

/// Per-axis unit counts of `oriented` inside `container`.
pub fn grid_counts(container: Dims3, oriented: Dims3, epsilon: f64) -> (u64, u64, u64) {
    (
        units_along(container.length, oriented.length, epsilon),
        units_along(container.width, oriented.width, epsilon),
        units_along(container.height, oriented.height, epsilon),
    )
}

/// Units that fit under a payload ceiling.
///
/// `None` when there is no ceiling or the item is weightless.
pub fn payload_units(payload_capacity: Option<f64>, unit_weight: f64, epsilon: f64) -> Option<u64> {
    let payload_capacity = payload_capacity?;
    if unit_weight <= 0.0 {
        return None;
    }
    if payload_capacity <= 0.0 {
        return Some(0);
    }
    Some(units_along(payload_capacity, unit_weight, epsilon))
}

/// Ceiling division, `None` when `per_unit` is zero.
pub fn ceil_div(total: u64, per_unit: u64) -> Option<u64> {
    if per_unit == 0 {
        return None;
    }
    Some(total.div_ceil(per_unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_along_floors() {
        assert_eq!(units_along(2440.0, 900.0, 1e-9), 2);
        assert_eq!(units_along(2440.0, 460.0, 1e-9), 5);
        assert_eq!(units_along(100.0, 150.0, 1e-9), 0);
        assert_eq!(units_along(100.0, 100.0, 1e-9), 1);
    }

    #[test]
    fn units_along_absorbs_rounding_noise() {
        // Both quotients land a hair below the integer.
        assert!(0.3 / 0.1 < 3.0);
        assert!(0.7 / 0.1 < 7.0);
        assert_eq!(units_along(0.3, 0.1, 1e-9), 3);
        assert_eq!(units_along(0.7, 0.1, 1e-9), 7);
        // Without tolerance the plain floor loses a unit.
        assert_eq!(units_along(0.3, 0.1, 0.0), 2);
    }

    #[test]
    fn grid_counts_per_axis() {
        let counts = grid_counts(
            Dims3::new(9750.0, 2440.0, 2440.0),
            Dims3::new(1100.0, 900.0, 460.0),
            1e-9,
        );
        assert_eq!(counts, (8, 2, 5));
    }

    #[test]
    fn payload_units_handles_zero_weight_and_capacity() {
        assert_eq!(payload_units(Some(16000.0), 18.0, 1e-9), Some(888));
        assert_eq!(payload_units(Some(16000.0), 0.0, 1e-9), None);
        assert_eq!(payload_units(Some(0.0), 18.0, 1e-9), Some(0));
        assert_eq!(payload_units(None, 18.0, 1e-9), None);
    }

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(ceil_div(1000, 83), Some(13));
        assert_eq!(ceil_div(830, 83), Some(10));
        assert_eq!(ceil_div(0, 83), Some(0));
        assert_eq!(ceil_div(10, 0), None);
    }
}
