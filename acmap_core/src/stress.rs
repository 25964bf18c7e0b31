//! Distance-residual ("stress") model.
//!
//! Table distance is `column_basis - log_titer`; the residual keeps its sign
//! (negative = map too close, positive = map too far) and thresholded titers
//! clamp the side consistent with their inequality to zero.

use crate::titer::Titer;

/// Which side of the table distance the map landed on, used to pick the
/// error-line highlight color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualSide {
    TooClose,
    TooFar,
}

pub fn map_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Distance implied by the table, or `None` for a non-detectable cell.
pub fn table_distance(titer: Titer, column_basis: f64) -> Option<f64> {
    titer.log_titer().map(|log| column_basis - log)
}

/// Signed residual for one pair. A `<` titer only penalizes a map distance
/// below the table distance; a `>` titer only one above it.
pub fn residual(map_dist: f64, titer: Titer, column_basis: f64) -> Option<f64> {
    let table = table_distance(titer, column_basis)?;
    let raw = map_dist - table;
    match titer {
        Titer::Measured(_) => Some(raw),
        Titer::LessThan(_) => Some(raw.min(0.0)),
        Titer::MoreThan(_) => Some(raw.max(0.0)),
        Titer::NotTested => None,
    }
}

pub fn residual_side(residual: f64) -> Option<ResidualSide> {
    if residual < 0.0 {
        Some(ResidualSide::TooClose)
    } else if residual > 0.0 {
        Some(ResidualSide::TooFar)
    } else {
        None
    }
}

/// Stress contribution of one pair: squared residual, 0 for `*` cells.
pub fn pair_stress(map_dist: f64, titer: Titer, column_basis: f64) -> f64 {
    match residual(map_dist, titer, column_basis) {
        Some(r) => r * r,
        None => 0.0,
    }
}

#[cfg(test)]
mod stress_tests {
    use super::*;

    #[test]
    fn worked_example_from_the_data_sheet() {
        // Antigen at (0,0), serum at (3,0), column basis 8, log titer 5:
        // table distance 3, map distance 3, residual 0.
        let titer = Titer::Measured(5.0);
        assert_eq!(table_distance(titer, 8.0), Some(3.0));
        let dist = map_distance([0.0, 0.0, 0.0], [3.0, 0.0, 0.0]);
        assert_eq!(residual(dist, titer, 8.0), Some(0.0));
        assert_eq!(pair_stress(dist, titer, 8.0), 0.0);

        // Serum moved to (5,0): residual +2, stress 4.
        let moved = map_distance([0.0, 0.0, 0.0], [5.0, 0.0, 0.0]);
        assert_eq!(residual(moved, titer, 8.0), Some(2.0));
        assert_eq!(pair_stress(moved, titer, 8.0), 4.0);
    }

    #[test]
    fn residual_sign_distinguishes_close_from_far() {
        let titer = Titer::Measured(5.0);
        let near = residual(1.0, titer, 8.0).expect("residual");
        let far = residual(5.0, titer, 8.0).expect("residual");
        assert_eq!(residual_side(near), Some(ResidualSide::TooClose));
        assert_eq!(residual_side(far), Some(ResidualSide::TooFar));
    }

    #[test]
    fn less_than_titer_is_one_sided() {
        // <N means the true distance exceeds the table distance: once the
        // map distance is past it there is no penalty.
        let titer = Titer::LessThan(5.0);
        assert_eq!(residual(4.0, titer, 8.0), Some(0.0));
        assert_eq!(pair_stress(4.0, titer, 8.0), 0.0);
        assert_eq!(residual(2.0, titer, 8.0), Some(-1.0));
        assert_eq!(pair_stress(2.0, titer, 8.0), 1.0);
    }

    #[test]
    fn more_than_titer_is_the_mirror() {
        let titer = Titer::MoreThan(5.0);
        assert_eq!(residual(2.0, titer, 8.0), Some(0.0));
        assert_eq!(residual(4.0, titer, 8.0), Some(1.0));
        assert_eq!(pair_stress(4.0, titer, 8.0), 1.0);
    }

    #[test]
    fn not_tested_contributes_nothing_anywhere() {
        assert_eq!(table_distance(Titer::NotTested, 8.0), None);
        assert_eq!(residual(123.0, Titer::NotTested, 8.0), None);
        assert_eq!(pair_stress(123.0, Titer::NotTested, 8.0), 0.0);
    }
}
