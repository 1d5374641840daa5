//! Canonical ordering of work-area corners.
//!
//! The reference corner goes first; the rest follow in ascending
//! `atan2(Δlat, Δlng)` about it. Sample generation, predictor requests and
//! the fallback placement all consume corners in this order, so the exact
//! angle formula must not change.

use std::cmp::Ordering;

use crate::GeoPoint;

/// Sort key of `point` about `reference`: `atan2(Δlat, Δlng)` in radians.
pub fn polar_angle(reference: &GeoPoint, point: &GeoPoint) -> f64 {
    (point.lat - reference.lat).atan2(point.lng - reference.lng)
}

/// Reorder `points` so that `points[reference_index]` comes first and the
/// remaining points follow by ascending polar angle about it.
///
/// `reference_index` is clamped into range. The output is always a
/// permutation of the input; an empty input yields an empty output.
///
/// # Example
/// ```
/// use construction_templates::{reorder_points_for_ai, GeoPoint};
///
/// let corners = vec![
///     GeoPoint::new(0.0, 0.0),
///     GeoPoint::new(1.0, 1.0),
///     GeoPoint::new(0.0, 1.0),
///     GeoPoint::new(1.0, 0.0),
/// ];
/// let ordered = reorder_points_for_ai(&corners, 0);
/// assert_eq!(ordered[0], corners[0]);
/// assert_eq!(ordered[1], GeoPoint::new(0.0, 1.0));
/// ```
pub fn reorder_points_for_ai(points: &[GeoPoint], reference_index: usize) -> Vec<GeoPoint> {
    if points.is_empty() {
        return Vec::new();
    }
    let reference_index = reference_index.min(points.len() - 1);
    let reference = points[reference_index];

    let mut rest: Vec<(f64, GeoPoint)> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != reference_index)
        .map(|(_, p)| (polar_angle(&reference, p), *p))
        .collect();

    // Stable, so ties keep input order
    rest.sort_by(|a, b| compare_angles(a.0, b.0));

    let mut ordered = Vec::with_capacity(points.len());
    ordered.push(reference);
    ordered.extend(rest.into_iter().map(|(_, p)| p));
    ordered
}

/// [`reorder_points_for_ai`] on `[lat, lng]` pairs, the layout the
/// predictor exchanges.
pub fn reorder_pairs(pairs: &[[f64; 2]], reference_index: usize) -> Vec<[f64; 2]> {
    let points: Vec<GeoPoint> = pairs.iter().copied().map(GeoPoint::from).collect();
    reorder_points_for_ai(&points, reference_index)
        .into_iter()
        .map(GeoPoint::to_pair)
        .collect()
}

fn compare_angles(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn square() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(49.8000, -97.0800),
            GeoPoint::new(49.8002, -97.0800),
            GeoPoint::new(49.8002, -97.0797),
            GeoPoint::new(49.8000, -97.0797),
        ]
    }

    fn is_permutation(a: &[GeoPoint], b: &[GeoPoint]) -> bool {
        let key = |p: &GeoPoint| (p.lat.to_bits(), p.lng.to_bits());
        let mut a: Vec<_> = a.iter().map(key).collect();
        let mut b: Vec<_> = b.iter().map(key).collect();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    #[test]
    fn test_reference_first_then_ascending_angle() {
        let points = square();
        for index in 0..points.len() {
            let ordered = reorder_points_for_ai(&points, index);
            assert_eq!(ordered[0], points[index]);
            assert!(is_permutation(&ordered, &points));

            let angles: Vec<f64> = ordered[1..]
                .iter()
                .map(|p| polar_angle(&ordered[0], p))
                .collect();
            assert!(angles.windows(2).all(|w| w[0] <= w[1]), "{:?}", angles);
        }
    }

    #[test]
    fn test_known_order() {
        // From the south-west corner: east (0), north-east (~0.59 rad), north (pi/2)
        let ordered = reorder_points_for_ai(&square(), 0);
        assert_eq!(ordered[1], GeoPoint::new(49.8000, -97.0797));
        assert_eq!(ordered[2], GeoPoint::new(49.8002, -97.0797));
        assert_eq!(ordered[3], GeoPoint::new(49.8002, -97.0800));
    }

    #[test]
    fn test_click_order_independent() {
        let points = square();
        let reference = points[2];
        let expected = reorder_points_for_ai(&points, 2);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut shuffled = points.clone();
            shuffled.shuffle(&mut rng);
            let index = shuffled.iter().position(|p| *p == reference).unwrap();
            assert_eq!(reorder_points_for_ai(&shuffled, index), expected);
        }
    }

    #[test]
    fn test_random_inputs_are_permutations() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let points: Vec<GeoPoint> = (0..4)
                .map(|_| GeoPoint::new(rng.gen_range(-60.0..60.0), rng.gen_range(-170.0..170.0)))
                .collect();
            let index = rng.gen_range(0..4);
            let ordered = reorder_points_for_ai(&points, index);

            assert_eq!(ordered.len(), 4);
            assert_eq!(ordered[0], points[index]);
            assert!(is_permutation(&ordered, &points));
        }
    }

    #[test]
    fn test_duplicate_points() {
        let p = GeoPoint::new(1.0, 1.0);
        let points = vec![p, p, GeoPoint::new(2.0, 1.0), p];
        let ordered = reorder_points_for_ai(&points, 1);
        assert!(is_permutation(&ordered, &points));
    }

    #[test]
    fn test_index_clamped() {
        let points = square();
        assert_eq!(reorder_points_for_ai(&points, 99)[0], points[3]);
        assert!(reorder_points_for_ai(&[], 0).is_empty());
        assert_eq!(reorder_points_for_ai(&points[..1], 5), vec![points[0]]);
    }

    #[test]
    fn test_pairs() {
        let pairs: Vec<[f64; 2]> = square().into_iter().map(GeoPoint::to_pair).collect();
        let ordered = reorder_pairs(&pairs, 0);
        assert_eq!(ordered[0], pairs[0]);
        assert_eq!(ordered[1], [49.8000, -97.0797]);
    }
}
