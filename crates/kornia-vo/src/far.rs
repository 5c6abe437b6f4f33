//! Rotation estimation from points at infinity.
//!
//! A far point only moves in the image when the camera rotates, so the angle
//! between its ground direction in the key frame and in the current frame is
//! a direct measurement of yaw. Outliers are rejected by picking the angle
//! with the densest neighbourhood on the circle.

use std::f64::consts::PI;

use glam::DVec2;

/// Smallest angular distance between two angles, in `[0, π]`.
pub fn angle_dist(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(2.0 * PI);
    if d > PI {
        2.0 * PI - d
    } else {
        d
    }
}

/// Signed rotation from the key frame direction to the current direction.
///
/// Both vectors must have unit length. The sign is positive when
/// `key` has to be rotated counter clockwise to reach `curr`.
pub fn angle_of_rotation(key: DVec2, curr: DVec2) -> f64 {
    // round off can push the dot product slightly outside [-1, 1]
    let dot = curr.dot(key).clamp(-1.0, 1.0);
    let angle = dot.acos();

    if curr.x * key.y - curr.y * key.x > 0.0 {
        -angle
    } else {
        angle
    }
}

/// Densest window found by [`maximize_count_in_spread_with_run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadRun {
    /// Representative value, the element in the middle of the run.
    pub value: f64,
    /// Index of the first element of the run in the sorted data.
    pub start: usize,
    /// Number of elements in the run.
    pub length: usize,
}

/// Finds the angle with the largest number of angles within `max_spread` of it.
///
/// `data` is sorted in place. Returns `0.0` for empty input, which is not a
/// valid estimate: callers must check the inlier count.
pub fn maximize_count_in_spread(data: &mut [f64], max_spread: f64) -> f64 {
    maximize_count_in_spread_with_run(data, max_spread).map_or(0.0, |run| run.value)
}

/// Same as [`maximize_count_in_spread`] but also reports the winning run.
///
/// The data is treated as a circular sequence: a run may wrap from the end of
/// the sorted array back to its start. Among runs of equal length the one
/// with the lowest start index wins, and the returned value is the element at
/// `start + length / 2` (modulo the length of the data). A negative or NaN
/// `max_spread` is treated as zero, so every run holds at least one element.
pub fn maximize_count_in_spread_with_run(data: &mut [f64], max_spread: f64) -> Option<SpreadRun> {
    let size = data.len();
    if size == 0 {
        return None;
    }
    // f64::max ignores NaN
    let max_spread = max_spread.max(0.0);

    data.sort_unstable_by(|a, b| a.total_cmp(b));

    let mut length = 0;
    while length < size && angle_dist(data[0], data[length]) <= max_spread {
        length += 1;
    }

    let mut best_start = 0;
    let mut best_length = length;

    let mut start = 1;
    while start < size && length < size {
        // the previous window minus its first element is still valid
        length = length.saturating_sub(1);

        while length < size && angle_dist(data[start], data[(start + length) % size]) <= max_spread
        {
            length += 1;
        }

        if length > best_length {
            best_length = length;
            best_start = start;
        }
        start += 1;
    }

    Some(SpreadRun {
        value: data[(best_start + best_length / 2) % size],
        start: best_start,
        length: best_length,
    })
}

/// Result of the rotation estimate from far points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FarEstimate {
    /// Estimated key frame to current frame yaw. Meaningless when `inliers` is empty.
    pub angle: f64,
    /// Indices into the input angles which agree with `angle`.
    pub inliers: Vec<usize>,
}

impl FarEstimate {
    /// Number of inliers.
    pub fn inlier_count(&self) -> usize {
        self.inliers.len()
    }
}

/// Robustly estimates the yaw from the far point angles of one frame.
///
/// The search window is twice the inlier tolerance, so the returned angle sits
/// in the middle of the densest cluster. `scratch` is reused between frames.
pub fn estimate_far_rotation(
    angles: &[f64],
    threshold: f64,
    scratch: &mut Vec<f64>,
) -> FarEstimate {
    if angles.is_empty() {
        return FarEstimate::default();
    }
    let threshold = threshold.max(0.0);

    scratch.clear();
    scratch.extend_from_slice(angles);
    let angle = maximize_count_in_spread(scratch, 2.0 * threshold);

    let inliers = angles
        .iter()
        .enumerate()
        .filter(|(_, a)| angle_dist(**a, angle) <= threshold)
        .map(|(i, _)| i)
        .collect();

    FarEstimate { angle, inliers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_angle_dist_wraps() {
        assert_relative_eq!(angle_dist(0.1, -0.1), 0.2, epsilon = 1e-12);
        assert_relative_eq!(angle_dist(PI - 0.05, -PI + 0.05), 0.1, epsilon = 1e-12);
        assert_relative_eq!(angle_dist(0.0, PI), PI, epsilon = 1e-12);
        assert_eq!(angle_dist(1.0, 1.0), 0.0);
    }

    #[test]
    fn test_angle_of_rotation_sign() {
        let key = DVec2::new(1.0, 0.0);
        let curr = DVec2::new(0.3f64.cos(), 0.3f64.sin());
        assert_relative_eq!(angle_of_rotation(key, curr), 0.3, epsilon = 1e-12);
        assert_relative_eq!(angle_of_rotation(curr, key), -0.3, epsilon = 1e-12);
        assert_eq!(angle_of_rotation(key, key), 0.0);
    }

    #[test]
    fn test_empty_returns_sentinel() {
        let mut data: [f64; 0] = [];
        assert_eq!(maximize_count_in_spread(&mut data, 0.1), 0.0);
        assert!(maximize_count_in_spread_with_run(&mut data, 0.1).is_none());
    }

    #[test]
    fn test_two_close_one_far() {
        let mut data = [0.00, 0.01, 3.00];
        let run = maximize_count_in_spread_with_run(&mut data, 0.10).unwrap();
        assert_eq!(run.start, 0);
        assert_eq!(run.length, 2);
        assert_eq!(run.value, 0.01);
    }

    #[test]
    fn test_invalid_spread_is_zero() {
        for spread in [-0.1, f64::NAN, f64::NEG_INFINITY] {
            let mut data = [2.0, 0.0, 1.0];
            let run = maximize_count_in_spread_with_run(&mut data, spread).unwrap();
            assert_eq!(run.start, 0);
            assert_eq!(run.length, 1);
            assert_eq!(run.value, 0.0);
        }

        let mut data = [0.5, 0.5, 1.0];
        assert_eq!(maximize_count_in_spread(&mut data, -0.1), 0.5);

        let estimate = estimate_far_rotation(&[0.2, 0.2, 1.0], -0.01, &mut Vec::new());
        assert_eq!(estimate.angle, 0.2);
        assert_eq!(estimate.inliers, vec![0, 1]);
    }

    #[test]
    fn test_all_equal() {
        let mut data = [0.7; 9];
        let run = maximize_count_in_spread_with_run(&mut data, 0.0).unwrap();
        assert_eq!(run.value, 0.7);
        assert_eq!(run.length, 9);
    }

    #[test]
    fn test_all_within_spread_returns_midpoint() {
        let mut data = [0.04, 0.0, 0.03, 0.01, 0.02];
        let run = maximize_count_in_spread_with_run(&mut data, 0.1).unwrap();
        assert_eq!(run.length, 5);
        assert_eq!(run.value, 0.02);

        let mut data = [0.3, 0.1, 0.2, 0.0];
        let run = maximize_count_in_spread_with_run(&mut data, 0.5).unwrap();
        assert_eq!(run.length, 4);
        assert_eq!(run.value, 0.2);
    }

    #[test]
    fn test_permutation_invariant() {
        let base = [-1.2, 0.5, 0.52, 0.49, 2.9, -3.1, 0.51, 1.0, 0.48];
        let mut expected = base;
        let value = maximize_count_in_spread(&mut expected, 0.05);
        assert_eq!(value, 0.5);

        for shift in 1..base.len() {
            let mut rotated = base;
            rotated.rotate_left(shift);
            rotated.swap(0, base.len() - 1);
            assert_eq!(maximize_count_in_spread(&mut rotated, 0.05), value);
        }
        let mut reversed = base;
        reversed.reverse();
        assert_eq!(maximize_count_in_spread(&mut reversed, 0.05), value);
    }

    #[test]
    fn test_cluster_across_pi() {
        // cluster straddling the ±π seam, sorted to both ends of the array
        let mut data = [PI - 0.02, -PI + 0.01, 0.0, PI - 0.01, -PI + 0.02, 1.0];
        let run = maximize_count_in_spread_with_run(&mut data, 0.05).unwrap();
        assert_eq!(run.length, 4);
        assert_eq!(run.start, 4);
        assert_eq!(run.value, -PI + 0.01);
    }

    #[test]
    fn test_estimate_far_rotation() {
        let angles = [0.101, 0.1, 0.099, -0.8, 0.1005, 2.0];
        let mut scratch = Vec::new();
        let estimate = estimate_far_rotation(&angles, 0.01, &mut scratch);
        assert_relative_eq!(estimate.angle, 0.1, epsilon = 2e-3);
        assert_eq!(estimate.inliers, vec![0, 1, 2, 4]);
        assert_eq!(estimate.inlier_count(), 4);

        let estimate = estimate_far_rotation(&[], 0.01, &mut scratch);
        assert_eq!(estimate.inlier_count(), 0);
    }
}
