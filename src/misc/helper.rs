// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use nalgebra::{Point2, Point3, Scalar};
use num_traits::Float;

/// A 2D point is valid when none of its coordinates is NaN.
/// Producers use NaN to say "no value at this index".
pub fn is_valid_point2<T: Float + Scalar>(point: &Point2<T>) -> bool {
    !(point.x.is_nan() || point.y.is_nan())
}

/// A 3D point is valid when none of its coordinates is NaN.
pub fn is_valid_point3<T: Float + Scalar>(point: &Point3<T>) -> bool {
    !(point.x.is_nan() || point.y.is_nan() || point.z.is_nan())
}

/// Physical slot of a circular buffer, `backward_steps` before `most_recent`.
/// Negative intermediate results wrap around.
pub fn wrap_index(most_recent: usize, backward_steps: usize, capacity: usize) -> usize {
    let capacity = capacity as isize;
    let index = (most_recent as isize - backward_steps as isize) % capacity;
    if index < 0 {
        (index + capacity) as usize
    } else {
        index as usize
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn nan_points_are_invalid() {
        assert!(is_valid_point2(&Point2::new(1.0_f32, 2.0)));
        assert!(!is_valid_point2(&Point2::new(std::f32::NAN, 2.0)));
        assert!(!is_valid_point3(&Point3::new(0.0_f32, 0.0, std::f32::NAN)));
        assert!(is_valid_point3(&Point3::new(0.0_f64, -1.0, 3.0)));
    }

    #[test]
    fn wrap_index_handles_negative_results() {
        assert_eq!(wrap_index(3, 0, 4), 3);
        assert_eq!(wrap_index(3, 3, 4), 0);
        assert_eq!(wrap_index(1, 2, 4), 3);
        assert_eq!(wrap_index(0, 3, 4), 1);
    }

    #[quickcheck_macros::quickcheck]
    fn wrap_index_stays_in_range(most_recent: u8, backward_steps: u8, capacity: u8) -> bool {
        let capacity = capacity as usize % 16 + 1;
        let most_recent = most_recent as usize % capacity;
        let backward_steps = backward_steps as usize % capacity;
        let index = wrap_index(most_recent, backward_steps, capacity);
        index < capacity && (index + backward_steps) % capacity == most_recent
    }
}
