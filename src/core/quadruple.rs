// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! 3D correspondences between two stereo pairs, from chains of 2D matches.
//!
//! A keypoint seen now in the left and right images, and in the past left
//! and right images, links four 2D correspondences:
//!
//! ```text
//!   now left  ──left_right──▶ now right
//!      │                          │
//!  left_time                 right_time
//!      ▼                          ▼
//!  past left ─past_left_right─▶ past right
//! ```
//!
//! Each closed chain yields one 3D correspondence between the point
//! triangulated now and the point triangulated in the past.

use serde::{Deserialize, Serialize};

use crate::core::types::{CorrespondenceMap2D, CorrespondenceMap3D, PointCloud};
use crate::misc::type_aliases::{Float, Point2};

/// How two pixel coordinates coming from different maps are compared.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PixelMatching {
    /// Bit for bit equality of the coordinates.
    Exact,
    /// Both coordinates within the given distance.
    Tolerance(Float),
}

impl Default for PixelMatching {
    fn default() -> Self {
        PixelMatching::Exact
    }
}

impl PixelMatching {
    /// True if `a` and `b` designate the same keypoint.
    pub fn same_pixel(self, a: &Point2, b: &Point2) -> bool {
        match self {
            PixelMatching::Exact => a.x == b.x && a.y == b.y,
            PixelMatching::Tolerance(eps) => (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps,
        }
    }
}

/// The four 2D correspondence maps of two stereo pairs,
/// and the keypoint clouds triangulated from their left-right maps.
#[derive(Copy, Clone, Debug)]
pub struct QuadrupleInput<'a> {
    /// Current left image to current right image.
    pub left_right: &'a CorrespondenceMap2D,
    /// Current left image to past left image.
    pub left_time: &'a CorrespondenceMap2D,
    /// Current right image to past right image.
    pub right_time: &'a CorrespondenceMap2D,
    /// Past left image to past right image.
    pub past_left_right: &'a CorrespondenceMap2D,
    /// One point per `left_right` correspondence.
    pub current_cloud: &'a PointCloud,
    /// One point per `past_left_right` correspondence.
    pub past_cloud: &'a PointCloud,
}

/// 3D correspondences, current points as source and past points as sink,
/// all with confidence 1.
///
/// Correspondences with a NaN endpoint are skipped, as are chains whose
/// 3D points are NaN or missing from the clouds.
pub fn extract_3d_correspondences(
    input: &QuadrupleInput,
    matching: PixelMatching,
) -> CorrespondenceMap3D {
    let mut output = CorrespondenceMap3D::new();
    for (current_index, lr) in input.left_right.valid() {
        for (_, lt) in input.left_time.valid() {
            if !matching.same_pixel(&lr.source, &lt.source) {
                continue;
            }
            for (_, rt) in input.right_time.valid() {
                if !matching.same_pixel(&lr.sink, &rt.source) {
                    continue;
                }
                for (past_index, past) in input.past_left_right.valid() {
                    if !matching.same_pixel(&past.source, &lt.sink)
                        || !matching.same_pixel(&past.sink, &rt.sink)
                    {
                        continue;
                    }
                    let current = input.current_cloud.valid_point(current_index);
                    let previous = input.past_cloud.valid_point(past_index);
                    if let (Some(&current), Some(&previous)) = (current, previous) {
                        output.add(current, previous, 1.0);
                    }
                }
            }
        }
    }
    output
}

// TESTS #############################################################
