// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Point cloud: ordered 3D points, possibly with NaN placeholders.

use crate::misc::helper::is_valid_point3;
use crate::misc::type_aliases::Point3;

/// Ordered set of 3D points.
///
/// Ordering matters: producers like triangulation emit one point per
/// input correspondence, so the index of a point identifies its origin.
/// A point with a NaN coordinate means "no value at this index".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    /// Points, NaN placeholders included.
    pub points: Vec<Point3>,
    /// Acquisition time in microseconds.
    pub timestamp: i64,
}

impl PointCloud {
    /// Empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloud owning the given points.
    pub fn from_points(points: Vec<Point3>) -> Self {
        Self {
            points,
            timestamp: 0,
        }
    }

    /// Number of points, NaN placeholders included.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the cloud has no point at all.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at a given index if it exists and is valid.
    pub fn valid_point(&self, index: usize) -> Option<&Point3> {
        self.points.get(index).filter(|p| is_valid_point3(p))
    }

    /// Iterator over the points without NaN coordinates.
    pub fn valid_points(&self) -> impl Iterator<Item = &Point3> + '_ {
        self.points.iter().filter(|p| is_valid_point3(p))
    }

    /// Number of points without NaN coordinates.
    pub fn number_of_valid_points(&self) -> usize {
        self.valid_points().count()
    }

    /// Copy of this cloud without its NaN placeholders.
    pub fn without_invalid_points(&self) -> Self {
        Self {
            points: self.valid_points().cloned().collect(),
            timestamp: self.timestamp,
        }
    }
}

// TESTS #############################################################
