// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! 3D pose: a position and an orientation quaternion, in double precision.

use nalgebra::{Quaternion, Translation3, UnitQuaternion};
use std::fmt;

use crate::misc::type_aliases::{Iso3d, Vec3d};

/// Position and orientation of a camera (or any frame of reference).
///
/// The orientation quaternion is stored as given, it is not normalized.
/// Use `is_valid` / `to_isometry` before using a pose as a transformation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pose3D {
    /// Position (x, y, z).
    pub position: Vec3d,
    /// Orientation quaternion, `coords` ordered as (x, y, z, w).
    pub orientation: Quaternion<f64>,
}

/// Poses of a sequence of cameras.
pub type PosesSequence = Vec<Pose3D>;

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose3D {
    /// Pose at the origin, with no rotation.
    pub fn identity() -> Self {
        Self {
            position: Vec3d::zeros(),
            orientation: Quaternion::identity(),
        }
    }

    /// Build a pose from position and orientation components.
    /// The quaternion is given in (x, y, z, w) order.
    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        let [qx, qy, qz, qw] = orientation;
        Self {
            position: Vec3d::new(position[0], position[1], position[2]),
            orientation: Quaternion::new(qw, qx, qy, qz),
        }
    }

    /// Pure translation.
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new([x, y, z], [0.0, 0.0, 0.0, 1.0])
    }

    /// Convert a rigid body motion into a pose.
    pub fn from_isometry(iso: &Iso3d) -> Self {
        Self {
            position: iso.translation.vector,
            orientation: iso.rotation.into_inner(),
        }
    }

    /// Rigid body motion described by this pose:
    /// rotate by the orientation, then translate by the position.
    ///
    /// Returns `None` for an invalid pose (see `is_valid`).
    pub fn to_isometry(&self) -> Option<Iso3d> {
        if self.is_valid() {
            let rotation = UnitQuaternion::from_quaternion(self.orientation);
            Some(Iso3d::from_parts(Translation3::from(self.position), rotation))
        } else {
            None
        }
    }

    /// A pose is valid if all its components are finite
    /// and the orientation quaternion has a non-zero norm.
    pub fn is_valid(&self) -> bool {
        self.position.iter().all(|x| x.is_finite())
            && self.orientation.coords.iter().all(|x| x.is_finite())
            && self.orientation.norm_squared() > std::f64::EPSILON
    }

    /// Returns true if at least one quaternion component is strictly positive.
    pub fn has_positive_orientation_component(&self) -> bool {
        self.orientation.coords.iter().any(|&c| c > 0.0)
    }

    /// Returns true if the orientation norm is within `tolerance` of 1.
    pub fn has_unit_orientation(&self, tolerance: f64) -> bool {
        (self.orientation.norm() - 1.0).abs() <= tolerance
    }

    /// Inverse transformation. `None` if the pose is invalid.
    pub fn inverse(&self) -> Option<Self> {
        self.to_isometry().map(|iso| Self::from_isometry(&iso.inverse()))
    }

    /// Composition `self * other`: first apply `other`, then `self`.
    /// `None` if one of the poses is invalid.
    pub fn compose(&self, other: &Self) -> Option<Self> {
        let a = self.to_isometry()?;
        let b = other.to_isometry()?;
        Some(Self::from_isometry(&(a * b)))
    }

    /// Components in the TUM trajectory order `tx ty tz qx qy qz qw`.
    pub fn to_array(&self) -> [f64; 7] {
        let t = self.position;
        let q = self.orientation.coords;
        [t.x, t.y, t.z, q.x, q.y, q.z, q.w]
    }
}

impl fmt::Display for Pose3D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [x, y, z, qx, qy, qz, qw] = self.to_array();
        write!(
            f,
            "position ({}, {}, {}) orientation ({}, {}, {}, {})",
            x, y, z, qx, qy, qz, qw
        )
    }
}

// TESTS #############################################################
