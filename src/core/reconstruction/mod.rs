// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reconstruction chains: from a stream of stereo pairs to
//! camera poses and a persistent map of the scene.
//!
//! A chain is fed one stereo pair at a time. Each call to `run` processes
//! the pair and publishes the camera pose with the part of the map around it.

pub mod dense_registration_from_stereo;
pub mod estimation_from_stereo;

#[cfg(test)]
pub(crate) mod synthetic;

pub use self::dense_registration_from_stereo::{
    DenseRegistrationFromStereo, DenseRegistrationFromStereoConfig,
};
pub use self::estimation_from_stereo::{EstimationFromStereo, EstimationFromStereoConfig};

use serde::{Deserialize, Serialize};

use crate::core::types::{Frame, PointCloud, Pose3D};
use crate::error::Result;

/// Tolerance on the orientation norm of `PoseValidityCheck::FiniteUnitNorm`.
pub const UNIT_NORM_TOLERANCE: f64 = 1e-3;

/// Chain turning stereo pairs into poses and a map.
pub trait Reconstruction3D {
    /// Left image of the next pair.
    fn left_image_input(&mut self, image: &Frame);

    /// Right image of the next pair.
    fn right_image_input(&mut self, image: &Frame);

    /// Process the current pair.
    ///
    /// Algorithmic failures are reported by `success_output`,
    /// errors are reserved to invalid data reaching the map.
    fn run(&mut self) -> Result<()>;

    /// Camera pose of the last successful step, in the map frame.
    fn pose_output(&self) -> &Pose3D;

    /// Map points around `pose_output`, in the camera frame.
    fn point_cloud_output(&self) -> &PointCloud;

    /// True if the last step updated the outputs.
    fn success_output(&self) -> bool;
}

/// Sanity check applied to an estimated pose before it is used.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseValidityCheck {
    /// At least one orientation component is strictly positive.
    AnyPositiveComponent,
    /// All components are finite and the orientation has unit norm.
    FiniteUnitNorm,
}

impl Default for PoseValidityCheck {
    fn default() -> Self {
        PoseValidityCheck::AnyPositiveComponent
    }
}

impl PoseValidityCheck {
    /// True if `pose` passes the check.
    pub fn accepts(self, pose: &Pose3D) -> bool {
        match self {
            PoseValidityCheck::AnyPositiveComponent => pose.has_positive_orientation_component(),
            PoseValidityCheck::FiniteUnitNorm => {
                pose.is_valid() && pose.has_unit_orientation(UNIT_NORM_TOLERANCE)
            }
        }
    }
}

// TESTS #############################################################
