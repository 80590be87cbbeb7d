// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pinhole camera model and rectified stereo rig.

use nalgebra::Affine2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::misc::type_aliases::{Float, Mat3, Point2, Point3, Vec3};

/// Intrinsic parameters of a pinhole camera.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Intrinsics {
    /// Principal point (cx, cy) in pixels.
    pub principal_point: (Float, Float),
    /// Focal length in pixels.
    pub focal_length: Float,
    /// Scaling of the focal length along x and y.
    pub scaling: (Float, Float),
    /// Skew coefficient.
    pub skew: Float,
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self {
            principal_point: (320.0, 240.0),
            focal_length: 500.0,
            scaling: (1.0, 1.0),
            skew: 0.0,
        }
    }
}

impl Intrinsics {
    /// Projection matrix in homogeneous 2D coordinates.
    pub fn matrix(&self) -> Affine2<Float> {
        #[rustfmt::skip]
        let m = Mat3::new(
            self.focal_length * self.scaling.0, self.skew, self.principal_point.0,
            0.0, self.focal_length * self.scaling.1,       self.principal_point.1,
            0.0, 0.0, 1.0,
        );
        Affine2::from_matrix_unchecked(m)
    }

    /// Homogeneous pixel coordinates of a 3D point in the camera frame.
    pub fn project(&self, point: Point3) -> Vec3 {
        Vec3::new(
            self.focal_length * self.scaling.0 * point[0]
                + self.skew * point[1]
                + self.principal_point.0 * point[2],
            self.focal_length * self.scaling.1 * point[1] + self.principal_point.1 * point[2],
            point[2],
        )
    }

    /// 3D point of the pixel `point` at a given depth.
    pub fn back_project(&self, point: Point2, depth: Float) -> Point3 {
        let z = depth;
        let y = (point[1] - self.principal_point.1) * z / (self.focal_length * self.scaling.1);
        let x = ((point[0] - self.principal_point.0) * z - self.skew * y)
            / (self.focal_length * self.scaling.0);
        Point3::new(x, y, z)
    }

    /// Check that the focal lengths are finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        let fx = self.focal_length * self.scaling.0;
        let fy = self.focal_length * self.scaling.1;
        if fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration(format!(
                "focal lengths must be positive, got ({}, {})",
                fx, fy
            )))
        }
    }
}

/// Two identical cameras, rectified, the right one `baseline`
/// away from the left one along the x axis.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoRig {
    /// Intrinsics shared by both cameras.
    pub intrinsics: Intrinsics,
    /// Distance between the two optical centers.
    pub baseline: Float,
}

impl Default for StereoRig {
    fn default() -> Self {
        Self {
            intrinsics: Intrinsics::default(),
            baseline: 1.0,
        }
    }
}

impl StereoRig {
    /// Point in the left camera frame seen at `left` with a given disparity
    /// (left x minus right x). `None` if the disparity is not strictly positive.
    pub fn point_from_disparity(&self, left: Point2, disparity: Float) -> Option<Point3> {
        if disparity > 0.0 {
            let fx = self.intrinsics.focal_length * self.intrinsics.scaling.0;
            let depth = fx * self.baseline / disparity;
            Some(self.intrinsics.back_project(left, depth))
        } else {
            None
        }
    }

    /// Disparity of a point in the left camera frame.
    pub fn disparity(&self, point: &Point3) -> Float {
        let fx = self.intrinsics.focal_length * self.intrinsics.scaling.0;
        fx * self.baseline / point.z
    }

    /// Check intrinsics and baseline.
    pub fn validate(&self) -> Result<()> {
        self.intrinsics.validate()?;
        if self.baseline.is_finite() && self.baseline > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration(format!(
                "baseline must be positive, got {}",
                self.baseline
            )))
        }
    }
}

// TESTS #############################################################
