// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Triangulation of left-right keypoint matches of a rectified stereo pair.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::camera::{Intrinsics, StereoRig};
use crate::core::dfn::{Dfn, PointCloudReconstruction2DTo3D};
use crate::core::types::{CorrespondenceMap2D, PointCloud, Pose3D};
use crate::error::Result;
use crate::misc::config::{self, Validate};
use crate::misc::helper;
use crate::misc::type_aliases::{Float, Point3};

/// Parameters of the triangulation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulationParameters {
    /// Intrinsics shared by both cameras.
    pub intrinsics: Intrinsics,
}

impl Validate for TriangulationParameters {
    fn validate(&self) -> Result<()> {
        self.intrinsics.validate()
    }
}

/// Triangulation module.
///
/// Matches go from the left image (source) to the right image (sink).
/// The pose input is the pose of the right camera in the left camera frame,
/// only its distance to the origin (the baseline) is used.
/// The output has one point per match, NaN where the match gives
/// no positive disparity.
#[derive(Debug, Default)]
pub struct Triangulation {
    configuration_file: Option<PathBuf>,
    /// Current parameters.
    pub parameters: TriangulationParameters,
    matches: CorrespondenceMap2D,
    pose: Pose3D,
    cloud: PointCloud,
}

impl Triangulation {
    /// Triangulation with the given parameters.
    pub fn new(parameters: TriangulationParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }
}

impl Dfn for Triangulation {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.configuration_file = Some(file_path.to_path_buf());
    }

    fn configure(&mut self) -> Result<()> {
        config::reload(self.configuration_file.as_ref(), &mut self.parameters)
    }

    fn process(&mut self) {
        self.cloud = PointCloud::new();
        let nan = Point3::new(std::f32::NAN, std::f32::NAN, std::f32::NAN);
        let baseline = self.pose.position.norm() as Float;
        if !(baseline.is_finite() && baseline > 0.0) {
            tracing::warn!("Triangulation: degenerate baseline {}", baseline);
            self.cloud.points = vec![nan; self.matches.len()];
            return;
        }
        let rig = StereoRig {
            intrinsics: self.parameters.intrinsics,
            baseline,
        };
        for m in self.matches.iter() {
            let point = if helper::is_valid_point2(&m.source) && helper::is_valid_point2(&m.sink) {
                rig.point_from_disparity(m.source, m.source.x - m.sink.x)
            } else {
                None
            };
            self.cloud.points.push(point.unwrap_or(nan));
        }
        tracing::debug!(
            "Triangulation: {} points from {} matches",
            self.cloud.number_of_valid_points(),
            self.matches.len()
        );
    }
}

impl PointCloudReconstruction2DTo3D for Triangulation {
    fn matches_input(&mut self, matches: &CorrespondenceMap2D) {
        self.matches.clone_from(matches);
    }

    fn pose_input(&mut self, pose: &Pose3D) {
        self.pose = *pose;
    }

    fn point_cloud_output(&self) -> &PointCloud {
        &self.cloud
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::dfn::executor;
    use crate::misc::type_aliases::Point2;
    use approx::assert_relative_eq;

    #[test]
    fn one_point_per_match() {
        let mut dfn = Triangulation::default();
        dfn.configure().unwrap();
        let rig = StereoRig {
            intrinsics: dfn.parameters.intrinsics,
            baseline: 0.5,
        };
        let point = Point3::new(0.3, -0.2, 4.0);
        let left = rig.intrinsics.project(point);
        let left = Point2::new(left.x / left.z, left.y / left.z);
        let right = Point2::new(left.x - rig.disparity(&point), left.y);

        let mut matches = CorrespondenceMap2D::new();
        matches.add(left, right, 1.0);
        matches.add(left, Point2::new(left.x + 1.0, left.y), 1.0);
        matches.add(Point2::new(std::f32::NAN, 0.0), right, 1.0);

        let right_camera = Pose3D::from_translation(-0.5, 0.0, 0.0);
        let cloud = executor::reconstruct_from_matches(&mut dfn, &matches, &right_camera);
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.number_of_valid_points(), 1);
        let found = cloud.valid_point(0).unwrap();
        assert_relative_eq!(found.x, point.x, epsilon = 1e-4);
        assert_relative_eq!(found.y, point.y, epsilon = 1e-4);
        assert_relative_eq!(found.z, point.z, epsilon = 1e-3);
    }

    #[test]
    fn zero_baseline_gives_no_point() {
        let mut dfn = Triangulation::default();
        let mut matches = CorrespondenceMap2D::new();
        matches.add(Point2::new(10.0, 5.0), Point2::new(4.0, 5.0), 1.0);
        let cloud = executor::reconstruct_from_matches(&mut dfn, &matches, &Pose3D::identity());
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud.number_of_valid_points(), 0);
    }
}
