// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera poses of a window from the 3D correspondences between its cameras.
//!
//! Each camera pair `(k, j)` with `k < j` gives the motion of camera `k`
//! in the frame of camera `j` by closed form rigid alignment.
//! Poses are then chained from the oldest camera (identity) to the newest.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::dfn::{Dfn, Transform3DEstimation};
use crate::core::types::{CorrespondenceMap3D, CorrespondenceMaps3DSequence, Pose3D, PosesSequence};
use crate::error::{Error, Result};
use crate::math::rigid;
use crate::misc::config::{self, Validate};
use crate::misc::type_aliases::{Float, Iso3d, Point3d};

/// Parameters of the pairwise rigid estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwiseRigidParameters {
    /// Pairs with fewer correspondences are ignored.
    pub min_correspondences: usize,
    /// Estimation fails above this RMS alignment error.
    pub max_rms_error: Float,
}

impl Default for PairwiseRigidParameters {
    fn default() -> Self {
        Self {
            min_correspondences: 3,
            max_rms_error: 0.1,
        }
    }
}

impl Validate for PairwiseRigidParameters {
    fn validate(&self) -> Result<()> {
        if self.min_correspondences < 3 {
            return Err(Error::InvalidConfiguration(format!(
                "rigid alignment needs at least 3 correspondences, got {}",
                self.min_correspondences
            )));
        }
        if !(self.max_rms_error >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "max RMS error must be positive, got {}",
                self.max_rms_error
            )));
        }
        Ok(())
    }
}

/// Transform estimation by chained pairwise rigid alignments.
///
/// `transforms_output()[k]` is the pose of the camera `k` steps back
/// in the frame of the oldest camera of the window, so the last pose
/// is the identity. On failure the output is empty.
#[derive(Debug, Default)]
pub struct PairwiseRigidEstimation {
    configuration_file: Option<PathBuf>,
    /// Current parameters.
    pub parameters: PairwiseRigidParameters,
    matches: CorrespondenceMaps3DSequence,
    transforms: PosesSequence,
    success: bool,
    error: Float,
}

impl PairwiseRigidEstimation {
    /// Estimation with the given parameters.
    pub fn new(parameters: PairwiseRigidParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }
}

/// Valid source and sink points of a map, in double precision.
fn valid_pairs(map: &CorrespondenceMap3D) -> (Vec<Point3d>, Vec<Point3d>) {
    map.valid()
        .map(|(_, c)| (c.source.cast::<f64>(), c.sink.cast::<f64>()))
        .unzip()
}

/// Motion of each camera in the frame of the oldest one,
/// with the squared alignment errors and their count,
/// or `None` if a camera could not be linked to an older one.
pub fn chain_poses(
    matches: &CorrespondenceMaps3DSequence,
    min_correspondences: usize,
) -> Option<(Vec<Iso3d>, f64, usize)> {
    let n = matches.number_of_cameras();
    if n < 2 {
        return None;
    }
    let mut poses = vec![Iso3d::identity(); n];
    let mut squared_error = 0.0;
    let mut count = 0;
    for k in (0..n - 1).rev() {
        // The direct neighbor first, then the best supported older camera.
        let mut candidates: Vec<usize> = (k + 1..n).collect();
        candidates.sort_by_key(|&j| {
            let support = matches.get(k, j).valid().count();
            (j != k + 1, std::cmp::Reverse(support))
        });
        let linked = candidates.into_iter().find_map(|j| {
            let (source, sink) = valid_pairs(matches.get(k, j));
            if source.len() < min_correspondences {
                return None;
            }
            let motion = rigid::rigid_alignment(&source, &sink)?;
            let rms = rigid::rms_error(&motion, &source, &sink);
            Some((j, motion, rms, source.len()))
        });
        let (j, motion, rms, nb_points) = linked?;
        tracing::debug!(
            "Rigid estimation: camera {} linked to camera {} with {} points, rms {}",
            k,
            j,
            nb_points,
            rms
        );
        poses[k] = poses[j] * motion;
        squared_error += rms * rms * nb_points as f64;
        count += nb_points;
    }
    Some((poses, squared_error, count))
}

impl Dfn for PairwiseRigidEstimation {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.configuration_file = Some(file_path.to_path_buf());
    }

    fn configure(&mut self) -> Result<()> {
        config::reload(self.configuration_file.as_ref(), &mut self.parameters)
    }

    fn process(&mut self) {
        self.transforms.clear();
        self.success = false;
        self.error = std::f32::INFINITY;
        let (poses, squared_error, count) =
            match chain_poses(&self.matches, self.parameters.min_correspondences) {
                Some(chain) => chain,
                None => {
                    tracing::debug!("Rigid estimation: a camera has no usable correspondences");
                    return;
                }
            };
        let rms = (squared_error / count.max(1) as f64).sqrt() as Float;
        self.error = rms;
        if rms > self.parameters.max_rms_error {
            tracing::debug!("Rigid estimation: rms error {} too large", rms);
            return;
        }
        self.transforms = poses.iter().map(Pose3D::from_isometry).collect();
        self.success = true;
    }
}

impl Transform3DEstimation for PairwiseRigidEstimation {
    fn matches_input(&mut self, matches: &CorrespondenceMaps3DSequence) {
        self.matches.clone_from(matches);
    }

    fn transforms_output(&self) -> &PosesSequence {
        &self.transforms
    }

    fn success_output(&self) -> bool {
        self.success
    }

    fn error_output(&self) -> Float {
        self.error
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::dfn::executor;
    use crate::misc::type_aliases::{Point3, Vec3d};
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn landmarks() -> Vec<Point3d> {
        (0..12)
            .map(|i| {
                let i = i as f64;
                Point3d::new((i * 0.7).sin() * 2.0, (i * 1.3).cos(), 4.0 + 0.2 * i)
            })
            .collect()
    }

    /// Map between cameras `k` and `j`, from their poses in a common frame.
    fn map_between(camera_k: &Iso3d, camera_j: &Iso3d, points: &[Point3d]) -> CorrespondenceMap3D {
        let mut map = CorrespondenceMap3D::new();
        for p in points {
            let source = camera_k.inverse_transform_point(p);
            let sink = camera_j.inverse_transform_point(p);
            map.add(source.cast::<Float>(), sink.cast::<Float>(), 1.0);
        }
        map
    }

    fn moving_cameras(n: usize) -> Vec<Iso3d> {
        // Camera k steps back, in the frame of the oldest camera.
        (0..n)
            .map(|k| {
                let step = (n - 1 - k) as f64;
                let rotation = UnitQuaternion::from_euler_angles(0.0, 0.02 * step, 0.0);
                Iso3d::from_parts(Translation3::new(0.1 * step, 0.0, 0.05 * step), rotation)
            })
            .collect()
    }

    fn full_sequence(cameras: &[Iso3d]) -> CorrespondenceMaps3DSequence {
        let points = landmarks();
        let mut sequence = CorrespondenceMaps3DSequence::new(cameras.len());
        for k in 0..cameras.len() {
            for j in k + 1..cameras.len() {
                sequence.set(k, j, map_between(&cameras[k], &cameras[j], &points));
            }
        }
        sequence
    }

    #[test]
    fn recovers_the_camera_chain() {
        let cameras = moving_cameras(4);
        let mut dfn = PairwiseRigidEstimation::default();
        dfn.configure().unwrap();
        let (poses, success) = executor::estimate_transforms(&mut dfn, &full_sequence(&cameras));
        assert!(success);
        assert_eq!(poses.len(), 4);
        assert!(dfn.error_output() < 1e-4);
        for (pose, camera) in poses.iter().zip(cameras.iter()) {
            let iso = pose.to_isometry().unwrap();
            assert_relative_eq!(iso.translation.vector, camera.translation.vector, epsilon = 1e-4);
            assert_relative_eq!(iso.rotation.angle_to(&camera.rotation), 0.0, epsilon = 1e-4);
        }
        assert_relative_eq!(poses[3].position, Vec3d::zeros());
    }

    #[test]
    fn falls_back_to_an_older_camera() {
        let cameras = moving_cameras(3);
        let mut sequence = full_sequence(&cameras);
        sequence.set(0, 1, CorrespondenceMap3D::new());
        let mut dfn = PairwiseRigidEstimation::default();
        let (poses, success) = executor::estimate_transforms(&mut dfn, &sequence);
        assert!(success);
        let iso = poses[0].to_isometry().unwrap();
        assert_relative_eq!(iso.translation.vector, cameras[0].translation.vector, epsilon = 1e-4);
    }

    #[test]
    fn fails_when_a_camera_is_isolated() {
        let cameras = moving_cameras(3);
        let mut sequence = full_sequence(&cameras);
        sequence.set(0, 1, CorrespondenceMap3D::new());
        sequence.set(0, 2, CorrespondenceMap3D::new());
        let mut dfn = PairwiseRigidEstimation::default();
        let (poses, success) = executor::estimate_transforms(&mut dfn, &sequence);
        assert!(!success);
        assert!(poses.is_empty());
    }

    #[test]
    fn fails_on_inconsistent_correspondences() {
        let mut map = CorrespondenceMap3D::new();
        for i in 0..6 {
            let i = i as Float;
            let source = Point3::new(i, (i * 2.0).sin(), 1.0 + i * i);
            let sink = Point3::new((i * 3.0).cos(), i * i, -i);
            map.add(source, sink, 1.0);
        }
        let mut sequence = CorrespondenceMaps3DSequence::new(2);
        sequence.set(0, 1, map);
        let mut dfn = PairwiseRigidEstimation::default();
        let (_, success) = executor::estimate_transforms(&mut dfn, &sequence);
        assert!(!success);
        assert!(dfn.error_output() > dfn.parameters.max_rms_error);
    }
}
