// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic scenes and scripted modules for the tests of the chains.

use std::path::Path;

use crate::core::camera::{Intrinsics, StereoRig};
use crate::core::dfn::builtin::block_matching::{BlockMatchingParameters, BlockMatchingStereo};
use crate::core::dfn::builtin::triangulation::{Triangulation, TriangulationParameters};
use crate::core::dfn::builtin::{
    BruteForceMatcher, HarrisDetector2D, PairwiseRigidEstimation, PatchDescriptor,
};
use crate::core::dfn::registry::DfnRegistry;
use crate::core::dfn::{Dfn, StereoReconstruction, Transform3DEstimation};
use crate::core::types::{CorrespondenceMaps3DSequence, Frame, PointCloud, Pose3D, PosesSequence};
use crate::error::Result;
use crate::misc::type_aliases::{Float, Point3};

/// Distance between the left and right cameras.
pub const BASELINE: f64 = 0.2;
/// Motion of the camera along X between two pairs.
pub const STEP: f64 = 0.1;

const WIDTH: usize = 160;
const HEIGHT: usize = 120;
/// At 5m, with a focal length of 500, a pixel is 1cm wide:
/// the baseline is 20 pixels and a step is 10 pixels.
const PIXELS_PER_STEP: i64 = 10;
const PIXELS_PER_BASELINE: i64 = 20;

/// Camera of the synthetic scenes.
pub fn intrinsics() -> Intrinsics {
    Intrinsics {
        principal_point: (80.0, 60.0),
        focal_length: 500.0,
        scaling: (1.0, 1.0),
        skew: 0.0,
    }
}

/// Random texture painted on a fronto-parallel plane 5m away,
/// seen by a rig moving along X.
#[derive(Default)]
pub struct TexturedPlane;

fn texture(x: i64, y: i64) -> u8 {
    // splitmix64 of the cell coordinates.
    let mut z = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) as u8
}

impl TexturedPlane {
    fn image(&self, offset: i64, timestamp: i64) -> Frame {
        let mut data = Vec::with_capacity(WIDTH * HEIGHT);
        for v in 0..HEIGHT as i64 {
            for u in 0..WIDTH as i64 {
                data.push(texture(u + offset, v));
            }
        }
        let mut frame = Frame::from_gray(WIDTH, HEIGHT, data).expect("valid synthetic frame");
        frame.timestamp = timestamp;
        frame
    }

    /// Left and right images after `step` steps.
    pub fn stereo_pair(&self, step: usize) -> (Frame, Frame) {
        let offset = PIXELS_PER_STEP * step as i64;
        let timestamp = 100_000 * step as i64;
        (
            self.image(offset, timestamp),
            self.image(offset + PIXELS_PER_BASELINE, timestamp),
        )
    }
}

/// Pairwise rigid estimation failing at scripted calls (counted from 0).
pub struct ScriptedEstimator {
    inner: PairwiseRigidEstimation,
    failing_calls: Vec<usize>,
    calls: usize,
    failed: bool,
    no_transforms: PosesSequence,
}

impl ScriptedEstimator {
    pub fn new(failing_calls: &[usize]) -> Self {
        Self {
            inner: PairwiseRigidEstimation::default(),
            failing_calls: failing_calls.to_vec(),
            calls: 0,
            failed: false,
            no_transforms: Vec::new(),
        }
    }
}

impl Dfn for ScriptedEstimator {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.inner.set_configuration_file(file_path);
    }

    fn configure(&mut self) -> Result<()> {
        self.inner.configure()
    }

    fn process(&mut self) {
        self.failed = self.failing_calls.contains(&self.calls);
        self.calls += 1;
        if !self.failed {
            self.inner.process();
        }
    }
}

impl Transform3DEstimation for ScriptedEstimator {
    fn matches_input(&mut self, matches: &CorrespondenceMaps3DSequence) {
        self.inner.matches_input(matches);
    }

    fn transforms_output(&self) -> &PosesSequence {
        if self.failed {
            &self.no_transforms
        } else {
            self.inner.transforms_output()
        }
    }

    fn success_output(&self) -> bool {
        !self.failed && self.inner.success_output()
    }

    fn error_output(&self) -> Float {
        self.inner.error_output()
    }
}

/// Estimator ignoring its matches, succeeding with scripted windows in turn.
/// The last window is repeated.
pub struct ScriptedPoses {
    windows: Vec<PosesSequence>,
    calls: usize,
    output: PosesSequence,
}

impl ScriptedPoses {
    pub fn new(windows: Vec<Vec<Pose3D>>) -> Self {
        Self {
            windows,
            calls: 0,
            output: Vec::new(),
        }
    }
}

impl Dfn for ScriptedPoses {
    fn set_configuration_file(&mut self, _file_path: &Path) {}

    fn configure(&mut self) -> Result<()> {
        Ok(())
    }

    fn process(&mut self) {
        let last = self.windows.len().saturating_sub(1);
        self.output = self.windows.get(self.calls.min(last)).cloned().unwrap_or_default();
        self.calls += 1;
    }
}

impl Transform3DEstimation for ScriptedPoses {
    fn matches_input(&mut self, _matches: &CorrespondenceMaps3DSequence) {}

    fn transforms_output(&self) -> &PosesSequence {
        &self.output
    }

    fn success_output(&self) -> bool {
        true
    }

    fn error_output(&self) -> Float {
        0.0
    }
}

/// Built-in modules set up for `TexturedPlane`.
pub fn keypoint_registry(failing_calls: &[usize]) -> DfnRegistry {
    let mut registry = DfnRegistry::new();
    let rig = StereoRig {
        intrinsics: intrinsics(),
        baseline: BASELINE as Float,
    };
    registry.register_stereo_reconstruction(
        "reconstructor3d",
        BlockMatchingStereo::new(BlockMatchingParameters {
            rig,
            block_half_size: 2,
            min_disparity: 1,
            max_disparity: 32,
            ..BlockMatchingParameters::default()
        }),
    );
    registry.register_features_extraction_2d("featuresExtractor2d", HarrisDetector2D::default());
    registry.register_features_description_2d("featuresDescriptor2d", PatchDescriptor::default());
    registry.register_features_matching_2d("featuresMatcher2d", BruteForceMatcher::default());
    registry.register_point_cloud_reconstruction_2d_to_3d(
        "reconstructor3dfrom2dmatches",
        Triangulation::new(TriangulationParameters {
            intrinsics: intrinsics(),
        }),
    );
    registry.register_transform_3d_estimation("transformEstimator", ScriptedEstimator::new(failing_calls));
    registry
}

/// Bumpy surface sampled every 10cm, in world coordinates.
/// Samples sit in the middle of 1cm voxels.
pub fn bumpy_surface() -> Vec<Point3> {
    let mut points = Vec::new();
    for i in 0..30 {
        for j in 0..20 {
            let x = -1.495 + 0.1 * i as Float;
            let y = -0.995 + 0.1 * j as Float;
            let z = 3.0 + 0.3 * (3.0 * x).sin() * (2.0 * y).cos();
            points.push(Point3::new(x, y, z));
        }
    }
    points
}

/// Stereo module ignoring its images, returning scripted clouds in turn.
#[derive(Default)]
pub struct ScriptedStereo {
    clouds: Vec<PointCloud>,
    next: usize,
    output: PointCloud,
}

impl ScriptedStereo {
    /// Clouds of `bumpy_surface` seen from cameras at the given X positions.
    pub fn along_x(positions: &[Float]) -> Self {
        let clouds = positions
            .iter()
            .map(|&x| {
                let points = bumpy_surface()
                    .into_iter()
                    .map(|p| Point3::new(p.x - x, p.y, p.z))
                    .collect();
                PointCloud::from_points(points)
            })
            .collect();
        Self {
            clouds,
            ..Self::default()
        }
    }
}

impl Dfn for ScriptedStereo {
    fn set_configuration_file(&mut self, _file_path: &Path) {}

    fn configure(&mut self) -> Result<()> {
        Ok(())
    }

    fn process(&mut self) {
        self.output = self.clouds.get(self.next).cloned().unwrap_or_default();
        self.next += 1;
    }
}

impl StereoReconstruction for ScriptedStereo {
    fn left_input(&mut self, _image: &Frame) {}

    fn right_input(&mut self, _image: &Frame) {}

    fn point_cloud_output(&self) -> &PointCloud {
        &self.output
    }
}
