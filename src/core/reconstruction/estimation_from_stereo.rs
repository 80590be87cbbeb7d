// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Incremental reconstruction from stereo keypoints over a sliding window.
//!
//! Every stereo pair gives a dense cloud and a cloud of triangulated keypoints.
//! Keypoints of the current pair are chained to those of each pair still in
//! the window (see `core::quadruple`), and once the window is full the
//! transform estimator recovers the poses of all its cameras.
//! The first full window is inserted in the map at once,
//! then every successful step inserts the newest dense cloud.

use serde::{Deserialize, Serialize};

use super::{PoseValidityCheck, Reconstruction3D};
use crate::core::dfn::executor;
use crate::core::dfn::registry::DfnRegistry;
use crate::core::dfn::{
    FeaturesDescription2D, FeaturesExtraction2D, FeaturesMatching2D, ImageFiltering,
    PointCloudReconstruction2DTo3D, StereoReconstruction, Transform3DEstimation,
};
use crate::core::history::BundleHistory;
use crate::core::point_cloud_map::{FusionPolicy, PointCloudMap};
use crate::core::quadruple::{self, PixelMatching, QuadrupleInput};
use crate::core::types::{
    CorrespondenceMap2D, CorrespondenceMaps3DSequence, Frame, PointCloud, Pose3D, PosesSequence,
    VisualPointFeatureVector2D,
};
use crate::error::{Error, Result};
use crate::misc::config::Validate;
use crate::misc::type_aliases::Float;

/// History category of the left features.
pub const LEFT_FEATURES: &str = "left";
/// History category of the right features.
pub const RIGHT_FEATURES: &str = "right";
/// History category of the left to right matches.
pub const LEFT_RIGHT_MATCHES: &str = "leftRight";
/// History category of the stereo clouds.
pub const DENSE_CLOUD: &str = "dense";
/// History category of the triangulated keypoints.
pub const KEYPOINT_CLOUD: &str = "keypoints";

/// Configuration of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationFromStereoConfig {
    /// Radius of the map extract published with each pose.
    pub search_radius: Float,
    /// Voxel size of the map.
    pub point_cloud_map_resolution: Float,
    /// Number of stereo pairs in the window, at least 2.
    pub number_of_adjusted_stereo_pairs: usize,
    /// Distance between the left and right cameras.
    pub baseline: f64,
    /// Fusion of points falling in the same voxel.
    pub fusion_policy: FusionPolicy,
    /// How keypoint pixels are compared when chaining matches.
    pub pixel_matching: PixelMatching,
    /// Sanity check of the newest estimated pose.
    pub pose_validity: PoseValidityCheck,
}

impl Default for EstimationFromStereoConfig {
    fn default() -> Self {
        Self {
            search_radius: 20.0,
            point_cloud_map_resolution: 1e-2,
            number_of_adjusted_stereo_pairs: 4,
            baseline: 1.0,
            fusion_policy: FusionPolicy::default(),
            pixel_matching: PixelMatching::default(),
            pose_validity: PoseValidityCheck::default(),
        }
    }
}

impl Validate for EstimationFromStereoConfig {
    fn validate(&self) -> Result<()> {
        if self.number_of_adjusted_stereo_pairs < 2 {
            return Err(Error::InvalidConfiguration(format!(
                "at least 2 adjusted stereo pairs are needed, got {}",
                self.number_of_adjusted_stereo_pairs
            )));
        }
        if !(self.point_cloud_map_resolution > 0.0 && self.point_cloud_map_resolution.is_finite()) {
            return Err(Error::InvalidResolution(self.point_cloud_map_resolution));
        }
        if !(self.search_radius >= 0.0) {
            return Err(Error::InvalidRadius(self.search_radius));
        }
        if !(self.baseline > 0.0 && self.baseline.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "baseline must be positive, got {}",
                self.baseline
            )));
        }
        if let PixelMatching::Tolerance(eps) = self.pixel_matching {
            if !(eps >= 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "pixel matching tolerance must be positive, got {}",
                    eps
                )));
            }
        }
        Ok(())
    }
}

/// Modules used by the chain.
struct Modules {
    left_filter: Option<Box<dyn ImageFiltering>>,
    right_filter: Option<Box<dyn ImageFiltering>>,
    reconstructor_3d: Box<dyn StereoReconstruction>,
    features_extractor_2d: Box<dyn FeaturesExtraction2D>,
    features_descriptor_2d: Option<Box<dyn FeaturesDescription2D>>,
    features_matcher_2d: Box<dyn FeaturesMatching2D>,
    reconstructor_3d_from_2d_matches: Box<dyn PointCloudReconstruction2DTo3D>,
    transform_estimator: Box<dyn Transform3DEstimation>,
}

/// Roles of the chain: name, capability, mandatory.
const ROLES: [(&str, &str, bool); 8] = [
    ("leftFilter", "ImageFiltering", false),
    ("rightFilter", "ImageFiltering", false),
    ("reconstructor3d", "StereoReconstruction", true),
    ("featuresExtractor2d", "FeaturesExtraction2D", true),
    ("featuresDescriptor2d", "FeaturesDescription2D", false),
    ("featuresMatcher2d", "FeaturesMatching2D", true),
    ("reconstructor3dfrom2dmatches", "PointCloudReconstruction2DTo3D", true),
    ("transformEstimator", "Transform3DEstimation", true),
];

impl Modules {
    /// Take the modules out of the registry.
    /// Nothing is taken unless every role can be.
    fn take(registry: &mut DfnRegistry) -> Result<Self> {
        for &(role, kind, mandatory) in ROLES.iter() {
            registry.check_role(role, kind, mandatory)?;
        }
        Ok(Self {
            left_filter: registry.take_optional_image_filtering("leftFilter")?,
            right_filter: registry.take_optional_image_filtering("rightFilter")?,
            reconstructor_3d: registry.take_stereo_reconstruction("reconstructor3d")?,
            features_extractor_2d: registry.take_features_extraction_2d("featuresExtractor2d")?,
            features_descriptor_2d: registry
                .take_optional_features_description_2d("featuresDescriptor2d")?,
            features_matcher_2d: registry.take_features_matching_2d("featuresMatcher2d")?,
            reconstructor_3d_from_2d_matches: registry
                .take_point_cloud_reconstruction_2d_to_3d("reconstructor3dfrom2dmatches")?,
            transform_estimator: registry.take_transform_3d_estimation("transformEstimator")?,
        })
    }

    /// Keypoints of an image, described if a descriptor is configured.
    fn features(&mut self, image: &Frame) -> VisualPointFeatureVector2D {
        let keypoints = executor::extract_features_2d(self.features_extractor_2d.as_mut(), image);
        executor::describe_features_2d_or_copy(
            self.features_descriptor_2d.as_deref_mut(),
            image,
            &keypoints,
        )
    }
}

/// Products of one stereo pair.
struct StereoStep {
    dense: PointCloud,
    left_features: VisualPointFeatureVector2D,
    right_features: VisualPointFeatureVector2D,
    left_right: CorrespondenceMap2D,
    keypoints: PointCloud,
}

/// Reconstruction chain estimating poses from stereo keypoints.
pub struct EstimationFromStereo {
    config: EstimationFromStereoConfig,
    modules: Modules,
    history: BundleHistory,
    correspondences: CorrespondenceMaps3DSequence,
    map: PointCloudMap,
    left_image: Frame,
    right_image: Frame,
    pose: Pose3D,
    point_cloud: PointCloud,
    success: bool,
    input_count: usize,
    map_initialized: bool,
    /// Steps since the camera of `pose` was processed.
    steps_since_pose: usize,
}

impl EstimationFromStereo {
    /// Validate the configuration, configure every module of the registry,
    /// and take the modules of the chain out of it.
    ///
    /// Roles: `leftFilter` and `rightFilter` (optional `ImageFiltering`),
    /// `reconstructor3d`, `featuresExtractor2d`, `featuresDescriptor2d` (optional),
    /// `featuresMatcher2d`, `reconstructor3dfrom2dmatches`, `transformEstimator`.
    pub fn setup(config: EstimationFromStereoConfig, registry: &mut DfnRegistry) -> Result<Self> {
        config.validate()?;
        registry.configure_all()?;
        let modules = Modules::take(registry)?;
        let n = config.number_of_adjusted_stereo_pairs;
        let map = PointCloudMap::new(config.point_cloud_map_resolution, config.fusion_policy)?;
        tracing::info!("Estimation from stereo: window of {} stereo pairs", n);
        Ok(Self {
            config,
            modules,
            history: BundleHistory::new(n),
            correspondences: CorrespondenceMaps3DSequence::new(n),
            map,
            left_image: Frame::empty(),
            right_image: Frame::empty(),
            pose: Pose3D::identity(),
            point_cloud: PointCloud::new(),
            success: false,
            input_count: 0,
            map_initialized: false,
            steps_since_pose: 0,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &EstimationFromStereoConfig {
        &self.config
    }

    /// The persistent map.
    pub fn map(&self) -> &PointCloudMap {
        &self.map
    }

    /// The sliding window.
    pub fn history(&self) -> &BundleHistory {
        &self.history
    }

    /// Pose of the right camera in the left camera frame, as given to the triangulation.
    fn right_camera_pose(&self) -> Pose3D {
        Pose3D::from_translation(-self.config.baseline, 0.0, 0.0)
    }

    /// Filter, reconstruct, extract and match the current pair.
    fn process_stereo_pair(&mut self) -> StereoStep {
        let modules = &mut self.modules;
        let left = executor::filter_image_or_copy(modules.left_filter.as_deref_mut(), &self.left_image);
        let right =
            executor::filter_image_or_copy(modules.right_filter.as_deref_mut(), &self.right_image);
        let dense = executor::reconstruct_stereo(modules.reconstructor_3d.as_mut(), &left, &right);
        tracing::debug!("Stereo cloud: {} valid points", dense.number_of_valid_points());

        let left_features = modules.features(&left);
        let right_features = modules.features(&right);
        let left_right = executor::match_features_2d(
            modules.features_matcher_2d.as_mut(),
            &left_features,
            &right_features,
        );
        let right_camera = self.right_camera_pose();
        let keypoints = executor::reconstruct_from_matches(
            self.modules.reconstructor_3d_from_2d_matches.as_mut(),
            &left_right,
            &right_camera,
        );
        if keypoints.len() != left_right.len() {
            tracing::warn!(
                "Triangulated {} points from {} matches, missing points are ignored",
                keypoints.len(),
                left_right.len()
            );
        }
        tracing::debug!(
            "Features: {} left, {} right, {} matches, {} keypoints triangulated",
            left_features.len(),
            right_features.len(),
            left_right.len(),
            keypoints.number_of_valid_points()
        );
        StereoStep {
            dense,
            left_features,
            right_features,
            left_right,
            keypoints,
        }
    }

    /// 3D correspondences of the current pair with the pairs of the window,
    /// older correspondences moved one step back.
    fn chain_correspondences(&mut self, step: &StereoStep) -> CorrespondenceMaps3DSequence {
        let n = self.config.number_of_adjusted_stereo_pairs;
        let mut sequence = self.correspondences.shifted(n);
        let held = self.history.number_of_features(LEFT_FEATURES).min(n - 1);
        // Oldest first.
        for k in (0..held).rev() {
            let left_time = executor::match_features_2d(
                self.modules.features_matcher_2d.as_mut(),
                &step.left_features,
                self.history.features(k, LEFT_FEATURES),
            );
            let right_time = executor::match_features_2d(
                self.modules.features_matcher_2d.as_mut(),
                &step.right_features,
                self.history.features(k, RIGHT_FEATURES),
            );
            let input = QuadrupleInput {
                left_right: &step.left_right,
                left_time: &left_time,
                right_time: &right_time,
                past_left_right: self.history.matches(k, LEFT_RIGHT_MATCHES),
                current_cloud: &step.keypoints,
                past_cloud: self.history.point_cloud(k, KEYPOINT_CLOUD),
            };
            let map = quadruple::extract_3d_correspondences(&input, self.config.pixel_matching);
            tracing::debug!(
                "{} 3D correspondences with the pair {} steps back",
                map.len(),
                k + 1
            );
            sequence.set(0, k + 1, map);
        }
        sequence
    }

    fn store(&mut self, step: &StereoStep) {
        self.history.add_images(&self.left_image, &self.right_image);
        self.history.add_features(&step.left_features, LEFT_FEATURES);
        self.history.add_features(&step.right_features, RIGHT_FEATURES);
        self.history.add_matches(&step.left_right, LEFT_RIGHT_MATCHES);
        self.history.add_point_cloud(&step.dense, DENSE_CLOUD);
        self.history.add_point_cloud(&step.keypoints, KEYPOINT_CLOUD);
    }

    /// Poses of the window cameras, if the estimation succeeded
    /// and the newest pose passes the sanity check.
    fn estimate_poses(&mut self) -> Option<PosesSequence> {
        let (poses, success) =
            executor::estimate_transforms(self.modules.transform_estimator.as_mut(), &self.correspondences);
        if !success {
            tracing::debug!(
                "Transform estimation failed, error {}",
                self.modules.transform_estimator.error_output()
            );
            return None;
        }
        if poses.len() != self.config.number_of_adjusted_stereo_pairs {
            tracing::warn!(
                "Transform estimation returned {} poses for a window of {}",
                poses.len(),
                self.config.number_of_adjusted_stereo_pairs
            );
            return None;
        }
        if !self.config.pose_validity.accepts(&poses[0]) {
            tracing::debug!("Estimated pose rejected: {}", poses[0]);
            return None;
        }
        for (k, pose) in poses.iter().enumerate() {
            tracing::debug!("Camera {} steps back: {}", k, pose);
        }
        Some(poses)
    }

    /// Insert the whole window in the map. Returns the newest camera pose.
    fn add_all_point_clouds_to_map(&mut self, poses: &PosesSequence) -> Result<Pose3D> {
        if poses.iter().any(|pose| !pose.is_valid()) {
            return Err(Error::InvalidPose);
        }
        for k in (0..poses.len()).rev() {
            self.map
                .add_point_cloud(self.history.point_cloud(k, DENSE_CLOUD), &poses[k])?;
        }
        self.map_initialized = true;
        tracing::info!(
            "Map initialized with {} stereo clouds, {} points",
            poses.len(),
            self.map.number_of_points()
        );
        Ok(poses[0])
    }

    /// Chain the newest relative pose to the last published pose,
    /// and insert the newest cloud. Returns the newest camera pose.
    fn add_last_point_cloud_to_map(&mut self, poses: &PosesSequence) -> Result<Pose3D> {
        let n = poses.len();
        let back = if self.steps_since_pose < n {
            self.steps_since_pose
        } else {
            tracing::warn!(
                "Last located camera left the window {} steps ago, assuming no motion since",
                self.steps_since_pose - n + 1
            );
            n - 1
        };
        let relative = poses[back]
            .inverse()
            .and_then(|inverse| inverse.compose(&poses[0]))
            .ok_or(Error::InvalidPose)?;
        let pose = self.pose.compose(&relative).ok_or(Error::InvalidPose)?;
        self.map
            .add_point_cloud(self.history.point_cloud(0, DENSE_CLOUD), &pose)?;
        Ok(pose)
    }
}

impl Reconstruction3D for EstimationFromStereo {
    fn left_image_input(&mut self, image: &Frame) {
        self.left_image.clone_from(image);
    }

    fn right_image_input(&mut self, image: &Frame) {
        self.right_image.clone_from(image);
    }

    fn run(&mut self) -> Result<()> {
        let n = self.config.number_of_adjusted_stereo_pairs;
        let step = self.process_stereo_pair();
        self.correspondences = self.chain_correspondences(&step);
        self.store(&step);
        self.steps_since_pose += 1;
        self.success = false;

        if self.input_count + 1 < n {
            self.input_count += 1;
            tracing::debug!("Warming up: {} of {} stereo pairs", self.input_count, n);
            return Ok(());
        }
        self.input_count = n;

        let poses = match self.estimate_poses() {
            Some(poses) => poses,
            None => {
                tracing::info!("No pose update for this stereo pair");
                return Ok(());
            }
        };
        let pose = if self.map_initialized {
            self.add_last_point_cloud_to_map(&poses)?
        } else {
            self.add_all_point_clouds_to_map(&poses)?
        };
        self.point_cloud = self
            .map
            .scene_point_cloud_in_origin(&pose, self.config.search_radius)?;
        self.pose = pose;
        self.steps_since_pose = 0;
        self.success = true;
        tracing::info!("Camera pose: {}", self.pose);
        Ok(())
    }

    fn pose_output(&self) -> &Pose3D {
        &self.pose
    }

    fn point_cloud_output(&self) -> &PointCloud {
        &self.point_cloud
    }

    fn success_output(&self) -> bool {
        self.success
    }
}

// TESTS #############################################################
