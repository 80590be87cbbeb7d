// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Port interface of the processing modules (DFN) composed by the chains.
//!
//! Every module implements `Dfn` plus exactly one capability trait.
//! Input setters take a reference and store their own copy,
//! output getters return a reference valid until the next `process()`.
//! `configure()` must be called once before the first `process()`
//! and may be called again, with the same outcome.

pub mod builtin;
pub mod executor;
pub mod registry;

use std::path::Path;

use crate::core::types::{
    CorrespondenceMap2D, CorrespondenceMaps3DSequence, Frame, PointCloud, Pose3D, PosesSequence,
    VisualPointFeatureVector2D,
};
use crate::error::Result;
use crate::misc::type_aliases::Float;

/// Life cycle shared by every module.
pub trait Dfn {
    /// File from which `configure()` loads the parameters.
    /// Without it, modules use their default parameters.
    fn set_configuration_file(&mut self, file_path: &Path);

    /// Load and validate the parameters.
    fn configure(&mut self) -> Result<()>;

    /// Compute the outputs from the current inputs. Synchronous.
    fn process(&mut self);
}

/// Image to image filter (rectification, denoising, ...).
pub trait ImageFiltering: Dfn {
    /// Image to filter.
    fn image_input(&mut self, image: &Frame);
    /// Filtered image.
    fn image_output(&self) -> &Frame;
}

/// Dense stereo reconstruction from a rectified pair.
pub trait StereoReconstruction: Dfn {
    /// Left image.
    fn left_input(&mut self, image: &Frame);
    /// Right image.
    fn right_input(&mut self, image: &Frame);
    /// Points in the left camera frame. NaN where nothing was reconstructed.
    fn point_cloud_output(&self) -> &PointCloud;
}

/// 2D keypoints detection.
pub trait FeaturesExtraction2D: Dfn {
    /// Image to analyze.
    fn frame_input(&mut self, image: &Frame);
    /// Detected keypoints, possibly already described.
    fn features_output(&self) -> &VisualPointFeatureVector2D;
}

/// 2D keypoints description.
pub trait FeaturesDescription2D: Dfn {
    /// Image the keypoints were detected in.
    fn frame_input(&mut self, image: &Frame);
    /// Keypoints to describe.
    fn features_input(&mut self, features: &VisualPointFeatureVector2D);
    /// Same keypoints, with descriptors.
    fn features_output(&self) -> &VisualPointFeatureVector2D;
}

/// 2D keypoints matching between two images.
pub trait FeaturesMatching2D: Dfn {
    /// Keypoints of the source image.
    fn source_features_input(&mut self, features: &VisualPointFeatureVector2D);
    /// Keypoints of the sink image.
    fn sink_features_input(&mut self, features: &VisualPointFeatureVector2D);
    /// Matches, source points in the source image and sink points in the sink image.
    fn matches_output(&self) -> &CorrespondenceMap2D;
}

/// Triangulation of 2D matches between two cameras.
pub trait PointCloudReconstruction2DTo3D: Dfn {
    /// Matches, source in the first camera and sink in the second one.
    fn matches_input(&mut self, matches: &CorrespondenceMap2D);
    /// Pose of the second camera in the frame of the first one.
    fn pose_input(&mut self, pose: &Pose3D);
    /// One point per match, in the first camera frame, in match order.
    /// NaN for matches that could not be triangulated.
    fn point_cloud_output(&self) -> &PointCloud;
}

/// Estimation of the camera poses of a window from 3D correspondences.
pub trait Transform3DEstimation: Dfn {
    /// 3D correspondences between every camera pair of the window.
    fn matches_input(&mut self, matches: &CorrespondenceMaps3DSequence);
    /// Pose of the camera `k` steps back at index `k`,
    /// expressed in the frame of the oldest camera of the window.
    fn transforms_output(&self) -> &PosesSequence;
    /// True if the estimation succeeded.
    fn success_output(&self) -> bool;
    /// Residual error of the estimation.
    fn error_output(&self) -> Float;
}

/// Registration of a point cloud onto another one.
pub trait Registration3D: Dfn {
    /// Cloud to move.
    fn source_cloud_input(&mut self, cloud: &PointCloud);
    /// Reference cloud.
    fn sink_cloud_input(&mut self, cloud: &PointCloud);
    /// Initial guess of the transformation.
    fn transform_guess_input(&mut self, guess: &Pose3D);
    /// Whether to start from the guess or from identity.
    fn use_guess_input(&mut self, use_guess: bool);
    /// Transformation bringing the source cloud onto the sink cloud.
    fn transform_output(&self) -> &Pose3D;
    /// True if the registration converged.
    fn success_output(&self) -> bool;
}
