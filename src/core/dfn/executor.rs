// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! One call per module category: push inputs, process, pull outputs.
//!
//! Each category has an `_into` function overwriting storage owned by
//! the caller, and a function returning a new owned output built on it.

use super::{
    FeaturesDescription2D, FeaturesExtraction2D, FeaturesMatching2D, ImageFiltering,
    PointCloudReconstruction2DTo3D, Registration3D, StereoReconstruction, Transform3DEstimation,
};
use crate::core::types::{
    CorrespondenceMap2D, CorrespondenceMaps3DSequence, Frame, PointCloud, Pose3D, PosesSequence,
    VisualPointFeatureVector2D,
};

// Image filtering ###################################################

/// Filter an image.
pub fn filter_image(dfn: &mut dyn ImageFiltering, image: &Frame) -> Frame {
    let mut output = Frame::empty();
    filter_image_into(dfn, image, &mut output);
    output
}

/// Filter an image into `output`.
pub fn filter_image_into(dfn: &mut dyn ImageFiltering, image: &Frame, output: &mut Frame) {
    dfn.image_input(image);
    dfn.process();
    output.clone_from(dfn.image_output());
}

/// Filter an image with an optional filter, copying it when there is none.
pub fn filter_image_or_copy(dfn: Option<&mut (dyn ImageFiltering + 'static)>, image: &Frame) -> Frame {
    match dfn {
        Some(dfn) => filter_image(dfn, image),
        None => image.clone(),
    }
}

// Stereo reconstruction #############################################

/// Dense point cloud of a rectified stereo pair.
pub fn reconstruct_stereo(dfn: &mut dyn StereoReconstruction, left: &Frame, right: &Frame) -> PointCloud {
    let mut output = PointCloud::new();
    reconstruct_stereo_into(dfn, left, right, &mut output);
    output
}

/// Dense point cloud of a rectified stereo pair, into `output`.
pub fn reconstruct_stereo_into(
    dfn: &mut dyn StereoReconstruction,
    left: &Frame,
    right: &Frame,
    output: &mut PointCloud,
) {
    dfn.left_input(left);
    dfn.right_input(right);
    dfn.process();
    output.clone_from(dfn.point_cloud_output());
}

// Features ##########################################################

/// Detect keypoints in an image.
pub fn extract_features_2d(dfn: &mut dyn FeaturesExtraction2D, image: &Frame) -> VisualPointFeatureVector2D {
    let mut output = VisualPointFeatureVector2D::new();
    extract_features_2d_into(dfn, image, &mut output);
    output
}

/// Detect keypoints in an image, into `output`.
pub fn extract_features_2d_into(
    dfn: &mut dyn FeaturesExtraction2D,
    image: &Frame,
    output: &mut VisualPointFeatureVector2D,
) {
    dfn.frame_input(image);
    dfn.process();
    output.clone_from(dfn.features_output());
}

/// Describe keypoints.
pub fn describe_features_2d(
    dfn: &mut dyn FeaturesDescription2D,
    image: &Frame,
    features: &VisualPointFeatureVector2D,
) -> VisualPointFeatureVector2D {
    let mut output = VisualPointFeatureVector2D::new();
    describe_features_2d_into(dfn, image, features, &mut output);
    output
}

/// Describe keypoints, into `output`.
pub fn describe_features_2d_into(
    dfn: &mut dyn FeaturesDescription2D,
    image: &Frame,
    features: &VisualPointFeatureVector2D,
    output: &mut VisualPointFeatureVector2D,
) {
    dfn.frame_input(image);
    dfn.features_input(features);
    dfn.process();
    output.clone_from(dfn.features_output());
}

/// Describe keypoints with an optional descriptor, copying them when there is none.
pub fn describe_features_2d_or_copy(
    dfn: Option<&mut (dyn FeaturesDescription2D + 'static)>,
    image: &Frame,
    features: &VisualPointFeatureVector2D,
) -> VisualPointFeatureVector2D {
    match dfn {
        Some(dfn) => describe_features_2d(dfn, image, features),
        None => features.clone(),
    }
}

/// Match keypoints of two images.
pub fn match_features_2d(
    dfn: &mut dyn FeaturesMatching2D,
    source: &VisualPointFeatureVector2D,
    sink: &VisualPointFeatureVector2D,
) -> CorrespondenceMap2D {
    let mut output = CorrespondenceMap2D::new();
    match_features_2d_into(dfn, source, sink, &mut output);
    output
}

/// Match keypoints of two images, into `output`.
pub fn match_features_2d_into(
    dfn: &mut dyn FeaturesMatching2D,
    source: &VisualPointFeatureVector2D,
    sink: &VisualPointFeatureVector2D,
    output: &mut CorrespondenceMap2D,
) {
    dfn.source_features_input(source);
    dfn.sink_features_input(sink);
    dfn.process();
    output.clone_from(dfn.matches_output());
}

// Triangulation #####################################################

/// Triangulate 2D matches between two cameras.
pub fn reconstruct_from_matches(
    dfn: &mut dyn PointCloudReconstruction2DTo3D,
    matches: &CorrespondenceMap2D,
    pose: &Pose3D,
) -> PointCloud {
    let mut output = PointCloud::new();
    reconstruct_from_matches_into(dfn, matches, pose, &mut output);
    output
}

/// Triangulate 2D matches between two cameras, into `output`.
pub fn reconstruct_from_matches_into(
    dfn: &mut dyn PointCloudReconstruction2DTo3D,
    matches: &CorrespondenceMap2D,
    pose: &Pose3D,
    output: &mut PointCloud,
) {
    dfn.matches_input(matches);
    dfn.pose_input(pose);
    dfn.process();
    output.clone_from(dfn.point_cloud_output());
}

// Estimation ########################################################

/// Estimate the poses of a window of cameras.
/// Returns the poses and the success flag.
pub fn estimate_transforms(
    dfn: &mut dyn Transform3DEstimation,
    matches: &CorrespondenceMaps3DSequence,
) -> (PosesSequence, bool) {
    let mut output = PosesSequence::new();
    let success = estimate_transforms_into(dfn, matches, &mut output);
    (output, success)
}

/// Estimate the poses of a window of cameras, into `output`.
/// Returns the success flag.
pub fn estimate_transforms_into(
    dfn: &mut dyn Transform3DEstimation,
    matches: &CorrespondenceMaps3DSequence,
    output: &mut PosesSequence,
) -> bool {
    dfn.matches_input(matches);
    dfn.process();
    output.clone_from(dfn.transforms_output());
    dfn.success_output()
}

/// Register `source` onto `sink`, starting from `guess` if any.
/// Returns the transformation and the success flag.
pub fn register_3d(
    dfn: &mut dyn Registration3D,
    source: &PointCloud,
    sink: &PointCloud,
    guess: Option<&Pose3D>,
) -> (Pose3D, bool) {
    let mut output = Pose3D::identity();
    let success = register_3d_into(dfn, source, sink, guess, &mut output);
    (output, success)
}

/// Register `source` onto `sink` into `output`, starting from `guess` if any.
/// Returns the success flag.
pub fn register_3d_into(
    dfn: &mut dyn Registration3D,
    source: &PointCloud,
    sink: &PointCloud,
    guess: Option<&Pose3D>,
    output: &mut Pose3D,
) -> bool {
    dfn.source_cloud_input(source);
    dfn.sink_cloud_input(sink);
    dfn.use_guess_input(guess.is_some());
    if let Some(guess) = guess {
        dfn.transform_guess_input(guess);
    }
    dfn.process();
    *output = *dfn.transform_output();
    dfn.success_output()
}

// TESTS #############################################################
