// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Value types flowing between modules: poses, frames, clouds, features, correspondences.

pub mod correspondence;
pub mod features;
pub mod frame;
pub mod point_cloud;
pub mod pose;

pub use self::correspondence::{
    Correspondence, CorrespondenceMap2D, CorrespondenceMap3D, CorrespondenceMaps3DSequence,
};
pub use self::features::{
    Descriptor, VisualPointFeatureVector2D, VisualPointFeatureVector3D, MAX_DESCRIPTOR_LENGTH,
};
pub use self::frame::{Frame, FrameMode, PixelDepth};
pub use self::point_cloud::PointCloud;
pub use self::pose::{Pose3D, PosesSequence};
