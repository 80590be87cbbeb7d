// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reconstruction by registration of dense stereo clouds onto the map.
//!
//! The first cloud defines the map frame. Each following cloud is
//! registered onto the part of the map around the previous camera pose,
//! which gives the motion since then, and is inserted at the new pose.

use serde::{Deserialize, Serialize};

use super::Reconstruction3D;
use crate::core::dfn::executor;
use crate::core::dfn::registry::DfnRegistry;
use crate::core::dfn::{ImageFiltering, Registration3D, StereoReconstruction};
use crate::core::point_cloud_map::{FusionPolicy, PointCloudMap};
use crate::core::types::{Frame, PointCloud, Pose3D};
use crate::error::{Error, Result};
use crate::misc::config::Validate;
use crate::misc::type_aliases::Float;

/// Configuration of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseRegistrationFromStereoConfig {
    /// Radius of the map extract used for registration and published.
    pub search_radius: Float,
    /// Voxel size of the map.
    pub point_cloud_map_resolution: Float,
    /// Fusion of points falling in the same voxel.
    pub fusion_policy: FusionPolicy,
}

impl Default for DenseRegistrationFromStereoConfig {
    fn default() -> Self {
        Self {
            search_radius: 20.0,
            point_cloud_map_resolution: 1e-2,
            fusion_policy: FusionPolicy::default(),
        }
    }
}

impl Validate for DenseRegistrationFromStereoConfig {
    fn validate(&self) -> Result<()> {
        if !(self.point_cloud_map_resolution > 0.0 && self.point_cloud_map_resolution.is_finite()) {
            return Err(Error::InvalidResolution(self.point_cloud_map_resolution));
        }
        if !(self.search_radius >= 0.0) {
            return Err(Error::InvalidRadius(self.search_radius));
        }
        Ok(())
    }
}

/// Roles of the chain: name, capability, mandatory.
const ROLES: [(&str, &str, bool); 4] = [
    ("leftFilter", "ImageFiltering", false),
    ("rightFilter", "ImageFiltering", false),
    ("reconstructor3d", "StereoReconstruction", true),
    ("registrator3d", "Registration3D", true),
];

/// Reconstruction chain registering dense clouds onto the map.
pub struct DenseRegistrationFromStereo {
    config: DenseRegistrationFromStereoConfig,
    left_filter: Option<Box<dyn ImageFiltering>>,
    right_filter: Option<Box<dyn ImageFiltering>>,
    reconstructor_3d: Box<dyn StereoReconstruction>,
    registrator_3d: Box<dyn Registration3D>,
    map: PointCloudMap,
    map_initialized: bool,
    left_image: Frame,
    right_image: Frame,
    pose: Pose3D,
    point_cloud: PointCloud,
    success: bool,
}

impl DenseRegistrationFromStereo {
    /// Validate the configuration, configure every module of the registry,
    /// and take the modules of the chain out of it.
    ///
    /// Roles: `leftFilter` and `rightFilter` (optional `ImageFiltering`),
    /// `reconstructor3d`, `registrator3d`.
    pub fn setup(config: DenseRegistrationFromStereoConfig, registry: &mut DfnRegistry) -> Result<Self> {
        config.validate()?;
        registry.configure_all()?;
        for &(role, kind, mandatory) in ROLES.iter() {
            registry.check_role(role, kind, mandatory)?;
        }
        let left_filter = registry.take_optional_image_filtering("leftFilter")?;
        let right_filter = registry.take_optional_image_filtering("rightFilter")?;
        let reconstructor_3d = registry.take_stereo_reconstruction("reconstructor3d")?;
        let registrator_3d = registry.take_registration_3d("registrator3d")?;
        let map = PointCloudMap::new(config.point_cloud_map_resolution, config.fusion_policy)?;
        Ok(Self {
            config,
            left_filter,
            right_filter,
            reconstructor_3d,
            registrator_3d,
            map,
            map_initialized: false,
            left_image: Frame::empty(),
            right_image: Frame::empty(),
            pose: Pose3D::identity(),
            point_cloud: PointCloud::new(),
            success: false,
        })
    }

    /// The persistent map.
    pub fn map(&self) -> &PointCloudMap {
        &self.map
    }

    fn stereo_cloud(&mut self) -> PointCloud {
        let left = executor::filter_image_or_copy(self.left_filter.as_deref_mut(), &self.left_image);
        let right = executor::filter_image_or_copy(self.right_filter.as_deref_mut(), &self.right_image);
        executor::reconstruct_stereo(self.reconstructor_3d.as_mut(), &left, &right)
    }

    /// Pose of the camera of `cloud`, registered onto the map around the previous pose.
    fn register(&mut self, cloud: &PointCloud) -> Result<Option<Pose3D>> {
        let scene = self
            .map
            .scene_point_cloud_in_origin(&self.pose, self.config.search_radius)?;
        let (motion, success) = executor::register_3d(
            self.registrator_3d.as_mut(),
            cloud,
            &scene,
            Some(&Pose3D::identity()),
        );
        if !success {
            tracing::debug!(
                "Registration of {} points onto {} map points failed",
                cloud.number_of_valid_points(),
                scene.len()
            );
            return Ok(None);
        }
        self.pose.compose(&motion).ok_or(Error::InvalidPose).map(Some)
    }
}

impl Reconstruction3D for DenseRegistrationFromStereo {
    fn left_image_input(&mut self, image: &Frame) {
        self.left_image.clone_from(image);
    }

    fn right_image_input(&mut self, image: &Frame) {
        self.right_image.clone_from(image);
    }

    fn run(&mut self) -> Result<()> {
        self.success = false;
        let cloud = self.stereo_cloud();
        tracing::debug!("Stereo cloud: {} valid points", cloud.number_of_valid_points());
        let pose = if self.map_initialized {
            match self.register(&cloud)? {
                Some(pose) => pose,
                None => {
                    tracing::info!("No pose update for this stereo pair");
                    return Ok(());
                }
            }
        } else if cloud.number_of_valid_points() == 0 {
            tracing::warn!("Empty stereo cloud, the map is not initialized");
            return Ok(());
        } else {
            self.map_initialized = true;
            tracing::info!("Map initialized with {} points", cloud.number_of_valid_points());
            Pose3D::identity()
        };
        self.map.add_point_cloud(&cloud, &pose)?;
        self.point_cloud = self
            .map
            .scene_point_cloud_in_origin(&pose, self.config.search_radius)?;
        self.pose = pose;
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

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::dfn::builtin::IterativeClosestPoint;
    use crate::core::reconstruction::synthetic::ScriptedStereo;
    use approx::assert_relative_eq;

    fn chain(positions: &[Float]) -> DenseRegistrationFromStereo {
        let mut registry = DfnRegistry::new();
        registry.register_stereo_reconstruction("reconstructor3d", ScriptedStereo::along_x(positions));
        registry.register_registration_3d("registrator3d", IterativeClosestPoint::default());
        DenseRegistrationFromStereo::setup(DenseRegistrationFromStereoConfig::default(), &mut registry)
            .unwrap()
    }

    fn step(chain: &mut DenseRegistrationFromStereo) {
        chain.left_image_input(&Frame::empty());
        chain.right_image_input(&Frame::empty());
        chain.run().unwrap();
    }

    #[test]
    fn follows_a_camera_moving_along_x() {
        let mut chain = chain(&[0.0, 0.02, 0.04]);
        step(&mut chain);
        assert!(chain.success_output());
        assert_eq!(*chain.pose_output(), Pose3D::identity());
        let initial_points = chain.map().number_of_points();
        assert_eq!(initial_points, 600);

        step(&mut chain);
        step(&mut chain);
        assert!(chain.success_output());
        let position = chain.pose_output().position;
        assert_relative_eq!(position.x, 0.04, epsilon = 1e-3);
        assert_relative_eq!(position.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(position.z, 0.0, epsilon = 1e-3);
        // The same surface, seen again, adds almost nothing.
        assert!(chain.map().number_of_points() < initial_points + 50);
        assert!(!chain.point_cloud_output().is_empty());
    }

    #[test]
    fn failed_registration_keeps_the_last_outputs() {
        // The third cloud is empty.
        let mut chain = chain(&[0.0, 0.02]);
        step(&mut chain);
        step(&mut chain);
        let pose = *chain.pose_output();
        let cloud_size = chain.point_cloud_output().len();
        step(&mut chain);
        assert!(!chain.success_output());
        assert_eq!(*chain.pose_output(), pose);
        assert_eq!(chain.point_cloud_output().len(), cloud_size);
    }

    #[test]
    fn empty_first_cloud_does_not_initialize_the_map() {
        let mut chain = chain(&[]);
        step(&mut chain);
        assert!(!chain.success_output());
        assert_eq!(chain.map().number_of_points(), 0);
    }

    #[test]
    fn missing_registrator_leaves_the_registry_intact() {
        let mut registry = DfnRegistry::new();
        registry.register_stereo_reconstruction("reconstructor3d", ScriptedStereo::along_x(&[0.0]));
        assert!(matches!(
            DenseRegistrationFromStereo::setup(DenseRegistrationFromStereoConfig::default(), &mut registry),
            Err(Error::MissingModule(_))
        ));
        assert!(registry.contains("reconstructor3d"));

        registry.register_registration_3d("registrator3d", IterativeClosestPoint::default());
        let mut chain =
            DenseRegistrationFromStereo::setup(DenseRegistrationFromStereoConfig::default(), &mut registry)
                .unwrap();
        assert!(registry.is_empty());
        step(&mut chain);
        assert!(chain.success_output());
    }
}
