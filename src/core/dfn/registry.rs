// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Typed registry of modules, indexed by the role they play in a chain.
//!
//! A chain `setup` takes its modules out of the registry by role name.
//! A role that is absent, or filled by a module of another capability,
//! is reported as a typed error.

use std::collections::BTreeMap;
use std::path::Path;

use super::{
    FeaturesDescription2D, FeaturesExtraction2D, FeaturesMatching2D, ImageFiltering,
    PointCloudReconstruction2DTo3D, Registration3D, StereoReconstruction, Transform3DEstimation,
};
use crate::error::{Error, Result};

/// A module with its capability.
pub enum DfnInstance {
    /// Image to image filter.
    ImageFiltering(Box<dyn ImageFiltering>),
    /// Dense stereo.
    StereoReconstruction(Box<dyn StereoReconstruction>),
    /// Keypoints detection.
    FeaturesExtraction2D(Box<dyn FeaturesExtraction2D>),
    /// Keypoints description.
    FeaturesDescription2D(Box<dyn FeaturesDescription2D>),
    /// Keypoints matching.
    FeaturesMatching2D(Box<dyn FeaturesMatching2D>),
    /// Triangulation of matches.
    PointCloudReconstruction2DTo3D(Box<dyn PointCloudReconstruction2DTo3D>),
    /// Window poses estimation.
    Transform3DEstimation(Box<dyn Transform3DEstimation>),
    /// Cloud to cloud registration.
    Registration3D(Box<dyn Registration3D>),
}

macro_rules! for_each_instance {
    ($instance:expr, $dfn:ident => $body:expr) => {
        match $instance {
            DfnInstance::ImageFiltering($dfn) => $body,
            DfnInstance::StereoReconstruction($dfn) => $body,
            DfnInstance::FeaturesExtraction2D($dfn) => $body,
            DfnInstance::FeaturesDescription2D($dfn) => $body,
            DfnInstance::FeaturesMatching2D($dfn) => $body,
            DfnInstance::PointCloudReconstruction2DTo3D($dfn) => $body,
            DfnInstance::Transform3DEstimation($dfn) => $body,
            DfnInstance::Registration3D($dfn) => $body,
        }
    };
}

impl DfnInstance {
    /// Name of the capability, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DfnInstance::ImageFiltering(_) => "ImageFiltering",
            DfnInstance::StereoReconstruction(_) => "StereoReconstruction",
            DfnInstance::FeaturesExtraction2D(_) => "FeaturesExtraction2D",
            DfnInstance::FeaturesDescription2D(_) => "FeaturesDescription2D",
            DfnInstance::FeaturesMatching2D(_) => "FeaturesMatching2D",
            DfnInstance::PointCloudReconstruction2DTo3D(_) => "PointCloudReconstruction2DTo3D",
            DfnInstance::Transform3DEstimation(_) => "Transform3DEstimation",
            DfnInstance::Registration3D(_) => "Registration3D",
        }
    }

    /// Forward to `Dfn::set_configuration_file`.
    pub fn set_configuration_file(&mut self, file_path: &Path) {
        for_each_instance!(self, dfn => dfn.set_configuration_file(file_path))
    }

    /// Forward to `Dfn::configure`.
    pub fn configure(&mut self) -> Result<()> {
        for_each_instance!(self, dfn => dfn.configure())
    }
}

/// Modules available to chains, by role name.
#[derive(Default)]
pub struct DfnRegistry {
    modules: BTreeMap<String, DfnInstance>,
}

macro_rules! typed_access {
    ($variant:ident, $capability:ident, $register:ident, $take:ident, $take_optional:ident) => {
        /// Register a module under `role`, replacing any previous one.
        pub fn $register<D: $capability + 'static>(&mut self, role: &str, dfn: D) {
            self.register(role, DfnInstance::$variant(Box::new(dfn)));
        }

        /// Take the module registered under `role`, if any.
        /// Fails if the role is filled by a module of another capability,
        /// which then stays in the registry.
        pub fn $take_optional(&mut self, role: &str) -> Result<Option<Box<dyn $capability>>> {
            match self.modules.remove(role) {
                None => Ok(None),
                Some(DfnInstance::$variant(dfn)) => Ok(Some(dfn)),
                Some(other) => {
                    self.modules.insert(role.to_string(), other);
                    Err(Error::WrongModuleKind {
                        role: role.to_string(),
                        expected: stringify!($capability),
                    })
                }
            }
        }

        /// Take the module registered under `role`, which is mandatory.
        pub fn $take(&mut self, role: &str) -> Result<Box<dyn $capability>> {
            self.$take_optional(role)?
                .ok_or_else(|| Error::MissingModule(role.to_string()))
        }
    };
}

impl DfnRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `role`. Returns the module previously there.
    pub fn register(&mut self, role: &str, dfn: DfnInstance) -> Option<DfnInstance> {
        self.modules.insert(role.to_string(), dfn)
    }

    /// True if a module is registered under `role`.
    pub fn contains(&self, role: &str) -> bool {
        self.modules.contains_key(role)
    }

    /// Check, without taking it, that the module under `role` has the
    /// capability named `kind` (as given by `DfnInstance::kind`).
    /// An empty role is an error only if `mandatory`.
    pub fn check_role(&self, role: &str, kind: &'static str, mandatory: bool) -> Result<()> {
        match self.modules.get(role) {
            None if mandatory => Err(Error::MissingModule(role.to_string())),
            None => Ok(()),
            Some(dfn) if dfn.kind() == kind => Ok(()),
            Some(_) => Err(Error::WrongModuleKind {
                role: role.to_string(),
                expected: kind,
            }),
        }
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Registered roles, in alphabetical order.
    pub fn roles(&self) -> impl Iterator<Item = &str> + '_ {
        self.modules.keys().map(|s| s.as_str())
    }

    /// Set the configuration file of the module registered under `role`.
    pub fn set_configuration_file(&mut self, role: &str, file_path: &Path) -> Result<()> {
        let dfn = self
            .modules
            .get_mut(role)
            .ok_or_else(|| Error::MissingModule(role.to_string()))?;
        dfn.set_configuration_file(file_path);
        Ok(())
    }

    /// Configure every registered module, stopping at the first failure.
    pub fn configure_all(&mut self) -> Result<()> {
        for (role, dfn) in self.modules.iter_mut() {
            tracing::debug!("Configuring {} module \"{}\"", dfn.kind(), role);
            dfn.configure()?;
        }
        Ok(())
    }

    typed_access!(ImageFiltering, ImageFiltering, register_image_filtering, take_image_filtering, take_optional_image_filtering);
    typed_access!(StereoReconstruction, StereoReconstruction, register_stereo_reconstruction, take_stereo_reconstruction, take_optional_stereo_reconstruction);
    typed_access!(FeaturesExtraction2D, FeaturesExtraction2D, register_features_extraction_2d, take_features_extraction_2d, take_optional_features_extraction_2d);
    typed_access!(FeaturesDescription2D, FeaturesDescription2D, register_features_description_2d, take_features_description_2d, take_optional_features_description_2d);
    typed_access!(FeaturesMatching2D, FeaturesMatching2D, register_features_matching_2d, take_features_matching_2d, take_optional_features_matching_2d);
    typed_access!(PointCloudReconstruction2DTo3D, PointCloudReconstruction2DTo3D, register_point_cloud_reconstruction_2d_to_3d, take_point_cloud_reconstruction_2d_to_3d, take_optional_point_cloud_reconstruction_2d_to_3d);
    typed_access!(Transform3DEstimation, Transform3DEstimation, register_transform_3d_estimation, take_transform_3d_estimation, take_optional_transform_3d_estimation);
    typed_access!(Registration3D, Registration3D, register_registration_3d, take_registration_3d, take_optional_registration_3d);
}

// TESTS #############################################################
