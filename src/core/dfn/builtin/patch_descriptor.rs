// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Describe keypoints by the normalized intensity patch around them.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::dfn::{Dfn, FeaturesDescription2D};
use crate::core::types::{Frame, VisualPointFeatureVector2D, MAX_DESCRIPTOR_LENGTH};
use crate::error::{Error, Result};
use crate::misc::config::{self, Validate};
use crate::misc::type_aliases::{Float, Point2};

/// Parameters of the patch descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchParameters {
    /// The patch is `2 * half_size + 1` pixels wide.
    pub half_size: usize,
}

impl Default for PatchParameters {
    fn default() -> Self {
        Self { half_size: 3 }
    }
}

impl PatchParameters {
    /// Number of components of a descriptor.
    pub fn descriptor_size(&self) -> usize {
        let side = 2 * self.half_size + 1;
        side * side
    }
}

impl Validate for PatchParameters {
    fn validate(&self) -> Result<()> {
        if self.descriptor_size() > MAX_DESCRIPTOR_LENGTH {
            Err(Error::InvalidConfiguration(format!(
                "patch of half size {} does not fit in a descriptor",
                self.half_size
            )))
        } else {
            Ok(())
        }
    }
}

/// Zero mean, unit norm intensity patch descriptor.
///
/// Keypoints too close to the border to hold a full patch
/// are kept without descriptor.
#[derive(Debug, Default)]
pub struct PatchDescriptor {
    configuration_file: Option<PathBuf>,
    /// Current parameters.
    pub parameters: PatchParameters,
    image: Frame,
    keypoints: VisualPointFeatureVector2D,
    features: VisualPointFeatureVector2D,
}

impl PatchDescriptor {
    /// Descriptor with the given parameters.
    pub fn new(parameters: PatchParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }
}

/// Normalized patch centered on the pixel nearest to `point`,
/// `None` if it does not fit in the image.
pub fn patch(mat: &DMatrix<u8>, point: &Point2, half_size: usize) -> Option<Vec<Float>> {
    let (nb_rows, nb_cols) = mat.shape();
    let (x, y) = (point.x.round(), point.y.round());
    let h = half_size as Float;
    if !(x >= h && y >= h && x + h < nb_cols as Float && y + h < nb_rows as Float) {
        return None;
    }
    let (x, y) = (x as usize, y as usize);
    let view = mat.view((y - half_size, x - half_size), (2 * half_size + 1, 2 * half_size + 1));
    // Row major, like the image.
    let mut values: Vec<Float> = view.transpose().iter().map(|&v| v as Float).collect();
    let mean = values.iter().sum::<Float>() / values.len() as Float;
    values.iter_mut().for_each(|v| *v -= mean);
    let norm = values.iter().map(|v| v * v).sum::<Float>().sqrt();
    if norm > std::f32::EPSILON {
        values.iter_mut().for_each(|v| *v /= norm);
    }
    Some(values)
}

impl Dfn for PatchDescriptor {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.configuration_file = Some(file_path.to_path_buf());
    }

    fn configure(&mut self) -> Result<()> {
        config::reload(self.configuration_file.as_ref(), &mut self.parameters)
    }

    fn process(&mut self) {
        self.features.clear();
        let mat = match super::intensities(&self.image, "Patch descriptor") {
            Some(mat) => mat,
            None => {
                self.features = VisualPointFeatureVector2D::from_points(self.keypoints.points());
                return;
            }
        };
        for point in self.keypoints.points() {
            let added = match patch(&mat, &point, self.parameters.half_size) {
                Some(values) => self.features.add_described_point(point, &values),
                None => {
                    self.features.add_point(point);
                    Ok(())
                }
            };
            if let Err(err) = added {
                tracing::warn!("Patch descriptor: {}", err);
                self.features.add_point(point);
            }
        }
        tracing::debug!(
            "Patch descriptor: {} keypoints, descriptor size {}",
            self.features.len(),
            self.features.descriptor_size()
        );
    }
}

impl FeaturesDescription2D for PatchDescriptor {
    fn frame_input(&mut self, image: &Frame) {
        self.image.clone_from(image);
    }

    fn features_input(&mut self, features: &VisualPointFeatureVector2D) {
        self.keypoints.clone_from(features);
    }

    fn features_output(&self) -> &VisualPointFeatureVector2D {
        &self.features
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::dfn::executor;
    use crate::misc::interop;
    use approx::assert_relative_eq;

    fn ramp() -> DMatrix<u8> {
        DMatrix::from_fn(20, 20, |i, j| (5 * i + 7 * j) as u8)
    }

    #[test]
    fn patch_is_normalized() {
        let values = patch(&ramp(), &Point2::new(10.0, 10.0), 2).unwrap();
        assert_eq!(values.len(), 25);
        assert_relative_eq!(values.iter().sum::<Float>(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(values.iter().map(|v| v * v).sum::<Float>(), 1.0, epsilon = 1e-5);
        // Row major: +7 one pixel right, +5 one row down.
        assert_relative_eq!(values[1] - values[0], values[6] - values[5], epsilon = 1e-6);
        assert!(values[1] > values[5]);
        assert!(values[5] > values[0]);
    }

    #[test]
    fn descriptors_are_invariant_to_brightness() {
        let mat = ramp();
        let brighter = mat.map(|v| v / 2 + 40);
        let a = patch(&mat, &Point2::new(8.0, 8.0), 3).unwrap();
        let b = patch(&brighter, &Point2::new(8.0, 8.0), 3).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x, y, epsilon = 0.05);
        }
    }

    #[test]
    fn border_keypoints_stay_undescribed() {
        let mut dfn = PatchDescriptor::default();
        dfn.configure().unwrap();
        let frame = interop::frame_from_matrix(&ramp()).unwrap();
        let keypoints = VisualPointFeatureVector2D::from_points(vec![
            Point2::new(1.0, 1.0),
            Point2::new(10.0, 10.0),
        ]);
        let features = executor::describe_features_2d(&mut dfn, &frame, &keypoints);
        assert_eq!(features.len(), 2);
        assert!(features.descriptor(0).is_empty());
        assert_eq!(features.descriptor(1).len(), 49);
        assert!(features.check_descriptors().is_ok());
    }

    #[test]
    fn oversized_patch_is_rejected() {
        // 11x11 = 121 values still fit, 13x13 = 169 do not.
        let mut dfn = PatchDescriptor::new(PatchParameters { half_size: 5 });
        assert!(dfn.configure().is_ok());
        let mut dfn = PatchDescriptor::new(PatchParameters { half_size: 6 });
        assert!(dfn.configure().is_err());
    }
}
