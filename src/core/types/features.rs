// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visual point features: keypoints with optional fixed-capacity descriptors.

use std::fmt;

use crate::error::{Error, Result};
use crate::misc::type_aliases::{Float, Point2, Point3};

/// Maximum number of components of a descriptor.
pub const MAX_DESCRIPTOR_LENGTH: usize = 128;

/// Fixed-capacity descriptor.
///
/// Only the first `length` components are meaningful,
/// the padding after them must stay exactly zero.
#[derive(Copy, Clone, PartialEq)]
pub struct Descriptor {
    /// Storage, zero padded after `length`.
    pub components: [Float; MAX_DESCRIPTOR_LENGTH],
    /// Number of meaningful components.
    pub length: usize,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl Descriptor {
    /// Descriptor with no component.
    pub fn empty() -> Self {
        Self {
            components: [0.0; MAX_DESCRIPTOR_LENGTH],
            length: 0,
        }
    }

    /// Copy components into a new descriptor.
    /// Returns `None` if there are more than `MAX_DESCRIPTOR_LENGTH` of them.
    pub fn from_slice(values: &[Float]) -> Option<Self> {
        if values.len() > MAX_DESCRIPTOR_LENGTH {
            return None;
        }
        let mut descriptor = Self::empty();
        descriptor.components[..values.len()].copy_from_slice(values);
        descriptor.length = values.len();
        Some(descriptor)
    }

    /// Meaningful components.
    pub fn as_slice(&self) -> &[Float] {
        &self.components[..self.length.min(MAX_DESCRIPTOR_LENGTH)]
    }

    /// Number of meaningful components.
    pub fn len(&self) -> usize {
        self.length
    }

    /// True if the descriptor has no component.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// True if the length fits in the storage and the padding is zero.
    pub fn has_clean_padding(&self) -> bool {
        self.length <= MAX_DESCRIPTOR_LENGTH
            && self.components[self.length..].iter().all(|&c| c == 0.0)
    }

    /// Squared euclidean distance between two descriptors of the same length.
    pub fn squared_distance(&self, other: &Self) -> Float {
        self.as_slice()
            .iter()
            .zip(other.as_slice())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// A keypoint with its descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualPointFeature<P> {
    /// Position of the keypoint.
    pub point: P,
    /// Descriptor, possibly empty.
    pub descriptor: Descriptor,
}

/// Ordered keypoints, all described with the same descriptor size (or not at all).
#[derive(Clone, Debug, PartialEq)]
pub struct VisualPointFeatureVector<P> {
    features: Vec<VisualPointFeature<P>>,
    descriptor_size: usize,
}

/// Features in image coordinates.
pub type VisualPointFeatureVector2D = VisualPointFeatureVector<Point2>;
/// Features in 3D space.
pub type VisualPointFeatureVector3D = VisualPointFeatureVector<Point3>;

impl<P> Default for VisualPointFeatureVector<P> {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            descriptor_size: 0,
        }
    }
}

impl<P: Copy> VisualPointFeatureVector<P> {
    /// Empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Vector of undescribed keypoints.
    pub fn from_points<I: IntoIterator<Item = P>>(points: I) -> Self {
        Self {
            features: points
                .into_iter()
                .map(|point| VisualPointFeature {
                    point,
                    descriptor: Descriptor::empty(),
                })
                .collect(),
            descriptor_size: 0,
        }
    }

    /// Number of keypoints.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True if there is no keypoint.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Size shared by every non-empty descriptor, 0 if none is described.
    pub fn descriptor_size(&self) -> usize {
        self.descriptor_size
    }

    /// All features.
    pub fn features(&self) -> &[VisualPointFeature<P>] {
        &self.features
    }

    /// Keypoint position at `index`.
    pub fn point(&self, index: usize) -> P {
        self.features[index].point
    }

    /// Descriptor at `index`.
    pub fn descriptor(&self, index: usize) -> &Descriptor {
        &self.features[index].descriptor
    }

    /// Iterator over keypoint positions.
    pub fn points(&self) -> impl Iterator<Item = P> + '_ {
        self.features.iter().map(|f| f.point)
    }

    /// Append a keypoint without descriptor.
    pub fn add_point(&mut self, point: P) {
        self.features.push(VisualPointFeature {
            point,
            descriptor: Descriptor::empty(),
        });
    }

    /// Append a described keypoint.
    ///
    /// The first non-empty descriptor fixes the descriptor size of the vector,
    /// later ones must match it.
    pub fn add_described_point(&mut self, point: P, components: &[Float]) -> Result<()> {
        let index = self.features.len();
        let expected = self.descriptor_size;
        let malformed = || Error::MalformedDescriptor {
            index,
            length: components.len(),
            expected,
        };
        let descriptor = Descriptor::from_slice(components).ok_or_else(malformed)?;
        if !descriptor.is_empty() {
            if self.descriptor_size == 0 {
                self.descriptor_size = descriptor.len();
            } else if self.descriptor_size != descriptor.len() {
                return Err(malformed());
            }
        }
        self.features.push(VisualPointFeature { point, descriptor });
        Ok(())
    }

    /// Remove every keypoint.
    pub fn clear(&mut self) {
        self.features.clear();
        self.descriptor_size = 0;
    }

    /// Verify the descriptor contract: each length is 0 or `descriptor_size`,
    /// never above `MAX_DESCRIPTOR_LENGTH`, and the padding is zero.
    pub fn check_descriptors(&self) -> Result<()> {
        for (index, feature) in self.features.iter().enumerate() {
            let d = &feature.descriptor;
            let length_ok = d.length == 0 || d.length == self.descriptor_size;
            if !length_ok || !d.has_clean_padding() {
                return Err(Error::MalformedDescriptor {
                    index,
                    length: d.length,
                    expected: self.descriptor_size,
                });
            }
        }
        Ok(())
    }

    /// Mutable access to a feature, used by producers filling vectors in place.
    /// Call `check_descriptors` afterwards if descriptors were touched.
    pub fn feature_mut(&mut self, index: usize) -> &mut VisualPointFeature<P> {
        &mut self.features[index]
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn first_descriptor_fixes_the_size() {
        let mut features = VisualPointFeatureVector2D::new();
        features.add_point(Point2::new(0.0, 0.0));
        features.add_described_point(Point2::new(1.0, 0.0), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(features.descriptor_size(), 3);
        features.add_described_point(Point2::new(2.0, 0.0), &[]).unwrap();
        let err = features.add_described_point(Point2::new(3.0, 0.0), &[1.0, 2.0]);
        assert!(err.is_err());
        assert_eq!(features.len(), 3);
        assert!(features.check_descriptors().is_ok());
    }

    #[test]
    fn too_long_descriptor_is_rejected() {
        let mut features = VisualPointFeatureVector3D::new();
        let long = vec![1.0; MAX_DESCRIPTOR_LENGTH + 1];
        assert!(features.add_described_point(Point3::origin(), &long).is_err());
        assert!(Descriptor::from_slice(&long).is_none());
    }

    #[test]
    fn dirty_padding_breaks_the_contract() {
        let mut features = VisualPointFeatureVector2D::new();
        features.add_described_point(Point2::new(0.0, 0.0), &[0.5, 0.5]).unwrap();
        features.feature_mut(0).descriptor.components[5] = 1.0;
        match features.check_descriptors() {
            Err(Error::MalformedDescriptor { index, length, expected }) => {
                assert_eq!((index, length, expected), (0, 2, 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wrong_length_breaks_the_contract() {
        let mut features = VisualPointFeatureVector2D::new();
        features.add_described_point(Point2::new(0.0, 0.0), &[0.5, 0.5]).unwrap();
        features.add_described_point(Point2::new(1.0, 0.0), &[0.1, 0.2]).unwrap();
        features.feature_mut(1).descriptor.length = 1;
        features.feature_mut(1).descriptor.components[1] = 0.0;
        assert!(features.check_descriptors().is_err());
    }

    #[test]
    fn squared_distance() {
        let a = Descriptor::from_slice(&[1.0, 2.0]).unwrap();
        let b = Descriptor::from_slice(&[3.0, 0.0]).unwrap();
        approx::assert_relative_eq!(a.squared_distance(&b), 8.0);
    }
}
