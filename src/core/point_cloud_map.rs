// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Persistent scene map, accumulating point clouds observed from known poses.
//!
//! Space is partitioned in cubic voxels of side `resolution`.
//! A voxel holds at most one point, further observations falling
//! in an occupied voxel are fused according to the `FusionPolicy`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{Descriptor, PointCloud, Pose3D, VisualPointFeatureVector3D};
use crate::error::{Error, Result};
use crate::misc::type_aliases::{Float, Iso3d, Point3, Point3d};

/// What to do with a point falling in an occupied voxel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FusionPolicy {
    /// Keep the point already there.
    KeepFirst,
    /// Replace it by the new one.
    Replace,
    /// Keep the running mean of all observations.
    Average,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        FusionPolicy::KeepFirst
    }
}

/// Integer coordinates of a voxel.
type VoxelKey = (i64, i64, i64);

/// Fused observations of a voxel.
#[derive(Clone, Debug, PartialEq)]
struct Voxel {
    point: Point3,
    observations: u32,
    descriptor: Descriptor,
}

impl Voxel {
    fn fuse(&mut self, other: Voxel, policy: FusionPolicy) {
        match policy {
            FusionPolicy::KeepFirst => {}
            FusionPolicy::Replace => *self = other,
            FusionPolicy::Average => {
                let total = self.observations + other.observations;
                let weight = other.observations as Float / total as Float;
                self.point += (other.point - self.point) * weight;
                self.observations = total;
                if self.descriptor.is_empty() {
                    self.descriptor = other.descriptor;
                }
            }
        }
    }
}

/// Voxels of one kind of content.
#[derive(Clone, Debug, Default)]
struct VoxelGrid {
    voxels: BTreeMap<VoxelKey, Voxel>,
}

impl VoxelGrid {
    fn insert(&mut self, key: VoxelKey, voxel: Voxel, policy: FusionPolicy) {
        match self.voxels.get_mut(&key) {
            Some(existing) => existing.fuse(voxel, policy),
            None => {
                self.voxels.insert(key, voxel);
            }
        }
    }

    fn rebucket(&mut self, resolution: Float, policy: FusionPolicy) {
        let old = std::mem::take(&mut self.voxels);
        for voxel in old.into_iter().map(|(_, v)| v) {
            self.insert(voxel_key(&voxel.point, resolution), voxel, policy);
        }
    }

    /// Voxels within `radius` of `pose`, in the `pose` frame.
    fn extract<'a>(
        &'a self,
        pose: &Iso3d,
        radius: Float,
    ) -> impl Iterator<Item = (Point3, &'a Voxel)> + 'a {
        let center = Point3d::from(pose.translation.vector);
        let to_local = pose.inverse();
        let radius = radius as f64;
        self.voxels.values().filter_map(move |voxel| {
            let p = to_f64(&voxel.point);
            if nalgebra::distance(&p, &center) <= radius {
                Some((to_f32(&(to_local * p)), voxel))
            } else {
                None
            }
        })
    }
}

fn to_f64(p: &Point3) -> Point3d {
    Point3d::new(p.x as f64, p.y as f64, p.z as f64)
}

fn to_f32(p: &Point3d) -> Point3 {
    Point3::new(p.x as Float, p.y as Float, p.z as Float)
}

fn voxel_key(p: &Point3, resolution: Float) -> VoxelKey {
    let cell = |x: Float| (x / resolution).floor() as i64;
    (cell(p.x), cell(p.y), cell(p.z))
}

fn check_resolution(resolution: Float) -> Result<()> {
    if resolution.is_finite() && resolution > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidResolution(resolution))
    }
}

fn check_radius(radius: Float) -> Result<()> {
    if radius >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidRadius(radius))
    }
}

/// Accumulated scene, in the frame of the origin.
#[derive(Clone, Debug)]
pub struct PointCloudMap {
    resolution: Float,
    policy: FusionPolicy,
    points: VoxelGrid,
    features: VoxelGrid,
    last_pose: Pose3D,
}

impl PointCloudMap {
    /// Empty map. Fails if `resolution` is not finite and strictly positive.
    pub fn new(resolution: Float, policy: FusionPolicy) -> Result<Self> {
        check_resolution(resolution)?;
        Ok(Self {
            resolution,
            policy,
            points: VoxelGrid::default(),
            features: VoxelGrid::default(),
            last_pose: Pose3D::identity(),
        })
    }

    /// Side of a voxel.
    pub fn resolution(&self) -> Float {
        self.resolution
    }

    /// Fusion policy of the map.
    pub fn fusion_policy(&self) -> FusionPolicy {
        self.policy
    }

    /// Change the voxel size, fusing existing content into the new voxels.
    pub fn set_resolution(&mut self, resolution: Float) -> Result<()> {
        check_resolution(resolution)?;
        self.resolution = resolution;
        self.points.rebucket(resolution, self.policy);
        self.features.rebucket(resolution, self.policy);
        Ok(())
    }

    /// Number of occupied voxels of the point store.
    pub fn number_of_points(&self) -> usize {
        self.points.voxels.len()
    }

    /// Number of occupied voxels of the feature store.
    pub fn number_of_features(&self) -> usize {
        self.features.voxels.len()
    }

    /// Pose of the last insertion, identity if nothing was inserted.
    pub fn last_pose(&self) -> &Pose3D {
        &self.last_pose
    }

    /// Remove all content.
    pub fn clear(&mut self) {
        self.points.voxels.clear();
        self.features.voxels.clear();
        self.last_pose = Pose3D::identity();
    }

    /// Add a cloud observed from `pose`: every valid point is rotated by the
    /// pose orientation, translated by its position, then fused in the map.
    /// Returns the number of valid points inserted.
    pub fn add_point_cloud(&mut self, cloud: &PointCloud, pose: &Pose3D) -> Result<usize> {
        let to_origin = pose.to_isometry().ok_or(Error::InvalidPose)?;
        let mut inserted = 0;
        for p in cloud.valid_points() {
            let point = to_f32(&(to_origin * to_f64(p)));
            let voxel = Voxel {
                point,
                observations: 1,
                descriptor: Descriptor::empty(),
            };
            self.points
                .insert(voxel_key(&point, self.resolution), voxel, self.policy);
            inserted += 1;
        }
        self.last_pose = *pose;
        tracing::debug!(
            "Map: inserted {} points of {}, {} voxels",
            inserted,
            cloud.len(),
            self.number_of_points()
        );
        Ok(inserted)
    }

    /// Add 3D features observed from `pose`, keeping their descriptors.
    /// Returns the number of valid features inserted.
    pub fn add_features(&mut self, features: &VisualPointFeatureVector3D, pose: &Pose3D) -> Result<usize> {
        let to_origin = pose.to_isometry().ok_or(Error::InvalidPose)?;
        let mut inserted = 0;
        for feature in features.features() {
            if !crate::misc::helper::is_valid_point3(&feature.point) {
                continue;
            }
            let point = to_f32(&(to_origin * to_f64(&feature.point)));
            let voxel = Voxel {
                point,
                observations: 1,
                descriptor: feature.descriptor,
            };
            self.features
                .insert(voxel_key(&point, self.resolution), voxel, self.policy);
            inserted += 1;
        }
        self.last_pose = *pose;
        Ok(inserted)
    }

    /// Map points within `radius` of the `pose` position,
    /// expressed in the frame of `pose`. The radius bound is inclusive
    /// and may be infinite.
    pub fn scene_point_cloud_in_origin(&self, pose: &Pose3D, radius: Float) -> Result<PointCloud> {
        check_radius(radius)?;
        let iso = pose.to_isometry().ok_or(Error::InvalidPose)?;
        let points = self.points.extract(&iso, radius).map(|(p, _)| p).collect();
        Ok(PointCloud::from_points(points))
    }

    /// Map points within `radius` of the pose of the last insertion.
    pub fn scene_point_cloud(&self, radius: Float) -> Result<PointCloud> {
        self.scene_point_cloud_in_origin(&self.last_pose, radius)
    }

    /// Map features within `radius` of the `pose` position,
    /// expressed in the frame of `pose`.
    pub fn scene_features_in_origin(
        &self,
        pose: &Pose3D,
        radius: Float,
    ) -> Result<VisualPointFeatureVector3D> {
        check_radius(radius)?;
        let iso = pose.to_isometry().ok_or(Error::InvalidPose)?;
        let mut output = VisualPointFeatureVector3D::new();
        for (point, voxel) in self.features.extract(&iso, radius) {
            output.add_described_point(point, voxel.descriptor.as_slice())?;
        }
        Ok(output)
    }
}

// TESTS #############################################################
