// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dense stereo by block matching along the rows of rectified images.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::camera::StereoRig;
use crate::core::dfn::{Dfn, StereoReconstruction};
use crate::core::types::{Frame, PointCloud};
use crate::error::{Error, Result};
use crate::misc::config::{self, Validate};
use crate::misc::type_aliases::{Float, Point2, Point3};

/// Parameters of the block matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockMatchingParameters {
    /// Calibration of the rectified pair.
    pub rig: StereoRig,
    /// Blocks are `2 * block_half_size + 1` pixels wide.
    pub block_half_size: usize,
    /// Smallest disparity searched.
    pub min_disparity: usize,
    /// Largest disparity searched.
    pub max_disparity: usize,
    /// The best cost must be below `uniqueness_ratio` times any cost
    /// at a disparity more than one pixel away. 1 disables the check.
    pub uniqueness_ratio: Float,
}

impl Default for BlockMatchingParameters {
    fn default() -> Self {
        Self {
            rig: StereoRig::default(),
            block_half_size: 3,
            min_disparity: 1,
            max_disparity: 64,
            uniqueness_ratio: 0.9,
        }
    }
}

impl Validate for BlockMatchingParameters {
    fn validate(&self) -> Result<()> {
        self.rig.validate()?;
        if self.min_disparity == 0 || self.min_disparity > self.max_disparity {
            return Err(Error::InvalidConfiguration(format!(
                "disparity range [{}, {}] must be positive and not empty",
                self.min_disparity, self.max_disparity
            )));
        }
        if !(self.uniqueness_ratio > 0.0 && self.uniqueness_ratio <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "uniqueness ratio must be in ]0, 1], got {}",
                self.uniqueness_ratio
            )));
        }
        Ok(())
    }
}

/// Block matching stereo module.
///
/// The output has one point per left pixel, in row major order,
/// NaN where no disparity could be determined. Pixels closer to the left
/// border than the largest disparity are never determined.
#[derive(Debug, Default)]
pub struct BlockMatchingStereo {
    configuration_file: Option<PathBuf>,
    /// Current parameters.
    pub parameters: BlockMatchingParameters,
    left: Frame,
    right: Frame,
    cloud: PointCloud,
}

impl BlockMatchingStereo {
    /// Stereo with the given parameters.
    pub fn new(parameters: BlockMatchingParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }
}

/// Sum of absolute differences between the block at `(i, j)` in `left`
/// and the block at `(i, j - disparity)` in `right`.
fn sad(left: &DMatrix<u8>, right: &DMatrix<u8>, i: usize, j: usize, disparity: usize, h: usize) -> u32 {
    let mut cost = 0;
    for di in 0..=2 * h {
        for dj in 0..=2 * h {
            let (row, col) = (i + di - h, j + dj - h);
            let l = left[(row, col)] as i32;
            let r = right[(row, col - disparity)] as i32;
            cost += (l - r).abs() as u32;
        }
    }
    cost
}

/// Subpixel disparity of each left pixel, NaN where undetermined.
pub fn disparity_map(
    left: &DMatrix<u8>,
    right: &DMatrix<u8>,
    parameters: &BlockMatchingParameters,
) -> DMatrix<Float> {
    let (nb_rows, nb_cols) = left.shape();
    let h = parameters.block_half_size;
    let mut disparities = DMatrix::from_element(nb_rows, nb_cols, std::f32::NAN);
    if nb_rows <= 2 * h || nb_cols <= 2 * h {
        return disparities;
    }
    for i in h..(nb_rows - h) {
        for j in h..(nb_cols - h) {
            // The whole disparity range must fit in the right image.
            if j < h + parameters.max_disparity {
                continue;
            }
            let costs: Vec<u32> = (parameters.min_disparity..=parameters.max_disparity)
                .map(|d| sad(left, right, i, j, d, h))
                .collect();
            if let Some(d) = best_disparity(&costs, parameters.uniqueness_ratio) {
                disparities[(i, j)] = parameters.min_disparity as Float + d;
            }
        }
    }
    disparities
}

/// Subpixel offset of the best cost, `None` if it is not unique enough.
/// Ties away from the best, zero costs included, are ambiguous.
fn best_disparity(costs: &[u32], uniqueness_ratio: Float) -> Option<Float> {
    let (best, &best_cost) = costs.iter().enumerate().min_by_key(|&(_, c)| c)?;
    let ambiguous = costs.iter().enumerate().any(|(k, &c)| {
        (k as isize - best as isize).abs() > 1 && (best_cost as Float) >= uniqueness_ratio * c as Float
    });
    if ambiguous {
        return None;
    }
    // Parabola through the best cost and its two neighbors.
    if best == 0 || best + 1 == costs.len() {
        return Some(best as Float);
    }
    let (c0, c1, c2) = (
        costs[best - 1] as Float,
        best_cost as Float,
        costs[best + 1] as Float,
    );
    let curvature = c0 - 2.0 * c1 + c2;
    let offset = if curvature > 0.0 {
        (c0 - c2) / (2.0 * curvature)
    } else {
        0.0
    };
    Some(best as Float + offset)
}

impl Dfn for BlockMatchingStereo {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.configuration_file = Some(file_path.to_path_buf());
    }

    fn configure(&mut self) -> Result<()> {
        config::reload(self.configuration_file.as_ref(), &mut self.parameters)
    }

    fn process(&mut self) {
        self.cloud = PointCloud::new();
        self.cloud.timestamp = self.left.timestamp;
        let left = super::intensities(&self.left, "Block matching");
        let right = super::intensities(&self.right, "Block matching");
        let (left, right) = match (left, right) {
            (Some(l), Some(r)) if l.shape() == r.shape() => (l, r),
            (Some(_), Some(_)) => {
                tracing::warn!("Block matching: left and right images differ in size");
                return;
            }
            _ => return,
        };
        let disparities = disparity_map(&left, &right, &self.parameters);
        let rig = &self.parameters.rig;
        let (nb_rows, nb_cols) = disparities.shape();
        let nan = Point3::new(std::f32::NAN, std::f32::NAN, std::f32::NAN);
        self.cloud.points.reserve(nb_rows * nb_cols);
        for i in 0..nb_rows {
            for j in 0..nb_cols {
                let pixel = Point2::new(j as Float, i as Float);
                let point = rig.point_from_disparity(pixel, disparities[(i, j)]);
                self.cloud.points.push(point.unwrap_or(nan));
            }
        }
        tracing::debug!(
            "Block matching: {} valid points over {} pixels",
            self.cloud.number_of_valid_points(),
            self.cloud.len()
        );
    }
}

impl StereoReconstruction for BlockMatchingStereo {
    fn left_input(&mut self, image: &Frame) {
        self.left.clone_from(image);
    }

    fn right_input(&mut self, image: &Frame) {
        self.right.clone_from(image);
    }

    fn point_cloud_output(&self) -> &PointCloud {
        &self.cloud
    }
}

// TESTS #############################################################
