// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Harris corner detector.
//!
//! The structure tensor of the centered gradients is summed over a 3x3 window,
//! the response is `det - k * trace^2`. Corners are the local maxima of the
//! response above a threshold, strongest first.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::dfn::{Dfn, FeaturesExtraction2D};
use crate::core::gradient;
use crate::core::types::{Frame, VisualPointFeatureVector2D};
use crate::error::{Error, Result};
use crate::misc::config::{self, Validate};
use crate::misc::type_aliases::{Float, Point2};

/// Parameters of the Harris detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParameters {
    /// Sensitivity, usually between 0.04 and 0.06.
    pub k: Float,
    /// Minimum response of a corner.
    pub threshold: Float,
    /// Maximum number of corners kept.
    pub max_features: usize,
}

impl Default for HarrisParameters {
    fn default() -> Self {
        Self {
            k: 0.04,
            threshold: 1e6,
            max_features: 500,
        }
    }
}

impl Validate for HarrisParameters {
    fn validate(&self) -> Result<()> {
        if !(self.k > 0.0 && self.k < 0.25) {
            return Err(Error::InvalidConfiguration(format!(
                "Harris k must be in ]0, 0.25[, got {}",
                self.k
            )));
        }
        if !self.threshold.is_finite() {
            return Err(Error::InvalidConfiguration(
                "Harris threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Harris corner detector module.
#[derive(Debug, Default)]
pub struct HarrisDetector2D {
    configuration_file: Option<PathBuf>,
    /// Current parameters.
    pub parameters: HarrisParameters,
    image: Frame,
    features: VisualPointFeatureVector2D,
}

impl HarrisDetector2D {
    /// Detector with the given parameters.
    pub fn new(parameters: HarrisParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }
}

/// Corner response at each pixel. 0 where the window leaves the image.
pub fn corner_response(mat: &DMatrix<u8>, k: Float) -> DMatrix<Float> {
    let gx = gradient::centered_x(mat);
    let gy = gradient::centered_y(mat);
    let sxx = gradient::box_sum_3x3(&gx.component_mul(&gx));
    let syy = gradient::box_sum_3x3(&gy.component_mul(&gy));
    let sxy = gradient::box_sum_3x3(&gx.component_mul(&gy));
    let (nb_rows, nb_cols) = mat.shape();
    DMatrix::from_fn(nb_rows, nb_cols, |i, j| {
        let (a, b, c) = (sxx[(i, j)], syy[(i, j)], sxy[(i, j)]);
        let trace = a + b;
        a * b - c * c - k * trace * trace
    })
}

/// Strict local maximum in its 3x3 neighborhood.
/// On plateaus, the first pixel in raster order wins.
fn is_local_max(response: &DMatrix<Float>, i: usize, j: usize) -> bool {
    let r = response[(i, j)];
    for di in 0..3 {
        for dj in 0..3 {
            let (ni, nj) = (i + di - 1, j + dj - 1);
            if (ni, nj) == (i, j) {
                continue;
            }
            let before = (ni, nj) < (i, j);
            let other = response[(ni, nj)];
            if other > r || (before && other == r) {
                return false;
            }
        }
    }
    true
}

/// Corners of an image, strongest first.
pub fn detect(mat: &DMatrix<u8>, parameters: &HarrisParameters) -> Vec<(Point2, Float)> {
    let response = corner_response(mat, parameters.k);
    let (nb_rows, nb_cols) = mat.shape();
    // Gradients and window sums leave a 2 pixels border undetermined.
    let border = 2;
    let mut corners = Vec::new();
    if nb_rows <= 2 * border || nb_cols <= 2 * border {
        return corners;
    }
    for i in border..(nb_rows - border) {
        for j in border..(nb_cols - border) {
            let r = response[(i, j)];
            if r > parameters.threshold && is_local_max(&response, i, j) {
                corners.push((Point2::new(j as Float, i as Float), r));
            }
        }
    }
    // Stable sort: equal responses keep the raster order.
    corners.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    corners.truncate(parameters.max_features);
    corners
}

impl Dfn for HarrisDetector2D {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.configuration_file = Some(file_path.to_path_buf());
    }

    fn configure(&mut self) -> Result<()> {
        config::reload(self.configuration_file.as_ref(), &mut self.parameters)
    }

    fn process(&mut self) {
        self.features.clear();
        if let Some(mat) = super::intensities(&self.image, "Harris") {
            let corners = detect(&mat, &self.parameters);
            self.features = VisualPointFeatureVector2D::from_points(corners.into_iter().map(|(p, _)| p));
        }
        tracing::debug!("Harris: {} corners", self.features.len());
    }
}

impl FeaturesExtraction2D for HarrisDetector2D {
    fn frame_input(&mut self, image: &Frame) {
        self.image.clone_from(image);
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

    fn chessboard(size: usize, cell: usize) -> DMatrix<u8> {
        DMatrix::from_fn(size, size, |i, j| {
            if (i / cell + j / cell) % 2 == 0 {
                20
            } else {
                230
            }
        })
    }

    #[test]
    fn chessboard_corners_are_at_junctions() {
        let cell = 10;
        let corners = detect(&chessboard(60, cell), &HarrisParameters::default());
        // 5 x 5 inner junctions.
        assert!(corners.len() >= 25, "only {} corners", corners.len());
        for (p, _) in corners.iter() {
            let dx = (p.x + 0.5) % cell as Float;
            let dy = (p.y + 0.5) % cell as Float;
            let near = |d: Float| d.min(cell as Float - d) <= 2.0;
            assert!(near(dx) && near(dy), "corner {} far from a junction", p);
        }
    }

    #[test]
    fn flat_image_has_no_corner() {
        let flat = DMatrix::from_element(30, 30, 128u8);
        assert!(detect(&flat, &HarrisParameters::default()).is_empty());
    }

    #[test]
    fn strongest_first_and_capped() {
        let parameters = HarrisParameters {
            max_features: 4,
            ..HarrisParameters::default()
        };
        let corners = detect(&chessboard(60, 10), &parameters);
        assert_eq!(corners.len(), 4);
        assert!(corners.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn module_on_frames() {
        let mut dfn = HarrisDetector2D::default();
        dfn.configure().unwrap();
        let frame = interop::frame_from_matrix(&chessboard(40, 10)).unwrap();
        let features = executor::extract_features_2d(&mut dfn, &frame);
        assert!(!features.is_empty());
        assert_eq!(features.descriptor_size(), 0);
        let empty = executor::extract_features_2d(&mut dfn, &Frame::empty());
        assert!(empty.is_empty());
    }

    #[test]
    fn invalid_parameters() {
        let parameters = HarrisParameters {
            k: 0.0,
            ..HarrisParameters::default()
        };
        assert!(HarrisDetector2D::new(parameters).configure().is_err());
    }
}
