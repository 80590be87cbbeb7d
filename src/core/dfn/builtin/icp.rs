// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Point to point iterative closest point registration.
//!
//! Nearest neighbors are looked up in a grid over the sink cloud with
//! cells as large as the maximum correspondence distance. Each iteration
//! re-matches the source points and solves the rigid alignment in closed form.

use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::dfn::{Dfn, Registration3D};
use crate::core::types::{PointCloud, Pose3D};
use crate::error::{Error, Result};
use crate::math::optimizer::{Continue, OptimizerState};
use crate::math::rigid;
use crate::misc::config::{self, Validate};
use crate::misc::type_aliases::{Float, Iso3d, Point3d};

/// Parameters of the ICP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpParameters {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Source points farther than this from any sink point are not matched.
    pub max_correspondence_distance: Float,
    /// Stop when an iteration translates less than this.
    pub translation_threshold: Float,
    /// Stop when an iteration rotates less than this (radians).
    pub rotation_threshold: Float,
    /// Registration fails with fewer matched points.
    pub min_correspondences: usize,
}

impl Default for IcpParameters {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            max_correspondence_distance: 0.5,
            translation_threshold: 1e-5,
            rotation_threshold: 1e-5,
            min_correspondences: 10,
        }
    }
}

impl Validate for IcpParameters {
    fn validate(&self) -> Result<()> {
        if !(self.max_correspondence_distance > 0.0 && self.max_correspondence_distance.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "max correspondence distance must be positive, got {}",
                self.max_correspondence_distance
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfiguration(
                "ICP needs at least one iteration".to_string(),
            ));
        }
        if self.min_correspondences < 3 {
            return Err(Error::InvalidConfiguration(format!(
                "ICP needs at least 3 correspondences, got {}",
                self.min_correspondences
            )));
        }
        Ok(())
    }
}

type Cell = (i64, i64, i64);

/// Sink points bucketed by cells of a fixed size.
pub struct SinkGrid {
    cell_size: f64,
    points: Vec<Point3d>,
    cells: HashMap<Cell, Vec<usize>>,
}

impl SinkGrid {
    /// Grid over the valid points of a cloud.
    pub fn new(cloud: &PointCloud, cell_size: f64) -> Self {
        let points: Vec<Point3d> = cloud.valid_points().map(|p| p.cast::<f64>()).collect();
        let mut cells: HashMap<Cell, Vec<usize>> = HashMap::new();
        for (index, p) in points.iter().enumerate() {
            cells.entry(cell_of(p, cell_size)).or_default().push(index);
        }
        Self {
            cell_size,
            points,
            cells,
        }
    }

    /// Number of points in the grid.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the grid holds no point.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest point within `cell_size` of `query`.
    pub fn nearest(&self, query: &Point3d) -> Option<&Point3d> {
        let (ci, cj, ck) = cell_of(query, self.cell_size);
        let max_squared = self.cell_size * self.cell_size;
        let mut best: Option<(f64, usize)> = None;
        let buckets = iproduct!(-1..=1, -1..=1, -1..=1)
            .filter_map(|(di, dj, dk)| self.cells.get(&(ci + di, cj + dj, ck + dk)));
        for &index in buckets.flatten() {
            let d = (self.points[index] - query).norm_squared();
            if d <= max_squared && best.map_or(true, |(b, _)| d < b) {
                best = Some((d, index));
            }
        }
        best.map(|(_, index)| &self.points[index])
    }
}

fn cell_of(p: &Point3d, cell_size: f64) -> Cell {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Fixed data of the iterations.
pub struct Obs<'a> {
    /// Valid source points.
    pub source: &'a [Point3d],
    /// Grid over the sink points.
    pub sink: &'a SinkGrid,
    /// Parameters.
    pub parameters: &'a IcpParameters,
}

/// Current motion and the pairs it matches.
pub struct IcpState {
    /// Motion of the source into the sink frame.
    pub model: Iso3d,
    /// Matched source points.
    pub matched_source: Vec<Point3d>,
    /// Their nearest sink points.
    pub matched_sink: Vec<Point3d>,
    /// RMS distance of the matched pairs.
    pub rms: f64,
    max_iterations: usize,
    translation_threshold: f64,
    rotation_threshold: f64,
    min_correspondences: usize,
}

impl IcpState {
    fn matched(obs: &Obs, model: Iso3d) -> Self {
        let mut matched_source = Vec::new();
        let mut matched_sink = Vec::new();
        for p in obs.source {
            if let Some(q) = obs.sink.nearest(&(model * p)) {
                matched_source.push(*p);
                matched_sink.push(*q);
            }
        }
        let rms = rigid::rms_error(&model, &matched_source, &matched_sink);
        Self {
            model,
            matched_source,
            matched_sink,
            rms,
            max_iterations: obs.parameters.max_iterations,
            translation_threshold: obs.parameters.translation_threshold as f64,
            rotation_threshold: obs.parameters.rotation_threshold as f64,
            min_correspondences: obs.parameters.min_correspondences,
        }
    }

    /// Number of matched pairs.
    pub fn correspondences(&self) -> usize {
        self.matched_source.len()
    }
}

impl<'a> OptimizerState<Obs<'a>, IcpState, Iso3d, String> for IcpState {
    fn init(obs: &Obs<'a>, model: Iso3d) -> Self {
        Self::matched(obs, model)
    }

    /// Closed form alignment of the current pairs.
    fn step(&self) -> std::result::Result<Iso3d, String> {
        if self.correspondences() < self.min_correspondences {
            return Err(format!("only {} correspondences", self.correspondences()));
        }
        rigid::rigid_alignment(&self.matched_source, &self.matched_sink)
            .ok_or_else(|| "degenerate correspondences".to_string())
    }

    fn eval(&self, obs: &Obs<'a>, model: Iso3d) -> IcpState {
        Self::matched(obs, model)
    }

    /// Stop when the motion stalls, after too many iterations,
    /// or when the new motion loses too many pairs.
    fn stop_criterion(self, nb_iter: usize, eval_state: IcpState) -> (Self, Continue) {
        if eval_state.correspondences() < self.min_correspondences {
            return (self, Continue::Stop);
        }
        let delta = self.model.inverse() * eval_state.model;
        let stalled = delta.translation.vector.norm() < self.translation_threshold
            && delta.rotation.angle() < self.rotation_threshold;
        if stalled || nb_iter >= self.max_iterations {
            (eval_state, Continue::Stop)
        } else {
            (eval_state, Continue::Forward)
        }
    }
}

/// ICP registration module.
///
/// `transform_output()` moves source points into the sink frame.
#[derive(Debug, Default)]
pub struct IterativeClosestPoint {
    configuration_file: Option<PathBuf>,
    /// Current parameters.
    pub parameters: IcpParameters,
    source: PointCloud,
    sink: PointCloud,
    guess: Pose3D,
    use_guess: bool,
    transform: Pose3D,
    success: bool,
}

impl IterativeClosestPoint {
    /// ICP with the given parameters.
    pub fn new(parameters: IcpParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }

    fn initial_model(&self) -> Iso3d {
        if !self.use_guess {
            return Iso3d::identity();
        }
        self.guess.to_isometry().unwrap_or_else(|| {
            tracing::warn!("ICP: invalid transform guess, starting from identity");
            Iso3d::identity()
        })
    }
}

impl Dfn for IterativeClosestPoint {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.configuration_file = Some(file_path.to_path_buf());
    }

    fn configure(&mut self) -> Result<()> {
        config::reload(self.configuration_file.as_ref(), &mut self.parameters)
    }

    fn process(&mut self) {
        self.transform = Pose3D::identity();
        self.success = false;
        let source: Vec<Point3d> = self.source.valid_points().map(|p| p.cast::<f64>()).collect();
        let sink = SinkGrid::new(&self.sink, self.parameters.max_correspondence_distance as f64);
        let obs = Obs {
            source: &source,
            sink: &sink,
            parameters: &self.parameters,
        };
        match IcpState::iterative_solve(&obs, self.initial_model()) {
            Ok((state, nb_iter)) => {
                self.success = state.correspondences() >= self.parameters.min_correspondences;
                self.transform = Pose3D::from_isometry(&state.model);
                tracing::debug!(
                    "ICP: {} iterations, {} pairs, rms {}",
                    nb_iter,
                    state.correspondences(),
                    state.rms
                );
            }
            Err(reason) => {
                tracing::debug!(
                    "ICP: failed with {} source and {} sink points: {}",
                    source.len(),
                    sink.len(),
                    reason
                );
            }
        }
    }
}

impl Registration3D for IterativeClosestPoint {
    fn source_cloud_input(&mut self, cloud: &PointCloud) {
        self.source.clone_from(cloud);
    }

    fn sink_cloud_input(&mut self, cloud: &PointCloud) {
        self.sink.clone_from(cloud);
    }

    fn transform_guess_input(&mut self, guess: &Pose3D) {
        self.guess = *guess;
    }

    fn use_guess_input(&mut self, use_guess: bool) {
        self.use_guess = use_guess;
    }

    fn transform_output(&self) -> &Pose3D {
        &self.transform
    }

    fn success_output(&self) -> bool {
        self.success
    }
}

// TESTS #############################################################
