// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Incremental 3D reconstruction from a stream of stereo image pairs.
//!
//! Processing steps are pluggable modules (DFNs) sharing a uniform
//! set-inputs / process / read-outputs contract, see `core::dfn`.
//! Reconstruction chains (`core::reconstruction`) assemble such modules
//! to estimate the camera pose at each stereo pair and accumulate
//! a persistent voxelized map of the scene.

pub mod core;
pub mod dataset;
pub mod error;
pub mod math;
pub mod misc;
