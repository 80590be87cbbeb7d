// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reference implementations of the modules, enough to run the chains
//! end to end on rectified grayscale stereo images.
//!
//! Each module reads its parameters from a JSON file (see `Dfn::set_configuration_file`),
//! keys missing from the file take their default value.

pub mod block_matching;
pub mod brute_force_matcher;
pub mod harris;
pub mod icp;
pub mod pairwise_rigid;
pub mod patch_descriptor;
pub mod triangulation;

pub use self::block_matching::BlockMatchingStereo;
pub use self::brute_force_matcher::BruteForceMatcher;
pub use self::harris::HarrisDetector2D;
pub use self::icp::IterativeClosestPoint;
pub use self::pairwise_rigid::PairwiseRigidEstimation;
pub use self::patch_descriptor::PatchDescriptor;
pub use self::triangulation::Triangulation;

use nalgebra::DMatrix;

use crate::core::types::Frame;
use crate::misc::interop;

/// Intensities of an 8 bits frame, or `None` (with a warning)
/// for empty frames and frames without an 8 bits intensity.
fn intensities(frame: &Frame, module: &str) -> Option<DMatrix<u8>> {
    if frame.is_empty() {
        tracing::warn!("{}: empty input frame", module);
        return None;
    }
    match interop::matrix_from_frame(frame) {
        Ok(mat) => Some(mat),
        Err(err) => {
            tracing::warn!("{}: {}", module, err);
            None
        }
    }
}
