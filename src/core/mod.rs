// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Core functionalities of stereo reconstruction.

pub mod camera;
pub mod dfn;
pub mod gradient;
pub mod history;
pub mod point_cloud_map;
pub mod quadruple;
pub mod reconstruction;
pub mod types;
