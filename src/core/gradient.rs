// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to compute gradients and local sums.
//!
//! Matrices are indexed `(row, column)`, i.e. `(y, x)` in the image.

use nalgebra::DMatrix;

use crate::misc::type_aliases::Float;

/// Horizontal centered gradient `(right - left) / 2`.
/// Border columns are 0.
pub fn centered_x(mat: &DMatrix<u8>) -> DMatrix<Float> {
    let (nb_rows, nb_cols) = mat.shape();
    DMatrix::from_fn(nb_rows, nb_cols, |i, j| {
        if j == 0 || j + 1 >= nb_cols {
            0.0
        } else {
            (mat[(i, j + 1)] as Float - mat[(i, j - 1)] as Float) / 2.0
        }
    })
}

/// Vertical centered gradient `(bottom - top) / 2`.
/// Border rows are 0.
pub fn centered_y(mat: &DMatrix<u8>) -> DMatrix<Float> {
    let (nb_rows, nb_cols) = mat.shape();
    DMatrix::from_fn(nb_rows, nb_cols, |i, j| {
        if i == 0 || i + 1 >= nb_rows {
            0.0
        } else {
            (mat[(i + 1, j)] as Float - mat[(i - 1, j)] as Float) / 2.0
        }
    })
}

/// Sum over the 3x3 neighborhood of each element.
/// Elements on the border are 0.
pub fn box_sum_3x3(mat: &DMatrix<Float>) -> DMatrix<Float> {
    let (nb_rows, nb_cols) = mat.shape();
    DMatrix::from_fn(nb_rows, nb_cols, |i, j| {
        if i == 0 || j == 0 || i + 1 >= nb_rows || j + 1 >= nb_cols {
            0.0
        } else {
            mat.view((i - 1, j - 1), (3, 3)).sum()
        }
    })
}

// TESTS #############################################################
