// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Closed-form rigid alignment of matched 3D points.

use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion};

use crate::misc::type_aliases::{Iso3d, Point3d, Vec3d};

/// Ratio between the second and first singular values of the
/// cross-covariance below which the points are considered collinear.
const DEGENERACY_RATIO: f64 = 1e-9;

/// Rigid motion `T` minimizing `sum |T * source_i - sink_i|^2`.
///
/// Returns `None` with less than 3 pairs or when the points are
/// collinear, in which case the rotation is not determined.
pub fn rigid_alignment(source: &[Point3d], sink: &[Point3d]) -> Option<Iso3d> {
    assert_eq!(source.len(), sink.len(), "points must be matched by pairs");
    if source.len() < 3 {
        return None;
    }
    let source_center = centroid(source);
    let sink_center = centroid(sink);

    // Cross-covariance H = sum (s - s0) (t - t0)^T.
    let mut h = Matrix3::zeros();
    for (s, t) in source.iter().zip(sink) {
        h += (s - source_center) * (t - sink_center).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    // Singular values are sorted in decreasing order.
    let singular = &svd.singular_values;
    if !(singular[0] > 0.0) || singular[1] <= DEGENERACY_RATIO * singular[0] {
        return None;
    }

    // R = V U^T, with the last column of V flipped if it is a reflection.
    let v = v_t.transpose();
    let mut correction = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        correction[(2, 2)] = -1.0;
    }
    let rotation_matrix = v * correction * u.transpose();
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));
    let translation = sink_center.coords - rotation * source_center.coords;
    Some(Iso3d::from_parts(Translation3::from(translation), rotation))
}

/// Mean of the points. The points must not be empty.
pub fn centroid(points: &[Point3d]) -> Point3d {
    let sum: Vec3d = points.iter().map(|p| p.coords).sum();
    Point3d::from(sum / points.len() as f64)
}

/// Root mean square of the residuals of `transform` on matched points.
pub fn rms_error(transform: &Iso3d, source: &[Point3d], sink: &[Point3d]) -> f64 {
    if source.is_empty() {
        return 0.0;
    }
    let squared: f64 = source
        .iter()
        .zip(sink)
        .map(|(s, t)| (transform * s - t).norm_squared())
        .sum();
    (squared / source.len() as f64).sqrt()
}

// TESTS #############################################################
