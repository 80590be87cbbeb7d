// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::{Point2, Point3};
use stereo_reconstruction::core::quadruple::{self, PixelMatching, QuadrupleInput};
use stereo_reconstruction::core::types::{CorrespondenceMap2D, PointCloud};

/// Maps of `n` keypoints on a grid, all closing a chain.
fn maps(n: usize) -> (Vec<CorrespondenceMap2D>, PointCloud) {
    let mut left_right = CorrespondenceMap2D::new();
    let mut left_time = CorrespondenceMap2D::new();
    let mut right_time = CorrespondenceMap2D::new();
    let mut past_left_right = CorrespondenceMap2D::new();
    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let (u, v) = ((i % 20) as f32 * 30.0 + 40.0, (i / 20) as f32 * 30.0 + 10.0);
        left_right.add(Point2::new(u, v), Point2::new(u - 20.0, v), 1.0);
        left_time.add(Point2::new(u, v), Point2::new(u + 5.0, v), 1.0);
        right_time.add(Point2::new(u - 20.0, v), Point2::new(u - 15.0, v), 1.0);
        past_left_right.add(Point2::new(u + 5.0, v), Point2::new(u - 15.0, v), 1.0);
        points.push(Point3::new(u / 100.0, v / 100.0, 5.0));
    }
    (
        vec![left_right, left_time, right_time, past_left_right],
        PointCloud::from_points(points),
    )
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("extract_3d_correspondences 200 keypoints", |b| {
        let (maps, cloud) = maps(200);
        let input = QuadrupleInput {
            left_right: &maps[0],
            left_time: &maps[1],
            right_time: &maps[2],
            past_left_right: &maps[3],
            current_cloud: &cloud,
            past_cloud: &cloud,
        };
        b.iter(|| quadruple::extract_3d_correspondences(&input, PixelMatching::Exact))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
