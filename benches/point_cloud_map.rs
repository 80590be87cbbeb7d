// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Point3;
use stereo_reconstruction::core::point_cloud_map::{FusionPolicy, PointCloudMap};
use stereo_reconstruction::core::types::{PointCloud, Pose3D};

/// Dense cloud of a 320x240 depth map of a slanted plane.
fn slanted_plane() -> PointCloud {
    let mut points = Vec::with_capacity(320 * 240);
    for v in 0..240 {
        for u in 0..320 {
            let (x, y) = (u as f32 / 100.0 - 1.6, v as f32 / 100.0 - 1.2);
            points.push(Point3::new(x, y, 4.0 + 0.5 * x));
        }
    }
    PointCloud::from_points(points)
}

fn criterion_benchmark(c: &mut Criterion) {
    let cloud = slanted_plane();
    c.bench_function("add_point_cloud 76800 points", |b| {
        b.iter(|| {
            let mut map = PointCloudMap::new(1e-2, FusionPolicy::Average).unwrap();
            map.add_point_cloud(&cloud, &Pose3D::identity()).unwrap()
        })
    });

    let mut map = PointCloudMap::new(1e-2, FusionPolicy::KeepFirst).unwrap();
    for i in 0..5 {
        let pose = Pose3D::from_translation(0.2 * i as f64, 0.0, 0.0);
        map.add_point_cloud(&cloud, &pose).unwrap();
    }
    c.bench_function("scene_point_cloud_in_origin radius 2", |b| {
        let pose = Pose3D::from_translation(0.4, 0.0, 0.0);
        b.iter(|| map.scene_point_cloud_in_origin(&pose, 2.0).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
