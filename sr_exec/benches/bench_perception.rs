//! # Perception Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use image::{Rgb, RgbImage};
use nalgebra::Point2;
use sr_lib::{
    map::{SharedWorldMap, WorldMap, WorldMapParams},
    nav::NavMode,
    per::{classify, geom, PerInput, PerMgr, PerMgrParams, Pose},
};
use util::module::State;

/// A frame with bright ground in the lower half, dark rock walls above, and a yellow sample.
fn synthetic_frame() -> RgbImage {
    RgbImage::from_fn(320, 160, |x, y| {
        if (150..170).contains(&x) && (100..110).contains(&y) {
            Rgb([200, 180, 20])
        } else if y > 80 {
            Rgb([190, 180, 170])
        } else {
            Rgb([60, 50, 40])
        }
    })
}

fn perception_benchmark(c: &mut Criterion) {
    // ---- Build the perception manager ----

    let params = PerMgrParams::default();
    let world_map = SharedWorldMap::new(WorldMap::new(WorldMapParams::default()));
    let mut per_mgr = PerMgr::init((params.clone(), world_map)).unwrap();

    let input = PerInput {
        frame: synthetic_frame(),
        pose: Pose::new(Point2::new(100.0, 100.0), 45.0, 0.0, 0.0),
        mode: NavMode::Forward,
    };

    // Bench the individual stages
    let (warped, valid) =
        geom::warp_to_ground_plane(&input.frame, &params.src_quad, &params.dst_quad(), &params.fov)
            .unwrap();

    c.bench_function("geom::warp_to_ground_plane", |b| {
        b.iter(|| {
            geom::warp_to_ground_plane(
                &input.frame,
                &params.src_quad,
                &params.dst_quad(),
                &params.fov,
            )
            .unwrap()
        })
    });

    c.bench_function("classify::classify", |b| {
        b.iter(|| classify::classify(&warped, &valid, &params.thresholds))
    });

    // Bench a full cycle, including the world map update
    c.bench_function("PerMgr::proc", |b| b.iter(|| per_mgr.proc(&input).unwrap()));
}

criterion_group!(benches, perception_benchmark);
criterion_main!(benches);
