use criterion::{criterion_group, criterion_main, Criterion};
use glam::{DMat3, DVec3};

use svo_render::worldgen::WorldGen;
use svo_render::{build_scene, config, Renderer, Surface, ViewPane};

fn frame_walk(c: &mut Criterion) {
    let points = WorldGen::new(99).generate_points(128);
    let scene = build_scene(&points, config::SCENE_DEPTH);

    let mut renderer = Renderer::new(9);
    let mut pixels = vec![0u32; 512 * 512];
    let view = ViewPane {
        left: -0.7,
        right: 0.7,
        top: -0.7,
        bottom: 0.7,
    };
    let position = DVec3::new(0.0, 80.0, -260.0);

    c.bench_function("render_512", |b| {
        b.iter(|| {
            let mut surf = Surface {
                width: 512,
                height: 512,
                pixels: &mut pixels,
            };
            renderer.render(&scene, &mut surf, &view, position, DMat3::IDENTITY)
        })
    });
}

criterion_group!(benches, frame_walk);
criterion_main!(benches);
