use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use winit::{dpi::PhysicalSize, event_loop::EventLoop, window::WindowBuilder};

use svo_render::{app, config, scene};

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_SCENE_PATH));

    let scene = if path.exists() {
        println!("loading scene {}", path.display());
        scene::Scene::load(&path)?
    } else {
        println!("no scene at {}, generating demo terrain", path.display());
        let points = svo_render::worldgen::WorldGen::new(12345)
            .generate_points(config::DEMO_TERRAIN_HALF);
        let scene = scene::build_scene(&points, config::SCENE_DEPTH);
        scene.save(&path)?;
        println!("built {} nodes from {} samples", scene.len(), points.len());
        scene
    };

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("svo-render")
            .with_inner_size(PhysicalSize::new(
                config::WINDOW_WIDTH,
                config::WINDOW_HEIGHT,
            ))
            .build(&event_loop)?,
    );

    pollster::block_on(app::run(event_loop, window, scene));
    Ok(())
}
