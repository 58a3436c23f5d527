// src/app/mod.rs
//
// Viewer glue: winit event loop, camera/input integration, one CPU-rendered
// frame per redraw, then a texture upload + blit to present it.

pub mod gpu;

use std::sync::Arc;
use std::time::Instant;

use glam::DVec3;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::Window,
};

use crate::camera::Camera;
use crate::config;
use crate::input::InputState;
use crate::profiler::FrameProf;
use crate::render::{Renderer, Surface};
use crate::scene::Scene;
use self::gpu::Gfx;

pub async fn run(event_loop: EventLoop<()>, window: Arc<Window>, scene: Scene) {
    let mut app = App::new(window, scene).await;

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            match event {
                Event::AboutToWait => app.window.request_redraw(),
                Event::WindowEvent {
                    event: WindowEvent::RedrawRequested,
                    ..
                } => app.frame(),
                _ => app.handle_event(event, elwt),
            }
        })
        .unwrap();
}

struct App {
    window: Arc<Window>,
    gfx: Gfx,
    renderer: Renderer,
    scene: Scene,
    camera: Camera,
    input: InputState,
    profiler: FrameProf,
    frame_buf: Vec<u32>,
    frame_size: (u32, u32),
}

impl App {
    async fn new(window: Arc<Window>, scene: Scene) -> Self {
        let size = window.inner_size();
        let frame_size = clamp_to_tile(size.width, size.height);
        let gfx = Gfx::new(window.clone(), frame_size.0, frame_size.1).await;

        // Hover above the demo terrain, looking toward its middle.
        let camera = Camera::new(DVec3::new(0.0, 90.0, -(config::DEMO_TERRAIN_HALF as f64)));

        Self {
            window,
            gfx,
            renderer: Renderer::new(config::QUADTREE_DEPTH),
            scene,
            camera,
            input: InputState::default(),
            profiler: FrameProf::new(),
            frame_buf: vec![0; (frame_size.0 * frame_size.1) as usize],
            frame_size,
        }
    }

    fn handle_event(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) {
        match event {
            Event::DeviceEvent { event, .. } => self.input.on_device_event(&event),
            Event::WindowEvent { event, .. } => {
                self.input.on_window_event(&event, &self.window);
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(new_size) => {
                        self.gfx.resize(new_size.width, new_size.height);
                        self.frame_size = clamp_to_tile(new_size.width, new_size.height);
                        self.frame_buf
                            .resize((self.frame_size.0 * self.frame_size.1) as usize, 0);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn frame(&mut self) {
        let t_frame = Instant::now();

        self.camera.integrate_input(&mut self.input);

        let (w, h) = self.frame_size;
        let view = self.camera.view_pane(w, h);
        let stats = {
            let mut surf = Surface {
                width: w,
                height: h,
                pixels: &mut self.frame_buf,
            };
            self.renderer.render(
                &self.scene,
                &mut surf,
                &view,
                self.camera.position(),
                self.camera.orientation(),
            )
        };
        self.profiler.add_render(&stats);

        let t_upload = Instant::now();
        let presented = self.gfx.present_frame(&self.frame_buf, w, h);
        if presented {
            self.profiler.upload(FrameProf::mark_ms(t_upload));
        }

        self.profiler.end_frame(FrameProf::mark_ms(t_frame));
    }
}

/// The occlusion quadtree covers at most QUADTREE_SIZE pixels per side; the
/// rendered frame is clamped to that and scaled up by the blit if the window
/// is larger.
fn clamp_to_tile(width: u32, height: u32) -> (u32, u32) {
    (
        width.clamp(1, config::QUADTREE_SIZE),
        height.clamp(1, config::QUADTREE_SIZE),
    )
}
