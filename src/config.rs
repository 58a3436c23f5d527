// src/config.rs
// -------------
// Global tuning knobs for the renderer and the viewer app.

/// Log2 of the scene cube's half-extent in integer scene units.
/// The root octant spans [-1 << SCENE_DEPTH, 1 << SCENE_DEPTH) on each axis.
pub const SCENE_DEPTH: i32 = 26;

/// Occlusion quadtree depth. The tile is QUADTREE_SIZE x QUADTREE_SIZE pixels
/// and must cover the output surface.
pub const QUADTREE_DEPTH: u32 = 10;
pub const QUADTREE_SIZE: u32 = 1 << QUADTREE_DEPTH;

/// Initial window size. Kept at or below QUADTREE_SIZE so the occlusion tile
/// always covers the swapchain.
pub const WINDOW_WIDTH: u32 = 1024;
pub const WINDOW_HEIGHT: u32 = 768;

/// Vertical field of view for the viewer camera.
pub const FOV_Y_DEG: f64 = 60.0;

/// Point records buffered by PointWriter before hitting the disk.
pub const POINT_BUFFER_LEN: usize = 1 << 16;

/// Half-extent (in scene units) of the generated demo terrain patch.
pub const DEMO_TERRAIN_HALF: i32 = 256;

/// Default scene file, generated on first run when no path is given.
pub const DEFAULT_SCENE_PATH: &str = "demo_scene.oct";

/// Camera movement per frame in scene units (the demo terrain is voxel-scale,
/// so this is deliberately small relative to the full scene cube).
pub const MOVE_SPEED: f64 = 2.5;
pub const MOUSE_SENS: f64 = 0.0025;
