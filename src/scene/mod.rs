// src/scene/mod.rs

pub mod builder;
pub mod octree;
pub mod pointset;

pub use builder::build_scene;
pub use octree::{is_color, NodeRecord, Scene, COLOR_LEAF};
pub use pointset::{Point, PointSet, PointWriter};
