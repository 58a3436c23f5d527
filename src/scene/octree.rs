// src/scene/octree.rs
//
// Scene octree storage: a flat pool of fixed-size node records with the root
// at index 0. Child slots hold either another node's index or, for values at
// or above COLOR_LEAF, a color rendered in place of a subtree.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::config;

/// Child-slot values at or above this are colors, not node indices. Real node
/// pools never grow anywhere near this many records.
pub const COLOR_LEAF: u32 = 0xff00_0000;

#[inline]
pub fn is_color(id: u32) -> bool {
    id >= COLOR_LEAF
}

/// On-disk and in-memory node record (37 bytes, packed).
///
/// `children` is addressed through the presence bitmap: logical child `i`
/// lives at storage slot `position(i)`, the popcount of presence bits below
/// `i`. Slots past the last set bit are meaningless.
#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct NodeRecord {
    presence: u8,
    children: [u32; 8],
    avgcolor: u32,
}

impl NodeRecord {
    pub fn new(presence: u8, children: [u32; 8], avgcolor: u32) -> Self {
        Self {
            presence,
            children,
            avgcolor,
        }
    }

    #[inline]
    pub fn presence(&self) -> u8 {
        self.presence
    }

    #[inline]
    pub fn has_index(&self, i: usize) -> bool {
        debug_assert!(i < 8);
        self.presence & (1 << i) != 0
    }

    /// Storage slot of logical child `i`.
    #[inline]
    pub fn position(&self, i: usize) -> usize {
        debug_assert!(i < 8);
        (self.presence as u32 & ((1u32 << i) - 1)).count_ones() as usize
    }

    #[inline]
    pub fn child(&self, j: usize) -> u32 {
        // Copy out of the packed array; never hand out references into it.
        let children = self.children;
        children[j]
    }

    #[inline]
    pub fn avgcolor(&self) -> u32 {
        self.avgcolor
    }
}

pub struct Scene {
    nodes: Vec<NodeRecord>,
    depth: i32,
}

impl Scene {
    /// Wrap a node pool. `depth` is the log2 half-extent of the root octant.
    pub fn from_nodes(nodes: Vec<NodeRecord>, depth: i32) -> Self {
        assert!(!nodes.is_empty(), "scene needs at least a root node");
        assert!((1..=config::SCENE_DEPTH).contains(&depth));
        Self { nodes, depth }
    }

    #[inline]
    pub fn node(&self, id: u32) -> &NodeRecord {
        debug_assert!(!is_color(id));
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Load a node pool written by `save`. The file is the raw record array
    /// with no header; the root is record 0.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("could not read scene file {}", path.display()))?;
        let records: &[NodeRecord] = bytemuck::try_cast_slice(&bytes).map_err(|e| {
            anyhow!(
                "{} is not a whole number of node records: {e:?}",
                path.display()
            )
        })?;
        if records.is_empty() {
            return Err(anyhow!("{} holds no nodes", path.display()));
        }
        let scene = Self::from_nodes(records.to_vec(), config::SCENE_DEPTH);
        scene.validate()?;
        Ok(scene)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, bytemuck::cast_slice(&self.nodes))
            .with_context(|| format!("could not write scene file {}", path.display()))
    }

    /// Check that every referenced child slot holds a color or an in-range
    /// node index. The traversal itself trusts the pool.
    pub fn validate(&self) -> Result<()> {
        let len = self.nodes.len() as u32;
        for (id, node) in self.nodes.iter().enumerate() {
            for i in 0..8 {
                if !node.has_index(i) {
                    continue;
                }
                let child = node.child(node.position(i));
                if !is_color(child) && child >= len {
                    return Err(anyhow!(
                        "node {id}: child {i} points at record {child} of {len}"
                    ));
                }
            }
        }
        Ok(())
    }
}
