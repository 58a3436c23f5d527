// src/scene/builder.rs
//
// Point cloud -> octree node pool. Recursive octant partitioning with compact
// child storage; a cell becomes an in-slot color once its samples agree or it
// reaches the finest subdivision the traversal can address (half-extent 1).

use rustc_hash::FxHashMap;

use crate::scene::octree::{is_color, NodeRecord, Scene, COLOR_LEAF};
use crate::scene::pointset::Point;

const DX: usize = 4;
const DY: usize = 2;
const DZ: usize = 1;

pub fn build_scene(points: &[Point], depth: i32) -> Scene {
    let half = 1i64 << depth;
    let mut pts = merge_duplicates(points);
    for p in &pts {
        assert!(
            p.pos.iter().all(|&c| (c as i64) >= -half && (c as i64) < half),
            "point {:?} outside the scene cube",
            p.pos
        );
    }

    let mut builder = Builder {
        nodes: vec![NodeRecord::new(0, [0; 8], 0)],
    };
    if pts.is_empty() {
        return Scene::from_nodes(builder.nodes, depth);
    }

    let root = builder.build_cell(&mut pts, [0, 0, 0], half);
    if is_color(root) {
        // A uniform scene still needs a root record; give it a full fan of
        // color children so octree descent reproduces the color everywhere.
        builder.nodes[0] = NodeRecord::new(0xff, [root; 8], root);
    } else {
        // The root record is pushed last in post-order; move it to slot 0.
        let last = builder.nodes.len() - 1;
        debug_assert_eq!(root as usize, last);
        builder.nodes[0] = builder.nodes[last];
        builder.nodes.pop();
    }
    Scene::from_nodes(builder.nodes, depth)
}

struct Builder {
    nodes: Vec<NodeRecord>,
}

impl Builder {
    /// Returns a node index, or a color value (>= COLOR_LEAF) for uniform cells.
    fn build_cell(&mut self, pts: &mut [Point], center: [i64; 3], half: i64) -> u32 {
        debug_assert!(!pts.is_empty());
        debug_assert!(half >= 1);

        if half == 1 || uniform(pts) {
            return mix_colors(pts.iter().map(|p| p.color)) | COLOR_LEAF;
        }

        // Order the slice into the 8 octant groups (x bit, then y, then z).
        let mid_x = partition_in_place(pts, |p| (p.pos[0] as i64) < center[0]);
        let mut bounds = [0usize; 9];
        bounds[8] = pts.len();
        bounds[4] = mid_x;
        for (base, lo, hi) in [(0usize, 0usize, mid_x), (4, mid_x, pts.len())] {
            let mid_y = lo + partition_in_place(&mut pts[lo..hi], |p| (p.pos[1] as i64) < center[1]);
            bounds[base + 2] = mid_y;
            for (base, lo, hi) in [(base, lo, mid_y), (base + 2, mid_y, hi)] {
                bounds[base + 1] =
                    lo + partition_in_place(&mut pts[lo..hi], |p| (p.pos[2] as i64) < center[2]);
            }
        }

        let quarter = half / 2;
        let mut presence = 0u8;
        let mut children = [0u32; 8];
        let mut slot = 0;
        for i in 0..8 {
            let (lo, hi) = (bounds[i], bounds[i + 1]);
            if lo == hi {
                continue;
            }
            let child_center = [
                center[0] + if i & DX != 0 { quarter } else { -quarter },
                center[1] + if i & DY != 0 { quarter } else { -quarter },
                center[2] + if i & DZ != 0 { quarter } else { -quarter },
            ];
            children[slot] = self.build_cell(&mut pts[lo..hi], child_center, quarter);
            presence |= 1 << i;
            slot += 1;
        }

        let avg = mix_colors((0..slot).map(|j| {
            let v = children[j];
            if is_color(v) {
                v
            } else {
                self.nodes[v as usize].avgcolor()
            }
        }));

        let id = self.nodes.len() as u32;
        assert!(id < COLOR_LEAF, "node pool exhausted the index space");
        self.nodes.push(NodeRecord::new(presence, children, avg));
        id
    }
}

/// Samples at identical positions are merged (channel-wise mean) before the
/// recursion so duplicates cannot force needless subdivision.
fn merge_duplicates(points: &[Point]) -> Vec<Point> {
    let mut acc: FxHashMap<[i32; 3], ([u64; 4], u64)> = FxHashMap::default();
    for p in points {
        let (sums, n) = acc.entry(p.pos).or_default();
        let ch = channels(p.color);
        for k in 0..4 {
            sums[k] += ch[k] as u64;
        }
        *n += 1;
    }
    acc.into_iter()
        .map(|(pos, (sums, n))| Point {
            pos,
            color: pack(sums.map(|s| (s / n) as u32)),
        })
        .collect()
}

fn uniform(pts: &[Point]) -> bool {
    pts.iter().all(|p| p.color == pts[0].color)
}

fn mix_colors(colors: impl Iterator<Item = u32>) -> u32 {
    let mut sums = [0u64; 4];
    let mut n = 0u64;
    for c in colors {
        let ch = channels(c);
        for k in 0..4 {
            sums[k] += ch[k] as u64;
        }
        n += 1;
    }
    debug_assert!(n > 0);
    pack(sums.map(|s| (s / n) as u32))
}

#[inline]
fn channels(c: u32) -> [u32; 4] {
    [c >> 24, (c >> 16) & 0xff, (c >> 8) & 0xff, c & 0xff]
}

#[inline]
fn pack(ch: [u32; 4]) -> u32 {
    (ch[0] << 24) | (ch[1] << 16) | (ch[2] << 8) | ch[3]
}

fn partition_in_place<F: FnMut(&Point) -> bool>(pts: &mut [Point], mut pred: F) -> usize {
    let mut i = 0;
    let mut j = pts.len();
    while i < j {
        if pred(&pts[i]) {
            i += 1;
        } else {
            j -= 1;
            pts.swap(i, j);
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_builds_bare_root() {
        let scene = build_scene(&[], 4);
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.node(0).presence(), 0);
    }

    #[test]
    fn single_point_builds_one_chain() {
        let color = 0xff112233;
        let scene = build_scene(&[Point { pos: [3, 5, 7], color }], 4);
        // Octant path for (3,5,7) at depth 4: 7, 0, 3, 5, then the color cell.
        assert_eq!(scene.len(), 4);

        let root = scene.node(0);
        assert_eq!(root.presence(), 1 << 7);
        assert_eq!(root.avgcolor(), color);

        let a = scene.node(root.child(root.position(7)));
        assert_eq!(a.presence(), 1 << 0);
        let b = scene.node(a.child(a.position(0)));
        assert_eq!(b.presence(), 1 << 3);
        let c = scene.node(b.child(b.position(3)));
        assert_eq!(c.presence(), 1 << 5);
        assert_eq!(c.child(c.position(5)), color);
        assert_eq!(c.avgcolor(), color);
    }

    #[test]
    fn uniform_cloud_collapses_to_color_root() {
        let color = 0xffa0b0c0;
        let pts: Vec<Point> = (0..8)
            .map(|i| Point {
                pos: [
                    if i & 4 != 0 { 8 } else { -8 },
                    if i & 2 != 0 { 8 } else { -8 },
                    if i & 1 != 0 { 8 } else { -8 },
                ],
                color,
            })
            .collect();
        let scene = build_scene(&pts, 4);
        assert_eq!(scene.len(), 1);
        let root = scene.node(0);
        assert_eq!(root.presence(), 0xff);
        for j in 0..8 {
            assert_eq!(root.child(j), color);
        }
        assert_eq!(root.avgcolor(), color);
    }

    #[test]
    fn colors_in_one_cell_average() {
        // Both samples land in the finest cell around (1,1,1).
        let pts = [
            Point { pos: [0, 0, 0], color: 0xff0a141e },
            Point { pos: [1, 1, 1], color: 0xff1e2832 },
        ];
        let scene = build_scene(&pts, 4);

        let mut node = scene.node(0);
        let mut slot = None;
        for _ in 0..4 {
            assert_eq!(node.presence().count_ones(), 1);
            let i = node.presence().trailing_zeros() as usize;
            slot = Some(node.child(node.position(i)));
            if is_color(slot.unwrap()) {
                break;
            }
            node = scene.node(slot.unwrap());
        }
        assert_eq!(slot, Some(0xff141e28));
    }

    #[test]
    fn duplicate_positions_merge_before_building() {
        let pts = [
            Point { pos: [2, 2, 2], color: 0xff000000 },
            Point { pos: [2, 2, 2], color: 0xff0000ff },
        ];
        let scene = build_scene(&pts, 4);
        assert_eq!(scene.node(0).avgcolor(), 0xff00007f);
    }

    #[test]
    #[should_panic]
    fn out_of_range_point_is_rejected() {
        build_scene(&[Point { pos: [99, 0, 0], color: 0xffffffff }], 4);
    }
}
