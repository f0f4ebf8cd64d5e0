// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Compiled level arenas.
//!
//! Everything in this module is built once by [`crate::load`] and afterwards
//! read-only, except for [`Brush::visited`] (the per-trace visited tag, see
//! `spec.md` Invariant M) and the sentinel leaf-0 brush-list override used by
//! sub-model traces (see [`crate::model`]).

use std::cell::Cell;

use bitflags::bitflags;
use cgmath::Vector3;

use crate::math::Plane;

bitflags! {
    /// Per-brush volumetric properties (`spec.md` Glossary: "Content flags").
    pub struct ContentFlags: u32 {
        const SOLID          = 1 << 0;
        const LAVA           = 1 << 3;
        const SLIME          = 1 << 4;
        const WATER          = 1 << 5;
        const FOG             = 1 << 6;
        const AREAPORTAL     = 1 << 15;
        const PLAYERCLIP     = 1 << 16;
        const MONSTERCLIP    = 1 << 17;
        const TELEPORTER     = 1 << 18;
        const JUMPPAD        = 1 << 19;
        const CLUSTERPORTAL  = 1 << 20;
        const DONOTENTER     = 1 << 21;
        const ORIGIN         = 1 << 24;
        const BODY           = 1 << 25;
        const CORPSE         = 1 << 26;
        const DETAIL         = 1 << 27;
        const STRUCTURAL     = 1 << 28;
        const TRANSLUCENT    = 1 << 29;
        const TRIGGER        = 1 << 30;
        const NODROP         = 1 << 31;
    }
}

bitflags! {
    /// Per-brush-side material properties (`spec.md` Glossary: "Surface flags").
    pub struct SurfaceFlags: u32 {
        const NODAMAGE   = 1 << 0;
        const SLICK      = 1 << 1;
        const SKY        = 1 << 2;
        const LADDER     = 1 << 3;
        const NOIMPACT   = 1 << 4;
        const NOMARKS    = 1 << 5;
        const FLESH      = 1 << 6;
        const NODRAW     = 1 << 7;
        const HINT       = 1 << 8;
        const SKIP       = 1 << 9;
        const NOLIGHTMAP = 1 << 10;
        const NODLIGHT   = 1 << 11;
        const METALSTEPS = 1 << 12;
        const NOSTEPS    = 1 << 13;
        const NONSOLID   = 1 << 14;
    }
}

/// A single compiled shader/material entry (lump 0), the source of the
/// content and surface flag bitsets adopted by brushes and brush sides.
#[derive(Clone, Debug)]
pub struct Shader {
    pub name: String,
    pub surface_flags: SurfaceFlags,
    pub content_flags: ContentFlags,
}

/// One bounding half-space of a [`Brush`].
#[derive(Clone, Debug)]
pub struct BrushSide {
    pub plane: usize,
    pub surface_flags: SurfaceFlags,
}

/// A convex solid: the intersection of its sides' half-spaces.
#[derive(Debug)]
pub struct Brush {
    pub first_side: usize,
    pub num_sides: usize,
    pub contents: ContentFlags,

    /// The trace counter value at which this brush was last processed.
    /// See `spec.md` Invariant M.
    pub(crate) visited: Cell<u64>,
}

impl Brush {
    pub fn sides(&self) -> std::ops::Range<usize> {
        self.first_side..self.first_side + self.num_sides
    }
}

/// Either an internal node or a leaf, as encoded by the compiled level's
/// child references (`spec.md` §3: "a leaf index encoded as the bitwise
/// complement of the leaf index").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeChild {
    Node(usize),
    Leaf(usize),
}

impl NodeChild {
    /// Decodes a raw signed child reference as stored in the compiled level.
    pub fn from_raw(raw: i32) -> NodeChild {
        if raw >= 0 {
            NodeChild::Node(raw as usize)
        } else {
            NodeChild::Leaf((!raw) as usize)
        }
    }
}

/// A BSP splitting node.
#[derive(Debug)]
pub struct Node {
    pub plane: usize,
    pub children: [NodeChild; 2],
}

/// A convex leaf region: a cluster id, an area id, and a slice into the
/// shared leaf-brush table.
///
/// Leaf 0 is the sentinel "empty" leaf (`spec.md` §3); its brush slice is
/// ordinarily empty but may be temporarily overridden by a sub-model trace
/// (see [`crate::model`]).
#[derive(Debug)]
pub struct Leaf {
    pub cluster: i32,
    pub area: i32,
    pub first_leaf_brush: usize,
    pub num_leaf_brushes: usize,
}

/// A sub-model: an AABB plus a contiguous brush slice. Sub-model 0 is the
/// world; handles 1..N are inline brush entities.
#[derive(Debug)]
pub struct SubModel {
    pub mins: Vector3<f32>,
    pub maxs: Vector3<f32>,
    pub first_brush: usize,
    pub num_brushes: usize,
}

/// The dense cluster-PVS bitset (`spec.md` §3: "Visibility matrix"). Absence
/// of this structure is treated as "all clusters visible".
#[derive(Debug)]
pub struct Visibility {
    pub num_clusters: usize,
    pub cluster_bytes: usize,
    pub data: Box<[u8]>,
}

impl Visibility {
    /// True if cluster `to` may be visible from cluster `from`.
    pub fn visible(&self, from: i32, to: i32) -> bool {
        if from < 0 || to < 0 {
            return false;
        }
        let (from, to) = (from as usize, to as usize);
        if from >= self.num_clusters || to >= self.num_clusters {
            return false;
        }

        let row = &self.data[from * self.cluster_bytes..(from + 1) * self.cluster_bytes];
        let byte = to / 8;
        let bit = to % 8;
        byte < row.len() && row[byte] & (1 << bit) != 0
    }
}

/// All arenas produced by [`crate::load`] for a single compiled level.
#[derive(Debug)]
pub struct ClipMapData {
    pub shaders: Box<[Shader]>,
    pub planes: Box<[Plane]>,
    pub brush_sides: Box<[BrushSide]>,
    pub brushes: Box<[Brush]>,
    pub nodes: Box<[Node]>,
    pub leafs: Box<[Leaf]>,
    pub leaf_brushes: Box<[i32]>,
    pub sub_models: Box<[SubModel]>,
    pub visibility: Option<Visibility>,
    pub entity_string: Box<[u8]>,
    pub area_count: usize,
}

impl ClipMapData {
    /// An empty level: no nodes, a single sentinel leaf, no sub-models but
    /// for the mandatory world model 0. Matches the "ClearMap" state required
    /// by `spec.md` §4.1.
    pub fn empty() -> ClipMapData {
        ClipMapData {
            shaders: Box::new([]),
            planes: Box::new([]),
            brush_sides: Box::new([]),
            brushes: Box::new([]),
            nodes: Box::new([]),
            leafs: vec![Leaf {
                cluster: -1,
                area: -1,
                first_leaf_brush: 0,
                num_leaf_brushes: 0,
            }]
            .into_boxed_slice(),
            leaf_brushes: Box::new([]),
            sub_models: vec![SubModel {
                mins: Vector3::new(0.0, 0.0, 0.0),
                maxs: Vector3::new(0.0, 0.0, 0.0),
                first_brush: 0,
                num_brushes: 0,
            }]
            .into_boxed_slice(),
            visibility: None,
            entity_string: Box::new([0u8]),
            area_count: 0,
        }
    }

    /// Validates that every arena cross-reference lands in range. Called once
    /// after a level is loaded; violations are logged and defensively
    /// tolerated at query time rather than treated as load failures
    /// (`spec.md` §4.9, §7).
    pub fn validate(&self) {
        for (i, side) in self.brush_sides.iter().enumerate() {
            if side.plane >= self.planes.len() {
                log::warn!(
                    "brush side {} references out-of-range plane {}",
                    i,
                    side.plane
                );
            }
        }

        for (i, brush) in self.brushes.iter().enumerate() {
            if brush.first_side + brush.num_sides > self.brush_sides.len() {
                log::warn!("brush {} references out-of-range side list", i);
            }
        }

        for (i, leaf) in self.leafs.iter().enumerate() {
            if leaf.first_leaf_brush + leaf.num_leaf_brushes > self.leaf_brushes.len() {
                log::warn!("leaf {} references out-of-range leaf-brush list", i);
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.plane >= self.planes.len() {
                log::warn!("node {} references out-of-range plane {}", i, node.plane);
            }
            for child in &node.children {
                match *child {
                    NodeChild::Node(n) if n >= self.nodes.len() => {
                        log::warn!("node {} has out-of-range child node {}", i, n);
                    }
                    NodeChild::Leaf(l) if l >= self.leafs.len() => {
                        log::warn!("node {} has out-of-range child leaf {}", i, l);
                    }
                    _ => {}
                }
            }
        }
    }
}
