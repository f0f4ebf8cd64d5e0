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

//! The spatial index: point-to-leaf descent (`spec.md` §4.2) and the
//! recursive tree sweep that feeds candidate leafs to the brush kernel
//! (`spec.md` §4.4).

use cgmath::{InnerSpace, Vector3};

use crate::arena::{ContentFlags, NodeChild};
use crate::brush::{clip_box_to_brush, TraceResult};
use crate::arena::ClipMapData;

/// Descends from node 0 to find the leaf containing `point`. An empty tree
/// (no nodes) always resolves to leaf 0 (`spec.md` §4.2).
pub fn point_leafnum(data: &ClipMapData, point: Vector3<f32>) -> usize {
    if data.nodes.is_empty() {
        return 0;
    }

    let mut node_idx = 0usize;
    loop {
        let node = match data.nodes.get(node_idx) {
            Some(n) => n,
            None => {
                log::warn!("point_leafnum: out-of-range node {}", node_idx);
                return 0;
            }
        };
        let plane = match data.planes.get(node.plane) {
            Some(p) => p,
            None => {
                log::warn!("point_leafnum: out-of-range plane {}", node.plane);
                return 0;
            }
        };

        let side = if plane.distance_to_point(point) >= 0.0 { 0 } else { 1 };
        match node.children[side] {
            NodeChild::Node(n) => node_idx = n,
            NodeChild::Leaf(l) => return l,
        }
    }
}

/// Runs the brush kernel against every (not-yet-visited-this-trace) brush
/// listed by `leaf_idx`, updating `result` in place.
fn trace_leaf(
    data: &ClipMapData,
    leaf_idx: usize,
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
    mask: ContentFlags,
    counter: u64,
    start: Vector3<f32>,
    end: Vector3<f32>,
    result: &mut TraceResult,
) {
    let leaf = match data.leafs.get(leaf_idx) {
        Some(l) => l,
        None => {
            log::warn!("trace_leaf: out-of-range leaf {}", leaf_idx);
            return;
        }
    };

    let range = leaf.first_leaf_brush..leaf.first_leaf_brush + leaf.num_leaf_brushes;
    let brush_list = match data.leaf_brushes.get(range.clone()) {
        Some(l) => l,
        None => {
            log::warn!("trace_leaf: leaf {} has out-of-range brush list", leaf_idx);
            return;
        }
    };

    for &raw in brush_list {
        if raw < 0 {
            continue;
        }
        let brush = match data.brushes.get(raw as usize) {
            Some(b) => b,
            None => {
                log::warn!("trace_leaf: out-of-range brush {}", raw);
                continue;
            }
        };

        if brush.visited.get() == counter {
            continue;
        }
        brush.visited.set(counter);

        clip_box_to_brush(
            &data.planes,
            &data.brush_sides,
            brush,
            start,
            end,
            mins,
            maxs,
            mask,
            result,
        );
    }
}

/// Recursive descent over a node/leaf reference, narrowing the parametric
/// window `[p1f, p2f]` of the sweep as it goes (`spec.md` §4.4).
#[allow(clippy::too_many_arguments)]
fn trace_through(
    data: &ClipMapData,
    child: NodeChild,
    p1f: f32,
    p2f: f32,
    p1: Vector3<f32>,
    p2: Vector3<f32>,
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
    mask: ContentFlags,
    counter: u64,
    orig_start: Vector3<f32>,
    orig_end: Vector3<f32>,
    result: &mut TraceResult,
) {
    // Early exit: no hit in this subtree can beat the current best.
    if result.fraction <= p1f {
        return;
    }

    match child {
        NodeChild::Leaf(leaf_idx) => {
            trace_leaf(data, leaf_idx, mins, maxs, mask, counter, orig_start, orig_end, result);
        }
        NodeChild::Node(node_idx) => trace_node(
            data, node_idx, p1f, p2f, p1, p2, mins, maxs, mask, counter, orig_start, orig_end,
            result,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn trace_node(
    data: &ClipMapData,
    node_idx: usize,
    p1f: f32,
    p2f: f32,
    p1: Vector3<f32>,
    p2: Vector3<f32>,
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
    mask: ContentFlags,
    counter: u64,
    orig_start: Vector3<f32>,
    orig_end: Vector3<f32>,
    result: &mut TraceResult,
) {
    if result.fraction <= p1f {
        return;
    }

    let node = match data.nodes.get(node_idx) {
        Some(n) => n,
        None => {
            log::warn!("trace_node: out-of-range node {}", node_idx);
            return;
        }
    };
    let plane = match data.planes.get(node.plane) {
        Some(p) => p,
        None => {
            log::warn!("trace_node: out-of-range plane {}", node.plane);
            return;
        }
    };

    let t1 = plane.distance_to_point(p1);
    let t2 = plane.distance_to_point(p2);
    let offset = plane.sweep_extent(mins, maxs);

    if t1 >= offset + 1.0 && t2 >= offset + 1.0 {
        trace_through(
            data, node.children[0], p1f, p2f, p1, p2, mins, maxs, mask, counter, orig_start,
            orig_end, result,
        );
        return;
    }

    if t1 < -offset - 1.0 && t2 < -offset - 1.0 {
        trace_through(
            data, node.children[1], p1f, p2f, p1, p2, mins, maxs, mask, counter, orig_start,
            orig_end, result,
        );
        return;
    }

    // The slab straddles the plane: descend near side first, then far side.
    let (near, far, frac1, frac2) = if t1 < t2 {
        let idist = 1.0 / (t1 - t2);
        (
            1usize,
            0usize,
            ((t1 - offset - 1.0) * idist).clamp(0.0, 1.0),
            ((t1 + offset + 1.0) * idist).clamp(0.0, 1.0),
        )
    } else if t1 > t2 {
        let idist = 1.0 / (t1 - t2);
        (
            0usize,
            1usize,
            ((t1 + offset + 1.0) * idist).clamp(0.0, 1.0),
            ((t1 - offset - 1.0) * idist).clamp(0.0, 1.0),
        )
    } else {
        (0usize, 1usize, 0.0, 1.0)
    };

    let midf1 = p1f + (p2f - p1f) * frac1;
    let mid1 = p1 + frac1 * (p2 - p1);
    trace_through(
        data,
        node.children[near],
        p1f,
        midf1,
        p1,
        mid1,
        mins,
        maxs,
        mask,
        counter,
        orig_start,
        orig_end,
        result,
    );

    if result.fraction <= midf1 {
        return;
    }

    let midf2 = p1f + (p2f - p1f) * frac2;
    let mid2 = p1 + frac2 * (p2 - p1);
    trace_through(
        data,
        node.children[far],
        midf2,
        p2f,
        mid2,
        p2,
        mins,
        maxs,
        mask,
        counter,
        orig_start,
        orig_end,
        result,
    );
}

/// Sweeps an AABB from `start` to `end` through the whole tree rooted at
/// node 0, writing the earliest hit into `result`. Callers provide a
/// monotonically increasing `counter` so that a brush indexed by several
/// leafs along the path is only processed once (`spec.md` Invariant M).
#[allow(clippy::too_many_arguments)]
pub fn sweep(
    data: &ClipMapData,
    start: Vector3<f32>,
    end: Vector3<f32>,
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
    mask: ContentFlags,
    counter: u64,
    result: &mut TraceResult,
) {
    if data.nodes.is_empty() {
        trace_leaf(data, 0, mins, maxs, mask, counter, start, end, result);
        return;
    }

    trace_through(
        data,
        NodeChild::Node(0),
        0.0,
        1.0,
        start,
        end,
        mins,
        maxs,
        mask,
        counter,
        start,
        end,
        result,
    );
}
