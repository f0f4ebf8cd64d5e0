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

//! The transient box model (`spec.md` §4.5) and sub-model tracing
//! (`spec.md` §4.6).

use std::cell::Cell;

use cgmath::Vector3;

use crate::arena::{Brush, BrushSide, ClipMapData, ContentFlags, SubModel, SurfaceFlags};
use crate::brush::{clip_box_to_brush, TraceResult};
use crate::math::Plane;

/// An on-demand six-sided brush acting as a first-class model handle for
/// entity-vs-entity queries (`spec.md` §4.5).
///
/// `ClipMap` keeps exactly one of these in a single slot, overwritten on
/// every `TempBoxModel` request; it is not reentrant across concurrent
/// callers (`spec.md` §5).
#[derive(Debug)]
pub struct TempBoxModel {
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
    contents: ContentFlags,
    planes: [Plane; 6],
    sides: [BrushSide; 6],
    brush: Brush,
}

impl TempBoxModel {
    pub fn new(mins: Vector3<f32>, maxs: Vector3<f32>, contents: ContentFlags) -> TempBoxModel {
        // Six axial planes whose intersection is the box interior, the same
        // "synthesize six half-spaces" idiom used to build a bounded
        // collision hull from an AABB.
        let planes = [
            Plane::axis_x(maxs.x),
            Plane::new(Vector3::new(-1.0, 0.0, 0.0), -mins.x),
            Plane::axis_y(maxs.y),
            Plane::new(Vector3::new(0.0, -1.0, 0.0), -mins.y),
            Plane::axis_z(maxs.z),
            Plane::new(Vector3::new(0.0, 0.0, -1.0), -mins.z),
        ];

        let plane_indices: [usize; 6] = [0, 1, 2, 3, 4, 5];
        let sides = plane_indices.map(|plane| BrushSide {
            plane,
            surface_flags: SurfaceFlags::empty(),
        });

        let brush = Brush {
            first_side: 0,
            num_sides: 6,
            contents,
            visited: Cell::new(0),
        };

        TempBoxModel {
            mins,
            maxs,
            contents,
            planes,
            sides,
            brush,
        }
    }

    pub fn mins(&self) -> Vector3<f32> {
        self.mins
    }

    pub fn maxs(&self) -> Vector3<f32> {
        self.maxs
    }

    /// Point-contents against the sentinel: AABB containment test.
    pub fn point_contents(&self, point: Vector3<f32>) -> ContentFlags {
        let inside = point.x >= self.mins.x
            && point.x <= self.maxs.x
            && point.y >= self.mins.y
            && point.y <= self.maxs.y
            && point.z >= self.mins.z
            && point.z <= self.maxs.z;

        if inside {
            self.contents
        } else {
            ContentFlags::empty()
        }
    }

    /// Box-trace against the sentinel: one call into the brush kernel.
    pub fn trace(
        &self,
        start: Vector3<f32>,
        end: Vector3<f32>,
        mins: Vector3<f32>,
        maxs: Vector3<f32>,
        mask: ContentFlags,
    ) -> TraceResult {
        let mut result = TraceResult::unobstructed(start, end);
        clip_box_to_brush(
            &self.planes,
            &self.sides,
            &self.brush,
            start,
            end,
            mins,
            maxs,
            mask,
            &mut result,
        );
        result.finish(start, end);
        result
    }
}

/// Sweeps a sub-model's own brush slice, independent of the world tree
/// (`spec.md` §4.6).
///
/// The reference engine implements this by temporarily installing the
/// sub-model's brush list into leaf 0 and running the ordinary leaf-trace
/// path; since every `ClipMap` query already requires `&mut` access for
/// mutation (this trace counter included), that installation is purely an
/// implementation detail of the reference loader's scratch-leaf reuse. This
/// crate gets the same atomicity (no other trace can interleave) directly
/// from the borrow checker and iterates the sub-model's brushes in place.
pub fn trace_submodel(
    data: &ClipMapData,
    sub_model: &SubModel,
    start: Vector3<f32>,
    end: Vector3<f32>,
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
    mask: ContentFlags,
    counter: u64,
) -> TraceResult {
    let mut result = TraceResult::unobstructed(start, end);

    let range = sub_model.first_brush..sub_model.first_brush + sub_model.num_brushes;
    let brushes = match data.brushes.get(range) {
        Some(b) => b,
        None => {
            log::warn!("trace_submodel: out-of-range brush list");
            result.finish(start, end);
            return result;
        }
    };

    for brush in brushes {
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
            &mut result,
        );
    }

    result.finish(start, end);
    result
}

/// Accumulates content bits for every brush containing `point` in a
/// sub-model's brush slice (used by `PointContents` against an inline
/// model handle).
pub fn submodel_point_contents(
    data: &ClipMapData,
    sub_model: &SubModel,
    point: Vector3<f32>,
) -> ContentFlags {
    let range = sub_model.first_brush..sub_model.first_brush + sub_model.num_brushes;
    let brushes = match data.brushes.get(range) {
        Some(b) => b,
        None => {
            log::warn!("submodel_point_contents: out-of-range brush list");
            return ContentFlags::empty();
        }
    };

    let mut contents = ContentFlags::empty();
    for brush in brushes {
        if crate::brush::point_in_brush(&data.planes, &data.brush_sides, brush, point) {
            contents |= brush.contents;
        }
    }
    contents
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn temp_box_contains_interior_point() {
        let tbm = TempBoxModel::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(16.0, 16.0, 16.0),
            ContentFlags::SOLID,
        );
        assert_eq!(
            tbm.point_contents(Vector3::new(8.0, 8.0, 8.0)),
            ContentFlags::SOLID
        );
        assert_eq!(
            tbm.point_contents(Vector3::new(100.0, 8.0, 8.0)),
            ContentFlags::empty()
        );
    }

    #[test]
    fn temp_box_trace_hits_face() {
        let tbm = TempBoxModel::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(16.0, 16.0, 16.0),
            ContentFlags::SOLID,
        );
        let start = Vector3::new(-50.0, 8.0, 8.0);
        let end = Vector3::new(50.0, 8.0, 8.0);
        let result = tbm.trace(
            start,
            end,
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            ContentFlags::SOLID,
        );
        assert!(result.fraction < 1.0);
        assert!(!result.start_solid);
    }
}
