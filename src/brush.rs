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

//! The brush intersection kernel: point-inside-brush containment and
//! AABB-sweep-vs-brush clip fractions (`spec.md` §4.3).

use cgmath::{InnerSpace, Vector3, Zero};

use crate::arena::{Brush, BrushSide, ContentFlags, SurfaceFlags};
use crate::math::{Plane, DIST_EPSILON};

/// The outcome of a swept-AABB trace against the world, a sub-model, or the
/// transient box model (`spec.md` §3: "Trace result").
#[derive(Clone, Debug)]
pub struct TraceResult {
    /// `0` = stuck at start, `1` = swept the whole way with no hit.
    pub fraction: f32,
    pub end_pos: Vector3<f32>,
    pub plane_normal: Option<Vector3<f32>>,
    pub plane_dist: f32,
    pub surface_flags: SurfaceFlags,
    pub contents: ContentFlags,
    pub start_solid: bool,
    pub all_solid: bool,
}

impl TraceResult {
    /// The neutral "swept the whole distance, nothing in the way" result.
    pub fn unobstructed(start: Vector3<f32>, end: Vector3<f32>) -> TraceResult {
        TraceResult {
            fraction: 1.0,
            end_pos: end,
            plane_normal: None,
            plane_dist: 0.0,
            surface_flags: SurfaceFlags::empty(),
            contents: ContentFlags::empty(),
            start_solid: false,
            all_solid: false,
        }
        .with_start_fallback(start)
    }

    // endpos for a fraction-1 trace is always `end`; this helper exists only
    // to keep `start` in scope for symmetry with the allsolid/fraction-0 case.
    fn with_start_fallback(self, _start: Vector3<f32>) -> TraceResult {
        self
    }

    /// Recomputes `end_pos` from the final fraction, per the invariant
    /// `endpos = start + fraction * (end - start)` unless `fraction == 0 &&
    /// allsolid`, in which case `endpos = start` (`spec.md` §3).
    pub fn finish(&mut self, start: Vector3<f32>, end: Vector3<f32>) {
        if self.fraction == 0.0 && self.all_solid {
            self.end_pos = start;
        } else {
            self.end_pos = start + self.fraction * (end - start);
        }
    }
}

/// Tests whether `point` lies inside `brush` (`spec.md` §4.3.1): true iff
/// `n·P - d <= 0` for every side.
pub fn point_in_brush(planes: &[Plane], sides: &[BrushSide], brush: &Brush, point: Vector3<f32>) -> bool {
    for side_idx in brush.sides() {
        let side = match sides.get(side_idx) {
            Some(s) => s,
            None => continue,
        };
        let plane = match planes.get(side.plane) {
            Some(p) => p,
            None => continue,
        };

        if plane.distance_to_point(point) > 0.0 {
            return false;
        }
    }

    true
}

/// Clips the swept AABB `[start, end]` (expanded by `mins`/`maxs`) against a
/// single brush, updating `result` in place if this brush produces an
/// earlier hit than anything seen so far (`spec.md` §4.3.2).
///
/// `result.fraction`/`plane_normal`/`surface_flags`/`contents` carry the
/// best-so-far hit across calls; `result.end_pos` is not touched here and
/// must be finalized with [`TraceResult::finish`] once the whole sweep is
/// done.
pub fn clip_box_to_brush(
    planes: &[Plane],
    sides: &[BrushSide],
    brush: &Brush,
    start: Vector3<f32>,
    end: Vector3<f32>,
    mins: Vector3<f32>,
    maxs: Vector3<f32>,
    mask: ContentFlags,
    result: &mut TraceResult,
) {
    if (brush.contents & mask).is_empty() {
        return;
    }

    if brush.num_sides == 0 {
        return;
    }

    let mut enter_frac = -1.0f32;
    let mut leave_frac = 1.0f32;
    let mut started_outside = false;
    let mut ended_outside = false;
    let mut clip_plane: Option<&Plane> = None;
    let mut clip_surface_flags = SurfaceFlags::empty();

    for side_idx in brush.sides() {
        let side = match sides.get(side_idx) {
            Some(s) => s,
            None => continue,
        };
        let plane = match planes.get(side.plane) {
            Some(p) => p,
            None => continue,
        };

        let offset = plane.box_offset(mins, maxs);
        let d1 = plane.distance_to_point(start) - offset;
        let d2 = plane.distance_to_point(end) - offset;

        if d1 > 0.0 {
            started_outside = true;
        }
        if d2 > 0.0 {
            ended_outside = true;
        }

        // box is, and remains, strictly in front of this side: the sweep
        // never touches the brush at all.
        if d1 > 0.0 && d2 >= d1 {
            return;
        }

        // sweep stays behind this side the whole way: no constraint.
        if d1 <= 0.0 && d2 <= 0.0 {
            continue;
        }

        if d1 > d2 {
            // entering
            let f = ((d1 - DIST_EPSILON) / (d1 - d2)).max(0.0);
            if f > enter_frac {
                enter_frac = f;
                clip_plane = Some(plane);
                clip_surface_flags = side.surface_flags;
            }
        } else {
            // leaving
            let f = ((d1 + DIST_EPSILON) / (d1 - d2)).min(1.0);
            if f < leave_frac {
                leave_frac = f;
            }
        }
    }

    if !started_outside {
        result.start_solid = true;
        result.fraction = 0.0;
        result.contents = brush.contents;
        if !ended_outside {
            result.all_solid = true;
        }
        return;
    }

    if enter_frac < leave_frac && enter_frac >= 0.0 && enter_frac < result.fraction {
        result.fraction = enter_frac;
        if let Some(plane) = clip_plane {
            result.plane_normal = Some(plane.normal());
            result.plane_dist = plane.dist();
        }
        result.surface_flags = clip_surface_flags;
        result.contents = brush.contents;
    }
}

/// Accumulates the content bits of every brush in `brush_indices` that
/// contains `point`, skipping out-of-range indices (`spec.md` §4.9).
pub fn point_contents(
    planes: &[Plane],
    sides: &[BrushSide],
    brushes: &[Brush],
    brush_indices: &[i32],
    point: Vector3<f32>,
) -> ContentFlags {
    let mut contents = ContentFlags::empty();

    for &raw in brush_indices {
        if raw < 0 {
            continue;
        }
        let brush = match brushes.get(raw as usize) {
            Some(b) => b,
            None => {
                log::warn!("leaf brush list referenced out-of-range brush {}", raw);
                continue;
            }
        };

        if point_in_brush(planes, sides, brush, point) {
            contents |= brush.contents;
        }
    }

    contents
}

/// An all-zero vector, used as the query extents for a pure ray trace.
pub fn ray_extents() -> (Vector3<f32>, Vector3<f32>) {
    (Vector3::zero(), Vector3::zero())
}
