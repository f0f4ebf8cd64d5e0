// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! `ClipMap`: the public collision/visibility surface (`spec.md` §6).

use cgmath::Vector3;

use crate::arena::{ClipMapData, ContentFlags};
use crate::brush::{point_contents as leaf_point_contents, ray_extents, TraceResult};
use crate::error::ClipError;
use crate::model::{submodel_point_contents, trace_submodel, TempBoxModel};
use crate::tree::{point_leafnum, sweep};
use crate::vis::{in_pvs, in_pvs_ignore_portals, AreaPortalMatrix};

/// An opaque reference to something a `BoxTrace`/`PointContents` query can be
/// run against: the world, an inline brush entity, or the transient box
/// sentinel (`spec.md` §3: "SubModel... A special sentinel handle denotes
/// the transient box").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Handle {
    /// Sub-model index; `0` is always the world.
    Model(usize),
    /// The single-slot transient box (`spec.md` §4.5).
    TransientBox,
}

impl Handle {
    pub fn world() -> Handle {
        Handle::Model(0)
    }
}

/// The loaded collision world plus its mutable query-time state: the
/// trace-visited counter, the transient box slot, and the area-portal
/// matrix (`spec.md` §5: "Shared-resource policy").
#[derive(Debug)]
pub struct ClipMap {
    data: ClipMapData,
    loaded_name: Option<String>,
    counter: u64,
    temp_box: Option<TempBoxModel>,
    portals: AreaPortalMatrix,
}

impl Default for ClipMap {
    fn default() -> ClipMap {
        ClipMap::new()
    }
}

impl ClipMap {
    /// An unloaded clip map: the empty sentinel level, no open portals.
    pub fn new() -> ClipMap {
        ClipMap {
            data: ClipMapData::empty(),
            loaded_name: None,
            counter: 0,
            temp_box: None,
            portals: AreaPortalMatrix::new(0),
        }
    }

    /// Loads a compiled level image (`spec.md` §4.1).
    ///
    /// `name` identifies the level for the idempotence check (`spec.md` §4.1,
    /// Invariant I7): loading the same name twice is a no-op. `data` is the
    /// already-resolved byte buffer; resolving a name to bytes (file, pak
    /// entry, network fetch) is the caller's responsibility.
    pub fn load_level(&mut self, name: impl Into<String>, data: &[u8]) -> Result<(), ClipError> {
        let name = name.into();
        if self.loaded_name.as_deref() == Some(name.as_str()) {
            return Ok(());
        }

        let parsed = crate::load::load(data)?;
        let area_count = parsed.area_count;

        self.data = parsed;
        self.portals = AreaPortalMatrix::new(area_count);
        self.temp_box = None;
        self.loaded_name = Some(name);

        Ok(())
    }

    /// Resets to the empty sentinel level (`spec.md` §4.1: "ClearMap").
    pub fn clear_level(&mut self) {
        self.data = ClipMapData::empty();
        self.portals = AreaPortalMatrix::new(0);
        self.temp_box = None;
        self.loaded_name = None;
    }

    /// Number of inline brush-entity models (excludes the world, sub-model
    /// 0).
    pub fn num_inline_models(&self) -> usize {
        self.data.sub_models.len().saturating_sub(1)
    }

    /// A handle to sub-model `index` (`0` is the world).
    pub fn inline_model(&self, index: usize) -> Option<Handle> {
        if index < self.data.sub_models.len() {
            Some(Handle::Model(index))
        } else {
            None
        }
    }

    /// Synthesizes the transient box sentinel (`spec.md` §4.5). Overwrites
    /// any previously issued transient box: the slot is single-owner, not
    /// reentrant.
    pub fn temp_box_model(&mut self, mins: Vector3<f32>, maxs: Vector3<f32>, contents: ContentFlags) -> Handle {
        self.temp_box = Some(TempBoxModel::new(mins, maxs, contents));
        Handle::TransientBox
    }

    fn next_counter(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        self.counter
    }

    /// Content bits of whatever brush(es) at `point` belong to `handle`.
    pub fn point_contents(&self, point: Vector3<f32>, handle: Handle) -> ContentFlags {
        match handle {
            Handle::Model(0) => {
                let leaf_idx = point_leafnum(&self.data, point);
                let leaf = match self.data.leafs.get(leaf_idx) {
                    Some(l) => l,
                    None => return ContentFlags::empty(),
                };
                let range = leaf.first_leaf_brush..leaf.first_leaf_brush + leaf.num_leaf_brushes;
                let brush_list = match self.data.leaf_brushes.get(range) {
                    Some(l) => l,
                    None => return ContentFlags::empty(),
                };
                leaf_point_contents(&self.data.planes, &self.data.brush_sides, &self.data.brushes, brush_list, point)
            }
            Handle::Model(i) => match self.data.sub_models.get(i) {
                Some(sub_model) => submodel_point_contents(&self.data, sub_model, point),
                None => ContentFlags::empty(),
            },
            Handle::TransientBox => self
                .temp_box
                .as_ref()
                .map(|b| b.point_contents(point))
                .unwrap_or_else(ContentFlags::empty),
        }
    }

    /// `PointContents` evaluated in `handle`'s local frame, translated by
    /// `origin` (and, in the zero-angle case only, `angles`; see `spec.md`
    /// §9 Open Questions for the non-zero-rotation gap).
    pub fn transformed_point_contents(
        &self,
        point: Vector3<f32>,
        handle: Handle,
        origin: Vector3<f32>,
        angles: Vector3<f32>,
    ) -> ContentFlags {
        warn_if_rotated(angles);
        self.point_contents(point - origin, handle)
    }

    /// Sweeps an AABB from `start` to `end` against `handle`.
    ///
    /// `use_cylinder` is accepted for API compatibility but always takes the
    /// AABB path: a cylindrical sweep primitive is not implemented (`spec.md`
    /// §9 Open Questions).
    #[allow(clippy::too_many_arguments)]
    pub fn box_trace(
        &mut self,
        start: Vector3<f32>,
        end: Vector3<f32>,
        mins: Vector3<f32>,
        maxs: Vector3<f32>,
        handle: Handle,
        mask: ContentFlags,
        use_cylinder: bool,
    ) -> TraceResult {
        if use_cylinder {
            log::debug!("box_trace: useCylinder requested, falling back to the AABB path");
        }

        match handle {
            Handle::Model(0) => {
                let counter = self.next_counter();
                let mut result = TraceResult::unobstructed(start, end);
                sweep(&self.data, start, end, mins, maxs, mask, counter, &mut result);
                result.finish(start, end);
                result
            }
            Handle::Model(i) => match self.data.sub_models.get(i) {
                Some(sub_model) => {
                    let counter = self.next_counter();
                    trace_submodel(&self.data, sub_model, start, end, mins, maxs, mask, counter)
                }
                None => {
                    log::warn!("box_trace: out-of-range sub-model handle {}", i);
                    let mut result = TraceResult::unobstructed(start, end);
                    result.finish(start, end);
                    result
                }
            },
            Handle::TransientBox => match &self.temp_box {
                Some(b) => b.trace(start, end, mins, maxs, mask),
                None => {
                    let mut result = TraceResult::unobstructed(start, end);
                    result.finish(start, end);
                    result
                }
            },
        }
    }

    /// A pure ray trace: `BoxTrace` with zero-extent `mins`/`maxs`.
    pub fn ray_trace(&mut self, start: Vector3<f32>, end: Vector3<f32>, handle: Handle, mask: ContentFlags) -> TraceResult {
        let (mins, maxs) = ray_extents();
        self.box_trace(start, end, mins, maxs, handle, mask, false)
    }

    /// `BoxTrace` in `handle`'s local frame, translated by `origin`. See
    /// [`ClipMap::transformed_point_contents`] for the rotation caveat.
    #[allow(clippy::too_many_arguments)]
    pub fn transformed_box_trace(
        &mut self,
        start: Vector3<f32>,
        end: Vector3<f32>,
        mins: Vector3<f32>,
        maxs: Vector3<f32>,
        handle: Handle,
        mask: ContentFlags,
        use_cylinder: bool,
        origin: Vector3<f32>,
        angles: Vector3<f32>,
    ) -> TraceResult {
        warn_if_rotated(angles);

        let mut result = self.box_trace(start - origin, end - origin, mins, maxs, handle, mask, use_cylinder);
        result.end_pos += origin;
        result
    }

    /// The leaf index containing `point` (`spec.md` §4.2).
    pub fn point_leafnum(&self, point: Vector3<f32>) -> usize {
        point_leafnum(&self.data, point)
    }

    /// `leaf`'s cluster id, or `-1` if `leaf` is out of range.
    pub fn leaf_cluster(&self, leaf: usize) -> i32 {
        self.data.leafs.get(leaf).map(|l| l.cluster).unwrap_or(-1)
    }

    /// `leaf`'s area id, or `-1` if `leaf` is out of range.
    pub fn leaf_area(&self, leaf: usize) -> i32 {
        self.data.leafs.get(leaf).map(|l| l.area).unwrap_or(-1)
    }

    /// True if a point at `p1` can potentially see a point at `p2`, honoring
    /// area-portal state (`spec.md` §4.8).
    pub fn in_pvs(&self, p1: Vector3<f32>, p2: Vector3<f32>) -> bool {
        in_pvs(&self.data, &self.portals, p1, p2)
    }

    /// `InPVS` without the area-portal check.
    pub fn in_pvs_ignore_portals(&self, p1: Vector3<f32>, p2: Vector3<f32>) -> bool {
        in_pvs_ignore_portals(&self.data, p1, p2)
    }

    /// Opens or closes the portal between areas `a` and `b` (`spec.md`
    /// §4.8).
    pub fn adjust_area_portal_state(&mut self, a: i32, b: i32, open: bool) {
        self.portals.adjust(a, b, open);
    }

    /// True if `a == b` or the portal between them is open.
    pub fn areas_connected(&self, a: i32, b: i32) -> bool {
        self.portals.connected(a, b)
    }

    /// The level's NUL-terminated entity text, verbatim.
    pub fn entity_string(&self) -> &[u8] {
        &self.data.entity_string
    }
}

fn warn_if_rotated(angles: Vector3<f32>) {
    if angles.x != 0.0 || angles.y != 0.0 || angles.z != 0.0 {
        log::warn!("transformed query with non-zero angles {:?}: rotation is not implemented, translation only", angles);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_clip_map_is_empty_and_inert() {
        let mut clip_map = ClipMap::new();
        assert_eq!(clip_map.point_contents(Vector3::new(0.0, 0.0, 0.0), Handle::world()), ContentFlags::empty());

        let start = Vector3::new(0.0, 0.0, 0.0);
        let end = Vector3::new(1000.0, 0.0, 0.0);
        let result = clip_map.ray_trace(start, end, Handle::world(), ContentFlags::all());
        assert_eq!(result.fraction, 1.0);
        assert_eq!(result.end_pos, end);
    }

    #[test]
    fn temp_box_round_trips_through_point_contents() {
        let mut clip_map = ClipMap::new();
        let handle = clip_map.temp_box_model(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(16.0, 16.0, 16.0),
            ContentFlags::SOLID,
        );
        assert_eq!(
            clip_map.point_contents(Vector3::new(8.0, 8.0, 8.0), handle),
            ContentFlags::SOLID
        );
    }

    #[test]
    fn area_portal_toggle_is_visible_through_the_public_api() {
        let mut clip_map = ClipMap::new();
        clip_map.portals = AreaPortalMatrix::new(8);
        assert!(!clip_map.areas_connected(3, 7));
        clip_map.adjust_area_portal_state(3, 7, true);
        assert!(clip_map.areas_connected(3, 7));
        assert!(clip_map.areas_connected(7, 3));
    }

    #[test]
    fn clear_level_resets_to_empty() {
        let mut clip_map = ClipMap::new();
        clip_map.temp_box_model(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0), ContentFlags::SOLID);
        clip_map.clear_level();
        assert_eq!(clip_map.num_inline_models(), 0);
        assert!(clip_map.entity_string().starts_with(&[0]));
    }
}
