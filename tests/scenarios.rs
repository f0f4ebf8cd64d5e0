//! End-to-end scenarios and quantified invariants run through the public
//! `ClipMap` API against hand-built synthetic level images.

use cgmath::{InnerSpace, Vector3};
use clipcore::{ClipMap, ContentFlags, Handle};

const LUMP_COUNT: usize = 20;
const HEADER_SIZE: usize = 4 + 4 + 4 + LUMP_COUNT * 8;

const LUMP_SHADERS: usize = 0;
const LUMP_PLANES: usize = 1;
const LUMP_LEAF_BRUSHES: usize = 6;
const LUMP_LEAFS: usize = 8;
const LUMP_NODES: usize = 9;
const LUMP_BRUSH_SIDES: usize = 10;
const LUMP_BRUSHES: usize = 11;
const LUMP_SUBMODELS: usize = 13;
const LUMP_ENTITY_STRING: usize = 14;
const LUMP_VISIBILITY: usize = 15;

struct LumpBuilder {
    lumps: [(i32, i32); LUMP_COUNT],
    payload: Vec<u8>,
}

impl LumpBuilder {
    fn new() -> LumpBuilder {
        LumpBuilder {
            lumps: [(0, 0); LUMP_COUNT],
            payload: Vec::new(),
        }
    }

    fn set(&mut self, index: usize, bytes: Vec<u8>) -> &mut Self {
        let offset = HEADER_SIZE as i32 + self.payload.len() as i32;
        self.lumps[index] = (offset, bytes.len() as i32);
        self.payload.extend_from_slice(&bytes);
        self
    }

    fn finish(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(b"FAKK");
        buf.extend_from_slice(&12i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        for (offset, length) in &self.lumps {
            buf.extend_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&length.to_le_bytes());
        }
        buf.extend_from_slice(&self.payload);
        buf
    }
}

fn planes_lump(planes: &[([f32; 3], f32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (normal, dist) in planes {
        for c in normal {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        buf.extend_from_slice(&dist.to_le_bytes());
    }
    buf
}

fn leaf_brushes_lump(indices: &[i32]) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in indices {
        buf.extend_from_slice(&i.to_le_bytes());
    }
    buf
}

fn leafs_lump(leafs: &[(i32, i32, i32, i32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (cluster, area, first_lb, num_lb) in leafs {
        buf.extend_from_slice(&cluster.to_le_bytes());
        buf.extend_from_slice(&area.to_le_bytes());
        for _ in 0..6 {
            buf.extend_from_slice(&0i32.to_le_bytes());
        }
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&first_lb.to_le_bytes());
        buf.extend_from_slice(&num_lb.to_le_bytes());
    }
    buf
}

fn nodes_lump(nodes: &[(i32, i32, i32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (plane, child0, child1) in nodes {
        buf.extend_from_slice(&plane.to_le_bytes());
        buf.extend_from_slice(&child0.to_le_bytes());
        buf.extend_from_slice(&child1.to_le_bytes());
        for _ in 0..6 {
            buf.extend_from_slice(&0i32.to_le_bytes());
        }
    }
    buf
}

fn brush_sides_lump(sides: &[(i32, i32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (plane, shader) in sides {
        buf.extend_from_slice(&plane.to_le_bytes());
        buf.extend_from_slice(&shader.to_le_bytes());
    }
    buf
}

fn brushes_lump(brushes: &[(i32, i32, i32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (first_side, num_sides, shader) in brushes {
        buf.extend_from_slice(&first_side.to_le_bytes());
        buf.extend_from_slice(&num_sides.to_le_bytes());
        buf.extend_from_slice(&shader.to_le_bytes());
    }
    buf
}

fn sub_models_lump(models: &[([f32; 3], [f32; 3], i32, i32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (mins, maxs, first_brush, num_brushes) in models {
        for c in mins {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        for c in maxs {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&first_brush.to_le_bytes());
        buf.extend_from_slice(&num_brushes.to_le_bytes());
    }
    buf
}

fn visibility_lump(num_clusters: i32, cluster_bytes: i32, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&num_clusters.to_le_bytes());
    buf.extend_from_slice(&cluster_bytes.to_le_bytes());
    buf.extend_from_slice(data);
    buf
}

fn entity_string_lump(text: &str) -> Vec<u8> {
    let mut buf = text.as_bytes().to_vec();
    buf.push(0);
    buf
}

/// The mandatory world sub-model, with no brushes of its own -- callers add
/// the actual brush lump contents separately when a scenario needs one.
fn empty_world_model() -> ([f32; 3], [f32; 3], i32, i32) {
    ([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 0, 0)
}

/// S1: an empty level -- just the mandatory world sub-model.
fn level_empty_world() -> Vec<u8> {
    let mut b = LumpBuilder::new();
    b.set(LUMP_SUBMODELS, sub_models_lump(&[empty_world_model()]));
    b.set(LUMP_ENTITY_STRING, entity_string_lump(""));
    b.finish()
}

/// S2/S3/S4: a single axis-aligned solid cube from (0,0,0) to (64,64,64),
/// stored as leaf 0's brush list with no nodes (degenerate one-leaf world).
fn level_single_cube() -> Vec<u8> {
    let mut b = LumpBuilder::new();
    b.set(
        LUMP_PLANES,
        planes_lump(&[
            ([1.0, 0.0, 0.0], 64.0),
            ([-1.0, 0.0, 0.0], 0.0),
            ([0.0, 1.0, 0.0], 64.0),
            ([0.0, -1.0, 0.0], 0.0),
            ([0.0, 0.0, 1.0], 64.0),
            ([0.0, 0.0, -1.0], 0.0),
        ]),
    );
    b.set(
        LUMP_BRUSH_SIDES,
        brush_sides_lump(&[(0, -1), (1, -1), (2, -1), (3, -1), (4, -1), (5, -1)]),
    );
    b.set(
        LUMP_SHADERS,
        shaders_with_content(&[("solid_cube", ContentFlags::SOLID.bits())]),
    );
    b.set(LUMP_BRUSHES, brushes_lump(&[(0, 6, 0)]));
    b.set(LUMP_LEAF_BRUSHES, leaf_brushes_lump(&[0]));
    b.set(LUMP_LEAFS, leafs_lump(&[(0, 0, 0, 1)]));
    b.set(LUMP_SUBMODELS, sub_models_lump(&[empty_world_model()]));
    b.set(LUMP_ENTITY_STRING, entity_string_lump(""));
    b.finish()
}

fn shaders_with_content(shaders: &[(&str, u32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (name, content) in shaders {
        let mut name_bytes = [0u8; 64];
        let bytes = name.as_bytes();
        name_bytes[..bytes.len()].copy_from_slice(bytes);
        buf.extend_from_slice(&name_bytes);
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&content.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
    }
    buf
}

/// S5: two leafs split by a single node on the plane x=0, each in its own
/// cluster and a shared area, with an asymmetric PVS row pair.
fn level_two_clusters() -> Vec<u8> {
    let mut b = LumpBuilder::new();
    b.set(LUMP_PLANES, planes_lump(&[([1.0, 0.0, 0.0], 0.0)]));
    // child0 (x >= 0) -> leaf 0 (cluster 0); child1 (x < 0) -> leaf 1 (cluster 1)
    b.set(LUMP_NODES, nodes_lump(&[(0, -1, -2)]));
    b.set(LUMP_LEAFS, leafs_lump(&[(0, 0, 0, 0), (1, 0, 0, 0)]));
    b.set(LUMP_SUBMODELS, sub_models_lump(&[empty_world_model()]));
    b.set(LUMP_ENTITY_STRING, entity_string_lump(""));
    b.set(LUMP_VISIBILITY, visibility_lump(2, 1, &[0b0000_0010, 0b0000_0010]));
    b.finish()
}

/// S6: a single sentinel leaf whose area id forces `area_count >= 8`.
fn level_with_areas() -> Vec<u8> {
    let mut b = LumpBuilder::new();
    b.set(LUMP_LEAFS, leafs_lump(&[(-1, 7, 0, 0)]));
    b.set(LUMP_SUBMODELS, sub_models_lump(&[empty_world_model()]));
    b.set(LUMP_ENTITY_STRING, entity_string_lump(""));
    b.finish()
}

#[test]
fn s1_empty_world() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("empty", &level_empty_world()).unwrap();

    assert_eq!(
        clip_map.point_contents(Vector3::new(0.0, 0.0, 0.0), Handle::world()),
        ContentFlags::empty()
    );

    let start = Vector3::new(0.0, 0.0, 0.0);
    let end = Vector3::new(1000.0, 0.0, 0.0);
    let result = clip_map.ray_trace(start, end, Handle::world(), ContentFlags::all());
    assert_eq!(result.fraction, 1.0);
    assert_eq!(result.end_pos, end);
}

#[test]
fn s2_ray_through_cube_face() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();

    let start = Vector3::new(-100.0, 32.0, 32.0);
    let end = Vector3::new(200.0, 32.0, 32.0);
    let result = clip_map.ray_trace(start, end, Handle::world(), ContentFlags::SOLID);

    let expected_fraction = (100.0 - 1.0 / 32.0) / 300.0;
    assert!((result.fraction - expected_fraction).abs() < 1e-4);
    assert!((result.end_pos.x - (0.0 - 1.0 / 32.0)).abs() < 1e-3);
    assert_eq!(result.plane_normal, Some(Vector3::new(-1.0, 0.0, 0.0)));
    assert!(result.contents.contains(ContentFlags::SOLID));
    assert!(!result.start_solid);
}

#[test]
fn s3_trace_starting_inside_solid() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();

    let start = Vector3::new(32.0, 32.0, 32.0);
    let end = Vector3::new(32.0, 32.0, 128.0);
    let result = clip_map.ray_trace(start, end, Handle::world(), ContentFlags::SOLID);

    assert!(result.start_solid);
    assert_eq!(result.fraction, 0.0);
    assert_eq!(result.end_pos, start);
    assert!(!result.all_solid);
}

#[test]
fn s4_box_sweep_contacts_expanded_face() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();

    let start = Vector3::new(-100.0, 32.0, 32.0);
    let end = Vector3::new(200.0, 32.0, 32.0);
    let mins = Vector3::new(-8.0, -8.0, -8.0);
    let maxs = Vector3::new(8.0, 8.0, 8.0);
    let result = clip_map.box_trace(start, end, mins, maxs, Handle::world(), ContentFlags::SOLID, false);

    let expected_fraction = (92.0 - 1.0 / 32.0) / 300.0;
    assert!((result.fraction - expected_fraction).abs() < 1e-4);
}

#[test]
fn s5_pvs_asymmetry_is_honored() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("pvs", &level_two_clusters()).unwrap();

    let p_cluster0 = Vector3::new(10.0, 0.0, 0.0);
    let p_cluster1 = Vector3::new(-10.0, 0.0, 0.0);

    assert!(clip_map.in_pvs(p_cluster0, p_cluster1));
    assert!(!clip_map.in_pvs(p_cluster1, p_cluster0));
}

#[test]
fn s6_portal_toggle_is_symmetric_and_self_area_always_connected() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("areas", &level_with_areas()).unwrap();

    clip_map.adjust_area_portal_state(3, 7, true);
    assert!(clip_map.areas_connected(3, 7));
    assert!(clip_map.areas_connected(7, 3));

    clip_map.adjust_area_portal_state(3, 7, false);
    assert!(!clip_map.areas_connected(3, 7));
    assert!(!clip_map.areas_connected(7, 3));
    assert!(clip_map.areas_connected(3, 3));
}

#[test]
fn i6_areas_connected_is_symmetric_under_arbitrary_toggles() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("areas", &level_with_areas()).unwrap();

    for &(a, b) in &[(0, 1), (2, 7), (5, 5), (7, 0)] {
        clip_map.adjust_area_portal_state(a, b, true);
        assert_eq!(clip_map.areas_connected(a, b), clip_map.areas_connected(b, a));
    }
}

#[test]
fn i7_loading_the_same_level_name_twice_is_idempotent() {
    let mut clip_map = ClipMap::new();
    let bytes = level_single_cube();
    clip_map.load_level("cube", &bytes).unwrap();

    let before = clip_map.point_contents(Vector3::new(32.0, 32.0, 32.0), Handle::world());
    // a repeat load of the same name must be a no-op, even with different bytes.
    clip_map.load_level("cube", &level_empty_world()).unwrap();
    let after = clip_map.point_contents(Vector3::new(32.0, 32.0, 32.0), Handle::world());

    assert_eq!(before, after);
}

#[test]
fn loading_a_new_name_replaces_the_level() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();
    assert!(clip_map
        .point_contents(Vector3::new(32.0, 32.0, 32.0), Handle::world())
        .contains(ContentFlags::SOLID));

    clip_map.load_level("empty", &level_empty_world()).unwrap();
    assert_eq!(
        clip_map.point_contents(Vector3::new(32.0, 32.0, 32.0), Handle::world()),
        ContentFlags::empty()
    );
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = level_empty_world();
    bytes[0] = b'X';
    let mut clip_map = ClipMap::new();
    assert!(clip_map.load_level("bad", &bytes).is_err());
}

#[test]
fn temp_box_model_round_trip() {
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
fn zero_length_sweep_matches_point_contents() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();

    let inside = Vector3::new(32.0, 32.0, 32.0);
    let result = clip_map.ray_trace(inside, inside, Handle::world(), ContentFlags::SOLID);
    let contents = clip_map.point_contents(inside, Handle::world());

    assert_eq!(result.start_solid, !contents.is_empty());
}

/// Round-trip law (`spec.md` §8): a sweep that starts and ends inside a
/// single all-solid brush, without ever crossing a face, reports
/// `all_solid` with `fraction == 0`.
#[test]
fn sweep_entirely_inside_solid_brush_is_allsolid() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();

    let start = Vector3::new(20.0, 20.0, 20.0);
    let end = Vector3::new(40.0, 40.0, 40.0);
    let result = clip_map.ray_trace(start, end, Handle::world(), ContentFlags::SOLID);

    assert!(result.start_solid);
    assert!(result.all_solid);
    assert_eq!(result.fraction, 0.0);
    assert_eq!(result.end_pos, start);
}

/// I3: for every trace, `endpos == start + fraction * (end - start)` unless
/// `fraction == 0 && allsolid` (`spec.md` §3, §8).
#[test]
fn i3_endpos_matches_fraction_closure() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();

    let cases = [
        (Vector3::new(-100.0, 32.0, 32.0), Vector3::new(200.0, 32.0, 32.0)),
        (Vector3::new(32.0, -100.0, 32.0), Vector3::new(32.0, 200.0, 32.0)),
        (Vector3::new(-500.0, 500.0, 500.0), Vector3::new(500.0, -500.0, -500.0)),
    ];

    for (start, end) in cases {
        let result = clip_map.ray_trace(start, end, Handle::world(), ContentFlags::SOLID);
        if result.fraction == 0.0 && result.all_solid {
            assert_eq!(result.end_pos, start);
        } else {
            let expected = start + result.fraction * (end - start);
            assert!((result.end_pos - expected).magnitude() < 1e-3);
        }
    }
}

/// I4: just past a non-`startsolid` hit's `endpos`, the point has nonzero
/// intersection with the hit brush's content mask (`spec.md` §8).
#[test]
fn i4_hit_epsilon_contact() {
    let mut clip_map = ClipMap::new();
    clip_map.load_level("cube", &level_single_cube()).unwrap();

    let start = Vector3::new(-100.0, 32.0, 32.0);
    let end = Vector3::new(200.0, 32.0, 32.0);
    let result = clip_map.ray_trace(start, end, Handle::world(), ContentFlags::SOLID);
    assert!(!result.start_solid);

    // The surface-clip epsilon is a fixed 1/32 world unit (`spec.md` §4.3.2),
    // so the fractional nudge must clear `DIST_EPSILON / |end - start|` for
    // this sweep's length, not an arbitrary small constant.
    const DIST_EPSILON: f32 = 1.0 / 32.0;
    let nudge = (2.0 * DIST_EPSILON / (end - start).magnitude()).max(1e-4);
    let past = start + (result.fraction + nudge) * (end - start);
    let contents = clip_map.point_contents(past, Handle::world());
    assert!(contents.intersects(ContentFlags::SOLID));
}

/// I5: `InPVS(a, b) == InPVS(b, a)` when the matrix is fully symmetric
/// (`spec.md` §8).
#[test]
fn i5_pvs_symmetric_matrix_is_symmetric() {
    let mut b = LumpBuilder::new();
    b.set(LUMP_PLANES, planes_lump(&[([1.0, 0.0, 0.0], 0.0)]));
    b.set(LUMP_NODES, nodes_lump(&[(0, -1, -2)]));
    b.set(LUMP_LEAFS, leafs_lump(&[(0, 0, 0, 0), (1, 0, 0, 0)]));
    b.set(LUMP_SUBMODELS, sub_models_lump(&[empty_world_model()]));
    b.set(LUMP_ENTITY_STRING, entity_string_lump(""));
    // symmetric: row 0 sees cluster 1, row 1 sees cluster 0, each also self-visible
    b.set(LUMP_VISIBILITY, visibility_lump(2, 1, &[0b0000_0011, 0b0000_0011]));
    let bytes = b.finish();

    let mut clip_map = ClipMap::new();
    clip_map.load_level("symmetric-pvs", &bytes).unwrap();

    let p0 = Vector3::new(10.0, 0.0, 0.0);
    let p1 = Vector3::new(-10.0, 0.0, 0.0);
    assert_eq!(clip_map.in_pvs(p0, p1), clip_map.in_pvs(p1, p0));
    assert!(clip_map.in_pvs(p0, p1));
}
