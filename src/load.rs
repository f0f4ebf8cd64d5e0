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

//! Compiled level loading (`spec.md` §4.1, §6).
//!
//! The on-disk format is a 20-entry lump directory behind a fixed header:
//! 4-byte magic, little-endian `i32` version, `i32` checksum (stored, never
//! validated — no hash is specified), then 20 `(offset: i32, length: i32)`
//! pairs. Every lump read here uses `byteorder` plus `failure`'s `ensure!`/
//! `bail!`, the same idiom as the render-side loader this crate is derived
//! from.

use std::cell::Cell;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use cgmath::Vector3;
use failure::{bail, ensure, Error};

use crate::arena::{
    Brush, BrushSide, ClipMapData, ContentFlags, Leaf, Node, NodeChild, Shader, SubModel,
    SurfaceFlags, Visibility,
};
use crate::error::{ClipError, ClipErrorKind};
use crate::math::Plane;

const MAGIC: [u8; 4] = *b"FAKK";
const VERSION: i32 = 12;
const LUMP_COUNT: usize = 20;

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

// `spec.md` §6 field layouts for the lumps this core consumes (all fields
// little-endian 4-byte ints/floats).
const SHADER_SIZE: usize = 76;
const PLANE_SIZE: usize = 16;
const NODE_SIZE: usize = 36;
const LEAF_SIZE: usize = 48;
const LEAF_BRUSH_SIZE: usize = 4;
const BRUSHSIDE_SIZE: usize = 8;
const BRUSH_SIZE: usize = 12;
const MODEL_SIZE: usize = 40;

// Defensive safety caps (`spec.md` §4.1/§7: "a declared count exceeds a
// hard safety cap").
const MAX_SHADERS: usize = 4096;
const MAX_PLANES: usize = 1 << 16;
const MAX_NODES: usize = 1 << 16;
const MAX_LEAFS: usize = 1 << 16;
const MAX_LEAF_BRUSHES: usize = 1 << 20;
const MAX_BRUSH_SIDES: usize = 1 << 20;
const MAX_BRUSHES: usize = 1 << 18;
const MAX_SUBMODELS: usize = 1 << 10;
const MAX_ENTSTRING: usize = 1 << 20;
const MAX_VISIBILITY: usize = 1 << 24;

struct Lump {
    offset: u64,
    length: usize,
}

impl Lump {
    fn from_i32s(offset: i32, length: i32) -> Result<Lump, Error> {
        ensure!(offset >= 0, "lump offset must not be negative (was {})", offset);
        ensure!(length >= 0, "lump length must not be negative (was {})", length);

        Ok(Lump {
            offset: offset as u64,
            length: length as usize,
        })
    }
}

/// Slices `data` to the byte range `lump` describes and reports the number
/// of fixed-size elements it holds.
fn lump_elements<'a>(
    data: &'a [u8],
    lump: &Lump,
    element_size: usize,
    max: usize,
) -> Result<(&'a [u8], usize), Error> {
    let end = lump.offset as usize + lump.length;
    ensure!(
        end <= data.len(),
        "lump range [{}, {}) exceeds buffer length {}",
        lump.offset,
        end,
        data.len()
    );
    ensure!(
        lump.length % element_size == 0,
        "lump length {} is not a multiple of element size {}",
        lump.length,
        element_size
    );

    let count = lump.length / element_size;
    ensure!(count <= max, "lump element count {} exceeds limit {}", count, max);

    Ok((&data[lump.offset as usize..end], count))
}

fn malformed(lump: &'static str, e: Error) -> ClipError {
    ClipErrorKind::MalformedLump {
        lump,
        reason: e.to_string(),
    }
    .into()
}

fn load_shaders(data: &[u8], lump: &Lump) -> Result<Vec<Shader>, Error> {
    let (bytes, count) = lump_elements(data, lump, SHADER_SIZE, MAX_SHADERS)?;
    let mut reader = Cursor::new(bytes);
    let mut shaders = Vec::with_capacity(count);

    for _ in 0..count {
        let mut name_bytes = [0u8; 64];
        reader.read_exact(&mut name_bytes)?;
        let len = name_bytes.iter().position(|&b| b == 0).unwrap_or(64);
        let name = String::from_utf8_lossy(&name_bytes[..len]).into_owned();

        let surface_flags = SurfaceFlags::from_bits_truncate(reader.read_u32::<LittleEndian>()?);
        let content_flags = ContentFlags::from_bits_truncate(reader.read_u32::<LittleEndian>()?);
        let _subdivisions = reader.read_i32::<LittleEndian>()?;

        shaders.push(Shader {
            name,
            surface_flags,
            content_flags,
        });
    }

    Ok(shaders)
}

fn load_planes(data: &[u8], lump: &Lump) -> Result<Vec<Plane>, Error> {
    let (bytes, count) = lump_elements(data, lump, PLANE_SIZE, MAX_PLANES)?;
    let mut reader = Cursor::new(bytes);
    let mut planes = Vec::with_capacity(count);

    for _ in 0..count {
        let normal = Vector3::new(
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
        );
        let dist = reader.read_f32::<LittleEndian>()?;
        planes.push(Plane::new(normal, dist));
    }

    Ok(planes)
}

fn load_nodes(data: &[u8], lump: &Lump) -> Result<Vec<Node>, Error> {
    let (bytes, count) = lump_elements(data, lump, NODE_SIZE, MAX_NODES)?;
    let mut reader = Cursor::new(bytes);
    let mut nodes = Vec::with_capacity(count);

    for _ in 0..count {
        let plane_num = reader.read_i32::<LittleEndian>()?;
        ensure!(plane_num >= 0, "node plane index must not be negative (was {})", plane_num);

        let child0 = reader.read_i32::<LittleEndian>()?;
        let child1 = reader.read_i32::<LittleEndian>()?;

        // mins/maxs bound the node's subtree; the collision core does not
        // consume them.
        for _ in 0..6 {
            reader.read_i32::<LittleEndian>()?;
        }

        nodes.push(Node {
            plane: plane_num as usize,
            children: [NodeChild::from_raw(child0), NodeChild::from_raw(child1)],
        });
    }

    Ok(nodes)
}

fn load_leaf_brushes(data: &[u8], lump: &Lump) -> Result<Vec<i32>, Error> {
    let (bytes, count) = lump_elements(data, lump, LEAF_BRUSH_SIZE, MAX_LEAF_BRUSHES)?;
    let mut reader = Cursor::new(bytes);
    let mut out = Vec::with_capacity(count);

    for _ in 0..count {
        out.push(reader.read_i32::<LittleEndian>()?);
    }

    Ok(out)
}

fn load_leafs(data: &[u8], lump: &Lump) -> Result<Vec<Leaf>, Error> {
    let (bytes, count) = lump_elements(data, lump, LEAF_SIZE, MAX_LEAFS)?;
    let mut reader = Cursor::new(bytes);
    let mut leafs = Vec::with_capacity(count);

    for _ in 0..count {
        let cluster = reader.read_i32::<LittleEndian>()?;
        let area = reader.read_i32::<LittleEndian>()?;

        // mins/maxs: not consumed by the collision core.
        for _ in 0..6 {
            reader.read_i32::<LittleEndian>()?;
        }

        // firstLeafSurface/numLeafSurfaces: render-side only.
        reader.read_i32::<LittleEndian>()?;
        reader.read_i32::<LittleEndian>()?;

        let first_leaf_brush = reader.read_i32::<LittleEndian>()?;
        let num_leaf_brushes = reader.read_i32::<LittleEndian>()?;
        ensure!(first_leaf_brush >= 0, "leaf firstLeafBrush must not be negative");
        ensure!(num_leaf_brushes >= 0, "leaf numLeafBrushes must not be negative");

        leafs.push(Leaf {
            cluster,
            area,
            first_leaf_brush: first_leaf_brush as usize,
            num_leaf_brushes: num_leaf_brushes as usize,
        });
    }

    Ok(leafs)
}

fn load_brush_sides(data: &[u8], lump: &Lump, shaders: &[Shader]) -> Result<Vec<BrushSide>, Error> {
    let (bytes, count) = lump_elements(data, lump, BRUSHSIDE_SIZE, MAX_BRUSH_SIDES)?;
    let mut reader = Cursor::new(bytes);
    let mut sides = Vec::with_capacity(count);

    for _ in 0..count {
        let plane_num = reader.read_i32::<LittleEndian>()?;
        ensure!(plane_num >= 0, "brush side plane index must not be negative (was {})", plane_num);

        let shader_num = reader.read_i32::<LittleEndian>()?;
        let surface_flags = if shader_num >= 0 {
            shaders
                .get(shader_num as usize)
                .map(|s| s.surface_flags)
                .unwrap_or_else(SurfaceFlags::empty)
        } else {
            SurfaceFlags::empty()
        };

        sides.push(BrushSide {
            plane: plane_num as usize,
            surface_flags,
        });
    }

    Ok(sides)
}

fn load_brushes(data: &[u8], lump: &Lump, shaders: &[Shader]) -> Result<Vec<Brush>, Error> {
    let (bytes, count) = lump_elements(data, lump, BRUSH_SIZE, MAX_BRUSHES)?;
    let mut reader = Cursor::new(bytes);
    let mut brushes = Vec::with_capacity(count);

    for _ in 0..count {
        let first_side = reader.read_i32::<LittleEndian>()?;
        let num_sides = reader.read_i32::<LittleEndian>()?;
        ensure!(first_side >= 0, "brush firstSide must not be negative");
        ensure!(num_sides >= 0, "brush numSides must not be negative");

        let shader_num = reader.read_i32::<LittleEndian>()?;
        let contents = if shader_num >= 0 {
            shaders
                .get(shader_num as usize)
                .map(|s| s.content_flags)
                .unwrap_or_else(ContentFlags::empty)
        } else {
            ContentFlags::empty()
        };

        brushes.push(Brush {
            first_side: first_side as usize,
            num_sides: num_sides as usize,
            contents,
            visited: Cell::new(0),
        });
    }

    Ok(brushes)
}

fn load_submodels(data: &[u8], lump: &Lump) -> Result<Vec<SubModel>, Error> {
    let (bytes, count) = lump_elements(data, lump, MODEL_SIZE, MAX_SUBMODELS)?;
    ensure!(count > 0, "sub-model lump must contain at least the world model");

    let mut reader = Cursor::new(bytes);
    let mut models = Vec::with_capacity(count);

    for _ in 0..count {
        let mins = Vector3::new(
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
        );
        let maxs = Vector3::new(
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
        );

        // firstSurface/numSurfaces: render-side only.
        reader.read_i32::<LittleEndian>()?;
        reader.read_i32::<LittleEndian>()?;

        let first_brush = reader.read_i32::<LittleEndian>()?;
        let num_brushes = reader.read_i32::<LittleEndian>()?;
        ensure!(first_brush >= 0, "sub-model firstBrush must not be negative");
        ensure!(num_brushes >= 0, "sub-model numBrushes must not be negative");

        models.push(SubModel {
            mins,
            maxs,
            first_brush: first_brush as usize,
            num_brushes: num_brushes as usize,
        });
    }

    Ok(models)
}

fn load_visibility(data: &[u8], lump: &Lump) -> Result<Option<Visibility>, Error> {
    if lump.length == 0 {
        return Ok(None);
    }

    ensure!(lump.length <= MAX_VISIBILITY, "visibility lump exceeds size limit");

    let end = lump.offset as usize + lump.length;
    ensure!(end <= data.len(), "visibility lump range exceeds buffer length");

    let mut reader = Cursor::new(&data[lump.offset as usize..end]);
    let num_clusters = reader.read_i32::<LittleEndian>()?;
    let cluster_bytes = reader.read_i32::<LittleEndian>()?;
    ensure!(num_clusters >= 0, "visibility numClusters must not be negative");
    ensure!(cluster_bytes >= 0, "visibility clusterBytes must not be negative");

    let (num_clusters, cluster_bytes) = (num_clusters as usize, cluster_bytes as usize);
    let payload = num_clusters
        .checked_mul(cluster_bytes)
        .ok_or_else(|| failure::err_msg("visibility dimensions overflow"))?;
    ensure!(
        lump.length >= 8 + payload,
        "visibility lump too small for declared dimensions"
    );

    let mut buf = vec![0u8; payload];
    reader.read_exact(&mut buf)?;

    Ok(Some(Visibility {
        num_clusters,
        cluster_bytes,
        data: buf.into_boxed_slice(),
    }))
}

fn load_entity_string(data: &[u8], lump: &Lump) -> Result<Vec<u8>, Error> {
    ensure!(lump.length <= MAX_ENTSTRING, "entity string lump exceeds size limit");

    let start = lump.offset as usize;
    let end = start + lump.length;
    if end > data.len() {
        bail!("entity string lump extends past end of buffer");
    }

    let mut bytes = data[start..end].to_vec();
    if bytes.last() != Some(&0) {
        bytes.push(0);
    }

    Ok(bytes)
}

fn build(data: &[u8], lumps: &[Lump]) -> Result<ClipMapData, Error> {
    let shaders = load_shaders(data, &lumps[LUMP_SHADERS])?;
    let planes = load_planes(data, &lumps[LUMP_PLANES])?;
    let nodes = load_nodes(data, &lumps[LUMP_NODES])?;
    let leaf_brushes = load_leaf_brushes(data, &lumps[LUMP_LEAF_BRUSHES])?;
    let leafs = load_leafs(data, &lumps[LUMP_LEAFS])?;
    let brush_sides = load_brush_sides(data, &lumps[LUMP_BRUSH_SIDES], &shaders)?;
    let brushes = load_brushes(data, &lumps[LUMP_BRUSHES], &shaders)?;
    let sub_models = load_submodels(data, &lumps[LUMP_SUBMODELS])?;
    let visibility = load_visibility(data, &lumps[LUMP_VISIBILITY])?;
    let entity_string = load_entity_string(data, &lumps[LUMP_ENTITY_STRING])?;

    let area_count = leafs
        .iter()
        .map(|l| l.area)
        .filter(|&a| a >= 0)
        .max()
        .map(|m| m as usize + 1)
        .unwrap_or(0);

    let clip_data = ClipMapData {
        shaders: shaders.into_boxed_slice(),
        planes: planes.into_boxed_slice(),
        brush_sides: brush_sides.into_boxed_slice(),
        brushes: brushes.into_boxed_slice(),
        nodes: nodes.into_boxed_slice(),
        leafs: leafs.into_boxed_slice(),
        leaf_brushes: leaf_brushes.into_boxed_slice(),
        sub_models: sub_models.into_boxed_slice(),
        visibility,
        entity_string: entity_string.into_boxed_slice(),
        area_count,
    };

    // Post-condition sweep (`spec.md` §4.1): logged, not fatal (§4.9/§7 --
    // the level has already been structurally accepted at this point).
    clip_data.validate();

    Ok(clip_data)
}

/// Parses a compiled level image into its arenas (`spec.md` §4.1, §6).
///
/// Structural rejection (`BadMagic`/`UnsupportedVersion`/`MalformedLump`)
/// happens here; cross-arena index validity is checked once more afterward
/// and tolerated at query time rather than failing the load (`spec.md`
/// §4.9, §7).
pub fn load(data: &[u8]) -> Result<ClipMapData, ClipError> {
    const HEADER_SIZE: usize = 4 + 4 + 4 + LUMP_COUNT * 8;

    if data.len() < HEADER_SIZE {
        return Err(ClipErrorKind::InputUnavailable.into());
    }

    let mut found = [0u8; 4];
    found.copy_from_slice(&data[0..4]);
    if found != MAGIC {
        return Err(ClipErrorKind::BadMagic { found }.into());
    }

    let mut reader = Cursor::new(&data[4..]);
    let version = reader
        .read_i32::<LittleEndian>()
        .map_err(|_| ClipErrorKind::InputUnavailable)?;
    if version != VERSION {
        return Err(ClipErrorKind::UnsupportedVersion { found: version }.into());
    }

    // checksum: stored, never validated -- no hash is specified.
    reader
        .read_i32::<LittleEndian>()
        .map_err(|_| ClipErrorKind::InputUnavailable)?;

    let mut lumps = Vec::with_capacity(LUMP_COUNT);
    for _ in 0..LUMP_COUNT {
        let offset = reader
            .read_i32::<LittleEndian>()
            .map_err(|_| ClipErrorKind::InputUnavailable)?;
        let length = reader
            .read_i32::<LittleEndian>()
            .map_err(|_| ClipErrorKind::InputUnavailable)?;
        let lump = Lump::from_i32s(offset, length).map_err(|e| malformed("directory", e))?;
        lumps.push(lump);
    }

    build(data, &lumps).map_err(|e| malformed("level", e))
}
