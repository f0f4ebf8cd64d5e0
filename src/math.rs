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

//! Plane representation shared by the spatial index, brush kernel and tree
//! sweep.
//!
//! A [`Plane`] always classifies itself as axial or oblique at construction
//! time, matching the axial-fast-path optimization used throughout the
//! collision kernel: axial planes compare a single coordinate against `dist`,
//! while oblique planes fall back to a full dot product.

use cgmath::{InnerSpace, Vector3};

/// One thirty-second of a world unit.
///
/// Baked into the sweep-vs-brush contact math (see [`crate::brush`]). Treat
/// as a protocol constant: changing it changes contact geometry visible to
/// gameplay.
pub const DIST_EPSILON: f32 = 1.0 / 32.0;

/// Which coordinate axis a plane's normal is aligned with, if any.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlaneType {
    AxialX,
    AxialY,
    AxialZ,
    Oblique,
}

impl PlaneType {
    /// Returns the axis index (0/1/2) for an axial plane type.
    pub fn axis(self) -> Option<usize> {
        match self {
            PlaneType::AxialX => Some(0),
            PlaneType::AxialY => Some(1),
            PlaneType::AxialZ => Some(2),
            PlaneType::Oblique => None,
        }
    }
}

/// A classified splitting plane: unit normal, signed distance from the
/// origin, axial/oblique classification, and the sign of each normal
/// component (used by the box-offset fast paths in [`crate::brush`] and
/// [`crate::tree`]).
#[derive(Clone, Debug)]
pub struct Plane {
    normal: Vector3<f32>,
    dist: f32,
    plane_type: PlaneType,
    signbits: [bool; 3],
}

fn classify(normal: Vector3<f32>) -> PlaneType {
    const EPS: f32 = 1e-6;

    if (normal.x - 1.0).abs() < EPS && normal.y.abs() < EPS && normal.z.abs() < EPS {
        PlaneType::AxialX
    } else if (normal.y - 1.0).abs() < EPS && normal.x.abs() < EPS && normal.z.abs() < EPS {
        PlaneType::AxialY
    } else if (normal.z - 1.0).abs() < EPS && normal.x.abs() < EPS && normal.y.abs() < EPS {
        PlaneType::AxialZ
    } else {
        PlaneType::Oblique
    }
}

impl Plane {
    /// Builds a plane from a (not necessarily normalized) normal and
    /// distance, normalizing the normal and classifying it as axial or
    /// oblique.
    pub fn new(normal: Vector3<f32>, dist: f32) -> Plane {
        let normal = normal.normalize();
        let plane_type = classify(normal);
        let signbits = [normal.x < 0.0, normal.y < 0.0, normal.z < 0.0];

        Plane {
            normal,
            dist,
            plane_type,
            signbits,
        }
    }

    /// A plane aligned to the positive X axis at `dist`.
    pub fn axis_x(dist: f32) -> Plane {
        Plane {
            normal: Vector3::new(1.0, 0.0, 0.0),
            dist,
            plane_type: PlaneType::AxialX,
            signbits: [false, false, false],
        }
    }

    /// A plane aligned to the positive Y axis at `dist`.
    pub fn axis_y(dist: f32) -> Plane {
        Plane {
            normal: Vector3::new(0.0, 1.0, 0.0),
            dist,
            plane_type: PlaneType::AxialY,
            signbits: [false, false, false],
        }
    }

    /// A plane aligned to the positive Z axis at `dist`.
    pub fn axis_z(dist: f32) -> Plane {
        Plane {
            normal: Vector3::new(0.0, 0.0, 1.0),
            dist,
            plane_type: PlaneType::AxialZ,
            signbits: [false, false, false],
        }
    }

    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    pub fn dist(&self) -> f32 {
        self.dist
    }

    pub fn plane_type(&self) -> PlaneType {
        self.plane_type
    }

    pub fn signbits(&self) -> [bool; 3] {
        self.signbits
    }

    /// Signed distance from `point` to this plane, using the axial fast path
    /// (a scalar subtraction) when possible.
    #[inline]
    pub fn distance_to_point(&self, point: Vector3<f32>) -> f32 {
        match self.plane_type.axis() {
            Some(axis) => point[axis] - self.dist,
            None => self.normal.dot(point) - self.dist,
        }
    }

    /// Returns the `-plane_type.axis()`-relative outward box offset for a
    /// query AABB's `mins`/`maxs`, used by the brush kernel's plane expansion
    /// (`spec.md` §4.3.2).
    #[inline]
    pub fn box_offset(&self, mins: Vector3<f32>, maxs: Vector3<f32>) -> f32 {
        match self.plane_type.axis() {
            Some(axis) => {
                if self.signbits[axis] {
                    mins[axis] * self.normal[axis]
                } else {
                    maxs[axis] * self.normal[axis]
                }
            }
            None => {
                let mut offset = 0.0;
                for axis in 0..3 {
                    offset += if self.signbits[axis] {
                        mins[axis] * self.normal[axis]
                    } else {
                        maxs[axis] * self.normal[axis]
                    };
                }
                offset
            }
        }
    }

    /// Returns the half-extent of a query AABB projected onto this plane's
    /// normal, used by the tree sweep's slab test (`spec.md` §4.4).
    #[inline]
    pub fn sweep_extent(&self, mins: Vector3<f32>, maxs: Vector3<f32>) -> f32 {
        match self.plane_type.axis() {
            Some(axis) => mins[axis].abs().max(maxs[axis].abs()),
            None => {
                let mut extent = 0.0;
                for axis in 0..3 {
                    extent += mins[axis].abs().max(maxs[axis].abs()) * self.normal[axis].abs();
                }
                extent
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn axial_plane_classification() {
        let p = Plane::new(Vector3::new(1.0, 0.0, 0.0), 64.0);
        assert_eq!(p.plane_type(), PlaneType::AxialX);
        assert_eq!(p.distance_to_point(Vector3::new(100.0, 5.0, 5.0)), 36.0);
    }

    #[test]
    fn oblique_plane_classification() {
        let p = Plane::new(Vector3::new(1.0, 1.0, 0.0), 0.0);
        assert_eq!(p.plane_type(), PlaneType::Oblique);
        let expected = (2.0f32).sqrt() / 2.0 * 2.0;
        assert!((p.distance_to_point(Vector3::new(1.0, 1.0, 0.0)) - expected).abs() < 1e-4);
    }

    #[test]
    fn box_offset_matches_sign() {
        // plane normal (-1, 0, 0): signbits[0] is true, so offset comes from mins.x.
        let p = Plane::new(Vector3::new(-1.0, 0.0, 0.0), 0.0);
        let mins = Vector3::new(-8.0, -8.0, -8.0);
        let maxs = Vector3::new(8.0, 8.0, 8.0);
        // normal.x * mins.x = -1 * -8 = 8
        assert_eq!(p.box_offset(mins, maxs), 8.0);
    }
}
