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

//! A BSP-based collision clipping engine: level loading, point/leaf queries,
//! the brush intersection kernel, the recursive tree sweep, and
//! visibility/area-portal bookkeeping.
//!
//! The [`ClipMap`] type is the entry point: load a compiled level with
//! [`ClipMap::load_level`], then query it with [`ClipMap::box_trace`],
//! [`ClipMap::point_contents`], and friends.

pub mod arena;
pub mod brush;
pub mod clipmap;
pub mod error;
pub mod load;
pub mod math;
pub mod model;
pub mod tree;
pub mod vis;

pub use crate::arena::{ContentFlags, SurfaceFlags};
pub use crate::brush::TraceResult;
pub use crate::clipmap::{ClipMap, Handle};
pub use crate::error::{ClipError, ClipErrorKind};
