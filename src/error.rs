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

use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

/// Errors surfaced by [`crate::ClipMap::load_level`].
///
/// Query-time anomalies (out-of-range indices in an already-loaded level) are
/// not represented here; they are logged once via `log::warn!` and the
/// offending query falls back to a neutral result instead of propagating an
/// error. See the crate documentation for details.
#[derive(Debug)]
pub struct ClipError {
    inner: Context<ClipErrorKind>,
}

impl ClipError {
    pub fn kind(&self) -> &ClipErrorKind {
        self.inner.get_context()
    }
}

impl From<ClipErrorKind> for ClipError {
    fn from(kind: ClipErrorKind) -> Self {
        ClipError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ClipErrorKind>> for ClipError {
    fn from(inner: Context<ClipErrorKind>) -> Self {
        ClipError { inner }
    }
}

impl Fail for ClipError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for ClipError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ClipErrorKind {
    #[fail(display = "Level bytes could not be obtained")]
    InputUnavailable,

    #[fail(display = "Bad level magic (found {:?})", found)]
    BadMagic { found: [u8; 4] },

    #[fail(display = "Unsupported level version (found {})", found)]
    UnsupportedVersion { found: i32 },

    #[fail(display = "Malformed {} lump: {}", lump, reason)]
    MalformedLump { lump: &'static str, reason: String },
}
