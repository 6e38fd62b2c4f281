#![forbid(unsafe_code)]

//! Data paths and path patterns.
//!
//! A [`Path`] names a location inside a wrapped data tree, e.g.
//! `user.addresses.0.city`. The dotted display string is the public contract:
//! equality, hashing and ordering all use it. Internally a path also keeps its
//! segments so ancestry checks and child construction never re-split the
//! string.
//!
//! Indexed notation is accepted on input and normalised, so `items[0].name`
//! and `items.0.name` are the same path.
//!
//! A [`PathPattern`] is a glob over display strings where `*` matches any run
//! of characters (dots included) and every other character is literal.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use regex::Regex;

use crate::error::{ReactiveError, Result};

/// One segment of a [`Path`]: an object key or an array index.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Segment(Rc<str>);

impl Segment {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The segment as an array index, if it is one.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        parse_index(&self.0)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a canonical array index (`0`, `17`; not `01`, `+1` or `-1`).
pub(crate) fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

struct PathInner {
    display: Box<str>,
    segments: Box<[Segment]>,
}

/// A dotted path from the root of a wrapped tree. Cheap to clone.
#[derive(Clone)]
pub struct Path {
    inner: Rc<PathInner>,
}

impl Path {
    /// The empty path naming the root itself.
    #[must_use]
    pub fn root() -> Self {
        Self {
            inner: Rc::new(PathInner {
                display: Box::from(""),
                segments: Box::new([]),
            }),
        }
    }

    /// Parse a dotted or indexed path string.
    ///
    /// Empty segments are dropped, so `""`, `"."` and `"a..b"` parse to the
    /// root, the root and `a.b` respectively.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let normalised = input.replace('[', ".").replace(']', "");
        let segments: Vec<Segment> = normalised
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| Segment(Rc::from(s)))
            .collect();
        Self::from_segments(segments)
    }

    fn from_segments(segments: Vec<Segment>) -> Self {
        let display = segments
            .iter()
            .map(Segment::as_str)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            inner: Rc::new(PathInner {
                display: display.into_boxed_str(),
                segments: segments.into_boxed_slice(),
            }),
        }
    }

    /// Dotted concatenation of this path and `key`. The key is one segment
    /// even if it contains a dot.
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        let display = if self.is_root() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.inner.display)
        };
        let mut segments = Vec::with_capacity(self.inner.segments.len() + 1);
        segments.extend(self.inner.segments.iter().cloned());
        segments.push(Segment(Rc::from(key)));
        Self {
            inner: Rc::new(PathInner {
                display: display.into_boxed_str(),
                segments: segments.into_boxed_slice(),
            }),
        }
    }

    /// Append every segment of `relative` to this path.
    #[must_use]
    pub fn join(&self, relative: &Path) -> Self {
        if relative.is_root() {
            return self.clone();
        }
        if self.is_root() {
            return relative.clone();
        }
        let mut segments = self.inner.segments.to_vec();
        segments.extend(relative.inner.segments.iter().cloned());
        Self::from_segments(segments)
    }

    /// The path one level up, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.inner.segments.split_last()?;
        Some(Self::from_segments(head.to_vec()))
    }

    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.inner.segments.last()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.inner.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.segments.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.inner.segments.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner.display
    }

    /// Segment-wise prefix test. Every path starts with itself and with the
    /// root; `user.name` does not start with `use`.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.inner.segments.starts_with(&prefix.inner.segments)
    }

    /// Whether `self` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Path) -> bool {
        self.len() > ancestor.len() && self.starts_with(ancestor)
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) || self.as_str() == other.as_str()
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Borrow<str> for Path {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.as_str())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for Path {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&String> for Path {
    fn from(value: &String) -> Self {
        Self::parse(value)
    }
}

impl From<&Path> for Path {
    fn from(value: &Path) -> Self {
        value.clone()
    }
}

// ---------------------------------------------------------------------------
// PathPattern
// ---------------------------------------------------------------------------

/// A compiled glob over path display strings, anchored at both ends.
///
/// `user.*` matches `user.name` and `user.address.city` but not `user` or
/// `product.name`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile `pattern`. Every character but `*` is matched literally.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::InvalidPattern`] if the compiled pattern exceeds the
    /// regex size limit.
    pub fn new(pattern: &str) -> Result<Self> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        // `(?s)` so `*` also spans newlines inside keys.
        let regex = Regex::new(&format!("(?s)^{body}$")).map_err(|err| {
            ReactiveError::InvalidPattern {
                pattern: pattern.to_owned(),
                message: err.to_string(),
            }
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains no wildcard.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        !self.source.contains('*')
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathPattern {}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<&str> for PathPattern {
    type Error = ReactiveError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
