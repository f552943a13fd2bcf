use std::borrow::Cow;
use std::fmt;

use crate::error::{DatastoreError, Result};

pub const SEPARATOR: char = '/';

/// Hierarchical datastore key, e.g. `/blocks/QmFoo`.
///
/// Always starts with `/`. Ordering is byte order of the encoded path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    raw: String,
}

impl Key {
    /// Builds a key from an arbitrary path, cleaning it first.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            raw: clean(path.as_ref()),
        }
    }

    /// Wraps an already-clean path without re-cleaning it.
    pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        debug_assert!(raw.starts_with(SEPARATOR), "raw key must start with /");
        Self { raw }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| DatastoreError::InvalidKey(format!("{e}: {:?}", bytes)))?;
        if !s.starts_with(SEPARATOR) {
            return Err(DatastoreError::InvalidKey(s.to_string()));
        }
        Ok(Self::from_raw(s))
    }

    pub fn root() -> Self {
        Self::from_raw("/")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn is_root(&self) -> bool {
        self.raw == "/"
    }

    /// Path segments, root excluded.
    pub fn namespaces(&self) -> Vec<&str> {
        self.raw.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
    }

    /// Last path segment; empty for the root key.
    pub fn name(&self) -> &str {
        self.raw.rsplit(SEPARATOR).next().unwrap_or("")
    }

    pub fn parent(&self) -> Key {
        match self.raw.rfind(SEPARATOR) {
            Some(0) | None => Key::root(),
            Some(i) => Key::from_raw(&self.raw[..i]),
        }
    }

    pub fn child(&self, other: &Key) -> Key {
        if self.is_root() {
            return other.clone();
        }
        if other.is_root() {
            return self.clone();
        }
        Key::from_raw(format!("{}{}", self.raw, other.raw))
    }

    pub fn child_string(&self, name: &str) -> Key {
        Key::new(format!("{}/{}", self.raw, name))
    }

    /// True if `other` is strictly below this key in the hierarchy.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self == other {
            return false;
        }
        if self.is_root() {
            return true;
        }
        other.raw.starts_with(&self.raw)
            && other.raw.as_bytes().get(self.raw.len()) == Some(&(SEPARATOR as u8))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::new(s)
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split(SEPARATOR) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    out.push(SEPARATOR);
    out.push_str(&segments.join("/"));
    out
}

/// Aligns a query prefix with the key encoding.
///
/// Stored keys always start with `/`; a prefix such as `keks` would sort
/// after every one of them and the scan would come back empty. The empty
/// prefix is left alone and means "everything".
pub fn normalize_prefix(prefix: &str) -> Cow<'_, str> {
    if prefix.is_empty() || prefix.starts_with(SEPARATOR) {
        Cow::Borrowed(prefix)
    } else {
        Cow::Owned(format!("{SEPARATOR}{prefix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cleans_path() {
        assert_eq!(Key::new("kek").as_str(), "/kek");
        assert_eq!(Key::new("/a//b/").as_str(), "/a/b");
        assert_eq!(Key::new("/a/./b/../c").as_str(), "/a/c");
        assert_eq!(Key::new("").as_str(), "/");
        assert_eq!(Key::new("/..").as_str(), "/");
    }

    #[test]
    fn test_hierarchy() {
        let k = Key::new("/blocks/Qm/abc");
        assert_eq!(k.name(), "abc");
        assert_eq!(k.namespaces(), vec!["blocks", "Qm", "abc"]);
        assert_eq!(k.parent(), Key::new("/blocks/Qm"));
        assert_eq!(Key::new("/blocks").parent(), Key::root());
        assert_eq!(Key::root().parent(), Key::root());
        assert_eq!(Key::root().name(), "");

        assert_eq!(Key::new("/a").child(&Key::new("b/c")), Key::new("/a/b/c"));
        assert_eq!(Key::root().child(&Key::new("x")), Key::new("/x"));
        assert_eq!(Key::new("/a").child_string("b"), Key::new("/a/b"));
    }

    #[test]
    fn test_is_ancestor_of() {
        let a = Key::new("/a");
        assert!(a.is_ancestor_of(&Key::new("/a/b")));
        assert!(!a.is_ancestor_of(&Key::new("/ab")));
        assert!(!a.is_ancestor_of(&a));
        assert!(Key::root().is_ancestor_of(&a));
    }

    #[test]
    fn test_from_bytes() {
        assert_eq!(Key::from_bytes(b"/x/y").unwrap(), Key::new("/x/y"));
        assert!(matches!(
            Key::from_bytes(&[b'/', 0xff, 0xfe]),
            Err(DatastoreError::InvalidKey(_))
        ));
        assert!(matches!(
            Key::from_bytes(b"x"),
            Err(DatastoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_public_constructors_always_start_with_separator() {
        for raw in ["bad", "", ".", "..", "a/b", "//a"] {
            assert!(Key::new(raw).as_str().starts_with(SEPARATOR), "{raw:?}");
            assert!(Key::from(raw).as_str().starts_with(SEPARATOR), "{raw:?}");
            assert!(Key::from(raw.to_string())
                .as_str()
                .starts_with(SEPARATOR));
        }
        assert!(Key::new("a").child_string("b").as_str().starts_with(SEPARATOR));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("keks"), "/keks");
        assert_eq!(normalize_prefix("/keks"), "/keks");
        assert_eq!(normalize_prefix("/"), "/");
        assert!(matches!(normalize_prefix("/a"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_unnormalized_prefix_sorts_after_every_key() {
        let stored = Key::new("keks3");
        assert!(stored.as_bytes() < "keks".as_bytes());
        assert!(stored.as_bytes().starts_with(normalize_prefix("keks").as_bytes()));
    }
}
