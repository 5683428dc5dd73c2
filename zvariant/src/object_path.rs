use std::{borrow::Cow, fmt, ops::Deref};

use crate::{Error, Result};

/// Maximum length of an object path, in bytes.
pub const MAX_OBJECT_PATH_LEN: usize = 255;

/// A validated D-Bus object path: `/` or `/seg(/seg)*`, each `seg` matching
/// `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath<'a>(Cow<'a, str>);

impl<'a> ObjectPath<'a> {
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owned(self) -> ObjectPath<'static> {
        ObjectPath(Cow::Owned(self.0.into_owned()))
    }

    /// The direct child segment name relative to `ancestor`, if `self` is strictly nested under
    /// it.
    pub fn strip_prefix(&self, ancestor: &ObjectPath<'_>) -> Option<String> {
        if self.0 == ancestor.0.as_ref() {
            return None;
        }
        let prefix = if ancestor.0.as_ref() == "/" {
            "/".to_string()
        } else {
            format!("{}/", ancestor.0)
        };
        self.0
            .strip_prefix(&prefix)
            .map(|rest| rest.split('/').next().unwrap().to_string())
    }
}

fn validate(s: &str) -> Result<()> {
    if s.len() > MAX_OBJECT_PATH_LEN {
        return Err(Error::ObjectPathInvalid(format!(
            "object path too long: {} bytes",
            s.len()
        )));
    }
    if s == "/" {
        return Ok(());
    }
    if !s.starts_with('/') || s.ends_with('/') {
        return Err(Error::ObjectPathInvalid(s.to_string()));
    }
    for seg in s[1..].split('/') {
        let mut bytes = seg.bytes();
        let valid = match bytes.next() {
            Some(b) => (b.is_ascii_alphabetic() || b == b'_')
                && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_'),
            None => false,
        };
        if !valid {
            return Err(Error::ObjectPathInvalid(s.to_string()));
        }
    }
    Ok(())
}

impl Deref for ObjectPath<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> TryFrom<&'a str> for ObjectPath<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        ObjectPath::new(s)
    }
}

impl TryFrom<String> for ObjectPath<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        ObjectPath::new(s)
    }
}

impl PartialEq<str> for ObjectPath<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ObjectPath<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_root_and_nested() {
        assert!(ObjectPath::new("/").is_ok());
        assert!(ObjectPath::new("/a/b_1/C2").is_ok());
    }

    #[test]
    fn rejects_bad_shapes() {
        for bad in ["", "a", "/a/", "/a//b", "/a/b!", "//", "/1", "/1abc", "/a/2b"] {
            assert!(ObjectPath::new(bad).is_err(), "expected {bad:?} to fail");
        }
    }

    #[test]
    fn strip_prefix_gives_direct_child() {
        let root = ObjectPath::new("/a").unwrap();
        let child = ObjectPath::new("/a/b").unwrap();
        let grandchild = ObjectPath::new("/a/b/c").unwrap();
        assert_eq!(child.strip_prefix(&root).as_deref(), Some("b"));
        assert_eq!(grandchild.strip_prefix(&root).as_deref(), Some("b"));
        assert_eq!(root.strip_prefix(&root), None);
    }
}
