use std::{borrow::Cow, fmt, ops::Deref};

use crate::{Error, Result};

/// A well-known bus name, e.g. `org.example.Foo`.
///
/// Two or more dot-separated elements; each starts with a letter, underscore or hyphen and
/// contains `[A-Za-z0-9_-]`; no consecutive, leading or trailing dots (spec §4.11).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WellKnownName<'a>(Cow<'a, str>);

impl<'a> WellKnownName<'a> {
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owned(self) -> WellKnownName<'static> {
        WellKnownName(Cow::Owned(self.0.into_owned()))
    }
}

pub(crate) fn validate(s: &str) -> Result<()> {
    if s.len() > 255 || s.starts_with(':') {
        return Err(Error::InvalidWellKnownName(s.to_string()));
    }
    let elements: Vec<&str> = s.split('.').collect();
    if elements.len() < 2 {
        return Err(Error::InvalidWellKnownName(s.to_string()));
    }
    for elem in &elements {
        if elem.is_empty() {
            return Err(Error::InvalidWellKnownName(s.to_string()));
        }
        let mut chars = elem.bytes();
        let first = chars.next().unwrap();
        if !(first.is_ascii_alphabetic() || first == b'_' || first == b'-') {
            return Err(Error::InvalidWellKnownName(s.to_string()));
        }
        if !chars.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            return Err(Error::InvalidWellKnownName(s.to_string()));
        }
    }
    Ok(())
}

impl Deref for WellKnownName<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WellKnownName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> TryFrom<&'a str> for WellKnownName<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        WellKnownName::new(s)
    }
}

impl TryFrom<String> for WellKnownName<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        WellKnownName::new(s)
    }
}

impl PartialEq<str> for WellKnownName<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for WellKnownName<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid() {
        for good in ["org.example.Foo", "a.b", "_a.b-c", "org.example.Foo2"] {
            assert!(WellKnownName::new(good).is_ok(), "expected {good:?} to pass");
        }
    }

    #[test]
    fn rejects_invalid() {
        for bad in [
            "org",
            "org.",
            ".org.example",
            "org..example",
            "org.1example",
            ":1.42",
            "org.exam ple",
        ] {
            assert!(WellKnownName::new(bad).is_err(), "expected {bad:?} to fail");
        }
    }
}
