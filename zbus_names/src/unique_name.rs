use std::{borrow::Cow, fmt, ops::Deref};

use crate::{Error, Result};

/// A bus-assigned unique name, e.g. `:1.42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueName<'a>(Cow<'a, str>);

impl<'a> UniqueName<'a> {
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owned(self) -> UniqueName<'static> {
        UniqueName(Cow::Owned(self.0.into_owned()))
    }
}

fn validate(s: &str) -> Result<()> {
    if s.len() > 255 || !s.starts_with(':') {
        return Err(Error::InvalidUniqueName(s.to_string()));
    }
    let elements: Vec<&str> = s[1..].split('.').collect();
    if elements.len() < 2 || elements.iter().any(|e| e.is_empty()) {
        return Err(Error::InvalidUniqueName(s.to_string()));
    }
    for elem in elements {
        if !elem.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            return Err(Error::InvalidUniqueName(s.to_string()));
        }
    }
    Ok(())
}

impl Deref for UniqueName<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> TryFrom<&'a str> for UniqueName<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        UniqueName::new(s)
    }
}

impl TryFrom<String> for UniqueName<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        UniqueName::new(s)
    }
}

impl PartialEq<str> for UniqueName<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for UniqueName<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid() {
        assert!(UniqueName::new(":1.42").is_ok());
        assert!(UniqueName::new(":1.0").is_ok());
    }

    #[test]
    fn rejects_invalid() {
        for bad in ["1.42", ":1", ":1..2", ":1.", ":.1", ":1.4 2"] {
            assert!(UniqueName::new(bad).is_err(), "expected {bad:?} to fail");
        }
    }
}
