use std::{borrow::Cow, fmt, ops::Deref};

use crate::{interface_name::is_valid_name_element, Error, Result};

/// A member name: shared grammar for method, signal and property names.
///
/// `[A-Za-z_][A-Za-z0-9_]*`, up to 255 bytes, no dots (spec §4.11).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberName<'a>(Cow<'a, str>);

impl<'a> MemberName<'a> {
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        if s.len() > 255 || !is_valid_name_element(&s) {
            return Err(Error::InvalidMemberName(s.to_string()));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owned(self) -> MemberName<'static> {
        MemberName(Cow::Owned(self.0.into_owned()))
    }
}

impl Deref for MemberName<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> TryFrom<&'a str> for MemberName<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        MemberName::new(s)
    }
}

impl TryFrom<String> for MemberName<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        MemberName::new(s)
    }
}

impl PartialEq<str> for MemberName<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for MemberName<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid() {
        for good in ["Get", "_private", "Member2"] {
            assert!(MemberName::new(good).is_ok());
        }
    }

    #[test]
    fn rejects_invalid() {
        for bad in ["1Member", "Has.Dot", "has space", ""] {
            assert!(MemberName::new(bad).is_err(), "expected {bad:?} to fail");
        }
    }
}
