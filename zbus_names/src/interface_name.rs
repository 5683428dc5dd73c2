use std::{borrow::Cow, fmt, ops::Deref};

use crate::{Error, Result};

/// A D-Bus interface name, e.g. `org.freedesktop.DBus.Properties`.
///
/// Two or more dot-separated elements, each matching `[A-Za-z_][A-Za-z0-9_]*` (spec §4.11).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceName<'a>(Cow<'a, str>);

impl<'a> InterfaceName<'a> {
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        validate(&s).map_err(|_| Error::InvalidInterfaceName(s.to_string()))?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owned(self) -> InterfaceName<'static> {
        InterfaceName(Cow::Owned(self.0.into_owned()))
    }
}

pub(crate) fn validate(s: &str) -> std::result::Result<(), ()> {
    if s.len() > 255 {
        return Err(());
    }
    let elements: Vec<&str> = s.split('.').collect();
    if elements.len() < 2 {
        return Err(());
    }
    for elem in elements {
        if !is_valid_name_element(elem) {
            return Err(());
        }
    }
    Ok(())
}

pub(crate) fn is_valid_name_element(elem: &str) -> bool {
    let mut chars = elem.bytes();
    match chars.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    chars.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl Deref for InterfaceName<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> TryFrom<&'a str> for InterfaceName<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        InterfaceName::new(s)
    }
}

impl TryFrom<String> for InterfaceName<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        InterfaceName::new(s)
    }
}

impl PartialEq<str> for InterfaceName<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for InterfaceName<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid() {
        assert!(InterfaceName::new("org.freedesktop.DBus.Properties").is_ok());
    }

    #[test]
    fn rejects_invalid() {
        for bad in ["org", "org.1Foo", "org..Foo", "org.Foo-Bar"] {
            assert!(InterfaceName::new(bad).is_err(), "expected {bad:?} to fail");
        }
    }
}
