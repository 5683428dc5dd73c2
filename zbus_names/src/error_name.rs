use std::{borrow::Cow, fmt, ops::Deref};

use crate::{interface_name, Error, Result};

/// A D-Bus error name, e.g. `org.freedesktop.DBus.Error.UnknownMethod`.
///
/// Shares `InterfaceName`'s grammar: two or more dot-separated elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorName<'a>(Cow<'a, str>);

impl<'a> ErrorName<'a> {
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        interface_name::validate(&s).map_err(|_| Error::InvalidErrorName(s.to_string()))?;
        Ok(Self(s))
    }

    /// Whether `s` would validate as a dotted D-Bus error name, without allocating.
    pub fn is_dotted(s: &str) -> bool {
        interface_name::validate(s).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owned(self) -> ErrorName<'static> {
        ErrorName(Cow::Owned(self.0.into_owned()))
    }
}

impl Deref for ErrorName<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> TryFrom<&'a str> for ErrorName<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        ErrorName::new(s)
    }
}

impl TryFrom<String> for ErrorName<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        ErrorName::new(s)
    }
}

impl PartialEq<str> for ErrorName<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_dotted_matches_validation() {
        assert!(ErrorName::is_dotted("org.freedesktop.DBus.Error.Failed"));
        assert!(!ErrorName::is_dotted("NotDotted"));
    }
}
