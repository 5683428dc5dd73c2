use std::{borrow::Cow, fmt, ops::Deref};

use static_assertions::assert_impl_all;

use crate::{Error, Result, UniqueName, WellKnownName};

/// Either a unique name (`:1.42`) or a well-known name (`org.example.Foo`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusName<'a> {
    Unique(UniqueName<'a>),
    WellKnown(WellKnownName<'a>),
}

assert_impl_all!(BusName<'_>: Send, Sync, Unpin);

impl<'a> BusName<'a> {
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        if s.starts_with(':') {
            UniqueName::new(s).map(BusName::Unique)
        } else {
            WellKnownName::new(s).map(BusName::WellKnown)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BusName::Unique(n) => n.as_str(),
            BusName::WellKnown(n) => n.as_str(),
        }
    }

    pub fn into_owned(self) -> BusName<'static> {
        match self {
            BusName::Unique(n) => BusName::Unique(n.into_owned()),
            BusName::WellKnown(n) => BusName::WellKnown(n.into_owned()),
        }
    }
}

impl Deref for BusName<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BusName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'a> TryFrom<&'a str> for BusName<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        BusName::new(s)
    }
}

impl TryFrom<String> for BusName<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        BusName::new(s)
    }
}

impl<'a> From<UniqueName<'a>> for BusName<'a> {
    fn from(n: UniqueName<'a>) -> Self {
        BusName::Unique(n)
    }
}

impl<'a> From<WellKnownName<'a>> for BusName<'a> {
    fn from(n: WellKnownName<'a>) -> Self {
        BusName::WellKnown(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_leading_colon() {
        assert!(matches!(BusName::new(":1.1").unwrap(), BusName::Unique(_)));
        assert!(matches!(
            BusName::new("org.example.Foo").unwrap(),
            BusName::WellKnown(_)
        ));
    }
}
