//! The signature mini-language and its parser.
//!
//! A signature string is parsed once, up front, into a tree of [`Type`] nodes. Everything
//! downstream (the signed-value normalizer, the encoder, the decoder) walks this tree rather
//! than re-scanning the string.

use std::{borrow::Cow, fmt, ops::Deref};

use crate::{Error, Result};

/// Maximum length of a signature, in bytes, per the D-Bus specification.
pub const MAX_SIGNATURE_LEN: usize = 255;

/// A single node in a parsed signature tree.
///
/// Basic kinds carry no children. `Array` always has exactly one. `Struct` has one or more.
/// `DictEntry` has exactly two (key, value). `Variant` has none: its contents are determined at
/// runtime by the value it wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Byte,
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F64,
    Str,
    ObjectPath,
    Signature,
    UnixFd,
    Array(Box<Type>),
    Struct(Vec<Type>),
    DictEntry(Box<Type>, Box<Type>),
    Variant,
}

impl Type {
    /// The single-character wire code for this kind (the opening bracket for containers).
    pub fn code(&self) -> u8 {
        match self {
            Type::Byte => b'y',
            Type::Bool => b'b',
            Type::I16 => b'n',
            Type::U16 => b'q',
            Type::I32 => b'i',
            Type::U32 => b'u',
            Type::I64 => b'x',
            Type::U64 => b't',
            Type::F64 => b'd',
            Type::Str => b's',
            Type::ObjectPath => b'o',
            Type::Signature => b'g',
            Type::UnixFd => b'h',
            Type::Array(_) => b'a',
            Type::Struct(_) => b'(',
            Type::DictEntry(_, _) => b'{',
            Type::Variant => b'v',
        }
    }

    /// The alignment, in bytes, required before a value of this kind.
    pub fn alignment(&self) -> usize {
        match self {
            Type::Byte | Type::Signature | Type::Variant => 1,
            Type::I16 | Type::U16 => 2,
            Type::Bool
            | Type::I32
            | Type::U32
            | Type::UnixFd
            | Type::Str
            | Type::ObjectPath
            | Type::Array(_) => 4,
            Type::I64 | Type::U64 | Type::F64 | Type::Struct(_) | Type::DictEntry(_, _) => 8,
        }
    }

    /// Whether this kind is one of the fixed-size basic scalars (everything but strings and
    /// containers).
    pub fn is_fixed_size(&self) -> bool {
        matches!(
            self,
            Type::Byte
                | Type::Bool
                | Type::I16
                | Type::U16
                | Type::I32
                | Type::U32
                | Type::I64
                | Type::U64
                | Type::F64
                | Type::UnixFd
        )
    }

    /// Render this node back into its signature string form.
    pub fn to_signature_string(&self) -> String {
        let mut s = String::new();
        self.write_signature(&mut s);
        s
    }

    fn write_signature(&self, out: &mut String) {
        match self {
            Type::Array(elem) => {
                out.push('a');
                elem.write_signature(out);
            }
            Type::Struct(fields) => {
                out.push('(');
                for f in fields {
                    f.write_signature(out);
                }
                out.push(')');
            }
            Type::DictEntry(k, v) => {
                out.push('{');
                k.write_signature(out);
                v.write_signature(out);
                out.push('}');
            }
            other => out.push(other.code() as char),
        }
    }
}

/// Parse a complete signature string into its top-level sequence of type nodes.
///
/// A multi-type signature such as `"si"` yields two nodes; each represents an independent
/// argument. A signature wrapped in parens, e.g. `"(si)"`, yields a single `Type::Struct` node.
pub fn parse_signature(sig: &str) -> Result<Vec<Type>> {
    if sig.len() > MAX_SIGNATURE_LEN {
        return Err(Error::SignatureTooLong(sig.len()));
    }
    let bytes = sig.as_bytes();
    let mut pos = 0;
    let mut nodes = Vec::new();
    while pos < bytes.len() {
        let (node, next) = parse_one(bytes, pos)?;
        nodes.push(node);
        pos = next;
    }
    Ok(nodes)
}

/// Parse exactly one type node starting at `pos`, returning it and the position just past it.
fn parse_one(bytes: &[u8], pos: usize) -> Result<(Type, usize)> {
    let c = *bytes
        .get(pos)
        .ok_or_else(|| Error::BadSignature("unexpected end of signature".into()))?;
    match c {
        b'y' => Ok((Type::Byte, pos + 1)),
        b'b' => Ok((Type::Bool, pos + 1)),
        b'n' => Ok((Type::I16, pos + 1)),
        b'q' => Ok((Type::U16, pos + 1)),
        b'i' => Ok((Type::I32, pos + 1)),
        b'u' => Ok((Type::U32, pos + 1)),
        b'x' => Ok((Type::I64, pos + 1)),
        b't' => Ok((Type::U64, pos + 1)),
        b'd' => Ok((Type::F64, pos + 1)),
        b's' => Ok((Type::Str, pos + 1)),
        b'o' => Ok((Type::ObjectPath, pos + 1)),
        b'g' => Ok((Type::Signature, pos + 1)),
        b'h' => Ok((Type::UnixFd, pos + 1)),
        b'v' => Ok((Type::Variant, pos + 1)),
        b'a' => {
            let (elem, next) = parse_one(bytes, pos + 1)
                .map_err(|_| Error::BadSignature(format!("array missing element type at {pos}")))?;
            Ok((Type::Array(Box::new(elem)), next))
        }
        b'(' => {
            let mut fields = Vec::new();
            let mut cursor = pos + 1;
            loop {
                match bytes.get(cursor) {
                    Some(b')') => break,
                    Some(_) => {
                        let (field, next) = parse_one(bytes, cursor)?;
                        fields.push(field);
                        cursor = next;
                    }
                    None => {
                        return Err(Error::BadSignature(
                            "unterminated struct signature".into(),
                        ))
                    }
                }
            }
            if fields.is_empty() {
                return Err(Error::BadSignature("struct with no fields".into()));
            }
            Ok((Type::Struct(fields), cursor + 1))
        }
        b'{' => {
            let (key, next) = parse_one(bytes, pos + 1)?;
            if !matches!(
                key,
                Type::Byte
                    | Type::Bool
                    | Type::I16
                    | Type::U16
                    | Type::I32
                    | Type::U32
                    | Type::I64
                    | Type::U64
                    | Type::F64
                    | Type::Str
                    | Type::ObjectPath
                    | Type::Signature
                    | Type::UnixFd
            ) {
                return Err(Error::BadSignature(
                    "dict-entry key must be a basic type".into(),
                ));
            }
            let (value, next) = parse_one(bytes, next)?;
            match bytes.get(next) {
                Some(b'}') => Ok((Type::DictEntry(Box::new(key), Box::new(value)), next + 1)),
                _ => Err(Error::BadSignature(
                    "unterminated dict-entry signature".into(),
                )),
            }
        }
        other => Err(Error::BadSignature(format!(
            "unknown type code '{}'",
            other as char
        ))),
    }
}

/// A validated, possibly-borrowed signature string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature<'a>(Cow<'a, str>);

impl<'a> Signature<'a> {
    /// Validate and wrap `s` as a signature.
    pub fn new(s: impl Into<Cow<'a, str>>) -> Result<Self> {
        let s = s.into();
        if s.len() > MAX_SIGNATURE_LEN {
            return Err(Error::SignatureTooLong(s.len()));
        }
        parse_signature(&s)?;
        Ok(Self(s))
    }

    /// Wrap `s` without validating it. Only safe for strings this crate already produced.
    pub fn from_static_trusted(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }

    /// Parse this signature's string into its type-node tree.
    pub fn types(&self) -> Result<Vec<Type>> {
        parse_signature(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owned(self) -> Signature<'static> {
        Signature(Cow::Owned(self.0.into_owned()))
    }
}

impl Deref for Signature<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> TryFrom<&'a str> for Signature<'a> {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        Signature::new(s)
    }
}

impl TryFrom<String> for Signature<'static> {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Signature::new(s)
    }
}

/// Build the signature string for a sequence of top-level type nodes.
pub fn signature_string_for(types: &[Type]) -> String {
    let mut s = String::new();
    for t in types {
        t.write_signature(&mut s);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_kinds() {
        let types = parse_signature("ybnqiuxtdsogh").unwrap();
        assert_eq!(types.len(), 13);
    }

    #[test]
    fn parses_array_of_struct() {
        let types = parse_signature("a(is)").unwrap();
        assert_eq!(
            types[0],
            Type::Array(Box::new(Type::Struct(vec![Type::I32, Type::Str])))
        );
    }

    #[test]
    fn parses_dict() {
        let types = parse_signature("a{sv}").unwrap();
        assert_eq!(
            types[0],
            Type::Array(Box::new(Type::DictEntry(
                Box::new(Type::Str),
                Box::new(Type::Variant)
            )))
        );
    }

    #[test]
    fn rejects_unknown_code() {
        assert!(parse_signature("z").is_err());
    }

    #[test]
    fn rejects_truncated_array() {
        assert!(parse_signature("a").is_err());
    }

    #[test]
    fn rejects_truncated_struct() {
        assert!(parse_signature("(i").is_err());
    }

    #[test]
    fn rejects_dict_entry_with_container_key() {
        assert!(parse_signature("{(i)s}").is_err());
    }

    #[test]
    fn rejects_too_long() {
        let sig = "y".repeat(256);
        assert!(matches!(
            parse_signature(&sig),
            Err(Error::SignatureTooLong(256))
        ));
    }

    #[test]
    fn round_trips_to_string() {
        for sig in ["si", "a(is)", "a{sv}", "(sv)", "aay"] {
            let types = parse_signature(sig).unwrap();
            assert_eq!(signature_string_for(&types), sig);
        }
    }
}
