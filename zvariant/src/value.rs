//! The signed-value tree: a runtime value tagged with the signature kind that will drive its
//! encoding. See spec §3/§4.2 ("Signed value").

use std::collections::BTreeMap;

use crate::{object_path::ObjectPath, signature::Type, Error, Result, Signature};

/// An array's elements plus the signature of those elements.
///
/// The element signature is carried even when `elements` is empty, since an empty array still
/// needs to advertise the alignment of the element kind it would have held (spec §3 invariants).
#[derive(Debug, Clone, PartialEq)]
pub struct Array<'a> {
    element_type: Type,
    elements: Vec<Value<'a>>,
}

impl<'a> Array<'a> {
    pub fn new(element_type: Type) -> Self {
        Self {
            element_type,
            elements: Vec::new(),
        }
    }

    pub fn from_values(element_type: Type, elements: Vec<Value<'a>>) -> Self {
        Self {
            element_type,
            elements,
        }
    }

    pub fn element_type(&self) -> &Type {
        &self.element_type
    }

    pub fn elements(&self) -> &[Value<'a>] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Value<'a>> {
        self.elements
    }

    pub fn push(&mut self, value: Value<'a>) {
        self.elements.push(value);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// A D-Bus struct: an ordered, non-empty sequence of field values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure<'a>(Vec<Value<'a>>);

impl<'a> Structure<'a> {
    pub fn new(fields: Vec<Value<'a>>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[Value<'a>] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<Value<'a>> {
        self.0
    }
}

/// The signed-value tree.
///
/// A tagged sum type: each variant names the signature kind of its payload, per the Design
/// Notes directive to model this as a sum type rather than a runtime-typed object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    U8(u8),
    Bool(bool),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    ObjectPath(ObjectPath<'a>),
    Signature(Signature<'a>),
    UnixFd(u32),
    Array(Array<'a>),
    Structure(Structure<'a>),
    DictEntry(Box<Value<'a>>, Box<Value<'a>>),
    Variant(Box<Value<'a>>),
}

impl<'a> Value<'a> {
    /// Compute the signature-kind tree for this value.
    ///
    /// For a `Variant`, this is always `Type::Variant` — the *inner* signature is obtained
    /// separately via [`Value::inner_signature`] and is what gets written to the wire ahead of
    /// the variant's payload.
    pub fn value_type(&self) -> Type {
        match self {
            Value::U8(_) => Type::Byte,
            Value::Bool(_) => Type::Bool,
            Value::I16(_) => Type::I16,
            Value::U16(_) => Type::U16,
            Value::I32(_) => Type::I32,
            Value::U32(_) => Type::U32,
            Value::I64(_) => Type::I64,
            Value::U64(_) => Type::U64,
            Value::F64(_) => Type::F64,
            Value::Str(_) => Type::Str,
            Value::ObjectPath(_) => Type::ObjectPath,
            Value::Signature(_) => Type::Signature,
            Value::UnixFd(_) => Type::UnixFd,
            Value::Array(a) => Type::Array(Box::new(a.element_type().clone())),
            Value::Structure(s) => {
                Type::Struct(s.fields().iter().map(Value::value_type).collect())
            }
            Value::DictEntry(k, v) => {
                Type::DictEntry(Box::new(k.value_type()), Box::new(v.value_type()))
            }
            Value::Variant(_) => Type::Variant,
        }
    }

    /// The signature of the value a `Variant` carries, used to write the `g`-prefix on the wire.
    pub fn inner_signature(&self) -> Result<Signature<'static>> {
        match self {
            Value::Variant(inner) => {
                let ty = inner.value_type();
                Signature::new(ty.to_signature_string()).map(Signature::into_owned)
            }
            other => Err(Error::InvalidValue(format!(
                "{:?} is not a variant",
                other.value_type()
            ))),
        }
    }

    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::U8(v) => Value::U8(v),
            Value::Bool(v) => Value::Bool(v),
            Value::I16(v) => Value::I16(v),
            Value::U16(v) => Value::U16(v),
            Value::I32(v) => Value::I32(v),
            Value::U32(v) => Value::U32(v),
            Value::I64(v) => Value::I64(v),
            Value::U64(v) => Value::U64(v),
            Value::F64(v) => Value::F64(v),
            Value::Str(v) => Value::Str(v),
            Value::ObjectPath(v) => Value::ObjectPath(v.into_owned()),
            Value::Signature(v) => Value::Signature(v.into_owned()),
            Value::UnixFd(v) => Value::UnixFd(v),
            Value::Array(a) => Value::Array(Array {
                element_type: a.element_type,
                elements: a.elements.into_iter().map(Value::into_owned).collect(),
            }),
            Value::Structure(s) => {
                Value::Structure(Structure(s.0.into_iter().map(Value::into_owned).collect()))
            }
            Value::DictEntry(k, v) => {
                Value::DictEntry(Box::new(k.into_owned()), Box::new(v.into_owned()))
            }
            Value::Variant(v) => Value::Variant(Box::new(v.into_owned())),
        }
    }

    /// Interpret an `a{sv}`-shaped value (or any `a{kv}`) as an ordered mapping of decoded
    /// key/value pairs, as the decoder produces for string-keyed dictionaries (spec §4.4).
    pub fn as_dict_entries(&self) -> Option<Vec<(&Value<'a>, &Value<'a>)>> {
        match self {
            Value::Array(a) => a
                .elements()
                .iter()
                .map(|e| match e {
                    Value::DictEntry(k, v) => Some((k.as_ref(), v.as_ref())),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::ObjectPath(p) => Some(p.as_str()),
            Value::Signature(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            Value::UnixFd(v) => Some(*v),
            _ => None,
        }
    }

    /// Unwrap a `Variant`, recursively, returning the innermost non-variant value.
    pub fn unwrap_variant(&self) -> &Value<'a> {
        match self {
            Value::Variant(inner) => inner.unwrap_variant(),
            other => other,
        }
    }
}

macro_rules! from_scalar {
    ($ty:ty, $variant:ident) => {
        impl<'a> From<$ty> for Value<'a> {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

from_scalar!(u8, U8);
from_scalar!(bool, Bool);
from_scalar!(i16, I16);
from_scalar!(u16, U16);
from_scalar!(i32, I32);
from_scalar!(u32, U32);
from_scalar!(i64, I64);
from_scalar!(u64, U64);
from_scalar!(f64, F64);

impl<'a> From<String> for Value<'a> {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<'a> From<&str> for Value<'a> {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl<'a> From<ObjectPath<'a>> for Value<'a> {
    fn from(v: ObjectPath<'a>) -> Self {
        Value::ObjectPath(v)
    }
}

impl<'a> From<Signature<'a>> for Value<'a> {
    fn from(v: Signature<'a>) -> Self {
        Value::Signature(v)
    }
}

impl<'a> From<Vec<u8>> for Value<'a> {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Array(Array::from_values(
            Type::Byte,
            bytes.into_iter().map(Value::U8).collect(),
        ))
    }
}

/// Normalize a `a{sv}`-style mapping (insertion order preserved) into a signed `Value`.
///
/// An empty mapping is valid input and normalizes to a zero-length array with the dict-entry
/// element kind still attached, per spec §4.2.
pub fn dict_to_value<'a>(
    key_type: Type,
    value_type: Type,
    entries: Vec<(Value<'a>, Value<'a>)>,
) -> Result<Value<'a>> {
    let mut seen = std::collections::HashSet::new();
    let mut elements = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let key_repr = format!("{:?}", k);
        if !seen.insert(key_repr) {
            return Err(Error::InvalidValue("duplicate dict key".into()));
        }
        elements.push(Value::DictEntry(Box::new(k), Box::new(v)));
    }
    Ok(Value::Array(Array::from_values(
        Type::DictEntry(Box::new(key_type), Box::new(value_type)),
        elements,
    )))
}

/// Infer the signature of a raw, not-yet-tagged value when packing it into a `Variant`, per the
/// inference table in spec §4.2.
pub fn infer_variant(value: Value<'static>) -> Value<'static> {
    Value::Variant(Box::new(value))
}

/// Build an `a{sv}` value from an ordered map of string keys to variants — the common shape for
/// `Properties.GetAll` and `ObjectManager` payloads.
pub fn string_variant_dict(entries: Vec<(String, Value<'static>)>) -> Value<'static> {
    let elements = entries
        .into_iter()
        .map(|(k, v)| {
            Value::DictEntry(
                Box::new(Value::Str(k)),
                Box::new(Value::Variant(Box::new(v))),
            )
        })
        .collect();
    Value::Array(Array::from_values(
        Type::DictEntry(Box::new(Type::Str), Box::new(Type::Variant)),
        elements,
    ))
}

/// Read back an `a{sv}` value into an ordered map, the inverse of [`string_variant_dict`].
pub fn into_string_variant_map(value: &Value<'_>) -> Result<BTreeMap<String, Value<'static>>> {
    let entries = value
        .as_dict_entries()
        .ok_or_else(|| Error::InvalidValue("expected a{sv}".into()))?;
    let mut map = BTreeMap::new();
    for (k, v) in entries {
        let key = k
            .as_str()
            .ok_or_else(|| Error::InvalidValue("a{sv} key must be a string".into()))?
            .to_owned();
        map.insert(key, v.clone().into_owned());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_array_keeps_element_type() {
        let arr = Array::new(Type::I32);
        let value = Value::Array(arr);
        assert_eq!(value.value_type(), Type::Array(Box::new(Type::I32)));
    }

    #[test]
    fn variant_inner_signature_round_trips() {
        let v = Value::Variant(Box::new(Value::I32(42)));
        assert_eq!(v.inner_signature().unwrap().as_str(), "i");
    }

    #[test]
    fn dict_to_value_rejects_duplicate_keys() {
        let entries = vec![
            (Value::Str("a".into()), Value::I32(1)),
            (Value::Str("a".into()), Value::I32(2)),
        ];
        assert!(dict_to_value(Type::Str, Type::I32, entries).is_err());
    }

    #[test]
    fn string_variant_dict_round_trips() {
        let value = string_variant_dict(vec![
            ("a".into(), Value::I32(1)),
            ("b".into(), Value::Str("x".into())),
        ]);
        let map = into_string_variant_map(&value).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], Value::Variant(Box::new(Value::I32(1))));
    }
}
