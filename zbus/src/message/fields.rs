//! The variable header-field array: `a(yv)`, per spec §3/§4.5.

use zbus_names::{BusName, ErrorName, InterfaceName, MemberName, UniqueName};
use zvariant::{Array, ObjectPath, Signature, Structure, Type as VType, Value};

use crate::{Error, Result};

/// The wire code for a single header field, 1..8 (spec §4.5).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldCode {
    Path = 1,
    Interface = 2,
    Member = 3,
    ErrorName = 4,
    ReplySerial = 5,
    Destination = 6,
    Sender = 7,
    Signature = 8,
    UnixFds = 9,
}

impl TryFrom<u8> for FieldCode {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        Ok(match v {
            1 => FieldCode::Path,
            2 => FieldCode::Interface,
            3 => FieldCode::Member,
            4 => FieldCode::ErrorName,
            5 => FieldCode::ReplySerial,
            6 => FieldCode::Destination,
            7 => FieldCode::Sender,
            8 => FieldCode::Signature,
            9 => FieldCode::UnixFds,
            other => return Err(Error::Variant(zvariant::Error::InvalidValue(format!(
                "unknown header field code {other}"
            )))),
        })
    }
}

/// A single decoded header field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<'m> {
    Path(ObjectPath<'m>),
    Interface(InterfaceName<'m>),
    Member(MemberName<'m>),
    ErrorName(ErrorName<'m>),
    ReplySerial(u32),
    Destination(BusName<'m>),
    Sender(UniqueName<'m>),
    Signature(Signature<'m>),
    UnixFds(u32),
}

impl Field<'static> {
    fn code(&self) -> FieldCode {
        match self {
            Field::Path(_) => FieldCode::Path,
            Field::Interface(_) => FieldCode::Interface,
            Field::Member(_) => FieldCode::Member,
            Field::ErrorName(_) => FieldCode::ErrorName,
            Field::ReplySerial(_) => FieldCode::ReplySerial,
            Field::Destination(_) => FieldCode::Destination,
            Field::Sender(_) => FieldCode::Sender,
            Field::Signature(_) => FieldCode::Signature,
            Field::UnixFds(_) => FieldCode::UnixFds,
        }
    }

    fn to_value(&self) -> Value<'static> {
        match self {
            Field::Path(v) => Value::ObjectPath(v.clone()),
            Field::Interface(v) => Value::Str(v.as_str().to_owned()),
            Field::Member(v) => Value::Str(v.as_str().to_owned()),
            Field::ErrorName(v) => Value::Str(v.as_str().to_owned()),
            Field::ReplySerial(v) => Value::U32(*v),
            Field::Destination(v) => Value::Str(v.as_str().to_owned()),
            Field::Sender(v) => Value::Str(v.as_str().to_owned()),
            Field::Signature(v) => Value::Signature(v.clone()),
            Field::UnixFds(v) => Value::U32(*v),
        }
    }

    fn from_code_and_value(code: FieldCode, value: Value<'static>) -> Result<Self> {
        let invalid = || {
            Error::Variant(zvariant::Error::InvalidValue(
                "header field value did not match its code".into(),
            ))
        };
        Ok(match code {
            FieldCode::Path => Field::Path(match value {
                Value::ObjectPath(p) => p,
                _ => return Err(invalid()),
            }),
            FieldCode::Interface => Field::Interface(InterfaceName::new(str_of(value, invalid)?)?),
            FieldCode::Member => Field::Member(MemberName::new(str_of(value, invalid)?)?),
            FieldCode::ErrorName => Field::ErrorName(ErrorName::new(str_of(value, invalid)?)?),
            FieldCode::ReplySerial => Field::ReplySerial(match value {
                Value::U32(v) => v,
                _ => return Err(invalid()),
            }),
            FieldCode::Destination => Field::Destination(BusName::new(str_of(value, invalid)?)?),
            FieldCode::Sender => Field::Sender(UniqueName::new(str_of(value, invalid)?)?),
            FieldCode::Signature => Field::Signature(match value {
                Value::Signature(s) => s,
                _ => return Err(invalid()),
            }),
            FieldCode::UnixFds => Field::UnixFds(match value {
                Value::U32(v) => v,
                _ => return Err(invalid()),
            }),
        })
    }
}

fn str_of(value: Value<'static>, invalid: impl Fn() -> Error) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(invalid()),
    }
}

/// The complete set of header fields present on a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields<'m>(Vec<Field<'m>>);

impl<'m> Fields<'m> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn add(&mut self, field: Field<'m>) {
        self.0.push(field);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field<'m>> {
        self.0.iter()
    }
}

impl Fields<'static> {
    pub fn get_path(&self) -> Option<&ObjectPath<'static>> {
        self.0.iter().find_map(|f| match f {
            Field::Path(v) => Some(v),
            _ => None,
        })
    }

    pub fn get_interface(&self) -> Option<&InterfaceName<'static>> {
        self.0.iter().find_map(|f| match f {
            Field::Interface(v) => Some(v),
            _ => None,
        })
    }

    pub fn get_member(&self) -> Option<&MemberName<'static>> {
        self.0.iter().find_map(|f| match f {
            Field::Member(v) => Some(v),
            _ => None,
        })
    }

    pub fn get_error_name(&self) -> Option<&ErrorName<'static>> {
        self.0.iter().find_map(|f| match f {
            Field::ErrorName(v) => Some(v),
            _ => None,
        })
    }

    pub fn get_reply_serial(&self) -> Option<u32> {
        self.0.iter().find_map(|f| match f {
            Field::ReplySerial(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_destination(&self) -> Option<&BusName<'static>> {
        self.0.iter().find_map(|f| match f {
            Field::Destination(v) => Some(v),
            _ => None,
        })
    }

    pub fn get_sender(&self) -> Option<&UniqueName<'static>> {
        self.0.iter().find_map(|f| match f {
            Field::Sender(v) => Some(v),
            _ => None,
        })
    }

    pub fn get_signature(&self) -> Option<&Signature<'static>> {
        self.0.iter().find_map(|f| match f {
            Field::Signature(v) => Some(v),
            _ => None,
        })
    }

    /// Encode this field set as the `a(yv)` value the wire format expects.
    pub fn to_value(&self) -> Value<'static> {
        let elements = self
            .0
            .iter()
            .map(|f| {
                Value::Structure(Structure::new(vec![
                    Value::U8(f.code() as u8),
                    Value::Variant(Box::new(f.to_value())),
                ]))
            })
            .collect();
        Value::Array(Array::from_values(
            VType::Struct(vec![VType::Byte, VType::Variant]),
            elements,
        ))
    }

    /// Decode an `a(yv)` value back into a field set. Unknown field codes are ignored, per the
    /// D-Bus specification's forward-compatibility rule.
    pub fn from_value(value: &Value<'static>) -> Result<Self> {
        let array = match value {
            Value::Array(a) => a,
            _ => {
                return Err(Error::Variant(zvariant::Error::InvalidValue(
                    "header fields must be an array".into(),
                )))
            }
        };
        let mut fields = Vec::new();
        for element in array.elements() {
            let fields_of_struct = match element {
                Value::Structure(s) => s.fields(),
                _ => {
                    return Err(Error::Variant(zvariant::Error::InvalidValue(
                        "header field entry must be a struct".into(),
                    )))
                }
            };
            let (code, variant) = match fields_of_struct {
                [Value::U8(code), Value::Variant(inner)] => (*code, inner.as_ref().clone()),
                _ => {
                    return Err(Error::Variant(zvariant::Error::InvalidValue(
                        "header field entry must be (y v)".into(),
                    )))
                }
            };
            let Ok(code) = FieldCode::try_from(code) else {
                continue;
            };
            fields.push(Field::from_code_and_value(code, variant)?);
        }
        Ok(Self(fields))
    }
}
