//! The decoder: mirrors [`crate::ser`], reading a signed [`Value`] tree back out of a byte
//! buffer at a cursor position. See spec §4.4.

use crate::{
    object_path::ObjectPath,
    signature::Type,
    value::{Array, Structure, Value},
    Endian, Error, Result, Signature,
};

/// Options controlling decode-time presentation choices that are not part of the wire format
/// itself (spec §4.4: "narrow to 53-bit integer where representable").
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// When set, a 64-bit integer decoded inside a `Variant` is narrowed to `Value::I32`/
    /// `Value::U32` if its value fits there. Variant contents are the only place this is safe to
    /// do: an array or struct field's type is fixed by its signature, so narrowing one `I64`
    /// element there would leave it tagged with a type its siblings don't share. A variant's
    /// signature is derived from its payload at encode time, so re-tagging the payload as a
    /// narrower integer is still a valid encoding of the same value. This does not reach all the
    /// way down to a true 53-bit type, since `Value` has none; it narrows as far as `I32`/`U32`
    /// go and leaves anything wider untouched.
    pub narrow_53_bit: bool,
}

fn narrow_variant_payload(value: Value<'static>) -> Value<'static> {
    match value {
        Value::I64(n) if (i32::MIN as i64..=i32::MAX as i64).contains(&n) => Value::I32(n as i32),
        Value::U64(n) if n <= u32::MAX as u64 => Value::U32(n as u32),
        other => other,
    }
}

pub struct Decoder<'b> {
    endian: Endian,
    base_offset: usize,
    buf: &'b [u8],
    pos: usize,
    options: DecodeOptions,
}

impl<'b> Decoder<'b> {
    pub fn new(endian: Endian, base_offset: usize, buf: &'b [u8], options: DecodeOptions) -> Self {
        Self {
            endian,
            base_offset,
            buf,
            pos: 0,
            options,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Advance past padding bytes until the cursor sits on an `alignment`-byte boundary.
    ///
    /// Exposed for callers (such as the header-fields codec in `zbus`) that need to decode a
    /// sequence of values whose overall byte length is already known from elsewhere on the wire,
    /// rather than from a length prefix this decoder would otherwise read itself.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        self.pad_to(alignment)
    }

    fn absolute_position(&self) -> usize {
        self.base_offset + self.pos
    }

    fn pad_to(&mut self, alignment: usize) -> Result<()> {
        let rem = self.absolute_position() % alignment;
        if rem != 0 {
            self.advance(alignment - rem)?;
        }
        Ok(())
    }

    fn advance(&mut self, n: usize) -> Result<&'b [u8]> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(Error::ReadBuffer {
                needed: end,
                available: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.advance(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.pad_to(4)?;
        let raw = self.endian.read_u32(self.advance(4)?);
        match raw {
            0 => Ok(false),
            1 => Ok(true),
            // Spec: "other values should be reported via the error kind but may be coerced for
            // compatibility." We coerce (any nonzero is true) but surface the strict error via a
            // dedicated constructor for callers that want strictness.
            _ => Ok(raw != 0),
        }
    }

    pub fn read_bool_strict(&mut self) -> Result<bool> {
        self.pad_to(4)?;
        let raw = self.endian.read_u32(self.advance(4)?);
        match raw {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidBoolean(other)),
        }
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.pad_to(2)?;
        Ok(self.endian.read_u16(self.advance(2)?) as i16)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.pad_to(2)?;
        Ok(self.endian.read_u16(self.advance(2)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.pad_to(4)?;
        Ok(self.endian.read_u32(self.advance(4)?) as i32)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.pad_to(4)?;
        Ok(self.endian.read_u32(self.advance(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.pad_to(8)?;
        Ok(self.endian.read_u64(self.advance(8)?) as i64)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.pad_to(8)?;
        Ok(self.endian.read_u64(self.advance(8)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.pad_to(8)?;
        Ok(f64::from_bits(self.endian.read_u64(self.advance(8)?)))
    }

    fn read_string_like(&mut self) -> Result<String> {
        self.pad_to(4)?;
        let len = self.endian.read_u32(self.advance(4)?) as usize;
        let bytes = self.advance(len)?.to_vec();
        let nul = self.advance(1)?[0];
        if nul != 0 {
            return Err(Error::MissingNul);
        }
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    fn read_signature_like(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.advance(len)?.to_vec();
        let nul = self.advance(1)?[0];
        if nul != 0 {
            return Err(Error::MissingNul);
        }
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    pub fn read_value(&mut self, ty: &Type) -> Result<Value<'static>> {
        Ok(match ty {
            Type::Byte => Value::U8(self.read_u8()?),
            Type::Bool => Value::Bool(self.read_bool()?),
            Type::I16 => Value::I16(self.read_i16()?),
            Type::U16 => Value::U16(self.read_u16()?),
            Type::I32 => Value::I32(self.read_i32()?),
            Type::U32 => Value::U32(self.read_u32()?),
            Type::I64 => Value::I64(self.read_i64()?),
            Type::U64 => Value::U64(self.read_u64()?),
            Type::F64 => Value::F64(self.read_f64()?),
            Type::Str => Value::Str(self.read_string_like()?),
            Type::ObjectPath => {
                let s = self.read_string_like()?;
                Value::ObjectPath(ObjectPath::new(s)?.into_owned())
            }
            Type::Signature => {
                let s = self.read_signature_like()?;
                Value::Signature(Signature::new(s)?.into_owned())
            }
            Type::UnixFd => Value::UnixFd(self.read_u32()?),
            Type::Array(elem) => Value::Array(self.read_array(elem)?),
            Type::Struct(fields) => Value::Structure(self.read_structure(fields)?),
            Type::DictEntry(k, v) => {
                self.pad_to(8)?;
                let key = self.read_value(k)?;
                let value = self.read_value(v)?;
                Value::DictEntry(Box::new(key), Box::new(value))
            }
            Type::Variant => self.read_variant()?,
        })
    }

    fn read_array(&mut self, elem: &Type) -> Result<Array<'static>> {
        self.pad_to(4)?;
        let body_len = self.endian.read_u32(self.advance(4)?) as usize;
        self.pad_to(elem.alignment())?;
        let body_end = self.pos + body_len;
        if body_end > self.buf.len() {
            return Err(Error::ReadBuffer {
                needed: body_end,
                available: self.buf.len(),
            });
        }
        let mut elements = Vec::new();
        while self.pos < body_end {
            elements.push(self.read_value(elem)?);
        }
        Ok(Array::from_values(elem.clone(), elements))
    }

    fn read_structure(&mut self, fields: &[Type]) -> Result<Structure<'static>> {
        self.pad_to(8)?;
        let mut values = Vec::with_capacity(fields.len());
        for f in fields {
            values.push(self.read_value(f)?);
        }
        Ok(Structure::new(values))
    }

    fn read_variant(&mut self) -> Result<Value<'static>> {
        let sig = self.read_signature_like()?;
        let types = crate::signature::parse_signature(&sig)?;
        let ty = match types.len() {
            1 => types.into_iter().next().unwrap(),
            _ => {
                return Err(Error::InvalidValue(
                    "variant signature must name exactly one type".into(),
                ))
            }
        };
        let mut inner = self.read_value(&ty)?;
        if self.options.narrow_53_bit {
            inner = narrow_variant_payload(inner);
        }
        Ok(Value::Variant(Box::new(inner)))
    }
}

/// Decode a top-level sequence of values per the given signature types, starting at
/// `base_offset` bytes into the overall message (for alignment purposes).
pub fn decode(
    endian: Endian,
    base_offset: usize,
    types: &[Type],
    buf: &[u8],
    options: DecodeOptions,
) -> Result<Vec<Value<'static>>> {
    let mut dec = Decoder::new(endian, base_offset, buf, options);
    let mut values = Vec::with_capacity(types.len());
    for ty in types {
        values.push(dec.read_value(ty)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::encode;

    fn round_trip(values: Vec<Value<'static>>) {
        let types: Vec<Type> = values.iter().map(Value::value_type).collect();
        for endian in [Endian::Little, Endian::Big] {
            let bytes = encode(endian, 0, &values).unwrap();
            let decoded = decode(endian, 0, &types, &bytes, DecodeOptions::default()).unwrap();
            assert_eq!(decoded, values);
        }
    }

    #[test]
    fn round_trips_scalars() {
        round_trip(vec![
            Value::U8(7),
            Value::Bool(true),
            Value::I16(-5),
            Value::U16(5),
            Value::I32(-100000),
            Value::U32(100000),
            Value::I64(-1 << 40),
            Value::U64(1 << 40),
            Value::F64(3.5),
            Value::Str("hello".into()),
        ]);
    }

    #[test]
    fn round_trips_array_and_struct() {
        let arr = Array::from_values(
            Type::I32,
            vec![Value::I32(1), Value::I32(2), Value::I32(3)],
        );
        let strct = Structure::new(vec![Value::U8(1), Value::Str("x".into())]);
        round_trip(vec![Value::Array(arr), Value::Structure(strct)]);
    }

    #[test]
    fn round_trips_variant() {
        round_trip(vec![Value::Variant(Box::new(Value::Structure(
            Structure::new(vec![Value::I32(1), Value::Str("a".into())]),
        )))]);
    }

    #[test]
    fn round_trips_empty_array() {
        round_trip(vec![Value::U8(1), Value::Array(Array::new(Type::I32))]);
    }

    #[test]
    fn bool_strict_rejects_other_wire_values() {
        let bytes = encode(Endian::Little, 0, &[Value::U32(5)]).unwrap();
        let mut dec = Decoder::new(Endian::Little, 0, &bytes, DecodeOptions::default());
        assert!(matches!(
            dec.read_bool_strict(),
            Err(Error::InvalidBoolean(5))
        ));
    }

    #[test]
    fn narrow_53_bit_shrinks_variant_payload_that_fits() {
        let values = vec![Value::Variant(Box::new(Value::I64(42)))];
        let types: Vec<Type> = values.iter().map(Value::value_type).collect();
        let bytes = encode(Endian::Little, 0, &values).unwrap();
        let options = DecodeOptions {
            narrow_53_bit: true,
        };
        let decoded = decode(Endian::Little, 0, &types, &bytes, options).unwrap();
        assert_eq!(decoded, vec![Value::Variant(Box::new(Value::I32(42)))]);
    }

    #[test]
    fn narrow_53_bit_leaves_wide_variant_payload_alone() {
        let values = vec![Value::Variant(Box::new(Value::I64(1 << 40)))];
        let types: Vec<Type> = values.iter().map(Value::value_type).collect();
        let bytes = encode(Endian::Little, 0, &values).unwrap();
        let options = DecodeOptions {
            narrow_53_bit: true,
        };
        let decoded = decode(Endian::Little, 0, &types, &bytes, options).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn truncated_buffer_errors() {
        let bytes = encode(Endian::Little, 0, &[Value::I64(1)]).unwrap();
        let short = &bytes[..bytes.len() - 1];
        let types = vec![Type::I64];
        assert!(decode(Endian::Little, 0, &types, short, DecodeOptions::default()).is_err());
    }
}
