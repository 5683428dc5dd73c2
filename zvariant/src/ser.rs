//! The encoder: writes a signed [`Value`] tree into a growing, alignment-correct byte buffer.
//! See spec §4.3.

use crate::{
    signature::signature_string_for,
    value::{Array, Structure, Value},
    Endian, Error, Result,
};

/// A buffer tagged with a byte order, accumulating an encoded D-Bus payload.
///
/// `base_offset` lets callers encode a body that will later be spliced after a header of known
/// length, so that alignment padding inside the body is computed relative to the final position
/// on the wire rather than position zero within this buffer.
pub struct Encoder {
    endian: Endian,
    base_offset: usize,
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            base_offset: 0,
            buf: Vec::new(),
        }
    }

    pub fn with_base_offset(endian: Endian, base_offset: usize) -> Self {
        Self {
            endian,
            base_offset,
            buf: Vec::new(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn position(&self) -> usize {
        self.base_offset + self.buf.len()
    }

    fn pad_to(&mut self, alignment: usize) {
        let rem = self.position() % alignment;
        if rem != 0 {
            self.buf
                .extend(std::iter::repeat(0u8).take(alignment - rem));
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.pad_to(4);
        self.endian.write_u32(&mut self.buf, v as u32);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.pad_to(2);
        self.endian.write_u16(&mut self.buf, v as u16);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.pad_to(2);
        self.endian.write_u16(&mut self.buf, v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.pad_to(4);
        self.endian.write_u32(&mut self.buf, v as u32);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.pad_to(4);
        self.endian.write_u32(&mut self.buf, v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.pad_to(8);
        self.endian.write_u64(&mut self.buf, v as u64);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.pad_to(8);
        self.endian.write_u64(&mut self.buf, v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.pad_to(8);
        self.endian.write_u64(&mut self.buf, v.to_bits());
    }

    /// `s`/`o`: 4-byte length prefix, UTF-8 bytes, NUL terminator.
    pub fn write_string_like(&mut self, s: &str) {
        self.pad_to(4);
        self.endian.write_u32(&mut self.buf, s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// `g`: 1-byte length prefix, ASCII bytes, NUL terminator.
    pub fn write_signature_like(&mut self, s: &str) -> Result<()> {
        if s.len() > crate::signature::MAX_SIGNATURE_LEN {
            return Err(Error::SignatureTooLong(s.len()));
        }
        self.buf.push(s.len() as u8);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    pub fn write_value(&mut self, value: &Value<'_>) -> Result<()> {
        match value {
            Value::U8(v) => self.write_u8(*v),
            Value::Bool(v) => self.write_bool(*v),
            Value::I16(v) => self.write_i16(*v),
            Value::U16(v) => self.write_u16(*v),
            Value::I32(v) => self.write_i32(*v),
            Value::U32(v) => self.write_u32(*v),
            Value::I64(v) => self.write_i64(*v),
            Value::U64(v) => self.write_u64(*v),
            Value::F64(v) => self.write_f64(*v),
            Value::Str(v) => self.write_string_like(v),
            // Already validated at construction time; re-validating here would be redundant.
            Value::ObjectPath(v) => self.write_string_like(v.as_str()),
            Value::Signature(v) => self.write_signature_like(v.as_str())?,
            Value::UnixFd(v) => self.write_u32(*v),
            Value::Array(a) => self.write_array(a)?,
            Value::Structure(s) => self.write_structure(s)?,
            Value::DictEntry(k, v) => self.write_dict_entry(k, v)?,
            Value::Variant(inner) => self.write_variant(inner)?,
        }
        Ok(())
    }

    fn write_array(&mut self, array: &Array<'_>) -> Result<()> {
        self.pad_to(4);
        // Reserve space for the length, which we only know once elements are written.
        let len_pos = self.buf.len();
        self.endian.write_u32(&mut self.buf, 0);
        // The element alignment padding happens *before* measuring length (spec §4.3): an empty
        // array still advertises 0 bytes, but the next value after it lands at the correct
        // offset because this padding already occurred.
        self.pad_to(array.element_type().alignment());
        let body_start = self.buf.len();
        for element in array.elements() {
            self.write_value(element)?;
        }
        let body_len = (self.buf.len() - body_start) as u32;
        let len_bytes = match self.endian {
            Endian::Little => body_len.to_le_bytes(),
            Endian::Big => body_len.to_be_bytes(),
        };
        self.buf[len_pos..len_pos + 4].copy_from_slice(&len_bytes);
        Ok(())
    }

    fn write_structure(&mut self, s: &Structure<'_>) -> Result<()> {
        self.pad_to(8);
        for field in s.fields() {
            self.write_value(field)?;
        }
        Ok(())
    }

    fn write_dict_entry(&mut self, key: &Value<'_>, value: &Value<'_>) -> Result<()> {
        self.pad_to(8);
        self.write_value(key)?;
        self.write_value(value)?;
        Ok(())
    }

    fn write_variant(&mut self, inner: &Value<'_>) -> Result<()> {
        let sig = signature_string_for(&[inner.value_type()]);
        self.write_signature_like(&sig)?;
        self.write_value(inner)
    }
}

/// Encode a top-level sequence of independent argument values (e.g. a method call body) and
/// return the resulting bytes. `base_offset` should be the byte offset this body will occupy on
/// the wire, so array/struct padding lines up with the final message layout.
pub fn encode(endian: Endian, base_offset: usize, values: &[Value<'_>]) -> Result<Vec<u8>> {
    let mut enc = Encoder::with_base_offset(endian, base_offset);
    for v in values {
        enc.write_value(v)?;
    }
    Ok(enc.into_bytes())
}

/// The signature string that an ordered slice of values would be encoded under.
pub fn signature_of(values: &[Value<'_>]) -> String {
    signature_string_for(&values.iter().map(Value::value_type).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Type;

    #[test]
    fn scalar_alignment_matches_spec_table() {
        // "y x": byte then i64, second field at offset 8.
        let values = vec![Value::U8(1), Value::I64(2)];
        let bytes = encode(Endian::Little, 0, &values).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..16], &2i64.to_le_bytes());
    }

    #[test]
    fn string_alignment_is_four() {
        // "y s": byte then string, second field at offset 4.
        let values = vec![Value::U8(1), Value::Str("hi".into())];
        let bytes = encode(Endian::Little, 0, &values).unwrap();
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
    }

    #[test]
    fn empty_array_still_has_correct_alignment() {
        let array = Array::new(Type::I32);
        let values = vec![Value::U8(1), Value::Array(array)];
        let bytes = encode(Endian::Little, 0, &values).unwrap();
        // pad(4) then u32 length = 0, then pad(4) for i32 element alignment (already aligned).
        assert_eq!(&bytes[4..8], &0u32.to_le_bytes());
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn variant_alignment_is_one() {
        // "y v": byte then variant, variant starts immediately (alignment 1).
        let values = vec![Value::U8(1), Value::Variant(Box::new(Value::U8(9)))];
        let bytes = encode(Endian::Little, 0, &values).unwrap();
        assert_eq!(bytes[1], 1); // signature length
        assert_eq!(bytes[2], b'y');
        assert_eq!(bytes[3], 0); // NUL
        assert_eq!(bytes[4], 9); // the byte value itself
    }
}
