//! Message framing: header, header fields, and the body codec that sits on top of
//! [`zvariant`]'s encoder/decoder (spec §3, §4.5).

mod fields;
mod header;

pub use fields::{Field, FieldCode, Fields};
pub use header::{EndianSig, Flags, Header, PrimaryHeader, Type, PRIMARY_HEADER_SIZE};
pub(crate) use header::{MAX_MESSAGE_SIZE, MIN_MESSAGE_SIZE};

use static_assertions::assert_impl_all;
use zbus_names::{BusName, ErrorName, InterfaceName, MemberName, UniqueName};
use zvariant::{Endian, ObjectPath, Signature, Value};

use crate::{Error, Result};

fn round_up_to_8(n: usize) -> usize {
    (n + 7) / 8 * 8
}

/// A fully decoded D-Bus message: header plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    header: Header<'static>,
    body: Vec<Value<'static>>,
}

assert_impl_all!(Message: Send, Sync, Unpin);

impl Message {
    pub fn header(&self) -> &Header<'static> {
        &self.header
    }

    pub fn body(&self) -> &[Value<'static>] {
        &self.body
    }

    pub fn into_body(self) -> Vec<Value<'static>> {
        self.body
    }

    pub fn message_type(&self) -> Type {
        self.header.primary().msg_type()
    }

    pub fn serial(&self) -> u32 {
        self.header.primary().serial()
    }

    pub fn reply_serial(&self) -> Option<u32> {
        self.header.fields().get_reply_serial()
    }

    pub fn path(&self) -> Option<&ObjectPath<'static>> {
        self.header.fields().get_path()
    }

    pub fn interface(&self) -> Option<&InterfaceName<'static>> {
        self.header.fields().get_interface()
    }

    pub fn member(&self) -> Option<&MemberName<'static>> {
        self.header.fields().get_member()
    }

    pub fn error_name(&self) -> Option<&ErrorName<'static>> {
        self.header.fields().get_error_name()
    }

    pub fn destination(&self) -> Option<&BusName<'static>> {
        self.header.fields().get_destination()
    }

    pub fn sender(&self) -> Option<&UniqueName<'static>> {
        self.header.fields().get_sender()
    }

    pub fn signature(&self) -> Option<&Signature<'static>> {
        self.header.fields().get_signature()
    }

    /// Encode this message to its wire representation.
    pub fn to_bytes(&self, endian: Endian) -> Result<Vec<u8>> {
        let body_bytes = zvariant::encode(endian, 0, &self.body)?;

        let fields_value = self.header.fields().to_value();
        let fields_bytes = zvariant::encode(
            endian,
            PRIMARY_HEADER_SIZE,
            std::slice::from_ref(&fields_value),
        )?;

        let mut out = Vec::with_capacity(PRIMARY_HEADER_SIZE + fields_bytes.len() + body_bytes.len() + 8);
        let primary = self.header.primary();
        out.push(EndianSig::from_zvariant(endian).as_byte());
        out.push(primary.msg_type() as u8);
        out.push(primary.flags().bits());
        out.push(primary.protocol_version());
        write_u32(&mut out, endian, body_bytes.len() as u32);
        write_u32(&mut out, endian, primary.serial());
        // `fields_bytes` already begins with the array's own 4-byte length prefix, which is
        // exactly what bytes 12..16 of the primary header are.
        out.extend_from_slice(&fields_bytes);

        let pad = round_up_to_8(out.len()) - out.len();
        out.extend(std::iter::repeat(0u8).take(pad));
        out.extend_from_slice(&body_bytes);
        Ok(out)
    }

    /// Decode a complete message given its already-separated 16-byte prefix and the
    /// `fields-length-padded + body-length` trailing bytes (spec §4.8 state 2).
    pub fn from_parts(primary: PrimaryHeader, fields_len: u32, rest: &[u8]) -> Result<Self> {
        let endian = primary.endian().to_zvariant();
        let fields_len = fields_len as usize;
        let fields_len_padded = round_up_to_8(fields_len);
        if rest.len() < fields_len_padded + primary.body_len() as usize {
            return Err(Error::Variant(zvariant::Error::ReadBuffer {
                needed: fields_len_padded + primary.body_len() as usize,
                available: rest.len(),
            }));
        }

        let fields_value = decode_fields_array(endian, &rest[..fields_len_padded], fields_len)?;
        let fields = Fields::from_value(&fields_value)?;

        let body_bytes = &rest[fields_len_padded..fields_len_padded + primary.body_len() as usize];
        let body = match fields.get_signature() {
            Some(sig) => {
                let types = sig.types()?;
                zvariant::decode(endian, 0, &types, body_bytes, Default::default())?
            }
            None => Vec::new(),
        };

        Ok(Self {
            header: Header::new(primary, fields),
            body,
        })
    }
}

fn write_u32(out: &mut Vec<u8>, endian: Endian, v: u32) {
    match endian {
        Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
    }
}

fn decode_fields_array(endian: Endian, buf: &[u8], fields_len: usize) -> Result<Value<'static>> {
    let struct_ty = zvariant::Type::Struct(vec![zvariant::Type::Byte, zvariant::Type::Variant]);
    let mut dec = zvariant::Decoder::new(endian, 0, buf, Default::default());
    dec.align(8)?;
    let body_end = dec.position() + fields_len;
    let mut elements = Vec::new();
    while dec.position() < body_end {
        elements.push(dec.read_value(&struct_ty)?);
    }
    Ok(Value::Array(zvariant::Array::from_values(
        struct_ty, elements,
    )))
}

/// A builder for constructing outbound messages (spec §4.5 "Encode").
pub struct MessageBuilder {
    msg_type: Type,
    flags: Flags,
    path: Option<ObjectPath<'static>>,
    interface: Option<InterfaceName<'static>>,
    member: Option<MemberName<'static>>,
    error_name: Option<ErrorName<'static>>,
    reply_serial: Option<u32>,
    destination: Option<BusName<'static>>,
    sender: Option<UniqueName<'static>>,
    body: Vec<Value<'static>>,
}

impl MessageBuilder {
    fn new(msg_type: Type) -> Self {
        Self {
            msg_type,
            flags: Flags::empty(),
            path: None,
            interface: None,
            member: None,
            error_name: None,
            reply_serial: None,
            destination: None,
            sender: None,
            body: Vec::new(),
        }
    }

    pub fn method_call(path: ObjectPath<'static>, member: MemberName<'static>) -> Self {
        let mut b = Self::new(Type::MethodCall);
        b.path = Some(path);
        b.member = Some(member);
        b
    }

    pub fn signal(path: ObjectPath<'static>, interface: InterfaceName<'static>, member: MemberName<'static>) -> Self {
        let mut b = Self::new(Type::Signal);
        b.path = Some(path);
        b.interface = Some(interface);
        b.member = Some(member);
        b.flags = Flags::NO_REPLY_EXPECTED;
        b
    }

    pub fn method_return(reply_serial: u32) -> Self {
        let mut b = Self::new(Type::MethodReturn);
        b.reply_serial = Some(reply_serial);
        b.flags = Flags::NO_REPLY_EXPECTED;
        b
    }

    pub fn error(reply_serial: u32, error_name: ErrorName<'static>) -> Self {
        let mut b = Self::new(Type::Error);
        b.reply_serial = Some(reply_serial);
        b.error_name = Some(error_name);
        b.flags = Flags::NO_REPLY_EXPECTED;
        b
    }

    pub fn interface(mut self, interface: InterfaceName<'static>) -> Self {
        self.interface = Some(interface);
        self
    }

    pub fn destination(mut self, destination: BusName<'static>) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn sender(mut self, sender: UniqueName<'static>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn no_reply_expected(mut self, value: bool) -> Self {
        self.flags.set(Flags::NO_REPLY_EXPECTED, value);
        self
    }

    pub fn body(mut self, body: Vec<Value<'static>>) -> Self {
        self.body = body;
        self
    }

    /// Finalize the message with an explicit serial (allocated by the connection, spec §4.9).
    pub fn build(self, serial: u32) -> Result<Message> {
        if self.msg_type == Type::MethodCall && (self.path.is_none() || self.member.is_none()) {
            return Err(Error::InvalidArgs);
        }
        if matches!(self.msg_type, Type::MethodReturn | Type::Error) && self.reply_serial.is_none()
        {
            return Err(Error::MissingSerial);
        }
        if self.msg_type == Type::Signal
            && (self.path.is_none() || self.interface.is_none() || self.member.is_none())
        {
            return Err(Error::InvalidArgs);
        }

        let signature = crate::message::body_signature(&self.body);
        let mut fields = Fields::new();
        if let Some(p) = self.path {
            fields.add(Field::Path(p));
        }
        if let Some(i) = self.interface {
            fields.add(Field::Interface(i));
        }
        if let Some(m) = self.member {
            fields.add(Field::Member(m));
        }
        if let Some(e) = self.error_name {
            fields.add(Field::ErrorName(e));
        }
        if let Some(r) = self.reply_serial {
            fields.add(Field::ReplySerial(r));
        }
        if let Some(d) = self.destination {
            fields.add(Field::Destination(d));
        }
        if let Some(s) = self.sender {
            fields.add(Field::Sender(s));
        }
        if let Some(sig) = signature {
            fields.add(Field::Signature(sig));
        }

        let primary = PrimaryHeader::new(self.msg_type, self.flags, 0, serial);
        Ok(Message {
            header: Header::new(primary, fields),
            body: self.body,
        })
    }
}

fn body_signature(body: &[Value<'static>]) -> Option<Signature<'static>> {
    if body.is_empty() {
        return None;
    }
    let sig = zvariant::ser::signature_of(body);
    Signature::new(sig).ok().map(Signature::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ObjectPath<'static> {
        ObjectPath::new(s.to_owned()).unwrap()
    }

    fn member(s: &str) -> MemberName<'static> {
        MemberName::new(s.to_owned()).unwrap()
    }

    fn iface(s: &str) -> InterfaceName<'static> {
        InterfaceName::new(s.to_owned()).unwrap()
    }

    #[test]
    fn round_trips_method_call_without_body() {
        let msg = MessageBuilder::method_call(path("/org/freedesktop/DBus"), member("Hello"))
            .interface(iface("org.freedesktop.DBus"))
            .destination(BusName::new("org.freedesktop.DBus".to_owned()).unwrap())
            .build(1)
            .unwrap();
        let bytes = msg.to_bytes(Endian::Little).unwrap();

        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(&bytes[..16]);
        let (primary, fields_len) = PrimaryHeader::read(&prefix).unwrap();
        let decoded = Message::from_parts(primary, fields_len, &bytes[16..]).unwrap();

        assert_eq!(decoded.message_type(), Type::MethodCall);
        assert_eq!(decoded.member().unwrap(), &member("Hello"));
        assert_eq!(decoded.path().unwrap(), &path("/org/freedesktop/DBus"));
        assert!(decoded.body().is_empty());
    }

    #[test]
    fn round_trips_method_return_with_body() {
        let msg = MessageBuilder::method_return(7)
            .body(vec![Value::Str(":1.42".into())])
            .build(2)
            .unwrap();
        let bytes = msg.to_bytes(Endian::Big).unwrap();

        let mut prefix = [0u8; 16];
        prefix.copy_from_slice(&bytes[..16]);
        let (primary, fields_len) = PrimaryHeader::read(&prefix).unwrap();
        let decoded = Message::from_parts(primary, fields_len, &bytes[16..]).unwrap();

        assert_eq!(decoded.reply_serial(), Some(7));
        assert_eq!(decoded.body(), &[Value::Str(":1.42".into())]);
    }

    #[test]
    fn method_call_requires_path_and_member() {
        let mut builder = MessageBuilder::new(Type::MethodCall);
        builder.member = Some(member("Foo"));
        assert!(matches!(builder.build(1), Err(Error::InvalidArgs)));
    }
}
