//! The 16-byte primary header plus the variable field array that follows it (spec §3/§4.5).

use bitflags::bitflags;
use static_assertions::assert_impl_all;

use crate::{message::Fields, Error, Result};

pub const PRIMARY_HEADER_SIZE: usize = 12;
pub(crate) const MIN_MESSAGE_SIZE: usize = PRIMARY_HEADER_SIZE + 4;
pub(crate) const MAX_MESSAGE_SIZE: usize = 128 * 1024 * 1024;

/// D-Bus code for endianness: `l` (little) or `B` (big).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndianSig {
    Little,
    Big,
}

impl EndianSig {
    pub fn to_zvariant(self) -> zvariant::Endian {
        match self {
            EndianSig::Little => zvariant::Endian::Little,
            EndianSig::Big => zvariant::Endian::Big,
        }
    }

    pub fn from_zvariant(e: zvariant::Endian) -> Self {
        match e {
            zvariant::Endian::Little => EndianSig::Little,
            zvariant::Endian::Big => EndianSig::Big,
        }
    }

    pub const fn native() -> Self {
        Self::from_zvariant_const(zvariant::Endian::native())
    }

    const fn from_zvariant_const(e: zvariant::Endian) -> Self {
        match e {
            zvariant::Endian::Little => EndianSig::Little,
            zvariant::Endian::Big => EndianSig::Big,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            EndianSig::Little => b'l',
            EndianSig::Big => b'B',
        }
    }
}

impl TryFrom<u8> for EndianSig {
    type Error = Error;

    fn try_from(val: u8) -> Result<EndianSig> {
        match val {
            b'l' => Ok(EndianSig::Little),
            b'B' => Ok(EndianSig::Big),
            other => Err(Error::Variant(zvariant::Error::InvalidValue(format!(
                "unknown endianness byte {other:#x}"
            )))),
        }
    }
}

/// The D-Bus message type (spec §3, §6).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Type {
    MethodCall = 1,
    MethodReturn = 2,
    Error = 3,
    Signal = 4,
}

impl TryFrom<u8> for Type {
    type Error = Error;

    fn try_from(val: u8) -> Result<Type> {
        match val {
            1 => Ok(Type::MethodCall),
            2 => Ok(Type::MethodReturn),
            3 => Ok(Type::Error),
            4 => Ok(Type::Signal),
            other => Err(Error::Variant(zvariant::Error::InvalidValue(format!(
                "unknown message type {other}"
            )))),
        }
    }
}

bitflags! {
    /// Flags carried in the primary header (spec §6).
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Flags: u8 {
        const NO_REPLY_EXPECTED = 0x1;
        const NO_AUTO_START = 0x2;
        const ALLOW_INTERACTIVE_AUTHORIZATION = 0x4;
    }
}

assert_impl_all!(Flags: Send, Sync, Unpin);

/// The fixed-shape part of every D-Bus message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryHeader {
    endian: EndianSig,
    msg_type: Type,
    flags: Flags,
    protocol_version: u8,
    body_len: u32,
    serial: u32,
}

assert_impl_all!(PrimaryHeader: Send, Sync, Unpin);

impl PrimaryHeader {
    pub fn new(msg_type: Type, flags: Flags, body_len: u32, serial: u32) -> Self {
        Self {
            endian: EndianSig::native(),
            msg_type,
            flags,
            protocol_version: 1,
            body_len,
            serial,
        }
    }

    pub fn endian(&self) -> EndianSig {
        self.endian
    }

    pub fn msg_type(&self) -> Type {
        self.msg_type
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn body_len(&self) -> u32 {
        self.body_len
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Parse the fixed 12-byte prefix plus the 4-byte fields-length that follows it, returning
    /// the primary header and the fields length (spec §4.8 state 1).
    pub fn read(buf: &[u8; PRIMARY_HEADER_SIZE + 4]) -> Result<(Self, u32)> {
        let endian = EndianSig::try_from(buf[0])?;
        let e = endian.to_zvariant();
        let msg_type = Type::try_from(buf[1])?;
        let flags = Flags::from_bits_truncate(buf[2]);
        let protocol_version = buf[3];
        let read_u32 = |bytes: &[u8]| -> u32 {
            let arr: [u8; 4] = bytes.try_into().expect("checked length");
            match e {
                zvariant::Endian::Little => u32::from_le_bytes(arr),
                zvariant::Endian::Big => u32::from_be_bytes(arr),
            }
        };
        let body_len = read_u32(&buf[4..8]);
        let serial = read_u32(&buf[8..12]);
        let fields_len = read_u32(&buf[12..16]);
        Ok((
            Self {
                endian,
                msg_type,
                flags,
                protocol_version,
                body_len,
                serial,
            },
            fields_len,
        ))
    }
}

/// The primary header plus the decoded variable field array.
#[derive(Debug, Clone, PartialEq)]
pub struct Header<'m> {
    primary: PrimaryHeader,
    fields: Fields<'m>,
}

assert_impl_all!(Header<'_>: Send, Sync, Unpin);

impl<'m> Header<'m> {
    pub fn new(primary: PrimaryHeader, fields: Fields<'m>) -> Self {
        Self { primary, fields }
    }

    pub fn primary(&self) -> &PrimaryHeader {
        &self.primary
    }

    pub fn fields(&self) -> &Fields<'m> {
        &self.fields
    }

    pub fn into_fields(self) -> Fields<'m> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endian_sig_round_trips() {
        assert_eq!(EndianSig::try_from(b'l').unwrap(), EndianSig::Little);
        assert_eq!(EndianSig::try_from(b'B').unwrap(), EndianSig::Big);
        assert!(EndianSig::try_from(b'x').is_err());
    }

    #[test]
    fn flags_round_trip_bits() {
        let f = Flags::NO_REPLY_EXPECTED | Flags::ALLOW_INTERACTIVE_AUTHORIZATION;
        assert_eq!(Flags::from_bits_truncate(f.bits()), f);
    }
}
