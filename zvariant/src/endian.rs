/// Byte order used when encoding or decoding a value.
///
/// This mirrors the two orders the D-Bus wire format allows; the native-endianness choice used
/// when building a message lives in `zbus`, next to the `l`/`B` header signature byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// The byte order native to the host this code is compiled for.
    pub const fn native() -> Self {
        #[cfg(target_endian = "little")]
        {
            Endian::Little
        }
        #[cfg(target_endian = "big")]
        {
            Endian::Big
        }
    }

    pub(crate) fn write_u16(self, buf: &mut Vec<u8>, v: u16) {
        match self {
            Endian::Little => buf.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub(crate) fn write_u32(self, buf: &mut Vec<u8>, v: u32) {
        match self {
            Endian::Little => buf.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub(crate) fn write_u64(self, buf: &mut Vec<u8>, v: u64) {
        match self {
            Endian::Little => buf.extend_from_slice(&v.to_le_bytes()),
            Endian::Big => buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub(crate) fn read_u16(self, bytes: &[u8]) -> u16 {
        let arr: [u8; 2] = bytes.try_into().expect("caller checked length");
        match self {
            Endian::Little => u16::from_le_bytes(arr),
            Endian::Big => u16::from_be_bytes(arr),
        }
    }

    pub(crate) fn read_u32(self, bytes: &[u8]) -> u32 {
        let arr: [u8; 4] = bytes.try_into().expect("caller checked length");
        match self {
            Endian::Little => u32::from_le_bytes(arr),
            Endian::Big => u32::from_be_bytes(arr),
        }
    }

    pub(crate) fn read_u64(self, bytes: &[u8]) -> u64 {
        let arr: [u8; 8] = bytes.try_into().expect("caller checked length");
        match self {
            Endian::Little => u64::from_le_bytes(arr),
            Endian::Big => u64::from_be_bytes(arr),
        }
    }
}
