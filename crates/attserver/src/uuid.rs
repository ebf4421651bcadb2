//! Attribute type UUIDs as they travel in ATT PDUs.
//!
//! On the wire an attribute type is either a 16-bit SIG alias or a full
//! 128-bit value. The width is part of the value: a single response may only
//! carry one width, so the width is kept rather than normalised away.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// The Bluetooth base UUID "00000000-0000-1000-8000-00805F9B34FB" in
/// little-endian byte order.
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16-bit alias is inserted.
const BASE_OFFSET: usize = 12;

/// Width of a UUID on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidFormat {
    /// 2-byte SIG alias
    Bits16,
    /// 16-byte full UUID
    Bits128,
}

impl UuidFormat {
    /// Encoded size in bytes.
    pub const fn size(self) -> usize {
        match self {
            UuidFormat::Bits16 => 2,
            UuidFormat::Bits128 => 16,
        }
    }

    /// Format byte used in the Find Information Response.
    pub const fn code(self) -> u8 {
        match self {
            UuidFormat::Bits16 => crate::att::constants::ATT_FIND_INFO_RSP_FORMAT_16BIT,
            UuidFormat::Bits128 => crate::att::constants::ATT_FIND_INFO_RSP_FORMAT_128BIT,
        }
    }

    /// Parse a Find Information Response format byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            crate::att::constants::ATT_FIND_INFO_RSP_FORMAT_16BIT => Some(UuidFormat::Bits16),
            crate::att::constants::ATT_FIND_INFO_RSP_FORMAT_128BIT => Some(UuidFormat::Bits128),
            _ => None,
        }
    }
}

/// Attribute type UUID
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uuid {
    /// 16-bit SIG-assigned alias
    Uuid16(u16),
    /// 128-bit UUID, little-endian
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Create a UUID from a 16-bit alias
    pub const fn from_u16(uuid: u16) -> Self {
        Uuid::Uuid16(uuid)
    }

    /// Create a UUID from a 128-bit value
    pub const fn from_u128(uuid: u128) -> Self {
        Uuid::Uuid128(uuid.to_le_bytes())
    }

    /// Convert little-endian wire bytes to a UUID.
    ///
    /// Only 2 and 16 byte slices are valid in ATT.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            2 => Some(Uuid::Uuid16(u16::from_le_bytes([bytes[0], bytes[1]]))),
            16 => {
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(bytes);
                Some(Uuid::Uuid128(uuid))
            }
            _ => None,
        }
    }

    /// Wire width of this UUID
    pub fn format(&self) -> UuidFormat {
        match self {
            Uuid::Uuid16(_) => UuidFormat::Bits16,
            Uuid::Uuid128(_) => UuidFormat::Bits128,
        }
    }

    /// Little-endian wire bytes
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.format().size());
        self.write_to(&mut out);
        out
    }

    /// Append the little-endian wire bytes to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Uuid::Uuid16(uuid) => out.extend_from_slice(&uuid.to_le_bytes()),
            Uuid::Uuid128(uuid) => out.extend_from_slice(uuid),
        }
    }

    /// The 16-bit alias, if this UUID has one.
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Uuid::Uuid16(uuid) => Some(*uuid),
            Uuid::Uuid128(bytes) => {
                let derived = bytes[..BASE_OFFSET] == BASE_UUID_BYTES[..BASE_OFFSET]
                    && bytes[BASE_OFFSET + 2] == 0
                    && bytes[BASE_OFFSET + 3] == 0;
                derived.then(|| u16::from_le_bytes([bytes[BASE_OFFSET], bytes[BASE_OFFSET + 1]]))
            }
        }
    }

    /// Full 128-bit form, expanding 16-bit aliases over the base UUID.
    pub fn to_u128_bytes(&self) -> [u8; 16] {
        match self {
            Uuid::Uuid16(uuid) => {
                let mut bytes = BASE_UUID_BYTES;
                bytes[BASE_OFFSET..BASE_OFFSET + 2].copy_from_slice(&uuid.to_le_bytes());
                bytes
            }
            Uuid::Uuid128(bytes) => *bytes,
        }
    }

    /// Collapse a base-derived 128-bit UUID to its 16-bit alias.
    ///
    /// Returns `None` for 128-bit UUIDs outside the Bluetooth base range.
    pub fn shorten(&self) -> Option<Self> {
        self.as_u16().map(Uuid::Uuid16)
    }

    /// Compare two UUIDs regardless of their wire width.
    pub fn matches(&self, other: &Uuid) -> bool {
        self.to_u128_bytes() == other.to_u128_bytes()
    }
}

impl From<u16> for Uuid {
    fn from(uuid: u16) -> Self {
        Uuid::Uuid16(uuid)
    }
}

impl From<[u8; 16]> for Uuid {
    /// Assumes bytes are in little-endian order.
    fn from(bytes: [u8; 16]) -> Self {
        Uuid::Uuid128(bytes)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(uuid) => write!(f, "{:04x}", uuid),
            Uuid::Uuid128(bytes) => {
                let mut b = *bytes;
                b.reverse();
                let s = hex::encode(b);
                write!(f, "{}-{}-{}-{}-{}", &s[0..8], &s[8..12], &s[12..16], &s[16..20], &s[20..32])
            }
        }
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(uuid) => write!(f, "Uuid(0x{:04X})", uuid),
            Uuid::Uuid128(_) => write!(f, "Uuid({})", self),
        }
    }
}

#[derive(Debug)]
pub enum UuidParseError {
    InvalidLength,
    InvalidFormat,
    HexError(hex::FromHexError),
}

impl From<hex::FromHexError> for UuidParseError {
    fn from(err: hex::FromHexError) -> Self {
        UuidParseError::HexError(err)
    }
}

impl From<ParseIntError> for UuidParseError {
    fn from(_: ParseIntError) -> Self {
        UuidParseError::InvalidFormat
    }
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Accepts "2800", "0x2800" or the hyphenated 128-bit form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_start_matches("0x");
        let cleaned: String = trimmed.chars().filter(|c| *c != '-').collect();
        if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(UuidParseError::InvalidFormat);
        }

        match cleaned.len() {
            4 => Ok(Uuid::Uuid16(u16::from_str_radix(&cleaned, 16)?)),
            32 => {
                let mut bytes = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes)?;
                bytes.reverse();
                Ok(Uuid::Uuid128(bytes))
            }
            _ => Err(UuidParseError::InvalidLength),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_derived_uuid_shortens() {
        let long = Uuid::Uuid128(Uuid::from_u16(0x2800).to_u128_bytes());
        assert_eq!(long.shorten(), Some(Uuid::Uuid16(0x2800)));
        assert!(long.matches(&Uuid::from_u16(0x2800)));
        assert_ne!(long, Uuid::from_u16(0x2800));
    }

    #[test]
    fn vendor_uuid_does_not_shorten() {
        let vendor: Uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e".parse().unwrap();
        assert_eq!(vendor.format(), UuidFormat::Bits128);
        assert_eq!(vendor.shorten(), None);
        assert_eq!(vendor.to_string(), "6e400001-b5a3-f393-e0a9-e50e24dcca9e");
    }

    #[test]
    fn parse_short_forms() {
        assert_eq!("2A00".parse::<Uuid>().unwrap(), Uuid::from_u16(0x2A00));
        assert_eq!("0x180f".parse::<Uuid>().unwrap(), Uuid::from_u16(0x180F));
        assert!("18".parse::<Uuid>().is_err());
        assert!("zz00".parse::<Uuid>().is_err());
    }

    #[test]
    fn from_bytes_rejects_32_bit() {
        assert!(Uuid::from_bytes(&[1, 2, 3, 4]).is_none());
        assert_eq!(Uuid::from_bytes(&[0x00, 0x28]), Some(Uuid::from_u16(0x2800)));
    }
}
