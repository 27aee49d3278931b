//! objectGUID codec.
//!
//! Active Directory stores objectGUID as a 16-byte value with mixed
//! endianness: the first three fields are little-endian, the last two are
//! big-endian. [`Guid`] keeps the raw directory byte order and converts to
//! canonical UUID text for display and comparison, and to the `\XX`-escaped
//! literal form required in LDAP search filters.

use std::fmt;

use uuid::Uuid;

use crate::errors::LookupError;

/// A directory objectGUID, held in raw Active Directory byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    raw: [u8; 16],
}

impl Guid {
    /// Build a `Guid` from the raw objectGUID attribute bytes.
    pub fn new(raw: &[u8]) -> Result<Self, LookupError> {
        let raw: [u8; 16] = raw
            .try_into()
            .map_err(|_| LookupError::InvalidGuid(format!("expected 16 bytes, got {}", raw.len())))?;
        Ok(Self { raw })
    }

    /// Parse canonical UUID text back into raw directory byte order.
    pub fn parse(text: &str) -> Result<Self, LookupError> {
        let uuid = Uuid::parse_str(text)
            .map_err(|e| LookupError::InvalidGuid(format!("'{text}': {e}")))?;
        Ok(Self {
            raw: uuid.to_bytes_le(),
        })
    }

    /// The canonical UUID view (first three fields byte-swapped).
    pub fn uuid(&self) -> Uuid {
        Uuid::from_bytes_le(self.raw)
    }

    /// Escape the raw bytes into an LDAP filter-safe literal, each byte
    /// rendered as `\XX`.
    pub fn escape(&self) -> String {
        let mut out = String::with_capacity(3 * 16);
        for b in self.raw {
            out.push_str(&format!("\\{b:02x}"));
        }
        out
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: [u8; 16] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
        0x10,
    ];

    #[test]
    fn test_mixed_endian_text_form() {
        let guid = Guid::new(&RAW).unwrap();
        // First three fields little-endian, last two big-endian.
        assert_eq!(guid.to_string(), "04030201-0605-0807-090a-0b0c0d0e0f10");
    }

    #[test]
    fn test_parse_round_trip() {
        let guid = Guid::new(&RAW).unwrap();
        let reparsed = Guid::parse(&guid.to_string()).unwrap();
        assert_eq!(guid, reparsed);
        assert_eq!(reparsed.escape(), guid.escape());
    }

    #[test]
    fn test_escape_uses_raw_byte_order() {
        let guid = Guid::new(&RAW).unwrap();
        assert_eq!(
            guid.escape(),
            "\\01\\02\\03\\04\\05\\06\\07\\08\\09\\0a\\0b\\0c\\0d\\0e\\0f\\10"
        );
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(Guid::new(&[0u8; 15]).is_err());
        assert!(Guid::new(&[0u8; 17]).is_err());
    }

    #[test]
    fn test_malformed_text_rejected() {
        assert!(Guid::parse("not-a-uuid").is_err());
    }
}
