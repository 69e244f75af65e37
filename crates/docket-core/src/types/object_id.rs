use crate::types::{decode_hex_nibble, encode_hex};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

const OBJECT_ID_LEN: usize = 12;

///
/// ObjectIdError
///

#[derive(Debug, Eq, ThisError, PartialEq)]
pub enum ObjectIdError {
    #[error("object id must be {expected} hex characters, found {found}")]
    Length { expected: usize, found: usize },

    #[error("invalid hex character at position {position}")]
    InvalidHex { position: usize },
}

///
/// ObjectId
///
/// Opaque 12-byte store identifier. Its textual form is 24 lowercase hex
/// characters; ordering is bytewise.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    pub fn parse_hex(text: &str) -> Result<Self, ObjectIdError> {
        let bytes = text.as_bytes();
        if bytes.len() != OBJECT_ID_LEN * 2 {
            return Err(ObjectIdError::Length {
                expected: OBJECT_ID_LEN * 2,
                found: bytes.len(),
            });
        }

        let mut out = [0u8; OBJECT_ID_LEN];
        for (slot, idx) in out.iter_mut().zip((0..bytes.len()).step_by(2)) {
            let hi = decode_hex_nibble(bytes[idx])
                .ok_or(ObjectIdError::InvalidHex { position: idx + 1 })?;
            let lo = decode_hex_nibble(bytes[idx + 1])
                .ok_or(ObjectIdError::InvalidHex { position: idx + 2 })?;
            *slot = (hi << 4) | lo;
        }

        Ok(Self(out))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{ObjectId, ObjectIdError};

    #[test]
    fn hex_form_round_trips() {
        let id = ObjectId::from_bytes([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0xab, 0xff]);
        assert_eq!(id.to_hex(), "00010203040506070809abff");
        assert_eq!(ObjectId::parse_hex(&id.to_hex()), Ok(id));
    }

    #[test]
    fn parse_rejects_wrong_length_and_bad_digits() {
        assert_eq!(
            ObjectId::parse_hex("abc"),
            Err(ObjectIdError::Length {
                expected: 24,
                found: 3
            })
        );
        assert_eq!(
            ObjectId::parse_hex("zz0102030405060708090a0b"),
            Err(ObjectIdError::InvalidHex { position: 1 })
        );
    }
}
