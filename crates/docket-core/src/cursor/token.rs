///
/// Cursor token helpers.
///
/// This module owns the opaque wire-token format used for continuation
/// cursors: base-58 text over raw payload bytes. It contains no ordering
/// semantics.
///

// Decode bound for untrusted cursor token input.
pub(crate) const MAX_CURSOR_TOKEN_LEN: usize = 8 * 1024;

///
/// CursorDecodeError
///

#[derive(Clone, Debug, Eq, thiserror::Error, PartialEq)]
pub enum CursorDecodeError {
    #[error("cursor token is empty")]
    Empty,

    #[error("cursor token exceeds max length: {len} chars (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("cursor token is not valid base-58: {reason}")]
    InvalidBase58 { reason: String },
}

/// Encode raw cursor bytes as a base-58 token.
#[must_use]
pub fn encode_token(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode a base-58 cursor token into raw bytes.
///
/// The token may include surrounding whitespace, which is trimmed.
pub fn decode_token(token: &str) -> Result<Vec<u8>, CursorDecodeError> {
    let token = token.trim();

    if token.is_empty() {
        return Err(CursorDecodeError::Empty);
    }

    if token.len() > MAX_CURSOR_TOKEN_LEN {
        return Err(CursorDecodeError::TooLong {
            len: token.len(),
            max: MAX_CURSOR_TOKEN_LEN,
        });
    }

    bs58::decode(token)
        .into_vec()
        .map_err(|err| CursorDecodeError::InvalidBase58 {
            reason: err.to_string(),
        })
}

///
/// TESTS
///
