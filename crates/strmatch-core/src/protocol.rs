//! Wire protocol shared by the server and the client.
//!
//! One query per connection: the client writes a UTF-8 string, the server
//! answers with a single ASCII line (no trailing newline) and closes.

use std::fmt;

/// Default upper bound on a single query read, in bytes.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024;

/// Response sent when the query matches a full line of the data file.
pub const STRING_EXISTS: &str = "STRING EXISTS";
/// Response sent when the query matches no line.
pub const STRING_NOT_EXIST: &str = "STRING NOT EXIST";
/// Response sent when the server fails while answering.
pub const SERVER_ERROR: &str = "SERVER ERROR";
/// Prefix of payload rejection responses.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Reasons a received payload is rejected before searching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Empty payload received")]
    Empty,

    #[error("Invalid payload")]
    InvalidEncoding,
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Exists,
    NotExist,
    /// The payload was rejected; carries the reason.
    Rejected(String),
    ServerError,
}

impl Response {
    pub const fn from_found(found: bool) -> Self {
        if found { Self::Exists } else { Self::NotExist }
    }

    /// Parse a response received by a client.
    ///
    /// Returns `None` for anything the server would never send.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_end();
        match raw {
            STRING_EXISTS => Some(Self::Exists),
            STRING_NOT_EXIST => Some(Self::NotExist),
            SERVER_ERROR => Some(Self::ServerError),
            other => other
                .strip_prefix(ERROR_PREFIX)
                .map(|reason| Self::Rejected(reason.to_string())),
        }
    }

    /// Short status tag used in request logs.
    pub const fn status_tag(&self) -> &'static str {
        match self {
            Self::Exists => "200:OK",
            Self::NotExist => "404:NOT FOUND",
            Self::Rejected(_) => "400:BAD REQUEST",
            Self::ServerError => "500:SERVER ERROR",
        }
    }
}

impl From<PayloadError> for Response {
    fn from(e: PayloadError) -> Self {
        Self::Rejected(e.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => f.write_str(STRING_EXISTS),
            Self::NotExist => f.write_str(STRING_NOT_EXIST),
            Self::Rejected(reason) => write!(f, "{ERROR_PREFIX}{reason}"),
            Self::ServerError => f.write_str(SERVER_ERROR),
        }
    }
}

/// Decode a raw payload into a query string.
///
/// Surrounding whitespace and NUL padding are stripped.
pub fn decode_query(payload: &[u8]) -> Result<&str, PayloadError> {
    let text = std::str::from_utf8(payload).map_err(|_| PayloadError::InvalidEncoding)?;
    let query = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if query.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_newline_and_padding() {
        assert_eq!(decode_query(b"7;0;6;28;0;23;5;0;\n"), Ok("7;0;6;28;0;23;5;0;"));
        assert_eq!(decode_query(b"abc\0\0\0"), Ok("abc"));
        assert_eq!(decode_query(b"  abc \r\n"), Ok("abc"));
    }

    #[test]
    fn decode_keeps_inner_whitespace() {
        assert_eq!(decode_query(b"a b"), Ok("a b"));
    }

    #[test]
    fn decode_rejects_empty() {
        assert_eq!(decode_query(b""), Err(PayloadError::Empty));
        assert_eq!(decode_query(b" \n\0"), Err(PayloadError::Empty));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert_eq!(
            decode_query(b"\x80\x81\x82"),
            Err(PayloadError::InvalidEncoding)
        );
    }

    #[test]
    fn rejection_wire_format() {
        assert_eq!(
            Response::from(PayloadError::Empty).to_string(),
            "ERROR: Empty payload received"
        );
        assert_eq!(
            Response::from(PayloadError::InvalidEncoding).to_string(),
            "ERROR: Invalid payload"
        );
    }

    #[test]
    fn parse_known_responses() {
        assert_eq!(Response::parse("STRING EXISTS"), Some(Response::Exists));
        assert_eq!(Response::parse("STRING NOT EXIST"), Some(Response::NotExist));
        assert_eq!(Response::parse("SERVER ERROR"), Some(Response::ServerError));
        assert_eq!(
            Response::parse("ERROR: Invalid payload"),
            Some(Response::Rejected("Invalid payload".into()))
        );
        assert_eq!(Response::parse("HELLO"), None);
    }

    #[test]
    fn from_found_maps_to_wire_strings() {
        assert_eq!(Response::from_found(true).to_string(), STRING_EXISTS);
        assert_eq!(Response::from_found(false).to_string(), STRING_NOT_EXIST);
    }
}
