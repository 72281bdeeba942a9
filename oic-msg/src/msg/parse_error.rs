use super::opt::parse_error::OptParseError;
use crate::Code;

/// Errors encounterable while parsing a message from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum MessageParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Version was not 1
  InvalidVersion(u8),

  /// Token length was > 8
  InvalidTokenLength(u8),

  /// Error parsing option
  OptParseError(OptParseError),

  /// A payload marker (0xFF) was not followed by any bytes
  EmptyPayload,

  /// The message type is invalid (see [`crate::Type`] for information & valid values)
  InvalidType(u8),
}

impl MessageParseError {
  /// Shorthand for [`MessageParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }

  /// The response code a server should answer with
  /// when a request could not be parsed.
  ///
  /// Option errors map to 4.02 Bad Option,
  /// everything else to 4.00 Bad Request.
  ///
  /// ```
  /// use oic_msg::{Code, MessageParseError, OptNumber, OptParseError};
  ///
  /// assert_eq!(MessageParseError::InvalidTokenLength(9).code(),
  ///            Code::new(4, 0));
  /// let critical = OptParseError::UnknownCriticalOption(OptNumber(9));
  /// assert_eq!(MessageParseError::OptParseError(critical).code(),
  ///            Code::new(4, 2));
  /// ```
  pub fn code(&self) -> Code {
    match self {
      | Self::OptParseError(e) => e.code(),
      | _ => Code::new(4, 0),
    }
  }
}

impl core::fmt::Display for MessageParseError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::UnexpectedEndOfStream => write!(f, "unexpected end of stream"),
      | Self::InvalidVersion(v) => write!(f, "CoAP version must be 1, got {}", v),
      | Self::InvalidTokenLength(n) => write!(f, "Token Length must not be more than 8, got {}", n),
      | Self::OptParseError(e) => write!(f, "{}", e),
      | Self::EmptyPayload => write!(f, "payload marker without payload"),
      | Self::InvalidType(t) => write!(f, "invalid message type {}", t),
    }
  }
}
