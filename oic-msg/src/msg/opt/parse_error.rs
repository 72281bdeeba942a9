use super::OptNumber;
use crate::Code;

/// Errors encounterable while parsing an option from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum OptParseError {
  /// Reached end of stream before parsing was finished
  UnexpectedEndOfStream,

  /// Option value was longer than the option allows
  /// (e.g. a 5-byte integer)
  #[allow(missing_docs)]
  OptionValueTooLong { capacity: usize, actual: usize },

  /// Option Delta was set to 15, which is invalid.
  OptionDeltaReservedValue(u8),

  /// Value Length was set to 15, which is invalid.
  ValueLengthReservedValue(u8),

  /// A string option (Uri-Path, Uri-Query) was not valid UTF-8
  InvalidUtf8(OptNumber),

  /// Encountered a critical (odd-numbered) option that we
  /// do not understand.
  UnknownCriticalOption(OptNumber),
}

impl OptParseError {
  /// Shorthand for [`OptParseError::UnexpectedEndOfStream`]
  pub fn eof() -> Self {
    Self::UnexpectedEndOfStream
  }

  /// The response code a server should answer with when this error
  /// occurs parsing a request
  pub fn code(&self) -> Code {
    match self {
      | Self::UnexpectedEndOfStream => Code::new(4, 0),
      | _ => Code::new(4, 2),
    }
  }
}

impl core::fmt::Display for OptParseError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::UnexpectedEndOfStream => write!(f, "unexpected end of stream in options"),
      | Self::OptionValueTooLong { capacity, actual } => {
        write!(f, "option value of {} bytes exceeds {}", actual, capacity)
      },
      | Self::OptionDeltaReservedValue(n) => write!(f, "option delta nibble {} is reserved", n),
      | Self::ValueLengthReservedValue(n) => write!(f, "option length nibble {} is reserved", n),
      | Self::InvalidUtf8(n) => write!(f, "option {} is not utf8", n.0),
      | Self::UnknownCriticalOption(n) => write!(f, "Unsupported critical option {}", n.0),
    }
  }
}
