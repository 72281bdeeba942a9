use tinyvec::ArrayVec;
use toad_cursor::Cursor;

/// Option parsing errors
pub mod parse_error;
pub use parse_error::*;

/// Options known to this crate, and their values
pub mod known;

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u32, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok((n as u32) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(u16::from_be_bytes([a, b]) as u32 + 269),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(head as u32),
  }
}

/// Split a delta or length into its 4-bit header nibble
/// and the extended bytes that follow the header byte.
pub(crate) fn opt_len_or_delta(val: u32) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend(((n - 269) as u16).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n as u8) - 13);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}

/// Largest delta or value length expressible by the option header
pub(crate) const MAX_OPT_LEN_OR_DELTA: u32 = 269 + u16::MAX as u32;

/// Write a single option (header, extended delta / length, and value)
pub(crate) fn extend_opt_bytes(delta: u32, value: &[u8], bytes: &mut impl Extend<u8>) {
  let (del, del_bytes) = opt_len_or_delta(delta);
  let (len, len_bytes) = opt_len_or_delta(value.len() as u32);
  let del = del << 4;

  let header = del | len;

  bytes.extend(Some(header));

  if let Some(bs) = del_bytes {
    bytes.extend(bs);
  }

  if let Some(bs) = len_bytes {
    bytes.extend(bs);
  }

  bytes.extend(value.iter().copied());
}

/// Encode an integer option value using the fewest big-endian bytes.
///
/// Zero is encoded as an empty value.
///
/// ```
/// use oic_msg::opt::encode_uint;
///
/// assert_eq!(encode_uint(0).as_slice(), &[] as &[u8]);
/// assert_eq!(encode_uint(60).as_slice(), &[60]);
/// assert_eq!(encode_uint(0x1_00_00).as_slice(), &[1, 0, 0]);
/// ```
pub fn encode_uint(n: u32) -> ArrayVec<[u8; 4]> {
  let skip = (n.leading_zeros() / 8) as usize;
  let mut out = ArrayVec::new();
  out.extend(n.to_be_bytes().into_iter().skip(skip));
  out
}

/// Decode an integer option value (0 to 4 big-endian bytes)
///
/// ```
/// use oic_msg::opt::decode_uint;
///
/// assert_eq!(decode_uint(&[]), Ok(0));
/// assert_eq!(decode_uint(&[1, 0]), Ok(256));
/// assert!(decode_uint(&[1, 2, 3, 4, 5]).is_err());
/// ```
pub fn decode_uint(bytes: &[u8]) -> Result<u32, OptParseError> {
  if bytes.len() > 4 {
    return Err(OptParseError::OptionValueTooLong { capacity: 4,
                                                   actual: bytes.len() });
  }

  Ok(bytes.iter().fold(0u32, |n, b| (n << 8) | *b as u32))
}

/// The "Option Delta" is the difference between this Option's Number
/// and the previous Option's number.
///
/// This is just used to compute the Option Number, identifying which
/// Option is being set (e.g. Content-Format has a Number of 12)
///
/// # Related
/// - [RFC7252#section-3.1 Option Format](https://datatracker.ietf.org/doc/html/rfc7252#section-3.1)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Debug, Default)]
pub struct OptDelta(pub u32);

/// Option Numbers identify which option is being set.
///
/// ```text
///   0   1   2   3   4   5   6   7 <--------- bit
/// +---+---+---+---+---+---+---+---+
/// |           | NoCacheKey| U | C |
/// +---+---+---+---+---+---+---+---+
/// ```
///
/// The least significant bit ("C") of the number marks the option as
/// critical; the next ("U") as unsafe to forward.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

/// Whether an option must be understood by the recipient
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionMustBeProcessed {
  /// This option must be processed,
  /// and a response that ignores it
  /// will be rejected.
  ///
  /// Corresponds to the option being "critical"
  /// in strict CoAP terms
  Yes,
  /// This option does not _need_ to
  /// be processed,
  /// and a response that ignores it
  /// will be processed anyway.
  ///
  /// Corresponds to the option being "elective"
  /// in strict CoAP terms
  No,
}

/// Whether a proxy that does not understand an option may forward it
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhenOptionUnsupportedByProxy {
  /// This option /must be/ processed & understood by proxies
  /// and may not be forwarded blindly to their destination.
  ///
  /// Corresponds to the option being "UnSafe" to forward
  /// in strict CoAP terms
  Error,
  /// This option may not be processed & understood by proxies
  /// and may be forwarded blindly to their destination.
  ///
  /// Corresponds to the option being "SafeToForward"
  /// in strict CoAP terms
  Forward,
}

impl OptNumber {
  /// Whether or not this option may be ignored by a server
  ///
  /// ```
  /// use oic_msg::known;
  /// use oic_msg::opt::OptionMustBeProcessed;
  ///
  /// assert_eq!(known::URI_PATH.must_be_processed(), OptionMustBeProcessed::Yes);
  /// assert_eq!(known::OBSERVE.must_be_processed(), OptionMustBeProcessed::No);
  /// ```
  pub fn must_be_processed(&self) -> OptionMustBeProcessed {
    #[allow(clippy::wildcard_in_or_patterns)] // will only ever be 0 or 1
    match self.0 & 0b1 {
      | 1 => OptionMustBeProcessed::Yes,
      | 0 | _ => OptionMustBeProcessed::No,
    }
  }

  /// Whether or not this option may be forwarded blindly by
  /// a proxy that does not support processing it
  pub fn when_unsupported_by_proxy(&self) -> WhenOptionUnsupportedByProxy {
    #[allow(clippy::wildcard_in_or_patterns)] // will only ever be 0 or 1
    match (self.0 & 0b10) >> 1 {
      | 1 => WhenOptionUnsupportedByProxy::Error,
      | 0 | _ => WhenOptionUnsupportedByProxy::Forward,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_eqb_iter;

  #[test]
  fn opt() {
    use core::iter::repeat;
    let cases: [(u32, Vec<u8>, Vec<u8>); 4] =
      [(24,
        repeat(1).take(100).collect(),
        [[0b1101_1101u8, 24 - 13, 100 - 13].as_ref(),
         repeat(1).take(100).collect::<Vec<u8>>().as_ref()].concat()),
       (1, vec![1], vec![0b0001_0001, 1]),
       (24, vec![1], vec![0b1101_0001, 11, 1]),
       (24,
        repeat(1).take(300).collect(),
        [[0b1101_1110, 24 - 13].as_ref(),
         (300u16 - 269).to_be_bytes().as_ref(),
         repeat(1).take(300).collect::<Vec<u8>>().as_ref()].concat())];

    cases.into_iter().for_each(|(delta, value, expected)| {
                       let mut actual = Vec::<u8>::new();
                       extend_opt_bytes(delta, &value, &mut actual);
                       assert_eqb_iter!(actual, expected)
                     });
  }

  #[test]
  fn parse_extended_delta() {
    let mut one = Cursor::new([2u8]);
    assert_eq!(parse_opt_len_or_delta(13, &mut one, OptParseError::OptionDeltaReservedValue(15)),
               Ok(15));

    let mut two = Cursor::new(31u16.to_be_bytes());
    assert_eq!(parse_opt_len_or_delta(14, &mut two, OptParseError::OptionDeltaReservedValue(15)),
               Ok(300));

    let mut none = Cursor::new([0u8; 0]);
    assert_eq!(parse_opt_len_or_delta(15, &mut none, OptParseError::OptionDeltaReservedValue(15)),
               Err(OptParseError::OptionDeltaReservedValue(15)));
    assert_eq!(parse_opt_len_or_delta(14, &mut none, OptParseError::OptionDeltaReservedValue(15)),
               Err(OptParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn uint_roundtrip_is_minimal() {
    for n in [0u32, 1, 255, 256, 65_535, 65_536, u32::MAX] {
      let bytes = encode_uint(n);
      assert_eq!(decode_uint(&bytes), Ok(n));
      assert!(bytes.first() != Some(&0));
    }
  }
}
