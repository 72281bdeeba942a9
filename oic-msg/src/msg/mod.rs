use std_alloc::string::String;
use std_alloc::vec::Vec;
use toad_cursor::Cursor;

use crate::from_bytes::{TryConsumeBytes, TryFromBytes};

#[doc(hidden)]
pub mod code;
#[doc(hidden)]
pub mod id;
#[doc(hidden)]
pub mod opt;
#[doc(hidden)]
pub mod parse_error;
#[doc(hidden)]
pub mod token;
#[doc(hidden)]
pub mod ty;
#[doc(hidden)]
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::known::{Block, ContentFormat};
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

/// Marks the end of the options and the start of the payload
pub(crate) const PAYLOAD_MARKER: u8 = 0b1111_1111;

/// Message payload; the body of the request or response
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Payload(pub Vec<u8>);

impl Payload {
  /// Is the payload empty?
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// The options of a message that an OCF stack cares about.
///
/// Repeatable options are collapsed into a single value:
/// Uri-Path segments are joined with `/` and Uri-Query
/// arguments are joined with `&`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
  /// Observe (6)
  pub observe: Option<u32>,
  /// Uri-Path (11), without a leading `/`
  pub uri_path: Option<String>,
  /// Content-Format (12)
  pub content_format: Option<ContentFormat>,
  /// Max-Age (14)
  pub max_age: Option<u32>,
  /// Uri-Query (15)
  pub uri_query: Option<String>,
  /// Accept (17)
  pub accept: Option<ContentFormat>,
  /// Block2 (23)
  pub block2: Option<Block>,
  /// Block1 (27)
  pub block1: Option<Block>,
  /// Size2 (28)
  pub size2: Option<u32>,
  /// Size1 (60)
  pub size1: Option<u32>,
}

impl Options {
  /// Set the Uri-Path, ignoring any leading `/`
  ///
  /// ```
  /// use oic_msg::Options;
  ///
  /// let mut opts = Options::default();
  /// opts.set_path("/a/light");
  /// assert_eq!(opts.uri_path.as_deref(), Some("a/light"));
  /// ```
  pub fn set_path(&mut self, path: &str) {
    let path = path.trim_start_matches('/');
    self.uri_path = if path.is_empty() {
                      None
                    } else {
                      Some(path.into())
                    };
  }

  /// The Uri-Path, or `""` when absent
  pub fn path(&self) -> &str {
    self.uri_path.as_deref().unwrap_or("")
  }

  /// The Uri-Query, or `""` when absent
  pub fn query(&self) -> &str {
    self.uri_query.as_deref().unwrap_or("")
  }

  /// Every option value as it will appear on the wire, in ascending
  /// option number order.
  ///
  /// Uri-Path and Uri-Query yield one entry per segment.
  pub fn iter(&self) -> impl Iterator<Item = (OptNumber, Vec<u8>)> + '_ {
    known::ORDER.into_iter().flat_map(move |num| self.values_of(num))
  }

  fn values_of(&self, num: OptNumber) -> Vec<(OptNumber, Vec<u8>)> {
    let uint = |n: Option<u32>| -> Vec<(OptNumber, Vec<u8>)> {
      n.map(|n| (num, encode_uint(n).to_vec())).into_iter().collect()
    };
    let split = |s: &Option<String>, sep: char| -> Vec<(OptNumber, Vec<u8>)> {
      match s {
        | Some(s) if !s.is_empty() => s.split(sep)
                                       .map(|seg| (num, seg.as_bytes().to_vec()))
                                       .collect(),
        | _ => Vec::new(),
      }
    };

    match num {
      | known::OBSERVE => uint(self.observe),
      | known::URI_PATH => split(&self.uri_path, '/'),
      | known::CONTENT_FORMAT => uint(self.content_format.map(|f| u16::from(f) as u32)),
      | known::MAX_AGE => uint(self.max_age),
      | known::URI_QUERY => split(&self.uri_query, '&'),
      | known::ACCEPT => uint(self.accept.map(|f| u16::from(f) as u32)),
      | known::BLOCK2 => uint(self.block2.map(u32::from)),
      | known::BLOCK1 => uint(self.block1.map(u32::from)),
      | known::SIZE2 => uint(self.size2),
      | known::SIZE1 => uint(self.size1),
      | _ => Vec::new(),
    }
  }

  fn accept_value(&mut self, num: OptNumber, value: &[u8]) -> Result<(), OptParseError> {
    let join = |cur: &mut Option<String>, seg: &str, sep: char| match cur {
      | Some(s) => {
        s.push(sep);
        s.push_str(seg);
      },
      | None => *cur = Some(seg.into()),
    };
    let format = |v: &[u8]| -> Result<ContentFormat, OptParseError> {
      match decode_uint(v)? {
        | n if n > u16::MAX as u32 => Err(OptParseError::OptionValueTooLong { capacity: 2,
                                                                             actual: v.len() }),
        | n => Ok(ContentFormat::from(n as u16)),
      }
    };

    match num {
      | known::OBSERVE => self.observe = Some(decode_uint(value)?),
      | known::URI_PATH => join(&mut self.uri_path, utf8(num, value)?, '/'),
      | known::CONTENT_FORMAT => self.content_format = Some(format(value)?),
      | known::MAX_AGE => self.max_age = Some(decode_uint(value)?),
      | known::URI_QUERY => join(&mut self.uri_query, utf8(num, value)?, '&'),
      | known::ACCEPT => self.accept = Some(format(value)?),
      | known::BLOCK2 => self.block2 = Some(Block::from(decode_uint(value)?)),
      | known::BLOCK1 => self.block1 = Some(Block::from(decode_uint(value)?)),
      | known::SIZE2 => self.size2 = Some(decode_uint(value)?),
      | known::SIZE1 => self.size1 = Some(decode_uint(value)?),
      | other => match other.must_be_processed() {
        | OptionMustBeProcessed::Yes => return Err(OptParseError::UnknownCriticalOption(other)),
        | OptionMustBeProcessed::No => (),
      },
    }

    Ok(())
  }
}

fn utf8(num: OptNumber, value: &[u8]) -> Result<&str, OptParseError> {
  core::str::from_utf8(value).map_err(|_| OptParseError::InvalidUtf8(num))
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Options {
  type Error = OptParseError;

  /// Consume options until the payload marker or the end of the buffer.
  ///
  /// The payload marker is left in the cursor.
  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = Options::default();
    let mut num = 0u32;

    loop {
      let head = match bytes.peek_exact(1).and_then(|b| b.first().copied()) {
        | None | Some(PAYLOAD_MARKER) => break,
        | Some(_) => bytes.next().ok_or_else(OptParseError::eof)?,
      };

      let delta = parse_opt_len_or_delta(head >> 4,
                                         bytes,
                                         OptParseError::OptionDeltaReservedValue(15))?;
      let len = parse_opt_len_or_delta(head & 0b1111,
                                       bytes,
                                       OptParseError::ValueLengthReservedValue(15))?;

      num = num.saturating_add(delta);

      let value = bytes.take_exact(len as usize)
                       .ok_or_else(OptParseError::eof)?;
      opts.accept_value(OptNumber(num), value)?;
    }

    Ok(opts)
  }
}

/// The first byte of a UDP message header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Ok(Byte1 { ver: Version(ver),
               ty: Type::try_from(ty)?,
               tkl })
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = u8::from(b.ty) << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}

/// # CoAP Messages
/// This struct represents a single CoAP message, as seen on the wire
/// (a UDP datagram) or inside a TCP frame.
///
/// Options are stored in [`Options`], see the crate docs for how
/// repeated options are represented.
///
/// # Related
/// - [RFC7252#section-3 Message Format](https://datatracker.ietf.org/doc/html/rfc7252#section-3)
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`Options`] for details
  pub opts: Options,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Message {
  /// Create a message with no options and an empty payload
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           ty,
           ver: Version::default(),
           token,
           code,
           opts: Options::default(),
           payload: Payload::default() }
  }

  /// An empty message (code 0.00, no token) of type `ty`
  pub fn empty(ty: Type, id: Id) -> Self {
    Self::new(ty, Code::EMPTY, id, Token::default())
  }

  /// An empty acknowledgement of the CON message with id `id`
  ///
  /// ```
  /// use oic_msg::{Code, Id, Message, Type};
  ///
  /// let ack = Message::ack(Id(12));
  /// assert_eq!(ack.ty, Type::Ack);
  /// assert_eq!(ack.code, Code::EMPTY);
  /// ```
  pub fn ack(id: Id) -> Self {
    Self::empty(Type::Ack, id)
  }

  /// An empty reset message rejecting the message with id `id`
  pub fn rst(id: Id) -> Self {
    Self::empty(Type::Reset, id)
  }

  /// Borrow the payload bytes
  pub fn payload(&self) -> &[u8] {
    &self.payload.0
  }

  /// Is this message a request (GET, POST, PUT or DELETE)?
  pub fn is_request(&self) -> bool {
    self.code.kind() == CodeKind::Request
  }
}

/// Parse the options and payload that follow the token,
/// shared by the datagram and stream framings.
pub(crate) fn consume_opts_and_payload<A: AsRef<[u8]>>(
  bytes: &mut Cursor<A>)
  -> Result<(Options, Payload), MessageParseError> {
  let opts = Options::try_consume_bytes(bytes).map_err(MessageParseError::OptParseError)?;

  let payload = match bytes.next() {
    | None => Payload::default(),
    | Some(_) if bytes.remaining() == 0 => return Err(MessageParseError::EmptyPayload),
    | Some(_) => Payload(bytes.take_until_end().to_vec()),
  };

  Ok((opts, payload))
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next().ok_or_else(MessageParseError::eof)?.try_into()?;

    if ver != Version(1) {
      return Err(Self::Error::InvalidVersion(ver.0));
    }

    if tkl > 8 {
      return Err(Self::Error::InvalidTokenLength(tkl));
    }

    let code: Code = bytes.next().ok_or_else(MessageParseError::eof)?.into();
    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token = bytes.take_exact(tkl as usize)
                     .ok_or_else(MessageParseError::eof)?;
    let token = Token::from_slice(token);

    let (opts, payload) = consume_opts_and_payload(&mut bytes)?;

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_msg() {
    let (expect, msg) = crate::test_msg();
    assert_eq!(Message::try_from_bytes(&msg).unwrap(), expect)
  }

  #[test]
  fn parse_byte1() {
    let byte = 0b_01_10_0011u8;
    let byte = Byte1::try_from(byte).unwrap();
    assert_eq!(byte,
               Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 3 })
  }

  #[test]
  fn parse_id() {
    let mut id_bytes = Cursor::new(34u16.to_be_bytes());
    let id = Id::try_consume_bytes(&mut id_bytes).unwrap();
    assert_eq!(id, Id(34));
  }

  #[test]
  fn bad_version() {
    let bytes = [0b1000_0000u8, 1, 0, 1];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::InvalidVersion(2)));
  }

  #[test]
  fn token_longer_than_8() {
    let bytes = [0b0100_1001u8, 1, 0, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::InvalidTokenLength(9)));
    assert_eq!(MessageParseError::InvalidTokenLength(9).code(), Code::new(4, 0));
  }

  #[test]
  fn truncated_header() {
    assert_eq!(Message::try_from_bytes([0b0100_0000u8, 1]),
               Err(MessageParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn marker_without_payload() {
    let bytes = [0b0100_0000u8, 1, 0, 1, PAYLOAD_MARKER];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::EmptyPayload));
  }

  #[test]
  fn repeated_path_and_query_are_joined() {
    let bytes = [&[0b0100_0000u8, 1, 0, 1][..],
                 &[0b1011_0001, b'a'],
                 &[0b0000_0010, b'b', b'c'],
                 &[0b0100_0100],
                 b"if=x",
                 &[0b0000_0011],
                 b"y=1"].concat();
    let msg = Message::try_from_bytes(&bytes).unwrap();
    assert_eq!(msg.opts.path(), "a/bc");
    assert_eq!(msg.opts.query(), "if=x&y=1");
    assert!(msg.payload.is_empty());
  }

  #[test]
  fn unknown_elective_option_is_skipped() {
    // option 8 (Location-Path) is elective
    let bytes = [0b0100_0000u8, 1, 0, 1, 0b1000_0001, b'x', 0b0011_0001, b'a'];
    let msg = Message::try_from_bytes(bytes).unwrap();
    assert_eq!(msg.opts.path(), "a");
  }

  #[test]
  fn unknown_critical_option_is_rejected() {
    // option 5 (If-None-Match) is critical
    let bytes = [0b0100_0000u8, 1, 0, 1, 0b0101_0000];
    let err = Message::try_from_bytes(bytes).unwrap_err();
    assert_eq!(err,
               MessageParseError::OptParseError(OptParseError::UnknownCriticalOption(OptNumber(5))));
    assert_eq!(err.code(), Code::new(4, 2));
  }

  #[test]
  fn reserved_delta_is_rejected() {
    let bytes = [0b0100_0000u8, 1, 0, 1, 0b1111_0001, 0];
    assert_eq!(Message::try_from_bytes(bytes),
               Err(MessageParseError::OptParseError(OptParseError::OptionDeltaReservedValue(15))));
  }

  #[test]
  fn set_path_strips_slash() {
    let mut opts = Options::default();
    opts.set_path("/");
    assert_eq!(opts.uri_path, None);
    opts.set_path("oic/res");
    assert_eq!(opts.path(), "oic/res");
  }
}
