use std_alloc::vec::Vec;

use crate::msg::opt::{extend_opt_bytes, MAX_OPT_LEN_OR_DELTA};
use crate::msg::{Byte1, PAYLOAD_MARKER};
use crate::*;

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error yielded when the value cannot be represented as bytes
  type Error;

  /// Try to convert into a collection of bytes
  ///
  /// ```
  /// use oic_msg::{Code, Id, Message, Token, TryIntoBytes, Type};
  ///
  /// let msg = Message::new(Type::Non, Code::GET, Id(3), Token::default());
  /// let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
  ///
  /// assert_eq!(bytes, vec![0b0101_0000, 1, 0, 3]);
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// An option value was longer than the option header can express
  OptionValueTooLong {
    /// The option
    number: OptNumber,
    /// Length of the value
    len: usize,
  },
  /// Frame was larger than the length header can express
  TooLong {
    /// Largest expressible size
    capacity: usize,
    /// Actual size
    size: usize,
  },
}

/// Write options (in ascending order), and the payload marker & payload
/// when the payload is not empty.
pub(crate) fn extend_opts_and_payload(msg: &Message,
                                      bytes: &mut Vec<u8>)
                                      -> Result<(), MessageToBytesError> {
  let mut prev = 0u32;

  for (number, value) in msg.opts.iter() {
    if value.len() as u32 > MAX_OPT_LEN_OR_DELTA {
      return Err(MessageToBytesError::OptionValueTooLong { number,
                                                           len: value.len() });
    }

    extend_opt_bytes(number.0 - prev, &value, bytes);
    prev = number.0;
  }

  if !msg.payload.is_empty() {
    bytes.push(PAYLOAD_MARKER);
    bytes.extend_from_slice(msg.payload());
  }

  Ok(())
}

impl<'a> TryIntoBytes for &'a Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    let mut bytes = Vec::with_capacity(4 + self.token.len() + self.payload.0.len() + 16);

    let byte1: u8 = Byte1 { tkl: self.token.len() as u8,
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.push(byte1);
    bytes.push(code);
    bytes.extend(id);
    bytes.extend_from_slice(self.token.as_bytes());

    extend_opts_and_payload(self, &mut bytes)?;

    Ok(bytes)
  }
}

impl TryIntoBytes for Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    (&self).try_into_bytes()
  }
}

#[cfg(test)]
mod tests {
  use itertools::Itertools;

  use super::*;
  use crate::{assert_eqb, assert_eqb_iter};

  #[test]
  fn msg() {
    let (msg, expected) = test_msg();
    let actual: Vec<u8> = msg.try_into_bytes().unwrap();
    assert_eqb_iter!(actual, expected);
  }

  #[test]
  fn byte_1() {
    let byte = Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 3 };
    let actual: u8 = byte.into();
    let expected = 0b_01_10_0011u8;
    assert_eqb!(actual, expected)
  }

  #[test]
  fn id() {
    let id = Id(16);
    let actual = u16::from_be_bytes(id.into());
    assert_eqb!(actual, 16)
  }

  #[test]
  fn no_payload_marker() {
    let msg = Message::new(Type::Con, Code::GET, Id(0), Token::default());
    let actual: Vec<u8> = msg.try_into_bytes().unwrap();

    assert_ne!(actual.last(), Some(&PAYLOAD_MARKER));
    assert_eq!(actual.len(), 4);
  }

  #[test]
  fn options_are_written_in_ascending_order() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(0), Token::from_slice(&[1]));
    msg.opts = Options { size1: Some(100),
                         observe: Some(0),
                         block2: Some(Block::new(64, 1, false)),
                         accept: Some(ContentFormat::Cbor),
                         uri_query: Some("if=oic.if.ll&rt=oic.wk.d".into()),
                         uri_path: Some("oic/res".into()),
                         content_format: Some(ContentFormat::Cbor),
                         ..Default::default() };

    let numbers = msg.opts.iter().map(|(n, _)| n).collect::<Vec<_>>();
    assert!(numbers.iter().tuple_windows().all(|(a, b)| a <= b));
    assert_eq!(numbers.iter().filter(|n| **n == known::URI_PATH).count(), 2);
    assert_eq!(numbers.iter().filter(|n| **n == known::URI_QUERY).count(), 2);

    let bytes = (&msg).try_into_bytes().unwrap();
    assert_eq!(Message::try_from_bytes(&bytes).unwrap(), msg);
  }

  #[test]
  fn observe_zero_is_empty_value() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(0), Token::default());
    msg.opts.observe = Some(0);
    let actual: Vec<u8> = msg.try_into_bytes().unwrap();

    // delta 6, length 0
    assert_eqb!(actual[4], 0b0110_0000u8);
  }

  #[test]
  fn long_path_segment_uses_extended_length() {
    let seg = "x".repeat(300);
    let mut msg = Message::new(Type::Con, Code::PUT, Id(9), Token::default());
    msg.opts.uri_path = Some(seg.clone());
    msg.payload = Payload(vec![1, 2, 3]);

    let bytes = (&msg).try_into_bytes().unwrap();
    assert_eqb_iter!(bytes[4..7], [0b1011_1110u8, 0, (300u16 - 269) as u8]);
    assert_eq!(Message::try_from_bytes(&bytes).unwrap().opts.path(), seg);
  }
}
