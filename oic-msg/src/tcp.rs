//! CoAP over TCP (RFC8323) framing.
//!
//! Stream transports drop the message type and id, and instead
//! prefix each message with its length:
//!
//! ```text
//!  0   1   2   3   4   5   6   7
//! +---+---+---+---+---+---+---+---+
//! |      Len      |      TKL      |  Extended Length (0-4 bytes) ...
//! +---+---+---+---+---+---+---+---+
//! |             Code              |  Token (TKL bytes) ...
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! `Len` counts the bytes of options and payload (not the header or token).
//!
//! ```
//! use oic_msg::{tcp, Code, Id, Message, Token, Type};
//!
//! let mut msg = Message::new(Type::Non, Code::GET, Id(0), Token::from_slice(&[7]));
//! msg.opts.set_path("oic/res");
//!
//! let bytes = tcp::to_bytes(&msg).unwrap();
//! assert_eq!(tcp::from_bytes(&bytes).unwrap(), msg);
//! ```

use std_alloc::vec::Vec;
use toad_cursor::Cursor;

use crate::msg::consume_opts_and_payload;
use crate::to_bytes::extend_opts_and_payload;
use crate::{Code, Id, Message, MessageParseError, MessageToBytesError, Token, Type, Version};

const LEN_8: usize = 13;
const LEN_16: usize = 269;
const LEN_32: usize = 65805;

/// Split a frame length into its 4-bit nibble and extended length bytes
fn len_nibble(len: usize) -> Result<(u8, Vec<u8>), MessageToBytesError> {
  match len {
    | n if n < LEN_8 => Ok((n as u8, Vec::new())),
    | n if n < LEN_16 => Ok((13, [(n - LEN_8) as u8].to_vec())),
    | n if n < LEN_32 => Ok((14, ((n - LEN_16) as u16).to_be_bytes().to_vec())),
    | n => {
      let too_long = MessageToBytesError::TooLong { capacity: LEN_32 + u32::MAX as usize,
                                                    size: n };
      let ext = u32::try_from(n - LEN_32).map_err(|_| too_long)?;
      Ok((15, ext.to_be_bytes().to_vec()))
    },
  }
}

/// Serialize a message using the RFC8323 header.
///
/// The message's type and id are not written.
pub fn to_bytes(msg: &Message) -> Result<Vec<u8>, MessageToBytesError> {
  let mut body = Vec::new();
  extend_opts_and_payload(msg, &mut body)?;

  let (len, ext) = len_nibble(body.len())?;

  let mut bytes = Vec::with_capacity(2 + ext.len() + msg.token.len() + body.len());
  bytes.push(len << 4 | msg.token.len() as u8);
  bytes.extend(ext);
  bytes.push(msg.code.into());
  bytes.extend_from_slice(msg.token.as_bytes());
  bytes.extend(body);

  Ok(bytes)
}

/// Parse a message framed with the RFC8323 header.
///
/// Stream messages are always given [`Type::Non`] and [`Id`] `0`.
pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Message, MessageParseError> {
  let mut bytes = Cursor::new(bytes);

  let byte1 = bytes.next().ok_or_else(MessageParseError::eof)?;
  let tkl = byte1 & 0b1111;

  if tkl > 8 {
    return Err(MessageParseError::InvalidTokenLength(tkl));
  }

  let len = match byte1 >> 4 {
    | 13 => bytes.next().ok_or_else(MessageParseError::eof)? as usize + LEN_8,
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => u16::from_be_bytes([a, b]) as usize + LEN_16,
      | _ => return Err(MessageParseError::eof()),
    },
    | 15 => match bytes.take_exact(4) {
      | Some(&[a, b, c, d]) => u32::from_be_bytes([a, b, c, d]) as usize + LEN_32,
      | _ => return Err(MessageParseError::eof()),
    },
    | n => n as usize,
  };

  let code: Code = bytes.next().ok_or_else(MessageParseError::eof)?.into();
  let token = bytes.take_exact(tkl as usize)
                   .map(Token::from_slice)
                   .ok_or_else(MessageParseError::eof)?;

  let body = bytes.take_exact(len).ok_or_else(MessageParseError::eof)?;
  let (opts, payload) = consume_opts_and_payload(&mut Cursor::new(body))?;

  Ok(Message { id: Id(0),
               ty: Type::Non,
               ver: Version::default(),
               token,
               code,
               opts,
               payload })
}
