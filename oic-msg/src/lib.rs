//! Low-level representation of CoAP messages, as spoken by OIC / OCF devices.
//!
//! The most notable item in `oic_msg` is [`Message`];
//! a CoAP message that keeps the options an OCF stack cares about
//! as named fields rather than as a raw list.
//!
//! ## Options
//! CoAP options are ordered on the wire by their number, and
//! some of them (Uri-Path, Uri-Query) may be repeated.
//!
//! `Message` stores each supported option once:
//! - repeated path & query options are merged into a single string,
//!   using `/` and `&` respectively as separators
//! - numeric options are stored as integers, and encoded using
//!   the shortest big-endian representation
//!
//! Serializing always emits options in ascending numeric order
//! by walking a fixed list of known options (see [`known::ORDER`]).
//!
//! Unknown options found while parsing are skipped when elective (even number),
//! and abort parsing with [`OptParseError::UnknownCriticalOption`] when critical
//! (odd number).
//!
//! ```
//! use oic_msg::{Code, Id, Message, Token, TryFromBytes, TryIntoBytes, Type};
//!
//! let mut req = Message::new(Type::Con, Code::GET, Id(1), Token::from_slice(&[1, 2]));
//! req.opts.set_path("/light/1");
//! req.opts.uri_query = Some("if=oic.if.baseline".into());
//!
//! let bytes: Vec<u8> = req.clone().try_into_bytes().unwrap();
//! let parsed = Message::try_from_bytes(&bytes).unwrap();
//!
//! assert_eq!(parsed, req);
//! assert_eq!(parsed.opts.uri_path.as_deref(), Some("light/1"));
//! ```
//!
//! ## Framing
//! Datagram transports use the RFC7252 header ([`TryFromBytes`] / [`TryIntoBytes`]),
//! while stream transports use the length-prefixed header from RFC8323
//! (see the [`tcp`] module).

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
#![deny(missing_docs)]

extern crate alloc as std_alloc;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

#[doc(hidden)]
pub mod to_bytes;

/// Stream (TCP) framing
pub mod tcp;

#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::{MessageToBytesError, TryIntoBytes};

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, std_alloc::vec::Vec<u8>) {
  // TEST

  let header: [u8; 4] = 0b0100_0001_0100_0101_0000_0000_0000_0001_u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  let options: [&[u8]; 3] = [// Uri-Path (11), len 1
                              &[0b1011_0001u8],
                              b"a",
                              // Content-Format (12), delta 1, len 1 (60 = cbor)
                              &[0b0001_0001u8, 60]];
  let payload: [&[u8]; 2] = [&[0b1111_1111_u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.concat().as_ref(),
               payload.concat().as_ref()].concat();

  let msg = Message { id: Id(1),
                      ty: Type::Con,
                      ver: Version(1),
                      token: Token(tinyvec::array_vec!([u8; 8] => 254)),
                      opts: Options { uri_path: Some("a".into()),
                                      content_format: Some(ContentFormat::Cbor),
                                      ..Default::default() },
                      code: Code { class: 2,
                                   detail: 5 },
                      payload: Payload(b"hello, world!".to_vec()) };
  (msg, bytes)
}
