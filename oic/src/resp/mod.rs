use oic_msg::{Code, Message, Token, Type};
use serde::de::DeserializeOwned;
use std_alloc::format;
use std_alloc::vec::Vec;

use crate::net::Endpoint;
use crate::resp::builder::RepError;

/// Response codes and statuses
pub mod code;

/// Building responses inside resource handlers
pub mod builder;

#[doc(inline)]
pub use builder::ResponseBuilder;
#[doc(inline)]
pub use code::Status;

/// A response received by a client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
  /// Response code
  pub code: Code,
  /// Response code as a [`Status`], if it is one we know
  pub status: Option<Status>,
  /// Message type the response arrived in
  pub ty: Type,
  /// Token of the request this answers
  pub token: Token,
  /// Observe sequence number, present for notifications
  pub observe: Option<u32>,
  /// Who sent it
  pub endpoint: Endpoint,
  /// Raw payload
  pub payload: Vec<u8>,
}

impl ClientResponse {
  pub(crate) fn new(msg: &Message, endpoint: Endpoint) -> Self {
    Self { code: msg.code,
           status: Status::from_code(msg.code),
           ty: msg.ty,
           token: msg.token,
           observe: msg.opts.observe,
           endpoint,
           payload: msg.payload.0.clone() }
  }

  /// Decode the CBOR payload
  ///
  /// ```
  /// use oic::resp::ClientResponse;
  /// # use oic::net::Endpoint;
  /// # use oic_msg::{Code, Token, Type};
  /// # let resp = ClientResponse { code: Code::new(2, 5),
  /// #                             status: None,
  /// #                             ty: Type::Ack,
  /// #                             token: Token::default(),
  /// #                             observe: None,
  /// #                             endpoint: Endpoint::udp("0.0.0.0:1".parse().unwrap()),
  /// #                             payload: vec![0xF5] };
  ///
  /// let state: bool = resp.rep().unwrap();
  /// assert!(state);
  /// ```
  pub fn rep<T: DeserializeOwned>(&self) -> Result<T, RepError> {
    ciborium::de::from_reader(self.payload.as_slice()).map_err(|e| RepError(format!("{:?}", e)))
  }
}
