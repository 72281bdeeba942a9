use oic_msg::{Block, Code, Message};
use serde::de::DeserializeOwned;
use std_alloc::format;

use crate::net::Endpoint;
use crate::resp::builder::RepError;

/// Query string helpers
pub mod query;

/// Request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
  /// 0.01 GET
  Get,
  /// 0.02 POST
  Post,
  /// 0.03 PUT
  Put,
  /// 0.04 DELETE
  Delete,
}

impl Method {
  /// All methods, in the order their handlers are stored
  pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

  /// The method of a request code, `None` for non-request codes
  ///
  /// ```
  /// use oic::req::Method;
  /// use oic_msg::Code;
  ///
  /// assert_eq!(Method::from_code(Code::PUT), Some(Method::Put));
  /// assert_eq!(Method::from_code(Code::new(2, 5)), None);
  /// ```
  pub fn from_code(code: Code) -> Option<Self> {
    match code {
      | Code::GET => Some(Method::Get),
      | Code::POST => Some(Method::Post),
      | Code::PUT => Some(Method::Put),
      | Code::DELETE => Some(Method::Delete),
      | _ => None,
    }
  }

  /// The request code for this method
  pub fn code(&self) -> Code {
    match self {
      | Method::Get => Code::GET,
      | Method::Post => Code::POST,
      | Method::Put => Code::PUT,
      | Method::Delete => Code::DELETE,
    }
  }

  pub(crate) fn index(&self) -> usize {
    match self {
      | Method::Get => 0,
      | Method::Post => 1,
      | Method::Put => 2,
      | Method::Delete => 3,
    }
  }
}

/// An inbound request, as seen by a resource handler.
///
/// `endpoint` is `None` when the engine invokes a GET handler on
/// its own (to produce a notification for periodic observation).
#[derive(Debug, Clone, PartialEq)]
pub struct Request<'a> {
  msg: &'a Message,
  endpoint: Option<Endpoint>,
}

impl<'a> Request<'a> {
  pub(crate) fn new(msg: &'a Message, endpoint: Option<Endpoint>) -> Self {
    Self { msg, endpoint }
  }

  /// The underlying message
  pub fn msg(&self) -> &Message {
    self.msg
  }

  /// Who sent the request
  pub fn endpoint(&self) -> Option<Endpoint> {
    self.endpoint
  }

  /// Request method; `Get` for the synthetic request used by notifications
  pub fn method(&self) -> Method {
    Method::from_code(self.msg.code).unwrap_or(Method::Get)
  }

  /// Uri-Path, without a leading `/`
  pub fn path(&self) -> &str {
    self.msg.opts.path()
  }

  /// Uri-Query (pairs joined with `&`)
  pub fn query(&self) -> &str {
    self.msg.opts.query()
  }

  /// Look up a query parameter, see [`query::value`]
  pub fn query_value(&self, key: &str) -> Option<&str> {
    query::value(self.query(), key)
  }

  /// Raw payload
  pub fn payload(&self) -> &[u8] {
    self.msg.payload()
  }

  /// Decode the CBOR payload
  pub fn rep<T: DeserializeOwned>(&self) -> Result<T, RepError> {
    ciborium::de::from_reader(self.payload()).map_err(|e| RepError(format!("{:?}", e)))
  }

  /// Observe option value
  pub fn observe(&self) -> Option<u32> {
    self.msg.opts.observe
  }

  /// Block2 option, present when the client asks for a specific block
  pub fn block2(&self) -> Option<Block> {
    self.msg.opts.block2
  }

  /// Block1 option
  pub fn block1(&self) -> Option<Block> {
    self.msg.opts.block1
  }
}
