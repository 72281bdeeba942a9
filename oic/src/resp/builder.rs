use oic_msg::Block;
use serde::Serialize;
use std_alloc::format;
use std_alloc::string::String;
use std_alloc::vec::Vec;

use super::code::Status;

/// Encoding a representation to CBOR failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepError(pub String);

/// The response a resource handler fills in.
///
/// A fresh builder is handed to the handler for every request (or
/// notification); handlers set a status and, optionally, a payload.
/// A handler that sets no status answers with 5.00.
///
/// ```
/// use oic::resp::builder::ResponseBuilder;
/// use oic::resp::code::Status;
///
/// #[derive(serde::Serialize)]
/// struct Light {
///   state: bool,
/// }
///
/// let mut resp = ResponseBuilder::new();
/// resp.set_rep(&Light { state: true }).unwrap();
/// resp.set_status(Status::Ok);
///
/// assert_eq!(resp.status(), Some(Status::Ok));
/// assert!(!resp.payload().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBuilder {
  status: Option<Status>,
  payload: Vec<u8>,
  block1: Option<Block>,
  chunked: Option<bool>,
}

impl ResponseBuilder {
  /// Create an empty builder
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the response status
  pub fn set_status(&mut self, status: Status) -> &mut Self {
    self.status = Some(status);
    self
  }

  /// The status set by the handler, if any
  pub fn status(&self) -> Option<Status> {
    self.status
  }

  /// Encode `rep` as CBOR and use it as the payload
  pub fn set_rep<T: Serialize>(&mut self, rep: &T) -> Result<&mut Self, RepError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(rep, &mut bytes).map_err(|e| RepError(format!("{:?}", e)))?;
    self.payload = bytes;
    Ok(self)
  }

  /// Use raw bytes as the payload
  pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) -> &mut Self {
    self.payload = payload.into();
    self
  }

  /// The payload so far
  pub fn payload(&self) -> &[u8] {
    &self.payload
  }

  /// Acknowledge a Block1 transfer.
  ///
  /// Without this a successful response to a request carrying
  /// Block1 is replaced by 5.01 Not Implemented.
  pub fn set_block1(&mut self, block: Block) -> &mut Self {
    self.block1 = Some(block);
    self
  }

  /// See [`ResponseBuilder::set_block1`]
  pub fn block1(&self) -> Option<Block> {
    self.block1
  }

  /// Mark the payload as a chunk of a larger representation that
  /// the handler slices itself (using the request's Block2 option).
  ///
  /// `more` says whether chunks follow this one.
  pub fn set_chunked(&mut self, more: bool) -> &mut Self {
    self.chunked = Some(more);
    self
  }

  /// See [`ResponseBuilder::set_chunked`]
  pub fn chunked(&self) -> Option<bool> {
    self.chunked
  }

  pub(crate) fn into_parts(self) -> (Option<Status>, Vec<u8>, Option<Block>, Option<bool>) {
    (self.status, self.payload, self.block1, self.chunked)
  }
}
