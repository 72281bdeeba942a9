use oic_msg::{Id, MessageParseError, MessageToBytesError, Token};

use crate::net::Endpoint;
use crate::resource::RegisterError;

/// The context that an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
  /// We were polling the socket for datagrams
  Polling,
  /// We were sending a message
  SendingMessage(Option<Endpoint>, Id, Token),
  /// We were handling the request with this message id
  HandlingRequest(Id),
  /// We were notifying observers of a resource
  Notifying,
  /// No useful context
  None,
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what<E>(self, what: What<E>) -> Error<E> {
    Error { when: self, what }
  }
}

/// An error encounterable from within the engine
///
/// `E` is the error type of the [`Socket`](crate::net::Socket) in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error<E> {
  /// What happened?
  pub what: What<E>,
  /// What were we doing when it happened?
  pub when: When,
}

impl<E> Error<E> {
  /// Is this error `FromBytes`?
  pub fn message_parse_error(&self) -> Option<&MessageParseError> {
    match self.what {
      | What::FromBytes(ref e) => Some(e),
      | _ => None,
    }
  }

  /// Did a fixed-capacity pool run out of room?
  pub fn is_exhaustion(&self) -> bool {
    matches!(self.what,
             What::TransactionsFull
             | What::ObserversFull
             | What::ClientCallbacksFull
             | What::ResourcesFull)
  }
}

/// A contextless error with some additional debug data attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum What<E> {
  /// Some socket operation (e.g. sending a datagram) failed
  SockError(E),
  /// Parsing a message from bytes failed
  FromBytes(MessageParseError),
  /// Serializing a message to bytes failed
  ToBytes(MessageToBytesError),
  /// No free transaction slots
  TransactionsFull,
  /// No free observer slots
  ObserversFull,
  /// No free client callback slots
  ClientCallbacksFull,
  /// No free application resource slots
  ResourcesFull,
  /// The resource could not be hosted as described
  BadResource(RegisterError),
  /// A transaction for this message id is already in flight
  DuplicateId(Id),
  /// The clock failed to provide timing.
  ClockError,
}
