use oic_msg::{Id, Token, Type};
use rand::RngCore;
use std_alloc::vec::Vec;

use crate::config::Con;
use crate::net::{Addrd, Endpoint};
use crate::pool::{Handle, Slab};
use crate::retry::{RetryTimer, YouShould};
use crate::time::Millis;

/// An outbound message that may need to be retransmitted.
///
/// A transaction is opened for every message we originate or answer
/// (responses, notifications, client requests). Non-confirmable
/// messages are sent once and the transaction closed right away;
/// confirmable ones stay open until acknowledged, reset, or until
/// retransmissions are exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
  mid: Id,
  endpoint: Endpoint,
  token: Token,
  ty: Type,
  bytes: Vec<u8>,
  retry: Option<RetryTimer>,
}

impl Transaction {
  /// Message id
  pub fn mid(&self) -> Id {
    self.mid
  }

  /// Destination
  pub fn endpoint(&self) -> Endpoint {
    self.endpoint
  }

  /// Token of the message
  pub fn token(&self) -> Token {
    self.token
  }

  /// Type of the message
  pub fn ty(&self) -> Type {
    self.ty
  }

  /// Has the message been sent and is awaiting an ACK?
  pub fn is_awaiting_ack(&self) -> bool {
    self.retry.is_some()
  }

  pub(crate) fn bytes(&self) -> Addrd<&[u8]> {
    Addrd(&self.bytes, self.endpoint)
  }
}

/// Why a transaction could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewTransactionError {
  /// No free transaction slots
  Full,
  /// A transaction for this message id and endpoint is already open
  DuplicateId(Id),
}

/// What to do about an open transaction, yielded by [`Transactions::due`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Due {
  Retransmit(Handle),
  Expired(Handle),
}

/// The set of open transactions, at most one per message id and endpoint.
///
/// Message ids are only unique per endpoint, so every lookup
/// goes by both.
#[derive(Debug)]
pub struct Transactions {
  slab: Slab<Transaction>,
}

impl Transactions {
  /// Create an empty set with room for `capacity` transactions
  pub fn new(capacity: usize) -> Self {
    Self { slab: Slab::with_capacity(capacity) }
  }

  /// Number of open transactions
  pub fn len(&self) -> usize {
    self.slab.len()
  }

  /// Are there no open transactions?
  pub fn is_empty(&self) -> bool {
    self.slab.is_empty()
  }

  /// Open a transaction for `mid` with `endpoint`.
  ///
  /// Opening a second transaction for a message id that is already
  /// open with the same endpoint is refused rather than replacing the first.
  pub fn new_transaction(&mut self,
                         mid: Id,
                         endpoint: Endpoint)
                         -> Result<Handle, NewTransactionError> {
    if self.get_by_mid(mid, endpoint).is_some() {
      return Err(NewTransactionError::DuplicateId(mid));
    }

    self.slab
        .insert(Transaction { mid,
                              endpoint,
                              token: Token::default(),
                              ty: Type::Non,
                              bytes: Vec::new(),
                              retry: None })
        .map_err(|_| NewTransactionError::Full)
  }

  /// Find the open transaction for `mid` with `endpoint`
  pub fn get_by_mid(&self, mid: Id, endpoint: Endpoint) -> Option<Handle> {
    self.slab.find(|t| t.mid == mid && t.endpoint == endpoint)
  }

  /// Borrow a transaction
  pub fn get(&self, h: Handle) -> Option<&Transaction> {
    self.slab.get(h)
  }

  /// Attach the serialized message to a transaction
  pub(crate) fn set_message(&mut self, h: Handle, ty: Type, token: Token, bytes: Vec<u8>) {
    if let Some(t) = self.slab.get_mut(h) {
      t.ty = ty;
      t.token = token;
      t.bytes = bytes;
    }
  }

  /// Mark a transaction as sent.
  ///
  /// Confirmable messages to datagram endpoints start waiting for an ACK
  /// and the transaction stays open; for anything else the transaction
  /// is closed and `None` is returned.
  pub(crate) fn sent(&mut self,
                     h: Handle,
                     now: Millis,
                     con: Con,
                     rng: &mut impl RngCore)
                     -> Option<Handle> {
    let reliable = match self.slab.get(h) {
      | Some(t) => t.ty == Type::Con && !t.endpoint.is_tcp(),
      | None => return None,
    };

    if reliable {
      if let Some(t) = self.slab.get_mut(h) {
        t.retry = Some(RetryTimer::new(now, con.retry_strategy, con.max_retransmits, rng));
      }
      Some(h)
    } else {
      self.slab.remove(h);
      None
    }
  }

  /// Close a transaction; closing one that is not open is a no-op.
  pub fn clear(&mut self, h: Handle) -> Option<Transaction> {
    self.slab.remove(h)
  }

  /// Close the transaction for `mid` with `endpoint`, if there is one
  pub fn clear_by_mid(&mut self, mid: Id, endpoint: Endpoint) -> Option<Transaction> {
    self.get_by_mid(mid, endpoint).and_then(|h| self.clear(h))
  }

  /// Transactions whose retransmission timer has run out
  pub(crate) fn due(&mut self, now: Millis) -> Vec<Due> {
    self.slab
        .iter_mut()
        .filter_map(|(h, t)| match t.retry.as_mut()?.what_should_i_do(now) {
          | Ok(YouShould::Retry) => Some(Due::Retransmit(h)),
          | Ok(YouShould::Cry) => Some(Due::Expired(h)),
          | Err(nb::Error::WouldBlock) => None,
          | Err(nb::Error::Other(never)) => match never {},
        })
        .collect()
  }
}
