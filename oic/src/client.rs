use oic_msg::{Code, ContentFormat, Id, Message, Token, Type};
use std_alloc::boxed::Box;
use std_alloc::string::{String, ToString};
use std_alloc::vec::Vec;

use crate::discovery::{self, Link};
use crate::net::Endpoint;
use crate::pool::{Handle, Slab};
use crate::req::Method;
use crate::resp::ClientResponse;
use crate::time::{Millis, Timer};

/// Quality of service of a client request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qos {
  /// Sent confirmable; completes when the response (or
  /// retransmission failure) arrives
  High,
  /// Sent non-confirmable; gives up after
  /// [`client_cb_timeout`](crate::config::Config::client_cb_timeout)
  Low,
}

/// Whether a discovery should keep listening for more devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discovery {
  /// Keep delivering links
  Continue,
  /// Stop delivering links and forget the discovery
  Stop,
}

/// What happened to a client request
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
  /// A response (or notification) arrived
  Response(ClientResponse),
  /// No response arrived in time, or the server stopped acknowledging us
  Timeout,
  /// The server rejected the request with a reset
  Reset,
}

/// Handles responses to a request
pub type ResponseHandler = Box<dyn FnMut(ClientEvent)>;

/// Handles links found by a discovery; called with the
/// device id, the link, and who sent it
pub type DiscoveryHandler = Box<dyn FnMut(&str, &Link, Endpoint) -> Discovery>;

pub(crate) enum Handler {
  Response(ResponseHandler),
  Discovery(DiscoveryHandler),
}

impl core::fmt::Debug for Handler {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Handler::Response(_) => f.write_str("Response(..)"),
      | Handler::Discovery(_) => f.write_str("Discovery(..)"),
    }
  }
}

/// A client request awaiting its response
#[derive(Debug)]
pub struct ClientCb {
  uri: String,
  endpoint: Endpoint,
  method: Method,
  token: Token,
  mid: Id,
  qos: Qos,
  observe_seq: Option<u32>,
  created: Millis,
  handler: Handler,
  timer: Timer,
}

impl ClientCb {
  /// Path the request went to
  pub fn uri(&self) -> &str {
    &self.uri
  }

  /// Server the request went to
  pub fn endpoint(&self) -> Endpoint {
    self.endpoint
  }

  /// Request method
  pub fn method(&self) -> Method {
    self.method
  }

  /// Token of the request
  pub fn token(&self) -> Token {
    self.token
  }

  /// Message id of the request
  pub fn mid(&self) -> Id {
    self.mid
  }

  /// Quality of service
  pub fn qos(&self) -> Qos {
    self.qos
  }

  /// Sequence number of the latest notification, for observe requests
  pub fn observe_seq(&self) -> Option<u32> {
    self.observe_seq
  }

  /// When the request was made
  pub fn created(&self) -> Millis {
    self.created
  }

  /// Is this a discovery request?
  pub fn is_discovery(&self) -> bool {
    matches!(self.handler, Handler::Discovery(_))
  }

  fn finish(mut self, event: ClientEvent) {
    if let Handler::Response(ref mut f) = self.handler {
      f(event);
    }
  }
}

/// A pending client request's description, see [`ClientCbs::alloc`]
#[derive(Debug)]
pub(crate) struct NewClientCb<'a> {
  pub(crate) uri: &'a str,
  pub(crate) endpoint: Endpoint,
  pub(crate) method: Method,
  pub(crate) qos: Qos,
  pub(crate) token: Token,
  pub(crate) mid: Id,
  pub(crate) handler: Handler,
}

/// The client request was not made because there are no free slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCallbacksFull;

/// Client requests awaiting responses, matched by token
#[derive(Debug)]
pub struct ClientCbs {
  slab: Slab<ClientCb>,
}

impl ClientCbs {
  /// Create an empty set with room for `capacity` requests
  pub fn new(capacity: usize) -> Self {
    Self { slab: Slab::with_capacity(capacity) }
  }

  /// Number of pending requests
  pub fn len(&self) -> usize {
    self.slab.len()
  }

  /// Are there no pending requests?
  pub fn is_empty(&self) -> bool {
    self.slab.is_empty()
  }

  /// Track a new request.
  ///
  /// Low-QoS and discovery requests are given up on after `timeout`;
  /// high-QoS requests rely on retransmission to detect a dead server.
  pub(crate) fn alloc(&mut self,
                      new: NewClientCb<'_>,
                      now: Millis,
                      timeout: Millis)
                      -> Result<Handle, ClientCallbacksFull> {
    let mut timer = Timer::default();
    if new.qos == Qos::Low || matches!(new.handler, Handler::Discovery(_)) {
      timer.arm(now, timeout);
    }

    self.slab
        .insert(ClientCb { uri: new.uri.to_string(),
                           endpoint: new.endpoint,
                           method: new.method,
                           token: new.token,
                           mid: new.mid,
                           qos: new.qos,
                           observe_seq: None,
                           created: now,
                           handler: new.handler,
                           timer })
        .map_err(|_| ClientCallbacksFull)
  }

  /// Find the pending request to `uri` on `endpoint` using `method`
  pub fn get(&self, uri: &str, endpoint: Endpoint, method: Method) -> Option<&ClientCb> {
    self.slab
        .iter()
        .map(|(_, cb)| cb)
        .find(|cb| cb.uri == uri && cb.endpoint == endpoint && cb.method == method)
  }

  pub(crate) fn find(&self, uri: &str, endpoint: Endpoint, method: Method) -> Option<Handle> {
    self.slab
        .find(|cb| cb.uri == uri && cb.endpoint == endpoint && cb.method == method)
  }

  pub(crate) fn remove(&mut self, h: Handle) -> Option<ClientCb> {
    self.slab.remove(h)
  }

  /// Forget the request sent to `endpoint` with message id `mid`,
  /// telling its handler that it timed out
  pub fn remove_by_mid(&mut self, mid: Id, endpoint: Endpoint) -> usize {
    self.finish_by_mid(mid, endpoint, ClientEvent::Timeout)
  }

  /// Forget the request sent to `endpoint` with message id `mid`
  /// because the server answered it with a reset.
  ///
  /// A reset carries no token, so the message id is all that ties
  /// it to the request.
  pub(crate) fn reset_by_mid(&mut self, mid: Id, endpoint: Endpoint) -> usize {
    self.finish_by_mid(mid, endpoint, ClientEvent::Reset)
  }

  fn finish_by_mid(&mut self, mid: Id, endpoint: Endpoint, event: ClientEvent) -> usize {
    let removed = self.slab
                      .remove_where(|cb| cb.mid == mid && cb.endpoint == endpoint);
    let n = removed.len();
    removed.into_iter().for_each(|cb| {
                         log::debug!(target: "oic::client", "request to {} ended: {:?}", cb.uri, event);
                         cb.finish(event.clone())
                       });
    n
  }

  /// Give up on requests whose timeout passed
  pub(crate) fn expire(&mut self, now: Millis) -> usize {
    let expired = self.slab
                      .iter_mut()
                      .filter_map(|(h, cb)| cb.timer.fire(now).then_some(h))
                      .collect::<Vec<_>>();

    expired.iter()
           .filter_map(|h| self.slab.remove(*h))
           .map(|cb| {
             log::debug!(target: "oic::client", "request to {} timed out", cb.uri);
             cb.finish(ClientEvent::Timeout);
           })
           .count()
  }

  /// Deliver a response to the request it answers.
  ///
  /// Returns whether a pending request matched the response's token.
  pub(crate) fn handle_response(&mut self, msg: &Message, endpoint: Endpoint) -> bool {
    let h = match self.slab.find(|cb| cb.token == msg.token) {
      | Some(h) => h,
      | None => return false,
    };

    let cbor = matches!(msg.opts.content_format, None | Some(ContentFormat::Cbor));
    if !cbor || msg.ty == Type::Reset {
      log::debug!(target: "oic::client",
                  "dropping request {:?}: {}",
                  msg.token,
                  if cbor { "reset" } else { "not cbor" });
      self.slab.remove(h);
      return true;
    }

    let observe = msg.opts.observe;
    let mut separate = false;
    let mut stop = false;

    if let Some(cb) = self.slab.get_mut(h) {
      match cb.handler {
        | Handler::Discovery(ref mut f) if !msg.payload.is_empty() => {
          stop = deliver_links(f, msg.payload(), endpoint) == Discovery::Stop;
        },
        | Handler::Discovery(_) => (),
        | Handler::Response(_) if msg.payload.is_empty()
                                  && msg.ty == Type::Ack
                                  && msg.code == Code::EMPTY =>
        {
          separate = true;
        },
        | Handler::Response(ref mut f) => f(ClientEvent::Response(ClientResponse::new(msg, endpoint))),
      }

      cb.observe_seq = observe;
    }

    let discovery = self.slab.get(h).map(ClientCb::is_discovery).unwrap_or(false);
    if stop || (observe.is_none() && !separate && !discovery) {
      self.slab.remove(h);
    }

    true
  }
}

fn deliver_links(f: &mut DiscoveryHandler, payload: &[u8], endpoint: Endpoint) -> Discovery {
  let devices = match discovery::decode(payload) {
    | Ok(devices) => devices,
    | Err(e) => {
      log::warn!(target: "oic::client", "bad discovery payload: {:?}", e);
      return Discovery::Continue;
    },
  };

  for device in devices.iter() {
    for link in device.links.iter() {
      if f(&device.di, link, endpoint) == Discovery::Stop {
        return Discovery::Stop;
      }
    }
  }

  Discovery::Continue
}
