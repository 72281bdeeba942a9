use oic_msg::{Code, ContentFormat, Id, Message, Token, Type};
use std_alloc::string::{String, ToString};
use std_alloc::vec::Vec;

use crate::net::{Addrd, Endpoint};
use crate::pool::{Handle, Slab};
use crate::resource::{Registry, ResourceId};

/// Initial value of the observe sequence counter
pub const OBSERVE_COUNTER_START: u32 = 3;

/// A client observing a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observer {
  resource: ResourceId,
  endpoint: Endpoint,
  token: Token,
  uri: String,
  last_mid: Option<Id>,
  obs_counter: u32,
}

impl Observer {
  /// The observed resource
  pub fn resource(&self) -> ResourceId {
    self.resource
  }

  /// The observing client
  pub fn endpoint(&self) -> Endpoint {
    self.endpoint
  }

  /// Token of the observe registration
  pub fn token(&self) -> Token {
    self.token
  }

  /// Path of the observed resource
  pub fn uri(&self) -> &str {
    &self.uri
  }

  /// Message id of the most recent notification
  pub fn last_mid(&self) -> Option<Id> {
    self.last_mid
  }

  /// Sequence number of the next notification
  pub fn obs_counter(&self) -> u32 {
    self.obs_counter
  }
}

/// The observer was not added because there are no free slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserversFull;

/// Every observe relationship, across all resources.
///
/// Every removal keeps the observed resource's observer count in step.
#[derive(Debug)]
pub struct Observers {
  slab: Slab<Observer>,
  counter: u32,
}

impl Observers {
  /// Create an empty set with room for `capacity` observers
  pub fn new(capacity: usize) -> Self {
    Self { slab: Slab::with_capacity(capacity),
           counter: OBSERVE_COUNTER_START }
  }

  /// Number of observers
  pub fn len(&self) -> usize {
    self.slab.len()
  }

  /// Are there no observers?
  pub fn is_empty(&self) -> bool {
    self.slab.is_empty()
  }

  /// Iterate over all observers
  pub fn iter(&self) -> impl Iterator<Item = &Observer> {
    self.slab.iter().map(|(_, o)| o)
  }

  /// Register `endpoint` as an observer of `resource`.
  ///
  /// An existing registration by the same endpoint for the same uri
  /// is replaced; the number of replaced registrations is returned.
  pub fn add(&mut self,
             registry: &mut Registry,
             resource: ResourceId,
             endpoint: Endpoint,
             token: Token,
             uri: &str)
             -> Result<usize, ObserversFull> {
    let dups = self.remove_by_uri(registry, endpoint, uri);

    let obs = Observer { resource,
                         endpoint,
                         token,
                         uri: uri.to_string(),
                         last_mid: None,
                         obs_counter: self.counter };

    self.slab.insert(obs).map_err(|_| ObserversFull)?;

    if let Some(res) = registry.get_mut(resource) {
      res.num_observers += 1;
    }

    log::debug!(target: "oic::observe",
                "{:?} now observes {} (replaced {})",
                endpoint.addr,
                uri,
                dups);
    Ok(dups)
  }

  fn remove_where(&mut self, registry: &mut Registry, f: impl FnMut(&Observer) -> bool) -> usize {
    let removed = self.slab.remove_where(f);

    removed.iter().for_each(|obs| {
                    if let Some(res) = registry.get_mut(obs.resource) {
                      res.num_observers = res.num_observers.saturating_sub(1);
                    }
                    log::debug!(target: "oic::observe",
                                "{:?} no longer observes {}",
                                obs.endpoint.addr,
                                obs.uri);
                  });

    removed.len()
  }

  /// Remove every observer registered by `endpoint`
  pub fn remove_by_client(&mut self, registry: &mut Registry, endpoint: Endpoint) -> usize {
    self.remove_where(registry, |o| o.endpoint == endpoint)
  }

  /// Remove the registration `endpoint` made with `token`
  pub fn remove_by_token(&mut self,
                         registry: &mut Registry,
                         endpoint: Endpoint,
                         token: Token)
                         -> usize {
    self.remove_where(registry, |o| o.endpoint == endpoint && o.token == token)
  }

  /// Remove `endpoint`'s registration for `uri`
  pub fn remove_by_uri(&mut self, registry: &mut Registry, endpoint: Endpoint, uri: &str) -> usize {
    self.remove_where(registry, |o| o.endpoint == endpoint && o.uri == uri)
  }

  /// Remove the observer whose latest notification had message id `mid`
  pub fn remove_by_mid(&mut self, registry: &mut Registry, endpoint: Endpoint, mid: Id) -> usize {
    self.remove_where(registry, |o| o.endpoint == endpoint && o.last_mid == Some(mid))
  }

  /// Remove every observer of `resource`
  pub fn remove_by_resource(&mut self, registry: &mut Registry, resource: ResourceId) -> usize {
    self.remove_where(registry, |o| o.resource == resource)
  }

  pub(crate) fn get(&self, h: Handle) -> Option<&Observer> {
    self.slab.get(h)
  }

  /// Observers a notification about `resource` should go to,
  /// optionally narrowed down to a single endpoint
  pub(crate) fn matching(&self, resource: ResourceId, endpoint: Option<Endpoint>) -> Vec<Handle> {
    self.slab.handles_where(|o| {
                o.resource == resource && endpoint.map(|ep| ep == o.endpoint).unwrap_or(true)
              })
  }

  /// Build the notification for one observer, sent with message id `mid`.
  ///
  /// Every `refresh_interval`-th notification to a datagram endpoint
  /// is confirmable. Successful notifications carry the observer's
  /// sequence number (which then advances); error notifications carry 1.
  pub(crate) fn notification(&mut self,
                             h: Handle,
                             mid: Id,
                             code: Code,
                             payload: &[u8],
                             refresh_interval: u32)
                             -> Option<Addrd<Message>> {
    let obs = self.slab.get_mut(h)?;
    obs.last_mid = Some(mid);

    let confirm = !obs.endpoint.is_tcp()
                  && refresh_interval != 0
                  && obs.obs_counter % refresh_interval == 0;
    let ty = if confirm { Type::Con } else { Type::Non };

    let mut msg = Message::new(ty, code, mid, obs.token);
    msg.payload.0 = payload.to_vec();
    msg.opts.content_format = Some(ContentFormat::Cbor);

    if !code.is_error() {
      msg.opts.observe = Some(obs.obs_counter & 0x00FF_FFFF);
      obs.obs_counter = obs.obs_counter.wrapping_add(1);
      self.counter = self.counter.wrapping_add(1);
    } else {
      msg.opts.observe = Some(1);
    }

    Some(Addrd(msg, obs.endpoint))
  }
}
