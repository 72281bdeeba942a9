use core::fmt;

use oic_msg::{Block,
              Code,
              ContentFormat,
              Id,
              Message,
              MessageParseError,
              MessageToBytesError,
              Token,
              TryFromBytes,
              TryIntoBytes,
              Type};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std_alloc::boxed::Box;
use std_alloc::string::String;
use std_alloc::vec::Vec;

use crate::client::{ClientCb,
                    ClientCbs,
                    ClientEvent,
                    Discovery,
                    Handler as ClientHandler,
                    NewClientCb,
                    Qos};
use crate::config::Config;
use crate::discovery::Link;
use crate::dispatch::{dispatch, synthesize_get};
use crate::error::{Error, What, When};
use crate::inbox::Inbox;
use crate::logging::msg_summary;
use crate::net::{Addrd, Endpoint, Socket, Transport};
use crate::observe::Observers;
use crate::pool::Handle;
use crate::req::Method;
use crate::resource::{RegisterError, Registry, Resource, ResourceId};
use crate::resp::{code, ResponseBuilder, Status};
use crate::time::{now_millis, Clock, Millis};
use crate::transaction::{Due, NewTransactionError, Transactions};

/// Something for the event loop to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// A datagram arrived
  Inbound(Addrd<Vec<u8>>),
  /// A resource's state changed and its observers should be notified
  ResourceChanged(ResourceId),
}

/// Traffic counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
  /// Inbound frames processed
  pub iframe: u64,
  /// Inbound frames that could not be parsed
  pub ierr: u64,
  /// Inbound frames dropped for being too large
  pub itoobig: u64,
  /// Allocation failures (full pools and queues)
  pub imem: u64,
  /// Outbound frames sent
  pub oframe: u64,
  /// Outbound frames the socket failed to send
  pub oerr: u64,
}

/// The CoAP engine: a resource server and client sharing one
/// socket, driven by a cooperative event loop.
///
/// Transports push datagrams into the [`Inbox`] (or let
/// [`Engine::poll`] read the socket); [`Engine::run_once`] services
/// due timers (retransmissions, request timeouts, periodic
/// observation) and then handles a single queued event.
///
/// Nothing in the engine blocks except handing a datagram to the socket.
pub struct Engine<C: Clock, S: Socket> {
  config: Config,
  clock: C,
  socket: S,
  inbox: Inbox,
  registry: Registry,
  observers: Observers,
  transactions: Transactions,
  clients: ClientCbs,
  rng: ChaCha8Rng,
  mid: Id,
  stats: Stats,
}

impl<C: Clock, S: Socket> fmt::Debug for Engine<C, S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Engine")
     .field("config", &self.config)
     .field("local_addr", &self.socket.local_addr())
     .field("inbox", &self.inbox)
     .field("registry", &self.registry)
     .field("observers", &self.observers)
     .field("transactions", &self.transactions)
     .field("clients", &self.clients)
     .field("mid", &self.mid)
     .field("stats", &self.stats)
     .finish()
  }
}

fn send<S: Socket>(socket: &S,
                   stats: &mut Stats,
                   dgram: Addrd<&[u8]>,
                   when: When)
                   -> Result<(), Error<S::Error>> {
  match nb::block!(socket.send(dgram)) {
    | Ok(()) => {
      stats.oframe += 1;
      Ok(())
    },
    | Err(e) => {
      stats.oerr += 1;
      log::warn!(target: "oic::engine", "failed to send to {:?}: {:?}", dgram.addr(), e);
      Err(when.what(What::SockError(e)))
    },
  }
}

fn encode(msg: &Message, transport: Transport) -> Result<Vec<u8>, MessageToBytesError> {
  match transport {
    | Transport::Udp => msg.try_into_bytes(),
    | Transport::Tcp => oic_msg::tcp::to_bytes(msg),
  }
}

fn decode(bytes: &[u8], transport: Transport) -> Result<Message, MessageParseError> {
  match transport {
    | Transport::Udp => Message::try_from_bytes(bytes),
    | Transport::Tcp => oic_msg::tcp::from_bytes(bytes),
  }
}

/// Read enough of a datagram that failed to parse to tell whether
/// it was a request, and if so how to address an error response to it.
fn peek_request(bytes: &[u8], transport: Transport) -> Option<(Type, Id, Token)> {
  let b0 = *bytes.first()?;
  let tkl = (b0 & 0x0F) as usize;

  let (ty, mid, code_at) = match transport {
    | Transport::Udp => {
      if b0 >> 6 != 1 || bytes.len() < 4 {
        return None;
      }
      let ty = match (b0 >> 4) & 0b11 {
        | 0 => Type::Con,
        | 1 => Type::Non,
        | _ => return None,
      };
      (ty, Id::from_be_bytes([bytes[2], bytes[3]]), 1)
    },
    | Transport::Tcp => {
      let ext = match b0 >> 4 {
        | 13 => 1,
        | 14 => 2,
        | 15 => 4,
        | _ => 0,
      };
      (Type::Non, Id(0), 1 + ext)
    },
  };

  let code = Code::from(*bytes.get(code_at)?);
  if !code.is_method() {
    return None;
  }

  let token_at = match transport {
    | Transport::Udp => 4,
    | Transport::Tcp => code_at + 1,
  };
  let token = match bytes.get(token_at..token_at + tkl) {
    | Some(token) if tkl <= 8 => Token::from_slice(token),
    | _ => Token::default(),
  };

  Some((ty, mid, token))
}

impl<C: Clock, S: Socket> Engine<C, S> {
  /// Create an engine that talks over `socket`
  pub fn new(config: Config, clock: C, socket: S) -> Self {
    let now = now_millis(&clock).map(|ms| ms.0).unwrap_or(0);
    let mut rng = ChaCha8Rng::seed_from_u64(((config.msg.token_seed as u64) << 48) ^ now);
    let mid = Id(rng.gen());

    Self { inbox: Inbox::new(config.max_queued_events),
           registry: Registry::new(config.max_app_resources),
           observers: Observers::new(config.observe.max_observers),
           transactions: Transactions::new(config.max_transactions),
           clients: ClientCbs::new(config.max_concurrent_requests),
           config,
           clock,
           socket,
           rng,
           mid,
           stats: Stats::default() }
  }

  /// The runtime config
  pub fn config(&self) -> &Config {
    &self.config
  }

  /// A handle to the event queue, for pushing events from other contexts
  pub fn inbox(&self) -> Inbox {
    self.inbox.clone()
  }

  /// The socket
  pub fn socket(&self) -> &S {
    &self.socket
  }

  /// Traffic counters
  pub fn stats(&self) -> Stats {
    self.stats
  }

  /// The hosted resources
  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  /// Observe relationships
  pub fn observers(&self) -> &Observers {
    &self.observers
  }

  /// Open transactions
  pub fn transactions(&self) -> &Transactions {
    &self.transactions
  }

  /// Pending client requests
  pub fn client_cbs(&self) -> &ClientCbs {
    &self.clients
  }

  fn now(&self) -> Result<Millis, Error<S::Error>> {
    now_millis(&self.clock).map_err(|_| When::None.what(What::ClockError))
  }

  fn next_mid(&mut self) -> Id {
    let mid = self.mid;
    self.mid = mid.next();
    mid
  }

  fn new_token(&mut self) -> Token {
    let mut bytes = [0u8; 8];
    self.rng.fill_bytes(&mut bytes);
    Token::from_slice(&bytes)
  }

  /// Host a resource
  pub fn add_resource(&mut self, resource: Resource) -> Result<ResourceId, Error<S::Error>> {
    let uri = String::from(resource.uri());
    match self.registry.register(resource) {
      | Ok(id) => {
        log::debug!(target: "oic::engine", "hosting {}", uri);
        Ok(id)
      },
      | Err(e) => {
        log::warn!(target: "oic::engine", "could not host {}: {:?}", uri, e);
        let what = match e {
          | RegisterError::Full => {
            self.stats.imem += 1;
            What::ResourcesFull
          },
          | e => What::BadResource(e),
        };
        Err(When::None.what(what))
      },
    }
  }

  /// Stop hosting a resource, dropping its observers first
  pub fn delete_resource(&mut self, id: ResourceId) -> Option<Resource> {
    self.observers.remove_by_resource(&mut self.registry, id);
    if let Some(res) = self.registry.get_mut(id) {
      res.timer.cancel();
    }
    self.registry.remove(id)
  }

  /// Send a message outside of any transaction
  fn send_msg(&mut self, msg: Addrd<Message>, when: When) -> Result<(), Error<S::Error>> {
    log::trace!(target: "oic::engine", "-> {:?} {}", msg.addr(), msg_summary(msg.data()));
    let bytes = encode(msg.data(), msg.endpoint().transport).map_err(|e| {
                  log::error!(target: "oic::engine", "failed to serialize: {:?}", e);
                  when.what(What::ToBytes(e))
                })?;
    send(&self.socket,
         &mut self.stats,
         Addrd(bytes.as_slice(), msg.endpoint()),
         when)
  }

  /// Serialize `msg` into transaction `h` and send it.
  ///
  /// The transaction is closed on failure, and after sending unless
  /// it is waiting for an ACK.
  fn send_in_transaction(&mut self, h: Handle, msg: Addrd<Message>) -> Result<(), Error<S::Error>> {
    let Addrd(msg, endpoint) = msg;
    let when = When::SendingMessage(Some(endpoint), msg.id, msg.token);
    log::trace!(target: "oic::engine", "-> {:?} {}", endpoint.addr, msg_summary(&msg));

    let bytes = match encode(&msg, endpoint.transport) {
      | Ok(bytes) => bytes,
      | Err(e) => {
        log::error!(target: "oic::engine", "failed to serialize: {:?}", e);
        self.transactions.clear(h);
        return Err(when.what(What::ToBytes(e)));
      },
    };
    self.transactions.set_message(h, msg.ty, msg.token, bytes);

    let sent = match self.transactions.get(h) {
      | Some(t) => send(&self.socket, &mut self.stats, t.bytes(), when),
      | None => Ok(()),
    };

    if let Err(e) = sent {
      self.transactions.clear(h);
      return Err(e);
    }

    let now = self.now()?;
    self.transactions
        .sent(h, now, self.config.msg.con, &mut self.rng);
    Ok(())
  }

  fn open_transaction(&mut self, mid: Id, endpoint: Endpoint, when: When) -> Result<Handle, Error<S::Error>> {
    self.transactions
        .new_transaction(mid, endpoint)
        .map_err(|e| {
          log::warn!(target: "oic::engine", "no transaction for {:?}: {:?}", mid, e);
          match e {
            | NewTransactionError::Full => {
              self.stats.imem += 1;
              when.what(What::TransactionsFull)
            },
            | NewTransactionError::DuplicateId(id) => when.what(What::DuplicateId(id)),
          }
        })
  }

  /// Read every datagram waiting on the socket into the inbox.
  ///
  /// Returns the number of datagrams queued.
  pub fn poll(&mut self) -> Result<usize, Error<S::Error>> {
    let max = self.config.max_frame_size();
    let mut queued = 0;

    loop {
      let mut buf = Vec::new();
      buf.resize(max + 1, 0u8);

      match self.socket.recv(&mut buf) {
        | Ok(Addrd(n, _)) if n > max => {
          self.stats.itoobig += 1;
          log::warn!(target: "oic::engine", "dropping {} byte datagram", n);
        },
        | Ok(Addrd(n, endpoint)) => {
          buf.truncate(n);
          match self.inbox.push(Event::Inbound(Addrd(buf, endpoint))) {
            | Ok(()) => queued += 1,
            | Err(_) => {
              self.stats.imem += 1;
              log::warn!(target: "oic::engine", "inbox full, dropping datagram from {:?}", endpoint.addr);
            },
          }
        },
        | Err(nb::Error::WouldBlock) => break Ok(queued),
        | Err(nb::Error::Other(e)) => break Err(When::Polling.what(What::SockError(e))),
      }
    }
  }

  /// Service due timers, then handle at most one queued event.
  ///
  /// Returns whether an event was handled. A datagram that fails to
  /// parse is answered (when it was a request) and then surfaced as
  /// [`What::FromBytes`]; the event loop can carry on after it.
  pub fn run_once(&mut self) -> Result<bool, Error<S::Error>> {
    let now = self.now()?;
    self.service_timers(now)?;

    match self.inbox.pop() {
      | Some(Event::Inbound(dgram)) => self.handle_inbound(dgram).map(|_| true),
      | Some(Event::ResourceChanged(id)) => self.notify(id).map(|_| true),
      | None => Ok(false),
    }
  }

  /// Poll the socket and handle events until there is nothing left to do.
  ///
  /// Returns the number of events handled.
  pub fn run_until_idle(&mut self) -> Result<usize, Error<S::Error>> {
    let mut handled = 0;
    loop {
      self.poll()?;
      if !self.run_once()? {
        break Ok(handled);
      }
      handled += 1;
    }
  }

  fn service_timers(&mut self, now: Millis) -> Result<(), Error<S::Error>> {
    for due in self.transactions.due(now) {
      match due {
        | Due::Retransmit(h) => {
          if let Some(t) = self.transactions.get(h) {
            log::debug!(target: "oic::engine", "retransmitting {:?} to {:?}", t.mid(), t.endpoint().addr);
            let when = When::SendingMessage(Some(t.endpoint()), t.mid(), t.token());
            send(&self.socket, &mut self.stats, t.bytes(), when).ok();
          }
        },
        | Due::Expired(h) => {
          if let Some(t) = self.transactions.clear(h) {
            log::debug!(target: "oic::engine",
                        "{:?} to {:?} never acknowledged",
                        t.mid(),
                        t.endpoint().addr);
            self.observers
                .remove_by_client(&mut self.registry, t.endpoint());
            self.clients.remove_by_mid(t.mid(), t.endpoint());
          }
        },
      }
    }

    self.clients.expire(now);

    for id in self.registry.ids() {
      let fired = self.registry
                      .get_mut(id)
                      .map(|res| res.timer.fire(now))
                      .unwrap_or(false);

      if fired && self.notify(id)? > 0 {
        if let Some(res) = self.registry.get_mut(id) {
          let period = res.period();
          res.timer.arm(now, period);
        }
      }
    }

    Ok(())
  }

  fn handle_inbound(&mut self, dgram: Addrd<Vec<u8>>) -> Result<(), Error<S::Error>> {
    self.stats.iframe += 1;
    let Addrd(bytes, endpoint) = dgram;

    let msg = match decode(&bytes, endpoint.transport) {
      | Ok(msg) => msg,
      | Err(e) => {
        self.stats.ierr += 1;
        log::warn!(target: "oic::engine", "bad message from {:?}: {}", endpoint.addr, e);
        self.answer_parse_error(&bytes, endpoint, e)?;
        return Err(When::Polling.what(What::FromBytes(e)));
      },
    };

    log::trace!(target: "oic::engine", "<- {:?} {}", endpoint.addr, msg_summary(&msg));

    if msg.is_request() {
      self.handle_request(msg, endpoint)
    } else {
      self.handle_response(msg, endpoint)
    }
  }

  fn answer_parse_error(&mut self,
                        bytes: &[u8],
                        endpoint: Endpoint,
                        e: MessageParseError)
                        -> Result<(), Error<S::Error>> {
    let (ty, mid, token) = match peek_request(bytes, endpoint.transport) {
      | Some(req) => req,
      | None => return Ok(()),
    };

    let (ty, mid) = match ty {
      | Type::Con => (Type::Ack, mid),
      | _ => (Type::Non, self.next_mid()),
    };

    let msg = Message::new(ty, e.code(), mid, token);
    self.send_msg(Addrd(msg, endpoint), When::HandlingRequest(mid))
  }

  fn handle_request(&mut self, req: Message, endpoint: Endpoint) -> Result<(), Error<S::Error>> {
    let when = When::HandlingRequest(req.id);

    let h = match self.open_transaction(req.id, endpoint, when) {
      | Ok(h) => h,
      | Err(_) => {
        let rst = Message::new(Type::Reset, code::SERVICE_UNAVAILABLE, req.id, Token::default());
        return self.send_msg(Addrd(rst, endpoint), when);
      },
    };

    let (ty, mid) = match req.ty {
      | Type::Con => (Type::Ack, req.id),
      | _ => (Type::Non, self.next_mid()),
    };

    let routed = dispatch(&mut self.registry, self.config.device_id, &req, Some(endpoint));
    let status = routed.status();

    if status == Status::Ignore {
      log::debug!(target: "oic::engine", "not answering {:?}", req.id);
      self.transactions.clear(h);
      return Ok(());
    }

    let mut resp = Message::new(ty,
                                status.code().unwrap_or(code::INTERNAL_SERVER_ERROR),
                                mid,
                                req.token);

    if let Some(id) = routed.resource {
      if routed.method == Method::Get && !status.is_error() {
        resp.opts.observe = match self.observe_request(&req, endpoint, id) {
          | Ok(observe) => observe,
          | Err(e) => {
            log::warn!(target: "oic::engine", "not observing /{}: {:?}", req.opts.path(), e.what);
            None
          },
        };
      }
    }

    let (_, payload, block1, chunked) = routed.response.into_parts();
    self.fill_payload(&req, &mut resp, payload, block1, chunked);

    let sent = self.send_in_transaction(h, Addrd(resp, endpoint));

    let changed = matches!(routed.method, Method::Put | Method::Post) && !status.is_error();
    if let (true, Some(id)) = (changed, routed.resource) {
      self.notify(id)?;
    }

    sent
  }

  /// Act on the Observe option of a successful GET, yielding the
  /// Observe option of the response
  fn observe_request(&mut self,
                     req: &Message,
                     endpoint: Endpoint,
                     id: ResourceId)
                     -> Result<Option<u32>, Error<S::Error>> {
    let (observable, periodic, period) = match self.registry.get(id) {
      | Some(res) => (res.is_observable(), res.is_periodic(), res.period()),
      | None => return Ok(None),
    };

    match req.opts.observe {
      | Some(0) if observable => {
        match self.observers
                  .add(&mut self.registry, id, endpoint, req.token, req.opts.path())
        {
          | Ok(_) => {
            if periodic {
              let now = self.now()?;
              if let Some(res) = self.registry.get_mut(id) {
                res.timer.arm(now, period);
              }
            }
            Ok(Some(0))
          },
          | Err(_) => {
            self.stats.imem += 1;
            Err(When::HandlingRequest(req.id).what(What::ObserversFull))
          },
        }
      },
      | Some(1) if observable => {
        let removed = self.observers
                          .remove_by_token(&mut self.registry, endpoint, req.token);
        if removed > 0 && periodic {
          if let Some(res) = self.registry.get_mut(id) {
            res.timer.cancel();
          }
        }
        Ok(None)
      },
      | _ => Ok(None),
    }
  }

  /// Place the handler's payload in the response, applying block-wise transfer rules
  fn fill_payload(&self,
                  req: &Message,
                  resp: &mut Message,
                  mut payload: Vec<u8>,
                  block1: Option<Block>,
                  chunked: Option<bool>) {
    let max_block = self.config.max_block_size;

    if !payload.is_empty() {
      resp.opts.content_format = Some(ContentFormat::Cbor);
    }

    if req.opts.block1.is_some() && !resp.code.is_error() && block1.is_none() {
      log::debug!(target: "oic::engine", "Block1 not supported by /{}", req.opts.path());
      resp.code = code::NOT_IMPLEMENTED;
      resp.opts.content_format = None;
      resp.payload.0 = b"NoBlock1Support".to_vec();
      return;
    }

    resp.opts.block1 = block1;

    if resp.code.class != 2 {
      resp.payload.0 = payload;
      return;
    }

    match (req.opts.block2, chunked) {
      | (Some(requested), None) => {
        let size = requested.size().min(max_block);
        let offset = requested.offset() as usize;

        if offset >= payload.len() {
          resp.code = code::BAD_OPTION;
          resp.opts.content_format = None;
          payload = b"BlockOutOfScope".to_vec();
        } else {
          let remaining = payload.len() - offset;
          let len = remaining.min(size as usize);
          resp.opts.block2 = Some(Block::new(size, requested.num(), remaining > size as usize));
          payload = payload[offset..offset + len].to_vec();
        }
      },
      | (Some(requested), Some(more)) => {
        let size = requested.size().min(max_block);
        let more = more || payload.len() > size as usize;
        resp.opts.block2 = Some(Block::new(size, requested.num(), more));
        payload.truncate(size as usize);
      },
      | (None, Some(more)) => {
        resp.opts.block2 = Some(Block::new(max_block, 0, more));
        payload.truncate(max_block as usize);
      },
      | (None, None) if payload.len() > self.config.max_payload_size => {
        resp.opts.block2 = Some(Block::new(max_block, 0, true));
        payload.truncate(max_block as usize);
      },
      | (None, None) => (),
    }

    resp.payload.0 = payload;
  }

  fn handle_response(&mut self, msg: Message, endpoint: Endpoint) -> Result<(), Error<S::Error>> {
    if self.transactions.clear_by_mid(msg.id, endpoint).is_some() {
      log::debug!(target: "oic::engine", "{:?} acknowledged", msg.id);
    }

    let ack = match msg.ty {
      | Type::Con => Some(Message::ack(msg.id)),
      | Type::Reset => {
        self.observers
            .remove_by_mid(&mut self.registry, endpoint, msg.id);
        self.clients.reset_by_mid(msg.id, endpoint);
        return Ok(());
      },
      | _ => None,
    };

    if !self.clients.handle_response(&msg, endpoint) {
      log::trace!(target: "oic::engine", "no request matches token {:?}", msg.token);
    }

    match ack {
      | Some(ack) => self.send_msg(Addrd(ack, endpoint), When::None),
      | None => Ok(()),
    }
  }

  /// Notify the observers of a resource that its state changed.
  ///
  /// The notification is produced by the resource's GET handler.
  /// Returns the resource's number of observers.
  pub fn notify(&mut self, id: ResourceId) -> Result<usize, Error<S::Error>> {
    self.notify_with(id, None, None)
  }

  /// Notify the observers of a resource, optionally with a response
  /// produced elsewhere and optionally only those at `endpoint`.
  ///
  /// Returns the resource's number of observers.
  pub fn notify_with(&mut self,
                     id: ResourceId,
                     response: Option<ResponseBuilder>,
                     endpoint: Option<Endpoint>)
                     -> Result<usize, Error<S::Error>> {
    let num_observers = self.registry
                            .get(id)
                            .map(Resource::num_observers)
                            .unwrap_or(0);
    if num_observers == 0 {
      return Ok(0);
    }

    let response = match response {
      | Some(r) => r,
      | None => match synthesize_get(&mut self.registry, self.config.device_id, id) {
        | Some(r) => r,
        | None => return Ok(num_observers),
      },
    };

    let status = response.status().unwrap_or(Status::InternalServerError);
    let code = match status.code() {
      | Some(code) => code,
      | None => return Ok(num_observers),
    };

    for h in self.observers.matching(id, endpoint) {
      let to = match self.observers.get(h) {
        | Some(obs) => obs.endpoint(),
        | None => continue,
      };

      let mid = self.next_mid();
      let th = match self.open_transaction(mid, to, When::Notifying) {
        | Ok(th) => th,
        | Err(_) => continue,
      };

      let refresh = self.config.observe.refresh_interval;
      if let Some(msg) = self.observers
                             .notification(h, mid, code, response.payload(), refresh)
      {
        if let Err(e) = self.send_in_transaction(th, msg) {
          log::warn!(target: "oic::observe", "notification to {:?} failed: {:?}", to.addr, e.what);
        }
      } else {
        self.transactions.clear(th);
      }
    }

    Ok(self.registry
           .get(id)
           .map(Resource::num_observers)
           .unwrap_or(0))
  }

  #[allow(clippy::too_many_arguments)]
  fn request(&mut self,
             method: Method,
             endpoint: Endpoint,
             uri: &str,
             query: Option<&str>,
             payload: Option<Vec<u8>>,
             observe: Option<u32>,
             qos: Qos,
             handler: ClientHandler)
             -> Result<Token, Error<S::Error>> {
    let now = self.now()?;
    let mid = self.next_mid();
    let token = self.new_token();
    let when = When::SendingMessage(Some(endpoint), mid, token);

    let cb = self.clients
                 .alloc(NewClientCb { uri,
                                      endpoint,
                                      method,
                                      qos,
                                      token,
                                      mid,
                                      handler },
                        now,
                        self.config.client_cb_timeout)
                 .map_err(|_| {
                   self.stats.imem += 1;
                   when.what(What::ClientCallbacksFull)
                 })?;

    let ty = match qos {
      | Qos::High => Type::Con,
      | Qos::Low => Type::Non,
    };
    let mut msg = Message::new(ty, method.code(), mid, token);
    msg.opts.set_path(uri);
    msg.opts.uri_query = query.filter(|q| !q.is_empty()).map(Into::into);
    msg.opts.observe = observe;
    if let Some(payload) = payload.filter(|p| !p.is_empty()) {
      msg.opts.content_format = Some(ContentFormat::Cbor);
      msg.payload.0 = payload;
    }

    let sent = self.open_transaction(mid, endpoint, when)
                   .and_then(|th| self.send_in_transaction(th, Addrd(msg, endpoint)));

    match sent {
      | Ok(()) => Ok(token),
      | Err(e) => {
        self.clients.remove(cb);
        Err(e)
      },
    }
  }

  /// GET `uri` from a server
  pub fn get<F>(&mut self,
                endpoint: Endpoint,
                uri: &str,
                query: Option<&str>,
                qos: Qos,
                handler: F)
                -> Result<Token, Error<S::Error>>
    where F: FnMut(ClientEvent) + 'static
  {
    self.request(Method::Get,
                 endpoint,
                 uri,
                 query,
                 None,
                 None,
                 qos,
                 ClientHandler::Response(Box::new(handler)))
  }

  /// DELETE `uri` on a server
  pub fn delete<F>(&mut self,
                   endpoint: Endpoint,
                   uri: &str,
                   query: Option<&str>,
                   qos: Qos,
                   handler: F)
                   -> Result<Token, Error<S::Error>>
    where F: FnMut(ClientEvent) + 'static
  {
    self.request(Method::Delete,
                 endpoint,
                 uri,
                 query,
                 None,
                 None,
                 qos,
                 ClientHandler::Response(Box::new(handler)))
  }

  /// PUT a CBOR payload to `uri` on a server
  pub fn put<F>(&mut self,
                endpoint: Endpoint,
                uri: &str,
                query: Option<&str>,
                payload: impl Into<Vec<u8>>,
                qos: Qos,
                handler: F)
                -> Result<Token, Error<S::Error>>
    where F: FnMut(ClientEvent) + 'static
  {
    self.request(Method::Put,
                 endpoint,
                 uri,
                 query,
                 Some(payload.into()),
                 None,
                 qos,
                 ClientHandler::Response(Box::new(handler)))
  }

  /// POST a CBOR payload to `uri` on a server
  pub fn post<F>(&mut self,
                 endpoint: Endpoint,
                 uri: &str,
                 query: Option<&str>,
                 payload: impl Into<Vec<u8>>,
                 qos: Qos,
                 handler: F)
                 -> Result<Token, Error<S::Error>>
    where F: FnMut(ClientEvent) + 'static
  {
    self.request(Method::Post,
                 endpoint,
                 uri,
                 query,
                 Some(payload.into()),
                 None,
                 qos,
                 ClientHandler::Response(Box::new(handler)))
  }

  /// Observe `uri` on a server; `handler` gets the first response
  /// and every notification after it
  pub fn observe<F>(&mut self,
                    endpoint: Endpoint,
                    uri: &str,
                    query: Option<&str>,
                    qos: Qos,
                    handler: F)
                    -> Result<Token, Error<S::Error>>
    where F: FnMut(ClientEvent) + 'static
  {
    self.request(Method::Get,
                 endpoint,
                 uri,
                 query,
                 None,
                 Some(0),
                 qos,
                 ClientHandler::Response(Box::new(handler)))
  }

  /// Stop observing `uri` on a server.
  ///
  /// Sends a deregistration (GET with Observe=1) using the token of
  /// the observation and forgets it. Returns `false` if `uri` was
  /// not being observed.
  pub fn stop_observe(&mut self, endpoint: Endpoint, uri: &str) -> Result<bool, Error<S::Error>> {
    let cb = match self.clients
                       .find(uri, endpoint, Method::Get)
                       .and_then(|h| self.clients.remove(h))
    {
      | Some(cb) => cb,
      | None => return Ok(false),
    };

    let ty = match cb.qos() {
      | Qos::High => Type::Con,
      | Qos::Low => Type::Non,
    };

    let mid = self.next_mid();
    let mut msg = Message::new(ty, Code::GET, mid, cb.token());
    msg.opts.set_path(uri);
    msg.opts.observe = Some(1);

    let when = When::SendingMessage(Some(endpoint), mid, cb.token());
    let th = self.open_transaction(mid, endpoint, when)?;
    self.send_in_transaction(th, Addrd(msg, endpoint))
        .map(|_| true)
  }

  /// Multicast a discovery request to all CoAP devices on the local network.
  ///
  /// `handler` is given each discovered link, until it returns
  /// [`Discovery::Stop`] or
  /// [`client_cb_timeout`](crate::config::Config::client_cb_timeout) passes.
  pub fn discover<F>(&mut self, rt: Option<&str>, handler: F) -> Result<Token, Error<S::Error>>
    where F: FnMut(&str, &Link, Endpoint) -> Discovery + 'static
  {
    let endpoint = Endpoint::udp(crate::multicast::all_coap_devices(crate::multicast::PORT));
    let mut query = String::new();
    if let Some(rt) = rt {
      query.push_str("rt=");
      query.push_str(rt);
    }

    self.request(Method::Get,
                 endpoint,
                 "/oic/res",
                 Some(query.as_str()),
                 None,
                 None,
                 Qos::Low,
                 ClientHandler::Discovery(Box::new(handler)))
  }

  /// Find a pending request to `uri` on `endpoint` using `method`
  pub fn get_client_cb(&self, uri: &str, endpoint: Endpoint, method: Method) -> Option<&ClientCb> {
    self.clients.get(uri, endpoint, method)
  }
}

#[cfg(test)]
mod tests {
  use core::cell::{Cell, RefCell};

  use embedded_time::duration::Milliseconds;
  use oic_msg::{Code, Id, Token, TryFromBytes, TryIntoBytes, Type};
  use std_alloc::rc::Rc;

  use super::*;
  use crate::resource::{Interface, Properties};
  use crate::test::{ClockMock, SockMock};

  type TestEngine = Engine<ClockMock, SockMock>;

  fn client() -> Endpoint {
    Endpoint::udp("192.168.0.2:5683".parse().unwrap())
  }

  fn engine(config: Config) -> TestEngine {
    crate::test::init_logging();
    Engine::new(config, ClockMock::new(), SockMock::new())
  }

  fn req(ty: Type, code: Code, mid: u16, path: &str) -> Message {
    let mut msg = Message::new(ty, code, Id(mid), Token::from_slice(&[0xAB, mid as u8]));
    msg.opts.set_path(path);
    msg
  }

  fn deliver(engine: &mut TestEngine, msg: Message) {
    deliver_from(engine, msg, client());
  }

  fn deliver_from(engine: &mut TestEngine, msg: Message, from: Endpoint) {
    engine.socket()
          .rx
          .lock()
          .unwrap()
          .push(Addrd(msg.try_into_bytes().unwrap(), from));
    engine.run_until_idle().unwrap();
  }

  fn sent(engine: &TestEngine) -> Vec<Message> {
    engine.socket()
          .tx
          .lock()
          .unwrap()
          .drain(..)
          .map(|Addrd(bytes, _)| Message::try_from_bytes(bytes).unwrap())
          .collect()
  }

  fn led(gets: Rc<Cell<usize>>, state: Rc<Cell<bool>>) -> Resource {
    let read = state.clone();
    Resource::new("/led/1").with_default_interface(Interface::Baseline)
                           .with_properties(Properties::DISCOVERABLE | Properties::OBSERVABLE)
                           .with_handler(Method::Get, move |_, _, resp| {
                             gets.set(gets.get() + 1);
                             resp.set_rep(&read.get()).unwrap();
                             resp.set_status(Status::Ok);
                           })
                           .with_handler(Method::Put, move |req, _, resp| {
                             state.set(req.rep().unwrap());
                             resp.set_status(Status::Changed);
                           })
  }

  #[test]
  fn dispatch_scenario() {
    let gets = Rc::new(Cell::new(0));
    let mut engine = engine(Config::default());
    engine.add_resource(led(gets.clone(), Default::default()))
          .unwrap();

    deliver(&mut engine, req(Type::Con, Code::GET, 1, "led/1"));
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.ty, Type::Ack);
    assert_eq!(resp.id, Id(1));
    assert_eq!(resp.token, Token::from_slice(&[0xAB, 1]));
    assert_eq!(resp.code, code::CONTENT);
    assert_eq!(resp.opts.content_format, Some(ContentFormat::Cbor));
    assert_eq!(resp.payload(), &[0xF4]);
    assert_eq!(gets.get(), 1);

    deliver(&mut engine, req(Type::Con, Code::DELETE, 2, "led/1"));
    assert_eq!(sent(&engine)[0].code, code::METHOD_NOT_ALLOWED);

    deliver(&mut engine, req(Type::Non, Code::GET, 3, "led/2"));
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.code, code::NOT_FOUND);
    assert_eq!(resp.ty, Type::Non);

    assert_eq!(gets.get(), 1);
    assert!(engine.transactions().is_empty());
    assert_eq!(engine.stats().iframe, 3);
    assert_eq!(engine.stats().oframe, 3);
  }

  #[test]
  fn observe_lifecycle() {
    let state = Rc::new(Cell::new(false));
    let mut engine = engine(Config::default());
    let id = engine.add_resource(led(Default::default(), state.clone()))
                   .unwrap();

    let mut register = req(Type::Con, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register.clone());

    let resp = sent(&engine).remove(0);
    assert_eq!(resp.opts.observe, Some(0));
    assert_eq!(engine.registry().get(id).unwrap().num_observers(), 1);

    let mut put = req(Type::Con, Code::PUT, 2, "led/1");
    put.payload.0 = [0xF5].to_vec();
    deliver(&mut engine, put);

    let out = sent(&engine);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].code, code::CHANGED);
    let notification = &out[1];
    assert_eq!(notification.token, register.token);
    assert_eq!(notification.opts.observe, Some(3));
    assert_eq!(notification.ty, Type::Non);
    assert_eq!(notification.payload(), &[0xF5]);
    assert!(state.get());

    let mut deregister = req(Type::Con, Code::GET, 3, "led/1");
    deregister.token = register.token;
    deregister.opts.observe = Some(1);
    deliver(&mut engine, deregister);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.opts.observe, None);
    assert!(engine.observers().is_empty());

    let mut put = req(Type::Con, Code::PUT, 4, "led/1");
    put.payload.0 = [0xF4].to_vec();
    deliver(&mut engine, put);
    assert_eq!(sent(&engine).len(), 1);
  }

  #[test]
  fn reset_cancels_observation() {
    let mut engine = engine(Config::default());
    let id = engine.add_resource(led(Default::default(), Default::default()))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register);
    sent(&engine);

    engine.notify(id).unwrap();
    let notification = sent(&engine).remove(0);

    deliver(&mut engine, Message::rst(notification.id));
    assert!(engine.observers().is_empty());
    assert_eq!(engine.notify(id).unwrap(), 0);
  }

  #[test]
  fn unacked_notification_drops_observer() {
    let mut config = Config::default();
    config.observe.refresh_interval = 1;
    config.msg.con.retry_strategy = crate::retry::Strategy::Exponential { init_min: Milliseconds(2_000),
                                                                          init_max: Milliseconds(2_000) };
    let mut engine = engine(config);
    let id = engine.add_resource(led(Default::default(), Default::default()))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register);
    sent(&engine);

    engine.inbox().push(Event::ResourceChanged(id)).unwrap();
    engine.run_until_idle().unwrap();
    let notification = sent(&engine).remove(0);
    assert_eq!(notification.ty, Type::Con);
    assert_eq!(engine.transactions().len(), 1);

    let mut retransmits = 0;
    for ms in (0..=62_000u64).step_by(1_000) {
      engine.clock.set(ms);
      engine.run_until_idle().unwrap();
      let out = sent(&engine);
      assert!(out.iter().all(|m| m.id == notification.id));
      retransmits += out.len();
    }

    assert_eq!(retransmits, 4);
    assert!(engine.transactions().is_empty());
    assert!(engine.observers().is_empty());
    assert_eq!(engine.registry().get(id).unwrap().num_observers(), 0);
  }

  #[test]
  fn ack_closes_transaction() {
    let mut config = Config::default();
    config.observe.refresh_interval = 1;
    let mut engine = engine(config);
    let id = engine.add_resource(led(Default::default(), Default::default()))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register);
    sent(&engine);

    engine.notify(id).unwrap();
    let notification = sent(&engine).remove(0);
    assert_eq!(engine.transactions().len(), 1);

    deliver(&mut engine, Message::ack(notification.id));
    assert!(engine.transactions().is_empty());
    assert_eq!(engine.observers().len(), 1);
  }

  #[test]
  fn block2() {
    let mut engine = engine(Config::default());
    engine.add_resource(Resource::new("big").with_handler(Method::Get, |_, _, resp| {
                                               resp.set_payload([7u8; 40].to_vec())
                                                   .set_status(Status::Ok);
                                             }))
          .unwrap();

    let mut get = req(Type::Con, Code::GET, 1, "big");
    get.opts.block2 = Some(Block::new(16, 2, false));
    deliver(&mut engine, get);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.opts.block2, Some(Block::new(16, 2, false)));
    assert_eq!(resp.payload(), &[7u8; 8]);

    let mut get = req(Type::Con, Code::GET, 2, "big");
    get.opts.block2 = Some(Block::new(16, 0, false));
    deliver(&mut engine, get);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.opts.block2, Some(Block::new(16, 0, true)));
    assert_eq!(resp.payload().len(), 16);

    let mut get = req(Type::Con, Code::GET, 3, "big");
    get.opts.block2 = Some(Block::new(16, 3, false));
    deliver(&mut engine, get);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.code, code::BAD_OPTION);
    assert_eq!(resp.payload(), b"BlockOutOfScope");
  }

  #[test]
  fn block2_leaves_error_responses_alone() {
    let mut engine = engine(Config::default());
    engine.add_resource(led(Default::default(), Default::default()))
          .unwrap();

    let mut get = req(Type::Con, Code::GET, 1, "missing");
    get.opts.block2 = Some(Block::new(64, 0, false));
    deliver(&mut engine, get);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.code, code::NOT_FOUND);
    assert_eq!(resp.opts.block2, None);

    let mut post = req(Type::Con, Code::POST, 2, "led/1");
    post.opts.block2 = Some(Block::new(16, 4, false));
    deliver(&mut engine, post);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.code.class, 4);
    assert_eq!(resp.opts.block2, None);
    assert_ne!(resp.payload(), b"BlockOutOfScope");
  }

  #[test]
  fn large_payload_is_split() {
    let mut config = Config::default();
    config.max_payload_size = 32;
    config.max_block_size = 16;
    let mut engine = engine(config);
    engine.add_resource(Resource::new("big").with_handler(Method::Get, |_, _, resp| {
                                               resp.set_payload([7u8; 40].to_vec())
                                                   .set_status(Status::Ok);
                                             }))
          .unwrap();

    deliver(&mut engine, req(Type::Con, Code::GET, 1, "big"));
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.opts.block2, Some(Block::new(16, 0, true)));
    assert_eq!(resp.payload().len(), 16);
  }

  #[test]
  fn block1_without_support() {
    let mut engine = engine(Config::default());
    engine.add_resource(Resource::new("up").with_handler(Method::Post, |_, _, resp| {
                                              resp.set_status(Status::Changed);
                                            }))
          .unwrap();

    let mut post = req(Type::Con, Code::POST, 1, "up");
    post.opts.block1 = Some(Block::new(16, 0, true));
    post.payload.0 = [1u8; 16].to_vec();
    deliver(&mut engine, post);

    let resp = sent(&engine).remove(0);
    assert_eq!(resp.code, code::NOT_IMPLEMENTED);
    assert_eq!(resp.payload(), b"NoBlock1Support");
  }

  #[test]
  fn ignored_request_gets_no_reply() {
    let mut engine = engine(Config::default());
    engine.add_resource(Resource::new("slow").with_handler(Method::Get, |_, _, resp| {
                                                resp.set_status(Status::Ignore);
                                              }))
          .unwrap();

    deliver(&mut engine, req(Type::Con, Code::GET, 1, "slow"));
    assert!(sent(&engine).is_empty());
    assert!(engine.transactions().is_empty());
  }

  #[test]
  fn transaction_pool_exhausted() {
    let mut config = Config::default();
    config.max_transactions = 1;
    config.observe.refresh_interval = 1;
    let mut engine = engine(config);
    let id = engine.add_resource(led(Default::default(), Default::default()))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register);
    sent(&engine);

    // a CON notification occupies the only slot
    engine.notify(id).unwrap();
    sent(&engine);

    deliver(&mut engine, req(Type::Con, Code::GET, 9, "led/1"));
    let rst = sent(&engine).remove(0);
    assert_eq!(rst.ty, Type::Reset);
    assert_eq!(rst.code, code::SERVICE_UNAVAILABLE);
    assert_eq!(rst.id, Id(9));
    assert_eq!(engine.stats().imem, 1);
  }

  #[test]
  fn message_ids_are_scoped_to_the_peer() {
    let other = Endpoint::udp("192.168.0.3:5683".parse().unwrap());
    let mut config = Config::default();
    config.observe.refresh_interval = 1;
    let mut engine = engine(config);
    let id = engine.add_resource(led(Default::default(), Default::default()))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register);
    sent(&engine);

    engine.notify(id).unwrap();
    let notification = sent(&engine).remove(0);
    assert_eq!(notification.ty, Type::Con);

    deliver_from(&mut engine, req(Type::Con, Code::GET, notification.id.0, "led/1"), other);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.ty, Type::Ack);
    assert_eq!(resp.code, code::CONTENT);
    assert_eq!(resp.id, notification.id);

    deliver_from(&mut engine, Message::ack(notification.id), other);
    assert_eq!(engine.transactions().len(), 1);

    deliver(&mut engine, Message::ack(notification.id));
    assert!(engine.transactions().is_empty());
  }

  #[test]
  fn observers_full() {
    let other = Endpoint::udp("192.168.0.3:5683".parse().unwrap());
    let mut config = Config::default();
    config.observe.max_observers = 1;
    let mut engine = engine(config);
    let id = engine.add_resource(led(Default::default(), Default::default()))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register.clone());
    assert_eq!(sent(&engine).remove(0).opts.observe, Some(0));

    deliver_from(&mut engine, register, other);
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.code, code::CONTENT);
    assert_eq!(resp.opts.observe, None);
    assert_eq!(engine.registry().get(id).unwrap().num_observers(), 1);
    assert_eq!(engine.stats().imem, 1);
  }

  #[test]
  fn resources_full() {
    let mut config = Config::default();
    config.max_app_resources = 1;
    let mut engine = engine(config);
    engine.add_resource(led(Default::default(), Default::default()))
          .unwrap();

    let err = engine.add_resource(Resource::new("/led/2").with_handler(Method::Get, |_, _, _| ()))
                    .unwrap_err();
    assert_eq!(err.what, What::ResourcesFull);
    assert!(err.is_exhaustion());

    let err = engine.add_resource(Resource::new("/led/3")).unwrap_err();
    assert_eq!(err.what, What::BadResource(RegisterError::NoHandlers));
    assert!(!err.is_exhaustion());
  }

  #[test]
  fn parse_errors() {
    let mut engine = engine(Config::default());

    // CON GET with an unknown critical option (9)
    let bytes = [0b0100_0001u8, 0x01, 0x00, 0x05, 0xAA, 0b1001_0000];
    engine.socket()
          .rx
          .lock()
          .unwrap()
          .push(Addrd(bytes.to_vec(), client()));
    let err = engine.run_until_idle().unwrap_err();
    assert_eq!(err.message_parse_error().map(MessageParseError::code),
               Some(code::BAD_OPTION));
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.ty, Type::Ack);
    assert_eq!(resp.id, Id(5));
    assert_eq!(resp.code, code::BAD_OPTION);
    assert_eq!(resp.token, Token::from_slice(&[0xAA]));

    // token length 9
    let bytes = [0b0101_1001u8, 0x01, 0x00, 0x06];
    engine.socket()
          .rx
          .lock()
          .unwrap()
          .push(Addrd(bytes.to_vec(), client()));
    assert!(engine.run_until_idle().is_err());
    let resp = sent(&engine).remove(0);
    assert_eq!(resp.ty, Type::Non);
    assert_eq!(resp.code, code::BAD_REQUEST);

    // a malformed response is dropped
    let bytes = [0b0110_0000u8, 0x45, 0x00, 0x07, 0xFF];
    engine.socket()
          .rx
          .lock()
          .unwrap()
          .push(Addrd(bytes.to_vec(), client()));
    let err = engine.run_until_idle().unwrap_err();
    assert!(err.message_parse_error().is_some());
    assert_eq!(err.when, When::Polling);
    assert!(sent(&engine).is_empty());
    assert_eq!(engine.stats().ierr, 3);

    // the next datagram is handled as usual
    deliver(&mut engine, Message::ack(Id(8)));
    assert_eq!(engine.stats().ierr, 3);
  }

  #[test]
  fn oversized_datagram_is_dropped() {
    let mut config = Config::default();
    config.max_payload_size = 8;
    let mut engine = engine(config);

    let mut get = req(Type::Con, Code::GET, 1, "x");
    get.payload.0 = [0u8; 300].to_vec();
    deliver(&mut engine, get);

    assert_eq!(engine.stats().itoobig, 1);
    assert_eq!(engine.stats().iframe, 0);
    assert!(sent(&engine).is_empty());
  }

  #[test]
  fn con_response_from_server_is_acked() {
    let mut engine = engine(Config::default());
    let msg = Message::new(Type::Con, Code::new(2, 5), Id(77), Token::from_slice(&[1]));
    deliver(&mut engine, msg);

    let ack = sent(&engine).remove(0);
    assert_eq!(ack.ty, Type::Ack);
    assert_eq!(ack.code, Code::EMPTY);
    assert_eq!(ack.id, Id(77));
  }

  #[test]
  fn client_get() {
    let mut engine = engine(Config::default());
    let events: Rc<RefCell<Vec<ClientEvent>>> = Default::default();
    let sink = events.clone();

    let token = engine.get(client(), "/led/1", Some("if=oic.if.r"), Qos::High, move |e| {
                        sink.borrow_mut().push(e)
                      })
                      .unwrap();

    let request = sent(&engine).remove(0);
    assert_eq!(request.ty, Type::Con);
    assert_eq!(request.code, Code::GET);
    assert_eq!(request.token, token);
    assert_eq!(request.token.len(), 8);
    assert_eq!(request.opts.path(), "led/1");
    assert_eq!(request.opts.query(), "if=oic.if.r");
    assert!(engine.get_client_cb("/led/1", client(), Method::Get).is_some());

    let mut resp = Message::new(Type::Ack, Code::new(2, 5), request.id, token);
    resp.payload.0 = [0xF5].to_vec();
    deliver(&mut engine, resp);

    assert!(engine.transactions().is_empty());
    assert!(engine.get_client_cb("/led/1", client(), Method::Get).is_none());
    let events = events.borrow();
    match &events[0] {
      | ClientEvent::Response(r) => assert_eq!(r.rep::<bool>(), Ok(true)),
      | e => panic!("{:?}", e),
    };
  }

  #[test]
  fn client_request_times_out_when_never_acked() {
    let mut config = Config::default();
    config.msg.con.retry_strategy = crate::retry::Strategy::Delay { min: Milliseconds(100),
                                                                    max: Milliseconds(100) };
    let mut engine = engine(config);
    let events: Rc<RefCell<Vec<ClientEvent>>> = Default::default();
    let sink = events.clone();

    engine.put(client(), "/led/1", None, [0xF5], Qos::High, move |e| sink.borrow_mut().push(e))
          .unwrap();

    for ms in (0..=1_000u64).step_by(50) {
      engine.clock.set(ms);
      engine.run_until_idle().unwrap();
    }

    assert_eq!(sent(&engine).len(), 5);
    assert_eq!(events.borrow().as_slice(), &[ClientEvent::Timeout]);
    assert!(engine.client_cbs().is_empty());
  }

  #[test]
  fn reset_ends_client_request() {
    let mut engine = engine(Config::default());
    let events: Rc<RefCell<Vec<ClientEvent>>> = Default::default();
    let sink = events.clone();

    engine.get(client(), "/led/1", None, Qos::High, move |e| sink.borrow_mut().push(e))
          .unwrap();
    let request = sent(&engine).remove(0);

    deliver(&mut engine, Message::rst(request.id));
    assert!(engine.transactions().is_empty());
    assert!(engine.client_cbs().is_empty());
    assert_eq!(events.borrow().as_slice(), &[ClientEvent::Reset]);

    engine.clock.set(200_000);
    engine.run_until_idle().unwrap();
    assert_eq!(events.borrow().len(), 1);
    assert!(sent(&engine).is_empty());
  }

  #[test]
  fn observe_then_stop() {
    let mut engine = engine(Config::default());
    let token = engine.observe(client(), "/led/1", None, Qos::Low, |_| ())
                      .unwrap();
    let request = sent(&engine).remove(0);
    assert_eq!(request.opts.observe, Some(0));
    assert_eq!(request.ty, Type::Non);

    let mut notification = Message::new(Type::Non, Code::new(2, 5), Id(900), token);
    notification.opts.observe = Some(3);
    notification.payload.0 = [0xF5].to_vec();
    deliver(&mut engine, notification);
    assert_eq!(engine.get_client_cb("/led/1", client(), Method::Get)
                     .and_then(ClientCb::observe_seq),
               Some(3));

    assert_eq!(engine.stop_observe(client(), "/led/1"), Ok(true));
    let dereg = sent(&engine).remove(0);
    assert_eq!(dereg.opts.observe, Some(1));
    assert_eq!(dereg.token, token);
    assert!(engine.client_cbs().is_empty());

    assert_eq!(engine.stop_observe(client(), "/led/1"), Ok(false));
  }

  #[test]
  fn client_callbacks_full() {
    let mut config = Config::default();
    config.max_concurrent_requests = 1;
    let mut engine = engine(config);

    engine.get(client(), "/a", None, Qos::Low, |_| ()).unwrap();
    let err = engine.get(client(), "/b", None, Qos::Low, |_| ())
                    .unwrap_err();
    assert_eq!(err.what, What::ClientCallbacksFull);
    assert!(err.is_exhaustion());
  }

  #[test]
  fn discovery_roundtrip() {
    let mut server = engine(Config::default());
    server.add_resource(led(Default::default(), Default::default()))
          .unwrap();

    let mut client_engine = engine(Config::default());
    let found: Rc<RefCell<Vec<(String, String)>>> = Default::default();
    let sink = found.clone();
    client_engine.discover(Some("oic.r.light"), move |di: &str, link: &Link, _: Endpoint| {
                   sink.borrow_mut().push((di.to_string(), link.href.clone()));
                   Discovery::Continue
                 })
                 .unwrap();

    let request = sent(&client_engine).remove(0);
    assert_eq!(request.opts.path(), "oic/res");
    assert_eq!(request.opts.query(), "rt=oic.r.light");
    assert_eq!(request.ty, Type::Non);

    // no resource has the type, so the server stays quiet
    deliver(&mut server, request.clone());
    assert!(sent(&server).is_empty());

    let mut request = request;
    request.opts.uri_query = None;
    deliver(&mut server, request);
    let resp = sent(&server).remove(0);

    deliver(&mut client_engine, resp);
    assert_eq!(found.borrow().as_slice(),
               &[(Config::default().device_id.to_string(), "/led/1".to_string())]);

    client_engine.clock.set(2_000);
    client_engine.run_until_idle().unwrap();
    assert!(client_engine.client_cbs().is_empty());
  }

  #[test]
  fn periodic_observation() {
    let mut engine = engine(Config::default());
    let id = engine.add_resource(led(Default::default(), Default::default()).with_periodic_observe(Milliseconds(500)))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register.clone());
    sent(&engine);

    engine.clock.set(499);
    engine.run_until_idle().unwrap();
    assert!(sent(&engine).is_empty());

    engine.clock.set(500);
    engine.run_until_idle().unwrap();
    assert_eq!(sent(&engine).len(), 1);

    engine.clock.set(1_000);
    engine.run_until_idle().unwrap();
    assert_eq!(sent(&engine).len(), 1);

    let mut deregister = req(Type::Non, Code::GET, 2, "led/1");
    deregister.token = register.token;
    deregister.opts.observe = Some(1);
    deliver(&mut engine, deregister);
    sent(&engine);
    assert!(!engine.registry().get(id).unwrap().timer.is_armed());

    engine.clock.set(5_000);
    engine.run_until_idle().unwrap();
    assert!(sent(&engine).is_empty());
  }

  #[test]
  fn delete_resource_drops_observers() {
    let mut engine = engine(Config::default());
    let id = engine.add_resource(led(Default::default(), Default::default()))
                   .unwrap();

    let mut register = req(Type::Non, Code::GET, 1, "led/1");
    register.opts.observe = Some(0);
    deliver(&mut engine, register);

    assert!(engine.delete_resource(id).is_some());
    assert!(engine.observers().is_empty());
    assert!(engine.delete_resource(id).is_none());
    assert_eq!(engine.notify(id), Ok(0));
  }
}
