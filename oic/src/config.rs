use embedded_time::duration::Milliseconds;

use crate::retry::{Attempts, Strategy};
use crate::time::Millis;

/// Configuration options related to outbound CON messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Con {
  /// Retry strategy for CON messages that
  /// have not yet been ACKed.
  ///
  /// Defaults to an exponential retry strategy whose first
  /// delay is 2 seconds with a random factor in `[1.0, 1.5)`:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use oic::config::Con;
  /// use oic::retry::Strategy;
  ///
  /// assert_eq!(Con::default().retry_strategy,
  ///            Strategy::Exponential { init_min: Milliseconds(2_000),
  ///                                    init_max: Milliseconds(2_999) });
  /// ```
  pub retry_strategy: Strategy,
  /// Number of times we are allowed to resend a CON message
  /// before giving up on the peer.
  ///
  /// Defaults to 4 retransmissions.
  /// ```
  /// use oic::config::Con;
  /// use oic::retry::Attempts;
  ///
  /// assert_eq!(Con::default().max_retransmits, Attempts(4));
  /// ```
  pub max_retransmits: Attempts,
}

/// Configuration options related to messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msg {
  /// Seed mixed into the random number generator used for
  /// message [`Token`](oic_msg::Token)s, message ids and retry jitter.
  ///
  /// Set this to something distinct
  /// per device (a serial number, a MAC address)
  ///
  /// ```
  /// use oic::config::Msg;
  ///
  /// assert_eq!(Msg::default().token_seed, 0);
  /// ```
  pub token_seed: u16,

  /// See [`Con`]
  pub con: Con,
}

/// Configuration options related to resource observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observe {
  /// Every `refresh_interval`-th notification to an observer is
  /// sent confirmable, so that observers which went away are
  /// eventually forgotten.
  ///
  /// ```
  /// use oic::config::Observe;
  ///
  /// assert_eq!(Observe::default().refresh_interval, 20);
  /// ```
  pub refresh_interval: u32,

  /// Maximum number of observe relationships
  ///
  /// ```
  /// use oic::config::Observe;
  ///
  /// assert_eq!(Observe::default().max_observers, 8);
  /// ```
  pub max_observers: usize,
}

impl Default for Con {
  fn default() -> Self {
    Con { retry_strategy: Strategy::Exponential { init_min: Milliseconds(2_000),
                                                  init_max: Milliseconds(2_999) },
          max_retransmits: Attempts(4) }
  }
}

impl Default for Msg {
  fn default() -> Self {
    Msg { token_seed: 0,
          con: Con::default() }
  }
}

impl Default for Observe {
  fn default() -> Self {
    Observe { refresh_interval: 20,
              max_observers: 8 }
  }
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// See [`Msg`]
  pub msg: Msg,

  /// See [`Observe`]
  pub observe: Observe,

  /// Maximum number of messages that can be in flight
  /// (awaiting an ACK, or being answered) at once
  ///
  /// ```
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().max_transactions, 8);
  /// ```
  pub max_transactions: usize,

  /// Maximum number of resources the application may register
  ///
  /// ```
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().max_app_resources, 8);
  /// ```
  pub max_app_resources: usize,

  /// Maximum number of client requests awaiting a response
  ///
  /// ```
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().max_concurrent_requests, 4);
  /// ```
  pub max_concurrent_requests: usize,

  /// How long a low-QoS or discovery request waits for responses
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().client_cb_timeout, Milliseconds(2_000u64));
  /// ```
  pub client_cb_timeout: Millis,

  /// Largest Block2 size we will send, even if a client asks for more
  ///
  /// ```
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().max_block_size, 1024);
  /// ```
  pub max_block_size: u16,

  /// Responses with a larger payload are sent block-wise
  ///
  /// ```
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().max_payload_size, 1024);
  /// ```
  pub max_payload_size: usize,

  /// Maximum number of events (inbound datagrams, resource changes)
  /// waiting for the event loop; further events are dropped
  ///
  /// ```
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().max_queued_events, 16);
  /// ```
  pub max_queued_events: usize,

  /// Device id advertised in discovery responses
  ///
  /// ```
  /// use oic::config::Config;
  ///
  /// assert_eq!(Config::default().device_id, "0685b960-736f-46f7-bead-0000000000");
  /// ```
  pub device_id: &'static str,
}

impl Default for Config {
  fn default() -> Self {
    Config { msg: Msg::default(),
             observe: Observe::default(),
             max_transactions: 8,
             max_app_resources: 8,
             max_concurrent_requests: 4,
             client_cb_timeout: Milliseconds(2_000),
             max_block_size: 1024,
             max_payload_size: 1024,
             max_queued_events: 16,
             device_id: "0685b960-736f-46f7-bead-0000000000" }
  }
}

impl Config {
  /// Largest datagram we expect to receive; anything
  /// larger is dropped and counted in [`Stats::itoobig`](crate::engine::Stats).
  pub(crate) fn max_frame_size(&self) -> usize {
    // header, token and options
    self.max_payload_size + 256
  }
}
