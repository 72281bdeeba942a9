//! `oic` is a CoAP request/response engine for OIC / OCF devices.
//!
//! ## CoAP
//! CoAP is an application-level network protocol that copies the semantics of HTTP
//! to an environment conducive to **constrained** devices. (weak hardware, small battery capacity, etc.)
//!
//! A device running `oic` is a server and a client at once:
//! - it hosts [`Resource`](resource::Resource)s, addressed by URI, which
//!   answer requests through OCF [`Interface`](resource::Interface)s
//! - it lets peers [observe](observe) resources and notifies them of changes
//! - it sends requests of its own, and [discovers](engine::Engine::discover)
//!   other devices by multicasting to `/oic/res`
//!
//! Everything is driven by a single-threaded, cooperative [`Engine`](engine::Engine).
//! Transports hand it datagrams through its [`Inbox`](inbox::Inbox) and
//! [`Engine::run_once`](engine::Engine::run_once) does the rest.
//!
//! ```
//! use oic::config::Config;
//! use oic::engine::Engine;
//! use oic::req::Method;
//! use oic::resource::{Interface, Properties, Resource};
//! use oic::resp::Status;
//!
//! # #[cfg(feature = "std")] {
//! let sock = <std::net::UdpSocket as oic::net::Socket>::bind("127.0.0.1:0".parse().unwrap()).unwrap();
//! let mut engine = Engine::new(Config::default(), oic::std::Clock::new(), sock);
//!
//! let led = Resource::new("/led/1").with_type("oic.r.light")
//!                                  .with_default_interface(Interface::Actuator)
//!                                  .with_properties(Properties::DISCOVERABLE | Properties::OBSERVABLE)
//!                                  .with_handler(Method::Get, |_, _, resp| {
//!                                    resp.set_rep(&true).unwrap().set_status(Status::Ok);
//!                                  });
//!
//! engine.add_resource(led).unwrap();
//! engine.run_until_idle().unwrap();
//! # }
//! ```

#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// style
#![allow(clippy::unused_unit)]
// -
// deny
#![warn(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]
// -
// features
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc as std_alloc;


pub(crate) mod logging;

/// customizable retrying of fallible operations
pub mod retry;

/// network abstractions
pub mod net;

/// time abstractions
pub mod time;

/// configuring runtime behavior
pub mod config;

/// errors surfaced by the engine
pub mod error;

/// fixed-capacity pools with generational handles
pub mod pool;

/// the engine's event queue
pub mod inbox;

/// responses
pub mod resp;

/// requests
pub mod req;

/// hosted resources and the resource registry
pub mod resource;

/// routing requests to resources
pub(crate) mod dispatch;

/// `/oic/res` link format
pub mod discovery;

/// message exchanges awaiting completion
pub mod transaction;

/// resource observation (RFC7641)
pub mod observe;

/// outbound requests and their callbacks
pub mod client;

/// # The engine
///
/// Owns the socket, the clock and every pool, and runs the
/// server, observe and client machinery over them.
pub mod engine;

/// `std`-only oic stuff
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod std;

pub use oic_msg as msg;

macro_rules! code {
  (rfc7252($section:literal) $name:ident = $c:literal * $d:literal) => {
    #[doc = concat!("[RFC7252 Section ",
                    $section,
                    "](https://datatracker.ietf.org/doc/html/rfc7252#section-",
                    $section,
                    ")")]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: oic_msg::Code = oic_msg::Code::new($c, $d);
  };
}

pub(crate) use code;

/// Helper constants and functions for creating multicast addresses
pub mod multicast {
  use no_std_net::{Ipv4Addr, SocketAddr, SocketAddrV4};

  /// The default CoAP port
  pub const PORT: u16 = 5683;

  /// IPv4 "All CoAP devices" multicast address.
  ///
  /// Discovery requests are sent here.
  pub const ALL_COAP_DEVICES_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 187);

  /// Create a SocketAddr (IP + port) with the [`ALL_COAP_DEVICES_IP`] address
  ///
  /// ```
  /// use oic::multicast::{all_coap_devices, PORT};
  ///
  /// assert_eq!(all_coap_devices(PORT).to_string(), "224.0.1.187:5683");
  /// ```
  pub const fn all_coap_devices(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(ALL_COAP_DEVICES_IP, port))
  }
}
