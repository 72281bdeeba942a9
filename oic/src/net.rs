use no_std_net::{IpAddr, SocketAddr};

/// Which transport a peer is reachable over.
///
/// This decides the message framing (RFC7252 datagrams vs. RFC8323 streams)
/// and whether CoAP-level reliability applies (streams are already reliable).
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy, Default)]
pub enum Transport {
  /// CoAP over UDP
  #[default]
  Udp,
  /// CoAP over TCP
  Tcp,
}

/// A remote (or local) CoAP endpoint
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Endpoint {
  /// IP address & port
  pub addr: SocketAddr,
  /// Transport used to talk to this endpoint
  pub transport: Transport,
}

impl Endpoint {
  /// An endpoint reachable over UDP
  pub const fn udp(addr: SocketAddr) -> Self {
    Self { addr,
           transport: Transport::Udp }
  }

  /// An endpoint reachable over TCP
  pub const fn tcp(addr: SocketAddr) -> Self {
    Self { addr,
           transport: Transport::Tcp }
  }

  /// Is this a stream endpoint?
  pub fn is_tcp(&self) -> bool {
    self.transport == Transport::Tcp
  }
}

/// Data that came from (or is going to) a network endpoint
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub Endpoint);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.endpoint())
  }

  /// Discard the endpoint and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Copy the endpoint for the data
  pub fn endpoint(&self) -> Endpoint {
    self.1
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1.addr
  }
}

/// A CoAP network socket
///
/// This mirrors the Udp socket traits in embedded-nal, but allows us to
/// implement them for foreign types (like `std::net::UdpSocket`).
///
/// Sockets are expected to be non-blocking; "no data yet" is
/// [`nb::Error::WouldBlock`].
pub trait Socket: Sized {
  /// The error yielded by socket operations
  type Error: core::fmt::Debug;

  /// Get the local address this socket was created from
  fn local_addr(&self) -> SocketAddr;

  /// Bind the socket to an address, without doing any spooky magic things like
  /// auto-detecting and joining multicast groups.
  ///
  /// Implementors of `bind_raw` should yield a socket in a non-blocking state.
  fn bind_raw(addr: SocketAddr) -> Result<Self, Self::Error>;

  /// Binds the socket to a local address.
  ///
  /// This function will automatically invoke [`Socket::join_multicast`] if the address
  /// is a multicast address, and should yield a non-blocking socket.
  fn bind(addr: SocketAddr) -> Result<Self, Self::Error> {
    let sock = Self::bind_raw(addr)?;
    match addr.ip() {
      | ip if ip.is_multicast() => sock.join_multicast(ip).map(|_| sock),
      | _ => Ok(sock),
    }
  }

  /// Send a message to a remote endpoint
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Pull a buffered datagram from the socket, along with the endpoint of the sender.
  ///
  /// It is expected that (like [`std::net::UdpSocket`]) if the message is larger
  /// than the buffer, those bytes are dropped and not considered an error condition.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Join a multicast group
  fn join_multicast(&self, addr: IpAddr) -> Result<(), Self::Error>;
}
