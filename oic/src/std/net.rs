use std::io;
use std::net::UdpSocket;

use no_std_net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::net::{Addrd, Endpoint, Socket};

fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

pub(crate) fn to_std(addr: SocketAddr) -> std::net::SocketAddr {
  match addr {
    | SocketAddr::V4(v4) => {
      let [a, b, c, d] = v4.ip().octets();
      std::net::SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::new(a, b, c, d),
                                                           v4.port()))
    },
    | SocketAddr::V6(v6) => {
      let [a, b, c, d, e, f, g, h] = v6.ip().segments();
      std::net::SocketAddr::V6(std::net::SocketAddrV6::new(std::net::Ipv6Addr::new(a, b, c, d, e, f, g, h),
                                                           v6.port(),
                                                           v6.flowinfo(),
                                                           v6.scope_id()))
    },
  }
}

pub(crate) fn from_std(addr: std::net::SocketAddr) -> SocketAddr {
  match addr {
    | std::net::SocketAddr::V4(v4) => {
      let [a, b, c, d] = v4.ip().octets();
      SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), v4.port()))
    },
    | std::net::SocketAddr::V6(v6) => {
      let [a, b, c, d, e, f, g, h] = v6.ip().segments();
      SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::new(a, b, c, d, e, f, g, h),
                                       v6.port(),
                                       v6.flowinfo(),
                                       v6.scope_id()))
    },
  }
}

/// Datagrams received over a [`UdpSocket`] come from UDP endpoints.
impl Socket for UdpSocket {
  type Error = io::Error;

  fn local_addr(&self) -> SocketAddr {
    UdpSocket::local_addr(self).map(from_std)
                               .unwrap_or_else(|_| {
                                 SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
                               })
  }

  fn bind_raw(addr: SocketAddr) -> Result<Self, Self::Error> {
    let sock = UdpSocket::bind(to_std(addr))?;
    sock.set_nonblocking(true)?;
    Ok(sock)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.send_to(msg.data(), to_std(msg.addr()))
        .map(|_| ())
        .map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    self.recv_from(buffer)
        .map(|(n, addr)| Addrd(n, Endpoint::udp(from_std(addr))))
        .map_err(io_to_nb)
  }

  fn join_multicast(&self, addr: IpAddr) -> Result<(), Self::Error> {
    match addr {
      | IpAddr::V4(v4) => {
        let [a, b, c, d] = v4.octets();
        self.join_multicast_v4(&std::net::Ipv4Addr::new(a, b, c, d),
                               &std::net::Ipv4Addr::UNSPECIFIED)
      },
      | IpAddr::V6(v6) => {
        let [a, b, c, d, e, f, g, h] = v6.segments();
        self.join_multicast_v6(&std::net::Ipv6Addr::new(a, b, c, d, e, f, g, h), 0)
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn addr_conversion() {
    let v4: SocketAddr = "10.0.0.1:5683".parse().unwrap();
    assert_eq!(to_std(v4).to_string(), "10.0.0.1:5683");
    assert_eq!(from_std(to_std(v4)), v4);

    let v6: SocketAddr = "[ff02::158]:5683".parse().unwrap();
    assert_eq!(from_std(to_std(v6)), v6);
  }

  #[test]
  fn loopback() {
    let a = <UdpSocket as Socket>::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let b = <UdpSocket as Socket>::bind("127.0.0.1:0".parse().unwrap()).unwrap();

    let mut buf = [0u8; 8];
    assert!(matches!(Socket::recv(&b, &mut buf), Err(nb::Error::WouldBlock)));

    let to = Endpoint::udp(Socket::local_addr(&b));
    nb::block!(Socket::send(&a, Addrd(&[1u8, 2, 3][..], to))).unwrap();

    let Addrd(n, from) = nb::block!(Socket::recv(&b, &mut buf)).unwrap();
    assert_eq!(&buf[..n], &[1, 2, 3]);
    assert_eq!(from.addr, Socket::local_addr(&a));
  }
}
