//! Resource discovery (`/oic/res`).
//!
//! The discovery payload is a CBOR array of devices, each listing the
//! discoverable resources it hosts:
//!
//! ```text
//! [{"di": "<device id>",
//!   "links": [{"href": "/light/1",
//!              "rt": ["oic.r.light"],
//!              "if": ["oic.if.baseline", "oic.if.rw"],
//!              "p": {"bm": 3}}]}]
//! ```

use serde::{Deserialize, Serialize};
use std_alloc::format;
use std_alloc::string::{String, ToString};
use std_alloc::vec::Vec;

use crate::req::Request;
use crate::resource::{Properties, Registry, Resource};
use crate::resp::builder::RepError;
use crate::resp::{ResponseBuilder, Status};

/// A device in a discovery payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
  /// Device id
  pub di: String,
  /// Resources hosted by the device
  pub links: Vec<Link>,
}

/// A resource in a discovery payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  /// Path of the resource
  pub href: String,
  /// Resource types
  pub rt: Vec<String>,
  /// Interface names
  #[serde(rename = "if")]
  pub interfaces: Vec<String>,
  /// Policy
  pub p: Policy,
}

/// Discovery policy of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
  /// Discoverable and observable bits of the resource's properties
  pub bm: u8,
  /// Only reachable over a secure channel
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sec: Option<bool>,
  /// Secure port
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub port: Option<u16>,
}

impl Link {
  fn new(res: &Resource) -> Self {
    let bm = res.properties().0 & (Properties::DISCOVERABLE.0 | Properties::OBSERVABLE.0);
    let sec = res.properties()
                 .contains(Properties::SECURE)
                 .then_some(true);

    Link { href: res.uri().to_string(),
           rt: res.types().to_vec(),
           interfaces: res.interfaces()
                          .iter()
                          .map(|i| i.name().to_string())
                          .collect(),
           p: Policy { bm, sec, port: None } }
  }
}

/// Encode the discovery payload for every discoverable resource,
/// keeping only resources with type `rt` when given.
pub fn encode(registry: &Registry, device_id: &str, rt: Option<&str>) -> Result<Option<Vec<u8>>, RepError> {
  let links = registry.iter()
                      .map(|(_, r)| r)
                      .filter(|r| r.is_discoverable())
                      .filter(|r| rt.map(|rt| r.types().iter().any(|t| t == rt)).unwrap_or(true))
                      .map(Link::new)
                      .collect::<Vec<_>>();

  if links.is_empty() && rt.is_some() {
    return Ok(None);
  }

  let devices = [Device { di: device_id.to_string(),
                          links }];
  let mut bytes = Vec::new();
  ciborium::ser::into_writer(&devices, &mut bytes).map_err(|e| RepError(format!("{:?}", e)))?;
  Ok(Some(bytes))
}

/// GET handler of `/oic/res`.
///
/// A filter that matches nothing is not answered, so that a multicast
/// discovery only hears from devices that have what it is looking for.
pub(crate) fn respond(registry: &Registry,
                      device_id: &str,
                      req: &Request<'_>,
                      resp: &mut ResponseBuilder) {
  match encode(registry, device_id, req.query_value("rt")) {
    | Ok(Some(payload)) => {
      resp.set_payload(payload).set_status(Status::Ok);
    },
    | Ok(None) => {
      resp.set_status(Status::Ignore);
    },
    | Err(e) => {
      log::error!(target: "oic::discovery", "failed to encode links: {:?}", e);
      resp.set_status(Status::InternalServerError);
    },
  }
}

/// Decode a discovery payload
pub fn decode(payload: &[u8]) -> Result<Vec<Device>, RepError> {
  ciborium::de::from_reader(payload).map_err(|e| RepError(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::req::Method;
  use crate::resource::{Interface, InterfaceMask};

  fn registry() -> Registry {
    let mut reg = Registry::new(4);
    reg.register(Resource::new("/light/1").with_type("oic.r.light")
                                          .with_interfaces(InterfaceMask::RW)
                                          .with_properties(Properties::DISCOVERABLE
                                                           | Properties::OBSERVABLE)
                                          .with_handler(Method::Get, |_, _, _| ()))
       .unwrap();
    reg.register(Resource::new("/hidden").with_type("oic.r.light")
                                         .with_handler(Method::Get, |_, _, _| ()))
       .unwrap();
    reg.register(Resource::new("/switch").with_type("oic.r.switch")
                                         .with_properties(Properties::DISCOVERABLE
                                                          | Properties::SECURE)
                                         .with_default_interface(Interface::Actuator)
                                         .with_handler(Method::Get, |_, _, _| ()))
       .unwrap();
    reg
  }

  #[test]
  fn lists_discoverable_resources() {
    let bytes = encode(&registry(), "dev", None).unwrap().unwrap();
    let devices = decode(&bytes).unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].di, "dev");

    let light = &devices[0].links[0];
    assert_eq!(light.href, "/light/1");
    assert_eq!(light.rt, vec!["oic.r.light".to_string()]);
    assert_eq!(light.interfaces,
               vec!["oic.if.baseline".to_string(), "oic.if.rw".to_string()]);
    assert_eq!(light.p,
               Policy { bm: 3,
                        sec: None,
                        port: None });

    let switch = &devices[0].links[1];
    assert_eq!(switch.href, "/switch");
    assert_eq!(switch.p.sec, Some(true));
    assert_eq!(devices[0].links.len(), 2);
  }

  #[test]
  fn rt_filter() {
    let bytes = encode(&registry(), "dev", Some("oic.r.switch")).unwrap()
                                                               .unwrap();
    let devices = decode(&bytes).unwrap();
    assert_eq!(devices[0].links.len(), 1);
    assert_eq!(devices[0].links[0].href, "/switch");

    assert_eq!(encode(&registry(), "dev", Some("oic.r.fan")), Ok(None));
  }

  #[test]
  fn decode_garbage() {
    assert!(decode(&[0xFF, 0x00]).is_err());
  }
}
