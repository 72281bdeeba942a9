/// Version of the CoAP protocol that the message adheres to.
///
/// Implementations of RFC7252 MUST set this field to 1;
/// messages with any other version are rejected while parsing.
///
/// See [RFC7252 - Message Details](https://datatracker.ietf.org/doc/html/rfc7252#section-3) for context
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Debug)]
pub struct Version(pub u8);

impl Default for Version {
  fn default() -> Self {
    Version(1)
  }
}
