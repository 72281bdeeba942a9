pub use oic_msg::Code;

use crate::code;

// 2.xx
code!(rfc7252("5.9.1.1") CREATED = 2*01);
code!(rfc7252("5.9.1.2") DELETED = 2*02);
code!(rfc7252("5.9.1.3") VALID   = 2*03);
code!(rfc7252("5.9.1.4") CHANGED = 2*04);
code!(rfc7252("5.9.1.5") CONTENT = 2*05);

// 4.xx
code!(rfc7252("5.9.2.1")  BAD_REQUEST                = 4*00);
code!(rfc7252("5.9.2.2")  UNAUTHORIZED               = 4*01);
code!(rfc7252("5.9.2.3")  BAD_OPTION                 = 4*02);
code!(rfc7252("5.9.2.4")  FORBIDDEN                  = 4*03);
code!(rfc7252("5.9.2.5")  NOT_FOUND                  = 4*04);
code!(rfc7252("5.9.2.6")  METHOD_NOT_ALLOWED         = 4*05);
code!(rfc7252("5.9.2.7")  NOT_ACCEPTABLE             = 4*06);
code!(rfc7252("5.9.2.9")  REQUEST_ENTITY_TOO_LARGE   = 4*13);
code!(rfc7252("5.9.2.10") UNSUPPORTED_CONTENT_FORMAT = 4*15);

// 5.xx
code!(rfc7252("5.9.3.1") INTERNAL_SERVER_ERROR  =  5*00);
code!(rfc7252("5.9.3.2") NOT_IMPLEMENTED        =  5*01);
code!(rfc7252("5.9.3.3") BAD_GATEWAY            =  5*02);
code!(rfc7252("5.9.3.4") SERVICE_UNAVAILABLE    =  5*03);
code!(rfc7252("5.9.3.5") GATEWAY_TIMEOUT        =  5*04);
code!(rfc7252("5.9.3.6") PROXYING_NOT_SUPPORTED =  5*05);

/// The outcome of handling a request, as seen by resource handlers.
///
/// Every status but [`Status::Ignore`] corresponds to exactly one CoAP
/// response code.
///
/// ```
/// use oic::resp::code::{self, Status};
///
/// assert_eq!(Status::Ok.code(), Some(code::CONTENT));
/// assert_eq!(Status::MethodNotAllowed.code(), Some(code::METHOD_NOT_ALLOWED));
/// assert_eq!(Status::Ignore.code(), None);
///
/// assert_eq!(Status::from_code(code::CHANGED), Some(Status::Changed));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Status {
  Ok,
  Created,
  Changed,
  Deleted,
  NotModified,
  BadRequest,
  Unauthorized,
  BadOption,
  Forbidden,
  NotFound,
  MethodNotAllowed,
  NotAcceptable,
  RequestEntityTooLarge,
  UnsupportedMediaType,
  InternalServerError,
  NotImplemented,
  BadGateway,
  ServiceUnavailable,
  GatewayTimeout,
  ProxyingNotSupported,
  /// Do not respond at all.
  ///
  /// A handler returns this when it will answer later (a separate response)
  /// or when the request should be silently dropped.
  Ignore,
}

const TABLE: [(Status, Code); 20] = [(Status::Ok, CONTENT),
                                     (Status::Created, CREATED),
                                     (Status::Changed, CHANGED),
                                     (Status::Deleted, DELETED),
                                     (Status::NotModified, VALID),
                                     (Status::BadRequest, BAD_REQUEST),
                                     (Status::Unauthorized, UNAUTHORIZED),
                                     (Status::BadOption, BAD_OPTION),
                                     (Status::Forbidden, FORBIDDEN),
                                     (Status::NotFound, NOT_FOUND),
                                     (Status::MethodNotAllowed, METHOD_NOT_ALLOWED),
                                     (Status::NotAcceptable, NOT_ACCEPTABLE),
                                     (Status::RequestEntityTooLarge, REQUEST_ENTITY_TOO_LARGE),
                                     (Status::UnsupportedMediaType, UNSUPPORTED_CONTENT_FORMAT),
                                     (Status::InternalServerError, INTERNAL_SERVER_ERROR),
                                     (Status::NotImplemented, NOT_IMPLEMENTED),
                                     (Status::BadGateway, BAD_GATEWAY),
                                     (Status::ServiceUnavailable, SERVICE_UNAVAILABLE),
                                     (Status::GatewayTimeout, GATEWAY_TIMEOUT),
                                     (Status::ProxyingNotSupported, PROXYING_NOT_SUPPORTED)];

impl Status {
  /// The CoAP response code for this status, `None` for [`Status::Ignore`]
  pub fn code(&self) -> Option<Code> {
    TABLE.iter().find(|(s, _)| s == self).map(|(_, c)| *c)
  }

  /// Reverse of [`Status::code`]
  pub fn from_code(code: Code) -> Option<Self> {
    TABLE.iter().find(|(_, c)| *c == code).map(|(s, _)| *s)
  }

  /// Is this a 2.xx status?
  pub fn is_success(&self) -> bool {
    matches!(self.code(), Some(Code { class: 2, .. }))
  }

  /// Is this a 4.xx or 5.xx status?
  pub fn is_error(&self) -> bool {
    self.code().map(|c| c.is_error()).unwrap_or(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_status_roundtrips_through_its_code() {
    TABLE.iter().for_each(|(s, c)| {
                  assert_eq!(s.code(), Some(*c));
                  assert_eq!(Status::from_code(*c), Some(*s));
                });
  }

  #[test]
  fn classes() {
    assert!(Status::Created.is_success());
    assert!(!Status::Created.is_error());
    assert!(Status::ServiceUnavailable.is_error());
    assert!(!Status::Ignore.is_error());
    assert!(!Status::Ignore.is_success());
    assert_eq!(Status::from_code(Code::new(2, 31)), None);
  }
}
