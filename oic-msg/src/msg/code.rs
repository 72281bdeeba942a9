/// # Message Code
///
/// 8-bit unsigned integer, split into a 3-bit class (most
/// significant bits) and a 5-bit detail (least significant bits),
/// documented as "c.dd" where "c" is a digit from 0 to 7 for the
/// 3-bit subfield and "dd" are two digits from 00 to 31 for the 5-bit
/// subfield.  The class can indicate a request (0), a success
/// response (2), a client error response (4), or a server error
/// response (5).
///
/// As a special case, Code 0.00 indicates an Empty message.
///
/// See [RFC7252 - Message Details](https://datatracker.ietf.org/doc/html/rfc7252#section-3) for context
///
/// ```
/// use oic_msg::Code;
///
/// assert_eq!(Code { class: 2, detail: 5 }.to_string(), "2.05".to_string());
/// assert_eq!(u8::from(Code::new(2, 5)), 0b010_00101);
/// assert_eq!(Code::from(0b010_00101u8), Code::new(2, 5));
/// ```
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug, Default)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  ///
  /// Will always be `0` for requests.
  pub detail: u8,
}

/// Whether a code is for a request, response, or empty message
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CodeKind {
  /// A request code (0.xx)
  Request,
  /// A response code ([2-5].xx)
  Response,
  /// EMPTY (0.00)
  Empty,
}

impl Code {
  /// Create a new Code
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// 0.00 EMPTY
  pub const EMPTY: Self = Self::new(0, 0);

  /// 0.01 GET
  pub const GET: Self = Self::new(0, 1);

  /// 0.02 POST
  pub const POST: Self = Self::new(0, 2);

  /// 0.03 PUT
  pub const PUT: Self = Self::new(0, 3);

  /// 0.04 DELETE
  pub const DELETE: Self = Self::new(0, 4);

  /// Get whether this code is for a request, response, or empty message
  ///
  /// ```
  /// use oic_msg::{Code, CodeKind};
  ///
  /// assert_eq!(Code::EMPTY.kind(), CodeKind::Empty);
  /// assert_eq!(Code::GET.kind(), CodeKind::Request);
  /// assert_eq!(Code::new(2, 5).kind(), CodeKind::Response);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match self.class {
      | 0 if self.detail == 0 => CodeKind::Empty,
      | 0 => CodeKind::Request,
      | _ => CodeKind::Response,
    }
  }

  /// Is this one of the four request methods (GET, POST, PUT, DELETE)?
  pub fn is_method(&self) -> bool {
    self.class == 0 && (1..=4).contains(&self.detail)
  }

  /// Is this a client or server error response code (>= 4.00)?
  pub fn is_error(&self) -> bool {
    self.class >= 4
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    // xxx.....
    let class = b >> 5;

    // ...xxxxx
    let detail = b & 0b0011111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = code.class << 5;
    let detail = code.detail & 0b0011111;

    class | detail
  }
}

impl core::fmt::Display for Code {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}.{:02}", self.class, self.detail)
  }
}
