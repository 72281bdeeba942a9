use tinyvec::ArrayVec;

/// The Token is used to match a response with a request.
///
/// Every request carries a client-generated token that the server
/// MUST echo (without modification) in any resulting response.
///
/// A token is a sequence of 0 to 8 bytes; unlike the [`Id`](crate::Id),
/// which matches one message with its acknowledgement, a token
/// ties together every message exchanged about a single request
/// (e.g. all notifications for an Observe registration).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Create a token from a slice, truncating to 8 bytes
  ///
  /// ```
  /// use oic_msg::Token;
  ///
  /// assert_eq!(Token::from_slice(&[1, 2]).as_bytes(), &[1, 2]);
  /// assert_eq!(Token::from_slice(&[0; 12]).as_bytes().len(), 8);
  /// ```
  pub fn from_slice(bytes: &[u8]) -> Self {
    let mut t = ArrayVec::new();
    t.extend(bytes.iter().copied().take(8));
    Token(t)
  }

  /// Borrow the bytes of this token
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Number of bytes in this token
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Is this the empty (zero-length) token?
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}
