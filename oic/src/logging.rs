use oic_msg::Message;
use std_alloc::format;
use std_alloc::string::String;

pub(crate) fn msg_summary(msg: &Message) -> String {
  format!("{:?}: {:?} {} with {} byte payload",
          msg.code.kind(),
          msg.ty,
          msg.code,
          msg.payload.0.len())
}

#[cfg(test)]
mod tests {
  use oic_msg::{Code, Id, Token, Type};

  use super::*;

  #[test]
  fn summary() {
    let mut msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
    msg.payload.0 = b"abc".to_vec();
    assert_eq!(msg_summary(&msg), "Request: Con 0.01 with 3 byte payload");
  }
}
