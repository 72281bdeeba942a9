/// Three items of information may need to be transferred in a
/// Block (Block1 or Block2) option:
/// * the size of the block ([`Block::size`])
/// * whether more blocks are following ([`Block::more`])
/// * the relative number of the block ([`Block::num`]) within a sequence of blocks with the given size.
///
/// ```text
///  0 1 2 3 4 5 6 7
/// +-+-+-+-+-+-+-+-+
/// |  NUM  |M| SZX |
/// +-+-+-+-+-+-+-+-+
/// ```
///
/// The block size is `16 << SZX`, so `SZX` in `0..=7` covers
/// blocks of 16 to 2048 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(u32);

impl Block {
  /// Create a block option value.
  ///
  /// `size` is rounded down to the nearest power of two
  /// within `16..=2048`.
  pub fn new(size: u16, num: u32, more: bool) -> Self {
    let num = num << 4;
    let more = u32::from(more) << 3;
    let size = size.max(16).min(2048);
    let szx = (15 - size.leading_zeros()) - 4;

    Self(num | more | szx)
  }

  /// Size exponent (`SZX`)
  pub fn szx(&self) -> u8 {
    (self.0 & 0b111) as u8
  }

  /// Block size in bytes
  pub fn size(&self) -> u16 {
    16 << self.szx()
  }

  /// Are more blocks following this one?
  pub fn more(&self) -> bool {
    (self.0 & 0b1000) >> 3 == 1
  }

  /// Relative number of this block
  pub fn num(&self) -> u32 {
    self.0 >> 4
  }

  /// Byte offset of the start of this block within the whole body
  ///
  /// ```
  /// use oic_msg::known::Block;
  ///
  /// assert_eq!(Block::new(64, 3, false).offset(), 192);
  /// ```
  pub fn offset(&self) -> u32 {
    (self.0 & !0xF) << self.szx()
  }
}

impl From<Block> for u32 {
  fn from(b: Block) -> Self {
    b.0
  }
}

impl From<u32> for Block {
  fn from(n: u32) -> Self {
    Block(n)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn block() {
    let b = Block(33);
    assert_eq!(b.size(), 32);
    assert_eq!(b.num(), 2);
    assert_eq!(b.more(), false);

    let b = Block(59);
    assert_eq!(b.size(), 128);
    assert_eq!(b.num(), 3);
    assert_eq!(b.more(), true);
    assert_eq!(b.offset(), 384);

    assert_eq!(Block::new(32, 2, false), Block(33));
    assert_eq!(Block::new(128, 3, true), Block(59));
  }

  #[test]
  fn size_rounds_down_to_nearest_power_of_two() {
    assert_eq!(Block::new(0, 1, false).size(), 16);
    assert_eq!(Block::new(10, 1, false).size(), 16);
    assert_eq!(Block::new(17, 1, false).size(), 16);
    assert_eq!(Block::new(31, 1, false).size(), 16);
    assert_eq!(Block::new(33, 1, false).size(), 32);
    assert_eq!(Block::new(64, 1, false).size(), 64);
    assert_eq!(Block::new(1024, 1, false).size(), 1024);
    assert_eq!(Block::new(2048, 1, false).size(), 2048);
    assert_eq!(Block::new(4096, 1, false).size(), 2048);
  }
}
