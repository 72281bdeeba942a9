use embedded_time::rate::Fraction;

/// [`Socket`](crate::net::Socket) for [`std::net::UdpSocket`]
pub mod net;

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives
#[derive(Debug, Clone, Copy)]
pub struct Clock(std::time::Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock, whose epoch is now
  pub fn new() -> Self {
    Self(std::time::Instant::now())
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // microseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let elapsed = std::time::Instant::now().duration_since(self.0);
    Ok(embedded_time::Instant::new(elapsed.as_micros() as u64))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::time::now_millis;

  #[test]
  fn clock_is_monotonic() {
    let clock = Clock::new();
    let a = now_millis(&clock).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let b = now_millis(&clock).unwrap();
    assert!(b.0 >= a.0 + 5);
  }
}
