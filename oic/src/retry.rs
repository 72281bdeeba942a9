use core::ops::RangeInclusive;

use embedded_time::duration::Milliseconds;
use rand::{Rng, RngCore};

use crate::time::Millis;

/// A non-blocking timer that allows a fixed-delay or exponential-backoff retry,
/// that lives alongside some operation to retry.
///
/// It does not _contain_ the work to be done (e.g. `Box<fn()>`), it only
/// tells the owner of the work when it is time to try again,
/// and when to give up.
///
/// The delay is measured from the most recent attempt, so a
/// late poll never causes retries to bunch up.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use oic::retry;
///
/// let strategy = retry::Strategy::Delay { min: Milliseconds(10),
///                                         max: Milliseconds(10) };
/// let mut rng = rand::rngs::mock::StepRng::new(0, 1);
/// let mut retry = retry::RetryTimer::new(Milliseconds(0), strategy, retry::Attempts(1), &mut rng);
///
/// // the first transmission happened at t=0
/// assert_eq!(retry.what_should_i_do(Milliseconds(9)), Err(nb::Error::WouldBlock));
/// assert_eq!(retry.what_should_i_do(Milliseconds(10)), Ok(retry::YouShould::Retry));
/// assert_eq!(retry.what_should_i_do(Milliseconds(20)), Ok(retry::YouShould::Cry));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimer {
  last_attempt: Millis,
  delay: Millis,
  strategy: Strategy,
  retransmits: Attempts,
  max_retransmits: Attempts,
}

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// Result of [`RetryTimer::what_should_i_do`].
///
/// This tells you if a retry should be attempted or not.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts have been exhausted and the work that is
  /// being retried should be considered poisoned.
  Cry,
  /// A retry should be performed
  Retry,
}

impl RetryTimer {
  /// Create a new retrier, for work that was first attempted at `now`
  pub fn new(now: Millis,
             strategy: Strategy,
             max_retransmits: Attempts,
             rng: &mut impl RngCore)
             -> Self {
    let init = if strategy.has_jitter() {
      rng.gen_range(strategy.range())
    } else {
      *strategy.range().start()
    };

    Self { last_attempt: now,
           delay: Milliseconds(init),
           strategy,
           retransmits: Attempts(0),
           max_retransmits }
  }

  /// When the thing we keep trying fails (here: was not acknowledged),
  /// invoke this to ask the retrytimer "what do I do??"
  ///
  /// Returns `nb::Error::WouldBlock` when we have not yet
  /// waited the appropriate amount of time since the last attempt.
  pub fn what_should_i_do(&mut self,
                          now: Millis)
                          -> nb::Result<YouShould, core::convert::Infallible> {
    if now.0 < self.next_attempt_at().0 {
      return Err(nb::Error::WouldBlock);
    }

    if self.retransmits >= self.max_retransmits {
      Ok(YouShould::Cry)
    } else {
      self.retransmits.0 += 1;
      self.last_attempt = now;
      if let Strategy::Exponential { .. } = self.strategy {
        self.delay = Milliseconds(self.delay.0.saturating_mul(2));
      }
      Ok(YouShould::Retry)
    }
  }

  /// When the next attempt (or the decision to give up) is due
  pub fn next_attempt_at(&self) -> Millis {
    Milliseconds(self.last_attempt.0.saturating_add(self.delay.0))
  }

  /// The delay between the last attempt and the next one
  pub fn delay(&self) -> Millis {
    self.delay
  }

  /// Number of retries performed so far
  pub fn retransmits(&self) -> Attempts {
    self.retransmits
  }
}

/// Strategy to employ when retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  ///
  /// After each failed attempt, double the delay before retrying again.
  Exponential {
    /// Minimum (inclusive) delay for second attempt
    init_min: Millis,
    /// Maximum (inclusive) delay for second attempt
    init_max: Millis,
  },
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  Delay {
    /// Minimum (inclusive) delay for attempts
    min: Millis,
    /// Maximum (inclusive) delay for attempts
    max: Millis,
  },
}

impl Strategy {
  /// Are min & max delays the same? if so, we should probably skip the random number generation.
  pub fn has_jitter(&self) -> bool {
    let rng = self.range();
    rng.start() != rng.end()
  }

  /// Get the min & max durations as an inclusive range
  pub fn range(&self) -> RangeInclusive<u64> {
    match self {
      | &Self::Delay { min: Milliseconds(min),
                       max: Milliseconds(max), } => (min..=max),

      | &Self::Exponential { init_min: Milliseconds(min),
                             init_max: Milliseconds(max), } => (min..=max),
    }
  }

  /// Get the longest amount of time this strategy will wait
  /// before giving up, if every attempt fails
  pub fn max_time(&self, max_retransmits: Attempts) -> Millis {
    let waits = max_retransmits.0 as u32 + 1;
    Milliseconds(match self {
                   | Self::Exponential { init_max: Milliseconds(init),
                                         .. } => init * (2u64.pow(waits) - 1),
                   | Self::Delay { max: Milliseconds(max),
                                   .. } => max * waits as u64,
                 })
  }
}

#[cfg(test)]
mod test {
  use rand::rngs::mock::StepRng;

  use super::*;

  fn fixed(ms: u64) -> Strategy {
    Strategy::Exponential { init_min: Milliseconds(ms),
                            init_max: Milliseconds(ms) }
  }

  #[test]
  fn delay_retrier() {
    let mut rng = StepRng::new(0, 1);
    let mut retry = RetryTimer::new(Milliseconds(0),
                                    Strategy::Delay { min: Milliseconds(1000),
                                                      max: Milliseconds(1000) },
                                    Attempts(3),
                                    &mut rng);

    assert_eq!(retry.what_should_i_do(Milliseconds(999)).unwrap_err(),
               nb::Error::WouldBlock);
    assert_eq!(retry.what_should_i_do(Milliseconds(1000)).unwrap(),
               YouShould::Retry);

    // measured from the last attempt, not the first
    assert_eq!(retry.what_should_i_do(Milliseconds(10_000)).unwrap(),
               YouShould::Retry);
    assert_eq!(retry.what_should_i_do(Milliseconds(10_999)).unwrap_err(),
               nb::Error::WouldBlock);
    assert_eq!(retry.what_should_i_do(Milliseconds(11_000)).unwrap(),
               YouShould::Retry);

    assert_eq!(retry.what_should_i_do(Milliseconds(12_000)).unwrap(),
               YouShould::Cry);
  }

  #[test]
  fn exponential_retrier_retries_exactly_max_times() {
    let mut rng = StepRng::new(0, 1);
    let mut retry = RetryTimer::new(Milliseconds(0), fixed(2000), Attempts(4), &mut rng);

    let mut now = 0u64;
    let mut delays = Vec::new();
    let mut retries = 0;

    loop {
      now = retry.next_attempt_at().0;
      delays.push(retry.delay().0);
      match retry.what_should_i_do(Milliseconds(now)) {
        | Ok(YouShould::Retry) => retries += 1,
        | Ok(YouShould::Cry) => break,
        | Err(_) => unreachable!(),
      }
    }

    assert_eq!(retries, 4);
    assert_eq!(delays, vec![2000, 4000, 8000, 16_000, 32_000]);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(now, 62_000);
    assert_eq!(now, fixed(2000).max_time(Attempts(4)).0);
  }

  #[test]
  fn jitter_stays_in_range() {
    let strategy = Strategy::Exponential { init_min: Milliseconds(2000),
                                           init_max: Milliseconds(2999) };
    let mut rng = StepRng::new(0, 0x9E37_79B9_7F4A_7C15);

    for _ in 0..32 {
      let retry = RetryTimer::new(Milliseconds(0), strategy, Attempts(4), &mut rng);
      assert!(strategy.range().contains(&retry.delay().0));
    }
  }
}
