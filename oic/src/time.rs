use embedded_time::duration::Milliseconds;

/// A duration, in milliseconds
pub type Millis = Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// The clock failed to provide the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockError;

/// Milliseconds elapsed since the clock's epoch
pub fn now_millis<C: Clock>(clock: &C) -> Result<Millis, ClockError> {
  clock.try_now()
       .map_err(|_| ClockError)
       .and_then(|now| Millis::try_from(now.duration_since_epoch()).map_err(|_| ClockError))
}

/// A one-shot deadline.
///
/// Timers are owned by the thing they time (a resource, a client callback)
/// and are checked by the event loop, which is what allows them
/// to be cancelled by identity at any time.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use oic::time::Timer;
///
/// let mut timer = Timer::default();
/// timer.arm(Milliseconds(100), Milliseconds(50));
///
/// assert!(!timer.is_due(Milliseconds(149)));
/// assert!(timer.is_due(Milliseconds(150)));
///
/// assert!(timer.cancel());
/// assert!(!timer.cancel());
/// assert!(!timer.is_due(Milliseconds(1_000)));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
  deadline: Option<Millis>,
}

impl Timer {
  /// Arm (or re-arm) the timer to fire `after` from `now`
  pub fn arm(&mut self, now: Millis, after: Millis) {
    self.deadline = Some(Milliseconds(now.0.saturating_add(after.0)));
  }

  /// Disarm the timer.
  ///
  /// Returns whether the timer was armed; cancelling
  /// a timer that already fired or was never armed is a no-op.
  pub fn cancel(&mut self) -> bool {
    self.deadline.take().is_some()
  }

  /// Is the timer armed?
  pub fn is_armed(&self) -> bool {
    self.deadline.is_some()
  }

  /// When the timer will fire
  pub fn deadline(&self) -> Option<Millis> {
    self.deadline
  }

  /// Has the deadline passed?
  pub fn is_due(&self, now: Millis) -> bool {
    matches!(self.deadline, Some(Milliseconds(at)) if now.0 >= at)
  }

  /// If the deadline passed, disarm and return `true`
  pub fn fire(&mut self, now: Millis) -> bool {
    if self.is_due(now) {
      self.deadline = None;
      true
    } else {
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::ClockMock;

  #[test]
  fn now_millis_reads_clock() {
    let clock = ClockMock::new();
    clock.set(1234);
    assert_eq!(now_millis(&clock), Ok(Milliseconds(1234)));
  }

  #[test]
  fn fire_is_one_shot() {
    let mut timer = Timer::default();
    timer.arm(Milliseconds(0), Milliseconds(10));

    assert!(!timer.fire(Milliseconds(9)));
    assert!(timer.fire(Milliseconds(10)));
    assert!(!timer.fire(Milliseconds(11)));
    assert!(!timer.is_armed());
  }

  #[test]
  fn cancel_twice_is_noop() {
    let mut timer = Timer::default();
    assert!(!timer.cancel());

    timer.arm(Milliseconds(0), Milliseconds(10));
    assert!(timer.cancel());
    assert!(!timer.cancel());
    assert_eq!(timer.deadline(), None);
  }
}
