use std_alloc::collections::VecDeque;
use std_alloc::sync::Arc;
use toad_stem::Stem;

use crate::engine::Event;

/// The queue of events waiting for the event loop.
///
/// This is the only state shared between the event loop and the
/// outside world; transports (a receive thread, an interrupt handler)
/// and the application push into it from any context, and only the
/// event loop pops.
///
/// Cloning an `Inbox` yields another handle to the same queue.
///
/// ```
/// use no_std_net::SocketAddr;
/// use oic::engine::Event;
/// use oic::inbox::Inbox;
/// use oic::net::{Addrd, Endpoint};
///
/// let inbox = Inbox::new(2);
/// let sender = inbox.clone();
/// let from = Endpoint::udp("10.0.0.1:5683".parse::<SocketAddr>().unwrap());
///
/// assert!(sender.push(Event::Inbound(Addrd(vec![1], from))).is_ok());
/// assert!(sender.push(Event::Inbound(Addrd(vec![2], from))).is_ok());
/// assert!(sender.push(Event::Inbound(Addrd(vec![3], from))).is_err());
///
/// assert_eq!(inbox.pop(), Some(Event::Inbound(Addrd(vec![1], from))));
/// assert_eq!(inbox.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Inbox {
  queue: Arc<Stem<VecDeque<Event>>>,
  capacity: usize,
}

impl Inbox {
  /// Create an empty inbox that holds at most `capacity` events
  pub fn new(capacity: usize) -> Self {
    Self { queue: Arc::new(Stem::new(VecDeque::new())),
           capacity }
  }

  /// Enqueue an event, yielding it back if the inbox is full
  pub fn push(&self, event: Event) -> Result<(), Event> {
    let mut event = Some(event);
    self.queue.map_mut(|q| {
                let event = event.take().unwrap();
                if q.len() >= self.capacity {
                  Err(event)
                } else {
                  q.push_back(event);
                  Ok(())
                }
              })
  }

  /// Dequeue the oldest event
  pub fn pop(&self) -> Option<Event> {
    self.queue.map_mut(|q| q.pop_front())
  }

  /// Number of events waiting
  pub fn len(&self) -> usize {
    self.queue.map_ref(|q| q.len())
  }

  /// Are there no events waiting?
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
