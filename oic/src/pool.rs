use std_alloc::vec::Vec;
use tinyvec::TinyVec;

/// A stable reference to a value stored in a [`Slab`].
///
/// Handles are never reused for a different value: once the value
/// is removed, the old handle stops resolving even if its slot
/// gets filled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
  index: usize,
  generation: u32,
}

/// The slab is at capacity; the value that could not be inserted is given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

#[derive(Debug, Clone)]
enum Slot<T> {
  Occupied { generation: u32, value: T },
  Vacant { generation: u32 },
}

impl<T> Default for Slot<T> {
  fn default() -> Self {
    Slot::Vacant { generation: 0 }
  }
}

/// Slots kept inline before the slab spills to the heap
const INLINE: usize = 8;

/// A fixed-capacity arena with free-list reuse.
///
/// Used for every bounded pool in the engine (transactions, observers,
/// client callbacks, application resources). Running out of room is
/// an ordinary [`Full`] error.
///
/// Small pools live entirely inline in a [`TinyVec`].
///
/// ```
/// use oic::pool::{Full, Slab};
///
/// let mut slab = Slab::with_capacity(1);
/// let a = slab.insert("a").unwrap();
/// assert_eq!(slab.insert("b"), Err(Full("b")));
///
/// assert_eq!(slab.remove(a), Some("a"));
/// assert_eq!(slab.remove(a), None);
/// assert!(slab.insert("b").is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Slab<T> {
  slots: TinyVec<[Slot<T>; INLINE]>,
  free: TinyVec<[usize; INLINE]>,
  capacity: usize,
  len: usize,
}

impl<T> Slab<T> {
  /// Create an empty slab that holds at most `capacity` values
  pub fn with_capacity(capacity: usize) -> Self {
    Self { slots: TinyVec::new(),
           free: TinyVec::new(),
           capacity,
           len: 0 }
  }

  /// Maximum number of values
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of values stored
  pub fn len(&self) -> usize {
    self.len
  }

  /// Is the slab empty?
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Is the slab at capacity?
  pub fn is_full(&self) -> bool {
    self.len >= self.capacity
  }

  /// Store a value
  pub fn insert(&mut self, value: T) -> Result<Handle, Full<T>> {
    if self.is_full() {
      return Err(Full(value));
    }

    let handle = match self.free.pop() {
      | Some(index) => {
        let generation = match self.slots[index] {
          | Slot::Vacant { generation } => generation,
          | Slot::Occupied { generation, .. } => generation,
        };
        self.slots[index] = Slot::Occupied { generation, value };
        Handle { index, generation }
      },
      | None => {
        self.slots.push(Slot::Occupied { generation: 0,
                                         value });
        Handle { index: self.slots.len() - 1,
                 generation: 0 }
      },
    };

    self.len += 1;
    Ok(handle)
  }

  /// Remove a value; removing a stale or unknown handle is a no-op yielding `None`.
  pub fn remove(&mut self, handle: Handle) -> Option<T> {
    match self.slots.get(handle.index) {
      | Some(Slot::Occupied { generation, .. }) if *generation == handle.generation => {
        let vacant = Slot::Vacant { generation: generation.wrapping_add(1) };
        let old = core::mem::replace(&mut self.slots[handle.index], vacant);
        self.free.push(handle.index);
        self.len -= 1;
        match old {
          | Slot::Occupied { value, .. } => Some(value),
          | Slot::Vacant { .. } => None,
        }
      },
      | _ => None,
    }
  }

  /// Borrow a value
  pub fn get(&self, handle: Handle) -> Option<&T> {
    match self.slots.get(handle.index) {
      | Some(Slot::Occupied { generation, value }) if *generation == handle.generation => {
        Some(value)
      },
      | _ => None,
    }
  }

  /// Mutably borrow a value
  pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
    match self.slots.get_mut(handle.index) {
      | Some(Slot::Occupied { generation, value }) if *generation == handle.generation => {
        Some(value)
      },
      | _ => None,
    }
  }

  /// Iterate over all stored values and their handles
  pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
    self.slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| match slot {
          | Slot::Occupied { generation, value } => Some((Handle { index,
                                                                   generation: *generation },
                                                          value)),
          | Slot::Vacant { .. } => None,
        })
  }

  /// Iterate mutably over all stored values and their handles
  pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
    self.slots
        .iter_mut()
        .enumerate()
        .filter_map(|(index, slot)| match slot {
          | Slot::Occupied { generation, value } => Some((Handle { index,
                                                                   generation: *generation },
                                                          value)),
          | Slot::Vacant { .. } => None,
        })
  }

  /// Find the first value matching a predicate
  pub fn find(&self, mut f: impl FnMut(&T) -> bool) -> Option<Handle> {
    self.iter().find(|(_, t)| f(t)).map(|(h, _)| h)
  }

  /// Handles of every value matching a predicate
  pub fn handles_where(&self, mut f: impl FnMut(&T) -> bool) -> Vec<Handle> {
    self.iter().filter(|(_, t)| f(t)).map(|(h, _)| h).collect()
  }

  /// Remove every value matching a predicate
  pub fn remove_where(&mut self, f: impl FnMut(&T) -> bool) -> Vec<T> {
    self.handles_where(f)
        .into_iter()
        .filter_map(|h| self.remove(h))
        .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stale_handle_does_not_resolve_after_reuse() {
    let mut slab = Slab::with_capacity(2);
    let a = slab.insert(1).unwrap();
    slab.remove(a);

    let b = slab.insert(2).unwrap();
    assert_ne!(a, b);
    assert_eq!(slab.get(a), None);
    assert_eq!(slab.get(b), Some(&2));
    assert_eq!(slab.remove(a), None);
    assert_eq!(slab.len(), 1);
  }

  #[test]
  fn remove_where() {
    let mut slab = Slab::with_capacity(4);
    (0..4).for_each(|n| {
            slab.insert(n).unwrap();
          });

    assert_eq!(slab.remove_where(|n| n % 2 == 0), vec![0, 2]);
    assert_eq!(slab.iter().map(|(_, n)| *n).collect::<Vec<_>>(), vec![1, 3]);
    assert!(!slab.is_full());
    assert_eq!(slab.remove_where(|_| false), Vec::<i32>::new());
  }

  #[test]
  fn grows_past_inline_storage() {
    let mut slab = Slab::with_capacity(INLINE * 2 + 1);
    let handles = (0..INLINE * 2 + 1).map(|n| slab.insert(n).unwrap())
                                     .collect::<Vec<_>>();

    assert!(slab.is_full());
    assert_eq!(slab.insert(99), Err(Full(99)));
    assert_eq!(slab.get(handles[INLINE * 2]), Some(&(INLINE * 2)));

    handles.iter().for_each(|h| {
                    slab.remove(*h);
                  });
    assert!(slab.is_empty());
    assert!(slab.insert(0).is_ok());
  }

  #[test]
  fn get_mut() {
    let mut slab = Slab::with_capacity(1);
    let h = slab.insert(String::from("a")).unwrap();
    slab.get_mut(h).unwrap().push('b');
    assert_eq!(slab.get(h).map(String::as_str), Some("ab"));
  }
}
