//! Prepare-write staging buffer
//!
//! Fragments from Prepare Write Requests are copied into a fixed arena and
//! recorded in a fixed slot table. Nothing here ever grows after creation:
//! a fragment that does not fit is rejected and leaves the queue untouched.
use super::error::QueueFull;
use log::{trace, warn};

/// Slot describing one queued fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    handle: u16,
    offset: u16,
    start: usize,
    len: usize,
}

/// A queued fragment, borrowed from the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedWrite<'a> {
    /// Target handle
    pub handle: u16,
    /// Value offset
    pub offset: u16,
    /// Fragment bytes
    pub value: &'a [u8],
}

/// A queued fragment copied out of the arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedWrite {
    /// Target handle
    pub handle: u16,
    /// Value offset
    pub offset: u16,
    /// Fragment bytes
    pub value: Vec<u8>,
}

/// Fixed-capacity prepare-write queue
#[derive(Debug)]
pub struct PrepareWriteQueue {
    arena: Box<[u8]>,
    slots: Vec<Slot>,
    max_slots: usize,
    cursor: usize,
}

impl PrepareWriteQueue {
    /// Create a queue with `slots` entries sharing `arena_size` bytes
    pub fn new(slots: usize, arena_size: usize) -> Self {
        Self {
            arena: vec![0u8; arena_size].into_boxed_slice(),
            slots: Vec::with_capacity(slots),
            max_slots: slots,
            cursor: 0,
        }
    }

    /// Append a fragment.
    ///
    /// Fails without side effects when the slot table is full or the value
    /// would run past the end of the arena.
    pub fn enqueue(&mut self, handle: u16, offset: u16, value: &[u8]) -> Result<(), QueueFull> {
        let end = self.cursor + value.len();
        if self.slots.len() >= self.max_slots || end > self.arena.len() {
            warn!(
                "Prepare queue full: {} of {} slots, {} of {} bytes, fragment of {} bytes",
                self.slots.len(),
                self.max_slots,
                self.cursor,
                self.arena.len(),
                value.len()
            );
            return Err(QueueFull);
        }

        self.arena[self.cursor..end].copy_from_slice(value);
        self.slots.push(Slot {
            handle,
            offset,
            start: self.cursor,
            len: value.len(),
        });
        self.cursor = end;
        trace!(
            "Queued {} bytes for handle 0x{:04X} at offset {} (slot {})",
            value.len(),
            handle,
            offset,
            self.slots.len() - 1
        );
        Ok(())
    }

    /// Drop every queued fragment
    pub fn reset(&mut self) {
        self.slots.clear();
        self.cursor = 0;
    }

    /// Copy every fragment out in enqueue order, leaving the queue empty
    pub fn take_all(&mut self) -> Vec<QueuedWrite> {
        let writes = self
            .iter()
            .map(|write| QueuedWrite {
                handle: write.handle,
                offset: write.offset,
                value: write.value.to_vec(),
            })
            .collect();
        self.reset();
        writes
    }

    /// Fragments in enqueue order
    pub fn iter(&self) -> impl Iterator<Item = PreparedWrite<'_>> + '_ {
        self.slots.iter().map(move |slot| PreparedWrite {
            handle: slot.handle,
            offset: slot.offset,
            value: &self.arena[slot.start..slot.start + slot.len],
        })
    }

    /// Number of queued fragments
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bytes of arena in use
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Arena size in bytes
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Slot table size
    pub fn slot_capacity(&self) -> usize {
        self.max_slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fill_overflow_cancel_reuse() {
        let mut queue = PrepareWriteQueue::new(4, 64);
        for handle in 1..=3 {
            queue.enqueue(handle, 0, &[handle as u8; 20]).unwrap();
        }
        assert_eq!(queue.cursor(), 60);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.enqueue(4, 0, &[4; 20]), Err(QueueFull));
        assert_eq!(queue.cursor(), 60);
        assert_eq!(queue.len(), 3);

        queue.reset();
        assert_eq!((queue.len(), queue.cursor()), (0, 0));

        queue.enqueue(9, 0, &[9; 10]).unwrap();
        let first = queue.iter().next().unwrap();
        assert_eq!(first.handle, 9);
        assert_eq!(first.value, &[9; 10]);
    }

    #[test]
    fn exact_fit_is_accepted() {
        let mut queue = PrepareWriteQueue::new(2, 8);
        queue.enqueue(1, 0, &[0; 8]).unwrap();
        assert_eq!(queue.cursor(), queue.capacity());
        queue.enqueue(1, 8, &[]).unwrap();
        assert_eq!(queue.enqueue(1, 8, &[]), Err(QueueFull));
    }

    #[test]
    fn iteration_keeps_order() {
        let mut queue = PrepareWriteQueue::new(3, 16);
        queue.enqueue(7, 0, b"ab").unwrap();
        queue.enqueue(3, 2, b"cde").unwrap();
        queue.enqueue(7, 2, b"f").unwrap();
        let got: Vec<_> = queue.iter().map(|w| (w.handle, w.offset, w.value.to_vec())).collect();
        assert_eq!(
            got,
            vec![(7, 0, b"ab".to_vec()), (3, 2, b"cde".to_vec()), (7, 2, b"f".to_vec())]
        );
    }

    #[test]
    fn take_all_empties_queue() {
        let mut queue = PrepareWriteQueue::new(3, 16);
        queue.enqueue(5, 0, b"xy").unwrap();
        queue.enqueue(6, 4, b"z").unwrap();
        let writes = queue.take_all();
        assert_eq!(
            writes,
            vec![
                QueuedWrite { handle: 5, offset: 0, value: b"xy".to_vec() },
                QueuedWrite { handle: 6, offset: 4, value: b"z".to_vec() },
            ]
        );
        assert_eq!((queue.len(), queue.cursor()), (0, 0));
    }

    proptest! {
        #[test]
        fn failed_enqueue_leaves_state(lens in proptest::collection::vec(0usize..40, 1..20)) {
            let mut queue = PrepareWriteQueue::new(5, 64);
            for (i, len) in lens.into_iter().enumerate() {
                let before = (queue.len(), queue.cursor());
                let value = vec![i as u8; len];
                match queue.enqueue(i as u16 + 1, 0, &value) {
                    Ok(()) => {
                        prop_assert_eq!(queue.len(), before.0 + 1);
                        prop_assert_eq!(queue.cursor(), before.1 + len);
                    }
                    Err(QueueFull) => {
                        prop_assert_eq!((queue.len(), queue.cursor()), before);
                    }
                }
                prop_assert!(queue.len() <= queue.slot_capacity());
                prop_assert!(queue.cursor() <= queue.capacity());
            }
        }
    }
}
