//! Capacity-bounded placement of batches into the mini-blocks of the open main-block.

use crate::blockchain::MiniBlock;
use crate::config::BlockLayout;
use crate::error::ChainError;
use parking_lot::{Mutex, MutexGuard};
use rand::seq::SliceRandom;
use std::fmt;

/// Stable position of a mini-block inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MiniBlockId(pub usize);

impl fmt::Display for MiniBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Space held in one mini-block for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub id: MiniBlockId,
    pub size: usize,
    /// This reservation flipped the mini-block to full.
    pub filled: bool,
}

#[derive(Debug)]
struct ArenaState {
    reserved: Vec<usize>,
    full: Vec<bool>,
    available: Vec<usize>,
}

/// Every mini-block of one main-block, created up front.
///
/// Size accounting and the availability index live under one lock; each
/// mini-block's contents live under its own slot lock so sealing one slot never
/// blocks reservations elsewhere.
#[derive(Debug)]
pub struct MiniBlockArena {
    layout: BlockLayout,
    state: Mutex<ArenaState>,
    slots: Vec<Mutex<MiniBlock>>,
}

impl MiniBlockArena {
    pub fn new(layout: BlockLayout) -> Self {
        let count = layout.mini_blocks_per_main();
        MiniBlockArena {
            layout,
            state: Mutex::new(ArenaState {
                reserved: vec![0; count],
                full: vec![false; count],
                available: (0..count).collect(),
            }),
            slots: (0..count)
                .map(|i| Mutex::new(MiniBlock::new(i as u64)))
                .collect(),
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reserves `size` bytes in the first mini-block with room, scanning the
    /// available pool in random order.
    pub fn reserve(&self, size: usize) -> Result<Reservation, ChainError> {
        let max = self.layout.max_mini_block_size;
        if size > max {
            return Err(ChainError::SizeExceeded { size, max });
        }

        let mut state = self.state.lock();
        let mut order: Vec<usize> = (0..state.available.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        let position = order
            .into_iter()
            .find(|&pos| state.reserved[state.available[pos]] + size <= max)
            .ok_or(ChainError::NoCapacity { size })?;

        let id = state.available[position];
        state.reserved[id] += size;
        let filled = state.reserved[id] >= max;
        if filled {
            state.full[id] = true;
            state.available.swap_remove(position);
        }

        Ok(Reservation {
            id: MiniBlockId(id),
            size,
            filled,
        })
    }

    /// Gives back the space of a reservation whose batch was never committed.
    pub fn release(&self, reservation: &Reservation) {
        let id = reservation.id.0;
        let mut state = self.state.lock();
        state.reserved[id] = state.reserved[id].saturating_sub(reservation.size);
        if state.full[id] && state.reserved[id] < self.layout.max_mini_block_size {
            state.full[id] = false;
            state.available.push(id);
        }
    }

    /// Bytes currently reserved in mini-block `id`, committed or not.
    pub fn reserved(&self, id: MiniBlockId) -> usize {
        self.state.lock().reserved.get(id.0).copied().unwrap_or(0)
    }

    pub fn available_count(&self) -> usize {
        self.state.lock().available.len()
    }

    /// No mini-block can take even a one-byte batch.
    pub fn is_exhausted(&self) -> bool {
        self.state.lock().available.is_empty()
    }

    pub fn lock_slot(&self, id: MiniBlockId) -> Option<MutexGuard<'_, MiniBlock>> {
        self.slots.get(id.0).map(|slot| slot.lock())
    }

    pub fn get(&self, id: MiniBlockId) -> Option<MiniBlock> {
        self.lock_slot(id).map(|mini| mini.clone())
    }

    /// Committed mini-blocks only; unreserved and in-flight space is not visible.
    pub fn snapshot(&self) -> Vec<MiniBlock> {
        self.slots
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|mini| mini.is_sealed())
            .collect()
    }

    pub fn has_committed(&self) -> bool {
        self.slots.iter().any(|slot| slot.lock().is_sealed())
    }

    pub fn transaction_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.lock().transactions.len()).sum()
    }

    /// Consumes the arena, grouping mini-blocks per sub-block position.
    pub fn into_groups(self) -> Vec<Vec<MiniBlock>> {
        let per_sub = self.layout.mini_blocks_per_sub.max(1);
        let mut groups: Vec<Vec<MiniBlock>> = Vec::with_capacity(self.layout.sub_blocks_per_main);
        for (i, slot) in self.slots.into_iter().enumerate() {
            if i % per_sub == 0 {
                groups.push(Vec::with_capacity(per_sub));
            }
            if let Some(group) = groups.last_mut() {
                group.push(slot.into_inner());
            }
        }
        groups
    }
}
