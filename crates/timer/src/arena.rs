//! Generational slot storage for timers.
//!
//! A [`TimerId`] is a non-owning handle: it names a slot and the generation
//! that slot had when the timer was inserted. Destroying a timer bumps the
//! slot generation, so every outstanding handle to it resolves to nothing,
//! even after the slot is reused for a new timer.

use std::fmt;

use crate::timer::Timer;

/// Stable, copyable handle to a timer stored in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId {
    index: u32,
    generation: u32,
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    timer: Option<Timer>,
}

#[derive(Debug, Default)]
pub(crate) struct TimerArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl TimerArena {
    pub(crate) fn insert(&mut self, timer: Timer) -> TimerId {
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.timer.is_none(), "free list pointed at an occupied slot");
            slot.timer = Some(timer);
            return TimerId {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).expect("timer arena exceeded u32::MAX slots");
        self.slots.push(Slot {
            generation: 0,
            timer: Some(timer),
        });
        TimerId {
            index,
            generation: 0,
        }
    }

    /// Take the timer out of its slot. Every handle to it goes dead.
    pub(crate) fn remove(&mut self, id: TimerId) -> Option<Timer> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let timer = slot.timer.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(timer)
    }

    pub(crate) fn get(&self, id: TimerId) -> Option<&Timer> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.timer.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.timer.as_mut())
    }

    pub(crate) fn contains(&self, id: TimerId) -> bool {
        self.get(id).is_some()
    }

    /// Number of timers currently stored.
    pub(crate) fn len(&self) -> usize {
        self.live
    }
}
