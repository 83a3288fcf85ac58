//! Value-to-slot mapping handed in by the frame-slot allocator.

use lir_ir::{Function, SlotId, ValueId};

/// Where each SSA value lives in an interpreter frame.
///
/// Values without a slot (e.g. results that are never read) are simply not
/// tracked by liveness. Several values may share a slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameLayout {
    slots: Vec<Option<SlotId>>,
    slot_count: usize,
}

impl FrameLayout {
    /// An empty layout with `slot_count` slots and no values assigned.
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: Vec::new(),
            slot_count,
        }
    }

    /// Give every value of `func` its own slot, `%n` in `$n`.
    pub fn one_slot_per_value(func: &Function) -> Self {
        let count = func.value_count as usize;
        Self {
            slots: (0..count).map(|i| Some(SlotId::from_index(i))).collect(),
            slot_count: count,
        }
    }

    /// Place `value` in `slot`, growing the slot count if needed.
    pub fn assign(&mut self, value: ValueId, slot: SlotId) {
        if self.slots.len() <= value.index() {
            self.slots.resize(value.index() + 1, None);
        }
        self.slots[value.index()] = Some(slot);
        self.slot_count = self.slot_count.max(slot.index() + 1);
    }

    #[inline]
    pub fn slot_of(&self, value: ValueId) -> Option<SlotId> {
        self.slots.get(value.index()).copied().flatten()
    }

    /// Number of slots the frame needs, not counting the loop-exit slot.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}
