//! Knobs for a lowering run.

use lir_ir::SlotId;

/// Options controlling [`lower`](crate::lower).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    /// Maximum number of loop headers per function.
    ///
    /// `None` (the default) accepts any number; loop membership sets grow
    /// as headers are found. With `Some(n)`, finding header `n + 1` fails
    /// with [`LoweringError::TooManyLoops`](crate::LoweringError::TooManyLoops).
    pub max_loops: Option<usize>,

    /// Slots that must never be cleared, e.g. slots a debugger inspects or
    /// slots proven to be reinitialized before every read.
    pub never_nullable: Vec<SlotId>,

    /// Compute clear-before/clear-after sets. When off, every clear set is
    /// empty and slots keep their last value until the frame is dropped.
    pub clear_dead_slots: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            max_loops: None,
            never_nullable: Vec::new(),
            clear_dead_slots: true,
        }
    }
}

impl LowerOptions {
    #[must_use]
    pub fn with_max_loops(mut self, limit: usize) -> Self {
        self.max_loops = Some(limit);
        self
    }

    #[must_use]
    pub fn with_never_nullable(mut self, slots: impl IntoIterator<Item = SlotId>) -> Self {
        self.never_nullable.extend(slots);
        self
    }

    #[must_use]
    pub fn with_slot_clearing(mut self, enabled: bool) -> Self {
        self.clear_dead_slots = enabled;
        self
    }
}
