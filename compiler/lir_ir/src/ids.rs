//! Dense index newtypes for blocks, SSA values, and frame slots.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Create an ID from a `usize` position in a dense table.
            ///
            /// # Panics
            ///
            /// Panics if `index` does not fit in `u32`.
            #[inline]
            pub fn from_index(index: usize) -> Self {
                Self(
                    u32::try_from(index)
                        .unwrap_or_else(|_| panic!("{} index {index} exceeds u32::MAX", stringify!($name))),
                )
            }

            /// Get the raw `u32` value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Basic block ID within a [`Function`](crate::Function).
    ///
    /// Block IDs are dense and equal to the block's position in
    /// `Function::blocks`. Block 0 is always the entry block.
    BlockId,
    "bb"
);

define_id!(
    /// SSA value ID: an instruction result or a function parameter.
    ValueId,
    "%"
);

define_id!(
    /// Storage slot in an interpreter frame.
    ///
    /// Slots are handed out by the frame-slot allocator; several values may
    /// share a slot when their lifetimes do not overlap.
    SlotId,
    "$"
);

impl BlockId {
    /// The entry block of every function.
    pub const ENTRY: BlockId = BlockId(0);
}
