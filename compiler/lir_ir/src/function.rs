//! Basic blocks and functions.

use crate::ids::{BlockId, ValueId};
use crate::instr::{Instr, Terminator};

/// A basic block: leading φ-instructions, straight-line body, one terminator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    /// This block's identifier; equals its index in `Function::blocks`.
    pub id: BlockId,
    /// Instructions in execution order. φs come first.
    pub instrs: Vec<Instr>,
    /// How control leaves this block.
    pub terminator: Terminator,
}

impl Block {
    /// The leading φ-instructions of this block.
    pub fn phis(&self) -> &[Instr] {
        let end = self
            .instrs
            .iter()
            .position(|i| !i.is_phi())
            .unwrap_or(self.instrs.len());
        &self.instrs[..end]
    }

    /// The non-φ instructions of this block.
    pub fn body(&self) -> &[Instr] {
        &self.instrs[self.phis().len()..]
    }
}

/// A function in block form.
///
/// Produced once by the IR producer and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    pub name: String,
    /// Parameter values, bound before the entry block runs.
    pub params: Vec<ValueId>,
    /// Blocks in definition order. `blocks[0]` is the entry.
    pub blocks: Vec<Block>,
    /// Number of SSA values (parameters and instruction results).
    pub value_count: u32,
}

impl Function {
    /// The entry block ID (always block 0).
    #[inline]
    pub fn entry(&self) -> BlockId {
        BlockId::ENTRY
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Look up a block by ID.
    #[inline]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }
}
