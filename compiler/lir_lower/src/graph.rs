//! Control-flow graph derived from block terminators.
//!
//! Nodes are block indices into dense adjacency tables. Loop analysis and
//! liveness keep their own per-block state in side tables indexed the same
//! way, so the graph itself never changes after [`Cfg::build`].

use fixedbitset::FixedBitSet;
use lir_ir::{BlockId, Function};
use smallvec::SmallVec;

use crate::LoweringError;

/// Successor and predecessor lists for every block of a function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cfg {
    /// Per block, successors in terminator order (duplicates kept).
    successors: Vec<SmallVec<[BlockId; 2]>>,
    /// Per block, distinct predecessors in discovery order.
    predecessors: Vec<SmallVec<[BlockId; 2]>>,
}

impl Cfg {
    /// Build the CFG of `func`.
    ///
    /// Fails with [`LoweringError::MalformedCfg`] if the function has no
    /// blocks, a block is stored out of position, or a terminator names a
    /// block that does not exist.
    pub fn build(func: &Function) -> Result<Self, LoweringError> {
        let num_blocks = func.blocks.len();
        tracing::debug!(function = %func.name, num_blocks, "building CFG");

        if num_blocks == 0 {
            return Err(LoweringError::malformed(BlockId::ENTRY, "function has no blocks"));
        }

        let mut successors = Vec::with_capacity(num_blocks);
        let mut predecessors: Vec<SmallVec<[BlockId; 2]>> = vec![SmallVec::new(); num_blocks];

        for (index, block) in func.blocks.iter().enumerate() {
            if block.id.index() != index {
                return Err(LoweringError::malformed(
                    block.id,
                    format!("block stored at position {index}"),
                ));
            }

            let succs: SmallVec<[BlockId; 2]> = block.terminator.successors().into_iter().collect();
            for &succ in &succs {
                if succ.index() >= num_blocks {
                    return Err(LoweringError::malformed(
                        block.id,
                        format!("successor {succ} does not exist"),
                    ));
                }
                let preds = &mut predecessors[succ.index()];
                if !preds.contains(&block.id) {
                    preds.push(block.id);
                }
            }
            successors.push(succs);
        }

        Ok(Cfg {
            successors,
            predecessors,
        })
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.successors.len()
    }

    /// Successors of `block` in terminator order. Position `i` is the
    /// terminator's `i`-th edge.
    #[inline]
    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        &self.successors[block.index()]
    }

    /// Distinct predecessors of `block`.
    #[inline]
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        &self.predecessors[block.index()]
    }

    /// Postorder over the blocks reachable from the entry.
    ///
    /// Iterative DFS with an explicit stack, so deep CFGs cannot overflow
    /// the native stack.
    pub fn postorder(&self) -> Vec<BlockId> {
        let num_blocks = self.num_blocks();
        let mut visited = FixedBitSet::with_capacity(num_blocks);
        let mut postorder = Vec::with_capacity(num_blocks);

        // (block, index of the next successor to look at)
        let mut stack: Vec<(BlockId, usize)> = vec![(BlockId::ENTRY, 0)];
        visited.insert(BlockId::ENTRY.index());

        while let Some(&(block, next)) = stack.last() {
            let succs = self.successors(block);
            if next < succs.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let succ = succs[next];
                if !visited.contains(succ.index()) {
                    visited.insert(succ.index());
                    stack.push((succ, 0));
                }
            } else {
                stack.pop();
                postorder.push(block);
            }
        }

        postorder
    }

    /// Reverse postorder over the blocks reachable from the entry.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut order = self.postorder();
        order.reverse();
        order
    }

    /// Blocks reachable from the entry, as a set of block indices.
    pub fn reachable(&self) -> FixedBitSet {
        let mut set = FixedBitSet::with_capacity(self.num_blocks());
        for block in self.postorder() {
            set.insert(block.index());
        }
        set
    }
}
