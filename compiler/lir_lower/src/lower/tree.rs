//! The lowered node tree.
//!
//! A [`NodeTree`] is immutable once built and holds no per-call state:
//! values, cleared slots, and the loop-exit target all live in the
//! [`Frame`](crate::dispatch::Frame) of one invocation.

use lir_ir::{BlockId, SlotId};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::loops::LoopId;
use crate::phi::ParallelCopy;

/// One basic block, as built by the node factory, plus the control data the
/// dispatcher needs around it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockNode<N> {
    pub id: BlockId,
    /// The factory's executable node for the block's instructions.
    pub node: N,
    /// Successors in terminator order.
    pub successors: SmallVec<[BlockId; 2]>,
    /// `edges[i]` runs when control leaves along `successors[i]`.
    pub edges: Vec<ParallelCopy<SlotId>>,
    pub clear_before: Vec<SlotId>,
    pub clear_after: Vec<SlotId>,
}

/// A loop turned into a state machine over its members.
///
/// Starts at the header (local index 0) and keeps dispatching while the
/// chosen successor is in `index_map`. Any other successor is an exit: it
/// is written to the loop-exit slot and control returns to the enclosing
/// dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopDispatch<N> {
    pub id: LoopId,
    pub header: BlockId,
    /// Header first, then the body in descending block order. Blocks of
    /// inner loops are not listed; each inner loop sits at its header's
    /// position as a nested dispatch.
    pub body: Vec<BodyNode<N>>,
    /// Global block id to position in `body`.
    pub index_map: FxHashMap<BlockId, usize>,
    /// Blocks control can leave the loop to, ascending.
    pub exits: Vec<BlockId>,
}

impl<N> LoopDispatch<N> {
    /// Position of `block` in this dispatch, if it is dispatched here.
    #[inline]
    pub fn local_index(&self, block: BlockId) -> Option<usize> {
        self.index_map.get(&block).copied()
    }
}

/// An entry of a dispatch list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyNode<N> {
    Block(BlockNode<N>),
    Loop(LoopDispatch<N>),
}

impl<N> BodyNode<N> {
    /// The block control enters this node through.
    pub fn entry(&self) -> BlockId {
        match self {
            BodyNode::Block(block) => block.id,
            BodyNode::Loop(dispatch) => dispatch.header,
        }
    }

    /// Number of loop dispatches in this subtree.
    pub fn dispatch_count(&self) -> usize {
        match self {
            BodyNode::Block(_) => 0,
            BodyNode::Loop(dispatch) => {
                1 + dispatch
                    .body
                    .iter()
                    .map(BodyNode::dispatch_count)
                    .sum::<usize>()
            }
        }
    }

    /// Number of block nodes in this subtree.
    pub fn block_count(&self) -> usize {
        match self {
            BodyNode::Block(_) => 1,
            BodyNode::Loop(dispatch) => dispatch.body.iter().map(BodyNode::block_count).sum(),
        }
    }
}

/// Result of lowering one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeTree<N> {
    pub(crate) name: String,
    pub(crate) nodes: Vec<Option<BodyNode<N>>>,
    pub(crate) clear_before: Vec<Vec<SlotId>>,
    pub(crate) clear_after: Vec<Vec<SlotId>>,
    pub(crate) loop_exit_slot: Option<SlotId>,
    pub(crate) frame_size: usize,
}

impl<N> NodeTree<N> {
    /// Name of the lowered function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level dispatch list, indexed by block id.
    ///
    /// Always as long as the function has blocks. A position is `None` when
    /// the block belongs to a loop; the outermost loop's dispatch sits at its
    /// header's position.
    pub fn nodes(&self) -> &[Option<BodyNode<N>>] {
        &self.nodes
    }

    /// The top-level node at `block`, if any.
    pub fn node(&self, block: BlockId) -> Option<&BodyNode<N>> {
        self.nodes.get(block.index()).and_then(Option::as_ref)
    }

    /// Slots cleared before `block` runs.
    pub fn clear_before(&self, block: BlockId) -> &[SlotId] {
        self.clear_before.get(block.index()).map_or(&[][..], Vec::as_slice)
    }

    /// Slots cleared after `block` and its outgoing edge copies.
    pub fn clear_after(&self, block: BlockId) -> &[SlotId] {
        self.clear_after.get(block.index()).map_or(&[][..], Vec::as_slice)
    }

    /// Slot carrying a loop's exit target to the enclosing dispatcher.
    /// Present exactly when the function has a loop.
    pub fn loop_exit_slot(&self) -> Option<SlotId> {
        self.loop_exit_slot
    }

    /// Frame size: the layout's slots plus the loop-exit slot.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Total number of loop dispatches, nested ones included.
    pub fn dispatch_count(&self) -> usize {
        self.nodes.iter().flatten().map(BodyNode::dispatch_count).sum()
    }

    /// Total number of block nodes reachable through the tree.
    pub fn block_count(&self) -> usize {
        self.nodes.iter().flatten().map(BodyNode::block_count).sum()
    }
}
