//! Executing a [`NodeTree`].
//!
//! The tree is shared and immutable; everything that changes during a call
//! lives in a [`Frame`]. Per block the dispatcher runs the node, applies
//! the taken edge's parallel copy, clears the block's dead slots, moves to
//! the successor, and clears the successor's dead-on-entry slots.
//!
//! A loop dispatch runs until a successor outside the loop is chosen. It
//! writes that block to the loop-exit slot and returns; the enclosing
//! dispatcher reads the slot and continues there.

use lir_ir::{BlockId, Constant, SlotId};

use crate::lower::{BlockNode, BodyNode, LoopDispatch, NodeTree};
use crate::phi::{CopySource, ParallelCopy};

/// A value that can live in a frame slot.
pub trait FrameValue: Clone {
    fn from_constant(constant: Constant) -> Self;
}

/// Contents of one frame slot.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotValue<V> {
    /// Never written, or cleared as dead.
    Empty,
    Value(V),
    /// A block id, used by the loop-exit slot.
    Block(BlockId),
}

impl<V> Default for SlotValue<V> {
    fn default() -> Self {
        SlotValue::Empty
    }
}

/// Per-call storage.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<V> {
    slots: Vec<SlotValue<V>>,
}

impl<V: FrameValue> Frame<V> {
    /// A frame with `size` empty slots.
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![SlotValue::Empty; size],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// The value in `slot`, if it holds one.
    pub fn get(&self, slot: SlotId) -> Option<&V> {
        match self.slots.get(slot.index()) {
            Some(SlotValue::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Store `value` in `slot`. The frame grows if `slot` is past its end.
    pub fn set(&mut self, slot: SlotId, value: V) {
        self.put(slot, SlotValue::Value(value));
    }

    #[inline]
    pub fn is_empty(&self, slot: SlotId) -> bool {
        matches!(self.slots.get(slot.index()), None | Some(SlotValue::Empty))
    }

    pub fn clear(&mut self, slot: SlotId) {
        if let Some(cell) = self.slots.get_mut(slot.index()) {
            *cell = SlotValue::Empty;
        }
    }

    fn clear_all(&mut self, slots: &[SlotId]) {
        for &slot in slots {
            self.clear(slot);
        }
    }

    fn put(&mut self, slot: SlotId, value: SlotValue<V>) {
        let index = slot.index();
        if index >= self.slots.len() {
            self.slots.resize(index + 1, SlotValue::Empty);
        }
        self.slots[index] = value;
    }

    /// Take a block id out of `slot`, leaving it empty.
    fn take_block(&mut self, slot: SlotId) -> Option<BlockId> {
        let cell = self.slots.get_mut(slot.index())?;
        match std::mem::take(cell) {
            SlotValue::Block(block) => Some(block),
            other => {
                *cell = other;
                None
            }
        }
    }

    fn apply(&mut self, copy: &ParallelCopy<SlotId>) {
        let slots = &self.slots;
        let mut writes = Vec::with_capacity(copy.len());
        copy.apply(
            |src| match src {
                CopySource::Loc(slot) => slots.get(slot.index()).cloned().unwrap_or_default(),
                CopySource::Const(c) => SlotValue::Value(V::from_constant(c)),
            },
            |dst, value| writes.push((dst, value)),
        );
        for (dst, value) in writes {
            self.put(dst, value);
        }
    }
}

/// How control leaves a block node.
#[derive(Clone, Debug, PartialEq)]
pub enum Transfer<V> {
    /// Take the successor at this position of the block's terminator.
    Branch(usize),
    Return(Option<V>),
}

/// An executable block node.
pub trait ExecuteBlock {
    type Value: FrameValue;
    type Error;

    fn execute(&self, frame: &mut Frame<Self::Value>) -> Result<Transfer<Self::Value>, Self::Error>;
}

/// Why execution stopped early.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError<E> {
    #[error("{block}: {error}")]
    Node { block: BlockId, error: E },

    #[error("{block} took successor {index}, which it does not have")]
    InvalidSuccessor { block: BlockId, index: usize },

    #[error("loop at {header} exited without a resume target")]
    MissingLoopExit { header: BlockId },

    #[error("no node to dispatch for {block}")]
    MissingNode { block: BlockId },
}

/// Counters for one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Block nodes executed.
    pub blocks: u64,
    /// Transfers from inside a loop back to its header.
    pub back_edges: u64,
    /// Times a loop dispatch was entered from outside.
    pub loop_entries: u64,
}

/// Result of a completed call.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome<V> {
    pub value: Option<V>,
    pub stats: ExecStats,
}

enum Step<V> {
    Goto(BlockId),
    Return(Option<V>),
}

enum LoopEnd<V> {
    /// The function returned from inside the loop.
    Returned(Option<V>),
    /// The exit target is in the loop-exit slot.
    Exited,
}

type DispatchResult<T, N> = Result<T, DispatchError<<N as ExecuteBlock>::Error>>;

impl<N: ExecuteBlock> NodeTree<N> {
    /// A fresh frame sized for this tree.
    pub fn new_frame(&self) -> Frame<N::Value> {
        Frame::new(self.frame_size)
    }

    /// Run the function on `frame`, starting at the entry block.
    ///
    /// Parameters must already be stored in their slots.
    pub fn execute(&self, frame: &mut Frame<N::Value>) -> DispatchResult<Outcome<N::Value>, N> {
        let mut stats = ExecStats::default();
        let mut current = BlockId::ENTRY;
        frame.clear_all(self.clear_before(current));

        loop {
            let node = self
                .node(current)
                .ok_or(DispatchError::MissingNode { block: current })?;
            match self.run_node(node, frame, &mut stats)? {
                Step::Return(value) => return Ok(Outcome { value, stats }),
                Step::Goto(next) => {
                    frame.clear_all(self.clear_before(next));
                    current = next;
                }
            }
        }
    }

    fn run_node(
        &self,
        node: &BodyNode<N>,
        frame: &mut Frame<N::Value>,
        stats: &mut ExecStats,
    ) -> DispatchResult<Step<N::Value>, N> {
        match node {
            BodyNode::Block(block) => run_block(block, frame, stats),
            BodyNode::Loop(dispatch) => {
                let missing = || DispatchError::MissingLoopExit {
                    header: dispatch.header,
                };
                let exit_slot = self.loop_exit_slot.ok_or_else(missing)?;
                stats.loop_entries += 1;
                match self.run_loop(dispatch, exit_slot, frame, stats)? {
                    LoopEnd::Returned(value) => Ok(Step::Return(value)),
                    LoopEnd::Exited => frame.take_block(exit_slot).map(Step::Goto).ok_or_else(missing),
                }
            }
        }
    }

    /// Dispatch inside `lp` until the function returns or control leaves
    /// the loop.
    fn run_loop(
        &self,
        lp: &LoopDispatch<N>,
        exit_slot: SlotId,
        frame: &mut Frame<N::Value>,
        stats: &mut ExecStats,
    ) -> DispatchResult<LoopEnd<N::Value>, N> {
        let mut local = 0;
        loop {
            let node = lp
                .body
                .get(local)
                .ok_or(DispatchError::MissingNode { block: lp.header })?;
            match self.run_node(node, frame, stats)? {
                Step::Return(value) => return Ok(LoopEnd::Returned(value)),
                Step::Goto(next) => match lp.local_index(next) {
                    Some(index) => {
                        if index == 0 {
                            stats.back_edges += 1;
                        }
                        frame.clear_all(self.clear_before(next));
                        local = index;
                    }
                    None => {
                        frame.put(exit_slot, SlotValue::Block(next));
                        return Ok(LoopEnd::Exited);
                    }
                },
            }
        }
    }
}

fn run_block<N: ExecuteBlock>(
    block: &BlockNode<N>,
    frame: &mut Frame<N::Value>,
    stats: &mut ExecStats,
) -> DispatchResult<Step<N::Value>, N> {
    stats.blocks += 1;
    let transfer = block
        .node
        .execute(frame)
        .map_err(|error| DispatchError::Node {
            block: block.id,
            error,
        })?;

    match transfer {
        Transfer::Return(value) => Ok(Step::Return(value)),
        Transfer::Branch(index) => {
            let next = block
                .successors
                .get(index)
                .copied()
                .ok_or(DispatchError::InvalidSuccessor {
                    block: block.id,
                    index,
                })?;
            if let Some(copy) = block.edges.get(index) {
                frame.apply(copy);
            }
            frame.clear_all(&block.clear_after);
            Ok(Step::Goto(next))
        }
    }
}
