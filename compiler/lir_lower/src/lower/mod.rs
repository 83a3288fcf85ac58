//! Function lowering: run the analyses, build block nodes, fold loops into
//! dispatch nodes.
//!
//! # Entry point
//!
//! [`lower`] takes a [`Function`], the frame layout chosen by the slot
//! allocator, and a [`NodeFactory`] that turns a block's instructions into
//! an executable node. The result is a [`NodeTree`], or a
//! [`LoweringError`] if the function cannot be lowered at all.
//!
//! # Loop folding
//!
//! Loops are folded inner-first. Folding a loop takes its members out of
//! the flat list (header first, then body in descending order), wraps them
//! in a [`LoopDispatch`], and puts the dispatch back at the header's
//! position. Members of an already folded inner loop are gone from the list
//! by then, and the inner header's position holds the inner dispatch, so
//! the outer loop picks up the whole inner loop as one entry.

mod tree;

use lir_ir::{Block, BlockId, Function, SlotId};
use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::graph::Cfg;
use crate::layout::FrameLayout;
use crate::liveness::Liveness;
use crate::loops::{Loop, LoopForest};
use crate::phi::{ParallelCopy, PhiEdges};
use crate::{LowerOptions, LoweringError};

pub use self::tree::{BlockNode, BodyNode, LoopDispatch, NodeTree};

/// Builds the executable node for one block.
///
/// The factory owns instruction semantics; lowering only decides where
/// nodes go and which control data surrounds them.
pub trait NodeFactory {
    type Node;

    fn create_block(&mut self, block: &Block, decoration: &BlockDecoration<'_>) -> Self::Node;
}

/// Data handed to the factory alongside a block.
///
/// The dispatcher applies the clear sets and edge copies itself; they are
/// passed along for factories that want to fold them into their nodes or
/// report them.
#[derive(Clone, Copy, Debug)]
pub struct BlockDecoration<'a> {
    pub layout: &'a FrameLayout,
    pub clear_before: &'a [SlotId],
    pub clear_after: &'a [SlotId],
    /// Copies per outgoing edge, in successor order.
    pub edges: &'a [ParallelCopy<SlotId>],
}

/// Every analysis result for one function.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub cfg: Cfg,
    pub loops: LoopForest,
    pub phis: PhiEdges,
    /// Slot-level edge copies, by block and successor position.
    pub edges: Vec<Vec<ParallelCopy<SlotId>>>,
    pub liveness: Liveness,
}

impl Analysis {
    /// CFG, then loops, then φ edges, then liveness.
    pub fn run(
        func: &Function,
        layout: &FrameLayout,
        options: &LowerOptions,
    ) -> Result<Self, LoweringError> {
        let cfg = Cfg::build(func)?;
        let loops = LoopForest::analyze(&cfg, options.max_loops)?;
        let phis = PhiEdges::resolve(func, &cfg)?;
        let edges = phis.slot_copies(&cfg, layout);
        let liveness = Liveness::compute(func, &cfg, &edges, layout, options);
        Ok(Analysis {
            cfg,
            loops,
            phis,
            edges,
            liveness,
        })
    }
}

/// Lower `func` into a node tree.
#[instrument(skip_all, level = "debug", fields(function = %func.name))]
pub fn lower<F: NodeFactory>(
    func: &Function,
    layout: &FrameLayout,
    factory: &mut F,
    options: &LowerOptions,
) -> Result<NodeTree<F::Node>, LoweringError> {
    let Analysis {
        cfg,
        loops,
        edges,
        liveness,
        ..
    } = Analysis::run(func, layout, options)?;

    let num_blocks = cfg.num_blocks();
    let clear_before: Vec<Vec<SlotId>> = (0..num_blocks)
        .map(|b| liveness.clear_before_slots(BlockId::from_index(b)))
        .collect();
    let clear_after: Vec<Vec<SlotId>> = (0..num_blocks)
        .map(|b| liveness.clear_after_slots(BlockId::from_index(b)))
        .collect();

    let mut nodes: Vec<Option<BodyNode<F::Node>>> = func
        .blocks
        .iter()
        .zip(edges)
        .map(|(block, block_edges)| {
            let b = block.id.index();
            let node = factory.create_block(
                block,
                &BlockDecoration {
                    layout,
                    clear_before: &clear_before[b],
                    clear_after: &clear_after[b],
                    edges: &block_edges,
                },
            );
            Some(BodyNode::Block(BlockNode {
                id: block.id,
                node,
                successors: cfg.successors(block.id).iter().copied().collect(),
                edges: block_edges,
                clear_before: clear_before[b].clone(),
                clear_after: clear_after[b].clone(),
            }))
        })
        .collect();

    for lp in loops.sorted() {
        fold_loop(&mut nodes, lp)?;
    }

    let loop_exit_slot = (!loops.is_empty()).then(|| SlotId::from_index(layout.slot_count()));
    let frame_size = layout.slot_count() + usize::from(loop_exit_slot.is_some());

    tracing::debug!(
        num_blocks,
        loops = loops.len(),
        frame_size,
        "lowered function",
    );

    Ok(NodeTree {
        name: func.name.clone(),
        nodes,
        clear_before,
        clear_after,
        loop_exit_slot,
        frame_size,
    })
}

/// Replace the members of `lp` in `nodes` with one dispatch at the header.
fn fold_loop<N>(nodes: &mut [Option<BodyNode<N>>], lp: &Loop) -> Result<(), LoweringError> {
    let mut body = Vec::with_capacity(lp.len());
    let mut index_map = FxHashMap::default();

    for member in lp.members() {
        if let Some(node) = nodes[member.index()].take() {
            index_map.insert(member, body.len());
            body.push(node);
        }
    }

    if index_map.get(&lp.header) != Some(&0) {
        return Err(LoweringError::malformed(
            lp.header,
            format!("header of {} was folded into another loop", lp.id),
        ));
    }

    tracing::trace!(
        id = %lp.id,
        header = %lp.header,
        entries = body.len(),
        "folded loop",
    );

    nodes[lp.header.index()] = Some(BodyNode::Loop(LoopDispatch {
        id: lp.id,
        header: lp.header,
        body,
        index_map,
        exits: lp.exits.clone(),
    }));
    Ok(())
}
