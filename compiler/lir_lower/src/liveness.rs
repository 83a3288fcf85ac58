//! Backward dataflow liveness over frame slots.
//!
//! Computes which slots may still be read at every block boundary and,
//! from that, which slots can be cleared before entering and after leaving
//! each block.
//!
//! # Program points
//!
//! Leaving block `P` along the edge to `S` happens in this order: `P`'s
//! instructions and terminator, then the edge's parallel copy (φ values,
//! and the `Invoke` result on its normal edge), then `S`. So:
//!
//! - `live_end(P) = ∪ ((live_in(S) − edge_defs(P,S)) ∪ edge_uses(P,S))`
//! - `live_in(B) = gen(B) ∪ (live_end(B) − kill(B))`
//! - `live_out(B) = ∪ live_in(S)`, the point after the edge copies
//!
//! `gen`/`kill` cover the non-φ instructions and the terminator. φs are not
//! instructions of their own block at all: their reads and writes belong to
//! the incoming edges. Parameters are written by the caller before the
//! entry block runs.
//!
//! # Clear sets
//!
//! - `clear_before(B) = (∪ live_out(P) for P ∈ preds(B)) − live_in(B)`
//! - `clear_after(B) = (live_in(B) ∪ kill(B) ∪ edge_defs(B,*)) − live_out(B)`
//!
//! Both exclude the never-nullable slots. For the entry block the caller
//! counts as a predecessor whose `live_out` is the parameter slots, so
//! unused parameters are cleared on entry.

use fixedbitset::FixedBitSet;
use lir_ir::{Block, BlockId, Function, SlotId, ValueId};
use smallvec::SmallVec;

use crate::graph::Cfg;
use crate::layout::FrameLayout;
use crate::phi::ParallelCopy;
use crate::LowerOptions;

/// Set of slots, indexed by `SlotId::index()`.
pub type SlotSet = FixedBitSet;

/// Liveness and clear sets for every block, indexed by `BlockId::index()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Liveness {
    /// Slots live on entry to the block, after incoming edge copies.
    pub live_in: Vec<SlotSet>,
    /// Slots live once control has left the block, after outgoing edge
    /// copies.
    pub live_out: Vec<SlotSet>,
    /// Slots that may be cleared right before the block runs.
    pub clear_before: Vec<SlotSet>,
    /// Slots that may be cleared right after the block and its outgoing
    /// edge copies.
    pub clear_after: Vec<SlotSet>,
}

/// Reads and writes attached to one outgoing edge.
struct EdgeEffects {
    defs: SlotSet,
    uses: SlotSet,
}

impl Liveness {
    /// Run the analysis.
    ///
    /// `edges[b][i]` is the slot-level copy on block `b`'s `i`-th outgoing
    /// edge, as produced by [`PhiEdges::slot_copies`](crate::phi::PhiEdges::slot_copies).
    pub fn compute(
        func: &Function,
        cfg: &Cfg,
        edges: &[Vec<ParallelCopy<SlotId>>],
        layout: &FrameLayout,
        options: &LowerOptions,
    ) -> Self {
        let num_blocks = cfg.num_blocks();
        let width = layout.slot_count();

        tracing::debug!(
            function = %func.name,
            num_blocks,
            slots = width,
            "computing liveness",
        );

        let empty = SlotSet::with_capacity(width);
        let insert = |set: &mut SlotSet, value: ValueId| {
            if let Some(slot) = layout.slot_of(value) {
                set.insert(slot.index());
            }
        };

        // Step 1: gen/kill and edge effects per block.
        let mut gen = Vec::with_capacity(num_blocks);
        let mut kill = Vec::with_capacity(num_blocks);
        let mut effects: Vec<SmallVec<[EdgeEffects; 2]>> = Vec::with_capacity(num_blocks);

        for block in &func.blocks {
            let (block_gen, block_kill) = compute_gen_kill(block, layout, width);
            gen.push(block_gen);
            kill.push(block_kill);

            let copies = edges.get(block.id.index()).map_or(&[][..], Vec::as_slice);
            let block_effects = cfg
                .successors(block.id)
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    let mut defs = empty.clone();
                    let mut uses = empty.clone();
                    if let Some(copy) = copies.get(i) {
                        for slot in copy.defs() {
                            defs.insert(slot.index());
                        }
                        for slot in copy.uses() {
                            uses.insert(slot.index());
                        }
                    }
                    if let Some(dst) = block.terminator.defined_on_edge(i) {
                        insert(&mut defs, dst);
                    }
                    EdgeEffects { defs, uses }
                })
                .collect();
            effects.push(block_effects);
        }

        // Step 2: postorder for convergence, then blocks the entry cannot
        // reach so they still get sets.
        let mut order = cfg.postorder();
        let reachable = cfg.reachable();
        order.extend(
            (0..num_blocks)
                .filter(|&b| !reachable.contains(b))
                .map(BlockId::from_index),
        );

        // Step 3: fixed point on live_in.
        let mut live_in = vec![empty.clone(); num_blocks];
        let mut iterations = 0u32;
        loop {
            iterations += 1;
            let mut changed = false;

            for &block in &order {
                let b = block.index();
                let mut live_end = empty.clone();
                for (succ, edge) in cfg.successors(block).iter().zip(&effects[b]) {
                    let mut through = live_in[succ.index()].clone();
                    through.difference_with(&edge.defs);
                    through.union_with(&edge.uses);
                    live_end.union_with(&through);
                }

                let mut new_in = live_end;
                new_in.difference_with(&kill[b]);
                new_in.union_with(&gen[b]);

                if new_in != live_in[b] {
                    live_in[b] = new_in;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        let live_out: Vec<SlotSet> = (0..num_blocks)
            .map(|b| {
                let mut out = empty.clone();
                for succ in cfg.successors(BlockId::from_index(b)) {
                    out.union_with(&live_in[succ.index()]);
                }
                out
            })
            .collect();

        tracing::debug!(iterations, "liveness converged");

        let (clear_before, clear_after) = if options.clear_dead_slots {
            let mut never = empty.clone();
            for slot in &options.never_nullable {
                if slot.index() < width {
                    never.insert(slot.index());
                }
            }

            let mut params = empty.clone();
            for &param in &func.params {
                insert(&mut params, param);
            }

            let clear_before = (0..num_blocks)
                .map(|b| {
                    let block = BlockId::from_index(b);
                    let mut set = if block == BlockId::ENTRY {
                        params.clone()
                    } else {
                        empty.clone()
                    };
                    for pred in cfg.predecessors(block) {
                        set.union_with(&live_out[pred.index()]);
                    }
                    set.difference_with(&live_in[b]);
                    set.difference_with(&never);
                    set
                })
                .collect();

            let clear_after = (0..num_blocks)
                .map(|b| {
                    let mut set = live_in[b].clone();
                    set.union_with(&kill[b]);
                    for edge in &effects[b] {
                        set.union_with(&edge.defs);
                    }
                    set.difference_with(&live_out[b]);
                    set.difference_with(&never);
                    set
                })
                .collect();

            (clear_before, clear_after)
        } else {
            (vec![empty.clone(); num_blocks], vec![empty; num_blocks])
        };

        Liveness {
            live_in,
            live_out,
            clear_before,
            clear_after,
        }
    }

    /// Whether `slot` is live on entry to `block`.
    #[inline]
    pub fn is_live_in(&self, block: BlockId, slot: SlotId) -> bool {
        self.live_in[block.index()].contains(slot.index())
    }

    pub fn clear_before_slots(&self, block: BlockId) -> Vec<SlotId> {
        slots(&self.clear_before[block.index()])
    }

    pub fn clear_after_slots(&self, block: BlockId) -> Vec<SlotId> {
        slots(&self.clear_after[block.index()])
    }
}

/// The members of `set`, ascending.
pub fn slots(set: &SlotSet) -> Vec<SlotId> {
    set.ones().map(SlotId::from_index).collect()
}

/// Walk the block forward. A slot is in `gen` if it is read before the
/// block writes it, and in `kill` if the block writes it.
fn compute_gen_kill(block: &Block, layout: &FrameLayout, width: usize) -> (SlotSet, SlotSet) {
    let mut gen = SlotSet::with_capacity(width);
    let mut kill = SlotSet::with_capacity(width);

    for instr in block.body() {
        for value in instr.used_values() {
            if let Some(slot) = layout.slot_of(value) {
                if !kill.contains(slot.index()) {
                    gen.insert(slot.index());
                }
            }
        }
        if let Some(slot) = instr.defined_value().and_then(|v| layout.slot_of(v)) {
            kill.insert(slot.index());
        }
    }

    for value in block.terminator.used_values() {
        if let Some(slot) = layout.slot_of(value) {
            if !kill.contains(slot.index()) {
                gen.insert(slot.index());
            }
        }
    }

    (gen, kill)
}
