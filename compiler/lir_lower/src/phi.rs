//! φ-instructions resolved into per-edge parallel copies.
//!
//! A φ in block `B` with incoming `[v, P]` becomes the copy `φ := v` on the
//! edge `P → B`. All copies of one edge read their sources before any
//! destination is written, so φs that read each other (a swap in a loop
//! header, say) see the values from the end of `P`.

use lir_ir::{BlockId, Constant, Function, Instr, Operand, SlotId, ValueId};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::graph::Cfg;
use crate::layout::FrameLayout;
use crate::LoweringError;

/// Where a copy reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopySource<L> {
    Loc(L),
    Const(Constant),
}

impl From<Operand> for CopySource<ValueId> {
    fn from(op: Operand) -> Self {
        match op {
            Operand::Value(v) => CopySource::Loc(v),
            Operand::Const(c) => CopySource::Const(c),
        }
    }
}

/// `dst := src`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move<L> {
    pub dst: L,
    pub src: CopySource<L>,
}

impl<L: PartialEq> Move<L> {
    /// A move of a location onto itself.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        matches!(&self.src, CopySource::Loc(src) if *src == self.dst)
    }
}

/// Moves with simultaneous-assignment semantics.
///
/// `L` is the location type: [`ValueId`] straight out of φ resolution,
/// [`SlotId`] once mapped onto a frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParallelCopy<L> {
    moves: SmallVec<[Move<L>; 2]>,
}

impl<L> Default for ParallelCopy<L> {
    fn default() -> Self {
        Self {
            moves: SmallVec::new(),
        }
    }
}

impl<L: Copy + Eq> ParallelCopy<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dst: L, src: CopySource<L>) {
        self.moves.push(Move { dst, src });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn moves(&self) -> &[Move<L>] {
        &self.moves
    }

    /// The source currently recorded for `dst`.
    pub fn source_of(&self, dst: L) -> Option<CopySource<L>> {
        self.moves.iter().find(|m| m.dst == dst).map(|m| m.src)
    }

    /// Locations written.
    pub fn defs(&self) -> impl Iterator<Item = L> + '_ {
        self.moves.iter().map(|m| m.dst)
    }

    /// Locations read.
    pub fn uses(&self) -> impl Iterator<Item = L> + '_ {
        self.moves.iter().filter_map(|m| match m.src {
            CopySource::Loc(l) => Some(l),
            CopySource::Const(_) => None,
        })
    }

    /// Perform the copy: read every source, then write every destination.
    pub fn apply<V>(
        &self,
        mut read: impl FnMut(CopySource<L>) -> V,
        mut write: impl FnMut(L, V),
    ) {
        let values: SmallVec<[V; 4]> = self.moves.iter().map(|m| read(m.src)).collect();
        for (m, value) in self.moves.iter().zip(values) {
            write(m.dst, value);
        }
    }

    /// Order the moves so that executing them one at a time gives the same
    /// result as [`apply`](Self::apply).
    ///
    /// Trivial moves are dropped. Each cycle costs one extra move through
    /// `temp`, which must not be a location used by this copy.
    pub fn sequentialize(&self, temp: L) -> Vec<Move<L>> {
        let mut pending: Vec<Move<L>> = self
            .moves
            .iter()
            .filter(|m| !m.is_trivial())
            .copied()
            .collect();
        let mut out = Vec::with_capacity(pending.len() + 1);

        while !pending.is_empty() {
            // A move is ready once no other pending move still reads its
            // destination.
            let ready = pending.iter().position(|m| {
                !pending
                    .iter()
                    .any(|other| other.src == CopySource::Loc(m.dst))
            });
            if let Some(i) = ready {
                out.push(pending.remove(i));
                continue;
            }

            // Only cycles are left. Park one destination in `temp`.
            let parked = pending[0].dst;
            out.push(Move {
                dst: temp,
                src: CopySource::Loc(parked),
            });
            for m in &mut pending {
                if m.src == CopySource::Loc(parked) {
                    m.src = CopySource::Loc(temp);
                }
            }
        }

        out
    }
}

impl ParallelCopy<ValueId> {
    /// Map the copy onto frame slots.
    ///
    /// Destinations without a slot are never read and are dropped, as are
    /// moves that become slot-to-same-slot. A source value without a slot
    /// was never materialized and reads as `undef`.
    pub fn to_slots(&self, layout: &FrameLayout) -> ParallelCopy<SlotId> {
        let mut out = ParallelCopy::new();
        for m in &self.moves {
            let Some(dst) = layout.slot_of(m.dst) else {
                continue;
            };
            let src = match m.src {
                CopySource::Loc(v) => match layout.slot_of(v) {
                    Some(slot) => CopySource::Loc(slot),
                    None => CopySource::Const(Constant::Undef),
                },
                CopySource::Const(c) => CopySource::Const(c),
            };
            let mv = Move { dst, src };
            if !mv.is_trivial() {
                out.moves.push(mv);
            }
        }
        out
    }
}

/// Parallel copies for every CFG edge that carries φ values, keyed by
/// `(predecessor, target)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhiEdges {
    edges: FxHashMap<(BlockId, BlockId), ParallelCopy<ValueId>>,
}

impl PhiEdges {
    /// Collect the φ-instructions of `func` into edge copies.
    ///
    /// Fails with [`LoweringError::MalformedCfg`] when a φ follows a non-φ
    /// instruction, names a block that is not a predecessor, or gives two
    /// different values for the same predecessor.
    pub fn resolve(func: &Function, cfg: &Cfg) -> Result<Self, LoweringError> {
        let mut edges: FxHashMap<(BlockId, BlockId), ParallelCopy<ValueId>> = FxHashMap::default();

        for block in &func.blocks {
            let phi_count = block.phis().len();
            if block.instrs[phi_count..].iter().any(Instr::is_phi) {
                return Err(LoweringError::malformed(
                    block.id,
                    "φ after a non-φ instruction",
                ));
            }

            for instr in block.phis() {
                let Instr::Phi { dst, incoming } = instr else {
                    continue;
                };
                for inc in incoming {
                    if !cfg.predecessors(block.id).contains(&inc.block) {
                        return Err(LoweringError::malformed(
                            block.id,
                            format!("φ {dst} names {}, which is not a predecessor", inc.block),
                        ));
                    }
                    let src = CopySource::from(inc.value);
                    let copy = edges.entry((inc.block, block.id)).or_default();
                    match copy.source_of(*dst) {
                        None => copy.push(*dst, src),
                        Some(existing) if existing == src => {}
                        Some(_) => {
                            return Err(LoweringError::malformed(
                                block.id,
                                format!("φ {dst} has conflicting values from {}", inc.block),
                            ));
                        }
                    }
                }
            }
        }

        tracing::debug!(function = %func.name, edges = edges.len(), "resolved φ edges");
        Ok(PhiEdges { edges })
    }

    /// Copies on the edge `from → to`, if it carries any φ values.
    #[inline]
    pub fn get(&self, from: BlockId, to: BlockId) -> Option<&ParallelCopy<ValueId>> {
        self.edges.get(&(from, to))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, BlockId, &ParallelCopy<ValueId>)> + '_ {
        self.edges.iter().map(|(&(from, to), copy)| (from, to, copy))
    }

    /// Slot-level copies for every edge, indexed by block and then by
    /// successor position. Edges without φ values get an empty copy.
    pub fn slot_copies(&self, cfg: &Cfg, layout: &FrameLayout) -> Vec<Vec<ParallelCopy<SlotId>>> {
        (0..cfg.num_blocks())
            .map(|index| {
                let from = BlockId::from_index(index);
                cfg.successors(from)
                    .iter()
                    .map(|&to| {
                        self.get(from, to)
                            .map(|copy| copy.to_slots(layout))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }
}
