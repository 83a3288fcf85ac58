//! Loop detection and nesting.
//!
//! # Algorithm
//!
//! One depth-first traversal from the entry block. Every block is
//! unvisited, active (on the DFS path), or done.
//!
//! 1. An edge into an active block is a back edge. The target becomes a
//!    loop header and gets the next loop id; the edge reports that id's bit.
//! 2. A block's membership set is the union of what its successors report.
//!    When it finishes, a header removes its own bit from what it reports to
//!    its parent (the loop ends at its header) but keeps it in its stored
//!    membership.
//! 3. An edge into a done block reports that block's set again.
//! 4. Whatever the entry block ends up reporting names loops that were
//!    entered without passing their header: irreducible control flow.
//!
//! Bit membership alone can miss blocks of an inner loop that finished
//! before the outer back edge was found, so membership is then closed over
//! the "contains the header of" relation. A cycle in that relation, or two
//! loops that overlap without nesting, is also irreducible.
//!
//! Membership sets are [`FixedBitSet`]s that grow with the loop count, so
//! the number of loops is bounded only by [`LowerOptions::max_loops`].
//!
//! [`LowerOptions::max_loops`]: crate::LowerOptions::max_loops

use std::fmt;

use fixedbitset::FixedBitSet;
use lir_ir::BlockId;

use crate::graph::Cfg;
use crate::scc;
use crate::LoweringError;

/// Index of a loop within a [`LoopForest`]. Ids follow header discovery
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct LoopId(u32);

impl LoopId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// # Panics
    ///
    /// Panics if `index` does not fit in a `u32`.
    fn from_index(index: usize) -> Self {
        Self(
            u32::try_from(index)
                .unwrap_or_else(|_| panic!("LoopId index {index} exceeds u32::MAX")),
        )
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop{}", self.0)
    }
}

/// A natural loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
    pub id: LoopId,
    /// The single entry block.
    pub header: BlockId,
    /// Every member except the header, by descending block index.
    pub body: Vec<BlockId>,
    /// Directly nested loops, inner-first order.
    pub inner: Vec<LoopId>,
    /// The smallest loop containing this one.
    pub parent: Option<LoopId>,
    /// Blocks outside the loop that a member branches to, ascending.
    pub exits: Vec<BlockId>,
    members: FixedBitSet,
}

impl Loop {
    /// Whether `block` is the header or part of the body.
    #[inline]
    pub fn contains(&self, block: BlockId) -> bool {
        self.members.contains(block.index())
    }

    /// Header first, then the body.
    pub fn members(&self) -> impl Iterator<Item = BlockId> + '_ {
        std::iter::once(self.header).chain(self.body.iter().copied())
    }

    /// Number of blocks including the header.
    #[inline]
    pub fn len(&self) -> usize {
        self.body.len() + 1
    }

    /// Always `false`: a loop has at least its header.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// All loops of a function plus per-block membership.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopForest {
    /// Indexed by `LoopId::index()`.
    loops: Vec<Loop>,
    /// Inner loops before the loops containing them.
    order: Vec<LoopId>,
    /// Per block, the set of loop ids the block belongs to.
    membership: Vec<FixedBitSet>,
    /// Per block, the loop it heads.
    header_of: Vec<Option<LoopId>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    Active,
    Done,
}

/// One DFS stack entry.
struct Frame {
    block: BlockId,
    next_succ: usize,
    acc: FixedBitSet,
}

impl LoopForest {
    /// Find, validate, and nest the loops of `cfg`.
    pub fn analyze(cfg: &Cfg, max_loops: Option<usize>) -> Result<Self, LoweringError> {
        let num_blocks = cfg.num_blocks();
        let discovery = discover(cfg, max_loops)?;

        if let Some(bit) = discovery.escaping.ones().next() {
            let headers: Vec<BlockId> = discovery
                .escaping
                .ones()
                .map(|l| discovery.headers[l])
                .collect();
            tracing::debug!(loop_bit = bit, ?headers, "loop bit escaped the entry block");
            return Err(irreducible(cfg, &headers));
        }

        let loop_count = discovery.headers.len();

        // Bit membership: header plus every block that reported the bit.
        let mut members: Vec<FixedBitSet> = discovery
            .headers
            .iter()
            .map(|h| {
                let mut set = FixedBitSet::with_capacity(num_blocks);
                set.insert(h.index());
                set
            })
            .collect();
        for (block, reported) in discovery.reported.iter().enumerate() {
            for l in reported.ones() {
                members[l].insert(block);
            }
        }

        let order = nesting_order(&members, &discovery.headers).map_err(|cycle| {
            let headers: Vec<BlockId> = cycle.iter().map(|l| discovery.headers[l.index()]).collect();
            tracing::debug!(?headers, "cyclic loop nesting");
            irreducible(cfg, &headers)
        })?;

        // Close membership over nesting. `order` is inner-first, so each
        // loop is complete before it is merged outward.
        for &l in &order {
            for other in 0..loop_count {
                if other != l.index() && members[other].contains(discovery.headers[l.index()].index()) {
                    let inner = members[l.index()].clone();
                    members[other].union_with(&inner);
                }
            }
        }

        let parents = direct_parents(&members, &discovery.headers);
        check_forest(&members, &parents, &discovery.headers).map_err(|headers| irreducible(cfg, &headers))?;

        let mut loops: Vec<Loop> = Vec::with_capacity(loop_count);
        for (index, &header) in discovery.headers.iter().enumerate() {
            let set = &members[index];
            let mut body: Vec<BlockId> = set
                .ones()
                .filter(|&b| b != header.index())
                .map(BlockId::from_index)
                .collect();
            body.sort_unstable_by(|a, b| b.cmp(a));

            let mut exits: Vec<BlockId> = set
                .ones()
                .flat_map(|b| cfg.successors(BlockId::from_index(b)).iter().copied())
                .filter(|s| !set.contains(s.index()))
                .collect();
            exits.sort_unstable();
            exits.dedup();

            loops.push(Loop {
                id: LoopId::from_index(index),
                header,
                body,
                inner: Vec::new(),
                parent: parents[index],
                exits,
                members: set.clone(),
            });
        }
        for &l in &order {
            if let Some(parent) = loops[l.index()].parent {
                loops[parent.index()].inner.push(l);
            }
        }

        let mut membership = vec![FixedBitSet::with_capacity(loop_count); num_blocks];
        for lp in &loops {
            for b in lp.members.ones() {
                membership[b].insert(lp.id.index());
            }
        }
        let mut header_of = vec![None; num_blocks];
        for lp in &loops {
            header_of[lp.header.index()] = Some(lp.id);
        }

        for &l in &order {
            let lp = &loops[l.index()];
            tracing::trace!(
                id = %lp.id,
                header = %lp.header,
                blocks = lp.len(),
                exits = lp.exits.len(),
                "loop",
            );
        }
        tracing::debug!(loops = loop_count, "loop analysis done");

        Ok(LoopForest {
            loops,
            order,
            membership,
            header_of,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    #[inline]
    pub fn get(&self, id: LoopId) -> &Loop {
        &self.loops[id.index()]
    }

    /// Loops with every inner loop ahead of the loops containing it.
    pub fn sorted(&self) -> impl Iterator<Item = &Loop> + '_ {
        self.order.iter().map(|l| &self.loops[l.index()])
    }

    /// Loops not nested in any other loop, in sorted order.
    pub fn roots(&self) -> impl Iterator<Item = &Loop> + '_ {
        self.sorted().filter(|l| l.parent.is_none())
    }

    /// The loop whose header is `block`.
    #[inline]
    pub fn header_of(&self, block: BlockId) -> Option<LoopId> {
        self.header_of[block.index()]
    }

    /// Ids of every loop containing `block`.
    #[inline]
    pub fn membership(&self, block: BlockId) -> &FixedBitSet {
        &self.membership[block.index()]
    }

    /// The smallest loop containing `block`.
    pub fn innermost(&self, block: BlockId) -> Option<LoopId> {
        self.membership(block)
            .ones()
            .map(LoopId::from_index)
            .min_by_key(|l| self.loops[l.index()].len())
    }
}

/// Raw DFS result.
struct Discovery {
    /// Header of each loop, by loop id.
    headers: Vec<BlockId>,
    /// Per block, the loop bits it reported to its DFS parent.
    reported: Vec<FixedBitSet>,
    /// Bits reported by the entry block itself.
    escaping: FixedBitSet,
}

fn discover(cfg: &Cfg, max_loops: Option<usize>) -> Result<Discovery, LoweringError> {
    let num_blocks = cfg.num_blocks();
    let mut state = vec![Visit::Unvisited; num_blocks];
    let mut loop_id: Vec<Option<usize>> = vec![None; num_blocks];
    let mut headers: Vec<BlockId> = Vec::new();
    let mut reported = vec![FixedBitSet::new(); num_blocks];
    let mut escaping = FixedBitSet::new();

    state[BlockId::ENTRY.index()] = Visit::Active;
    let mut stack = vec![Frame {
        block: BlockId::ENTRY,
        next_succ: 0,
        acc: FixedBitSet::new(),
    }];

    while let Some(top) = stack.last_mut() {
        let succs = cfg.successors(top.block);
        if top.next_succ < succs.len() {
            let succ = succs[top.next_succ];
            top.next_succ += 1;
            match state[succ.index()] {
                Visit::Active => {
                    let id = match loop_id[succ.index()] {
                        Some(id) => id,
                        None => {
                            if let Some(limit) = max_loops {
                                if headers.len() >= limit {
                                    return Err(LoweringError::TooManyLoops { limit });
                                }
                            }
                            let id = headers.len();
                            headers.push(succ);
                            loop_id[succ.index()] = Some(id);
                            id
                        }
                    };
                    top.acc.grow(id + 1);
                    top.acc.insert(id);
                }
                Visit::Done => top.acc.union_with(&reported[succ.index()]),
                Visit::Unvisited => {
                    state[succ.index()] = Visit::Active;
                    stack.push(Frame {
                        block: succ,
                        next_succ: 0,
                        acc: FixedBitSet::new(),
                    });
                }
            }
            continue;
        }

        let Some(Frame {
            block, mut acc, ..
        }) = stack.pop()
        else {
            break;
        };
        if let Some(id) = loop_id[block.index()] {
            if id < acc.len() {
                acc.set(id, false);
            }
        }
        state[block.index()] = Visit::Done;
        match stack.last_mut() {
            Some(parent) => parent.acc.union_with(&acc),
            None => escaping = acc.clone(),
        }
        reported[block.index()] = acc;
    }

    Ok(Discovery {
        headers,
        reported,
        escaping,
    })
}

/// Order loops so that a loop comes after every loop whose header it holds.
///
/// Returns the loops on a containment cycle on failure.
fn nesting_order(members: &[FixedBitSet], headers: &[BlockId]) -> Result<Vec<LoopId>, Vec<LoopId>> {
    let n = headers.len();
    // contains[a] = loops whose header is a member of loop a
    let contains: Vec<Vec<usize>> = (0..n)
        .map(|a| {
            (0..n)
                .filter(|&b| b != a && members[a].contains(headers[b].index()))
                .collect()
        })
        .collect();

    let mut state = vec![Visit::Unvisited; n];
    let mut order = Vec::with_capacity(n);
    for root in 0..n {
        if state[root] != Visit::Unvisited {
            continue;
        }
        state[root] = Visit::Active;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(&(a, next)) = stack.last() {
            if let Some(&b) = contains[a].get(next) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match state[b] {
                    Visit::Unvisited => {
                        state[b] = Visit::Active;
                        stack.push((b, 0));
                    }
                    Visit::Active => {
                        let start = stack.iter().position(|&(l, _)| l == b).unwrap_or(0);
                        return Err(stack[start..].iter().map(|&(l, _)| LoopId::from_index(l)).collect());
                    }
                    Visit::Done => {}
                }
            } else {
                stack.pop();
                state[a] = Visit::Done;
                order.push(LoopId::from_index(a));
            }
        }
    }
    Ok(order)
}

/// For each loop, the smallest other loop containing its header.
fn direct_parents(members: &[FixedBitSet], headers: &[BlockId]) -> Vec<Option<LoopId>> {
    (0..headers.len())
        .map(|l| {
            (0..headers.len())
                .filter(|&o| o != l && members[o].contains(headers[l].index()))
                .min_by_key(|&o| members[o].count_ones(..))
                .map(LoopId::from_index)
        })
        .collect()
}

/// Loops must be disjoint or nested. Returns the headers of an offending
/// pair.
fn check_forest(
    members: &[FixedBitSet],
    parents: &[Option<LoopId>],
    headers: &[BlockId],
) -> Result<(), Vec<BlockId>> {
    for a in 0..headers.len() {
        for b in (a + 1)..headers.len() {
            if members[a].is_disjoint(&members[b]) {
                continue;
            }
            let nested = members[a].is_subset(&members[b]) || members[b].is_subset(&members[a]);
            if !nested {
                return Err(vec![headers[a], headers[b]]);
            }
        }
        if let Some(p) = parents[a] {
            if !members[a].is_subset(&members[p.index()]) {
                return Err(vec![headers[a], headers[p.index()]]);
            }
        }
    }
    Ok(())
}

/// Build the irreducible-flow error, naming the multi-entry region that
/// holds `headers` when one can be isolated.
fn irreducible(cfg: &Cfg, headers: &[BlockId]) -> LoweringError {
    let region = scc::region_around(cfg, headers);
    let entries = scc::region_entries(cfg, &region);
    LoweringError::IrreducibleControlFlow {
        headers: if entries.is_empty() {
            headers.to_vec()
        } else {
            entries
        },
        region,
    }
}
