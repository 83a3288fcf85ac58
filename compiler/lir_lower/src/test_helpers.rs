//! Shared test utilities: id shorthands, CFG-shaped functions, the
//! scenario fixtures, reference analyses, a generator for φ-carrying
//! programs, and two integer interpreters: one over block nodes and one
//! straight over the SSA function. Only compiled in test builds.

use std::collections::BTreeMap;

use fixedbitset::FixedBitSet;
use lir_ir::{
    BinaryOp, Block, BlockId, ComparePred, Constant, Function, FunctionBuilder, Instr, Operand,
    SlotId, Terminator, UnaryOp, ValueId,
};

use crate::dispatch::{ExecuteBlock, Frame, FrameValue, Transfer};
use crate::graph::Cfg;
use crate::layout::FrameLayout;
use crate::lower::{lower, BlockDecoration, NodeFactory, NodeTree};
use crate::{LowerOptions, LoweringError};

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// Shorthand for `ValueId::new(n)`.
pub(crate) fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

/// Shorthand for `SlotId::new(n)`.
pub(crate) fn s(n: u32) -> SlotId {
    SlotId::new(n)
}

pub(crate) fn int(i: i64) -> Operand {
    Operand::Const(Constant::Int(i))
}

/// A function with only control flow: block `i` branches to `succs[i]`.
///
/// No successors → `ret`, one → `br`, two → `br %0, ...`, more → `switch`
/// on `%0` with the last target as default.
pub(crate) fn cfg_func(succs: &[&[u32]]) -> Function {
    let mut fb = FunctionBuilder::new("cfg");
    let cond = fb.param();
    for _ in 1..succs.len() {
        fb.new_block();
    }
    for (i, targets) in succs.iter().enumerate() {
        fb.position_at(BlockId::from_index(i));
        match targets {
            [] => fb.terminate_return(None),
            [target] => fb.terminate_br(b(*target)),
            [then_block, else_block] => fb.terminate_cond_br(cond.into(), b(*then_block), b(*else_block)),
            [cases @ .., default] => {
                let cases = cases
                    .iter()
                    .zip(0i64..)
                    .map(|(&t, value)| (value, b(t)))
                    .collect();
                fb.terminate_switch(cond.into(), cases, b(*default));
            }
        }
    }
    fb.finish()
}

// Scenario fixtures

/// `bb0 → bb1 → bb2`; returns `(n + 1) * 2`.
pub(crate) fn straight_line() -> Function {
    let mut fb = FunctionBuilder::new("straight_line");
    let n = fb.param();
    let bb1 = fb.new_block();
    let bb2 = fb.new_block();
    let y = fb.emit_binary(BinaryOp::Add, n.into(), int(1));
    fb.terminate_br(bb1);

    fb.position_at(bb1);
    let z = fb.emit_binary(BinaryOp::Mul, y.into(), int(2));
    fb.terminate_br(bb2);

    fb.position_at(bb2);
    fb.terminate_return(Some(z.into()));
    fb.finish()
}

/// Sum of `0..n`.
///
/// ```text
/// bb0: br bb1
/// bb1: %1 = phi [0, bb0], [%4, bb2]
///      %2 = phi [0, bb0], [%5, bb2]
///      %3 = cmp lt %1, %0
///      br %3, bb2, bb3
/// bb2: %4 = add %1, 1
///      %5 = add %2, %1
///      br bb1
/// bb3: ret %2
/// ```
pub(crate) fn loop_sum() -> Function {
    let mut fb = FunctionBuilder::new("loop_sum");
    let n = fb.param();
    let header = fb.new_block();
    let body = fb.new_block();
    let exit = fb.new_block();
    fb.terminate_br(header);

    fb.position_at(header);
    let i = fb.emit_phi(vec![(b(0), int(0))]);
    let acc = fb.emit_phi(vec![(b(0), int(0))]);
    let more = fb.emit_compare(ComparePred::Lt, i.into(), n.into());
    fb.terminate_cond_br(more.into(), body, exit);

    fb.position_at(body);
    let next_i = fb.emit_binary(BinaryOp::Add, i.into(), int(1));
    let next_acc = fb.emit_binary(BinaryOp::Add, acc.into(), i.into());
    fb.terminate_br(header);
    fb.add_phi_incoming(header, i, body, next_i.into());
    fb.add_phi_incoming(header, acc, body, next_acc.into());

    fb.position_at(exit);
    fb.terminate_return(Some(acc.into()));
    fb.finish()
}

/// `Σ_{i<n} Σ_{j<i} j`, with the outer loop at bb1 and the inner at bb2.
///
/// ```text
/// bb0 → bb1
/// bb1 → {bb2, bb5}   outer header
/// bb2 → {bb3, bb4}   inner header
/// bb3 → bb2          inner latch
/// bb4 → bb1          outer latch
/// bb5: ret
/// ```
pub(crate) fn nested_loop_sum() -> Function {
    let mut fb = FunctionBuilder::new("nested_loop_sum");
    let n = fb.param();
    let outer = fb.new_block();
    let inner = fb.new_block();
    let inner_latch = fb.new_block();
    let outer_latch = fb.new_block();
    let exit = fb.new_block();
    fb.terminate_br(outer);

    fb.position_at(outer);
    let i = fb.emit_phi(vec![(b(0), int(0))]);
    let total = fb.emit_phi(vec![(b(0), int(0))]);
    let more_i = fb.emit_compare(ComparePred::Lt, i.into(), n.into());
    fb.terminate_cond_br(more_i.into(), inner, exit);

    fb.position_at(inner);
    let j = fb.emit_phi(vec![(outer, int(0))]);
    let t = fb.emit_phi(vec![(outer, total.into())]);
    let more_j = fb.emit_compare(ComparePred::Lt, j.into(), i.into());
    fb.terminate_cond_br(more_j.into(), inner_latch, outer_latch);

    fb.position_at(inner_latch);
    let next_j = fb.emit_binary(BinaryOp::Add, j.into(), int(1));
    let next_t = fb.emit_binary(BinaryOp::Add, t.into(), j.into());
    fb.terminate_br(inner);
    fb.add_phi_incoming(inner, j, inner_latch, next_j.into());
    fb.add_phi_incoming(inner, t, inner_latch, next_t.into());

    fb.position_at(outer_latch);
    let next_i = fb.emit_binary(BinaryOp::Add, i.into(), int(1));
    fb.terminate_br(outer);
    fb.add_phi_incoming(outer, i, outer_latch, next_i.into());
    fb.add_phi_incoming(outer, total, outer_latch, t.into());

    fb.position_at(exit);
    fb.terminate_return(Some(total.into()));
    fb.finish()
}

/// Two loop headers entered separately from the entry and closed by one
/// shared latch.
///
/// ```text
/// bb0 → {bb1, bb2}
/// bb1 → bb3
/// bb2 → bb3
/// bb3 → {bb1, bb2}
/// ```
pub(crate) fn irreducible() -> Function {
    cfg_func(&[&[1, 2], &[3], &[3], &[1, 2]])
}

/// `|x - y|`: `x - y` along `P → B`, `y - x` along `Q → B`, via two
/// crossing φs.
///
/// ```text
/// bb0 (P): %2 = cmp gt %0, %1
///          br %2, bb2, bb1
/// bb1 (Q): br bb2
/// bb2 (B): %3 = phi [%0, bb0], [%1, bb1]
///          %4 = phi [%1, bb0], [%0, bb1]
///          %5 = sub %3, %4
///          ret %5
/// ```
pub(crate) fn phi_swap() -> Function {
    let mut fb = FunctionBuilder::new("phi_swap");
    let x = fb.param();
    let y = fb.param();
    let q = fb.new_block();
    let join = fb.new_block();
    let take_p = fb.emit_compare(ComparePred::Gt, x.into(), y.into());
    fb.terminate_cond_br(take_p.into(), join, q);

    fb.position_at(q);
    fb.terminate_br(join);

    fb.position_at(join);
    let first = fb.emit_phi(vec![(b(0), x.into()), (q, y.into())]);
    let second = fb.emit_phi(vec![(b(0), y.into()), (q, x.into())]);
    let diff = fb.emit_binary(BinaryOp::Sub, first.into(), second.into());
    fb.terminate_return(Some(diff.into()));
    fb.finish()
}

// Reference analyses

/// Dominator sets by the iterative data-flow algorithm. `None` for blocks
/// the entry cannot reach.
pub(crate) fn dominators(cfg: &Cfg) -> Vec<Option<FixedBitSet>> {
    let reachable = cfg.reachable();
    let mut dom: Vec<Option<FixedBitSet>> = (0..cfg.num_blocks())
        .map(|index| reachable.contains(index).then(|| reachable.clone()))
        .collect();
    let mut entry = FixedBitSet::with_capacity(cfg.num_blocks());
    entry.insert(BlockId::ENTRY.index());
    dom[BlockId::ENTRY.index()] = Some(entry);

    let order = cfg.reverse_postorder();
    let mut changed = true;
    while changed {
        changed = false;
        for &block in order.iter().filter(|&&block| block != BlockId::ENTRY) {
            let mut next = reachable.clone();
            for pred in cfg.predecessors(block) {
                if let Some(pred_dom) = &dom[pred.index()] {
                    next.intersect_with(pred_dom);
                }
            }
            next.insert(block.index());
            if dom[block.index()].as_ref() != Some(&next) {
                dom[block.index()] = Some(next);
                changed = true;
            }
        }
    }
    dom
}

/// Natural loops keyed by header, or `None` if the CFG is irreducible.
///
/// An edge into a dominator of its source is a back edge. The CFG is
/// reducible iff the remaining edges are acyclic. A header's loop is the
/// union of the natural loops of all its back edges. Unreachable blocks
/// are ignored.
pub(crate) fn natural_loops(cfg: &Cfg) -> Option<BTreeMap<BlockId, FixedBitSet>> {
    let n = cfg.num_blocks();
    let dom = dominators(cfg);
    let mut loops: BTreeMap<BlockId, FixedBitSet> = BTreeMap::new();
    let mut forward: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (from, from_dom) in dom.iter().enumerate() {
        let Some(from_dom) = from_dom else { continue };
        for &to in cfg.successors(BlockId::from_index(from)) {
            if !from_dom.contains(to.index()) {
                forward[from].push(to.index());
                continue;
            }
            let body = loops.entry(to).or_insert_with(|| FixedBitSet::with_capacity(n));
            body.insert(to.index());
            let mut work = vec![from];
            while let Some(block) = work.pop() {
                if body.put(block) {
                    continue;
                }
                work.extend(
                    cfg.predecessors(BlockId::from_index(block))
                        .iter()
                        .map(|pred| pred.index())
                        .filter(|&pred| dom[pred].is_some()),
                );
            }
        }
    }

    let mut indegree = vec![0usize; n];
    for &to in forward.iter().flatten() {
        indegree[to] += 1;
    }
    let mut ready: Vec<usize> = (0..n).filter(|&b| indegree[b] == 0).collect();
    let mut sorted = 0;
    while let Some(block) = ready.pop() {
        sorted += 1;
        for &to in &forward[block] {
            indegree[to] -= 1;
            if indegree[to] == 0 {
                ready.push(to);
            }
        }
    }
    (sorted == n).then_some(loops)
}

// Generated φ programs

/// One generated block: raw successor picks, operator and operand picks,
/// and a constant.
pub(crate) type ProgramBlock = (Vec<u32>, [u8; 3], i64);

/// A terminating program over params `(x, y, fuel)` with φ-carried state.
///
/// `bb0` only jumps to `bb1`; `shapes[i]` becomes `bb{i + 1}`; the last
/// block returns. Every generated block starts with φs `a`, `c`, `f`,
/// computes `v = op(p, q)` with operands drawn from its φs, `y`, its
/// constant, and the `v` of its immediate dominator, then passes
/// `(v, a or c, f - 1)` to its successors. Once `f - 1 <= 0` it leaves for
/// the return block, which returns the incoming `v`; otherwise it switches
/// on `(v & 255) % targets` over its successor picks.
pub(crate) fn phi_program(shapes: &[ProgramBlock]) -> Function {
    let n = shapes.len();
    let count = u32::try_from(n).unwrap();
    let exit = BlockId::from_index(n + 1);
    let targets: Vec<Vec<BlockId>> = shapes
        .iter()
        .map(|(raw, ..)| raw.iter().map(|&t| b(1 + t % count)).collect())
        .collect();

    // Dominance among bb0..=bbn; edges into the return block do not change it.
    let mut skeleton: Vec<Vec<u32>> = vec![vec![1]];
    skeleton.extend(targets.iter().map(|ts| ts.iter().map(|t| t.raw()).collect()));
    let skeleton: Vec<&[u32]> = skeleton.iter().map(Vec::as_slice).collect();
    let dom = dominators(&Cfg::build(&cfg_func(&skeleton)).unwrap());
    let depth = |i: usize| dom[i].as_ref().map_or(usize::MAX, |d| d.count_ones(..));
    let idom = |i: usize| {
        dom[i]
            .as_ref()?
            .ones()
            .filter(|&d| d != i && d != 0)
            .max_by_key(|&d| depth(d))
    };

    let mut fb = FunctionBuilder::new("phi_program");
    let x = fb.param();
    let y = fb.param();
    let fuel = fb.param();
    for _ in 0..=n {
        fb.new_block();
    }
    fb.terminate_br(b(1));

    let mut phis: Vec<Option<[ValueId; 3]>> = vec![None; n + 1];
    let mut ends: Vec<[Operand; 3]> = vec![[x.into(), y.into(), fuel.into()]; n + 1];
    let mut results: Vec<Option<ValueId>> = vec![None; n + 1];

    // Dominators first, so their results exist when a block reads them.
    let mut order: Vec<usize> = (1..=n).collect();
    order.sort_by_key(|&i| depth(i));
    for i in order {
        let (_, picks, k) = &shapes[i - 1];
        fb.position_at(BlockId::from_index(i));
        let a = fb.emit_phi(Vec::new());
        let c = fb.emit_phi(Vec::new());
        let f = fb.emit_phi(Vec::new());
        phis[i] = Some([a, c, f]);

        let mut pool: Vec<Operand> = vec![a.into(), c.into(), f.into(), y.into(), int(*k)];
        if let Some(value) = idom(i).and_then(|d| results[d]) {
            pool.push(value.into());
        }
        let op = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Xor][usize::from(picks[0] % 4)];
        let lhs = pool[usize::from(picks[1]) % pool.len()];
        let rhs = pool[usize::from(picks[2]) % pool.len()];
        let value = fb.emit_binary(op, lhs, rhs);
        let left = fb.emit_binary(BinaryOp::Sub, f.into(), int(1));
        let carried = if picks[0] & 4 == 0 { c } else { a };
        results[i] = Some(value);
        ends[i] = [value.into(), carried.into(), left.into()];

        let ts = &targets[i - 1];
        if ts.is_empty() {
            fb.terminate_br(exit);
            continue;
        }
        let low = fb.emit_binary(BinaryOp::And, value.into(), int(0xff));
        let pick = fb.emit_binary(BinaryOp::Rem, low.into(), int(i64::try_from(ts.len()).unwrap()));
        let done = fb.emit_compare(ComparePred::Le, left.into(), int(0));
        let scrutinee = fb.emit_select(done.into(), int(-1), pick.into());
        let mut cases = vec![(-1, exit)];
        cases.extend(ts.iter().copied().zip(0i64..).map(|(t, key)| (key, t)));
        fb.terminate_switch(scrutinee.into(), cases, exit);
    }

    fb.position_at(exit);
    let result = fb.emit_phi(Vec::new());
    fb.terminate_return(Some(result.into()));

    for from in 0..=n {
        let succs: Vec<BlockId> = match from {
            0 => vec![b(1)],
            _ => std::iter::once(exit).chain(targets[from - 1].iter().copied()).collect(),
        };
        let pred = BlockId::from_index(from);
        let mut visited: Vec<BlockId> = Vec::new();
        for succ in succs {
            if visited.contains(&succ) {
                continue;
            }
            visited.push(succ);
            if succ == exit {
                fb.add_phi_incoming(exit, result, pred, ends[from][0]);
            } else if let Some(dsts) = phis[succ.index()] {
                for (phi, value) in dsts.into_iter().zip(ends[from]) {
                    fb.add_phi_incoming(succ, phi, pred, value);
                }
            }
        }
    }
    fb.finish()
}

/// Evaluate `func` on its SSA values, φs included, without lowering it.
///
/// `None` if an instruction or terminator is outside the integer subset,
/// a value is read before it is defined, or the run takes more than
/// `max_blocks` blocks.
pub(crate) fn reference_eval(func: &Function, args: &[i64], max_blocks: usize) -> Option<i64> {
    fn read(env: &[Option<i64>], op: Operand) -> Option<i64> {
        match op {
            Operand::Const(c) => Some(i64::from_constant(c)),
            Operand::Value(value) => env.get(value.index()).copied().flatten(),
        }
    }

    let mut env: Vec<Option<i64>> = vec![None; func.value_count as usize];
    for (param, &arg) in func.params.iter().zip(args) {
        env[param.index()] = Some(arg);
    }
    let mut prev: Option<BlockId> = None;
    let mut current = BlockId::ENTRY;

    for _ in 0..max_blocks {
        let block = func.block(current)?;
        let arrived: Vec<(ValueId, i64)> = block
            .phis()
            .iter()
            .map(|instr| match instr {
                Instr::Phi { dst, incoming } => {
                    let from = incoming.iter().find(|inc| Some(inc.block) == prev)?;
                    Some((*dst, read(&env, from.value)?))
                }
                _ => None,
            })
            .collect::<Option<_>>()?;
        for (dst, value) in arrived {
            env[dst.index()] = Some(value);
        }

        for instr in block.body() {
            let (dst, value) = match instr {
                Instr::Copy { dst, value } => (*dst, read(&env, *value)?),
                Instr::Binary { dst, op, lhs, rhs } => {
                    let (l, r) = (read(&env, *lhs)?, read(&env, *rhs)?);
                    let value = match op {
                        BinaryOp::Add => l.wrapping_add(r),
                        BinaryOp::Sub => l.wrapping_sub(r),
                        BinaryOp::Mul => l.wrapping_mul(r),
                        BinaryOp::Rem => l.checked_rem(r)?,
                        BinaryOp::And => l & r,
                        BinaryOp::Xor => l ^ r,
                        _ => return None,
                    };
                    (*dst, value)
                }
                Instr::Compare { dst, pred, lhs, rhs } => {
                    let (l, r) = (read(&env, *lhs)?, read(&env, *rhs)?);
                    let holds = match pred {
                        ComparePred::Lt => l < r,
                        ComparePred::Le => l <= r,
                        ComparePred::Gt => l > r,
                        ComparePred::Eq => l == r,
                        _ => return None,
                    };
                    (*dst, i64::from(holds))
                }
                Instr::Select {
                    dst,
                    cond,
                    then_value,
                    else_value,
                } => {
                    let picked = if read(&env, *cond)? != 0 {
                        then_value
                    } else {
                        else_value
                    };
                    (*dst, read(&env, *picked)?)
                }
                _ => return None,
            };
            env[dst.index()] = Some(value);
        }

        let next = match &block.terminator {
            Terminator::Return { value } => return value.and_then(|op| read(&env, op)),
            Terminator::Br { target } => *target,
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                if read(&env, *cond)? != 0 {
                    *then_block
                } else {
                    *else_block
                }
            }
            Terminator::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let key = read(&env, *scrutinee)?;
                cases
                    .iter()
                    .find(|&&(value, _)| value == key)
                    .map_or(*default, |&(_, target)| target)
            }
            _ => return None,
        };
        prev = Some(current);
        current = next;
    }
    None
}

// Integer interpreter

impl FrameValue for i64 {
    fn from_constant(constant: Constant) -> Self {
        match constant {
            Constant::Int(i) => i,
            Constant::Bool(b) => i64::from(b),
            Constant::Float(bits) => i64::from_ne_bytes(bits.to_ne_bytes()),
            Constant::Null | Constant::Undef => 0,
        }
    }
}

/// Failure inside a [`TestNode`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum TestError {
    /// A value was read from a slot that is empty, e.g. cleared too early.
    #[error("read of {value} from empty slot")]
    EmptySlot { value: ValueId },
    #[error("{value} has no slot")]
    NoSlot { value: ValueId },
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Interprets a block over `i64` values.
#[derive(Clone, Debug)]
pub(crate) struct TestNode {
    block: Block,
    layout: FrameLayout,
}

impl TestNode {
    fn read(&self, frame: &Frame<i64>, op: Operand) -> Result<i64, TestError> {
        match op {
            Operand::Const(c) => Ok(i64::from_constant(c)),
            Operand::Value(value) => {
                let slot = self.layout.slot_of(value).ok_or(TestError::NoSlot { value })?;
                frame.get(slot).copied().ok_or(TestError::EmptySlot { value })
            }
        }
    }

    fn write(&self, frame: &mut Frame<i64>, value: ValueId, result: i64) {
        if let Some(slot) = self.layout.slot_of(value) {
            frame.set(slot, result);
        }
    }
}

impl ExecuteBlock for TestNode {
    type Value = i64;
    type Error = TestError;

    fn execute(&self, frame: &mut Frame<i64>) -> Result<Transfer<i64>, TestError> {
        for instr in self.block.body() {
            let (dst, result) = match instr {
                Instr::Copy { dst, value } => (*dst, self.read(frame, *value)?),
                Instr::Unary { dst, op, operand } => {
                    let x = self.read(frame, *operand)?;
                    let r = match op {
                        UnaryOp::Neg => x.wrapping_neg(),
                        UnaryOp::Not => !x,
                    };
                    (*dst, r)
                }
                Instr::Binary { dst, op, lhs, rhs } => {
                    let (l, r) = (self.read(frame, *lhs)?, self.read(frame, *rhs)?);
                    let result = match op {
                        BinaryOp::Add => l.wrapping_add(r),
                        BinaryOp::Sub => l.wrapping_sub(r),
                        BinaryOp::Mul => l.wrapping_mul(r),
                        BinaryOp::Div => l.checked_div(r).ok_or(TestError::Unsupported("division by zero"))?,
                        BinaryOp::Rem => l.checked_rem(r).ok_or(TestError::Unsupported("division by zero"))?,
                        BinaryOp::And => l & r,
                        BinaryOp::Or => l | r,
                        BinaryOp::Xor => l ^ r,
                        BinaryOp::Shl => l.wrapping_shl(u32::try_from(r & 63).unwrap_or(0)),
                        BinaryOp::Shr => l.wrapping_shr(u32::try_from(r & 63).unwrap_or(0)),
                    };
                    (*dst, result)
                }
                Instr::Compare { dst, pred, lhs, rhs } => {
                    let (l, r) = (self.read(frame, *lhs)?, self.read(frame, *rhs)?);
                    let holds = match pred {
                        ComparePred::Eq => l == r,
                        ComparePred::Ne => l != r,
                        ComparePred::Lt => l < r,
                        ComparePred::Le => l <= r,
                        ComparePred::Gt => l > r,
                        ComparePred::Ge => l >= r,
                    };
                    (*dst, i64::from(holds))
                }
                Instr::Select {
                    dst,
                    cond,
                    then_value,
                    else_value,
                } => {
                    let picked = if self.read(frame, *cond)? != 0 {
                        then_value
                    } else {
                        else_value
                    };
                    (*dst, self.read(frame, *picked)?)
                }
                Instr::Phi { .. } => return Err(TestError::Unsupported("φ in block body")),
                Instr::Load { .. } | Instr::Store { .. } | Instr::Call { .. } => {
                    return Err(TestError::Unsupported("memory and calls"));
                }
            };
            self.write(frame, dst, result);
        }

        match &self.block.terminator {
            Terminator::Return { value } => {
                let value = value.map(|op| self.read(frame, op)).transpose()?;
                Ok(Transfer::Return(value))
            }
            Terminator::Br { .. } => Ok(Transfer::Branch(0)),
            Terminator::CondBr { cond, .. } => {
                let taken = if self.read(frame, *cond)? != 0 { 0 } else { 1 };
                Ok(Transfer::Branch(taken))
            }
            Terminator::Switch {
                scrutinee, cases, ..
            } => {
                let x = self.read(frame, *scrutinee)?;
                let index = cases.iter().position(|&(value, _)| value == x).unwrap_or(cases.len());
                Ok(Transfer::Branch(index))
            }
            Terminator::IndirectBr { .. }
            | Terminator::Invoke { .. }
            | Terminator::Resume { .. }
            | Terminator::Unreachable => Err(TestError::Unsupported("terminator")),
        }
    }
}

/// Builds [`TestNode`]s and records the decoration it was given per block.
#[derive(Default)]
pub(crate) struct TestNodeFactory {
    /// `(block, clear_before, clear_after, edge count)` per call.
    pub(crate) seen: Vec<(BlockId, Vec<SlotId>, Vec<SlotId>, usize)>,
}

impl NodeFactory for TestNodeFactory {
    type Node = TestNode;

    fn create_block(&mut self, block: &Block, decoration: &BlockDecoration<'_>) -> TestNode {
        self.seen.push((
            block.id,
            decoration.clear_before.to_vec(),
            decoration.clear_after.to_vec(),
            decoration.edges.len(),
        ));
        TestNode {
            block: block.clone(),
            layout: decoration.layout.clone(),
        }
    }
}

/// Lower with one slot per value.
pub(crate) fn lower_for_test(
    func: &Function,
    options: &LowerOptions,
) -> Result<NodeTree<TestNode>, LoweringError> {
    let layout = FrameLayout::one_slot_per_value(func);
    lower(func, &layout, &mut TestNodeFactory::default(), options)
}

/// Run a lowered test function with `args` in the parameter slots `$0..`.
pub(crate) fn run(
    tree: &NodeTree<TestNode>,
    args: &[i64],
) -> Result<crate::dispatch::Outcome<i64>, crate::dispatch::DispatchError<TestError>> {
    let mut frame = tree.new_frame();
    for (i, &arg) in args.iter().enumerate() {
        frame.set(SlotId::from_index(i), arg);
    }
    tree.execute(&mut frame)
}
