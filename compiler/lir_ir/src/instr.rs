//! Instructions, operands, and block terminators.
//!
//! Both [`Instr`] and [`Terminator`] are closed enums. Passes match on them
//! exhaustively, so adding a variant forces every analysis to decide how the
//! new variant reads, writes, and transfers control.

use smallvec::{smallvec, SmallVec};

use crate::ids::{BlockId, ValueId};

// ── Operands ────────────────────────────────────────────────────────

/// Constant operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constant {
    Int(i64),
    /// IEEE-754 bits, so the constant stays `Eq + Hash`.
    Float(u64),
    Bool(bool),
    Null,
    Undef,
}

/// An instruction operand: either an SSA value or a constant.
///
/// Values are referenced by identity; there is no name resolution at this
/// layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    Value(ValueId),
    Const(Constant),
}

impl Operand {
    /// The SSA value this operand reads, if it is not a constant.
    #[inline]
    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            Operand::Const(_) => None,
        }
    }
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Operand::Value(value)
    }
}

impl From<Constant> for Operand {
    fn from(constant: Constant) -> Self {
        Operand::Const(constant)
    }
}

// ── Operators ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparePred {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

// ── Instructions ────────────────────────────────────────────────────

/// One incoming edge of a φ-instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhiIncoming {
    /// The predecessor block control arrives from.
    pub block: BlockId,
    /// The value selected when arriving from `block`.
    pub value: Operand,
}

/// A non-terminating instruction.
///
/// φ-instructions must form a prefix of their block's instruction list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    /// SSA merge: `dst = φ [value, block]...`.
    Phi {
        dst: ValueId,
        incoming: Vec<PhiIncoming>,
    },
    /// `dst = value`.
    Copy { dst: ValueId, value: Operand },
    Unary {
        dst: ValueId,
        op: UnaryOp,
        operand: Operand,
    },
    Binary {
        dst: ValueId,
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        dst: ValueId,
        pred: ComparePred,
        lhs: Operand,
        rhs: Operand,
    },
    Select {
        dst: ValueId,
        cond: Operand,
        then_value: Operand,
        else_value: Operand,
    },
    Load { dst: ValueId, addr: Operand },
    Store { addr: Operand, value: Operand },
    /// Direct call. `dst` is `None` for calls whose result is discarded.
    Call {
        dst: Option<ValueId>,
        callee: String,
        args: Vec<Operand>,
    },
}

impl Instr {
    /// Returns the value defined (written) by this instruction, if any.
    pub fn defined_value(&self) -> Option<ValueId> {
        match self {
            Instr::Phi { dst, .. }
            | Instr::Copy { dst, .. }
            | Instr::Unary { dst, .. }
            | Instr::Binary { dst, .. }
            | Instr::Compare { dst, .. }
            | Instr::Select { dst, .. }
            | Instr::Load { dst, .. } => Some(*dst),
            Instr::Call { dst, .. } => *dst,
            Instr::Store { .. } => None,
        }
    }

    /// Returns all values read by this instruction inside its own block.
    ///
    /// φ operands are not included: they are read on the incoming edge, at
    /// the end of the predecessor, not in the block holding the φ.
    pub fn used_values(&self) -> SmallVec<[ValueId; 4]> {
        let operands: SmallVec<[&Operand; 4]> = match self {
            Instr::Phi { .. } => SmallVec::new(),
            Instr::Copy { value, .. } => smallvec![value],
            Instr::Unary { operand, .. } => smallvec![operand],
            Instr::Binary { lhs, rhs, .. } | Instr::Compare { lhs, rhs, .. } => {
                smallvec![lhs, rhs]
            }
            Instr::Select {
                cond,
                then_value,
                else_value,
                ..
            } => smallvec![cond, then_value, else_value],
            Instr::Load { addr, .. } => smallvec![addr],
            Instr::Store { addr, value } => smallvec![addr, value],
            Instr::Call { args, .. } => args.iter().collect(),
        };
        operands.into_iter().filter_map(Operand::as_value).collect()
    }

    /// Returns `true` for φ-instructions.
    #[inline]
    pub fn is_phi(&self) -> bool {
        matches!(self, Instr::Phi { .. })
    }
}

// ── Terminators ─────────────────────────────────────────────────────

/// Block terminator: how control leaves a basic block.
///
/// Successor positions follow [`Terminator::successors`]; the dispatch
/// executor reports the taken edge by that position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    /// Return from the function.
    Return { value: Option<Operand> },

    /// Unconditional branch.
    Br { target: BlockId },

    /// Two-way branch: successor 0 is `then_block`, successor 1 `else_block`.
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },

    /// Multi-way branch. Successors are the case targets in order, then
    /// `default` last.
    Switch {
        scrutinee: Operand,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },

    /// Branch to a computed block address, restricted to `targets`.
    IndirectBr {
        address: Operand,
        targets: Vec<BlockId>,
    },

    /// Call that may unwind. Successor 0 is `normal`, successor 1 `unwind`.
    ///
    /// `dst` is defined on the edge to `normal` only.
    Invoke {
        dst: Option<ValueId>,
        callee: String,
        args: Vec<Operand>,
        normal: BlockId,
        unwind: BlockId,
    },

    /// Resume unwinding with an in-flight exception.
    Resume { exception: Operand },

    /// Marks a block as unreachable.
    Unreachable,
}

impl Terminator {
    /// Successor blocks in edge order (duplicates preserved).
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            Terminator::Return { .. } | Terminator::Resume { .. } | Terminator::Unreachable => {
                SmallVec::new()
            }
            Terminator::Br { target } => smallvec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => smallvec![*then_block, *else_block],
            Terminator::Switch { cases, default, .. } => {
                let mut targets = SmallVec::with_capacity(cases.len() + 1);
                for &(_, b) in cases {
                    targets.push(b);
                }
                targets.push(*default);
                targets
            }
            Terminator::IndirectBr { targets, .. } => targets.iter().copied().collect(),
            Terminator::Invoke { normal, unwind, .. } => smallvec![*normal, *unwind],
        }
    }

    /// Returns all values read by this terminator.
    pub fn used_values(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Terminator::Return { value } => value.iter().filter_map(Operand::as_value).collect(),
            Terminator::Br { .. } | Terminator::Unreachable => SmallVec::new(),
            Terminator::CondBr { cond: op, .. }
            | Terminator::Switch { scrutinee: op, .. }
            | Terminator::IndirectBr { address: op, .. }
            | Terminator::Resume { exception: op } => op.as_value().into_iter().collect(),
            Terminator::Invoke { args, .. } => args.iter().filter_map(Operand::as_value).collect(),
        }
    }

    /// The value this terminator defines on the edge to `successor`, if any.
    ///
    /// Only `Invoke` defines a value, and only on its normal edge.
    pub fn defined_on_edge(&self, successor: usize) -> Option<ValueId> {
        match self {
            Terminator::Invoke { dst, .. } if successor == 0 => *dst,
            _ => None,
        }
    }
}
