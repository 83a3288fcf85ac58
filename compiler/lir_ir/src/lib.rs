//! Block-structured SSA IR for the lir interpreter pipeline.
//!
//! This crate provides:
//!
//! - **IDs** ([`BlockId`], [`ValueId`], [`SlotId`]): dense `u32` newtypes.
//!   Blocks are numbered by position in [`Function::blocks`]; block 0 is the
//!   entry.
//!
//! - **Instructions** ([`Instr`], [`Terminator`]): a function body is a list
//!   of [`Block`]s, each holding leading φ-instructions, straight-line
//!   instructions, and exactly one terminator.
//!
//! - **Construction** ([`FunctionBuilder`]): incremental building with the
//!   usual position/emit/terminate API.
//!
//! Functions are immutable once built. Analyses and the lowering to
//! interpreter node trees live in `lir_lower`.

mod builder;
mod function;
mod ids;
mod instr;
mod print;

pub use builder::FunctionBuilder;
pub use function::{Block, Function};
pub use ids::{BlockId, SlotId, ValueId};
pub use instr::{
    BinaryOp, ComparePred, Constant, Instr, Operand, PhiIncoming, Terminator, UnaryOp,
};
