//! Textual rendering of the IR, used in tracing output and test failures.

use std::fmt::{self, Display, Formatter};

use crate::function::{Block, Function};
use crate::instr::{BinaryOp, ComparePred, Constant, Instr, Operand, Terminator, UnaryOp};

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Null => f.write_str("null"),
            Constant::Undef => f.write_str("undef"),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{v}"),
            Operand::Const(c) => write!(f, "{c}"),
        }
    }
}

impl UnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
        }
    }
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
        }
    }
}

impl ComparePred {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ComparePred::Eq => "eq",
            ComparePred::Ne => "ne",
            ComparePred::Lt => "lt",
            ComparePred::Le => "le",
            ComparePred::Gt => "gt",
            ComparePred::Ge => "ge",
        }
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Phi { dst, incoming } => {
                write!(f, "{dst} = phi ")?;
                for (i, inc) in incoming.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "[{}, {}]", inc.value, inc.block)?;
                }
                Ok(())
            }
            Instr::Copy { dst, value } => write!(f, "{dst} = {value}"),
            Instr::Unary { dst, op, operand } => write!(f, "{dst} = {} {operand}", op.mnemonic()),
            Instr::Binary { dst, op, lhs, rhs } => {
                write!(f, "{dst} = {} {lhs}, {rhs}", op.mnemonic())
            }
            Instr::Compare {
                dst,
                pred,
                lhs,
                rhs,
            } => write!(f, "{dst} = cmp {} {lhs}, {rhs}", pred.mnemonic()),
            Instr::Select {
                dst,
                cond,
                then_value,
                else_value,
            } => write!(f, "{dst} = select {cond}, {then_value}, {else_value}"),
            Instr::Load { dst, addr } => write!(f, "{dst} = load {addr}"),
            Instr::Store { addr, value } => write!(f, "store {value}, {addr}"),
            Instr::Call { dst, callee, args } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "call @{callee}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl Display for Terminator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Return { value: Some(v) } => write!(f, "ret {v}"),
            Terminator::Return { value: None } => f.write_str("ret"),
            Terminator::Br { target } => write!(f, "br {target}"),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {cond}, {then_block}, {else_block}"),
            Terminator::Switch {
                scrutinee,
                cases,
                default,
            } => {
                write!(f, "switch {scrutinee}, {default} [")?;
                for (i, (value, target)) in cases.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}: {target}")?;
                }
                f.write_str("]")
            }
            Terminator::IndirectBr { address, targets } => {
                write!(f, "indirectbr {address}, [")?;
                write_list(f, targets)?;
                f.write_str("]")
            }
            Terminator::Invoke {
                dst,
                callee,
                args,
                normal,
                unwind,
            } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "invoke @{callee}(")?;
                write_list(f, args)?;
                write!(f, ") to {normal} unwind {unwind}")
            }
            Terminator::Resume { exception } => write!(f, "resume {exception}"),
            Terminator::Unreachable => f.write_str("unreachable"),
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.id)?;
        for instr in &self.instrs {
            writeln!(f, "  {instr}")?;
        }
        writeln!(f, "  {}", self.terminator)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        write_list(f, &self.params)?;
        writeln!(f, ") {{")?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        f.write_str("}")
    }
}
