//! Incremental construction of [`Function`]s.
//!
//! Follows the "position at a block, emit instructions, terminate" pattern of
//! LLVM's `IRBuilder`. Used by IR producers and throughout the test suites.

use crate::function::{Block, Function};
use crate::ids::{BlockId, ValueId};
use crate::instr::{
    BinaryOp, ComparePred, Instr, Operand, PhiIncoming, Terminator, UnaryOp,
};

/// In-progress basic block.
struct BlockBuilder {
    id: BlockId,
    instrs: Vec<Instr>,
    terminator: Option<Terminator>,
}

impl BlockBuilder {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            instrs: Vec::new(),
            terminator: None,
        }
    }
}

/// Builder for an in-progress [`Function`].
pub struct FunctionBuilder {
    name: String,
    params: Vec<ValueId>,
    blocks: Vec<BlockBuilder>,
    current_block: BlockId,
    next_value: u32,
}

impl FunctionBuilder {
    /// Create a builder with the entry block already allocated and selected.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            blocks: vec![BlockBuilder::new(BlockId::ENTRY)],
            current_block: BlockId::ENTRY,
            next_value: 0,
        }
    }

    // Values

    /// Allocate a fresh SSA value.
    pub fn fresh_value(&mut self) -> ValueId {
        let id = ValueId::new(self.next_value);
        self.next_value += 1;
        id
    }

    /// Add a function parameter.
    pub fn param(&mut self) -> ValueId {
        let value = self.fresh_value();
        self.params.push(value);
        value
    }

    // Block management

    /// Allocate a new empty block and return its ID.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(BlockBuilder::new(id));
        id
    }

    /// Set the insertion point to `block`.
    pub fn position_at(&mut self, block: BlockId) {
        debug_assert!(
            block.index() < self.blocks.len(),
            "{block} out of bounds (have {} blocks)",
            self.blocks.len(),
        );
        self.current_block = block;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Check whether the current block already has a terminator.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current_block.index()].terminator.is_some()
    }

    // Instruction emission

    fn push(&mut self, instr: Instr) {
        self.blocks[self.current_block.index()].instrs.push(instr);
    }

    fn emit(&mut self, make: impl FnOnce(ValueId) -> Instr) -> ValueId {
        let dst = self.fresh_value();
        self.push(make(dst));
        dst
    }

    /// Emit a φ with the given `(predecessor, value)` pairs.
    ///
    /// More incoming edges can be added later with
    /// [`add_phi_incoming`](Self::add_phi_incoming), which loop back edges
    /// need because their value is defined after the φ.
    pub fn emit_phi(&mut self, incoming: Vec<(BlockId, Operand)>) -> ValueId {
        debug_assert!(
            self.blocks[self.current_block.index()]
                .instrs
                .iter()
                .all(Instr::is_phi),
            "φ emitted after a non-φ instruction in {}",
            self.current_block,
        );
        let incoming = incoming
            .into_iter()
            .map(|(block, value)| PhiIncoming { block, value })
            .collect();
        self.emit(|dst| Instr::Phi { dst, incoming })
    }

    /// Append an incoming edge to the φ defining `phi` in `block`.
    ///
    /// Returns `false` if `block` holds no φ defining `phi`.
    pub fn add_phi_incoming(
        &mut self,
        block: BlockId,
        phi: ValueId,
        from: BlockId,
        value: Operand,
    ) -> bool {
        let Some(bb) = self.blocks.get_mut(block.index()) else {
            return false;
        };
        for instr in &mut bb.instrs {
            if let Instr::Phi { dst, incoming } = instr {
                if *dst == phi {
                    incoming.push(PhiIncoming { block: from, value });
                    return true;
                }
            }
        }
        false
    }

    pub fn emit_copy(&mut self, value: Operand) -> ValueId {
        self.emit(|dst| Instr::Copy { dst, value })
    }

    pub fn emit_unary(&mut self, op: UnaryOp, operand: Operand) -> ValueId {
        self.emit(|dst| Instr::Unary { dst, op, operand })
    }

    pub fn emit_binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand) -> ValueId {
        self.emit(|dst| Instr::Binary { dst, op, lhs, rhs })
    }

    pub fn emit_compare(&mut self, pred: ComparePred, lhs: Operand, rhs: Operand) -> ValueId {
        self.emit(|dst| Instr::Compare {
            dst,
            pred,
            lhs,
            rhs,
        })
    }

    pub fn emit_select(
        &mut self,
        cond: Operand,
        then_value: Operand,
        else_value: Operand,
    ) -> ValueId {
        self.emit(|dst| Instr::Select {
            dst,
            cond,
            then_value,
            else_value,
        })
    }

    pub fn emit_load(&mut self, addr: Operand) -> ValueId {
        self.emit(|dst| Instr::Load { dst, addr })
    }

    pub fn emit_store(&mut self, addr: Operand, value: Operand) {
        self.push(Instr::Store { addr, value });
    }

    /// Emit a call. Returns the result value when `has_result` is set.
    pub fn emit_call(
        &mut self,
        callee: impl Into<String>,
        args: Vec<Operand>,
        has_result: bool,
    ) -> Option<ValueId> {
        let dst = has_result.then(|| self.fresh_value());
        self.push(Instr::Call {
            dst,
            callee: callee.into(),
            args,
        });
        dst
    }

    // Terminators

    fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            block.id,
        );
        block.terminator = Some(terminator);
    }

    pub fn terminate_return(&mut self, value: Option<Operand>) {
        self.terminate(Terminator::Return { value });
    }

    pub fn terminate_br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br { target });
    }

    pub fn terminate_cond_br(&mut self, cond: Operand, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn terminate_switch(
        &mut self,
        scrutinee: Operand,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    ) {
        self.terminate(Terminator::Switch {
            scrutinee,
            cases,
            default,
        });
    }

    pub fn terminate_indirect_br(&mut self, address: Operand, targets: Vec<BlockId>) {
        self.terminate(Terminator::IndirectBr { address, targets });
    }

    /// Terminate with `Invoke`. The result, if requested, is defined on the
    /// edge to `normal` only.
    pub fn terminate_invoke(
        &mut self,
        callee: impl Into<String>,
        args: Vec<Operand>,
        normal: BlockId,
        unwind: BlockId,
        has_result: bool,
    ) -> Option<ValueId> {
        let dst = has_result.then(|| self.fresh_value());
        self.terminate(Terminator::Invoke {
            dst,
            callee: callee.into(),
            args,
            normal,
            unwind,
        });
        dst
    }

    pub fn terminate_resume(&mut self, exception: Operand) {
        self.terminate(Terminator::Resume { exception });
    }

    pub fn terminate_unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    // Finalization

    /// Consume the builder and produce a finished [`Function`].
    ///
    /// Unterminated blocks get `Unreachable` (with a tracing warning).
    pub fn finish(self) -> Function {
        let blocks = self
            .blocks
            .into_iter()
            .map(|bb| {
                let terminator = bb.terminator.unwrap_or_else(|| {
                    tracing::warn!(block = bb.id.raw(), "unterminated block, adding Unreachable");
                    Terminator::Unreachable
                });
                Block {
                    id: bb.id,
                    instrs: bb.instrs,
                    terminator,
                }
            })
            .collect();

        Function {
            name: self.name,
            params: self.params,
            blocks,
            value_count: self.next_value,
        }
    }
}
