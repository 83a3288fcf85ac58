//! Lowering failures.
//!
//! Every variant aborts lowering of the current function only. Nothing is
//! cached in a half-built state, so other functions are unaffected.

use lir_ir::BlockId;

/// Why a function could not be lowered.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoweringError {
    /// The block model violates its structural contract: a dangling
    /// successor, a φ naming a non-predecessor, a φ after a non-φ.
    #[error("malformed CFG at {block}: {detail}")]
    MalformedCfg { block: BlockId, detail: String },

    /// A loop can be entered through more than one block.
    ///
    /// `headers` are the blocks the cycle is entered through (the loop
    /// headers involved if no entry set could be isolated), `region` the
    /// strongly connected blocks that form the cycle.
    #[error(
        "irreducible control flow: headers [{}], region [{}]",
        block_list(.headers),
        block_list(.region)
    )]
    IrreducibleControlFlow {
        headers: Vec<BlockId>,
        region: Vec<BlockId>,
    },

    /// More loop headers than the configured limit.
    #[error("too many loops: limit is {limit}")]
    TooManyLoops { limit: usize },
}

impl LoweringError {
    pub(crate) fn malformed(block: BlockId, detail: impl Into<String>) -> Self {
        LoweringError::MalformedCfg {
            block,
            detail: detail.into(),
        }
    }
}

fn block_list(blocks: &[BlockId]) -> String {
    blocks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
