//! Lowering of lir functions into loop-structured node trees.
//!
//! A tree-walking interpreter has no goto, so a function's blocks are run by
//! dispatchers: a flat one for the function and one per loop. This crate
//! builds those dispatchers.
//!
//! # Pipeline
//!
//! 1. [`graph`]: successor and predecessor lists from terminators.
//! 2. [`loops`]: loop headers, membership, nesting, exits; rejects
//!    irreducible control flow.
//! 3. [`phi`]: φ-instructions as parallel copies on CFG edges.
//! 4. [`liveness`]: which frame slots can be cleared around each block.
//! 5. [`lower`]: block nodes from a [`NodeFactory`], folded into
//!    [`LoopDispatch`] nodes inner-first.
//!
//! [`dispatch`] executes the resulting [`NodeTree`] on a per-call
//! [`Frame`], and [`LoweringCache`] makes sure each function is lowered at
//! most once across threads.

use std::sync::Once;

pub mod cache;
pub mod dispatch;
mod error;
pub mod graph;
mod layout;
pub mod liveness;
pub mod loops;
pub mod lower;
mod options;
pub mod phi;
pub mod scc;

#[cfg(test)]
mod test_helpers;

pub use cache::LoweringCache;
pub use dispatch::{ExecStats, ExecuteBlock, Frame, FrameValue, Outcome, Transfer};
pub use error::LoweringError;
pub use graph::Cfg;
pub use layout::FrameLayout;
pub use liveness::Liveness;
pub use loops::{Loop, LoopForest, LoopId};
pub use lower::{lower, Analysis, BlockDecoration, BodyNode, LoopDispatch, NodeFactory, NodeTree};
pub use options::LowerOptions;
pub use phi::{ParallelCopy, PhiEdges};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber that honors `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset, and only the first call has any
/// effect.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
