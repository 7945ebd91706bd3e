//! Pure data types for maku — rules, node ids, task results, errors.
//!
//! This crate is a leaf dependency with no async runtime, no parser, and no
//! I/O. It exists so that anything speaking maku's vocabulary (the kernel,
//! the CLI, external tooling) can do so without pulling in maku-kernel's
//! runtime stack.

pub mod error;
pub mod node;
pub mod rule;
pub mod task;

pub use error::{MakuError, MakuResult};
pub use node::NodeId;
pub use rule::{Rule, RuleSet};
pub use task::TaskResult;
