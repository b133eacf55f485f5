//! Small shared utilities used by both the IR crate and the runtime.
//!
//! Kept deliberately tiny: a hierarchical-path type used both by
//! elaboration diagnostics and by `$display`'s `%m` substitution, and a
//! diagnostic engine shared by anything that needs to accumulate
//! errors up to a limit rather than abort on the first one.

mod errors;
mod position;

pub use errors::{Diag, DiagnosticEngine, XsimResult};
pub use position::HierPath;
