use thiserror::Error;

use crate::position::HierPath;

/// Diagnostics produced by elaboration & IR construction (§4.1, §4.3) and
/// by the user syntax/semantics checking that precedes it (§7).
///
/// The elaboration-failure variants (`CombinationalLoop`,
/// `UnsupportedPortDirection`, `BothEdgesNotSupported`,
/// `NonNamedEventExpression`, `NoTimingControl`) are fatal: the analyzer
/// returns the first one it hits and abandons the rest of that module
/// (spec §7, "first non-empty string aborts further analysis"). The
/// remaining variants are the user-facing ones and are collected by a
/// [`DiagnosticEngine`] up to `error_limit` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diag {
    /// §4.1: the topological re-check found an edge `u -> v` with
    /// `ord(u) >= ord(v)` after sorting.
    #[error("combinational loop detected at {path}")]
    CombinationalLoop { path: HierPath },

    /// §4.3: a port direction other than `In`/`Out`.
    #[error("unsupported port direction on `{port}`")]
    UnsupportedPortDirection { port: String },

    /// §4.1: an `always_ff`/FF-candidate block edge-sensitive to `BothEdges`.
    #[error("both edges not supported on `{var}`")]
    BothEdgesNotSupported { var: String },

    /// §4.1: an FF/edge-control timing statement whose event expression
    /// is not a bare named value.
    #[error("non-named event expression is not supported")]
    NonNamedEventExpression,

    /// §4.1: a legacy `always` block with no timing control anywhere in
    /// its body.
    #[error("`always` block has no timing control")]
    NoTimingControl,

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("use of `{0}` before its declaration")]
    UseBeforeDeclare(String),

    #[error("unsupported construct: {0}")]
    NotSupported(String),

    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),
}

/// A `Result` alias for fallible elaboration/analysis operations.
pub type XsimResult<T> = Result<T, Diag>;

/// Accumulates non-fatal diagnostics (category 1 of §7) up to a fixed
/// limit, mirroring how a real front end keeps reporting user errors
/// instead of stopping at the first one.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    errors: Vec<Diag>,
    error_limit: usize,
}

impl DiagnosticEngine {
    pub fn new(error_limit: usize) -> Self {
        Self {
            errors: Vec::new(),
            error_limit,
        }
    }

    /// Record a diagnostic. Returns `false` once the limit has been
    /// reached, signalling the caller to stop reporting further errors
    /// for this run.
    pub fn report(&mut self, diag: Diag) -> bool {
        self.errors.push(diag);
        self.error_limit == 0 || self.errors.len() < self.error_limit
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diag] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Diag> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_engine_stops_reporting_past_the_limit() {
        let mut engine = DiagnosticEngine::new(2);
        assert!(engine.report(Diag::UnknownIdentifier("a".into())));
        assert!(!engine.report(Diag::UnknownIdentifier("b".into())));
        assert_eq!(engine.errors().len(), 2);
    }
}
