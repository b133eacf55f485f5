//! Runtime process bookkeeping (§3 "Process"/"CombProcess"/"FFProcess",
//! §4.4 "Process creation").
//!
//! The IR crate's `CombProcess`/`FFProcess`/`Process` records (§3) are
//! static, per-definition data built once by the dependency analyzer.
//! This module holds the *runtime* counterpart: one [`RuntimeProcess`]
//! per live process instance, carrying the flattened op list it
//! executes (`xsim::eval::Op`) and the saved [`Cursor`] the scheduler
//! resumes it from. Per the design note in §9 ("Dynamic dispatch on
//! Process kind... prefer a tagged-variant with a uniform entry point
//! over class hierarchies"), [`ProcKind`] is a flat enum rather than a
//! trait object: nothing about how the scheduler drives a process
//! varies by kind, only the data it carries (an FF's edge list, a
//! fork's join policy) does.

use std::rc::Rc;

use xsim_ir::elab::EdgeKind as ElabEdgeKind;
use xsim_ir::EdgeKind;
pub use xsim_ir::ProcessId;

use crate::eval::{Cursor, Op};
use crate::instance::InstanceId;

/// Which LRM process category a [`RuntimeProcess`] belongs to. Carries
/// just enough data for the scheduler to know how it was woken and
/// who, if anyone, is waiting on it.
#[derive(Debug, Clone)]
pub enum ProcKind {
    Initial,
    Final,
    /// A comb process driven by its owning instance's settle loop
    /// (§4.5) rather than the generic ready queue. `GeneralPurpose`
    /// comb processes (the one exception — "an infinite loop that
    /// cooperatively yields", §3) are scheduled generically instead;
    /// see [`Self::GeneralPurposeComb`].
    Comb,
    GeneralPurposeComb,
    FF { edges: Vec<(EdgeKind, String)> },
    /// One branch of a `fork`. `join` is `None` for a `fork...join_none`
    /// branch, which runs to completion on its own and reports to
    /// nobody; otherwise it identifies the scheduler's join record.
    Fork { join: Option<crate::scheduler::JoinId> },
}

/// Why a [`RuntimeProcess`] is not currently runnable.
#[derive(Debug, Clone)]
pub enum Suspend {
    /// Waiting for `sim_time` to reach an absolute tick.
    Delay(u64),
    /// Waiting on one of an OR'd list of named-value events. `None`
    /// means a bare `@(var)` level wait; `Some(edge)` means
    /// `@(posedge/negedge/edge var)`. This is the elaboration-level
    /// [`ElabEdgeKind`], the same type [`crate::eval::Op::WaitEvents`]
    /// carries — distinct from [`EdgeKind`] above, which classifies an
    /// FF's *declared* edges rather than one observed at a wait point.
    Events(Vec<(String, Option<ElabEdgeKind>)>),
    /// Waiting for its fork's join policy to be satisfied.
    Join,
}

/// A process's current scheduling state (§3 "running, finished" fields,
/// generalized into one enum since a process is never both at once).
#[derive(Debug, Clone)]
pub enum ProcState {
    /// Sitting in, or eligible to be placed in, the scheduler's ready
    /// queue.
    Ready,
    Suspended(Suspend),
    Finished,
}

/// One live process: a definition-level [`ProcKind`] plus the
/// flattened op list and saved cursor that let the scheduler resume it
/// exactly where it last yielded.
#[derive(Debug, Clone)]
pub struct RuntimeProcess {
    pub instance: InstanceId,
    pub kind: ProcKind,
    pub ops: Rc<Vec<Op>>,
    pub cursor: Cursor,
    pub state: ProcState,
    /// Non-empty only for `Comb`/`GeneralPurposeComb` processes (§4.2);
    /// the settle loop's `input_changed` check scans this.
    pub sensitive_list: Vec<String>,
}

impl RuntimeProcess {
    pub fn new(instance: InstanceId, kind: ProcKind, ops: Rc<Vec<Op>>) -> Self {
        Self {
            instance,
            kind,
            ops,
            cursor: Cursor::new(),
            state: ProcState::Ready,
            sensitive_list: Vec::new(),
        }
    }

    pub fn with_sensitivity(mut self, sensitive_list: Vec<String>) -> Self {
        self.sensitive_list = sensitive_list;
        self
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ProcState::Finished)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ProcState::Ready)
    }
}
