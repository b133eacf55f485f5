//! The IR crate: `Module`/`Process`/`CombProcess`/`FFProcess`, the
//! dependency analyzer and sensitivity-list tracker that build them,
//! and the `TrackedValue`/`Value` data model they operate over.
//!
//! This crate only ever reads an already-elaborated design (the
//! `elab` module's types); it has no parser of its own.

pub mod dep_analyzer;
pub mod elab;
pub mod graph;
pub mod module_analyzer;
pub mod process_ir;
pub mod sensitivity;
pub mod tracked;
pub mod value;

pub use dep_analyzer::{analyze, DepAnalysisResult};
pub use graph::{Graph, NodeKind};
pub use module_analyzer::build_design;
pub use process_ir::{
    CombKind, CombProcess, EdgeKind, FFProcess, Module, PortBinding, PortDirection, Process,
};
pub use sensitivity::{sensitivity_list, SensitivityBuilder};
pub use tracked::{ProcessId, TrackedValue};
pub use value::{Bit, Value};
