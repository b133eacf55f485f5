//! Elaborated-design interpreter and runtime scheduler (§4 of
//! `SPEC_FULL.md`): everything downstream of `xsim_ir::build_design`.
//!
//! `xsim_ir` turns an elaborated syntax tree into a dependency-analyzed
//! `Module` tree; this crate instantiates that tree into live storage
//! ([`instance`]), flattens each process body into a resumable op list
//! ([`eval`]), and drives all of it from one cooperative event loop
//! ([`scheduler`]).

pub mod configuration;
pub mod dpi;
pub mod errors;
pub mod eval;
pub mod instance;
pub mod logging;
pub mod process;
pub mod scheduler;
pub mod tasks;
pub mod vpi;
