//! The block-level IR produced by elaboration & dependency analysis
//! (§3, §4.1, §4.3): `Process`/`CombProcess`/`FFProcess` and the
//! `Module` that collects them.
//!
//! Process kinds are a tagged variant here rather than a small class
//! hierarchy, per the design note in §9: there is no behavior that
//! varies by kind once a process reaches the scheduler, only data that
//! differs, so a flat enum keeps `xsim::scheduler` from needing a vtable
//! dispatch on every tick.

use crate::elab::Stmt;

/// Which `CombKind` governs a combinational process's edge semantics
/// (LRM 9.2.2.1-3): `GeneralPurpose` blocks re-run on *any* sensitivity
/// change and re-check their own guard; the rest always re-run in full
/// on a sensitivity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombKind {
    GeneralPurpose,
    AlwaysComb,
    Implicit,
    Explicit,
    Latch,
}

/// One `@(posedge/negedge/both x)` control discovered anywhere inside a
/// process body (§4.1 "Edge-control extraction"), later registered with
/// the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Pos,
    Neg,
    Both,
}

/// A synthesized combinational process: the flushed draft of
/// continuous assigns plus net initializers between two procedural-
/// block nodes, or a single procedural block reclassified by kind.
#[derive(Debug, Clone)]
pub struct CombProcess {
    pub kind: CombKind,
    pub stmts: Vec<Stmt>,
    pub sensitive_list: Vec<String>,
    pub edge_event_controls: Vec<(String, EdgeKind)>,
}

/// An `always_ff`/edge-sensitive sequential process.
#[derive(Debug, Clone)]
pub struct FFProcess {
    pub stmts: Vec<Stmt>,
    /// The `@(posedge/negedge clk, ...)` edges this process wakes on,
    /// `BothEdges` having already been rejected during synthesis.
    pub edges: Vec<(EdgeKind, String)>,
    pub edge_event_controls: Vec<(String, EdgeKind)>,
}

/// An `initial`/`final` block, carried through unclassified.
#[derive(Debug, Clone)]
pub struct Process {
    pub stmts: Vec<Stmt>,
    pub edge_event_controls: Vec<(String, EdgeKind)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    In,
    Out,
}

/// A port of a `Module`, alongside the expression its instantiation
/// site connects it to.
#[derive(Debug, Clone)]
pub struct PortBinding {
    pub name: String,
    pub direction: PortDirection,
    pub connection: crate::elab::Expr,
}

/// One elaborated module definition: the dependency-analyzed,
/// classified processes for a single unique definition name, plus its
/// child instances.
///
/// Children sharing a definition name point at the same `Module` (via
/// `Rc`) rather than each getting a private copy — hardware forbids
/// instantiation cycles, so ownership never needs the `Weak`
/// cycle-breaking a general object graph would.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub comb_processes: Vec<CombProcess>,
    pub ff_processes: Vec<FFProcess>,
    pub init_processes: Vec<Process>,
    pub final_processes: Vec<Process>,
    pub inputs: Vec<PortBinding>,
    pub outputs: Vec<PortBinding>,
    pub child_instances: Vec<(String, std::rc::Rc<Module>)>,
    pub variables: Vec<crate::elab::VariableDecl>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Every unique `Module` definition transitively reachable from
    /// `self`, including itself — used by the runtime to build the
    /// one-time-per-definition static data it shares across instances.
    pub fn unique_defs(self: &std::rc::Rc<Self>) -> Vec<std::rc::Rc<Module>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(m) = stack.pop() {
            if seen.insert(m.name.clone()) {
                for (_, child) in &m.child_instances {
                    stack.push(child.clone());
                }
                out.push(m);
            }
        }
        out
    }

    /// The set of variable names this module reports must be backed by
    /// a `TrackedValue` rather than a plain `Value` (§4.3 "Tracked-
    /// variable set").
    pub fn tracked_vars(&self) -> std::collections::BTreeSet<String> {
        let mut out = std::collections::BTreeSet::new();
        for p in &self.comb_processes {
            out.extend(p.sensitive_list.iter().cloned());
            out.extend(p.edge_event_controls.iter().map(|(v, _)| v.clone()));
        }
        for p in &self.ff_processes {
            out.extend(p.edges.iter().map(|(_, v)| v.clone()));
            out.extend(p.edge_event_controls.iter().map(|(v, _)| v.clone()));
        }
        for p in self
            .init_processes
            .iter()
            .chain(self.final_processes.iter())
        {
            out.extend(p.edge_event_controls.iter().map(|(v, _)| v.clone()));
        }
        out.extend(self.outputs.iter().map(|p| p.name.clone()));
        for (_, child) in &self.child_instances {
            for input in &child.inputs {
                let mut refs = Vec::new();
                input.connection.named_values(&mut refs);
                out.extend(refs.into_iter().map(str::to_string));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_vars_include_sensitivity_and_outputs() {
        let mut m = Module::new("leaf");
        m.comb_processes.push(CombProcess {
            kind: CombKind::AlwaysComb,
            stmts: vec![],
            sensitive_list: vec!["a".to_string()],
            edge_event_controls: vec![],
        });
        m.outputs.push(PortBinding {
            name: "y".to_string(),
            direction: PortDirection::Out,
            connection: crate::elab::Expr::Ref("y".to_string()),
        });
        let tracked = m.tracked_vars();
        assert!(tracked.contains("a"));
        assert!(tracked.contains("y"));
    }

    #[test]
    fn unique_defs_deduplicates_shared_children() {
        let leaf = std::rc::Rc::new(Module::new("leaf"));
        let mut top = Module::new("top");
        top.child_instances
            .push(("u0".to_string(), leaf.clone()));
        top.child_instances
            .push(("u1".to_string(), leaf.clone()));
        let top = std::rc::Rc::new(top);
        assert_eq!(top.unique_defs().len(), 2);
    }
}
