//! Per-instance combinational driver state (§4.5 "Module base") and
//! the runtime `ModuleInstance` tree the scheduler walks to settle it.
//!
//! This is the runtime counterpart of `xsim_ir::Module`: where the IR
//! `Module` is a shared, immutable, per-*definition* record (§3's
//! lifecycle note — "IR Modules are built once... and never mutated
//! afterwards"), a `ModuleInstance` is owned storage for one
//! *instantiation* of that definition, holding the `TrackedValue`/
//! `Value` table the definition's processes read and write.

use std::rc::Rc;

use ahash::AHashMap;
use xsim_idx::{impl_index, IndexedMap};
use xsim_ir::{Module, ProcessId, TrackedValue, Value};
use xsim_utils::HierPath;

use crate::process::ProcKind;
use crate::scheduler::Scheduler;

/// Identifies one runtime module instantiation (as distinct from
/// `xsim_ir::Module`, which identifies a shared *definition*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);
impl_index!(InstanceId);

/// A module instance's storage for one variable: either plain storage
/// (nothing ever watches it) or tracked storage with change/edge
/// bookkeeping and subscriber lists (§4.3 "Tracked-variable set").
#[derive(Debug)]
pub enum VarSlot {
    Plain(Value),
    Tracked(TrackedValue),
}

impl VarSlot {
    pub fn value(&self) -> &Value {
        match self {
            VarSlot::Plain(v) => v,
            VarSlot::Tracked(tv) => tv.value(),
        }
    }
}

/// One live instantiation of an `xsim_ir::Module` definition.
#[derive(Debug)]
pub struct ModuleInstance {
    pub def: Rc<Module>,
    pub hier_path: HierPath,
    pub vars: AHashMap<String, VarSlot>,
    /// The `Comb`-kind processes owned by this instance, in IR order —
    /// what §4.5's settle loop iterates.
    pub comb_processes: Vec<ProcessId>,
    pub children: Vec<(String, InstanceId)>,
}

impl ModuleInstance {
    pub fn var(&self, name: &str) -> Option<&VarSlot> {
        self.vars.get(name)
    }

    pub fn var_mut(&mut self, name: &str) -> Option<&mut VarSlot> {
        self.vars.get_mut(name)
    }

    /// A cheap stand-in pushed by [`Scheduler::reserve_instance`] to
    /// claim a slot before the instance's own data (in particular its
    /// `children`, which depend on recursing into `instantiate` first)
    /// is ready to install.
    pub(crate) fn placeholder() -> Self {
        Self {
            def: Rc::new(Module::new(String::new())),
            hier_path: HierPath::new(),
            vars: AHashMap::default(),
            comb_processes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Builds the runtime instance tree for `module`, registering every
/// process it owns with `scheduler` (§4.3's module analyzer handed off
/// an IR tree; this is where that tree becomes live simulation state).
pub fn instantiate(scheduler: &mut Scheduler, module: &Rc<Module>, hier_path: HierPath) -> InstanceId {
    let tracked_names = module.tracked_vars();

    let mut vars = AHashMap::default();
    for decl in &module.variables {
        let initial = if decl.four_state {
            Value::x(decl.left, decl.right, decl.signed, true)
        } else {
            Value::zero(decl.left, decl.right, decl.signed, false)
        };
        let slot = if tracked_names.contains(&decl.name) {
            VarSlot::Tracked(TrackedValue::new(initial, true))
        } else {
            VarSlot::Plain(initial)
        };
        vars.insert(decl.name.clone(), slot);
    }
    // Child-instance port variables (`u0.y`) are not separately
    // declared in the parent body — they're only ever referenced
    // through the synthesized port-wiring comb process — so make sure
    // every name appearing in `tracked_vars()` actually has a slot.
    for name in &tracked_names {
        vars.entry(name.clone())
            .or_insert_with(|| VarSlot::Tracked(TrackedValue::new(Value::x(0, 0, false, true), true)));
    }

    let instance_id = scheduler.reserve_instance();

    let mut comb_processes = Vec::new();
    for comb in &module.comb_processes {
        let kind = match comb.kind {
            xsim_ir::CombKind::GeneralPurpose => ProcKind::GeneralPurposeComb,
            _ => ProcKind::Comb,
        };
        let pid = scheduler.register_comb_process(instance_id, comb, kind.clone());
        if matches!(kind, ProcKind::Comb) {
            comb_processes.push(pid);
        }
    }
    for ff in &module.ff_processes {
        scheduler.register_ff_process(instance_id, ff);
    }
    for init in &module.init_processes {
        scheduler.register_init_process(instance_id, init);
    }
    for fin in &module.final_processes {
        scheduler.register_final_process(instance_id, fin);
    }

    let mut children = Vec::new();
    for (inst_name, child_def) in &module.child_instances {
        let child_path = hier_path.child(inst_name.clone());
        let child_id = instantiate(scheduler, child_def, child_path);
        children.push((inst_name.clone(), child_id));
    }

    scheduler.install_instance(
        instance_id,
        ModuleInstance {
            def: module.clone(),
            hier_path,
            vars,
            comb_processes,
            children,
        },
    );
    instance_id
}

pub type InstanceMap = IndexedMap<InstanceId, ModuleInstance>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use xsim_ir::{CombKind, CombProcess, PortBinding, PortDirection};

    fn leaf_module() -> Rc<Module> {
        let mut m = Module::new("leaf");
        m.comb_processes.push(CombProcess {
            kind: CombKind::AlwaysComb,
            stmts: vec![xsim_ir::elab::Stmt::Assign {
                lhs: xsim_ir::elab::Expr::Ref("y".into()),
                rhs: xsim_ir::elab::Expr::Ref("a".into()),
                blocking: true,
            }],
            sensitive_list: vec!["a".into()],
            edge_event_controls: vec![],
        });
        m.inputs.push(PortBinding {
            name: "a".into(),
            direction: PortDirection::In,
            connection: xsim_ir::elab::Expr::Ref("a".into()),
        });
        m.outputs.push(PortBinding {
            name: "y".into(),
            direction: PortDirection::Out,
            connection: xsim_ir::elab::Expr::Ref("y".into()),
        });
        m.variables.push(xsim_ir::elab::VariableDecl {
            name: "a".into(),
            left: 0,
            right: 0,
            signed: false,
            four_state: true,
            continuous_init: None,
        });
        m.variables.push(xsim_ir::elab::VariableDecl {
            name: "y".into(),
            left: 0,
            right: 0,
            signed: false,
            four_state: true,
            continuous_init: None,
        });
        Rc::new(m)
    }

    #[test]
    fn instantiate_populates_tracked_output_variable() {
        let mut scheduler = Scheduler::new_headless();
        let module = leaf_module();
        let id = instantiate(&mut scheduler, &module, HierPath::root("top"));
        let inst = scheduler.instance(id);
        assert!(matches!(inst.var("y"), Some(VarSlot::Tracked(_))));
        assert_eq!(inst.comb_processes.len(), 1);
    }
}
