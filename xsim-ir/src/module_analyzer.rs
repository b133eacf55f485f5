//! The module analyzer (§4.3): walks the elaborated design tree,
//! recurses on child instances, memoizes module definitions by name,
//! and wires up port connections into a synthetic combinational
//! process per instance.
//!
//! Grounded on `ModuleDefinitionVisitor` in `original_source/src/ast.hh`
//! and `Module::analyze`/`analyze_connections`/`analyze_inst` declared
//! in `original_source/src/ir.hh`.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use xsim_utils::{Diag, HierPath, XsimResult};

use crate::dep_analyzer;
use crate::elab::{self, Design, Expr, InstanceBody, PortDirection as ElabPortDirection};
use crate::process_ir::{CombKind, CombProcess, Module, PortBinding, PortDirection};

/// Qualifies a child instance's port as a dotted name in the parent's
/// variable namespace (`u0.y`), the same join `HierPath`'s `Display`
/// uses for hierarchical paths.
fn qualify(inst_name: &str, port_name: &str) -> String {
    format!("{inst_name}.{port_name}")
}

fn named_values(expr: &Expr) -> Vec<String> {
    let mut out = Vec::new();
    expr.named_values(&mut out);
    out.into_iter().map(str::to_string).collect()
}

/// Builds the `Module` tree for a whole elaborated [`Design`], starting
/// from its top instance.
pub fn build_design(design: &Design) -> XsimResult<Rc<Module>> {
    let mut cache = HashMap::new();
    build_module(&design.top, design, &HierPath::root(design.top.clone()), &mut cache)
}

fn build_module(
    def_name: &str,
    design: &Design,
    hier_path: &HierPath,
    cache: &mut HashMap<String, Rc<Module>>,
) -> XsimResult<Rc<Module>> {
    if let Some(existing) = cache.get(def_name) {
        return Ok(existing.clone());
    }

    let body: &InstanceBody = design
        .bodies
        .get(def_name)
        .ok_or_else(|| Diag::UnknownIdentifier(def_name.to_string()))?;

    let (inputs, outputs) = classify_ports(body)?;
    let dep = dep_analyzer::analyze(body, hier_path)?;

    let mut module = Module {
        name: def_name.to_string(),
        comb_processes: dep.comb_processes,
        ff_processes: dep.ff_processes,
        init_processes: dep.init_processes,
        final_processes: dep.final_processes,
        inputs,
        outputs,
        child_instances: Vec::new(),
        variables: body.variables.clone(),
    };

    for inst in &body.child_instances {
        let child_hier = hier_path.child(inst.inst_name.clone());
        let child = build_module(&inst.def_name, design, &child_hier, cache)?;
        let wiring = synthesize_port_wiring(inst, &child)?;
        module.comb_processes.push(wiring);
        module
            .child_instances
            .push((inst.inst_name.clone(), child));
    }

    let module = Rc::new(module);
    cache.insert(def_name.to_string(), module.clone());
    Ok(module)
}

fn classify_ports(body: &InstanceBody) -> XsimResult<(Vec<PortBinding>, Vec<PortBinding>)> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for port in &body.ports {
        let binding = |direction| PortBinding {
            name: port.name.clone(),
            direction,
            connection: Expr::Ref(port.name.clone()),
        };
        match port.direction {
            ElabPortDirection::In => inputs.push(binding(PortDirection::In)),
            ElabPortDirection::Out => outputs.push(binding(PortDirection::Out)),
            ElabPortDirection::InOut => {
                return Err(Diag::UnsupportedPortDirection {
                    port: port.name.clone(),
                })
            }
        }
    }
    Ok((inputs, outputs))
}

/// One synthetic `CombProcess` per child instance: `port_var ←
/// rhs_expr` for inputs, `lhs_expr ← port_var` for outputs. Sensitivity
/// is the union of every named value in an input's rhs plus every
/// output port var (§4.3, "Port-connection synthesis").
fn synthesize_port_wiring(inst: &elab::InstanceRef, child: &Module) -> XsimResult<CombProcess> {
    let mut stmts = Vec::new();
    let mut sensitive = BTreeSet::new();

    for conn in &inst.connections {
        let qualified = Expr::Ref(qualify(&inst.inst_name, &conn.port_name));
        if child.inputs.iter().any(|p| p.name == conn.port_name) {
            sensitive.extend(named_values(&conn.expr));
            stmts.push(elab::Stmt::Assign {
                lhs: qualified,
                rhs: conn.expr.clone(),
                blocking: true,
            });
        } else if child.outputs.iter().any(|p| p.name == conn.port_name) {
            sensitive.insert(qualify(&inst.inst_name, &conn.port_name));
            stmts.push(elab::Stmt::Assign {
                lhs: conn.expr.clone(),
                rhs: qualified,
                blocking: true,
            });
        } else {
            return Err(Diag::UnknownIdentifier(conn.port_name.clone()));
        }
    }

    Ok(CombProcess {
        kind: CombKind::Implicit,
        stmts,
        sensitive_list: sensitive.into_iter().collect(),
        edge_event_controls: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elab::{
        ContinuousAssign, InstanceBody, InstanceRef, PortConnection, PortDecl, VariableDecl,
    };
    use ahash::AHashMap;

    fn var(name: &str) -> VariableDecl {
        VariableDecl {
            name: name.to_string(),
            left: 0,
            right: 0,
            signed: false,
            four_state: true,
            continuous_init: None,
        }
    }

    #[test]
    fn two_instances_of_the_same_definition_share_one_module() {
        let leaf = InstanceBody {
            ports: vec![
                PortDecl {
                    name: "a".into(),
                    direction: ElabPortDirection::In,
                },
                PortDecl {
                    name: "y".into(),
                    direction: ElabPortDirection::Out,
                },
            ],
            variables: vec![var("a"), var("y")],
            continuous_assigns: vec![ContinuousAssign {
                lhs: Expr::Ref("y".into()),
                rhs: Expr::Ref("a".into()),
            }],
            procedural_blocks: vec![],
            child_instances: vec![],
        };

        let top = InstanceBody {
            ports: vec![],
            variables: vec![var("x"), var("w0"), var("w1")],
            continuous_assigns: vec![],
            procedural_blocks: vec![],
            child_instances: vec![
                InstanceRef {
                    def_name: "leaf".into(),
                    inst_name: "u0".into(),
                    connections: vec![
                        PortConnection {
                            port_name: "a".into(),
                            expr: Expr::Ref("x".into()),
                        },
                        PortConnection {
                            port_name: "y".into(),
                            expr: Expr::Ref("w0".into()),
                        },
                    ],
                },
                InstanceRef {
                    def_name: "leaf".into(),
                    inst_name: "u1".into(),
                    connections: vec![
                        PortConnection {
                            port_name: "a".into(),
                            expr: Expr::Ref("x".into()),
                        },
                        PortConnection {
                            port_name: "y".into(),
                            expr: Expr::Ref("w1".into()),
                        },
                    ],
                },
            ],
        };

        let mut bodies = AHashMap::default();
        bodies.insert("leaf".to_string(), leaf);
        bodies.insert("top".to_string(), top);
        let design = Design {
            top: "top".to_string(),
            bodies,
        };

        let top_module = build_design(&design).unwrap();
        assert_eq!(top_module.child_instances.len(), 2);
        assert!(Rc::ptr_eq(
            &top_module.child_instances[0].1,
            &top_module.child_instances[1].1
        ));
        // One synthesized port-wiring comb process per instance.
        assert_eq!(top_module.comb_processes.len(), 2);
    }

    #[test]
    fn inout_port_direction_is_rejected() {
        let body = InstanceBody {
            ports: vec![PortDecl {
                name: "b".into(),
                direction: ElabPortDirection::InOut,
            }],
            variables: vec![var("b")],
            continuous_assigns: vec![],
            procedural_blocks: vec![],
            child_instances: vec![],
        };
        let mut bodies = AHashMap::default();
        bodies.insert("top".to_string(), body);
        let design = Design {
            top: "top".to_string(),
            bodies,
        };
        let err = build_design(&design).unwrap_err();
        assert!(matches!(err, Diag::UnsupportedPortDirection { .. }));
    }
}
