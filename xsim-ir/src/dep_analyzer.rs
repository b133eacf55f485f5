//! The dependency analyzer (§4.1): turns one elaborated instance body
//! into classified, sensitivity-annotated processes.
//!
//! Grounded on `DependencyAnalysisVisitor` in `original_source/src/ast.hh`
//! and the `Module::analyze_*` family in `original_source/src/ir.cc`
//! (not present in this pack, but its declarations in `src/ir.hh` name
//! the same split: `analyze_connections`/`analyze_comb`/`analyze_init`/
//! `analyze_ff`/`analyze_final`).

use std::collections::BTreeSet;

use xsim_utils::{Diag, HierPath, XsimResult};

use crate::elab::{
    ContinuousAssign, EdgeKind as ElabEdgeKind, EventExpr, Expr, InstanceBody, ProceduralBlock,
    ProceduralBlockKind, Stmt, TimingControl, VariableDecl,
};
use crate::graph::Graph;
use crate::process_ir::{CombKind, CombProcess, EdgeKind, FFProcess, Process};
use crate::sensitivity::SensitivityBuilder;
use petgraph::graph::NodeIndex;

/// What produced a given graph node, so the process-synthesis walk
/// knows how to turn it back into a statement.
enum NodeOrigin {
    ContinuousAssign(Stmt),
    ProceduralBlock(Box<ProceduralBlock>),
}

/// Everything §4.1 hands back for one instance body.
#[derive(Debug, Clone, Default)]
pub struct DepAnalysisResult {
    pub comb_processes: Vec<CombProcess>,
    pub ff_processes: Vec<FFProcess>,
    pub init_processes: Vec<Process>,
    pub final_processes: Vec<Process>,
    /// `#delay`-guarded procedural statements found at module scope;
    /// forwarded for the scheduler's general-purpose delay machinery,
    /// not otherwise interpreted here.
    pub timed_stmts: Vec<Stmt>,
}

fn named_values_of(expr: &Expr) -> BTreeSet<String> {
    let mut out = Vec::new();
    expr.named_values(&mut out);
    out.into_iter().map(str::to_string).collect()
}

/// Collects the `(left, right)` variable sets of a statement: every
/// variable assigned to, and every variable read (including event and
/// conditional expressions), per the informal LRM "left/right set"
/// extraction §4.1 calls for on `always_comb`/`always_latch` bodies.
fn assign_sets(stmt: &Stmt, left: &mut BTreeSet<String>, right: &mut BTreeSet<String>) {
    match stmt {
        Stmt::Null => {}
        Stmt::SysTaskCall { args, .. } => {
            for a in args {
                right.extend(named_values_of(a));
            }
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                assign_sets(s, left, right);
            }
        }
        Stmt::Assign { lhs, rhs, .. } => {
            left.extend(named_values_of(lhs));
            right.extend(named_values_of(rhs));
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            right.extend(named_values_of(cond));
            assign_sets(then_branch, left, right);
            if let Some(e) = else_branch {
                assign_sets(e, left, right);
            }
        }
        Stmt::Case {
            expr,
            arms,
            default,
        } => {
            right.extend(named_values_of(expr));
            for (labels, body) in arms {
                for l in labels {
                    right.extend(named_values_of(l));
                }
                assign_sets(body, left, right);
            }
            if let Some(d) = default {
                assign_sets(d, left, right);
            }
        }
        Stmt::Timing { control, body } => {
            if let TimingControl::EventList(events) = control {
                for ev in events {
                    let e = match ev {
                        EventExpr::Level(e) | EventExpr::Edge(_, e) => e,
                    };
                    right.extend(named_values_of(e));
                }
            }
            assign_sets(body, left, right);
        }
        Stmt::Repeat { count, body } => {
            right.extend(named_values_of(count));
            assign_sets(body, left, right);
        }
        Stmt::Forever { body } => assign_sets(body, left, right),
        Stmt::While { cond, body } => {
            right.extend(named_values_of(cond));
            assign_sets(body, left, right);
        }
        Stmt::Fork { branches, .. } => {
            for b in branches {
                assign_sets(b, left, right);
            }
        }
    }
}

/// Unwraps a single-statement `Block` to find the statement that
/// actually carries the block's top-level timing control, mirroring
/// "the top statement" wording in §4.1.
fn top_timing(stmt: &Stmt) -> Option<(&TimingControl, &Stmt)> {
    match stmt {
        Stmt::Timing { control, body } => Some((control, body)),
        Stmt::Block(stmts) if stmts.len() == 1 => top_timing(&stmts[0]),
        _ => None,
    }
}

fn is_all_level(events: &[EventExpr]) -> bool {
    events.iter().all(|e| matches!(e, EventExpr::Level(_)))
}

/// Classification outcome for a legacy `always` block (§4.1 step 2).
enum AlwaysShape<'a> {
    /// Combinational: implicit `@*`, falling back to extraction from the
    /// whole body.
    ImplicitExtraction,
    /// Combinational: an explicit level-only event list: `right` and
    /// `sensitive_list` both come straight from the listed refs.
    ExplicitLevelList(&'a [EventExpr]),
    /// Contains timing control but isn't edge/level-only — goes to
    /// `general_always_stmts`.
    GeneralPurpose,
    /// No timing control anywhere in the body at all.
    NoTiming,
}

fn classify_always(body: &Stmt) -> AlwaysShape<'_> {
    if let Some((control, _inner)) = top_timing(body) {
        match control {
            TimingControl::Implicit => return AlwaysShape::ImplicitExtraction,
            TimingControl::EventList(events) if is_all_level(events) => {
                return AlwaysShape::ExplicitLevelList(events)
            }
            _ => {}
        }
    }
    if body.contains_timing_control() {
        AlwaysShape::GeneralPurpose
    } else {
        AlwaysShape::NoTiming
    }
}

fn to_edge_kind(k: ElabEdgeKind) -> EdgeKind {
    match k {
        ElabEdgeKind::Pos => EdgeKind::Pos,
        ElabEdgeKind::Neg => EdgeKind::Neg,
        ElabEdgeKind::Both => EdgeKind::Both,
    }
}

fn edge_event_controls(stmt: &Stmt) -> Vec<(String, EdgeKind)> {
    stmt.edge_event_controls()
        .into_iter()
        .map(|(name, kind)| (name, to_edge_kind(kind)))
        .collect()
}

struct GraphBuild {
    graph: Graph,
    order: Vec<(NodeIndex, NodeOrigin)>,
    general_always_stmts: Vec<Stmt>,
    timed_stmts: Vec<Stmt>,
}

fn build_graph(body: &InstanceBody) -> XsimResult<GraphBuild> {
    let mut g = Graph::new();
    let mut order = Vec::new();
    let mut general_always_stmts = Vec::new();
    let mut timed_stmts = Vec::new();

    // Ensure every declared variable exists as a node up front so edges
    // referring to never-assigned inputs still resolve.
    for v in &body.variables {
        g.variable(&v.name);
    }

    // Step 1: continuous assigns.
    for ca in &body.continuous_assigns {
        add_continuous_assign_node(&mut g, &mut order, ca.lhs.clone(), ca.rhs.clone());
    }

    // Step 3: net initializers, treated as implicit continuous assigns.
    for v in &body.variables {
        if let Some(init) = &v.continuous_init {
            add_continuous_assign_node(&mut g, &mut order, Expr::Ref(v.name.clone()), init.clone());
        }
    }

    // Step 2: procedural blocks.
    for pb in &body.procedural_blocks {
        match pb.kind {
            ProceduralBlockKind::Initial | ProceduralBlockKind::Final => continue,
            ProceduralBlockKind::AlwaysComb | ProceduralBlockKind::AlwaysLatch => {
                add_comb_block_node(&mut g, &mut order, pb);
            }
            ProceduralBlockKind::Always => match classify_always(&pb.body) {
                AlwaysShape::ImplicitExtraction | AlwaysShape::ExplicitLevelList(_) => {
                    add_comb_block_node(&mut g, &mut order, pb);
                }
                AlwaysShape::GeneralPurpose => general_always_stmts.push(pb.body.clone()),
                AlwaysShape::NoTiming => return Err(Diag::NoTimingControl),
            },
            ProceduralBlockKind::AlwaysFF => continue,
        }
        if let Some((TimingControl::Delay(_), _)) = top_timing(&pb.body) {
            timed_stmts.push(pb.body.clone());
        }
    }

    Ok(GraphBuild {
        graph: g,
        order,
        general_always_stmts,
        timed_stmts,
    })
}

fn add_continuous_assign_node(
    g: &mut Graph,
    order: &mut Vec<(NodeIndex, NodeOrigin)>,
    lhs: Expr,
    rhs: Expr,
) {
    let block = g.new_block();
    for r in named_values_of(&rhs) {
        let v = g.variable(&r);
        g.add_edge(v, block);
    }
    for l in named_values_of(&lhs) {
        let v = g.variable(&l);
        g.add_edge(block, v);
    }
    order.push((
        block,
        NodeOrigin::ContinuousAssign(Stmt::Assign {
            lhs,
            rhs,
            blocking: true,
        }),
    ));
}

fn add_comb_block_node(g: &mut Graph, order: &mut Vec<(NodeIndex, NodeOrigin)>, pb: &ProceduralBlock) {
    let mut left = BTreeSet::new();
    let mut right = BTreeSet::new();
    assign_sets(&pb.body, &mut left, &mut right);
    let block = g.new_block();
    for r in &right {
        let v = g.variable(r);
        g.add_edge(v, block);
    }
    for l in &left {
        let v = g.variable(l);
        g.add_edge(block, v);
    }
    order.push((block, NodeOrigin::ProceduralBlock(Box::new(pb.clone()))));
}

fn comb_kind_for(pb: &ProceduralBlock) -> CombKind {
    match pb.kind {
        ProceduralBlockKind::AlwaysLatch => CombKind::Latch,
        ProceduralBlockKind::AlwaysComb => CombKind::AlwaysComb,
        ProceduralBlockKind::Always => CombKind::Implicit,
        _ => CombKind::Implicit,
    }
}

/// Runs the full §4.1 pipeline over one elaborated instance body.
pub fn analyze(body: &InstanceBody, hier_path: &HierPath) -> XsimResult<DepAnalysisResult> {
    let GraphBuild {
        graph,
        order,
        general_always_stmts,
        timed_stmts,
    } = build_graph(body)?;

    let sorted = graph.topo_sort(hier_path)?;

    let mut origin_by_node: std::collections::HashMap<NodeIndex, &NodeOrigin> =
        std::collections::HashMap::new();
    for (idx, origin) in &order {
        origin_by_node.insert(*idx, origin);
    }

    let mut comb_processes = Vec::new();
    let mut draft_stmts: Vec<Stmt> = Vec::new();
    let mut draft_nodes: Vec<NodeIndex> = Vec::new();

    let flush = |draft_stmts: &mut Vec<Stmt>,
                 draft_nodes: &mut Vec<NodeIndex>,
                 graph: &Graph,
                 out: &mut Vec<CombProcess>| {
        if draft_stmts.is_empty() {
            return;
        }
        let sensitive_list = sensitivity_for(graph, draft_nodes);
        out.push(CombProcess {
            kind: CombKind::Implicit,
            stmts: std::mem::take(draft_stmts),
            sensitive_list,
            edge_event_controls: Vec::new(),
        });
        draft_nodes.clear();
    };

    for idx in &sorted {
        match origin_by_node.get(idx) {
            None => continue, // a bare Variable node: declaration only
            Some(NodeOrigin::ContinuousAssign(stmt)) => {
                draft_stmts.push(stmt.clone());
                draft_nodes.push(*idx);
            }
            Some(NodeOrigin::ProceduralBlock(pb)) => {
                flush(&mut draft_stmts, &mut draft_nodes, &graph, &mut comb_processes);
                let mut sensitive_list = sensitivity_for(&graph, &[*idx]);
                if let ProceduralBlockKind::Always = pb.kind {
                    if let AlwaysShape::ExplicitLevelList(events) = classify_always(&pb.body) {
                        let mut explicit = BTreeSet::new();
                        for ev in events {
                            if let EventExpr::Level(e) = ev {
                                explicit.extend(named_values_of(e));
                            }
                        }
                        sensitive_list = explicit.into_iter().collect();
                    }
                }
                comb_processes.push(CombProcess {
                    kind: comb_kind_for(pb),
                    stmts: vec![pb.body.clone()],
                    sensitive_list,
                    edge_event_controls: edge_event_controls(&pb.body),
                });
            }
        }
    }
    flush(&mut draft_stmts, &mut draft_nodes, &graph, &mut comb_processes);

    for stmt in &general_always_stmts {
        comb_processes.push(CombProcess {
            kind: CombKind::GeneralPurpose,
            stmts: vec![stmt.clone()],
            sensitive_list: Vec::new(),
            edge_event_controls: edge_event_controls(stmt),
        });
    }

    let (ff_processes, init_processes, final_processes) = extract_sequential(body)?;

    Ok(DepAnalysisResult {
        comb_processes,
        ff_processes,
        init_processes,
        final_processes,
        timed_stmts,
    })
}

fn sensitivity_for(graph: &Graph, nodes: &[NodeIndex]) -> Vec<String> {
    let mut builder = SensitivityBuilder::new();
    for &idx in nodes {
        builder.add_node(graph, idx);
    }
    builder.finish()
}

/// Extracts `initial`/`final` blocks and sequential `always_ff` blocks,
/// a separate pass over the same body (§4.1, "After comb synthesis").
fn extract_sequential(
    body: &InstanceBody,
) -> XsimResult<(Vec<FFProcess>, Vec<Process>, Vec<Process>)> {
    let mut ff = Vec::new();
    let mut init = Vec::new();
    let mut fin = Vec::new();

    for pb in &body.procedural_blocks {
        match pb.kind {
            ProceduralBlockKind::Initial => init.push(Process {
                stmts: vec![pb.body.clone()],
                edge_event_controls: edge_event_controls(&pb.body),
            }),
            ProceduralBlockKind::Final => fin.push(Process {
                stmts: vec![pb.body.clone()],
                edge_event_controls: edge_event_controls(&pb.body),
            }),
            ProceduralBlockKind::AlwaysFF => {
                ff.push(extract_ff_process(pb)?);
            }
            _ => {}
        }
    }

    Ok((ff, init, fin))
}

fn extract_ff_process(pb: &ProceduralBlock) -> XsimResult<FFProcess> {
    let (control, _) = top_timing(&pb.body).ok_or(Diag::NonNamedEventExpression)?;
    let events = match control {
        TimingControl::EventList(events) => events,
        _ => return Err(Diag::NonNamedEventExpression),
    };

    let mut edges = Vec::new();
    for ev in events {
        match ev {
            EventExpr::Edge(ElabEdgeKind::Both, _) => {
                return Err(Diag::BothEdgesNotSupported {
                    var: "<event expression>".to_string(),
                })
            }
            EventExpr::Edge(kind, Expr::Ref(name)) => {
                edges.push((to_edge_kind(*kind), name.clone()));
            }
            _ => return Err(Diag::NonNamedEventExpression),
        }
    }

    Ok(FFProcess {
        stmts: vec![pb.body.clone()],
        edges,
        edge_event_controls: edge_event_controls(&pb.body),
    })
}
