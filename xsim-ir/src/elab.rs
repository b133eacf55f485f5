//! The elaborated-syntax-tree input contract (§3a of `SPEC_FULL.md`).
//!
//! The parser/type-checker that produces a type-checked, elaborated
//! design hierarchy is an external collaborator (§1) — this module is
//! the narrow surface the dependency analyzer and module analyzer
//! actually walk, standing in for the subset of `slang`'s AST that the
//! system this spec distills (`fsim`) visits: `ContinuousAssignSymbol`,
//! `ProceduralBlockSymbol`, `NetSymbol`, `InstanceSymbol`, `PortSymbol`,
//! `NamedValueExpression` (see `src/ast.hh`/`src/ir.hh` in its sources).

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// A named-value reference, literal, or composite expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A reference to a variable/net/port by name (a
    /// `NamedValueExpression` analogue). This is the only expression
    /// form the dependency analyzer treats as a dataflow source/sink.
    Ref(String),
    /// An integer literal. `width` is `None` when the literal carries no
    /// explicit size, in which case the "effective width" heuristic
    /// (§9c) applies at evaluation time.
    Literal {
        bits: u64,
        width: Option<u32>,
        signed: bool,
    },
    /// A format/message string literal, used only as a system-task
    /// argument (never a dataflow source).
    Str(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `{a, b, c}`, `a` in the high bits.
    Concat(Vec<Expr>),
    /// `base[hi:lo]`.
    Slice { base: Box<Expr>, hi: i32, lo: i32 },
    Extend {
        base: Box<Expr>,
        width: u32,
        signed: bool,
    },
    Cond {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// A system function used in expression position, e.g. `$time`.
    SysFuncCall { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Collects every [`Expr::Ref`] named value reachable from this
    /// expression, used throughout §4.1/§4.2 ("extract left/right named
    /// values").
    pub fn named_values<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Ref(name) => out.push(name),
            Expr::Literal { .. } | Expr::Str(_) => {}
            Expr::Unary(_, e) | Expr::Slice { base: e, .. } | Expr::Extend { base: e, .. } => {
                e.named_values(out)
            }
            Expr::Binary(_, l, r) => {
                l.named_values(out);
                r.named_values(out);
            }
            Expr::Concat(items) => items.iter().for_each(|e| e.named_values(out)),
            Expr::Cond {
                cond,
                then_expr,
                else_expr,
            } => {
                cond.named_values(out);
                then_expr.named_values(out);
                else_expr.named_values(out);
            }
            Expr::SysFuncCall { args, .. } => {
                args.iter().for_each(|e| e.named_values(out))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    LogicalNot,
    BitNot,
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    Eq,
    Neq,
    CaseEq,
    CaseNeq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `posedge`/`negedge`/`edge` keyword on an event-control expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Pos,
    Neg,
    Both,
}

/// One entry of an `@(...)` event-control list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventExpr {
    /// `@(signal)` — level-sensitive, no edge keyword.
    Level(Expr),
    /// `@(posedge/negedge/edge signal)`.
    Edge(EdgeKind, Expr),
}

/// The timing control guarding a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimingControl {
    /// `#N`.
    Delay(u64),
    /// `@(...)`, a non-empty explicit event list.
    EventList(Vec<EventExpr>),
    /// `@*` / `@(*)`.
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    All,
    Any,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SysTask {
    Display,
    Write,
    Strobe,
    Monitor,
    Finish,
    Fopen,
    Fclose,
    Fwrite,
    Fdisplay,
    Assert,
}

/// A procedural statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Null,
    Block(Vec<Stmt>),
    Assign {
        lhs: Expr,
        rhs: Expr,
        blocking: bool,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Case {
        expr: Expr,
        arms: Vec<(Vec<Expr>, Stmt)>,
        default: Option<Box<Stmt>>,
    },
    Timing {
        control: TimingControl,
        body: Box<Stmt>,
    },
    Repeat {
        count: Expr,
        body: Box<Stmt>,
    },
    Forever {
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Fork {
        branches: Vec<Stmt>,
        join: JoinKind,
    },
    SysTaskCall {
        task: SysTask,
        args: Vec<Expr>,
    },
}

impl Stmt {
    /// Walks every statement transitively reachable from `self`,
    /// including `self`.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        f(self);
        match self {
            Stmt::Null | Stmt::Assign { .. } | Stmt::SysTaskCall { .. } => {}
            Stmt::Block(stmts) => stmts.iter().for_each(|s| s.walk(f)),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.walk(f);
                if let Some(e) = else_branch {
                    e.walk(f);
                }
            }
            Stmt::Case { arms, default, .. } => {
                arms.iter().for_each(|(_, s)| s.walk(f));
                if let Some(d) = default {
                    d.walk(f);
                }
            }
            Stmt::Timing { body, .. } => body.walk(f),
            Stmt::Repeat { body, .. } | Stmt::Forever { body } | Stmt::While { body, .. } => {
                body.walk(f)
            }
            Stmt::Fork { branches, .. } => branches.iter().for_each(|s| s.walk(f)),
        }
    }

    /// True if any timing control occurs anywhere within this statement.
    pub fn contains_timing_control(&self) -> bool {
        let mut found = false;
        self.walk(&mut |s| {
            if matches!(s, Stmt::Timing { .. }) {
                found = true;
            }
        });
        found
    }

    /// Collects every `posedge`/`negedge`/`both` event control reachable
    /// from `self`, used to populate `edge_event_controls` (§4.1).
    pub fn edge_event_controls(&self) -> Vec<(String, EdgeKind)> {
        let mut out = Vec::new();
        self.walk(&mut |s| {
            if let Stmt::Timing {
                control: TimingControl::EventList(events),
                ..
            } = s
            {
                for ev in events {
                    if let EventExpr::Edge(kind, Expr::Ref(name)) = ev {
                        out.push((name.clone(), *kind));
                    }
                }
            }
        });
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProceduralBlockKind {
    Initial,
    Final,
    Always,
    AlwaysComb,
    AlwaysLatch,
    AlwaysFF,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProceduralBlock {
    pub kind: ProceduralBlockKind,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousAssign {
    pub lhs: Expr,
    pub rhs: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub left: i32,
    pub right: i32,
    pub signed: bool,
    pub four_state: bool,
    /// `Some` for a net with a continuous initializer at module scope
    /// (§4.1 step 3); treated as an implicit continuous assignment.
    pub continuous_init: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    pub direction: PortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConnection {
    pub port_name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRef {
    pub def_name: String,
    pub inst_name: String,
    pub connections: Vec<PortConnection>,
}

/// The elaborated body of a single module definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceBody {
    pub ports: Vec<PortDecl>,
    pub variables: Vec<VariableDecl>,
    pub continuous_assigns: Vec<ContinuousAssign>,
    pub procedural_blocks: Vec<ProceduralBlock>,
    pub child_instances: Vec<InstanceRef>,
}

/// A whole elaborated design: one body per unique definition name plus
/// the name of the top-level instance's definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Design {
    pub top: String,
    pub bodies: AHashMap<String, InstanceBody>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_values_collects_refs_through_concat() {
        let expr = Expr::Concat(vec![Expr::Ref("a".into()), Expr::Ref("b".into())]);
        let mut out = Vec::new();
        expr.named_values(&mut out);
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn edge_event_controls_finds_nested_edges() {
        let body = Stmt::Block(vec![Stmt::Timing {
            control: TimingControl::EventList(vec![EventExpr::Edge(
                EdgeKind::Pos,
                Expr::Ref("clk".into()),
            )]),
            body: Box::new(Stmt::Null),
        }]);
        assert_eq!(
            body.edge_event_controls(),
            vec![("clk".to_string(), EdgeKind::Pos)]
        );
    }
}
