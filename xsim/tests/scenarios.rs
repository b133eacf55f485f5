//! End-to-end coverage for the worked scenarios (elaboration JSON in,
//! settled/finished runtime state out) rather than per-module unit
//! tests: each case hand-builds an `elab::Design` the way a front end
//! would emit it, runs it through the full `xsim_ir::build_design` ->
//! `xsim::instance::instantiate` -> `Scheduler::run_to_completion`
//! pipeline, and asserts on final scheduler/variable state. `$display`
//! text itself goes straight to stdout with no capture hook, so these
//! check the numeric/state side of each scenario instead of the
//! printed transcript.

use ahash::AHashMap;

use xsim::instance::instantiate;
use xsim::scheduler::Scheduler;
use xsim_ir::elab::{
    ContinuousAssign, Design, EdgeKind, EventExpr, Expr, InstanceBody, InstanceRef, PortConnection,
    PortDecl, PortDirection, ProceduralBlock, ProceduralBlockKind, Stmt, SysTask, TimingControl,
    VariableDecl,
};
use xsim_utils::HierPath;

fn var(name: &str, left: i32, right: i32) -> VariableDecl {
    VariableDecl {
        name: name.into(),
        left,
        right,
        signed: false,
        four_state: true,
        continuous_init: None,
    }
}

fn bit(name: &str) -> VariableDecl {
    var(name, 0, 0)
}

fn lit(bits: u64, width: u32) -> Expr {
    Expr::Literal {
        bits,
        width: Some(width),
        signed: false,
    }
}

fn single_body_design(top: InstanceBody) -> Design {
    let mut bodies = AHashMap::default();
    bodies.insert("top".to_string(), top);
    Design {
        top: "top".to_string(),
        bodies,
    }
}

/// Instantiates `design` and runs it to completion, returning the
/// scheduler and the top instance's id.
fn run(design: &Design) -> (Scheduler, xsim::instance::InstanceId) {
    let top_module = xsim_ir::build_design(design).expect("design elaborates");
    let mut scheduler = Scheduler::new_headless();
    let top_name = top_module.name.clone();
    let top_id = instantiate(&mut scheduler, &top_module, HierPath::root(top_name));
    scheduler.run_to_completion();
    (scheduler, top_id)
}

/// S2: `initial begin #42 $display(...); $finish(1); end` — sim time
/// lands exactly on the delay and the run ends via `$finish`'s code.
#[test]
fn delayed_display_then_finish_stops_at_the_right_time_and_code() {
    let top = InstanceBody {
        procedural_blocks: vec![ProceduralBlock {
            kind: ProceduralBlockKind::Initial,
            body: Stmt::Block(vec![
                Stmt::Timing {
                    control: TimingControl::Delay(42),
                    body: Box::new(Stmt::SysTaskCall {
                        task: SysTask::Display,
                        args: vec![Expr::Str("PASS".into())],
                    }),
                },
                Stmt::SysTaskCall {
                    task: SysTask::Finish,
                    args: vec![lit(1, 32)],
                },
            ]),
        }],
        ..Default::default()
    };

    let (scheduler, _top) = run(&single_body_design(top));
    assert_eq!(scheduler.sim_time(), 42);
    assert_eq!(scheduler.finish_code(), Some(1));
}

/// S3: two independent `initial` blocks with no `$finish` — the run
/// simply drains the event queue, ending at the later of the two
/// delays with no finish code recorded.
#[test]
fn two_initial_blocks_drain_independently_with_no_finish() {
    let top = InstanceBody {
        procedural_blocks: vec![
            ProceduralBlock {
                kind: ProceduralBlockKind::Initial,
                body: Stmt::Timing {
                    control: TimingControl::Delay(5),
                    body: Box::new(Stmt::SysTaskCall {
                        task: SysTask::Display,
                        args: vec![Expr::Str("TESTING".into())],
                    }),
                },
            },
            ProceduralBlock {
                kind: ProceduralBlockKind::Initial,
                body: Stmt::Timing {
                    control: TimingControl::Delay(2),
                    body: Box::new(Stmt::SysTaskCall {
                        task: SysTask::Display,
                        args: vec![Expr::Str("PASS".into())],
                    }),
                },
            },
        ],
        ..Default::default()
    };

    let (scheduler, _top) = run(&single_body_design(top));
    assert_eq!(scheduler.sim_time(), 5);
    assert_eq!(scheduler.finish_code(), None);
}

/// S4: an `always_comb` feeding a continuous assign, driven by two
/// blocking assignments to its input one time unit apart. Checks that
/// both the procedural and continuous halves settle to a fixpoint
/// after every input change, not just once at time 0.
#[test]
fn comb_chain_settles_after_each_driver_change() {
    let top = InstanceBody {
        variables: vec![var("a", 7, 0), var("b", 7, 0), var("c", 7, 0)],
        continuous_assigns: vec![ContinuousAssign {
            lhs: Expr::Ref("c".into()),
            rhs: Expr::Binary(
                xsim_ir::elab::BinaryOp::Add,
                Box::new(Expr::Ref("b".into())),
                Box::new(lit(2, 8)),
            ),
        }],
        procedural_blocks: vec![
            ProceduralBlock {
                kind: ProceduralBlockKind::AlwaysComb,
                body: Stmt::Assign {
                    lhs: Expr::Ref("b".into()),
                    rhs: Expr::Binary(
                        xsim_ir::elab::BinaryOp::Add,
                        Box::new(Expr::Ref("a".into())),
                        Box::new(lit(1, 8)),
                    ),
                    blocking: true,
                },
            },
            ProceduralBlock {
                kind: ProceduralBlockKind::Initial,
                body: Stmt::Block(vec![
                    Stmt::Assign {
                        lhs: Expr::Ref("a".into()),
                        rhs: lit(1, 8),
                        blocking: true,
                    },
                    Stmt::Timing {
                        control: TimingControl::Delay(1),
                        body: Box::new(Stmt::Assign {
                            lhs: Expr::Ref("a".into()),
                            rhs: lit(2, 8),
                            blocking: true,
                        }),
                    },
                ]),
            },
        ],
        ..Default::default()
    };

    let (scheduler, top_id) = run(&single_body_design(top));
    assert_eq!(scheduler.sim_time(), 1);
    assert_eq!(scheduler.read_var(top_id, "a").to_u64(), Some(2));
    assert_eq!(scheduler.read_var(top_id, "b").to_u64(), Some(3));
    assert_eq!(scheduler.read_var(top_id, "c").to_u64(), Some(5));
}

/// S5: `always_ff @(posedge clk) b <= a` only samples `a` on the rising
/// edge, never on the falling edge or on a blocking change to `a` made
/// while `clk` is low.
#[test]
fn ff_samples_only_on_posedge() {
    let top = InstanceBody {
        variables: vec![bit("clk"), var("a", 7, 0), var("b", 7, 0)],
        procedural_blocks: vec![
            ProceduralBlock {
                kind: ProceduralBlockKind::AlwaysFF,
                body: Stmt::Timing {
                    control: TimingControl::EventList(vec![EventExpr::Edge(
                        EdgeKind::Pos,
                        Expr::Ref("clk".into()),
                    )]),
                    body: Box::new(Stmt::Assign {
                        lhs: Expr::Ref("b".into()),
                        rhs: Expr::Ref("a".into()),
                        blocking: false,
                    }),
                },
            },
            ProceduralBlock {
                kind: ProceduralBlockKind::Initial,
                body: Stmt::Block(vec![
                    Stmt::Assign {
                        lhs: Expr::Ref("clk".into()),
                        rhs: lit(0, 1),
                        blocking: true,
                    },
                    Stmt::Assign {
                        lhs: Expr::Ref("a".into()),
                        rhs: lit(1, 8),
                        blocking: true,
                    },
                    Stmt::Timing {
                        control: TimingControl::Delay(1),
                        body: Box::new(Stmt::Assign {
                            lhs: Expr::Ref("clk".into()),
                            rhs: lit(1, 1),
                            blocking: true,
                        }),
                    },
                    Stmt::Timing {
                        control: TimingControl::Delay(1),
                        body: Box::new(Stmt::Assign {
                            lhs: Expr::Ref("clk".into()),
                            rhs: lit(0, 1),
                            blocking: true,
                        }),
                    },
                    Stmt::Assign {
                        lhs: Expr::Ref("a".into()),
                        rhs: lit(2, 8),
                        blocking: true,
                    },
                    Stmt::Timing {
                        control: TimingControl::Delay(1),
                        body: Box::new(Stmt::Assign {
                            lhs: Expr::Ref("clk".into()),
                            rhs: lit(1, 1),
                            blocking: true,
                        }),
                    },
                ]),
            },
        ],
        ..Default::default()
    };

    let (scheduler, top_id) = run(&single_body_design(top));
    assert_eq!(scheduler.sim_time(), 3);
    assert_eq!(scheduler.read_var(top_id, "b").to_u64(), Some(2));
}

/// S7: concatenation both as an rvalue and as an unpacking lvalue, in
/// both blocking and non-blocking form. `{a, b} = c` must distribute
/// `c`'s bits back out in declaration order, and the non-blocking form
/// must not observe its own queued write within the same time step.
#[test]
fn concat_unpack_assignment_distributes_bits_in_order_both_blocking_and_nba() {
    let top = InstanceBody {
        variables: vec![
            var("a", 1, 0),
            bit("b"),
            var("c", 2, 0),
            var("d", 1, 0),
            bit("e"),
            var("f", 2, 0),
        ],
        procedural_blocks: vec![
            ProceduralBlock {
                kind: ProceduralBlockKind::Initial,
                body: Stmt::Block(vec![
                    Stmt::Assign {
                        lhs: Expr::Ref("a".into()),
                        rhs: lit(0b10, 2),
                        blocking: true,
                    },
                    Stmt::Assign {
                        lhs: Expr::Ref("b".into()),
                        rhs: lit(1, 1),
                        blocking: true,
                    },
                    Stmt::Assign {
                        lhs: Expr::Ref("c".into()),
                        rhs: Expr::Concat(vec![Expr::Ref("a".into()), Expr::Ref("b".into())]),
                        blocking: true,
                    },
                    Stmt::Assign {
                        lhs: Expr::Concat(vec![Expr::Ref("b".into()), Expr::Ref("a".into())]),
                        rhs: Expr::Ref("c".into()),
                        blocking: true,
                    },
                ]),
            },
            ProceduralBlock {
                kind: ProceduralBlockKind::Initial,
                body: Stmt::Block(vec![
                    Stmt::Assign {
                        lhs: Expr::Ref("d".into()),
                        rhs: lit(0b10, 2),
                        blocking: true,
                    },
                    Stmt::Assign {
                        lhs: Expr::Ref("e".into()),
                        rhs: lit(1, 1),
                        blocking: true,
                    },
                    Stmt::Assign {
                        lhs: Expr::Ref("f".into()),
                        rhs: Expr::Concat(vec![Expr::Ref("d".into()), Expr::Ref("e".into())]),
                        blocking: false,
                    },
                    Stmt::Timing {
                        control: TimingControl::Delay(1),
                        body: Box::new(Stmt::Assign {
                            lhs: Expr::Concat(vec![Expr::Ref("e".into()), Expr::Ref("d".into())]),
                            rhs: Expr::Ref("f".into()),
                            blocking: false,
                        }),
                    },
                ]),
            },
        ],
        ..Default::default()
    };

    let (scheduler, top_id) = run(&single_body_design(top));
    assert_eq!(scheduler.sim_time(), 1);

    // c = {a, b} = {2'b10, 1'b1} = 3'b101 = 5; then {b, a} = c pulls the
    // top bit into b and the bottom two back into a.
    assert_eq!(scheduler.read_var(top_id, "c").to_u64(), Some(0b101));
    assert_eq!(scheduler.read_var(top_id, "b").to_u64(), Some(1));
    assert_eq!(scheduler.read_var(top_id, "a").to_u64(), Some(1));

    // Same shape through non-blocking assignment, one time step later.
    assert_eq!(scheduler.read_var(top_id, "f").to_u64(), Some(0b101));
    assert_eq!(scheduler.read_var(top_id, "e").to_u64(), Some(1));
    assert_eq!(scheduler.read_var(top_id, "d").to_u64(), Some(1));
}

/// S8: a child instance's `always_ff` output reaches the parent through
/// the synthesized port-wiring process after exactly one posedge.
#[test]
fn child_instance_ff_output_propagates_through_port_wiring() {
    let child = InstanceBody {
        ports: vec![
            PortDecl {
                name: "clk".into(),
                direction: PortDirection::In,
            },
            PortDecl {
                name: "d".into(),
                direction: PortDirection::In,
            },
            PortDecl {
                name: "q".into(),
                direction: PortDirection::Out,
            },
        ],
        variables: vec![bit("clk"), bit("d"), bit("q")],
        procedural_blocks: vec![ProceduralBlock {
            kind: ProceduralBlockKind::AlwaysFF,
            body: Stmt::Timing {
                control: TimingControl::EventList(vec![EventExpr::Edge(
                    EdgeKind::Pos,
                    Expr::Ref("clk".into()),
                )]),
                body: Box::new(Stmt::Assign {
                    lhs: Expr::Ref("q".into()),
                    rhs: Expr::Ref("d".into()),
                    blocking: false,
                }),
            },
        }],
        ..Default::default()
    };

    let top = InstanceBody {
        variables: vec![bit("clk"), bit("d"), bit("w")],
        child_instances: vec![InstanceRef {
            def_name: "child".into(),
            inst_name: "u0".into(),
            connections: vec![
                PortConnection {
                    port_name: "clk".into(),
                    expr: Expr::Ref("clk".into()),
                },
                PortConnection {
                    port_name: "d".into(),
                    expr: Expr::Ref("d".into()),
                },
                PortConnection {
                    port_name: "q".into(),
                    expr: Expr::Ref("w".into()),
                },
            ],
        }],
        procedural_blocks: vec![ProceduralBlock {
            kind: ProceduralBlockKind::Initial,
            body: Stmt::Block(vec![
                Stmt::Assign {
                    lhs: Expr::Ref("clk".into()),
                    rhs: lit(0, 1),
                    blocking: true,
                },
                Stmt::Assign {
                    lhs: Expr::Ref("d".into()),
                    rhs: lit(1, 1),
                    blocking: true,
                },
                Stmt::Timing {
                    control: TimingControl::Delay(1),
                    body: Box::new(Stmt::Assign {
                        lhs: Expr::Ref("clk".into()),
                        rhs: lit(1, 1),
                        blocking: true,
                    }),
                },
            ]),
        }],
        ..Default::default()
    };

    let mut bodies = AHashMap::default();
    bodies.insert("top".to_string(), top);
    bodies.insert("child".to_string(), child);
    let design = Design {
        top: "top".to_string(),
        bodies,
    };

    let (scheduler, top_id) = run(&design);
    assert_eq!(scheduler.sim_time(), 1);
    assert_eq!(scheduler.read_var(top_id, "w").to_u64(), Some(1));
}
