//! The tree-walking interpreter (§4.7's `[AMBIENT]` execution engine).
//!
//! A process body is flattened once, at creation time, into a linear
//! sequence of [`Op`]s addressed by a plain `usize` program counter —
//! the same trick `cider` uses to make a statement tree resumable
//! without native recursion: suspending at a delay, an event wait, or a
//! fork is just returning early and remembering `pc`. [`run`] executes
//! from wherever [`Cursor`] says it last stopped and returns an
//! [`ExecSignal`] describing why it stopped this time.

use xsim_ir::elab::{
    BinaryOp, EdgeKind, Expr, JoinKind, Stmt, SysTask, TimingControl, UnaryOp,
};
use xsim_ir::Value;
use xsim_utils::HierPath;

/// One instruction of a flattened process body.
#[derive(Debug, Clone)]
pub enum Op {
    Assign {
        lhs: Expr,
        rhs: Expr,
        blocking: bool,
    },
    JumpIfFalse {
        cond: Expr,
        target: usize,
    },
    JumpIfTrue {
        cond: Expr,
        target: usize,
    },
    Jump {
        target: usize,
    },
    Delay(u64),
    /// `name` resolved at compile time; `None` edge means level-sensitive.
    WaitEvents(Vec<(String, Option<EdgeKind>)>),
    PushCounter(Expr),
    /// Jumps to `target` (popping the counter) once it has reached zero;
    /// otherwise falls through to the loop body.
    LoopCheckEnd(usize),
    LoopDec,
    Fork {
        branches: Vec<Vec<Op>>,
        join: JoinKind,
    },
    SysTask {
        task: SysTask,
        args: Vec<Expr>,
    },
    Halt,
}

/// A process's saved execution position: the instruction pointer plus
/// any in-flight `repeat` loop counters.
#[derive(Debug, Default, Clone)]
pub struct Cursor {
    pc: usize,
    counters: Vec<u64>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Why [`run`] returned control to its caller.
#[derive(Debug, Clone)]
pub enum ExecSignal {
    /// Ran off the end of the instruction list; the process is finished.
    Done,
    Delay(u64),
    WaitEvents(Vec<(String, Option<EdgeKind>)>),
    Fork {
        branches: Vec<Vec<Op>>,
        join: JoinKind,
    },
    /// `$finish` was called, with its optional numeric diagnostic-level
    /// argument.
    Finish(Option<i64>),
}

/// What a process body is evaluated against: a single module instance's
/// tracked-variable storage plus the handful of scheduler/task hooks an
/// expression or system task can reach into.
pub trait EvalEnv {
    fn read(&self, name: &str) -> Value;
    fn write(&mut self, name: &str, value: Value, blocking: bool);
    fn sim_time(&self) -> u64;
    fn hier_path(&self) -> &HierPath;
    fn sys_task(&mut self, task: SysTask, args: &[Expr]);
}

/// Compiles a procedural body into a flat instruction list. `repeat`
/// makes the process body loop back to its own start once it reaches
/// the end — the shape every `always`/`always_ff`/general-purpose
/// process needs (run once, then go wait again), as opposed to
/// `initial`/`final` blocks and synthesized combinational bodies, which
/// run once and stop.
pub fn compile_process(stmt: &Stmt, repeat: bool) -> Vec<Op> {
    let mut compiler = Compiler::default();
    compiler.compile_stmt(stmt);
    if repeat {
        compiler.emit(Op::Jump { target: 0 });
    } else {
        compiler.emit(Op::Halt);
    }
    compiler.ops
}

#[derive(Default)]
struct Compiler {
    ops: Vec<Op>,
}

impl Compiler {
    fn here(&self) -> usize {
        self.ops.len()
    }

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn patch(&mut self, idx: usize, target: usize) {
        match &mut self.ops[idx] {
            Op::Jump { target: t }
            | Op::JumpIfFalse { target: t, .. }
            | Op::JumpIfTrue { target: t, .. }
            | Op::LoopCheckEnd(t) => *t = target,
            _ => unreachable!("patch() called on a non-jump op"),
        }
    }

    fn compile_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Null => {}
            Stmt::Block(stmts) => stmts.iter().for_each(|s| self.compile_stmt(s)),
            Stmt::Assign { lhs, rhs, blocking } => {
                self.emit(Op::Assign {
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                    blocking: *blocking,
                });
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let jf = self.emit(Op::JumpIfFalse {
                    cond: cond.clone(),
                    target: 0,
                });
                self.compile_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    let jend = self.emit(Op::Jump { target: 0 });
                    self.patch(jf, self.here());
                    self.compile_stmt(else_branch);
                    let end = self.here();
                    self.patch(jend, end);
                } else {
                    let end = self.here();
                    self.patch(jf, end);
                }
            }
            Stmt::Case {
                expr,
                arms,
                default,
            } => self.compile_case(expr, arms, default.as_deref()),
            Stmt::Timing { control, body } => {
                match control {
                    TimingControl::Delay(n) => {
                        self.emit(Op::Delay(*n));
                    }
                    TimingControl::EventList(events) => {
                        let waits = events
                            .iter()
                            .map(|ev| match ev {
                                xsim_ir::elab::EventExpr::Level(Expr::Ref(name)) => {
                                    (name.clone(), None)
                                }
                                xsim_ir::elab::EventExpr::Edge(kind, Expr::Ref(name)) => {
                                    (name.clone(), Some(*kind))
                                }
                                _ => (String::new(), None),
                            })
                            .collect();
                        self.emit(Op::WaitEvents(waits));
                    }
                    TimingControl::Implicit => {
                        // The driver (xsim::instance) re-invokes the whole
                        // body on sensitivity-list changes; there is
                        // nothing for the interpreter itself to wait on.
                    }
                }
                self.compile_stmt(body);
            }
            Stmt::Repeat { count, body } => {
                self.emit(Op::PushCounter(count.clone()));
                let top = self.here();
                let check = self.emit(Op::LoopCheckEnd(0));
                self.compile_stmt(body);
                self.emit(Op::LoopDec);
                self.emit(Op::Jump { target: top });
                let end = self.here();
                self.patch(check, end);
            }
            Stmt::Forever { body } => {
                let top = self.here();
                self.compile_stmt(body);
                self.emit(Op::Jump { target: top });
            }
            Stmt::While { cond, body } => {
                let top = self.here();
                let jf = self.emit(Op::JumpIfFalse {
                    cond: cond.clone(),
                    target: 0,
                });
                self.compile_stmt(body);
                self.emit(Op::Jump { target: top });
                let end = self.here();
                self.patch(jf, end);
            }
            Stmt::Fork { branches, join } => {
                let compiled = branches
                    .iter()
                    .map(|b| compile_process(b, false))
                    .collect();
                self.emit(Op::Fork {
                    branches: compiled,
                    join: *join,
                });
            }
            Stmt::SysTaskCall { task, args } => {
                self.emit(Op::SysTask {
                    task: *task,
                    args: args.clone(),
                });
            }
        }
    }

    fn compile_case(&mut self, expr: &Expr, arms: &[(Vec<Expr>, Stmt)], default: Option<&Stmt>) {
        let mut test_jumps = Vec::new();
        for (arm_idx, (labels, _)) in arms.iter().enumerate() {
            for label in labels {
                let test = Expr::Binary(
                    BinaryOp::CaseEq,
                    Box::new(expr.clone()),
                    Box::new(label.clone()),
                );
                let idx = self.emit(Op::JumpIfTrue { cond: test, target: 0 });
                test_jumps.push((idx, arm_idx));
            }
        }
        let default_jump = self.emit(Op::Jump { target: 0 });

        let mut arm_starts = vec![0usize; arms.len()];
        let mut end_jumps = Vec::new();
        for (arm_idx, (_, body)) in arms.iter().enumerate() {
            arm_starts[arm_idx] = self.here();
            self.compile_stmt(body);
            end_jumps.push(self.emit(Op::Jump { target: 0 }));
        }
        for (idx, arm_idx) in test_jumps {
            self.patch(idx, arm_starts[arm_idx]);
        }

        let default_start = self.here();
        self.patch(default_jump, default_start);
        if let Some(default) = default {
            self.compile_stmt(default);
        }
        let end = self.here();
        for j in end_jumps {
            self.patch(j, end);
        }
    }
}

/// Runs from `cursor`'s saved position until the process finishes or
/// suspends, mutating `cursor` in place so a later call resumes exactly
/// where this one left off.
pub fn run(ops: &[Op], cursor: &mut Cursor, env: &mut dyn EvalEnv) -> ExecSignal {
    loop {
        let Some(op) = ops.get(cursor.pc) else {
            return ExecSignal::Done;
        };
        match op {
            Op::Assign { lhs, rhs, blocking } => {
                let value = eval_expr(env, rhs);
                assign_lhs(env, lhs, value, *blocking);
                cursor.pc += 1;
            }
            Op::JumpIfFalse { cond, target } => {
                let truthy = eval_expr(env, cond).truthy().unwrap_or(false);
                cursor.pc = if truthy { cursor.pc + 1 } else { *target };
            }
            Op::JumpIfTrue { cond, target } => {
                let truthy = eval_expr(env, cond).truthy().unwrap_or(false);
                cursor.pc = if truthy { *target } else { cursor.pc + 1 };
            }
            Op::Jump { target } => cursor.pc = *target,
            Op::Delay(n) => {
                cursor.pc += 1;
                return ExecSignal::Delay(*n);
            }
            Op::WaitEvents(events) => {
                cursor.pc += 1;
                return ExecSignal::WaitEvents(events.clone());
            }
            Op::PushCounter(count) => {
                let v = eval_expr(env, count).to_u64().unwrap_or(0);
                cursor.counters.push(v);
                cursor.pc += 1;
            }
            Op::LoopCheckEnd(target) => {
                if cursor.counters.last().copied().unwrap_or(0) == 0 {
                    cursor.counters.pop();
                    cursor.pc = *target;
                } else {
                    cursor.pc += 1;
                }
            }
            Op::LoopDec => {
                if let Some(c) = cursor.counters.last_mut() {
                    *c = c.saturating_sub(1);
                }
                cursor.pc += 1;
            }
            Op::Fork { branches, join } => {
                cursor.pc += 1;
                return ExecSignal::Fork {
                    branches: branches.clone(),
                    join: *join,
                };
            }
            Op::SysTask { task, args } => {
                if *task == SysTask::Finish {
                    let code = args.first().map(|e| eval_expr(env, e).to_u64().unwrap_or(0) as i64);
                    cursor.pc += 1;
                    return ExecSignal::Finish(code);
                }
                env.sys_task(*task, args);
                cursor.pc += 1;
            }
            Op::Halt => return ExecSignal::Done,
        }
    }
}

/// Recursively assigns `value` into an lvalue expression: a plain
/// reference, or a bit-select/concatenation built out of references and
/// selects (an unpacking assignment, `{a, b} = expr`).
pub fn assign_lhs(env: &mut dyn EvalEnv, lhs: &Expr, value: Value, blocking: bool) {
    match lhs {
        Expr::Ref(name) => env.write(name, value, blocking),
        Expr::Slice { base, hi, lo } => {
            let old = eval_expr(env, base);
            let merged = merge_slice(&old, *hi, *lo, &value);
            assign_lhs(env, base, merged, blocking);
        }
        Expr::Concat(items) => {
            let mut offset = value.width();
            for item in items {
                let w = eval_expr(env, item).width();
                let hi = offset as i32 - 1;
                let lo = offset as i32 - w as i32;
                let piece = value.slice(hi, lo);
                assign_lhs(env, item, piece, blocking);
                offset -= w;
            }
        }
        _ => {}
    }
}

fn merge_slice(base: &Value, hi: i32, lo: i32, piece: &Value) -> Value {
    let mut out = base.clone();
    for idx in lo..=hi {
        let pos = (idx - lo) as u32;
        out.set_bit_at(idx, piece.get_bit(pos));
    }
    out
}

/// Evaluates an expression against the current variable state. `Str`
/// literals (system-task message formats) have no numeric value and
/// are never reached here — callers pattern-match them directly.
pub fn eval_expr(env: &dyn EvalEnv, expr: &Expr) -> Value {
    match expr {
        Expr::Ref(name) => env.read(name),
        Expr::Literal { bits, width, signed } => {
            let w = width.unwrap_or(32) as i32;
            Value::from_u64(*bits, w - 1, 0, *signed, false)
        }
        Expr::Str(_) => Value::zero(0, 0, false, false),
        Expr::Unary(op, inner) => {
            let v = eval_expr(env, inner);
            match op {
                UnaryOp::LogicalNot => v.logical_not(),
                UnaryOp::BitNot => v.bitnot(),
                UnaryOp::ReduceAnd => v.reduce_and(),
                UnaryOp::ReduceOr => v.reduce_or(),
                UnaryOp::ReduceXor => v.reduce_xor(),
                UnaryOp::Neg => v.neg(),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(env, lhs);
            let r = eval_expr(env, rhs);
            match op {
                BinaryOp::Add => l.add(&r),
                BinaryOp::Sub => l.sub(&r),
                BinaryOp::Mul => l.mul(&r),
                BinaryOp::BitAnd => l.bitand(&r),
                BinaryOp::BitOr => l.bitor(&r),
                BinaryOp::BitXor => l.bitxor(&r),
                BinaryOp::LogicalAnd => l.logical_and(&r),
                BinaryOp::LogicalOr => l.logical_or(&r),
                BinaryOp::Eq => match l.logic_eq(&r) {
                    Some(b) => Value::from_u64(b as u64, 0, 0, false, false),
                    None => Value::x(0, 0, false, true),
                },
                BinaryOp::Neq => match l.logic_eq(&r) {
                    Some(b) => Value::from_u64(!b as u64, 0, 0, false, false),
                    None => Value::x(0, 0, false, true),
                },
                BinaryOp::CaseEq => Value::from_u64(l.case_matches(&r) as u64, 0, 0, false, false),
                BinaryOp::CaseNeq => {
                    Value::from_u64(!l.case_matches(&r) as u64, 0, 0, false, false)
                }
                BinaryOp::Lt => l.lt(&r),
                BinaryOp::Le => l.le(&r),
                BinaryOp::Gt => l.gt(&r),
                BinaryOp::Ge => l.ge(&r),
            }
        }
        Expr::Concat(items) => {
            let mut iter = items.iter();
            let first = iter
                .next()
                .map(|e| eval_expr(env, e))
                .unwrap_or_else(|| Value::zero(0, 0, false, false));
            iter.fold(first, |acc, e| acc.concat(&eval_expr(env, e)))
        }
        Expr::Slice { base, hi, lo } => eval_expr(env, base).slice(*hi, *lo),
        Expr::Extend { base, width, signed } => eval_expr(env, base).extend(*width, *signed),
        Expr::Cond {
            cond,
            then_expr,
            else_expr,
        } => match eval_expr(env, cond).truthy() {
            Some(true) => eval_expr(env, then_expr),
            Some(false) => eval_expr(env, else_expr),
            None => {
                let t = eval_expr(env, then_expr);
                Value::x(t.width() as i32 - 1, 0, t.is_signed(), true)
            }
        },
        Expr::SysFuncCall { name, .. } if name == "$time" => {
            Value::from_u64(env.sim_time(), 63, 0, false, false)
        }
        Expr::SysFuncCall { .. } => Value::zero(0, 0, false, false),
    }
}
