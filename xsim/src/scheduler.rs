//! The event-driven simulation kernel (§4.4 "Scheduler creation",
//! "Edge waits", "Finish"; §4.5 "Module base").
//!
//! `cider` walks Calyx IR directly rather than lowering it to native
//! code first; this kernel does the same thing one level further down —
//! it doesn't even compile the IR to native code between elaboration
//! and execution, it interprets the flattened op list
//! ([`crate::eval::Op`]) straight off each [`crate::process::RuntimeProcess`].
//! No example in this codebase's lineage drives its interpreter off
//! real OS threads, so this is a single-threaded cooperative loop: one
//! ready queue, one delay heap, one set of pending non-blocking writes,
//! all stepped from `run_to_completion`. See `DESIGN.md` for the
//! reasoning.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;

use xsim_idx::{impl_index, IndexedMap};
use xsim_ir::elab::{EdgeKind, Expr, JoinKind, Stmt, SysTask};
use xsim_ir::{CombProcess, FFProcess, Process, ProcessId, TrackedValue, Value};
use xsim_utils::HierPath;

use crate::dpi::DpiLoader;
use crate::eval::{self, Cursor, EvalEnv, ExecSignal};
use crate::instance::{InstanceId, InstanceMap, ModuleInstance, VarSlot};
use crate::logging::{debug, Logger};
use crate::process::{ProcKind, ProcState, RuntimeProcess, Suspend};
use crate::tasks::{self, FileTable};

/// Identifies one outstanding `fork...join`/`join_any` (§4.4 "Fork
/// creation"). `fork...join_none` branches never get one — see
/// [`ProcKind::Fork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinId(u32);
impl_index!(JoinId);

struct ScheduledJoin {
    parent: ProcessId,
    kind: JoinKind,
    remaining: usize,
    satisfied: bool,
}

/// A deferred non-blocking (`<=`) write, applied in the NBA region
/// (§4.4) once the active region has run to a fixpoint.
struct NbaWrite {
    instance: InstanceId,
    name: String,
    value: Value,
}

struct FinishInfo {
    code: Option<i64>,
}

/// Owns every live instance and process for one simulation run, plus
/// the time wheel, ready queue, and NBA backlog that drive them.
pub struct Scheduler {
    instances: InstanceMap,
    processes: IndexedMap<ProcessId, RuntimeProcess>,
    ready: VecDeque<ProcessId>,
    delay_queue: BinaryHeap<Reverse<(u64, ProcessId)>>,
    nbas: Vec<NbaWrite>,
    joins: IndexedMap<JoinId, ScheduledJoin>,
    sim_time: u64,
    finish: Option<FinishInfo>,
    files: FileTable,
    dpi: Option<DpiLoader>,
    log: Option<Logger>,
}

impl Scheduler {
    /// A bare scheduler with no DPI libraries and no logger — what
    /// instance-tree construction tests build against.
    pub fn new_headless() -> Self {
        Self {
            instances: IndexedMap::new(),
            processes: IndexedMap::new(),
            ready: VecDeque::new(),
            delay_queue: BinaryHeap::new(),
            nbas: Vec::new(),
            joins: IndexedMap::new(),
            sim_time: 0,
            finish: None,
            files: FileTable::new(),
            dpi: None,
            log: None,
        }
    }

    pub fn new(dpi: Option<DpiLoader>, log: Option<Logger>) -> Self {
        Self {
            dpi,
            log,
            ..Self::new_headless()
        }
    }

    pub fn sim_time(&self) -> u64 {
        self.sim_time
    }

    pub fn finished(&self) -> bool {
        self.finish.is_some()
    }

    /// `$finish`'s exit code, if the run ended that way rather than by
    /// simply running out of scheduled work.
    pub fn finish_code(&self) -> Option<i64> {
        self.finish.as_ref().and_then(|f| f.code)
    }

    pub fn dpi(&self) -> Option<&DpiLoader> {
        self.dpi.as_ref()
    }

    // --- instance-tree construction (called from `xsim::instance`) ---

    /// Claims an [`InstanceId`] before the instance's own data (in
    /// particular its children, built by recursing into `instantiate`
    /// first) is ready. [`xsim_idx::IndexedMap`] has no sparse insert,
    /// so the slot is a throwaway placeholder until [`Self::install_instance`]
    /// overwrites it.
    pub fn reserve_instance(&mut self) -> InstanceId {
        self.instances.push(ModuleInstance::placeholder())
    }

    pub fn install_instance(&mut self, id: InstanceId, instance: ModuleInstance) {
        self.instances[id] = instance;
    }

    pub fn instance(&self, id: InstanceId) -> &ModuleInstance {
        &self.instances[id]
    }

    /// Registers one of `module.comb_processes` under `instance_id`.
    /// `GeneralPurposeComb` processes are scheduled immediately — they
    /// are, per §3, "an infinite loop that cooperatively yields" driven
    /// by the generic ready queue like any other process — while every
    /// other comb kind is left for the owning instance's settle loop
    /// (§4.5) to drive directly.
    pub fn register_comb_process(
        &mut self,
        instance_id: InstanceId,
        comb: &CombProcess,
        kind: ProcKind,
    ) -> ProcessId {
        let repeat = matches!(kind, ProcKind::GeneralPurposeComb);
        let ops = Rc::new(eval::compile_process(&Stmt::Block(comb.stmts.clone()), repeat));
        let proc = RuntimeProcess::new(instance_id, kind.clone(), ops)
            .with_sensitivity(comb.sensitive_list.clone());
        let pid = self.processes.push(proc);
        if repeat {
            self.ready.push_back(pid);
        }
        pid
    }

    /// Registers an `always_ff` body. Its compiled form always starts
    /// with the `@(posedge/negedge ...)` control the body was
    /// written under (§4.1 rejects any shape that isn't), so queuing
    /// it for an immediate first step is enough to make it suspend on
    /// — and subscribe to — its own edges; no special-cased upfront
    /// subscription is needed.
    pub fn register_ff_process(&mut self, instance_id: InstanceId, ff: &FFProcess) -> ProcessId {
        let ops = Rc::new(eval::compile_process(&Stmt::Block(ff.stmts.clone()), true));
        let kind = ProcKind::FF {
            edges: ff.edges.clone(),
        };
        let pid = self.processes.push(RuntimeProcess::new(instance_id, kind, ops));
        self.ready.push_back(pid);
        pid
    }

    pub fn register_init_process(&mut self, instance_id: InstanceId, init: &Process) -> ProcessId {
        let ops = Rc::new(eval::compile_process(&Stmt::Block(init.stmts.clone()), false));
        let pid = self
            .processes
            .push(RuntimeProcess::new(instance_id, ProcKind::Initial, ops));
        self.ready.push_back(pid);
        pid
    }

    /// Registers a `final` block. Not queued here — it only runs once
    /// during [`Self::run_finish_sequence`].
    pub fn register_final_process(&mut self, instance_id: InstanceId, fin: &Process) -> ProcessId {
        let ops = Rc::new(eval::compile_process(&Stmt::Block(fin.stmts.clone()), false));
        self.processes
            .push(RuntimeProcess::new(instance_id, ProcKind::Final, ops))
    }

    // --- variable access, shared between process stepping and $display args ---

    /// Resolves a possibly-qualified name (`"u0.a"`) down to the
    /// instance that actually owns the storage. Port wiring is
    /// synthesized purely in terms of the parent's own flat namespace
    /// (§4.3 "module base"), so a dotted prefix names a *child
    /// instance*, not a nested field — recursing one hop at a time
    /// lands on the instance whose `vars` map really holds it.
    fn resolve<'b>(&self, instance_id: InstanceId, name: &'b str) -> (InstanceId, &'b str) {
        if let Some((prefix, rest)) = name.split_once('.') {
            if let Some((_, child_id)) = self.instances[instance_id]
                .children
                .iter()
                .find(|(n, _)| n == prefix)
            {
                return self.resolve(*child_id, rest);
            }
        }
        (instance_id, name)
    }

    pub fn read_var(&self, instance_id: InstanceId, name: &str) -> Value {
        let (instance_id, leaf) = self.resolve(instance_id, name);
        self.instances[instance_id]
            .var(leaf)
            .map(|slot| slot.value().clone())
            .unwrap_or_else(|| Value::x(0, 0, false, true))
    }

    pub fn write_var(&mut self, instance_id: InstanceId, name: &str, value: Value, blocking: bool) {
        let (instance_id, leaf) = self.resolve(instance_id, name);
        let leaf = leaf.to_string();
        if blocking {
            self.apply_write(instance_id, &leaf, value);
        } else {
            self.nbas.push(NbaWrite {
                instance: instance_id,
                name: leaf,
                value,
            });
        }
    }

    fn tracked_mut(&mut self, instance_id: InstanceId, name: &str) -> Option<&mut TrackedValue> {
        let (instance_id, leaf) = self.resolve(instance_id, name);
        let leaf = leaf.to_string();
        match self.instances[instance_id].vars.get_mut(&leaf) {
            Some(VarSlot::Tracked(tv)) => Some(tv),
            _ => None,
        }
    }

    fn var_is_changed(&self, instance_id: InstanceId, name: &str) -> bool {
        let (instance_id, leaf) = self.resolve(instance_id, name);
        matches!(
            self.instances[instance_id].var(leaf),
            Some(VarSlot::Tracked(tv)) if tv.changed()
        )
    }

    /// Writes `value` into `name`'s storage and, if it changed,
    /// notifies whatever waits on it (§4.4 "Edge waits").
    fn apply_write(&mut self, instance_id: InstanceId, name: &str, value: Value) {
        let edges = match self.instances[instance_id].vars.get_mut(name) {
            Some(VarSlot::Tracked(tv)) => {
                if tv.assign(value) {
                    Some((tv.should_trigger_posedge(), tv.should_trigger_negedge()))
                } else {
                    None
                }
            }
            Some(VarSlot::Plain(v)) => {
                *v = value;
                None
            }
            None => None,
        };
        if let Some((posedge, negedge)) = edges {
            self.wake_waiters_on_var(instance_id, name, posedge, negedge);
            if let Some(VarSlot::Tracked(tv)) = self.instances[instance_id].vars.get_mut(name) {
                tv.reset_edges();
            }
        }
    }

    fn wake_waiters_on_var(
        &mut self,
        instance_id: InstanceId,
        name: &str,
        posedge: bool,
        negedge: bool,
    ) {
        let Some(tv) = self.tracked_mut(instance_id, name) else {
            return;
        };
        let ff_posedge = if posedge { tv.take_ff_posedge_subscribers() } else { Vec::new() };
        let ff_negedge = if negedge { tv.take_ff_negedge_subscribers() } else { Vec::new() };
        let waiters = tv.drain_edge_waiters();
        for pid in ff_posedge.into_iter().chain(ff_negedge) {
            self.wake_process(pid);
        }
        for pid in waiters {
            let matched = match &self.processes[pid].state {
                ProcState::Suspended(Suspend::Events(list)) => list.iter().any(|(n, edge)| {
                    n == name
                        && match edge {
                            None => true,
                            Some(EdgeKind::Pos) => posedge,
                            Some(EdgeKind::Neg) => negedge,
                            Some(EdgeKind::Both) => posedge || negedge,
                        }
                }),
                _ => false,
            };
            if matched {
                self.wake_process(pid);
            } else if let Some(tv) = self.tracked_mut(instance_id, name) {
                // Didn't satisfy this wait; the process is still
                // waiting on it (or on another variable in the same
                // OR'd event list).
                tv.subscribe_edge_waiter(pid);
            }
        }
    }

    fn wake_process(&mut self, pid: ProcessId) {
        let already_ready = self.processes[pid].is_ready();
        self.processes[pid].state = ProcState::Ready;
        if !already_ready {
            self.ready.push_back(pid);
        }
    }

    /// Subscribes a just-suspended process to every variable named in
    /// its `Suspend::Events` list. `always_ff` processes go on the
    /// dedicated posedge/negedge lists; everything else (level waits
    /// and one-off `@(edge x)` in an `initial`/general-purpose body)
    /// goes on the generic waiter list (§4.4 "Edge waits").
    fn subscribe_process_to_events(&mut self, pid: ProcessId) {
        let (instance_id, events, is_ff) = {
            let p = &self.processes[pid];
            let events = match &p.state {
                ProcState::Suspended(Suspend::Events(ev)) => ev.clone(),
                _ => return,
            };
            (p.instance, events, matches!(p.kind, ProcKind::FF { .. }))
        };
        for (name, edge) in events {
            let Some(tv) = self.tracked_mut(instance_id, &name) else {
                continue;
            };
            if is_ff {
                match edge {
                    Some(EdgeKind::Pos) => tv.subscribe_ff_posedge(pid),
                    Some(EdgeKind::Neg) => tv.subscribe_ff_negedge(pid),
                    _ => tv.subscribe_edge_waiter(pid),
                }
            } else {
                tv.subscribe_edge_waiter(pid);
            }
        }
    }

    // --- process stepping ---

    fn finish_process(&mut self, pid: ProcessId) {
        self.processes[pid].state = ProcState::Finished;
        if let ProcKind::Fork { join: Some(join_id) } = self.processes[pid].kind {
            self.notify_join(join_id, pid);
        }
    }

    fn notify_join(&mut self, join_id: JoinId, _finished: ProcessId) {
        let Some(j) = self.joins.get_mut(join_id) else {
            return;
        };
        if j.satisfied {
            return;
        }
        j.remaining = j.remaining.saturating_sub(1);
        let resume = match j.kind {
            JoinKind::All => j.remaining == 0,
            JoinKind::Any => true,
            JoinKind::None => false,
        };
        if resume {
            j.satisfied = true;
            let parent = j.parent;
            self.wake_process(parent);
        }
    }

    fn spawn_fork(
        &mut self,
        parent: ProcessId,
        instance_id: InstanceId,
        branches: Vec<Vec<crate::eval::Op>>,
        join_kind: JoinKind,
    ) {
        let join_id = if matches!(join_kind, JoinKind::None) {
            None
        } else {
            Some(self.joins.push(ScheduledJoin {
                parent,
                kind: join_kind,
                remaining: branches.len(),
                satisfied: false,
            }))
        };
        for ops in branches {
            let pid = self.processes.push(RuntimeProcess::new(
                instance_id,
                ProcKind::Fork { join: join_id },
                Rc::new(ops),
            ));
            self.ready.push_back(pid);
        }
        if join_id.is_none() {
            self.wake_process(parent);
        } else {
            self.processes[parent].state = ProcState::Suspended(Suspend::Join);
        }
    }

    /// Runs one process from wherever it last suspended until it
    /// suspends again, finishes, or calls `$finish`.
    fn step_process(&mut self, pid: ProcessId) {
        let instance_id = self.processes[pid].instance;
        let ops = self.processes[pid].ops.clone();
        let mut cursor = std::mem::take(&mut self.processes[pid].cursor);
        let hier_path = self.instances[instance_id].hier_path.clone();

        let signal = {
            let mut ctx = ExecContext {
                scheduler: &mut *self,
                instance_id,
                hier_path: hier_path.clone(),
            };
            eval::run(&ops, &mut cursor, &mut ctx)
        };
        self.processes[pid].cursor = cursor;

        match signal {
            ExecSignal::Done => self.finish_process(pid),
            ExecSignal::Delay(n) => {
                let wake_time = self.sim_time + n;
                self.processes[pid].state = ProcState::Suspended(Suspend::Delay(wake_time));
                self.delay_queue.push(Reverse((wake_time, pid)));
            }
            ExecSignal::WaitEvents(events) => {
                self.processes[pid].state = ProcState::Suspended(Suspend::Events(events));
                self.subscribe_process_to_events(pid);
            }
            ExecSignal::Fork { branches, join } => {
                self.spawn_fork(pid, instance_id, branches, join);
            }
            ExecSignal::Finish(code) => {
                self.processes[pid].state = ProcState::Finished;
                let msg = tasks::format_finish_message(code, self.sim_time, &hier_path);
                self.files.write(tasks::STDOUT_HANDLE, &format!("{msg}\n"));
                self.finish = Some(FinishInfo { code });
            }
        }
    }

    /// Runs one `Comb`-kind process straight through to `Done`, from a
    /// fresh cursor — it is synthesized without any timing control of
    /// its own (§4.1), so a genuine suspension mid-body only happens if
    /// elaboration produced something unexpected; that case is simply
    /// dropped rather than propagated, since there is nothing a
    /// combinational body could usefully wait on.
    fn run_comb_to_completion(&mut self, instance_id: InstanceId, pid: ProcessId) {
        let ops = self.processes[pid].ops.clone();
        let mut cursor = Cursor::new();
        let hier_path = self.instances[instance_id].hier_path.clone();
        loop {
            let signal = {
                let mut ctx = ExecContext {
                    scheduler: &mut *self,
                    instance_id,
                    hier_path: hier_path.clone(),
                };
                eval::run(&ops, &mut cursor, &mut ctx)
            };
            match signal {
                ExecSignal::Done => break,
                ExecSignal::Delay(_) | ExecSignal::WaitEvents(_) | ExecSignal::Fork { .. } => break,
                ExecSignal::Finish(code) => {
                    let msg = tasks::format_finish_message(code, self.sim_time, &hier_path);
                    self.files.write(tasks::STDOUT_HANDLE, &format!("{msg}\n"));
                    self.finish = Some(FinishInfo { code });
                    break;
                }
            }
        }
    }

    // --- settle loop (§4.5) ---

    /// Re-runs `instance_id`'s `Comb`-kind processes to a fixpoint,
    /// then clears every variable's `changed` flag it read from.
    fn settle_instance(&mut self, instance_id: InstanceId) {
        loop {
            let pids = self.instances[instance_id].comb_processes.clone();
            let mut ran_any = false;
            for pid in pids {
                let dirty = self.processes[pid]
                    .sensitive_list
                    .clone()
                    .iter()
                    .any(|name| self.var_is_changed(instance_id, name));
                if dirty {
                    ran_any = true;
                    self.run_comb_to_completion(instance_id, pid);
                }
                if self.finish.is_some() {
                    return;
                }
            }
            if !ran_any {
                break;
            }
        }
        for slot in self.instances[instance_id].vars.values_mut() {
            if let VarSlot::Tracked(tv) = slot {
                tv.cancel_changed();
            }
        }
    }

    fn settle_all_instances(&mut self) {
        let ids: Vec<InstanceId> = self.instances.keys().collect();
        for id in ids {
            self.settle_instance(id);
            if self.finish.is_some() {
                return;
            }
        }
    }

    fn flush_nba(&mut self) {
        let pending = std::mem::take(&mut self.nbas);
        for NbaWrite { instance, name, value } in pending {
            self.apply_write(instance, &name, value);
        }
    }

    fn advance_time(&mut self) -> bool {
        let Some(Reverse((t, _))) = self.delay_queue.peek().copied() else {
            return false;
        };
        self.sim_time = t;
        while let Some(Reverse((t2, pid))) = self.delay_queue.peek().copied() {
            if t2 != t {
                break;
            }
            self.delay_queue.pop();
            self.wake_process(pid);
        }
        true
    }

    /// One time step: run every ready process, settle combinational
    /// logic, apply non-blocking writes, and repeat until nothing is
    /// left to do at this `sim_time` (§4.4's active/NBA region loop).
    fn run_active_region(&mut self) {
        loop {
            while let Some(pid) = self.ready.pop_front() {
                self.step_process(pid);
                if self.finish.is_some() {
                    return;
                }
            }
            self.settle_all_instances();
            if self.finish.is_some() {
                return;
            }
            if !self.ready.is_empty() {
                continue;
            }
            if self.nbas.is_empty() {
                break;
            }
            self.flush_nba();
        }
    }

    /// Drives the whole simulation from `sim_time == 0` until no
    /// process has more work and no event is pending, or `$finish` is
    /// called, then runs every `final` block once.
    pub fn run_to_completion(&mut self) {
        self.settle_all_instances();
        loop {
            self.run_active_region();
            if self.finish.is_some() {
                break;
            }
            if !self.advance_time() {
                break;
            }
        }
        self.run_finish_sequence();
        if let Some(log) = &self.log {
            debug!(log, "simulation run complete"; "sim_time" => self.sim_time, "finished_early" => self.finish.is_some());
        }
    }

    fn run_finish_sequence(&mut self) {
        let final_pids: Vec<ProcessId> = self
            .processes
            .iter()
            .filter(|(_, p)| matches!(p.kind, ProcKind::Final))
            .map(|(pid, _)| pid)
            .collect();
        for pid in final_pids {
            self.processes[pid].cursor = Cursor::new();
            self.step_process(pid);
        }
    }

    // --- system tasks (§4.6) ---

    fn eval_in(&self, instance_id: InstanceId, expr: &Expr) -> Value {
        let ctx = ReadCtx {
            scheduler: self,
            instance_id,
            hier_path: self.instances[instance_id].hier_path.clone(),
        };
        eval::eval_expr(&ctx, expr)
    }

    fn format_args(&self, instance_id: InstanceId, args: &[Expr]) -> String {
        match args.split_first() {
            Some((Expr::Str(fmt), rest)) => {
                let vals: Vec<Value> = rest.iter().map(|e| self.eval_in(instance_id, e)).collect();
                let hier_path = self.instances[instance_id].hier_path.clone();
                tasks::format_display(fmt, &vals, &hier_path)
            }
            _ => args
                .iter()
                .map(|e| format!("{}", self.eval_in(instance_id, e).to_u64().unwrap_or(0)))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn run_sys_task(&mut self, instance_id: InstanceId, hier_path: &HierPath, task: SysTask, args: &[Expr]) {
        match task {
            SysTask::Display | SysTask::Strobe | SysTask::Monitor => {
                let text = self.format_args(instance_id, args);
                self.files.write(tasks::STDOUT_HANDLE, &format!("{text}\n"));
            }
            SysTask::Write => {
                let text = self.format_args(instance_id, args);
                self.files.write(tasks::STDOUT_HANDLE, &text);
            }
            SysTask::Fopen => {
                if let [Expr::Ref(dest), path, mode] = args {
                    let path = str_arg(path).unwrap_or_default();
                    let mode = str_arg(mode).unwrap_or("w");
                    let handle = self.files.fopen(path, mode);
                    let value = Value::from_u64(handle as u64, 31, 0, false, false);
                    self.write_var(instance_id, dest, value, true);
                }
            }
            SysTask::Fclose => {
                if let Some(handle_expr) = args.first() {
                    let handle = self.eval_in(instance_id, handle_expr).to_u64().unwrap_or(0) as u32;
                    self.files.fclose(handle);
                }
            }
            SysTask::Fwrite | SysTask::Fdisplay => {
                if let Some((handle_expr, rest)) = args.split_first() {
                    let handle = self.eval_in(instance_id, handle_expr).to_u64().unwrap_or(0) as u32;
                    let mut text = self.format_args(instance_id, rest);
                    if matches!(task, SysTask::Fdisplay) {
                        text.push('\n');
                    }
                    self.files.write(handle, &text);
                }
            }
            SysTask::Assert => {
                let msg = args.first().and_then(str_arg).unwrap_or("");
                let text = tasks::format_assert_failure(hier_path, self.sim_time, msg);
                self.files.write(tasks::STDERR_HANDLE, &format!("{text}\n"));
            }
            SysTask::Finish => {
                // `eval::run` intercepts `$finish` before it ever
                // reaches `EvalEnv::sys_task`.
            }
        }
    }
}

fn str_arg(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Str(s) => Some(s.as_str()),
        _ => None,
    }
}

/// The [`EvalEnv`] a running process sees: its own instance's variable
/// scope, the scheduler's clock, and the scheduler's task/file surface.
struct ExecContext<'a> {
    scheduler: &'a mut Scheduler,
    instance_id: InstanceId,
    hier_path: HierPath,
}

impl EvalEnv for ExecContext<'_> {
    fn read(&self, name: &str) -> Value {
        self.scheduler.read_var(self.instance_id, name)
    }

    fn write(&mut self, name: &str, value: Value, blocking: bool) {
        self.scheduler.write_var(self.instance_id, name, value, blocking);
    }

    fn sim_time(&self) -> u64 {
        self.scheduler.sim_time
    }

    fn hier_path(&self) -> &HierPath {
        &self.hier_path
    }

    fn sys_task(&mut self, task: SysTask, args: &[Expr]) {
        self.scheduler
            .run_sys_task(self.instance_id, &self.hier_path, task, args);
    }
}

/// A read-only [`EvalEnv`] for evaluating a system task's own
/// arguments — `$display("%d", x)`'s `x` is a plain expression, never
/// itself an assignment or a nested system-task call.
struct ReadCtx<'a> {
    scheduler: &'a Scheduler,
    instance_id: InstanceId,
    hier_path: HierPath,
}

impl EvalEnv for ReadCtx<'_> {
    fn read(&self, name: &str) -> Value {
        self.scheduler.read_var(self.instance_id, name)
    }

    fn write(&mut self, _name: &str, _value: Value, _blocking: bool) {
        unreachable!("a system task's own arguments never assign")
    }

    fn sim_time(&self) -> u64 {
        self.scheduler.sim_time
    }

    fn hier_path(&self) -> &HierPath {
        &self.hier_path
    }

    fn sys_task(&mut self, _task: SysTask, _args: &[Expr]) {
        unreachable!("a system task's own arguments never call another system task")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::instantiate;
    use xsim_ir::elab::{EventExpr, Stmt as S, TimingControl, VariableDecl};
    use xsim_ir::{CombKind, Module, PortBinding, PortDirection};

    fn comb_module() -> Rc<Module> {
        let mut m = Module::new("comb_leaf");
        m.comb_processes.push(CombProcess {
            kind: CombKind::AlwaysComb,
            stmts: vec![S::Assign {
                lhs: Expr::Ref("y".into()),
                rhs: Expr::Ref("a".into()),
                blocking: true,
            }],
            sensitive_list: vec!["a".into()],
            edge_event_controls: vec![],
        });
        m.inputs.push(PortBinding {
            name: "a".into(),
            direction: PortDirection::In,
            connection: Expr::Ref("a".into()),
        });
        m.outputs.push(PortBinding {
            name: "y".into(),
            direction: PortDirection::Out,
            connection: Expr::Ref("y".into()),
        });
        m.variables.push(VariableDecl {
            name: "a".into(),
            left: 0,
            right: 0,
            signed: false,
            four_state: true,
            continuous_init: None,
        });
        m.variables.push(VariableDecl {
            name: "y".into(),
            left: 0,
            right: 0,
            signed: false,
            four_state: true,
            continuous_init: None,
        });
        Rc::new(m)
    }

    fn ff_module() -> Rc<Module> {
        let mut m = Module::new("ff_leaf");
        let body = S::Timing {
            control: TimingControl::EventList(vec![EventExpr::Edge(EdgeKind::Pos, Expr::Ref("clk".into()))]),
            body: Box::new(S::Assign {
                lhs: Expr::Ref("q".into()),
                rhs: Expr::Ref("d".into()),
                blocking: false,
            }),
        };
        m.ff_processes.push(FFProcess {
            stmts: vec![body],
            edges: vec![(xsim_ir::EdgeKind::Pos, "clk".into())],
            edge_event_controls: vec![("clk".into(), xsim_ir::EdgeKind::Pos)],
        });
        for name in ["clk", "d", "q"] {
            m.variables.push(VariableDecl {
                name: name.into(),
                left: 0,
                right: 0,
                signed: false,
                four_state: true,
                continuous_init: None,
            });
        }
        m.outputs.push(PortBinding {
            name: "q".into(),
            direction: PortDirection::Out,
            connection: Expr::Ref("q".into()),
        });
        Rc::new(m)
    }

    #[test]
    fn combinational_output_tracks_input_after_settle() {
        let mut scheduler = Scheduler::new_headless();
        let module = comb_module();
        let id = instantiate(&mut scheduler, &module, HierPath::root("top"));
        scheduler.write_var(id, "a", Value::from_u64(1, 0, 0, false, true), true);
        scheduler.run_to_completion();
        assert_eq!(scheduler.read_var(id, "y").to_u64(), Some(1));
    }

    #[test]
    fn ff_updates_only_on_posedge() {
        let mut scheduler = Scheduler::new_headless();
        let module = ff_module();
        let id = instantiate(&mut scheduler, &module, HierPath::root("top"));
        scheduler.write_var(id, "d", Value::from_u64(1, 0, 0, false, true), true);
        scheduler.run_to_completion();
        // `clk` never toggled, so `q` must still be unknown (`x`).
        assert!(scheduler.read_var(id, "q").to_u64().is_none() || scheduler.read_var(id, "q").has_unknown());

        scheduler.write_var(id, "clk", Value::from_u64(0, 0, 0, false, true), true);
        scheduler.run_to_completion();
        scheduler.write_var(id, "clk", Value::from_u64(1, 0, 0, false, true), true);
        scheduler.run_to_completion();
        assert_eq!(scheduler.read_var(id, "q").to_u64(), Some(1));
    }

    #[test]
    fn finish_call_halts_further_active_region_work() {
        let mut scheduler = Scheduler::new_headless();
        let module = comb_module();
        let init_ops = Rc::new(eval::compile_process(
            &S::SysTaskCall {
                task: SysTask::Finish,
                args: vec![],
            },
            false,
        ));
        let instance_id = instantiate(&mut scheduler, &module, HierPath::root("top"));
        let pid = scheduler
            .processes
            .push(RuntimeProcess::new(instance_id, ProcKind::Initial, init_ops));
        scheduler.ready.push_back(pid);
        scheduler.run_to_completion();
        assert!(scheduler.finished());
        assert_eq!(scheduler.finish_code(), None);
    }
}
