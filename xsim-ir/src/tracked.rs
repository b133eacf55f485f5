//! [`TrackedValue`]: a [`Value`] augmented with change tracking, edge
//! detection, and per-process subscription lists (§3, "TrackedValue").
//!
//! This type is deliberately agnostic to *how* a subscriber is woken —
//! it only records [`ProcessId`]s. The scheduler (`xsim::scheduler`)
//! owns the actual gates and decides what "signal this process" means;
//! that split keeps the data-model crate free of any threading
//! concerns, matching the lifecycle note in §3 ("runtime Module
//! instances own their tracked values").

use xsim_idx::IndexRef;
use xsim_idx::impl_index;

use crate::value::{Bit, Value};

/// Identifies a process for the purposes of subscription bookkeeping.
/// The scheduler hands these out and is the only thing that resolves
/// them back to a runnable process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u32);
impl_index!(ProcessId);

fn bit_matches(value: &Value, target_one: bool) -> bool {
    match value.get_bit(0) {
        Bit::Zero => !target_one,
        Bit::One => target_one,
        Bit::X | Bit::Z => false,
    }
}

/// Table 9-2 posedge predicate, preserved verbatim from the spec: `old`
/// matches 0 and `new` doesn't, or `old` doesn't match 1 and `new`
/// matches 1.
fn is_posedge(old: &Value, new: &Value) -> bool {
    (bit_matches(old, false) && !bit_matches(new, false))
        || (!bit_matches(old, true) && bit_matches(new, true))
}

/// Symmetric negedge predicate.
fn is_negedge(old: &Value, new: &Value) -> bool {
    (bit_matches(old, true) && !bit_matches(new, true))
        || (!bit_matches(old, false) && bit_matches(new, false))
}

#[derive(Debug, Default)]
struct SubscriberLists {
    comb_processes: Vec<ProcessId>,
    ff_posedge: Vec<ProcessId>,
    ff_negedge: Vec<ProcessId>,
    edge_waiters: Vec<ProcessId>,
}

impl SubscriberLists {
    /// Invariant (§3): a process appears at most once per list per
    /// triggering epoch.
    fn subscribe(list: &mut Vec<ProcessId>, id: ProcessId) {
        if !list.contains(&id) {
            list.push(id);
        }
    }
}

/// A tracked, sized bit/logic value: the runtime's per-variable storage.
#[derive(Debug)]
pub struct TrackedValue {
    value: Value,
    track_edge: bool,
    changed: bool,
    should_trigger_posedge: bool,
    should_trigger_negedge: bool,
    subs: SubscriberLists,
}

impl TrackedValue {
    pub fn new(value: Value, track_edge: bool) -> Self {
        Self {
            value,
            track_edge,
            changed: false,
            should_trigger_posedge: false,
            should_trigger_negedge: false,
            subs: SubscriberLists::default(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn should_trigger_posedge(&self) -> bool {
        self.should_trigger_posedge
    }

    pub fn should_trigger_negedge(&self) -> bool {
        self.should_trigger_negedge
    }

    /// Called once the active region has consumed the "changed" status
    /// of this variable's sensitivity-list readers (§4.5).
    pub fn cancel_changed(&mut self) {
        self.changed = false;
    }

    /// Called once per tick, after `handle_edge_triggering` has woken
    /// every subscriber that needed waking (§4.4's `TrackedVar::reset`).
    pub fn reset_edges(&mut self) {
        self.should_trigger_posedge = false;
        self.should_trigger_negedge = false;
    }

    /// Assigns a new value. Returns `true` if it differs from the old
    /// value under `match` — the condition under which subscribers are
    /// notified (§3). Edge flags are only ever computed for 1-bit
    /// values, per spec.
    pub fn assign(&mut self, new: Value) -> bool {
        if self.value.matches(&new) {
            return false;
        }
        if self.track_edge && new.width() == 1 {
            self.should_trigger_posedge = is_posedge(&self.value, &new);
            self.should_trigger_negedge = is_negedge(&self.value, &new);
        }
        self.value = new;
        self.changed = true;
        true
    }

    pub fn subscribe_comb(&mut self, id: ProcessId) {
        SubscriberLists::subscribe(&mut self.subs.comb_processes, id);
    }

    pub fn subscribe_ff_posedge(&mut self, id: ProcessId) {
        SubscriberLists::subscribe(&mut self.subs.ff_posedge, id);
    }

    pub fn subscribe_ff_negedge(&mut self, id: ProcessId) {
        SubscriberLists::subscribe(&mut self.subs.ff_negedge, id);
    }

    pub fn subscribe_edge_waiter(&mut self, id: ProcessId) {
        SubscriberLists::subscribe(&mut self.subs.edge_waiters, id);
    }

    pub fn comb_subscribers(&self) -> &[ProcessId] {
        &self.subs.comb_processes
    }

    pub fn ff_posedge_subscribers(&self) -> &[ProcessId] {
        &self.subs.ff_posedge
    }

    pub fn ff_negedge_subscribers(&self) -> &[ProcessId] {
        &self.subs.ff_negedge
    }

    /// Drains (and clears) the generic `@(var)`/`@(edge var)` waiter
    /// list; the scheduler calls this once it has signalled everyone in
    /// it (§4.4 "Edge waits").
    pub fn drain_edge_waiters(&mut self) -> Vec<ProcessId> {
        std::mem::take(&mut self.subs.edge_waiters)
    }

    /// Drains the dedicated `always_ff @(posedge ...)` subscriber list.
    /// FF processes resubscribe every time their event-control is
    /// re-entered, so emptying the list here is safe (§4.4 "Edge
    /// waits": "signals every subscribed gate and empties the list").
    pub fn take_ff_posedge_subscribers(&mut self) -> Vec<ProcessId> {
        std::mem::take(&mut self.subs.ff_posedge)
    }

    /// Symmetric with [`Self::take_ff_posedge_subscribers`].
    pub fn take_ff_negedge_subscribers(&mut self) -> Vec<ProcessId> {
        std::mem::take(&mut self.subs.ff_negedge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(v: u64) -> Value {
        Value::from_u64(v, 0, 0, false, true)
    }

    #[test]
    fn identical_assignment_does_not_fire_edges() {
        let mut tv = TrackedValue::new(bit(0), true);
        assert!(!tv.assign(bit(0)));
        assert!(!tv.should_trigger_posedge());
        assert!(!tv.changed());
    }

    #[test]
    fn zero_to_one_is_a_posedge_only() {
        let mut tv = TrackedValue::new(bit(0), true);
        assert!(tv.assign(bit(1)));
        assert!(tv.should_trigger_posedge());
        assert!(!tv.should_trigger_negedge());
    }

    #[test]
    fn one_to_zero_is_a_negedge_only() {
        let mut tv = TrackedValue::new(bit(1), true);
        assert!(tv.assign(bit(0)));
        assert!(!tv.should_trigger_posedge());
        assert!(tv.should_trigger_negedge());
    }

    #[test]
    fn transition_through_x_still_edges_both_ways() {
        let mut tv = TrackedValue::new(bit(0), true);
        let x = Value::x(0, 0, false, true);
        assert!(tv.assign(x.clone()));
        assert!(tv.should_trigger_posedge());
        tv.reset_edges();
        assert!(tv.assign(bit(1)));
        assert!(tv.should_trigger_posedge());
    }

    #[test]
    fn subscriber_lists_are_deduplicated() {
        let mut tv = TrackedValue::new(bit(0), true);
        let pid = ProcessId::from(3u32);
        tv.subscribe_comb(pid);
        tv.subscribe_comb(pid);
        assert_eq!(tv.comb_subscribers().len(), 1);
    }
}
