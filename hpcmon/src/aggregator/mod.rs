//! Event Aggregator: owns the per-PID counter table and folds every
//! [`RawEvent`](crate::probe::RawEvent) into it.
//!
//! Single-consumer by construction: `Aggregator` exposes no interior
//! mutability, so the only way to mutate it is through `&mut self` on
//! `fold`, which the caller (the probe poll loop) must not invoke
//! concurrently with a snapshot read (§4.2, §5).

mod pid_state;
mod syscall_classes;

pub use pid_state::PidState;
pub use syscall_classes::{classify_syscall, SyscallClass, IO_SYSCALLS, NET_SYSCALLS};

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::domain::Pid;
use crate::probe::RawEvent;

/// Folds raw kernel events into per-PID rolling counters.
#[derive(Debug)]
pub struct Aggregator {
    pid_states: HashMap<Pid, PidState>,
    /// Unmatched-exit and unparsable-payload drops not attributable to a
    /// single already-tracked PID (§7 recoverable category).
    untracked_drops: u64,
    /// `(wall_clock_instant, kernel_ts_ns)` pair captured from the first
    /// event ever folded, letting `current_ns` project the current wall
    /// clock into the same boot-relative domain as `bpf_ktime_get_ns`
    /// timestamps (§4.2a) without the two clocks ever being compared
    /// directly.
    clock_origin: Option<(Instant, u64)>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator { pid_states: HashMap::new(), untracked_drops: 0, clock_origin: None }
    }
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded event into the PID table.
    pub fn fold(&mut self, event: RawEvent) {
        self.observe_clock(event_ts(&event));
        match event {
            RawEvent::SyscallEnter { pid, tid, ts, syscall_id, .. } => {
                self.pid_state_mut(pid, ts).record_syscall_enter(tid, syscall_id, ts);
            }
            RawEvent::SyscallExit { pid, tid, ts, syscall_id, .. } => {
                self.pid_state_mut(pid, ts).record_syscall_exit(tid, syscall_id, ts);
            }
            RawEvent::SchedSwitch { prev_pid, next_pid, ts, .. } => {
                self.pid_state_mut(prev_pid, ts).record_scheduled_out(ts);
                self.pid_state_mut(next_pid, ts).record_scheduled_in(ts);
            }
            RawEvent::VfsRead { pid, byte_count, ts } => {
                self.pid_state_mut(pid, ts).record_vfs(byte_count, true);
            }
            RawEvent::VfsWrite { pid, byte_count, ts } => {
                self.pid_state_mut(pid, ts).record_vfs(byte_count, false);
            }
            RawEvent::SockSend { pid, byte_count, protocol, ts } => {
                self.pid_state_mut(pid, ts).record_net(byte_count, true, protocol);
            }
            RawEvent::SockRecv { pid, byte_count, protocol, ts } => {
                self.pid_state_mut(pid, ts).record_net(byte_count, false, protocol);
            }
        }
    }

    fn pid_state_mut(&mut self, pid: Pid, ts: u64) -> &mut PidState {
        self.pid_states.entry(pid).or_insert_with(|| PidState::new(pid, ts))
    }

    fn observe_clock(&mut self, ts: u64) {
        if self.clock_origin.is_none() {
            self.clock_origin = Some((Instant::now(), ts));
        }
    }

    /// The current time in the same boot-relative nanosecond domain as
    /// kernel event timestamps (`bpf_ktime_get_ns`), derived from the
    /// wall-clock elapsed time since the first event observed. Returns 0
    /// if no event has been folded yet (nothing to evict in that case).
    #[must_use]
    pub fn current_ns(&self) -> u64 {
        match self.clock_origin {
            Some((wall_origin, kernel_origin)) => {
                kernel_origin + wall_origin.elapsed().as_nanos() as u64
            }
            None => 0,
        }
    }

    /// A read-only snapshot of the tracked PID table. The Metric Folder
    /// reads through this; callers must not interleave it with `fold`
    /// (§4.2, §5) — the reference main loop quiesces polling during a tick.
    #[must_use]
    pub fn snapshot(&self) -> &HashMap<Pid, PidState> {
        &self.pid_states
    }

    /// Count of drops not attributable to a tracked PID's own counter
    /// (e.g. a `SyscallExit` for a PID the Aggregator has never seen).
    #[must_use]
    pub fn untracked_drops(&self) -> u64 {
        self.untracked_drops
    }

    /// Evict any tracked PID absent from `keep` whose last event is older
    /// than `ttl`, bounding memory over long sessions (§4.2a, §5). `now`
    /// must be in the same boot-relative domain as `PidState.last_seen_ts`
    /// (see `current_ns`) — epoch wall-clock time is a different clock
    /// entirely and would evict everything on the very next tick.
    pub fn evict_stale(&mut self, keep: &HashSet<Pid>, now: u64, ttl_ns: u64) {
        self.pid_states
            .retain(|pid, state| keep.contains(pid) || now.saturating_sub(state.last_seen_ts) < ttl_ns);
    }
}

fn event_ts(event: &RawEvent) -> u64 {
    match *event {
        RawEvent::SyscallEnter { ts, .. }
        | RawEvent::SyscallExit { ts, .. }
        | RawEvent::SchedSwitch { ts, .. }
        | RawEvent::VfsRead { ts, .. }
        | RawEvent::VfsWrite { ts, .. }
        | RawEvent::SockSend { ts, .. }
        | RawEvent::SockRecv { ts, .. } => ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sched_switch_opens_and_closes_cpu_intervals() {
        let mut agg = Aggregator::new();
        agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(1), next_pid: Pid(2), prev_state: 0, ts: 0 });
        agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(2), next_pid: Pid(1), prev_state: 0, ts: 1_000 });

        let state = agg.snapshot().get(&Pid(2)).unwrap();
        assert_eq!(state.cpu_on_ns, 1_000);
        assert_eq!(state.context_switches, 2);
    }

    #[test]
    fn invariant_cpu_on_never_exceeds_elapsed_wall_clock() {
        let mut agg = Aggregator::new();
        agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(9), next_pid: Pid(1), prev_state: 0, ts: 0 });
        agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(1), next_pid: Pid(9), prev_state: 0, ts: 500 });
        agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(9), next_pid: Pid(1), prev_state: 0, ts: 1_000 });
        agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(1), next_pid: Pid(9), prev_state: 0, ts: 2_000 });

        let state = agg.snapshot().get(&Pid(1)).unwrap();
        let elapsed = 2_000 - state.first_seen_ts;
        assert!(state.cpu_on_ns <= elapsed);
    }

    #[test]
    fn syscall_enter_exit_folds_into_duration() {
        let mut agg = Aggregator::new();
        agg.fold(RawEvent::SyscallEnter {
            pid: Pid(1),
            tid: crate::domain::Tid(1),
            uid: crate::domain::Uid(0),
            syscall_id: 0,
            ts: 100,
        });
        agg.fold(RawEvent::SyscallExit {
            pid: Pid(1),
            tid: crate::domain::Tid(1),
            uid: crate::domain::Uid(0),
            syscall_id: 0,
            ts: 300,
        });

        let state = agg.snapshot().get(&Pid(1)).unwrap();
        assert_eq!(state.total_syscalls, 1);
        assert_eq!(state.io_syscalls, 1);
        assert_eq!(state.syscall_duration_sum_ns, 200);
    }

    #[test]
    fn unmatched_exit_is_dropped() {
        let mut agg = Aggregator::new();
        agg.fold(RawEvent::SyscallExit {
            pid: Pid(1),
            tid: crate::domain::Tid(1),
            uid: crate::domain::Uid(0),
            syscall_id: 0,
            ts: 300,
        });

        let state = agg.snapshot().get(&Pid(1)).unwrap();
        assert_eq!(state.total_syscalls, 0);
        assert_eq!(state.drops, 1);
    }

    #[test]
    fn replaced_pending_entry_counts_as_drop() {
        let mut agg = Aggregator::new();
        let enter = |ts| RawEvent::SyscallEnter {
            pid: Pid(1),
            tid: crate::domain::Tid(1),
            uid: crate::domain::Uid(0),
            syscall_id: 0,
            ts,
        };
        agg.fold(enter(100));
        agg.fold(enter(150));

        let state = agg.snapshot().get(&Pid(1)).unwrap();
        assert_eq!(state.drops, 1);
    }

    #[test]
    fn eviction_respects_keep_set_and_ttl() {
        let mut agg = Aggregator::new();
        agg.fold(RawEvent::VfsRead { pid: Pid(1), byte_count: 10, ts: 0 });
        agg.fold(RawEvent::VfsRead { pid: Pid(2), byte_count: 10, ts: 0 });

        let keep: HashSet<Pid> = [Pid(1)].into_iter().collect();
        agg.evict_stale(&keep, 100, 50);

        assert!(agg.snapshot().contains_key(&Pid(1)));
        assert!(!agg.snapshot().contains_key(&Pid(2)));
    }
}
