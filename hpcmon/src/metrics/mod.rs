//! Metric Folder: pure projection from `{PID -> PidState}` plus a PID set
//! into one `JobMetrics` record (§4.4). Side-effect-free and idempotent —
//! every function here takes its inputs by reference and returns a value.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::aggregator::PidState;
use crate::domain::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub total_syscalls: u64,
    pub io_syscalls: u64,
    pub net_syscalls: u64,
    pub context_switches: u64,
    pub io_operations: u64,
    pub net_operations: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub send_bytes: u64,
    pub recv_bytes: u64,
    pub total_io_bytes: u64,
    pub total_net_bytes: u64,
    pub monitored_pids: u64,

    pub cpu_time_ns: u64,
    pub wait_time_ns: u64,

    pub cpu_percent: f64,
    pub wait_percent: f64,
    pub io_percent: f64,
    pub net_percent: f64,

    pub avg_syscall_duration_ns: f64,
}

impl Default for JobMetrics {
    fn default() -> Self {
        JobMetrics {
            total_syscalls: 0,
            io_syscalls: 0,
            net_syscalls: 0,
            context_switches: 0,
            io_operations: 0,
            net_operations: 0,
            read_bytes: 0,
            write_bytes: 0,
            send_bytes: 0,
            recv_bytes: 0,
            total_io_bytes: 0,
            total_net_bytes: 0,
            monitored_pids: 0,
            cpu_time_ns: 0,
            wait_time_ns: 0,
            cpu_percent: 0.0,
            wait_percent: 0.0,
            io_percent: 0.0,
            net_percent: 0.0,
            avg_syscall_duration_ns: 0.0,
        }
    }
}

impl JobMetrics {
    /// Project `PidState` entries for every PID in `pids` into one
    /// `JobMetrics`. PIDs absent from `states` (not yet observed by the
    /// Aggregator) are simply not counted, not an error.
    #[must_use]
    pub fn fold(states: &HashMap<Pid, PidState>, pids: &HashSet<Pid>) -> JobMetrics {
        let mut m = JobMetrics { monitored_pids: pids.len() as u64, ..JobMetrics::default() };

        for pid in pids {
            let Some(state) = states.get(pid) else {
                continue;
            };
            m.total_syscalls += state.total_syscalls;
            m.io_syscalls += state.io_syscalls;
            m.net_syscalls += state.net_syscalls;
            m.context_switches += state.context_switches;
            m.io_operations += state.io_operations;
            m.net_operations += state.net_operations;
            m.read_bytes += state.read_bytes;
            m.write_bytes += state.write_bytes;
            m.send_bytes += state.send_bytes;
            m.recv_bytes += state.recv_bytes;
            m.cpu_time_ns += state.cpu_on_ns;
            m.wait_time_ns += state.cpu_off_ns;
            m.avg_syscall_duration_ns += state.syscall_duration_sum_ns as f64;
        }

        let total_duration_count: u64 =
            pids.iter().filter_map(|pid| states.get(pid)).map(|s| s.syscall_duration_count).sum();
        m.avg_syscall_duration_ns = if total_duration_count > 0 {
            m.avg_syscall_duration_ns / total_duration_count as f64
        } else {
            0.0
        };

        m.recompute_derived();
        m
    }

    fn recompute_derived(&mut self) {
        self.total_io_bytes = self.read_bytes + self.write_bytes;
        self.total_net_bytes = self.send_bytes + self.recv_bytes;

        let total_time = self.cpu_time_ns + self.wait_time_ns;
        self.cpu_percent =
            if total_time > 0 { 100.0 * self.cpu_time_ns as f64 / total_time as f64 } else { 0.0 };
        self.wait_percent =
            if total_time > 0 { 100.0 * self.wait_time_ns as f64 / total_time as f64 } else { 0.0 };

        self.io_percent = if self.total_syscalls > 0 {
            100.0 * self.io_syscalls as f64 / self.total_syscalls as f64
        } else {
            0.0
        };
        self.net_percent = if self.total_syscalls > 0 {
            100.0 * self.net_syscalls as f64 / self.total_syscalls as f64
        } else {
            0.0
        };
    }

    /// Sum two windowed measurements and recompute every derived field from
    /// the summed inputs (§4.4). Associative: `update(update(a,b),c) ==
    /// update(a, update(b,c))` because every field here is a sum of sums.
    #[must_use]
    pub fn update(old: &JobMetrics, new: &JobMetrics) -> JobMetrics {
        let old_count_weight = old.avg_syscall_duration_ns * old.total_syscalls as f64;
        let new_count_weight = new.avg_syscall_duration_ns * new.total_syscalls as f64;

        let mut merged = JobMetrics {
            total_syscalls: old.total_syscalls + new.total_syscalls,
            io_syscalls: old.io_syscalls + new.io_syscalls,
            net_syscalls: old.net_syscalls + new.net_syscalls,
            context_switches: old.context_switches + new.context_switches,
            io_operations: old.io_operations + new.io_operations,
            net_operations: old.net_operations + new.net_operations,
            read_bytes: old.read_bytes + new.read_bytes,
            write_bytes: old.write_bytes + new.write_bytes,
            send_bytes: old.send_bytes + new.send_bytes,
            recv_bytes: old.recv_bytes + new.recv_bytes,
            monitored_pids: old.monitored_pids + new.monitored_pids,
            cpu_time_ns: old.cpu_time_ns + new.cpu_time_ns,
            wait_time_ns: old.wait_time_ns + new.wait_time_ns,
            ..JobMetrics::default()
        };

        merged.avg_syscall_duration_ns = if merged.total_syscalls > 0 {
            (old_count_weight + new_count_weight) / merged.total_syscalls as f64
        } else {
            0.0
        };

        merged.recompute_derived();
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::domain::Tid;
    use crate::probe::RawEvent;

    #[test]
    fn empty_pid_set_yields_all_zero_metrics() {
        let states = HashMap::new();
        let metrics = JobMetrics::fold(&states, &HashSet::new());
        assert_eq!(metrics.total_syscalls, 0);
        assert_eq!(metrics.cpu_percent, 0.0);
    }

    #[test]
    fn total_io_bytes_equals_read_plus_write() {
        let mut agg = Aggregator::new();
        agg.fold(RawEvent::VfsRead { pid: Pid(1), byte_count: 100, ts: 0 });
        agg.fold(RawEvent::VfsWrite { pid: Pid(1), byte_count: 50, ts: 0 });

        let pids: HashSet<Pid> = [Pid(1)].into_iter().collect();
        let metrics = JobMetrics::fold(agg.snapshot(), &pids);
        assert_eq!(metrics.total_io_bytes, 150);
    }

    #[test]
    fn update_is_associative_over_summed_counters() {
        let a = JobMetrics { total_syscalls: 10, io_syscalls: 2, ..JobMetrics::default() };
        let b = JobMetrics { total_syscalls: 5, io_syscalls: 1, ..JobMetrics::default() };
        let c = JobMetrics { total_syscalls: 3, io_syscalls: 1, ..JobMetrics::default() };

        let left = JobMetrics::update(&JobMetrics::update(&a, &b), &c);
        let right = JobMetrics::update(&a, &JobMetrics::update(&b, &c));

        assert_eq!(left.total_syscalls, right.total_syscalls);
        assert_eq!(left.io_syscalls, right.io_syscalls);
        assert!((left.io_percent - right.io_percent).abs() < 1e-9);
    }

    #[test]
    fn avg_syscall_duration_folds_from_pid_state() {
        let mut agg = Aggregator::new();
        agg.fold(RawEvent::SyscallEnter {
            pid: Pid(1),
            tid: Tid(1),
            uid: crate::domain::Uid(0),
            syscall_id: 0,
            ts: 0,
        });
        agg.fold(RawEvent::SyscallExit {
            pid: Pid(1),
            tid: Tid(1),
            uid: crate::domain::Uid(0),
            syscall_id: 0,
            ts: 200,
        });

        let pids: HashSet<Pid> = [Pid(1)].into_iter().collect();
        let metrics = JobMetrics::fold(agg.snapshot(), &pids);
        assert_eq!(metrics.avg_syscall_duration_ns, 200.0);
    }
}
