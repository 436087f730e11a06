//! Per-PID rolling counters folded from raw kernel events (§3, §4.2).

use std::collections::HashMap;

use crate::domain::{Pid, Tid};

use super::syscall_classes::{classify_syscall, SyscallClass};

/// Rolling per-PID counters. Every field is monotonically non-decreasing
/// except `open_since`, which tracks whether the PID is currently on-CPU.
#[derive(Debug, Clone)]
pub struct PidState {
    pub pid: Pid,

    /// Per-syscall-id invocation count (completed enter/exit pairs only).
    pub syscall_counts: HashMap<u64, u64>,
    /// Pending entry timestamps keyed by (tid, syscall_id), awaiting a
    /// matching exit.
    pending_entries: HashMap<(Tid, u64), u64>,

    pub total_syscalls: u64,
    pub io_syscalls: u64,
    pub net_syscalls: u64,
    pub syscall_duration_sum_ns: u64,
    pub syscall_duration_count: u64,

    pub read_bytes: u64,
    pub write_bytes: u64,
    pub io_operations: u64,
    pub send_bytes: u64,
    pub recv_bytes: u64,
    pub net_operations: u64,
    /// Bytes observed per IP protocol number (e.g. 6 = TCP, 17 = UDP),
    /// summed across send and recv. Populated from the kernel-reported
    /// `protocol` field on `SockSend`/`SockRecv` (§4.1); `0` means the
    /// kernel side could not determine a protocol for that socket.
    pub net_bytes_by_protocol: HashMap<u32, u64>,

    /// Nanoseconds this PID has spent on-CPU / off-CPU, folded
    /// incrementally from closed scheduler intervals (§4.2).
    pub cpu_on_ns: u64,
    pub cpu_off_ns: u64,
    pub context_switches: u64,
    open_since: Option<u64>,
    last_interval_end: Option<u64>,

    /// Enter/exit and scheduler folding drops attributed to this PID
    /// specifically (duplicate entry, unmatched exit once the PID is
    /// already tracked).
    pub drops: u64,

    pub first_seen_ts: u64,
    pub last_seen_ts: u64,
}

impl PidState {
    #[must_use]
    pub fn new(pid: Pid, first_seen_ts: u64) -> Self {
        PidState {
            pid,
            syscall_counts: HashMap::new(),
            pending_entries: HashMap::new(),
            total_syscalls: 0,
            io_syscalls: 0,
            net_syscalls: 0,
            syscall_duration_sum_ns: 0,
            syscall_duration_count: 0,
            read_bytes: 0,
            write_bytes: 0,
            io_operations: 0,
            send_bytes: 0,
            recv_bytes: 0,
            net_operations: 0,
            net_bytes_by_protocol: HashMap::new(),
            cpu_on_ns: 0,
            cpu_off_ns: 0,
            context_switches: 0,
            open_since: None,
            last_interval_end: None,
            drops: 0,
            first_seen_ts,
            last_seen_ts: first_seen_ts,
        }
    }

    fn touch(&mut self, ts: u64) {
        if ts > self.last_seen_ts {
            self.last_seen_ts = ts;
        }
    }

    pub fn record_syscall_enter(&mut self, tid: Tid, syscall_id: u64, ts: u64) {
        self.touch(ts);
        if self.pending_entries.insert((tid, syscall_id), ts).is_some() {
            // A second enter arrived before its exit: the first is unrecoverable.
            self.drops += 1;
        }
    }

    pub fn record_syscall_exit(&mut self, tid: Tid, syscall_id: u64, ts: u64) {
        self.touch(ts);
        let Some(entry_ts) = self.pending_entries.remove(&(tid, syscall_id)) else {
            self.drops += 1;
            return;
        };
        let duration = ts.saturating_sub(entry_ts);

        *self.syscall_counts.entry(syscall_id).or_insert(0) += 1;
        self.total_syscalls += 1;
        self.syscall_duration_sum_ns += duration;
        self.syscall_duration_count += 1;

        match classify_syscall(syscall_id) {
            SyscallClass::Io => self.io_syscalls += 1,
            SyscallClass::Net => self.net_syscalls += 1,
            SyscallClass::Other => {}
        }
    }

    /// This PID was switched onto the CPU at `ts`.
    pub fn record_scheduled_in(&mut self, ts: u64) {
        self.touch(ts);
        self.context_switches += 1;
        self.open_since = Some(ts);
    }

    /// This PID was switched off the CPU at `ts`. Closes the open interval
    /// (if one exists — a PID may first appear as `prev_pid` with no prior
    /// `scheduled_in`, in which case there is nothing to close) and folds
    /// the gap since the previous closed interval into `cpu_off_ns`
    /// (gap-between-intervals wait-time estimation, §4.2/§9).
    pub fn record_scheduled_out(&mut self, ts: u64) {
        self.touch(ts);
        self.context_switches += 1;
        if let Some(open_since) = self.open_since.take() {
            if let Some(last_end) = self.last_interval_end {
                self.cpu_off_ns += open_since.saturating_sub(last_end);
            }
            self.cpu_on_ns += ts.saturating_sub(open_since);
            self.last_interval_end = Some(ts);
        }
    }

    pub fn record_vfs(&mut self, byte_count: u64, is_read: bool) {
        self.io_operations += 1;
        if is_read {
            self.read_bytes += byte_count;
        } else {
            self.write_bytes += byte_count;
        }
    }

    pub fn record_net(&mut self, byte_count: u64, is_send: bool, protocol: u32) {
        self.net_operations += 1;
        if is_send {
            self.send_bytes += byte_count;
        } else {
            self.recv_bytes += byte_count;
        }
        *self.net_bytes_by_protocol.entry(protocol).or_insert(0) += byte_count;
    }

    #[must_use]
    pub fn is_currently_on_cpu(&self) -> bool {
        self.open_since.is_some()
    }
}
