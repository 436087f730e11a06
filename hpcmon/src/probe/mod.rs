//! Probe Runtime: attaches kernel probes and decodes raw kernel events.
//!
//! This module owns the eBPF program lifecycle (load, attach, poll,
//! cleanup) and is the only place that touches `aya` types directly; every
//! other component works against the typed [`RawEvent`] produced here.

mod loader;

use std::collections::HashMap;

use anyhow::Result;
use aya::maps::RingBuf;
use aya::Ebpf;
use hpcmon_common::{
    RawEvent as WireEvent, EVENT_SCHED_SWITCH, EVENT_SOCK_RECV, EVENT_SOCK_SEND,
    EVENT_SYSCALL_ENTER, EVENT_SYSCALL_EXIT, EVENT_VFS_READ, EVENT_VFS_WRITE,
};
use log::warn;

use crate::aggregator::Aggregator;
use crate::domain::errors::ProbeError;
use crate::domain::{Pid, Tid, Uid};

/// Probe-set selection, mirroring the kernel-side probe categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    Syscall,
    Sched,
    Io,
    Net,
}

impl std::str::FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Filter::All),
            "syscall" => Ok(Filter::Syscall),
            "sched" => Ok(Filter::Sched),
            "io" => Ok(Filter::Io),
            "net" => Ok(Filter::Net),
            other => Err(format!("unknown filter '{other}', expected all|syscall|sched|io|net")),
        }
    }
}

/// A decoded, typed kernel event. The kernel side never correlates events
/// across probes; entry/exit pairing and CPU-on/off folding are done by the
/// [`Aggregator`].
#[derive(Debug, Clone, Copy)]
pub enum RawEvent {
    SyscallEnter { pid: Pid, tid: Tid, uid: Uid, syscall_id: u64, ts: u64 },
    SyscallExit { pid: Pid, tid: Tid, uid: Uid, syscall_id: u64, ts: u64 },
    SchedSwitch { prev_pid: Pid, next_pid: Pid, prev_state: i64, ts: u64 },
    VfsRead { pid: Pid, byte_count: u64, ts: u64 },
    VfsWrite { pid: Pid, byte_count: u64, ts: u64 },
    SockSend { pid: Pid, byte_count: u64, protocol: u32, ts: u64 },
    SockRecv { pid: Pid, byte_count: u64, protocol: u32, ts: u64 },
}

impl RawEvent {
    fn decode(raw: &WireEvent) -> Option<RawEvent> {
        let pid = Pid(raw.pid);
        let tid = Tid(raw.tid);
        let uid = Uid(raw.uid);
        let ts = raw.timestamp_ns;
        Some(match raw.kind {
            EVENT_SYSCALL_ENTER => {
                RawEvent::SyscallEnter { pid, tid, uid, syscall_id: raw.syscall_id, ts }
            }
            EVENT_SYSCALL_EXIT => {
                RawEvent::SyscallExit { pid, tid, uid, syscall_id: raw.syscall_id, ts }
            }
            EVENT_SCHED_SWITCH => RawEvent::SchedSwitch {
                prev_pid: pid,
                next_pid: Pid(raw.next_pid),
                prev_state: raw.aux,
                ts,
            },
            EVENT_VFS_READ => RawEvent::VfsRead { pid, byte_count: raw.byte_count, ts },
            EVENT_VFS_WRITE => RawEvent::VfsWrite { pid, byte_count: raw.byte_count, ts },
            EVENT_SOCK_SEND => {
                RawEvent::SockSend { pid, byte_count: raw.byte_count, protocol: raw.protocol, ts }
            }
            EVENT_SOCK_RECV => {
                RawEvent::SockRecv { pid, byte_count: raw.byte_count, protocol: raw.protocol, ts }
            }
            _ => return None,
        })
    }
}

/// Delivered/dropped counts, overall and per event kind.
#[derive(Debug, Clone, Default)]
pub struct ProbeStats {
    pub delivered: u64,
    pub dropped: u64,
    pub delivered_by_kind: HashMap<&'static str, u64>,
    /// Probes that the loader downgraded to a warning rather than a load failure.
    pub attach_warnings: Vec<String>,
}

impl ProbeStats {
    fn record(&mut self, event: &RawEvent) {
        self.delivered += 1;
        let kind = match event {
            RawEvent::SyscallEnter { .. } => "syscall_enter",
            RawEvent::SyscallExit { .. } => "syscall_exit",
            RawEvent::SchedSwitch { .. } => "sched_switch",
            RawEvent::VfsRead { .. } => "vfs_read",
            RawEvent::VfsWrite { .. } => "vfs_write",
            RawEvent::SockSend { .. } => "sock_send",
            RawEvent::SockRecv { .. } => "sock_recv",
        };
        *self.delivered_by_kind.entry(kind).or_insert(0) += 1;
    }
}

/// Owns the loaded eBPF program and the userspace side of the `EVENTS` ring
/// buffer. Single-consumer: `poll` is the only method that mutates state and
/// must not be called concurrently from more than one task (§4.2, §5).
pub struct ProbeRuntime {
    // Kept alive for the lifetime of the runtime even though only `ring_buf`
    // is read directly; dropping `bpf` detaches every attached program.
    _bpf: Ebpf,
    ring_buf: RingBuf<aya::maps::MapData>,
    filter: Filter,
    stats: ProbeStats,
}

impl ProbeRuntime {
    /// Attach probes for `filter`. Fails fatally (§7) if the caller lacks
    /// privilege, the kernel is missing a required feature, or the bytecode
    /// is rejected. Optional net-probe attach failures are downgraded to
    /// warnings recorded in `stats().attach_warnings` (§4.1, §7a).
    pub fn load(filter: Filter) -> Result<Self, ProbeError> {
        if !loader::running_as_root() {
            return Err(ProbeError::Privilege);
        }

        let mut bpf = loader::load_ebpf_program()?;
        loader::init_ebpf_logger(&mut bpf);

        let mut attach_warnings = Vec::new();
        loader::attach_for_filter(&mut bpf, filter, &mut attach_warnings)?;

        let ring_buf = RingBuf::try_from(
            bpf.take_map("EVENTS")
                .ok_or_else(|| ProbeError::LoadRejected("EVENTS map not found".to_string()))?,
        )
        .map_err(|e| ProbeError::LoadRejected(e.to_string()))?;

        let mut stats = ProbeStats::default();
        stats.attach_warnings = attach_warnings;

        Ok(ProbeRuntime { _bpf: bpf, ring_buf, filter, stats })
    }

    /// Drain every event currently queued in the ring buffer, folding each
    /// into `aggregator` in kernel-emit order, and return the count drained.
    /// `timeout_ms` bounds the caller's suspension point around this call
    /// (§4.1); the drain itself is non-blocking once invoked.
    pub fn poll(&mut self, aggregator: &mut Aggregator) -> usize {
        let mut drained = 0;
        while let Some(item) = self.ring_buf.next() {
            drained += 1;
            let bytes: &[u8] = &item;
            if bytes.len() < std::mem::size_of::<WireEvent>() {
                warn!("dropping truncated ring-buffer event ({} bytes)", bytes.len());
                self.stats.dropped += 1;
                continue;
            }
            #[allow(unsafe_code)]
            let wire = unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<WireEvent>()) };
            match RawEvent::decode(&wire) {
                Some(event) => {
                    self.stats.record(&event);
                    aggregator.fold(event);
                }
                None => {
                    warn!("dropping unparsable event kind {}", wire.kind);
                    self.stats.dropped += 1;
                }
            }
        }
        drained
    }

    #[must_use]
    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }

    #[must_use]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Detach every probe. Idempotent: dropping `_bpf` already detaches
    /// everything, so a caller may call this defensively before exit and
    /// again via `Drop` without ill effect.
    pub fn cleanup(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_known_values() {
        assert_eq!("all".parse::<Filter>().unwrap(), Filter::All);
        assert_eq!("io".parse::<Filter>().unwrap(), Filter::Io);
        assert!("bogus".parse::<Filter>().is_err());
    }

    #[test]
    fn decode_syscall_enter() {
        let raw = WireEvent {
            kind: EVENT_SYSCALL_ENTER,
            pid: 10,
            tid: 11,
            uid: 0,
            timestamp_ns: 100,
            syscall_id: 1,
            ..WireEvent::default()
        };
        match RawEvent::decode(&raw) {
            Some(RawEvent::SyscallEnter { pid, tid, syscall_id, ts, .. }) => {
                assert_eq!(pid, Pid(10));
                assert_eq!(tid, Tid(11));
                assert_eq!(syscall_id, 1);
                assert_eq!(ts, 100);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn decode_unknown_kind_is_none() {
        let raw = WireEvent { kind: 999, ..WireEvent::default() };
        assert!(RawEvent::decode(&raw).is_none());
    }
}
