//! Kernel-side probes for the HPC job workload classifier.
//!
//! Each probe category (syscall, scheduler, VFS, socket) is a separate eBPF
//! program so userspace can attach only the subset a given `Filter` needs.
//! The kernel side does no cross-event correlation: syscall entry/exit
//! pairing and CPU-on/off folding both happen in the userspace Event
//! Aggregator, which is why each probe here only tags and timestamps a
//! `RawEvent` and pushes it onto the shared ring buffer.

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use aya_ebpf::{
    helpers::{
        bpf_get_current_pid_tgid, bpf_get_current_uid_gid, bpf_ktime_get_ns, bpf_probe_read_kernel,
    },
    macros::{kprobe, map, raw_tracepoint, tracepoint},
    maps::{PerCpuArray, RingBuf},
    programs::{ProbeContext, RawTracePointContext, TracePointContext},
};
use hpcmon_common::{
    RawEvent, DIR_READ_OR_SEND, DIR_WRITE_OR_RECV, EVENT_SCHED_SWITCH, EVENT_SOCK_RECV,
    EVENT_SOCK_SEND, EVENT_SYSCALL_ENTER, EVENT_SYSCALL_EXIT, EVENT_VFS_READ, EVENT_VFS_WRITE,
};

/// Ring buffer carrying every emitted `RawEvent` to userspace.
#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(256 * 1024, 0);

/// Per-probe submit/drop counters, indexed by `RawEvent` kind, exposed to
/// userspace for `ProbeRuntime::stats()`.
#[map]
static SUBMITTED: PerCpuArray<u64> = PerCpuArray::with_max_entries(8, 0);
#[map]
static DROPPED: PerCpuArray<u64> = PerCpuArray::with_max_entries(8, 0);

fn current_pid_tid() -> (u32, u32) {
    let pid_tgid = bpf_get_current_pid_tgid();
    ((pid_tgid >> 32) as u32, pid_tgid as u32)
}

fn current_uid() -> u32 {
    (unsafe { bpf_get_current_uid_gid() } & 0xffff_ffff) as u32
}

fn submit(event: &RawEvent) {
    let kind = event.kind as u32;
    match EVENTS.output(event, 0) {
        Ok(()) => bump(&SUBMITTED, kind),
        Err(_) => bump(&DROPPED, kind),
    }
}

fn bump(map: &PerCpuArray<u64>, index: u32) {
    if let Some(counter) = map.get_ptr_mut(index) {
        unsafe { *counter += 1 };
    }
}

/// Layout from `/sys/kernel/debug/tracing/events/raw_syscalls/sys_enter/format`.
#[repr(C)]
struct SysEnterArgs {
    _unused: u64,
    id: i64,
    _args: [u64; 6],
}

/// Layout from `/sys/kernel/debug/tracing/events/raw_syscalls/sys_exit/format`.
#[repr(C)]
struct SysExitArgs {
    _unused: u64,
    id: i64,
    _ret: i64,
}

#[raw_tracepoint(tracepoint = "sys_enter")]
pub fn sys_enter(ctx: RawTracePointContext) -> i64 {
    match try_sys_enter(&ctx) {
        Ok(()) => 0,
        Err(e) => e,
    }
}

fn try_sys_enter(ctx: &RawTracePointContext) -> Result<(), i64> {
    let args: *const SysEnterArgs = unsafe { ctx.as_ptr().cast() };
    let syscall_id = unsafe { (*args).id } as u64;
    let (pid, tid) = current_pid_tid();

    let event = RawEvent {
        kind: EVENT_SYSCALL_ENTER,
        pid,
        tid,
        uid: current_uid(),
        timestamp_ns: unsafe { bpf_ktime_get_ns() },
        syscall_id,
        ..RawEvent::default()
    };
    submit(&event);
    Ok(())
}

#[raw_tracepoint(tracepoint = "sys_exit")]
pub fn sys_exit(ctx: RawTracePointContext) -> i64 {
    match try_sys_exit(&ctx) {
        Ok(()) => 0,
        Err(e) => e,
    }
}

fn try_sys_exit(ctx: &RawTracePointContext) -> Result<(), i64> {
    let args: *const SysExitArgs = unsafe { ctx.as_ptr().cast() };
    let syscall_id = unsafe { (*args).id } as u64;
    let (pid, tid) = current_pid_tid();

    let event = RawEvent {
        kind: EVENT_SYSCALL_EXIT,
        pid,
        tid,
        uid: current_uid(),
        timestamp_ns: unsafe { bpf_ktime_get_ns() },
        syscall_id,
        ..RawEvent::default()
    };
    submit(&event);
    Ok(())
}

/// Layout from `/sys/kernel/debug/tracing/events/sched/sched_switch/format`.
#[repr(C)]
struct SchedSwitchArgs {
    _unused: u64,
    _prev_comm: [u8; 16],
    prev_pid: i32,
    _prev_prio: i32,
    prev_state: i64,
    _next_comm: [u8; 16],
    next_pid: i32,
    _next_prio: i32,
}

#[tracepoint]
pub fn sched_switch(ctx: TracePointContext) -> u32 {
    match try_sched_switch(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sched_switch(ctx: &TracePointContext) -> Result<(), i64> {
    let args: *const SchedSwitchArgs = unsafe { ctx.as_ptr().cast() };
    let prev_pid = unsafe { (*args).prev_pid } as u32;
    let prev_state = unsafe { (*args).prev_state };
    let next_pid = unsafe { (*args).next_pid } as u32;

    let event = RawEvent {
        kind: EVENT_SCHED_SWITCH,
        pid: prev_pid,
        tid: prev_pid,
        uid: 0,
        timestamp_ns: unsafe { bpf_ktime_get_ns() },
        next_pid,
        aux: prev_state,
        ..RawEvent::default()
    };
    submit(&event);
    Ok(())
}

#[kprobe]
pub fn vfs_read(ctx: ProbeContext) -> u32 {
    match try_vfs_io(&ctx, EVENT_VFS_READ, DIR_READ_OR_SEND) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

#[kprobe]
pub fn vfs_write(ctx: ProbeContext) -> u32 {
    match try_vfs_io(&ctx, EVENT_VFS_WRITE, DIR_WRITE_OR_RECV) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// `vfs_read`/`vfs_write(struct file *file, char __user *buf, size_t count, loff_t *pos)`:
/// the requested byte count is argument index 2.
fn try_vfs_io(ctx: &ProbeContext, kind: u32, direction: u32) -> Result<(), i64> {
    let (pid, tid) = current_pid_tid();
    let byte_count: u64 = unsafe { ctx.arg(2).ok_or(1i64)? };

    let event = RawEvent {
        kind,
        pid,
        tid,
        uid: current_uid(),
        timestamp_ns: unsafe { bpf_ktime_get_ns() },
        byte_count,
        aux: i64::from(direction),
        ..RawEvent::default()
    };
    submit(&event);
    Ok(())
}

#[kprobe]
pub fn sock_sendmsg(ctx: ProbeContext) -> u32 {
    match try_sock_io(&ctx, EVENT_SOCK_SEND, DIR_READ_OR_SEND) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

#[kprobe]
pub fn sock_recvmsg(ctx: ProbeContext) -> u32 {
    match try_sock_io(&ctx, EVENT_SOCK_RECV, DIR_WRITE_OR_RECV) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Offset of `short type` within `struct socket` (`include/linux/net.h`):
/// the leading `socket_state state` enum occupies 4 bytes, `type` follows
/// immediately. This layout predates the BPF/CO-RE era and has been
/// stable across kernel versions, unlike `struct sock`'s bitpacked
/// `sk_protocol`/`sk_type` fields, which is why it's read directly here
/// instead of through `struct sock`.
const SOCKET_TYPE_OFFSET: usize = 4;

const SOCK_STREAM: u16 = 1;
const SOCK_DGRAM: u16 = 2;

const IPPROTO_TCP: u32 = 6;
const IPPROTO_UDP: u32 = 17;

/// Best-effort IP protocol number for a `struct socket *`, inferred from
/// the stable `type` field rather than walking into `struct sock`.
/// Socket types other than stream/dgram (raw, seqpacket, packet) have no
/// single IANA protocol number and are reported as `0`.
fn read_protocol(sock_ptr: *const u8) -> u32 {
    if sock_ptr.is_null() {
        return 0;
    }
    let sock_type: u16 =
        match unsafe { bpf_probe_read_kernel(sock_ptr.add(SOCKET_TYPE_OFFSET).cast()) } {
            Ok(v) => v,
            Err(_) => return 0,
        };
    match sock_type {
        SOCK_STREAM => IPPROTO_TCP,
        SOCK_DGRAM => IPPROTO_UDP,
        _ => 0,
    }
}

/// `sock_sendmsg`/`sock_recvmsg(struct socket *sock, struct msghdr *msg, size_t size)`:
/// (for recvmsg the return value is the byte count, but we record the
/// requested size at entry since duration/return-value capture is out of
/// scope for this probe and best-effort per §4.1).
fn try_sock_io(ctx: &ProbeContext, kind: u32, direction: u32) -> Result<(), i64> {
    let (pid, tid) = current_pid_tid();
    let byte_count: u64 = unsafe { ctx.arg(2).unwrap_or(0) };
    let sock_ptr: *const u8 = unsafe { ctx.arg(0).unwrap_or(core::ptr::null()) };
    let protocol = read_protocol(sock_ptr);

    let event = RawEvent {
        kind,
        pid,
        tid,
        uid: current_uid(),
        timestamp_ns: unsafe { bpf_ktime_get_ns() },
        byte_count,
        protocol,
        aux: i64::from(direction),
        ..RawEvent::default()
    };
    submit(&event);
    Ok(())
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
