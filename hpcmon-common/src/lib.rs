#![no_std]

//! Shared data structures between the kernel-side probes and userspace.
//!
//! The kernel side never correlates events across probes; it only tags and
//! timestamps them. Entry/exit pairing, CPU-on/off folding, and syscall
//! classification all happen in the userspace Event Aggregator.

/// Raw event kind discriminants, one per probe category.
pub const EVENT_SYSCALL_ENTER: u32 = 0;
pub const EVENT_SYSCALL_EXIT: u32 = 1;
pub const EVENT_SCHED_SWITCH: u32 = 2;
pub const EVENT_VFS_READ: u32 = 3;
pub const EVENT_VFS_WRITE: u32 = 4;
pub const EVENT_SOCK_SEND: u32 = 5;
pub const EVENT_SOCK_RECV: u32 = 6;

/// Direction tag reused by the VFS and socket event kinds.
pub const DIR_READ_OR_SEND: u32 = 0;
pub const DIR_WRITE_OR_RECV: u32 = 1;

/// Maximum length of the best-effort command/file-basename fields.
pub const COMM_LEN: usize = 16;
pub const BASENAME_LEN: usize = 32;

/// One event sent from a kernel probe to userspace over the `EVENTS` ring buffer.
///
/// This is a flat, tagged struct rather than a Rust enum because it has to be
/// `Pod` and `#[repr(C)]` for the kernel/userspace ABI: fields that do not
/// apply to a given `kind` are left zeroed by the emitting probe.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawEvent {
    pub kind: u32,
    pub pid: u32,
    pub tid: u32,
    pub uid: u32,
    pub timestamp_ns: u64,

    /// `SyscallEnter`/`SyscallExit`: the syscall number.
    pub syscall_id: u64,

    /// `SchedSwitch`: the PID being switched to (`pid`/`tid` above carry `prev_pid`).
    pub next_pid: u32,
    /// `SchedSwitch`: `prev_state` from the tracepoint. `VfsRead`/`VfsWrite`/`SockSend`/`SockRecv`:
    /// `DIR_READ_OR_SEND` or `DIR_WRITE_OR_RECV`.
    pub aux: i64,

    /// `VfsRead`/`VfsWrite`/`SockSend`/`SockRecv`: byte count.
    pub byte_count: u64,
    /// `SockSend`/`SockRecv`: protocol number.
    pub protocol: u32,

    /// `SyscallEnter`: `comm` of the calling thread, best-effort.
    pub comm: [u8; COMM_LEN],
    /// `VfsRead`/`VfsWrite`: file basename, best-effort.
    pub file_basename: [u8; BASENAME_LEN],

    #[allow(clippy::pub_underscore_fields)]
    pub _padding: [u8; 4],
}

impl Default for RawEvent {
    fn default() -> Self {
        Self {
            kind: 0,
            pid: 0,
            tid: 0,
            uid: 0,
            timestamp_ns: 0,
            syscall_id: 0,
            next_pid: 0,
            aux: 0,
            byte_count: 0,
            protocol: 0,
            comm: [0; COMM_LEN],
            file_basename: [0; BASENAME_LEN],
            _padding: [0; 4],
        }
    }
}

#[cfg(feature = "user")]
use aya::Pod;

// This unsafe impl is required for eBPF <-> userspace communication: Pod
// ensures RawEvent can be safely transmitted as plain bytes across the ring buffer.
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for RawEvent {}
