//! x86_64 syscall-id classification sets pinned by the wire format (§6).

/// `read`, `write`, `open`, `close`, `stat`, `fstat`, `lseek`, `readv`,
/// `writev`, `access`, `pipe`.
pub const IO_SYSCALLS: &[u64] = &[0, 1, 2, 3, 4, 5, 8, 19, 20, 21, 22];

/// `socket`, `connect`, `accept`, `sendto`, `recvfrom`, `sendmsg`,
/// `recvmsg`, `shutdown`, `bind`, `listen`.
pub const NET_SYSCALLS: &[u64] = &[41, 42, 43, 44, 45, 46, 47, 48, 49, 50];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallClass {
    Io,
    Net,
    Other,
}

#[must_use]
pub fn classify_syscall(syscall_id: u64) -> SyscallClass {
    if IO_SYSCALLS.contains(&syscall_id) {
        SyscallClass::Io
    } else if NET_SYSCALLS.contains(&syscall_id) {
        SyscallClass::Net
    } else {
        SyscallClass::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_ids_classify_as_io() {
        assert_eq!(classify_syscall(0), SyscallClass::Io);
        assert_eq!(classify_syscall(22), SyscallClass::Io);
    }

    #[test]
    fn net_ids_classify_as_net() {
        assert_eq!(classify_syscall(41), SyscallClass::Net);
        assert_eq!(classify_syscall(50), SyscallClass::Net);
    }

    #[test]
    fn unlisted_ids_classify_as_other() {
        assert_eq!(classify_syscall(60), SyscallClass::Other);
        assert_eq!(classify_syscall(9), SyscallClass::Other);
    }
}
