//! eBPF program loading and probe attachment.
//!
//! Attaches only the probe programs a given [`Filter`](super::Filter)
//! requires. Net-probe attach failures are downgraded to warnings per
//! §4.1/§7: they are pushed into `warnings` rather than returned as an
//! error, and loading continues without network visibility.

use anyhow::Context;
use aya::programs::{KProbe, RawTracePoint, TracePoint};
use aya::{include_bytes_aligned, Ebpf};
use aya_log::EbpfLogger;
use log::warn;

use super::Filter;
use crate::domain::errors::ProbeError;

#[must_use]
pub fn running_as_root() -> bool {
    // SAFETY: geteuid() has no preconditions and cannot fail.
    #[allow(unsafe_code)]
    unsafe {
        libc::geteuid() == 0
    }
}

/// Load the compiled eBPF program binary.
///
/// Always the release build: debug builds pull in formatting code that the
/// BPF linker rejects, and eBPF programs are small enough that release
/// compiles fast.
pub fn load_ebpf_program() -> Result<Ebpf, ProbeError> {
    let bytes =
        include_bytes_aligned!("../../../target/bpfel-unknown-none/release/hpcmon");
    Ebpf::load(bytes).map_err(|e| ProbeError::LoadRejected(e.to_string()))
}

pub fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        warn!("failed to initialize eBPF logger: {e}");
    }
}

pub fn attach_for_filter(
    bpf: &mut Ebpf,
    filter: Filter,
    warnings: &mut Vec<String>,
) -> Result<(), ProbeError> {
    let want_syscall = matches!(filter, Filter::All | Filter::Syscall);
    let want_sched = matches!(filter, Filter::All | Filter::Sched);
    let want_io = matches!(filter, Filter::All | Filter::Io);
    let want_net = matches!(filter, Filter::All | Filter::Net);

    if want_syscall {
        attach_raw_tracepoint(bpf, "sys_enter", "sys_enter")?;
        attach_raw_tracepoint(bpf, "sys_exit", "sys_exit")?;
    }

    if want_sched {
        attach_tracepoint(bpf, "sched_switch", "sched", "sched_switch")?;
    }

    if want_io {
        attach_kprobe(bpf, "vfs_read", "vfs_read")?;
        attach_kprobe(bpf, "vfs_write", "vfs_write")?;
    }

    // Net probes are optional (§4.1): kprobe targets vary across kernel
    // builds, so failures here are Informational, not Fatal.
    if want_net {
        attach_kprobe_optional(bpf, "sock_sendmsg", "sock_sendmsg", warnings);
        attach_kprobe_optional(bpf, "sock_recvmsg", "sock_recvmsg", warnings);
    }

    Ok(())
}

fn attach_raw_tracepoint(bpf: &mut Ebpf, program_name: &str, tp_name: &str) -> Result<(), ProbeError> {
    let program: &mut RawTracePoint = bpf
        .program_mut(program_name)
        .with_context(|| format!("{program_name} program not found"))
        .map_err(|e| ProbeError::LoadRejected(e.to_string()))?
        .try_into()
        .map_err(|e: aya::programs::ProgramError| ProbeError::LoadRejected(e.to_string()))?;
    program.load().map_err(|e| ProbeError::LoadRejected(e.to_string()))?;
    program.attach(tp_name).map_err(|e| ProbeError::LoadRejected(e.to_string()))?;
    Ok(())
}

fn attach_tracepoint(
    bpf: &mut Ebpf,
    program_name: &str,
    category: &str,
    name: &str,
) -> Result<(), ProbeError> {
    let program: &mut TracePoint = bpf
        .program_mut(program_name)
        .with_context(|| format!("{program_name} program not found"))
        .map_err(|e| ProbeError::LoadRejected(e.to_string()))?
        .try_into()
        .map_err(|e: aya::programs::ProgramError| ProbeError::LoadRejected(e.to_string()))?;
    program.load().map_err(|e| ProbeError::LoadRejected(e.to_string()))?;
    program.attach(category, name).map_err(|e| ProbeError::LoadRejected(e.to_string()))?;
    Ok(())
}

fn attach_kprobe(bpf: &mut Ebpf, program_name: &str, symbol: &str) -> Result<(), ProbeError> {
    let program: &mut KProbe = bpf
        .program_mut(program_name)
        .with_context(|| format!("{program_name} program not found"))
        .map_err(|e| ProbeError::LoadRejected(e.to_string()))?
        .try_into()
        .map_err(|e: aya::programs::ProgramError| ProbeError::LoadRejected(e.to_string()))?;
    program.load().map_err(|e| ProbeError::LoadRejected(e.to_string()))?;
    program.attach(symbol, 0).map_err(|e| ProbeError::LoadRejected(e.to_string()))?;
    Ok(())
}

fn attach_kprobe_optional(
    bpf: &mut Ebpf,
    program_name: &str,
    symbol: &str,
    warnings: &mut Vec<String>,
) {
    if let Err(e) = attach_kprobe(bpf, program_name, symbol) {
        let msg = format!("{program_name}: {e}");
        warn!("optional probe attach failed, continuing without it: {msg}");
        warnings.push(msg);
    }
}
