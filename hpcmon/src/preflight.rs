//! Pre-flight checks run before eBPF program load.
//!
//! Validates privilege and kernel feature requirements up front so a
//! Fatal condition (§7) is reported with a clear diagnostic rather than
//! surfacing as an opaque verifier rejection later.

use crate::domain::errors::ProbeError;

/// Kernel ring-buffer support (`BPF_MAP_TYPE_RINGBUF`) landed in 5.8; raw
/// tracepoints attach the way this probe set needs from the same release.
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

pub fn run_preflight_checks() -> Result<(), ProbeError> {
    check_privileges()?;
    check_kernel_version()?;
    Ok(())
}

fn check_privileges() -> Result<(), ProbeError> {
    #[allow(unsafe_code)]
    if unsafe { libc::geteuid() } == 0 {
        Ok(())
    } else {
        Err(ProbeError::Privilege)
    }
}

fn check_kernel_version() -> Result<(), ProbeError> {
    let version_str = std::fs::read_to_string("/proc/version")?;
    let Some(release) = version_str.split_whitespace().nth(2) else {
        return Ok(());
    };

    let parts: Vec<&str> = release.split('.').collect();
    if parts.len() < 2 {
        return Ok(());
    }

    let major: u32 = parts[0].parse().unwrap_or(0);
    let minor: u32 =
        parts[1].chars().take_while(char::is_ascii_digit).collect::<String>().parse().unwrap_or(0);

    if (major, minor) < MIN_KERNEL_VERSION {
        return Err(ProbeError::KernelFeatureMissing(format!(
            "kernel {major}.{minor} lacks ring-buffer support, need {}.{}+",
            MIN_KERNEL_VERSION.0, MIN_KERNEL_VERSION.1
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_version_check_does_not_panic() {
        let _ = check_kernel_version();
    }
}
