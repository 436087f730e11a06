//! Subprocess invocation of the batch scheduler's query commands.
//!
//! Every command here runs with a bounded timeout and never holds any lock
//! belonging to the Aggregator (§5). A timed-out or non-zero-exit command
//! is a Recoverable condition (§7): callers see `None` and fall through to
//! the next resolver strategy, nothing propagates as an error.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::warn;

use super::job_descriptor::{JobAccounting, JobDescriptor};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `cmd` to completion, killing it if it outlives `timeout`. Returns
/// stdout on a zero exit, `None` otherwise.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Option<String> {
    let mut child = match cmd.stdout(Stdio::piped()).stderr(Stdio::null()).spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("failed to spawn scheduler command: {e}");
            return None;
        }
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return None;
                }
                let mut out = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_string(&mut out);
                }
                return Some(out);
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    warn!("scheduler command timed out after {timeout:?}");
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!("failed to poll scheduler command: {e}");
                return None;
            }
        }
    }
}

/// `squeue --states=RUNNING --format=%i|%j|%u|%t|%M|%N|%C|%m|%P --noheader`
pub fn list_running(squeue_cmd: &str, timeout: Duration) -> Vec<JobDescriptor> {
    let mut cmd = Command::new(squeue_cmd);
    cmd.args(["--states=RUNNING", "--format=%i|%j|%u|%t|%M|%N|%C|%m|%P", "--noheader"]);
    parse_job_lines(run_with_timeout(cmd, timeout))
}

pub fn list_user(squeue_cmd: &str, user: &str, timeout: Duration) -> Vec<JobDescriptor> {
    let mut cmd = Command::new(squeue_cmd);
    cmd.args(["--user", user, "--format=%i|%j|%u|%t|%M|%N|%C|%m|%P", "--noheader"]);
    parse_job_lines(run_with_timeout(cmd, timeout))
}

pub fn list_node(squeue_cmd: &str, node: &str, timeout: Duration) -> Vec<JobDescriptor> {
    let mut cmd = Command::new(squeue_cmd);
    cmd.args(["--nodelist", node, "--format=%i|%j|%u|%t|%M|%N|%C|%m|%P", "--noheader"]);
    parse_job_lines(run_with_timeout(cmd, timeout))
}

pub fn job_info(squeue_cmd: &str, job_id: &str, timeout: Duration) -> Vec<JobDescriptor> {
    let mut cmd = Command::new(squeue_cmd);
    cmd.args(["--job", job_id, "--format=%i|%j|%u|%t|%M|%N|%C|%m|%P", "--noheader"]);
    parse_job_lines(run_with_timeout(cmd, timeout))
}

pub fn accounting(sacct_cmd: &str, job_id: &str, timeout: Duration) -> Option<JobAccounting> {
    let mut cmd = Command::new(sacct_cmd);
    cmd.args([
        "-j",
        job_id,
        "--format=JobID,JobName,User,Partition,State,ExitCode,Start,End,Elapsed,CPUTime,MaxRSS,MaxVMSize",
        "--parsable2",
        "--noheader",
    ]);
    let out = run_with_timeout(cmd, timeout)?;
    out.lines().find_map(JobAccounting::parse_line)
}

/// `sstat -j <job_id> --format=JobID,AvePID --parsable2 --noheader`. Returns
/// every numeric PID found in the `AvePID` column (§4.3 strategy 1).
pub fn average_pids(sstat_cmd: &str, job_id: &str, timeout: Duration) -> Vec<u32> {
    let mut cmd = Command::new(sstat_cmd);
    cmd.args(["-j", job_id, "--format=JobID,AvePID", "--parsable2", "--noheader"]);
    let Some(out) = run_with_timeout(cmd, timeout) else {
        return Vec::new();
    };
    out.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            parts.get(1).and_then(|p| p.trim().parse::<u32>().ok())
        })
        .collect()
}

fn parse_job_lines(output: Option<String>) -> Vec<JobDescriptor> {
    let Some(output) = output else {
        return Vec::new();
    };
    output.lines().filter_map(JobDescriptor::parse_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_job_lines_skips_unparsable_lines() {
        let output = Some(
            "123|my-job|alice|RUNNING|00:10:00|node01|4|4G|batch\nbad-line\n".to_string(),
        );
        let jobs = parse_job_lines(output);
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn parse_job_lines_handles_none() {
        assert!(parse_job_lines(None).is_empty());
    }
}
