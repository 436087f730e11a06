//! Control-group and `/proc`-environment PID discovery strategies (§4.3
//! strategies 2 and 3), used when the scheduler-stats strategy yields
//! nothing.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Pid;

/// `.../slurm/uid_*/job_<id>/cgroup.procs` under each known controller root.
const CGROUP_CONTROLLER_ROOTS: &[&str] =
    &["/sys/fs/cgroup/systemd", "/sys/fs/cgroup", "/sys/fs/cgroup/memory", "/sys/fs/cgroup/cpuset"];

#[must_use]
pub fn pids_from_cgroup(job_id: &str) -> HashSet<Pid> {
    let mut pids = HashSet::new();
    for root in CGROUP_CONTROLLER_ROOTS {
        let slurm_dir = Path::new(root).join("slurm");
        let Ok(uid_entries) = fs::read_dir(&slurm_dir) else {
            continue;
        };
        for uid_entry in uid_entries.flatten() {
            let job_dir = uid_entry.path().join(format!("job_{job_id}"));
            let procs_file = job_dir.join("cgroup.procs");
            let Ok(contents) = fs::read_to_string(&procs_file) else {
                continue;
            };
            for line in contents.lines() {
                if let Ok(pid) = line.trim().parse::<u32>() {
                    pids.insert(Pid(pid));
                }
            }
        }
    }
    pids
}

/// Scan every process's environment block for `SLURM_JOB_ID`/`SLURM_JOBID`
/// equal to `job_id`, then add each match's transitive descendant PIDs.
#[must_use]
pub fn pids_from_proc_env(job_id: &str) -> HashSet<Pid> {
    let mut matches = HashSet::new();
    let Ok(proc_dir) = fs::read_dir("/proc") else {
        return matches;
    };

    for entry in proc_dir.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };
        if process_matches_job(pid, job_id) {
            matches.insert(Pid(pid));
        }
    }

    if matches.is_empty() {
        return matches;
    }

    let children = build_child_map();
    let mut all = matches.clone();
    for pid in matches {
        collect_descendants(pid, &children, &mut all);
    }
    all
}

fn process_matches_job(pid: u32, job_id: &str) -> bool {
    let Ok(environ) = fs::read(format!("/proc/{pid}/environ")) else {
        return false;
    };
    for var in environ.split(|&b| b == 0) {
        let Ok(var) = std::str::from_utf8(var) else {
            continue;
        };
        if let Some(value) = var.strip_prefix("SLURM_JOB_ID=").or_else(|| var.strip_prefix("SLURM_JOBID=")) {
            if value == job_id {
                return true;
            }
        }
    }
    false
}

/// Build a parent → children map from every process's `/proc/<pid>/stat`
/// field 4 (ppid), used to find transitive descendants without requiring
/// per-call re-scanning of `/proc`.
fn build_child_map() -> HashMap<Pid, Vec<Pid>> {
    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    let Ok(proc_dir) = fs::read_dir("/proc") else {
        return children;
    };
    for entry in proc_dir.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };
        if let Some(ppid) = read_ppid(pid) {
            children.entry(Pid(ppid)).or_default().push(Pid(pid));
        }
    }
    children
}

fn read_ppid(pid: u32) -> Option<u32> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let close = stat.rfind(')')?;
    stat[close + 1..].split_whitespace().nth(1)?.parse().ok()
}

fn collect_descendants(root: Pid, children: &HashMap<Pid, Vec<Pid>>, out: &mut HashSet<Pid>) {
    let mut stack = vec![root];
    while let Some(pid) = stack.pop() {
        if let Some(kids) = children.get(&pid) {
            for &child in kids {
                if out.insert(child) {
                    stack.push(child);
                }
            }
        }
    }
}

/// Pseudo-job fallback (§4.3, §9): every user-owned process becomes its own
/// job, capped and namespaced `pseudo:proc_<n>` to avoid colliding with a
/// real job id `proc_<n>`.
#[must_use]
pub fn pseudo_job_pids(uid: u32, cap: usize) -> Vec<(String, Pid)> {
    let mut out = Vec::new();
    let Ok(proc_dir) = fs::read_dir("/proc") else {
        return out;
    };
    let mut entries: Vec<PathBuf> = proc_dir.flatten().map(|e| e.path()).collect();
    entries.sort();

    for path in entries {
        if out.len() >= cap {
            break;
        }
        let Some(pid) = path.file_name().and_then(|n| n.to_str()).and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        if process_owned_by(pid, uid) {
            out.push((format!("pseudo:proc_{}", out.len()), Pid(pid)));
        }
    }
    out
}

fn process_owned_by(pid: u32, uid: u32) -> bool {
    let Ok(status) = fs::read_to_string(format!("/proc/{pid}/status")) else {
        return false;
    };
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|first| first.parse::<u32>().ok())
        .is_some_and(|owner| owner == uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_descendants_follows_full_tree() {
        let mut children = HashMap::new();
        children.insert(Pid(1), vec![Pid(2), Pid(3)]);
        children.insert(Pid(2), vec![Pid(4)]);
        let mut out = HashSet::new();
        collect_descendants(Pid(1), &children, &mut out);
        assert_eq!(out, [Pid(2), Pid(3), Pid(4)].into_iter().collect());
    }
}
