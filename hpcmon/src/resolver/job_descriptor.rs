//! Job identity and accounting records parsed from scheduler command output.

use crate::domain::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Pending,
    Completed,
    Other,
}

impl JobState {
    fn parse(raw: &str) -> JobState {
        match raw {
            "RUNNING" => JobState::Running,
            "PENDING" => JobState::Pending,
            "COMPLETED" => JobState::Completed,
            _ => JobState::Other,
        }
    }
}

/// A batch-scheduler job identity, parsed from the pipe-delimited
/// `job_id|name|user|state|time|node_list|cpus|memory|partition` format (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub name: String,
    pub user: String,
    pub state: JobState,
    pub time: String,
    pub nodes: Vec<String>,
    pub cpus: u32,
    pub memory: String,
    pub partition: String,
}

impl JobDescriptor {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// Parse one pipe-delimited scheduler-queue line. Returns `None` for a
    /// short or malformed line rather than erroring: unparsable lines are a
    /// recoverable condition per §7 and are dropped by the caller, not
    /// surfaced as an error.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<JobDescriptor> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 9 {
            return None;
        }
        let nodes = if parts[5].is_empty() {
            Vec::new()
        } else {
            parts[5].split('+').map(str::to_string).collect()
        };
        Some(JobDescriptor {
            job_id: JobId::from(parts[0]),
            name: parts[1].to_string(),
            user: parts[2].to_string(),
            state: JobState::parse(parts[3]),
            time: parts[4].to_string(),
            nodes,
            cpus: parts[6].parse().unwrap_or(0),
            memory: parts[7].to_string(),
            partition: parts[8].to_string(),
        })
    }
}

/// Historical accounting record for a completed job (§4.3a), parsed from
/// `job_id|job_name|user|partition|state|exit_code|start_time|end_time|elapsed|cpu_time|max_rss|max_vmsize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAccounting {
    pub job_id: JobId,
    pub job_name: String,
    pub user: String,
    pub partition: String,
    pub state: JobState,
    pub exit_code: i32,
    pub start_time: String,
    pub end_time: String,
    pub elapsed: String,
    pub cpu_time: String,
    pub max_rss: String,
    pub max_vmsize: String,
}

impl JobAccounting {
    #[must_use]
    pub fn parse_line(line: &str) -> Option<JobAccounting> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 12 {
            return None;
        }
        Some(JobAccounting {
            job_id: JobId::from(parts[0]),
            job_name: parts[1].to_string(),
            user: parts[2].to_string(),
            partition: parts[3].to_string(),
            state: JobState::parse(parts[4]),
            exit_code: parts[5].parse().unwrap_or(-1),
            start_time: parts[6].to_string(),
            end_time: parts[7].to_string(),
            elapsed: parts[8].to_string(),
            cpu_time: parts[9].to_string(),
            max_rss: parts[10].to_string(),
            max_vmsize: parts[11].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_running_job_line() {
        let line = "123|my-job|alice|RUNNING|00:10:00|node01+node02|4|4G|batch";
        let job = JobDescriptor::parse_line(line).unwrap();
        assert_eq!(job.job_id, JobId::from("123"));
        assert_eq!(job.nodes, vec!["node01", "node02"]);
        assert!(job.is_running());
    }

    #[test]
    fn short_line_is_unparsable() {
        assert!(JobDescriptor::parse_line("123|my-job").is_none());
    }

    #[test]
    fn parses_accounting_line() {
        let line = "123|my-job|alice|batch|COMPLETED|0|2026-01-01T00:00:00|2026-01-01T01:00:00|01:00:00|00:45:00|512000|1024000";
        let acct = JobAccounting::parse_line(line).unwrap();
        assert_eq!(acct.exit_code, 0);
        assert_eq!(acct.max_rss, "512000");
    }
}
