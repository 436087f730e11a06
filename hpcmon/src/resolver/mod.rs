//! Job Resolver: maps a batch-scheduler job id to its PID set, with a TTL
//! cache in front of three discovery strategies (§4.3).

mod job_descriptor;
mod scheduler_query;
mod strategies;

pub use job_descriptor::{JobAccounting, JobDescriptor, JobState};

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::domain::{JobId, Pid};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub ttl: Duration,
    pub subprocess_timeout: Duration,
    pub pseudo_job_cap: usize,
    pub squeue_cmd: String,
    pub sstat_cmd: String,
    pub sacct_cmd: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            ttl: Duration::from_secs(30),
            subprocess_timeout: Duration::from_secs(10),
            pseudo_job_cap: 50,
            squeue_cmd: "squeue".to_string(),
            sstat_cmd: "sstat".to_string(),
            sacct_cmd: "sacct".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverStats {
    pub scheduler_invocations: u64,
}

/// Owns the `JobPidSet` cache exclusively (§3 ownership rule).
pub struct Resolver {
    cache: HashMap<JobId, (HashSet<Pid>, Instant)>,
    config: ResolverConfig,
    stats: ResolverStats,
}

impl Resolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Resolver { cache: HashMap::new(), config, stats: ResolverStats::default() }
    }

    /// Return the PID set for `job_id`, refreshing through the strategy
    /// chain if the cached entry is absent or older than the TTL.
    pub fn resolve(&mut self, job_id: &JobId, now: Instant) -> HashSet<Pid> {
        if let Some((pids, cached_at)) = self.cache.get(job_id) {
            if now.saturating_duration_since(*cached_at) <= self.config.ttl {
                return pids.clone();
            }
        }
        let pids = self.refresh(job_id);
        self.cache.insert(job_id.clone(), (pids.clone(), now));
        pids
    }

    /// Strategies are tried in priority order; the first non-empty result
    /// wins (§4.3). Every call here counts as one scheduler invocation
    /// regardless of which strategy ultimately supplies the PID set.
    fn refresh(&mut self, job_id: &JobId) -> HashSet<Pid> {
        self.stats.scheduler_invocations += 1;

        let from_sstat = scheduler_query::average_pids(
            &self.config.sstat_cmd,
            &job_id.0,
            self.config.subprocess_timeout,
        );
        if !from_sstat.is_empty() {
            return from_sstat.into_iter().map(Pid).collect();
        }

        let from_cgroup = strategies::pids_from_cgroup(&job_id.0);
        if !from_cgroup.is_empty() {
            return from_cgroup;
        }

        strategies::pids_from_proc_env(&job_id.0)
    }

    #[must_use]
    pub fn list_running(&self) -> Vec<JobDescriptor> {
        scheduler_query::list_running(&self.config.squeue_cmd, self.config.subprocess_timeout)
            .into_iter()
            .filter(JobDescriptor::is_running)
            .collect()
    }

    #[must_use]
    pub fn list_user(&self, user: &str) -> Vec<JobDescriptor> {
        scheduler_query::list_user(&self.config.squeue_cmd, user, self.config.subprocess_timeout)
    }

    #[must_use]
    pub fn list_node(&self, node: &str) -> Vec<JobDescriptor> {
        scheduler_query::list_node(&self.config.squeue_cmd, node, self.config.subprocess_timeout)
    }

    #[must_use]
    pub fn job_info(&self, job_id: &JobId) -> Vec<JobDescriptor> {
        scheduler_query::job_info(&self.config.squeue_cmd, &job_id.0, self.config.subprocess_timeout)
    }

    /// Historical accounting lookup (§4.3a). Read-only, not on the live
    /// PID-resolution path; a failed query is Recoverable and yields `None`.
    #[must_use]
    pub fn job_accounting(&self, job_id: &JobId) -> Option<JobAccounting> {
        scheduler_query::accounting(&self.config.sacct_cmd, &job_id.0, self.config.subprocess_timeout)
    }

    /// Pseudo-job fallback for when the scheduler is unreachable: every
    /// user-owned process becomes its own job, capped and namespaced
    /// `pseudo:proc_<n>` (§4.3, §9).
    #[must_use]
    pub fn pseudo_jobs(&self, uid: u32) -> Vec<(JobId, HashSet<Pid>)> {
        strategies::pseudo_job_pids(uid, self.config.pseudo_job_cap)
            .into_iter()
            .map(|(id, pid)| (JobId::from(id), [pid].into_iter().collect()))
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    /// All PIDs currently cached for any job, used by the Aggregator's
    /// eviction pass (§4.2a).
    #[must_use]
    pub fn all_cached_pids(&self) -> HashSet<Pid> {
        self.cache.values().flat_map(|(pids, _)| pids.iter().copied()).collect()
    }
}
