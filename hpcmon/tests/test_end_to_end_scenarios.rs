//! End-to-end pipeline scenarios: raw kernel events folded through the
//! Aggregator, projected by the Metric Folder, and classified, matching
//! the worked scenarios from the workload-classification design (E1-E4)
//! plus the cache/eviction and report-export scenarios (E5, E6).

use std::collections::HashSet;

use hpcmon::aggregator::Aggregator;
use hpcmon::classifier::{self, Label, Thresholds};
use hpcmon::domain::{Pid, Tid, Uid};
use hpcmon::export::{JobReport, MonitoringSession, Report};
use hpcmon::metrics::JobMetrics;
use hpcmon::preflight;
use hpcmon::probe::RawEvent;
use hpcmon::resolver::{Resolver, ResolverConfig};

fn pid_set(pids: &[u32]) -> HashSet<Pid> {
    pids.iter().copied().map(Pid).collect()
}

/// E1: a CPU-bound job spends most of its wall time on-CPU and issues few
/// I/O syscalls. Drive this end to end through the real Aggregator rather
/// than constructing `JobMetrics` by hand.
#[test]
fn e1_cpu_bound_job_classifies_end_to_end() {
    let mut agg = Aggregator::new();
    let pid = Pid(100);
    let tid = Tid(100);
    let uid = Uid(1000);

    // One long on-CPU stretch, then a short off-CPU gap.
    agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(0), next_pid: pid, prev_state: 0, ts: 0 });
    agg.fold(RawEvent::SchedSwitch { prev_pid: pid, next_pid: Pid(0), prev_state: 0, ts: 900 });
    agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(0), next_pid: pid, prev_state: 0, ts: 1_000 });

    for i in 0..20 {
        let ts = 1_000 + i * 10;
        agg.fold(RawEvent::SyscallEnter { pid, tid, uid, syscall_id: 39, ts });
        agg.fold(RawEvent::SyscallExit { pid, tid, uid, syscall_id: 39, ts: ts + 1 });
    }

    let pids = pid_set(&[100]);
    let metrics = JobMetrics::fold(agg.snapshot(), &pids);
    let classification = classifier::classify(&metrics, &Thresholds::default());

    assert!(metrics.cpu_percent > metrics.wait_percent);
    assert!(matches!(classification.label, Label::CpuBound | Label::CpuIoMixed | Label::Balanced));
}

/// E2: an I/O-heavy job folds read/write syscalls into a high `io_percent`
/// and a nonzero `total_io_bytes`.
#[test]
fn e2_io_heavy_job_accumulates_bytes_and_io_syscalls() {
    let mut agg = Aggregator::new();
    let pid = Pid(200);
    let tid = Tid(200);
    let uid = Uid(1000);

    for i in 0..30 {
        let ts = i * 100;
        agg.fold(RawEvent::SyscallEnter { pid, tid, uid, syscall_id: 0, ts });
        agg.fold(RawEvent::SyscallExit { pid, tid, uid, syscall_id: 0, ts: ts + 5 });
        agg.fold(RawEvent::VfsRead { pid, byte_count: 4096, ts });
    }
    for _ in 0..10 {
        agg.fold(RawEvent::SyscallEnter { pid, tid, uid, syscall_id: 39, ts: 10_000 });
        agg.fold(RawEvent::SyscallExit { pid, tid, uid, syscall_id: 39, ts: 10_001 });
    }

    let pids = pid_set(&[200]);
    let metrics = JobMetrics::fold(agg.snapshot(), &pids);

    assert_eq!(metrics.total_io_bytes, 30 * 4096);
    assert!(metrics.io_percent > 0.0);
    assert_eq!(metrics.total_syscalls, 40);
}

/// E3: a job observed only through scheduler off-CPU gaps (no on-CPU
/// stretches recorded) should fold into a high `wait_percent`.
#[test]
fn e3_idle_job_has_high_wait_percent() {
    let mut agg = Aggregator::new();
    let pid = Pid(300);
    let tid = Tid(300);
    let uid = Uid(1000);

    agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(0), next_pid: pid, prev_state: 0, ts: 0 });
    agg.fold(RawEvent::SchedSwitch { prev_pid: pid, next_pid: Pid(0), prev_state: 0, ts: 50 });
    agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(0), next_pid: pid, prev_state: 0, ts: 5_000 });
    agg.fold(RawEvent::SchedSwitch { prev_pid: pid, next_pid: Pid(0), prev_state: 0, ts: 5_050 });

    agg.fold(RawEvent::SyscallEnter { pid, tid, uid, syscall_id: 35, ts: 5_060 });
    agg.fold(RawEvent::SyscallExit { pid, tid, uid, syscall_id: 35, ts: 5_061 });

    let pids = pid_set(&[300]);
    let metrics = JobMetrics::fold(agg.snapshot(), &pids);

    assert!(metrics.wait_percent > metrics.cpu_percent);
}

/// E4: a job with a balanced mix of CPU and I/O activity and moderate
/// context switching should not be classified `Unknown` and should carry
/// a bounded recommendation list.
#[test]
fn e4_mixed_job_has_bounded_recommendations() {
    let mut agg = Aggregator::new();
    let pid = Pid(400);
    let tid = Tid(400);
    let uid = Uid(1000);

    for i in 0..50 {
        let base = i * 20;
        agg.fold(RawEvent::SchedSwitch { prev_pid: Pid(0), next_pid: pid, prev_state: 0, ts: base });
        agg.fold(RawEvent::SchedSwitch {
            prev_pid: pid,
            next_pid: Pid(0),
            prev_state: 0,
            ts: base + 10,
        });
        agg.fold(RawEvent::SyscallEnter { pid, tid, uid, syscall_id: 0, ts: base });
        agg.fold(RawEvent::SyscallExit { pid, tid, uid, syscall_id: 0, ts: base + 2 });
    }

    let pids = pid_set(&[400]);
    let metrics = JobMetrics::fold(agg.snapshot(), &pids);
    let classification = classifier::classify(&metrics, &Thresholds::default());

    assert_ne!(classification.label, Label::Unknown);
    assert!(classification.recommendations.len() <= 10);
}

/// E5: resolving the same job id twice within the TTL window must not
/// re-invoke the scheduler, and the returned PID set must be stable.
#[test]
fn e5_resolver_cache_is_stable_within_ttl() {
    let config = ResolverConfig {
        squeue_cmd: "hpcmon-test-no-such-squeue".to_string(),
        sstat_cmd: "hpcmon-test-no-such-sstat".to_string(),
        sacct_cmd: "hpcmon-test-no-such-sacct".to_string(),
        subprocess_timeout: std::time::Duration::from_millis(200),
        ..ResolverConfig::default()
    };
    let mut resolver = Resolver::new(config);
    let job_id = hpcmon::domain::JobId::from("J42");
    let now = std::time::Instant::now();

    let first = resolver.resolve(&job_id, now);
    let second = resolver.resolve(&job_id, now);

    assert_eq!(first, second);
    assert_eq!(resolver.stats().scheduler_invocations, 1);
}

/// E6: a monitoring session with zero attached probes still produces a
/// well-formed, round-trippable report. Privilege enforcement itself is
/// covered by running the real pre-flight check: in an unprivileged test
/// environment it must reject with `ProbeError::Privilege`; running as
/// root here is an environment choice, not a code path this test can
/// force, so both outcomes are accepted and only the privileged path is
/// asserted against.
#[test]
fn e6_preflight_rejects_without_privilege_or_succeeds_as_root() {
    #[allow(unsafe_code)]
    let is_root = unsafe { libc::geteuid() } == 0;
    let result = preflight::run_preflight_checks();
    if is_root {
        // Kernel version on the test host may still fail this; either
        // outcome is acceptable as long as it doesn't panic.
        let _ = result;
    } else {
        assert!(matches!(result, Err(hpcmon::domain::ProbeError::Privilege)));
    }
}

#[test]
fn report_round_trips_for_a_multi_job_session() {
    let metrics_a = JobMetrics { total_syscalls: 100, cpu_percent: 90.0, ..JobMetrics::default() };
    let metrics_b = JobMetrics { total_syscalls: 100, io_percent: 60.0, ..JobMetrics::default() };

    let class_a = classifier::classify(&metrics_a, &Thresholds::default());
    let class_b = classifier::classify(&metrics_b, &Thresholds::default());

    let report = Report {
        monitoring_session: MonitoringSession {
            start_time: "2026-07-31T00:00:00+00:00".to_string(),
            end_time: "2026-07-31T00:05:00+00:00".to_string(),
            duration_seconds: 300.0,
        },
        jobs: vec![
            JobReport::new("1", "alice", "job-a", "batch", vec!["node01".into()], 300.0, metrics_a, &class_a),
            JobReport::new("2", "bob", "job-b", "batch", vec!["node02".into()], 300.0, metrics_b, &class_b),
        ],
    };

    let mut buf = Vec::new();
    report.export(&mut buf).unwrap();
    let parsed: Report = serde_json::from_slice(&buf).unwrap();
    assert_eq!(report, parsed);
    assert_eq!(parsed.jobs.len(), 2);
}
