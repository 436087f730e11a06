// Main function is intentionally long for clarity: it is the single
// coordinator task that owns every tick of the pipeline.
#![allow(clippy::too_many_lines)]

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::time::{Duration, Instant};

use chrono::Utc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use hpcmon::aggregator::Aggregator;
use hpcmon::cli::Args;
use hpcmon::classifier::{self, Classification};
use hpcmon::config::Config;
use hpcmon::domain::JobId;
use hpcmon::export::{JobReport, MonitoringSession, Report};
use hpcmon::metrics::JobMetrics;
use hpcmon::preflight;
use hpcmon::probe::ProbeRuntime;
use hpcmon::resolver::Resolver;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(e) = preflight::run_preflight_checks() {
        error!("{e}");
        std::process::exit(1);
    }

    let config = Config::load(args.config.as_deref()).context("failed to load --config file")?;
    let tick_interval = if args.real_time { config.live_interval } else { config.batch_interval };

    let mut probe = match ProbeRuntime::load(args.filter) {
        Ok(probe) => probe,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    for warning in &probe.stats().attach_warnings {
        warn!("{warning}");
    }
    info!("attached probes for filter {:?}", probe.filter());

    let mut aggregator = Aggregator::new();
    let mut resolver = Resolver::new(config.resolver.clone());

    let session_start = Instant::now();
    let session_start_wall = Utc::now();
    let duration_limit = args.duration.map(Duration::from_secs);
    let mut ticker = tokio::time::interval(tick_interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_reports: HashMap<JobId, JobReport> = HashMap::new();

    loop {
        probe.poll(&mut aggregator);

        if let Some(limit) = duration_limit {
            if session_start.elapsed() >= limit {
                info!("duration limit reached, shutting down");
                break;
            }
        }

        tokio::select! {
            _ = ticker.tick() => {
                let job_ids = active_job_ids(&resolver, &args);
                let now = Instant::now();
                let mut keep_pids = HashSet::new();

                for job_id in &job_ids {
                    let pids = resolver.resolve(job_id, now);
                    keep_pids.extend(pids.iter().copied());

                    let metrics = JobMetrics::fold(aggregator.snapshot(), &pids);
                    let classification = classifier::classify(&metrics, &config.thresholds);
                    let descriptor = resolver.job_info(job_id).into_iter().next();

                    last_reports.insert(
                        job_id.clone(),
                        build_report(job_id, &descriptor, session_start, metrics, &classification),
                    );
                }

                aggregator.evict_stale(&keep_pids, aggregator.current_ns(), config.resolver.ttl.as_nanos() as u64);
            }
            _ = &mut ctrl_c => {
                info!("received shutdown signal");
                break;
            }
        }
    }

    probe.cleanup();

    let report = Report {
        monitoring_session: MonitoringSession {
            start_time: session_start_wall.to_rfc3339(),
            end_time: Utc::now().to_rfc3339(),
            duration_seconds: session_start.elapsed().as_secs_f64(),
        },
        jobs: last_reports.into_values().collect(),
    };

    match args.output {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            report.export(BufWriter::new(file))?;
        }
        None => {
            report.export(std::io::stdout())?;
            println!();
        }
    }

    Ok(())
}

fn active_job_ids(resolver: &Resolver, args: &Args) -> Vec<JobId> {
    if let Some(job_id) = &args.job_id {
        return vec![JobId::from(job_id.as_str())];
    }
    if let Some(user) = &args.user {
        return resolver.list_user(user).into_iter().map(|j| j.job_id).collect();
    }
    resolver.list_running().into_iter().map(|j| j.job_id).collect()
}

fn build_report(
    job_id: &JobId,
    descriptor: &Option<hpcmon::resolver::JobDescriptor>,
    session_start: Instant,
    metrics: JobMetrics,
    classification: &Classification,
) -> JobReport {
    let (user, name, partition, nodes) = match descriptor {
        Some(d) => (d.user.clone(), d.name.clone(), d.partition.clone(), d.nodes.clone()),
        None => (String::new(), String::new(), String::new(), Vec::new()),
    };
    JobReport::new(
        job_id.0.clone(),
        user,
        name,
        partition,
        nodes,
        session_start.elapsed().as_secs_f64(),
        metrics,
        classification,
    )
}
