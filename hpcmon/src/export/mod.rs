//! Report export: serializes one monitoring session to the pinned JSON
//! schema (§6). Generic over `Write` the way the reference repo's trace
//! exporter is, so callers can target a file, a socket, or an in-memory
//! buffer in tests without duplicating the serialization path.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::domain::errors::ReportError;
use crate::metrics::JobMetrics;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringSession {
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobReport {
    pub job_id: String,
    pub user: String,
    pub job_name: String,
    pub partition: String,
    pub nodes: Vec<String>,
    pub duration_seconds: f64,
    pub metrics: JobMetrics,
    pub classification: String,
    pub efficiency_score: f64,
    pub recommendations: Vec<String>,
}

impl JobReport {
    #[must_use]
    pub fn new(
        job_id: impl Into<String>,
        user: impl Into<String>,
        job_name: impl Into<String>,
        partition: impl Into<String>,
        nodes: Vec<String>,
        duration_seconds: f64,
        metrics: JobMetrics,
        classification: &Classification,
    ) -> Self {
        JobReport {
            job_id: job_id.into(),
            user: user.into(),
            job_name: job_name.into(),
            partition: partition.into(),
            nodes,
            duration_seconds,
            metrics,
            classification: classification.label.to_string(),
            efficiency_score: classification.score,
            recommendations: classification.recommendations.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub monitoring_session: MonitoringSession,
    pub jobs: Vec<JobReport>,
}

impl Report {
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;

    fn sample_report() -> Report {
        Report {
            monitoring_session: MonitoringSession {
                start_time: "2026-01-01T00:00:00Z".to_string(),
                end_time: "2026-01-01T00:05:00Z".to_string(),
                duration_seconds: 300.0,
            },
            jobs: vec![JobReport::new(
                "123",
                "alice",
                "my-job",
                "batch",
                vec!["node01".to_string()],
                300.0,
                JobMetrics { total_syscalls: 10, ..JobMetrics::default() },
                &Classification {
                    label: Label::Balanced,
                    score: 42.0,
                    recommendations: vec!["monitor".to_string()],
                },
            )],
        }
    }

    #[test]
    fn round_trips_through_json() {
        let report = sample_report();
        let mut buf = Vec::new();
        report.export(&mut buf).unwrap();
        let parsed: Report = serde_json::from_slice(&buf).unwrap();
        assert_eq!(report, parsed);
    }
}
