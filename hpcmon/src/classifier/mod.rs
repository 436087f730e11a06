//! Classifier: a pure function from `JobMetrics` to `Classification` (§4.5).

use serde::{Deserialize, Serialize};

use crate::metrics::JobMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    CpuBound,
    CpuIoMixed,
    IoBound,
    IoBoundIntensive,
    IdleHeavy,
    IdleHeavySwitching,
    MixedIntensive,
    Balanced,
    Unknown,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Label::CpuBound => "CpuBound",
            Label::CpuIoMixed => "CpuIoMixed",
            Label::IoBound => "IoBound",
            Label::IoBoundIntensive => "IoBoundIntensive",
            Label::IdleHeavy => "IdleHeavy",
            Label::IdleHeavySwitching => "IdleHeavySwitching",
            Label::MixedIntensive => "MixedIntensive",
            Label::Balanced => "Balanced",
            Label::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub score: f64,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub cpu_hi: f64,
    pub io_hi: f64,
    pub idle_hi: f64,
    pub ctx_hi: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds { cpu_hi: 70.0, io_hi: 30.0, idle_hi: 50.0, ctx_hi: 1000 }
    }
}

#[must_use]
pub fn classify(metrics: &JobMetrics, thresholds: &Thresholds) -> Classification {
    let label = classify_label(metrics, thresholds);
    let score = efficiency_score(metrics);
    let recommendations = recommend(metrics, label, thresholds);
    Classification { label, score, recommendations }
}

fn classify_label(m: &JobMetrics, t: &Thresholds) -> Label {
    if m.total_syscalls == 0 {
        return Label::Unknown;
    }
    if m.cpu_percent >= t.cpu_hi {
        return if m.io_percent < 10.0 { Label::CpuBound } else { Label::CpuIoMixed };
    }
    if m.io_percent >= t.io_hi {
        return if m.context_switches > t.ctx_hi { Label::IoBoundIntensive } else { Label::IoBound };
    }
    if m.wait_percent >= t.idle_hi {
        return if m.context_switches > t.ctx_hi { Label::IdleHeavySwitching } else { Label::IdleHeavy };
    }
    if m.context_switches > t.ctx_hi {
        Label::MixedIntensive
    } else {
        Label::Balanced
    }
}

/// Verbatim port of the pinned piecewise formula (§4.5); the discontinuities
/// at `io_percent == 5` and `== 50` are a known artifact, not a bug (§9).
fn efficiency_score(m: &JobMetrics) -> f64 {
    if m.total_syscalls == 0 {
        return 0.0;
    }

    let cpu_component = m.cpu_percent.min(100.0) * 0.4;

    let io_score = if m.io_percent < 5.0 {
        m.io_percent * 4.0
    } else if m.io_percent > 50.0 {
        (50.0 - (m.io_percent - 50.0)).max(0.0)
    } else {
        20.0
    };
    let io_component = io_score * 0.3;

    let wait_penalty = (m.wait_percent * 0.5).min(30.0);

    let ctx_penalty = if m.context_switches > 1000 {
        (((m.context_switches - 1000) as f64) / 1000.0 * 10.0).min(20.0)
    } else {
        0.0
    };

    (cpu_component + io_component - wait_penalty - ctx_penalty).clamp(0.0, 100.0)
}

/// Bounded (<=10), stable-ordered: label-primary rules first, then
/// secondary-signal rules (§4.5).
fn recommend(m: &JobMetrics, label: Label, _t: &Thresholds) -> Vec<String> {
    let mut out = Vec::new();

    match label {
        Label::CpuBound | Label::CpuIoMixed => {
            out.push("job is CPU-intensive, consider using more CPU cores".to_string());
            out.push("optimize algorithms for better CPU utilization".to_string());
            out.push("consider CPU affinity settings for better cache locality".to_string());
            if m.context_switches > 5000 {
                out.push(
                    "high context switching detected, check for unnecessary thread creation"
                        .to_string(),
                );
            }
        }
        Label::IoBound | Label::IoBoundIntensive => {
            out.push(
                "job is I/O intensive, consider faster storage or I/O optimization".to_string(),
            );
            out.push("use asynchronous I/O or buffering to improve performance".to_string());
            out.push("consider using SSDs or parallel file systems".to_string());
            if m.total_io_bytes > 1_000_000_000 {
                out.push("large I/O volume detected, consider data compression or caching".to_string());
            }
        }
        Label::IdleHeavy | Label::IdleHeavySwitching => {
            out.push("job has significant idle time, investigate bottlenecks".to_string());
            out.push("consider reducing resource allocation if consistently idle".to_string());
            out.push("check for synchronization issues or external dependencies".to_string());
        }
        Label::MixedIntensive => {
            out.push("job has mixed workload with high activity".to_string());
            out.push("consider hybrid optimization strategies".to_string());
            out.push("monitor resource usage patterns for fine-tuning".to_string());
        }
        Label::Balanced | Label::Unknown => {}
    }

    if m.net_operations > 1000 {
        out.push("high network activity detected, consider network optimization".to_string());
    }
    if m.context_switches > 10_000 {
        out.push("very high context switching, investigate thread/process management".to_string());
    }

    out.truncate(10);
    out
}
