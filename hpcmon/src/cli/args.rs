//! CLI argument definitions (§6 pinned surface).

use std::path::PathBuf;

use clap::Parser;

use crate::probe::Filter;

#[derive(Parser, Debug)]
#[command(
    name = "hpcmon",
    about = "Kernel-event collector and per-job workload classifier for HPC clusters",
    after_help = "\
EXAMPLES:
    sudo hpcmon --job-id 1234 --duration 300 --output report.json
    sudo hpcmon --user alice --real-time
    sudo hpcmon --job-id 1234 --config hpcmon.yaml"
)]
pub struct Args {
    /// Monitor a single job id (mutually exclusive with --user)
    #[arg(long, conflicts_with = "user")]
    pub job_id: Option<String>,

    /// Monitor every running job owned by this user (mutually exclusive with --job-id)
    #[arg(long, conflicts_with = "job_id")]
    pub user: Option<String>,

    /// Stop after N seconds (omit for indefinite, terminated by signal)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Write the JSON report to this path instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Optional YAML config file (CLI flags override its values)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use the 2s live tick interval instead of the 5s batch default
    #[arg(long)]
    pub real_time: bool,

    /// Probe subset to attach
    #[arg(long, default_value = "all")]
    pub filter: Filter,

    /// Raise the log level one step (info -> debug), independent of RUST_LOG
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_and_user_are_mutually_exclusive() {
        let result = Args::try_parse_from(["hpcmon", "--job-id", "1", "--user", "alice"]);
        assert!(result.is_err());
    }

    #[test]
    fn defaults_to_all_filter() {
        let args = Args::try_parse_from(["hpcmon"]).unwrap();
        assert_eq!(args.filter, Filter::All);
    }
}
