//! Layered configuration: CLI flags over an optional YAML file over
//! compiled-in defaults (§1a).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::classifier::Thresholds;
use crate::domain::errors::ConfigError;
use crate::resolver::ResolverConfig;

/// Deserialized verbatim from YAML; every field is optional so a config
/// file only needs to mention what it overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub batch_interval_secs: Option<u64>,
    pub live_interval_secs: Option<u64>,
    pub resolver_ttl_secs: Option<u64>,
    pub resolver_timeout_secs: Option<u64>,
    pub pseudo_job_cap: Option<usize>,
    pub cpu_hi: Option<f64>,
    pub io_hi: Option<f64>,
    pub idle_hi: Option<f64>,
    pub ctx_hi: Option<u64>,
    pub squeue_cmd: Option<String>,
    pub sstat_cmd: Option<String>,
    pub sacct_cmd: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

/// Fully resolved configuration: defaults, overridden by an optional YAML
/// file, overridden by CLI flags at the call site (the CLI layer applies
/// its own overrides after `Config::from_file`).
#[derive(Debug, Clone)]
pub struct Config {
    pub batch_interval: Duration,
    pub live_interval: Duration,
    pub resolver: ResolverConfig,
    pub thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            batch_interval: Duration::from_secs(5),
            live_interval: Duration::from_secs(2),
            resolver: ResolverConfig::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl Config {
    /// Load `Config::default()` and fold a `ConfigFile` on top when `path`
    /// is given. A missing or unparsable file is treated as fatal per §7's
    /// startup error reporting (an explicitly-requested config that can't
    /// be read is not the "resolver fallthrough" kind of recoverable).
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        if let Some(path) = path {
            let file = ConfigFile::load(path)?;
            config.apply(&file);
        }
        Ok(config)
    }

    fn apply(&mut self, file: &ConfigFile) {
        if let Some(v) = file.batch_interval_secs {
            self.batch_interval = Duration::from_secs(v);
        }
        if let Some(v) = file.live_interval_secs {
            self.live_interval = Duration::from_secs(v);
        }
        if let Some(v) = file.resolver_ttl_secs {
            self.resolver.ttl = Duration::from_secs(v);
        }
        if let Some(v) = file.resolver_timeout_secs {
            self.resolver.subprocess_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.pseudo_job_cap {
            self.resolver.pseudo_job_cap = v;
        }
        if let Some(v) = file.cpu_hi {
            self.thresholds.cpu_hi = v;
        }
        if let Some(v) = file.io_hi {
            self.thresholds.io_hi = v;
        }
        if let Some(v) = file.idle_hi {
            self.thresholds.idle_hi = v;
        }
        if let Some(v) = file.ctx_hi {
            self.thresholds.ctx_hi = v;
        }
        if let Some(v) = &file.squeue_cmd {
            self.resolver.squeue_cmd = v.clone();
        }
        if let Some(v) = &file.sstat_cmd {
            self.resolver.sstat_cmd = v.clone();
        }
        if let Some(v) = &file.sacct_cmd {
            self.resolver.sacct_cmd = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_yields_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.batch_interval, Duration::from_secs(5));
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cpu_hi: 80.0\nresolver_ttl_secs: 60").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.thresholds.cpu_hi, 80.0);
        assert_eq!(config.resolver.ttl, Duration::from_secs(60));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not_a_real_field: 1").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
