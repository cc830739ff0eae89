//! Configuration for the scheduler.

use std::time::Duration;

use anyhow::{Context, Result};
use mesos_solr_resources::ResourceRequirement;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Candidate masters as `host:port`, tried in order.
    pub masters: Vec<String>,

    /// Registered framework name.
    pub framework_name: String,

    /// User the framework and its tasks run as.
    pub user: String,

    /// Ask the agents to checkpoint framework state.
    pub checkpoint: bool,

    /// Task name, also used as the task id prefix.
    pub task_name: String,

    /// Shell command launched on accepted offers.
    pub task_command: String,

    /// Minimum resources an offer must carry.
    pub requirement: ResourceRequirement,

    /// Full passes over the master list before `connect` gives up.
    pub subscribe_attempts: u32,

    /// Timeout for calls other than the subscription stream.
    pub request_timeout: Duration,

    /// Send TEARDOWN instead of just leaving when interrupted.
    pub teardown_on_exit: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            masters: vec!["127.0.0.1:5050".to_string()],
            framework_name: "mesos-solr".to_string(),
            user: "mesos-default".to_string(),
            checkpoint: true,
            task_name: "solrcloud".to_string(),
            task_command: "echo foo && sleep 300".to_string(),
            requirement: ResourceRequirement::default_profile(),
            subscribe_attempts: 3,
            request_timeout: Duration::from_secs(10),
            teardown_on_exit: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let masters = match lookup("MESOS_SOLR_MASTERS") {
            Some(raw) => parse_masters(&raw)?,
            None => defaults.masters,
        };

        let checkpoint = lookup("MESOS_SOLR_CHECKPOINT")
            .map(|s| s.parse::<bool>())
            .transpose()
            .context("MESOS_SOLR_CHECKPOINT must be true or false")?
            .unwrap_or(defaults.checkpoint);

        let teardown_on_exit = parse_var(&lookup, "MESOS_SOLR_TEARDOWN_ON_EXIT")?
            .unwrap_or(defaults.teardown_on_exit);

        let cpus = parse_var::<f64>(&lookup, "MESOS_SOLR_CPUS")?.unwrap_or(1.0);
        let mem = parse_var::<f64>(&lookup, "MESOS_SOLR_MEM")?.unwrap_or(1024.0);

        let subscribe_attempts = parse_var(&lookup, "MESOS_SOLR_SUBSCRIBE_ATTEMPTS")?
            .unwrap_or(defaults.subscribe_attempts)
            .max(1);

        let request_timeout = parse_var(&lookup, "MESOS_SOLR_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            masters,
            framework_name: lookup("MESOS_SOLR_FRAMEWORK_NAME").unwrap_or(defaults.framework_name),
            user: lookup("MESOS_SOLR_USER").unwrap_or(defaults.user),
            checkpoint,
            task_name: lookup("MESOS_SOLR_TASK_NAME").unwrap_or(defaults.task_name),
            task_command: lookup("MESOS_SOLR_TASK_COMMAND").unwrap_or(defaults.task_command),
            requirement: ResourceRequirement::new().with("cpus", cpus).with("mem", mem),
            subscribe_attempts,
            request_timeout,
            teardown_on_exit,
            log_level: lookup("MESOS_SOLR_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("Invalid value for {key}"))
}

fn parse_masters(raw: &str) -> Result<Vec<String>> {
    let masters: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if masters.is_empty() {
        anyhow::bail!("MESOS_SOLR_MASTERS must name at least one master");
    }

    Ok(masters)
}
