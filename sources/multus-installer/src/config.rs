//! The `config` module owns the settings that tell the installer where to find the reference
//! image and how to shape the Job it submits.  Settings are read from a TOML file; every key is
//! optional, and missing keys take the values the installer has always used.

use serde::{Deserialize, Deserializer};
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_NAMESPACE: &str = "kube-system";
const DEFAULT_DAEMON_SET: &str = "multus";
const DEFAULT_INIT_CONTAINER: &str = "cni-plugins";
const DEFAULT_JOB_NAME: &str = "multus";
const DEFAULT_CNI_BIN_DIR: &str = "/opt/cni/bin";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// What the installer does when it can't finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Return the error to the caller.
    #[default]
    Propagate,
    /// Log the error and report that nothing was installed.
    LogOnly,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InstallerConfig {
    /// Namespace holding both the DaemonSet and the Job.
    pub namespace: String,
    pub daemon_set: String,
    /// The init container of the DaemonSet whose image is reused for the Job.
    pub init_container: String,
    pub job_name: String,
    /// The node the Job is pinned to.
    pub node_name: String,
    /// Host directory the CNI binaries are installed into.
    pub cni_bin_dir: PathBuf,
    #[serde(deserialize_with = "deserialize_seconds")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "deserialize_seconds")]
    pub timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            daemon_set: DEFAULT_DAEMON_SET.to_string(),
            init_container: DEFAULT_INIT_CONTAINER.to_string(),
            job_name: DEFAULT_JOB_NAME.to_string(),
            node_name: String::new(),
            cni_bin_dir: PathBuf::from(DEFAULT_CNI_BIN_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl InstallerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).context(error::ReadConfigSnafu { path })?;
        toml::from_str(&contents).context(error::ParseConfigSnafu { path })
    }
}

/// Reads a duration given as a (possibly fractional) number of seconds.
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let seconds = f64::deserialize(deserializer)?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(D::Error::custom(format!(
            "expected a non-negative number of seconds, got {}",
            seconds
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

pub mod error {
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Failed to read config file {}: {}", path.display(), source))]
        ReadConfig { path: PathBuf, source: io::Error },

        #[snafu(display("Invalid config file {}: {}", path.display(), source))]
        ParseConfig {
            path: PathBuf,
            source: toml::de::Error,
        },
    }
}

pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
