//! Reads the state the agent's client-side load balancer persists under the data directory, and
//! formats it for display.

use serde::Deserialize;
use snafu::ResultExt;
use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the agent's load balancer; the state file is named after it.
pub(crate) const LOAD_BALANCER_NAME: &str = "k3s-agent-load-balancer";

/// The persisted load balancer state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct LoadBalancerState {
    #[serde(rename = "ServerURL", default)]
    pub(crate) server_url: String,
    #[serde(rename = "ServerAddresses", default)]
    pub(crate) server_addresses: Vec<String>,
}

impl Display for LoadBalancerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server URL: {}", self.server_url)?;
        if self.server_addresses.is_empty() {
            writeln!(f, "Server addresses: none")?;
        } else {
            writeln!(f, "Server addresses:")?;
            for address in &self.server_addresses {
                writeln!(f, "  {}", address)?;
            }
        }
        Ok(())
    }
}

/// Path of the state file for `name` under `data_dir`.
pub(crate) fn state_path<P: AsRef<Path>>(data_dir: P, name: &str) -> PathBuf {
    data_dir
        .as_ref()
        .join("agent")
        .join("etc")
        .join(format!("{}.json", name))
}

/// Loads the state of the load balancer `name` from `data_dir`.
pub(crate) fn load<P: AsRef<Path>>(data_dir: P, name: &str) -> Result<LoadBalancerState> {
    let path = state_path(data_dir, name);
    debug!("Reading load balancer state from {}", path.display());
    let contents = fs::read_to_string(&path).context(error::StateReadSnafu { path: &path })?;
    serde_json::from_str(&contents).context(error::StateParseSnafu { path })
}

pub(crate) mod error {
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display(
            "Unable to read load balancer state from {}, is the agent running? {}",
            path.display(),
            source
        ))]
        StateRead { path: PathBuf, source: io::Error },

        #[snafu(display("Invalid load balancer state in {}: {}", path.display(), source))]
        StateParse {
            path: PathBuf,
            source: serde_json::Error,
        },
    }
}

type Result<T> = std::result::Result<T, error::Error>;
