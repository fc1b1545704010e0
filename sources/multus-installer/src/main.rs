//! multus-installer
//!
//! Waits for the multus DaemonSet and submits the Job that installs its CNI plugins onto this
//! node.  Ctrl-C cancels the wait.

#[macro_use]
extern crate log;

use argh::FromArgs;
use multus_installer::{cluster, InstallerConfig, MultusInstaller};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};
use snafu::ResultExt;
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;

/// Stores user-supplied arguments
#[derive(Debug, FromArgs)]
struct Args {
    /// log-level trace|debug|info|warn|error
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,

    /// path to the installer's TOML config file
    #[argh(option)]
    config: Option<PathBuf>,

    /// path to a kubeconfig; the in-cluster or $KUBECONFIG config is used otherwise
    #[argh(option)]
    kubeconfig: Option<PathBuf>,

    /// name of the node to install on, overriding the config file
    #[argh(option)]
    node_name: Option<String>,
}

async fn run() -> Result<()> {
    let args: Args = argh::from_env();

    SimpleLogger::init(args.log_level, LogConfig::default()).context(error::LoggingSetupSnafu)?;

    let mut config = match &args.config {
        Some(path) => InstallerConfig::from_file(path).context(error::ConfigSnafu)?,
        None => InstallerConfig::default(),
    };
    if let Some(node_name) = args.node_name {
        config.node_name = node_name;
    }

    let client = cluster::client(args.kubeconfig.as_deref())
        .await
        .context(error::ClientSnafu)?;
    let installer = MultusInstaller::new(client, config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match installer.install(&cancel).await.context(error::InstallSnafu)? {
        Some(job) => info!(
            "Created job {} on node {}",
            job.metadata.name.unwrap_or_default(),
            installer.config().node_name
        ),
        None => warn!("Multus was not installed"),
    }
    Ok(())
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", e);
        process::exit(1);
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("{}", source))]
        Client {
            source: multus_installer::cluster::Error,
        },

        #[snafu(display("{}", source))]
        Config {
            source: multus_installer::config::Error,
        },

        #[snafu(display("{}", source))]
        Install {
            source: multus_installer::installer::Error,
        },

        #[snafu(display("Failed to initialize logging: '{}'", source))]
        LoggingSetup { source: log::SetLoggerError },
    }
}

type Result<T> = std::result::Result<T, error::Error>;
