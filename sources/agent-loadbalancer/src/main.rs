/*!
# Introduction

agent-loadbalancer controls and reports on the agent's client-side load balancer, which spreads
the agent's connections to the supervisor across the known servers.

# Usage

```text
agent-loadbalancer status [--data-dir <dir>]
```

`status` prints the server URL the load balancer fronts and the server addresses it currently
balances across, as persisted in the data directory.
*/

#[macro_use]
extern crate log;

mod status;

use argh::FromArgs;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use snafu::ResultExt;
use std::path::PathBuf;
use std::process;

const DEFAULT_DATA_DIR: &str = "/var/lib/rancher/k3s";

/// Control and get status of the agent load balancer
#[derive(Debug, FromArgs)]
struct Args {
    /// log-level trace|debug|info|warn|error
    #[argh(option, default = "LevelFilter::Warn")]
    log_level: LevelFilter,

    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Status(StatusArgs),
}

#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "status")]
/// Print current status of the load balancer
struct StatusArgs {
    /// folder to hold state
    #[argh(option, short = 'd', default = "DEFAULT_DATA_DIR.into()")]
    data_dir: PathBuf,
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();

    // Log to stderr so that status output on stdout stays clean.
    TermLogger::init(
        args.log_level,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Never,
    )
    .context(error::LoggingSetupSnafu)?;

    match args.subcommand {
        Subcommand::Status(StatusArgs { data_dir }) => {
            let state = status::load(&data_dir, status::LOAD_BALANCER_NAME)
                .context(error::StatusSnafu)?;
            print!("{}", state);
        }
    }
    Ok(())
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Failed to initialize logging: '{}'", source))]
        LoggingSetup { source: log::SetLoggerError },

        #[snafu(display("{}", source))]
        Status { source: crate::status::error::Error },
    }
}

type Result<T> = std::result::Result<T, error::Error>;
