//! containerd-config
//!
//! Renders containerd's `config.toml` or a registry `hosts.toml` from a JSON or TOML description
//! of the node, and writes the result to stdout.

#[macro_use]
extern crate log;

use argh::FromArgs;
use containerd_config::{
    input, HostConfig, HostsConfigRenderer, RuntimeConfig, RuntimeConfigRenderer,
    DEFAULT_TEMPLATE, HOSTS_TEMPLATE,
};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};
use snafu::ResultExt;
use std::{fs, path::PathBuf, process};

/// Stores user-supplied arguments
#[derive(Debug, FromArgs)]
struct Args {
    /// log-level trace|debug|info|warn|error
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,

    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Render(RenderArgs),
    RenderHosts(RenderHostsArgs),
}

#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "render")]
/// Render containerd's config.toml
struct RenderArgs {
    /// JSON or TOML file describing the runtime configuration
    #[argh(option)]
    config: PathBuf,

    /// template to render instead of the built-in one; it can include the built-in config with {{> base}}
    #[argh(option)]
    template: Option<PathBuf>,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "render-hosts")]
/// Render a registry's hosts.toml
struct RenderHostsArgs {
    /// JSON or TOML file describing the registry hosts
    #[argh(option)]
    config: PathBuf,

    /// template to render instead of the built-in one
    #[argh(option)]
    template: Option<PathBuf>,
}

/// Reads the template at `path`, or returns `default` if there isn't one.
fn template_body(path: Option<PathBuf>, default: &str) -> Result<String> {
    match path {
        Some(path) => {
            debug!("Using template {}", path.display());
            fs::read_to_string(&path).context(error::TemplateReadSnafu { path })
        }
        None => Ok(default.to_string()),
    }
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();

    SimpleLogger::init(args.log_level, LogConfig::default()).context(error::LoggingSetupSnafu)?;

    let rendered = match args.subcommand {
        Subcommand::Render(RenderArgs { config, template }) => {
            let config: RuntimeConfig = input::load(&config).context(error::InputSnafu)?;
            let body = template_body(template, DEFAULT_TEMPLATE)?;
            RuntimeConfigRenderer::new()
                .context(error::RenderSnafu)?
                .render(&body, &config)
                .context(error::RenderSnafu)?
        }
        Subcommand::RenderHosts(RenderHostsArgs { config, template }) => {
            let config: HostConfig = input::load(&config).context(error::InputSnafu)?;
            let body = template_body(template, HOSTS_TEMPLATE)?;
            HostsConfigRenderer::default()
                .render(&body, &config)
                .context(error::RenderSnafu)?
        }
    };

    print!("{}", rendered);
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
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("{}", source))]
        Input {
            source: containerd_config::input::Error,
        },

        #[snafu(display("Failed to initialize logging: '{}'", source))]
        LoggingSetup { source: log::SetLoggerError },

        #[snafu(display("{}", source))]
        Render { source: containerd_config::Error },

        #[snafu(display("Failed to read template '{}': {}", path.display(), source))]
        TemplateRead {
            path: PathBuf,
            source: std::io::Error,
        },
    }
}

type Result<T> = std::result::Result<T, error::Error>;

