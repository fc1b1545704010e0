//! Loads render inputs (a [`RuntimeConfig`](crate::RuntimeConfig) or
//! [`HostConfig`](crate::HostConfig)) from disk.  Files ending in `.json` are read as JSON and
//! everything else as TOML.

use serde::de::DeserializeOwned;
use snafu::ResultExt;
use std::fs;
use std::path::Path;

/// The document formats understood by [`load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Reads and deserializes the file at `path`, picking the format from its extension.
pub fn load<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    debug!("Reading input from {}", path.display());
    let contents = fs::read_to_string(path).context(error::ReadInputSnafu { path })?;
    parse(&contents, Format::from_path(path)).context(error::ParseInputSnafu { path })
}

/// Deserializes `contents` as the given format.
pub fn parse<T>(contents: &str, format: Format) -> std::result::Result<T, error::FormatError>
where
    T: DeserializeOwned,
{
    match format {
        Format::Json => serde_json::from_str(contents).context(error::JsonSnafu),
        Format::Toml => toml::from_str(contents).context(error::TomlSnafu),
    }
}

pub mod error {
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Failed to read input file '{}': {}", path.display(), source))]
        ReadInput { path: PathBuf, source: io::Error },

        #[snafu(display("Failed to parse input file '{}': {}", path.display(), source))]
        ParseInput { path: PathBuf, source: FormatError },
    }

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum FormatError {
        #[snafu(display("Invalid JSON: {}", source))]
        Json { source: serde_json::Error },

        #[snafu(display("Invalid TOML: {}", source))]
        Toml { source: toml::de::Error },
    }
}

pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
