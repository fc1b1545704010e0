//! The data handed to the containerd templates.
//!
//! Every field is serialized, including unset optional ones, so that the templates always see a
//! key.  The registry runs in strict mode; a `null` is falsy in a conditional and renders as an
//! empty string, while a key that doesn't exist at all fails the render.  Maps are `BTreeMap` so
//! that iteration in the templates happens in key order and identical inputs produce identical
//! output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use url::Url;

/// Everything needed to render containerd's `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub node_config: NodeConfig,
    pub disable_cgroup: bool,
    pub systemd_cgroup: bool,
    pub is_running_in_user_ns: bool,
    pub enable_unprivileged: bool,
    pub nonroot_devices: bool,
    pub private_registry_config: Option<Registry>,
    /// Additional runtime classes, keyed by the name containerd knows them by.
    pub extra_runtimes: BTreeMap<String, RuntimeClass>,
    /// Name of the program that generated the file; only used in the header comment.
    pub program: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub containerd: ContainerdPaths,
    pub agent: AgentConfig,
    pub selinux: bool,
    pub default_runtime: Option<String>,
    /// Set when the node's pod network isn't managed by the built-in CNI, in which case the CNI
    /// paths are left to containerd's defaults.
    pub no_flannel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerdPaths {
    pub root: String,
    pub state: String,
    pub opt: String,
    /// Directory holding the per-registry `hosts.toml` files.
    pub registry: String,
    pub block_io_config: Option<String>,
    pub rdt_config: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub pause_image: Option<String>,
    pub snapshotter: Option<String>,
    pub image_service_socket: Option<String>,
    pub cni_bin_dir: String,
    pub cni_conf_dir: String,
}

/// Private registry settings, keyed by registry host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    pub configs: BTreeMap<String, RegistryConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub auth: Option<AuthConfig>,
    pub tls: Option<TlsConfig>,
}

/// Credentials for a registry.  The fields are independent of each other; any subset may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Base64 encoded `username:password`.
    pub auth: Option<String>,
    pub identity_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeClass {
    pub runtime_type: String,
    pub binary_name: String,
}

/// Everything needed to render one registry's `hosts.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// The upstream registry itself, used when none of the endpoints answer.
    pub default: Option<RegistryEndpoint>,
    pub program: String,
    /// Mirrors, in the order containerd should try them.
    pub endpoints: Vec<RegistryEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryEndpoint {
    pub override_path: bool,
    pub url: Option<EndpointUrl>,
    /// Repository rewrites, regex pattern to replacement.
    pub rewrites: BTreeMap<String, String>,
    pub config: RegistryConfig,
}

/// An endpoint URL that must parse, but that renders exactly as it was written.  containerd
/// derives mirror paths from this text, so it's never normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl {
    raw: String,
    parsed: Url,
}

impl EndpointUrl {
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(input)?;
        Ok(Self {
            raw: input.to_string(),
            parsed,
        })
    }

    /// The URL as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }

    pub fn host_str(&self) -> Option<&str> {
        self.parsed.host_str()
    }
}

impl FromStr for EndpointUrl {
    type Err = url::ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for EndpointUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for EndpointUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(|e| {
            serde::de::Error::custom(format!("invalid endpoint URL '{}': {}", raw, e))
        })
    }
}
