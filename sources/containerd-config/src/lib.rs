/*!
# Introduction

containerd-config compiles a structured description of a node's container runtime settings into
the TOML files containerd reads: the main `config.toml`, and a `hosts.toml` per image registry.

Rendering is done with [handlebars](https://docs.rs/handlebars) templates.  A
[`TemplateEngine`] is built once, with strict mode enabled and the TOML helpers from the
`helpers` module registered, and is then handed to a renderer:

* [`RuntimeConfigRenderer`] renders a [`RuntimeConfig`].  Its engine carries the built-in
  configuration as the partial `base`, which a user-supplied body can include with
  `{{> base}}`, extend, or replace.
* [`HostsConfigRenderer`] renders a [`HostConfig`] from a complete body, normally
  [`HOSTS_TEMPLATE`].

Both return the rendered text; writing it out is up to the caller.  Map-typed settings are
iterated in key order, so identical input always produces identical output.
*/

#[macro_use]
extern crate log;

pub mod containerd;
pub mod engine;
mod helpers;
pub mod hosts;
pub mod input;
pub mod model;

pub use containerd::{RuntimeConfigRenderer, BASE_TEMPLATE, DEFAULT_TEMPLATE};
pub use engine::{Error, Result, TemplateEngine};
pub use hosts::{HostsConfigRenderer, HOSTS_TEMPLATE};
pub use model::{
    AgentConfig, AuthConfig, ContainerdPaths, EndpointUrl, HostConfig, NodeConfig, Registry,
    RegistryConfig, RegistryEndpoint, RuntimeClass, RuntimeConfig, TlsConfig,
};
