/*!
# Introduction

multus-installer puts the CNI plugins that come with multus onto a node by running a Job built
from the image of the multus DaemonSet's `cni-plugins` init container.

The steps are in [`installer::MultusInstaller`]; cluster access goes through the
[`cluster::ClusterApi`] trait, which is implemented for `kube_client::Client`.  Settings come
from a TOML file described in [`config::InstallerConfig`].
*/

#[macro_use]
extern crate log;

pub mod cluster;
pub mod config;
pub mod installer;

pub use cluster::ClusterApi;
pub use config::{FailurePolicy, InstallerConfig};
pub use installer::{generate_job, MultusInstaller};
