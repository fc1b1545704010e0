/*!
Installs the CNI plugin binaries shipped in the multus image onto a node.

The installer doesn't know which image to use up front.  It waits for the multus DaemonSet to
show up with its `cni-plugins` init container, reusing that container's image for a one-shot Job
pinned to the node.  The Job copies the binaries into the node's CNI directory.

Discovery is bounded: it gives up with [`Error::DiscoveryTimeout`] once the configured timeout
elapses and with [`Error::DiscoveryCancelled`] as soon as the caller's cancellation token fires.
Neither case ever yields an image, so no Job is created for them.
*/

use crate::cluster::{ApiError, ClusterApi};
use crate::config::{FailurePolicy, InstallerConfig};
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, HostPathVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use maplit::btreemap;
use snafu::{ensure, ResultExt};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// The container in the Job that runs the multus image.
const CONTAINER_NAME: &str = "multus";
const CNI_VOLUME_NAME: &str = "cni-path";
/// Where the multus image expects the host's CNI directory.
const CNI_MOUNT_PATH: &str = "/host/opt/cni/bin";
/// Binaries the multus image shouldn't install, because the node already provides them.
const SKIP_CNI_BINARIES: &str = "flannel";
const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

pub struct MultusInstaller<C> {
    client: C,
    config: InstallerConfig,
}

impl<C> MultusInstaller<C>
where
    C: ClusterApi,
{
    pub fn new(client: C, config: InstallerConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Discovers the image and submits the Job, applying the configured [`FailurePolicy`] to
    /// any error.  Returns the created Job, or `None` if an error was logged instead.
    pub async fn install(&self, cancel: &CancellationToken) -> Result<Option<Job>> {
        match self.try_install(cancel).await {
            Ok(job) => Ok(Some(job)),
            Err(e) => match self.config.failure_policy {
                FailurePolicy::Propagate => Err(e),
                FailurePolicy::LogOnly => {
                    error!("Failed to install multus: {}", e);
                    Ok(None)
                }
            },
        }
    }

    async fn try_install(&self, cancel: &CancellationToken) -> Result<Job> {
        ensure!(!self.config.node_name.is_empty(), error::MissingNodeNameSnafu);

        let image = self.discover_image(cancel).await?;
        let job = generate_job(&self.config, &image);

        info!(
            "Creating job {}/{} on node {}",
            self.config.namespace, self.config.job_name, self.config.node_name
        );
        match self.client.create_job(&self.config.namespace, &job).await {
            Ok(job) => Ok(job),
            Err(ApiError::AlreadyExists) => error::JobExistsSnafu {
                namespace: &self.config.namespace,
                name: &self.config.job_name,
            }
            .fail(),
            Err(e) => Err(e).context(error::RemoteApiSnafu {
                operation: "create job",
            }),
        }
    }

    /// Polls the DaemonSet until its init container reports an image, the timeout elapses, or
    /// `cancel` fires.
    ///
    /// Expiry and cancellation are reported as `DiscoveryTimeout` and `DiscoveryCancelled`;
    /// [`Error::is_timeout`] is true for both.
    pub async fn discover_image(&self, cancel: &CancellationToken) -> Result<String> {
        debug!(
            "Waiting up to {:?} for init container '{}' in daemonset {}/{}",
            self.config.timeout,
            self.config.init_container,
            self.config.namespace,
            self.config.daemon_set
        );
        tokio::select! {
            _ = cancel.cancelled() => error::DiscoveryCancelledSnafu {
                daemon_set: &self.config.daemon_set,
            }
            .fail(),
            result = timeout(self.config.timeout, self.poll_for_image()) => {
                result.context(error::DiscoveryTimeoutSnafu {
                    daemon_set: &self.config.daemon_set,
                    timeout: self.config.timeout,
                })?
            }
        }
    }

    /// Re-reads the DaemonSet at the poll interval until the image is found.  A DaemonSet that
    /// doesn't exist yet is waited for; any other API error ends the poll.
    async fn poll_for_image(&self) -> Result<String> {
        loop {
            let daemon_set = self
                .client
                .get_daemon_set(&self.config.namespace, &self.config.daemon_set)
                .await
                .context(error::RemoteApiSnafu {
                    operation: "get daemonset",
                })?;

            match daemon_set {
                Some(daemon_set) => {
                    if let Some(image) =
                        init_container_image(&daemon_set, &self.config.init_container)
                    {
                        info!("Found multus image {}", image);
                        return Ok(image);
                    }
                    debug!(
                        "Init container '{}' not found in daemonset {}, retrying in {:?}",
                        self.config.init_container,
                        self.config.daemon_set,
                        self.config.poll_interval
                    );
                }
                None => debug!(
                    "Daemonset {} not found, retrying in {:?}",
                    self.config.daemon_set, self.config.poll_interval
                ),
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

/// The image of the named init container, if the DaemonSet has one with an image set.
fn init_container_image(daemon_set: &DaemonSet, name: &str) -> Option<String> {
    daemon_set
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .init_containers
        .as_ref()?
        .iter()
        .find(|container| container.name == name)?
        .image
        .clone()
        .filter(|image| !image.is_empty())
}

/// Builds the Job that runs `image` on the configured node with the host's CNI directory
/// mounted.
pub fn generate_job(config: &InstallerConfig, image: &str) -> Job {
    Job {
        metadata: ObjectMeta {
            name: Some(config.job_name.clone()),
            namespace: Some(config.namespace.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(image.to_string()),
                        env: Some(vec![EnvVar {
                            name: "SKIP_CNI_BINARIES".to_string(),
                            value: Some(SKIP_CNI_BINARIES.to_string()),
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: CNI_VOLUME_NAME.to_string(),
                            mount_path: CNI_MOUNT_PATH.to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    node_selector: Some(btreemap! {
                        HOSTNAME_LABEL.to_string() => config.node_name.clone(),
                    }),
                    restart_policy: Some("Never".to_string()),
                    volumes: Some(vec![Volume {
                        name: CNI_VOLUME_NAME.to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: config.cni_bin_dir.display().to_string(),
                            type_: Some("DirectoryOrCreate".to_string()),
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub mod error {
    use crate::cluster::ApiError;
    use snafu::Snafu;
    use std::time::Duration;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Discovery of the image in daemonset {} was cancelled", daemon_set))]
        DiscoveryCancelled { daemon_set: String },

        #[snafu(display(
            "Timed out after {:?} waiting for the image in daemonset {}",
            timeout,
            daemon_set
        ))]
        DiscoveryTimeout {
            daemon_set: String,
            timeout: Duration,
            source: tokio::time::error::Elapsed,
        },

        #[snafu(display("Job {}/{} already exists", namespace, name))]
        JobExists { namespace: String, name: String },

        #[snafu(display("No node name given to pin the job to"))]
        MissingNodeName,

        #[snafu(display("Failed to {}: {}", operation, source))]
        RemoteApi {
            operation: &'static str,
            source: ApiError,
        },
    }
}

pub use error::Error;

impl Error {
    /// Whether discovery gave up without finding an image, by deadline or by cancellation.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::DiscoveryTimeout { .. } | Error::DiscoveryCancelled { .. }
        )
    }
}
pub type Result<T> = std::result::Result<T, error::Error>;
