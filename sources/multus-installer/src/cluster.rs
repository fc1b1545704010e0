//! The `cluster` module owns the `ClusterApi` trait, the installer's only view of the
//! Kubernetes API, and its implementation on top of `kube_client`.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::batch::v1::Job;
use kube_client::api::{Api, PostParams};
use kube_client::config::{KubeConfigOptions, Kubeconfig};
use kube_client::{Client, Config};
use snafu::{ResultExt, Snafu};
use std::path::Path;

const HTTP_NOT_FOUND: u16 = 404;
const HTTP_CONFLICT: u16 = 409;

/// Failures reported by a [`ClusterApi`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("object already exists"))]
    AlreadyExists,

    #[snafu(display("{}", source))]
    Request {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// The subset of the Kubernetes API used by the installer.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetches a DaemonSet.  Returns `Ok(None)` if it doesn't exist.
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> ApiResult<Option<DaemonSet>>;

    /// Creates a Job.  Returns [`ApiError::AlreadyExists`] if one of the same name is present.
    async fn create_job(&self, namespace: &str, job: &Job) -> ApiResult<Job>;
}

#[async_trait]
impl ClusterApi for Client {
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> ApiResult<Option<DaemonSet>> {
        let api: Api<DaemonSet> = Api::namespaced(self.clone(), namespace);
        match api.get(name).await {
            Ok(daemon_set) => Ok(Some(daemon_set)),
            Err(kube_client::Error::Api(response)) if response.code == HTTP_NOT_FOUND => Ok(None),
            Err(e) => Err(ApiError::Request {
                source: Box::new(e),
            }),
        }
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> ApiResult<Job> {
        let api: Api<Job> = Api::namespaced(self.clone(), namespace);
        match api.create(&PostParams::default(), job).await {
            Ok(job) => Ok(job),
            Err(kube_client::Error::Api(response)) if response.code == HTTP_CONFLICT => {
                Err(ApiError::AlreadyExists)
            }
            Err(e) => Err(ApiError::Request {
                source: Box::new(e),
            }),
        }
    }
}

/// Builds a client from the kubeconfig at `path`, or from the environment (in-cluster service
/// account or `$KUBECONFIG`) if no path is given.
pub async fn client(path: Option<&Path>) -> Result<Client> {
    let config = match path {
        Some(path) => {
            debug!("Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path).context(error::KubeconfigSnafu { path })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context(error::KubeconfigSnafu { path })?
        }
        None => Config::infer().await.context(error::InferConfigSnafu)?,
    };
    Client::try_from(config).context(error::ClientSnafu)
}

pub mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Unable to create Kubernetes client: {}", source))]
        Client { source: kube_client::Error },

        #[snafu(display("Unable to infer Kubernetes client config: {}", source))]
        InferConfig {
            source: kube_client::config::InferConfigError,
        },

        #[snafu(display("Unable to load kubeconfig {}: {}", path.display(), source))]
        Kubeconfig {
            path: PathBuf,
            source: kube_client::config::KubeconfigError,
        },
    }
}

pub use error::Error;
type Result<T> = std::result::Result<T, error::Error>;
