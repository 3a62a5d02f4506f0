//! Interaction with the local Docker daemon.

use std::collections::HashMap;

use bollard::container::ListContainersOptions;
use bollard::Docker;
use derive_more::{Display, Error, From};

/// Compose label carrying the project working directory.
const COMPOSE_WORKING_DIR_LABEL: &str = "com.docker.compose.project.working_dir";

/// Talking to the Docker daemon failed.
#[derive(Debug, Display, Error, From)]
pub enum DockerError {
    #[display("Docker daemon request failed: {_0}")]
    #[from]
    Api(bollard::errors::Error),
    /// The daemon listed a container without an id.
    #[display("Container without an id in the list response")]
    MissingId,
}

/// Runtime metadata of a single running container, as much as a backup
/// decision needs: image tags for classification, environment for
/// credentials and the compose label for the dump filename.
#[derive(Debug, Clone)]
pub struct ContainerMeta {
    pub id: String,
    pub name: String,
    pub image_tags: Vec<String>,
    pub env: HashMap<String, String>,
    pub compose_working_dir: Option<String>,
}

impl ContainerMeta {
    /// Space-joined image tags, the haystack the classification matches on.
    pub fn image_haystack(&self) -> String {
        self.image_tags.join(" ")
    }

    /// Base of the dump filename: the compose project working directory with
    /// `/` flattened to `_`, falling back to the container name.
    pub fn dump_base(&self) -> String {
        match &self.compose_working_dir {
            Some(working_dir) => working_dir.replace('/', "_"),
            None => {
                log::warn!(
                    target: "docker",
                    "Could not get docker compose working directory. Using {}",
                    self.name
                );
                self.name.clone()
            }
        }
    }
}

/// Handle on the local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerHost {
    docker: Docker,
}

impl DockerHost {
    pub fn connect() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()?;

        Ok(Self { docker })
    }

    /// Lists all running containers with the metadata a backup run needs.
    pub async fn running_containers(&self) -> Result<Vec<ContainerMeta>, DockerError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let options = Some(ListContainersOptions {
            all: false,
            filters,
            ..Default::default()
        });
        let summaries = self.docker.list_containers(options).await?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let id = summary.id.ok_or(DockerError::MissingId)?;
            containers.push(self.inspect_meta(&id).await?);
        }

        Ok(containers)
    }

    async fn inspect_meta(&self, id: &str) -> Result<ContainerMeta, DockerError> {
        let inspect = self.docker.inspect_container(id, None).await?;

        let name = inspect
            .name
            .map(|name| name.trim_start_matches('/').to_string())
            .unwrap_or_else(|| id.to_string());
        let config = inspect.config.unwrap_or_default();

        let env = parse_env(&config.env.unwrap_or_default());
        let compose_working_dir = config
            .labels
            .as_ref()
            .and_then(|labels| labels.get(COMPOSE_WORKING_DIR_LABEL))
            .cloned();

        let image_tags = self.image_tags(config.image.as_deref()).await;
        if image_tags.is_empty() {
            log::warn!(
                target: "docker",
                "Image tag of container {name} has been deleted; please run `docker compose up` to restore it"
            );
        }

        Ok(ContainerMeta {
            id: id.to_string(),
            name,
            image_tags,
            env,
            compose_working_dir,
        })
    }

    /// Repo tags of the container's image. An untagged image reference that
    /// is no digest still counts as a usable tag.
    async fn image_tags(&self, image_ref: Option<&str>) -> Vec<String> {
        let Some(image_ref) = image_ref else {
            return Vec::new();
        };

        let mut tags = match self.docker.inspect_image(image_ref).await {
            Ok(image) => image.repo_tags.unwrap_or_default(),
            Err(e) => {
                log::debug!(target: "docker", "Inspecting image {image_ref} failed: {e}");
                Vec::new()
            }
        };

        if tags.is_empty() && !image_ref.starts_with("sha256:") {
            tags.push(image_ref.to_string());
        }

        tags
    }
}

/// Splits `KEY=VALUE` environment entries at the first `=`. Entries without
/// a `=` are dropped.
fn parse_env(env: &[String]) -> HashMap<String, String> {
    env.iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
