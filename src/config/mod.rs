//! On-disk configuration.
//!
//! The config mostly exists for the corner cases the automatic image-tag
//! classification gets wrong: exporters whose image name contains a database
//! name, or databases whose credentials are not in the container environment.

use derive_more::{Display, Error};

use crate::dump::{Credentials, Engine};

/// Configuration of a backup run.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct DumpConfig {
    /// Exit nonzero when the backup of at least one container failed.
    #[serde(default)]
    pub fail_on_error: bool,

    /// Gzip the dumps.
    #[serde(default = "default_compress")]
    pub compress: bool,

    /// Containers the automatic classification gets wrong.
    #[serde(default, rename = "override")]
    pub overrides: Vec<ContainerOverride>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            fail_on_error: false,
            compress: default_compress(),
            overrides: Vec::new(),
        }
    }
}

fn default_compress() -> bool {
    true
}

impl DumpConfig {
    /// All override entries for `container`.
    ///
    /// The same container may be listed several times, one entry per
    /// database; every entry becomes its own dump job.
    pub fn overrides_for(&self, container: &str) -> Vec<&ContainerOverride> {
        self.overrides
            .iter()
            .filter(|entry| entry.container == container)
            .collect()
    }
}

/// Manual classification of a single container, replacing both the image-tag
/// check and the environment credential extraction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContainerOverride {
    /// Exact name of the container.
    pub container: String,

    /// Never dump this container. An exporter with `postgres` in its image
    /// name is the classic case.
    #[serde(default)]
    pub skip: bool,

    pub engine: Option<Engine>,
    pub user: Option<String>,
    pub password: Option<String>,

    /// Dump only this database instead of the whole cluster.
    pub database: Option<String>,
}

/// An override entry that can't be turned into a dump job.
#[derive(Debug, Display, Error)]
pub enum OverrideError {
    /// A non-skip override names no engine.
    #[display("Override for container '{_0}' names no engine")]
    MissingEngine(#[error(ignore)] String),
    /// MySQL/MariaDB overrides need both user and password.
    #[display("Override for container '{_0}' is missing user or password")]
    MissingCredentials(#[error(ignore)] String),
}

impl ContainerOverride {
    /// Engine and credentials this override dictates.
    pub fn credentials(&self) -> Result<(Engine, Credentials), OverrideError> {
        let engine = self
            .engine
            .ok_or_else(|| OverrideError::MissingEngine(self.container.clone()))?;

        let credentials = match engine {
            Engine::Postgres => Credentials {
                user: self
                    .user
                    .clone()
                    .unwrap_or_else(|| "postgres".to_string()),
                password: None,
            },
            Engine::Mysql | Engine::MariaDb => match (self.user.clone(), self.password.clone()) {
                (Some(user), Some(password)) => Credentials {
                    user,
                    password: Some(password),
                },
                _ => return Err(OverrideError::MissingCredentials(self.container.clone())),
            },
        };

        Ok((engine, credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips() {
        let config = DumpConfig::default();
        assert!(config.compress);
        assert!(!config.fail_on_error);

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: DumpConfig = toml::from_str(&serialized).unwrap();
        assert!(parsed.compress);
    }

    #[test]
    fn parse_config_with_overrides() {
        let config: DumpConfig = toml::from_str(
            r#"
            fail_on_error = true

            [[override]]
            container = "icinga-db-1"
            engine = "mariadb"
            user = "root"
            password = "funky"
            database = "icinga"

            [[override]]
            container = "postgres-exporter"
            skip = true
            "#,
        )
        .unwrap();

        assert!(config.fail_on_error);
        assert!(config.compress, "compress should default to true");
        assert_eq!(config.overrides.len(), 2);

        let icinga = config.overrides_for("icinga-db-1")[0];
        let (engine, credentials) = icinga.credentials().unwrap();
        assert_eq!(engine, Engine::MariaDb);
        assert_eq!(credentials.user, "root");
        assert_eq!(credentials.password.as_deref(), Some("funky"));
        assert_eq!(icinga.database.as_deref(), Some("icinga"));

        assert!(config.overrides_for("postgres-exporter")[0].skip);
        assert!(config.overrides_for("unrelated").is_empty());
    }

    #[test]
    fn several_overrides_for_one_container() {
        let config: DumpConfig = toml::from_str(
            r#"
            [[override]]
            container = "icinga-db-1"
            engine = "mariadb"
            user = "root"
            password = "funky"
            database = "icinga"

            [[override]]
            container = "icinga-db-1"
            engine = "mariadb"
            user = "icinga2"
            password = "funky"
            database = "icingaweb2"
            "#,
        )
        .unwrap();

        let entries = config.overrides_for("icinga-db-1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].database.as_deref(), Some("icinga"));
        assert_eq!(entries[1].database.as_deref(), Some("icingaweb2"));
    }

    #[test]
    fn postgres_override_defaults_to_superuser() {
        let entry = ContainerOverride {
            container: "legacy-pg".to_string(),
            skip: false,
            engine: Some(Engine::Postgres),
            user: None,
            password: None,
            database: None,
        };

        let (_, credentials) = entry.credentials().unwrap();
        assert_eq!(credentials.user, "postgres");
    }

    #[test]
    fn mariadb_override_requires_credentials() {
        let entry = ContainerOverride {
            container: "db".to_string(),
            skip: false,
            engine: Some(Engine::MariaDb),
            user: Some("root".to_string()),
            password: None,
            database: None,
        };

        assert!(matches!(
            entry.credentials(),
            Err(OverrideError::MissingCredentials(_))
        ));
    }

    #[test]
    fn override_without_engine_is_rejected() {
        let entry = ContainerOverride {
            container: "db".to_string(),
            skip: false,
            engine: None,
            user: None,
            password: None,
            database: None,
        };

        assert!(matches!(
            entry.credentials(),
            Err(OverrideError::MissingEngine(_))
        ));
    }
}
