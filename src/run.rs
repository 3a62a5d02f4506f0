//! Sequential backup run over all database containers.
//!
//! A failing container is logged and recorded, the run continues with the
//! next one. Whether failures surface in the exit code is up to the caller
//! (see `fail_on_error`).

use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use derive_more::{Display, Error, From};

use crate::config::{ContainerOverride, DumpConfig, OverrideError};
use crate::docker::{ContainerMeta, DockerError, DockerHost};
use crate::dump::{Credentials, DumpError, DumpJob, Engine, MissingCredentials};

/// Marker file recording the completion time of the last run.
const LAST_RUN_MARKER: &str = ".last_run";

/// Knobs of a single run, resolved from CLI flags and config.
#[derive(Debug)]
pub struct RunOptions<'a> {
    pub out_dir: &'a Path,
    pub compress: bool,
    pub dry_run: bool,
    /// Only containers whose name contains this substring.
    pub include: Option<&'a str>,
    /// Exact container names to skip.
    pub exclude: &'a [String],
}

/// Aggregate outcome of a backup run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn all_good(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Backup of one container failed.
#[derive(Debug, Display, Error, From)]
pub enum ContainerBackupError {
    #[display("{_0}")]
    #[from]
    Override(OverrideError),
    #[display("{_0}")]
    #[from]
    Credentials(MissingCredentials),
    #[display("{_0}")]
    #[from]
    Dump(DumpError),
}

enum Outcome {
    Dumped,
    /// Explicitly skipped by exclude list or override.
    Skipped,
    /// No supported database inside, silently ignored.
    NotADatabase,
}

/// Runs the whole backup: enumerate, classify, dump, verify, report.
///
/// Only the container enumeration itself is fatal; per-container failures
/// are collected into the [RunReport].
pub async fn run(
    host: &DockerHost,
    config: &DumpConfig,
    opts: &RunOptions<'_>,
) -> Result<RunReport, DockerError> {
    let containers = host.running_containers().await?;
    log::debug!(target: "run", "Found {} running containers", containers.len());

    let mut report = RunReport::default();
    for container in &containers {
        if let Some(include) = opts.include {
            if !container.name.contains(include) {
                continue;
            }
        }
        if opts.exclude.iter().any(|excluded| *excluded == container.name) {
            log::info!(target: "run", "Skipping container {}", container.name);
            report.skipped.push(container.name.clone());
            continue;
        }

        match backup_container(container, config, opts) {
            Ok(Outcome::Dumped) => report.succeeded.push(container.name.clone()),
            Ok(Outcome::Skipped) => report.skipped.push(container.name.clone()),
            Ok(Outcome::NotADatabase) => {}
            Err(e) => {
                log::error!(
                    target: "run",
                    "Backup of container {} failed: {e}",
                    container.name
                );
                report.failed.push(container.name.clone());
            }
        }
    }

    for name in unmatched_overrides(config, &containers) {
        log::warn!(
            target: "run",
            "Container {name} from the override config is not running"
        );
    }

    if !opts.dry_run {
        if let Err(e) = write_marker(opts.out_dir) {
            log::warn!(target: "run", "Writing the run marker failed: {e}");
        }
    }

    Ok(report)
}

/// Names of override entries that matched no running container.
fn unmatched_overrides<'a>(config: &'a DumpConfig, containers: &[ContainerMeta]) -> Vec<&'a str> {
    let mut names: Vec<_> = config
        .overrides
        .iter()
        .map(|entry| entry.container.as_str())
        .filter(|name| !containers.iter().any(|container| container.name == *name))
        .collect();
    names.dedup();

    names
}

fn backup_container(
    container: &ContainerMeta,
    config: &DumpConfig,
    opts: &RunOptions<'_>,
) -> Result<Outcome, ContainerBackupError> {
    let entries = config.overrides_for(&container.name);

    if entries.iter().any(|entry| entry.skip) {
        log::info!(
            target: "run",
            "Skipping container {} per override",
            container.name
        );
        return Ok(Outcome::Skipped);
    }

    if entries.is_empty() {
        let Some(engine) = Engine::classify(&container.image_haystack()) else {
            log::trace!(
                target: "run",
                "Container {} holds no supported database",
                container.name
            );
            return Ok(Outcome::NotADatabase);
        };
        let credentials = Credentials::from_env(engine, &container.name, &container.env)?;

        let job = DumpJob::new(container, engine, credentials, None);
        job.backup(opts.out_dir, opts.compress, opts.dry_run)?;
        return Ok(Outcome::Dumped);
    }

    // One dump job per override entry; a failing entry doesn't stop the
    // remaining ones.
    let mut last_error = None;
    for entry in entries {
        if let Err(e) = backup_override(container, entry, opts) {
            log::error!(
                target: "run",
                "Backup of container {} (database {}) failed: {e}",
                container.name,
                entry.database.as_deref().unwrap_or("all")
            );
            last_error = Some(e);
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(Outcome::Dumped),
    }
}

fn backup_override(
    container: &ContainerMeta,
    entry: &ContainerOverride,
    opts: &RunOptions<'_>,
) -> Result<(), ContainerBackupError> {
    let (engine, credentials) = entry.credentials()?;

    let job = DumpJob::new(container, engine, credentials, entry.database.clone());
    job.backup(opts.out_dir, opts.compress, opts.dry_run)?;

    Ok(())
}

/// Rewrites the timestamp marker in the output directory. The marker is the
/// only state persisted between runs.
fn write_marker(out_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(out_dir)?;

    let marker = out_dir.join(LAST_RUN_MARKER);
    fs::write(&marker, format!("{}\n", Local::now().to_rfc3339()))?;
    log::debug!(target: "run", "Updated run marker {}", marker.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn marker_holds_a_parsable_timestamp() {
        let dir = tempdir().unwrap();

        write_marker(dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join(LAST_RUN_MARKER)).unwrap();
        DateTime::parse_from_rfc3339(content.trim()).unwrap();
    }

    #[test]
    fn marker_creates_the_output_directory() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("dumps");

        write_marker(&out_dir).unwrap();
        assert!(out_dir.join(LAST_RUN_MARKER).exists());
    }

    #[test]
    fn marker_is_rewritten() {
        let dir = tempdir().unwrap();

        write_marker(dir.path()).unwrap();
        write_marker(dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join(LAST_RUN_MARKER)).unwrap();
        // A rerun replaces the marker instead of appending to it.
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn reports_overrides_without_running_container() {
        let config: DumpConfig = toml::from_str(
            r#"
            [[override]]
            container = "icinga-db-1"
            skip = true

            [[override]]
            container = "ghost-db"
            engine = "mariadb"
            user = "root"
            password = "funky"
            database = "icinga"

            [[override]]
            container = "ghost-db"
            engine = "mariadb"
            user = "icinga2"
            password = "funky"
            database = "icingaweb2"
            "#,
        )
        .unwrap();

        let running = vec![ContainerMeta {
            id: "deadbeef".to_string(),
            name: "icinga-db-1".to_string(),
            image_tags: vec!["mariadb:10.6".to_string()],
            env: std::collections::HashMap::new(),
            compose_working_dir: None,
        }];

        assert_eq!(unmatched_overrides(&config, &running), ["ghost-db"]);
        assert!(unmatched_overrides(&DumpConfig::default(), &running).is_empty());
    }

    #[test]
    fn report_all_good() {
        let mut report = RunReport::default();
        assert!(report.all_good());

        report.skipped.push("postgres-exporter".to_string());
        assert!(report.all_good());

        report.failed.push("db-1".to_string());
        assert!(!report.all_good());
    }
}
