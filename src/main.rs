use std::process::ExitCode;

use clap::Parser;
use docker_dbdump_lib::cli::Cli;
use docker_dbdump_lib::config::DumpConfig;
use docker_dbdump_lib::docker::DockerHost;
use docker_dbdump_lib::run::{self, RunOptions};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let config: DumpConfig = match std::fs::read_to_string(&cli.config) {
        Ok(config_str) => match toml::from_str(&config_str) {
            Err(e) => {
                log::error!("Reading the config file failed: {e}");
                return ExitCode::FAILURE;
            }
            Ok(cfg) => cfg,
        },
        Err(e) => {
            if std::fs::exists(&cli.config).is_ok_and(|b| !b) {
                log::debug!(
                    "Writing default config to {} because it doesn't exist yet",
                    cli.config.display()
                );
                let default_config = DumpConfig::default();
                let config_str = toml::to_string_pretty(&default_config)
                    .expect("default config should be serializable");
                if let Err(e) = std::fs::write(&cli.config, config_str) {
                    log::warn!(
                        "Writing default config to {} failed {e}",
                        cli.config.display(),
                    );
                }

                default_config
            } else {
                log::error!("Reading the config file failed: {e}");
                return ExitCode::FAILURE;
            }
        }
    };

    let dry_run = cli.dry_run;
    if dry_run {
        log::warn!("Running in dry-run mode");
    }

    let fail_on_error = cli.fail_on_error || config.fail_on_error;
    let compress = !cli.no_compress && config.compress;

    let host = match DockerHost::connect() {
        Ok(host) => host,
        Err(e) => {
            log::error!("Connecting to the Docker daemon failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(include) = &cli.include {
        log::info!("Only dumping containers with '{include}' in the container name");
    }
    for excluded in &cli.exclude {
        log::info!("Excluding container {excluded}");
    }

    let opts = RunOptions {
        out_dir: &cli.out_dir,
        compress,
        dry_run,
        include: cli.include.as_deref(),
        exclude: &cli.exclude,
    };

    let report = match run::run(&host, &config, &opts).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Enumerating the containers failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Backup run finished: {} succeeded, {} failed, {} skipped",
        report.succeeded.len(),
        report.failed.len(),
        report.skipped.len()
    );
    if !report.all_good() {
        log::error!("Failed containers: {}", report.failed.join(", "));
    }

    if !report.all_good() && fail_on_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
