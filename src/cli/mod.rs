use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

const DEFAULT_CONFIG_PATH: &str = "/etc/docker_dbdump.toml";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Path to the configuration file.
    ///
    /// A default configuration is written there when the file doesn't exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory the database dumps are written to.
    #[arg(long, short = 'o')]
    pub out_dir: PathBuf,

    /// Store the dumps uncompressed instead of gzipped.
    #[arg(long)]
    pub no_compress: bool,

    /// Exit nonzero when the backup of at least one container failed.
    ///
    /// Without this flag (or the equivalent config entry) the exit code is
    /// always zero so a failing dump can't abort an outer backup job.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Simulative backup run.
    #[arg(long)]
    pub dry_run: bool,

    /// Only dump containers whose name contains this substring.
    #[arg(long, short = 'i')]
    pub include: Option<String>,

    /// Skip the container with this exact name. May be given multiple times.
    #[arg(long, short = 'e', conflicts_with = "include")]
    pub exclude: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn include_conflicts_with_exclude() {
        let res = Cli::try_parse_from([
            "docker_dbdump",
            "--out-dir",
            "/srv/backup",
            "--include",
            "db",
            "--exclude",
            "postgres-exporter",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn exclude_is_repeatable() {
        let cli = Cli::try_parse_from([
            "docker_dbdump",
            "--out-dir",
            "/srv/backup",
            "-e",
            "mysqld-exporter",
            "-e",
            "postgres-exporter",
        ])
        .unwrap();
        assert_eq!(cli.exclude, ["mysqld-exporter", "postgres-exporter"]);
    }
}
