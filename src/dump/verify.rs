//! Sanity checks on produced dump files.
//!
//! A dump that exited zero can still be an empty or truncated file, so every
//! backup is checked for the header lines the dump utilities always emit.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};
use flate2::read::GzDecoder;
use regex::Regex;

use super::engine::Engine;

/// Verification of a dump file failed.
#[derive(Debug, Display, Error, From)]
pub enum VerifyError {
    /// The dump file is missing entirely.
    #[display("The backup file '{}' does not exist", _0.display())]
    Missing(#[error(ignore)] PathBuf),
    /// Reading the dump file failed.
    #[display("Reading the backup file failed: {_0}")]
    #[from]
    Io(io::Error),
    /// An expected header line is absent.
    #[display("Dump header /{pattern}/ not found in '{}'", file.display())]
    HeaderNotFound { pattern: String, file: PathBuf },
}

/// Checks that `file` looks like a dump produced by `engine`.
///
/// `cluster` distinguishes whole-cluster Postgres dumps (`pg_dumpall`) from
/// single-database ones (`pg_dump`), which carry different headers.
pub fn check_dump(engine: Engine, file: &Path, cluster: bool) -> Result<(), VerifyError> {
    if !file.exists() {
        return Err(VerifyError::Missing(file.to_path_buf()));
    }

    match engine {
        Engine::Mysql | Engine::MariaDb => {
            contains_line(file, &format!("(?i)^-- {engine} dump"))?;
            contains_line(file, "^-- Host: localhost")?;
        }
        Engine::Postgres if cluster => {
            contains_line(file, "PostgreSQL database cluster dump")?;
        }
        Engine::Postgres => {
            contains_line(file, "PostgreSQL database dump")?;
        }
    }

    log::debug!(target: "dump::verify", "Created backup {} looks good", file.display());
    Ok(())
}

/// The `grep -q`/`zgrep -q` of the shell world: at least one line of `file`
/// must match `pattern`.
fn contains_line(file: &Path, pattern: &str) -> Result<(), VerifyError> {
    let regex = Regex::new(pattern).expect("verify patterns should be valid regexes");
    let handle = File::open(file)?;

    let matched = if file.extension().is_some_and(|ext| ext == "gz") {
        any_line_matches(&regex, BufReader::new(GzDecoder::new(handle)))?
    } else {
        any_line_matches(&regex, BufReader::new(handle))?
    };

    if matched {
        Ok(())
    } else {
        Err(VerifyError::HeaderNotFound {
            pattern: pattern.to_string(),
            file: file.to_path_buf(),
        })
    }
}

fn any_line_matches(regex: &Regex, reader: impl BufRead) -> io::Result<bool> {
    for line in reader.lines() {
        if regex.is_match(&line?) {
            return Ok(true);
        }
    }

    Ok(false)
}
