//! Execution of the native dump utilities through `docker exec`.

pub mod credentials;
pub mod engine;
pub mod verify;

pub use credentials::{Credentials, MissingCredentials};
pub use engine::Engine;
pub use verify::VerifyError;

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use derive_more::{Display, Error, From};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::docker::ContainerMeta;

/// A backup of a single container failed.
#[derive(Debug, Display, Error, From)]
pub enum DumpError {
    /// Spawning or draining the `docker exec` process failed.
    #[display("Dump process failed: {_0}")]
    #[from]
    Io(io::Error),
    /// The in-container dump utility exited nonzero.
    #[display("Dump command returned with {status}: {stderr}")]
    DumpFailed { status: ExitStatus, stderr: String },
    /// The produced dump file did not pass verification.
    #[display("Verification of the dump failed: {_0}")]
    #[from]
    Verify(VerifyError),
}

/// A single container dump: which container, as which engine, with which
/// credentials. Without a `database` the whole cluster is dumped.
#[derive(Debug)]
pub struct DumpJob<'a> {
    container: &'a ContainerMeta,
    engine: Engine,
    credentials: Credentials,
    database: Option<String>,
}

impl<'a> DumpJob<'a> {
    pub fn new(
        container: &'a ContainerMeta,
        engine: Engine,
        credentials: Credentials,
        database: Option<String>,
    ) -> Self {
        Self {
            container,
            engine,
            credentials,
            database,
        }
    }

    /// `<base>_<container>_<user>_<engine>[_<database>].sql[.gz]`.
    ///
    /// The name is stable across runs, a later backup overwrites the
    /// previous dump. Database-scoped jobs carry the database name so
    /// several dumps of the same container don't collide.
    pub fn dump_filename(&self, compress: bool) -> String {
        let database = match &self.database {
            Some(database) => format!("_{database}"),
            None => String::new(),
        };

        format!(
            "{}_{}_{}_{}{}.sql{}",
            self.container.dump_base(),
            self.container.name,
            self.credentials.user,
            self.engine,
            database,
            if compress { ".gz" } else { "" }
        )
    }

    /// Runs the dump and writes it below `out_dir`.
    ///
    /// The in-container utility is started through `docker exec` with stdout
    /// piped to the host side, where it is streamed into the output file
    /// (through a gzip encoder when `compress` is set). On a dry run the
    /// output is read and discarded and no file is touched.
    pub fn backup(&self, out_dir: &Path, compress: bool, dry_run: bool) -> Result<PathBuf, DumpError> {
        let out_file = out_dir.join(self.dump_filename(compress));
        log::info!(
            target: "dump",
            "Starting to backup container {} ({})",
            self.container.name,
            self.engine
        );

        let dump_command = self.engine.dump_command(&self.credentials, self.database.as_deref());
        // The command line holds the password, only name the program here.
        log::debug!(
            target: "dump",
            "Running {} in container {}",
            dump_command[0],
            self.container.id
        );

        let mut dump_process = Command::new("docker")
            .arg("exec")
            .arg(&self.container.id)
            .args(&dump_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = dump_process.stdout.take().expect("stdout should be piped");
        let stderr = dump_process.stderr.take().expect("stderr should be piped");
        let mut reader = BufReader::new(stdout);

        // Drain stderr on its own thread. A dump utility that warns per
        // table can fill the pipe buffer before stdout reaches EOF and
        // would stall the copy below.
        let stderr_reader = thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut buffer = Vec::new();
            BufReader::new(stderr).read_to_end(&mut buffer)?;
            Ok(buffer)
        });

        if dry_run {
            log::trace!(target: "dump", "Discarding dump output on dry-run");
            io::copy(&mut reader, &mut io::sink())?;
        } else {
            fs::create_dir_all(out_dir)?;
            if compress {
                let dump_file = File::create(&out_file)?;
                let mut encoder = GzEncoder::new(dump_file, Compression::default());
                io::copy(&mut reader, &mut encoder)?;
                encoder.finish()?;
            } else {
                let mut dump_file = File::create(&out_file)?;
                io::copy(&mut reader, &mut dump_file)?;
            }
        }
        drop(reader);

        let status = dump_process.wait()?;
        let stderr = stderr_reader.join().expect("no panic in stderr reader")?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            log::error!(target: "dump", "Backup cmd returned with {status}: {stderr}");
            return Err(DumpError::DumpFailed { status, stderr });
        }
        log::trace!(target: "dump", "Successfully dumped backup");

        if !dry_run {
            fs::set_permissions(&out_file, fs::Permissions::from_mode(0o600))?;
            verify::check_dump(self.engine, &out_file, self.database.is_none())?;
        }

        log::info!(
            target: "dump",
            "Done backing up container {} ({})",
            self.container.name,
            self.engine
        );

        Ok(out_file)
    }
}
