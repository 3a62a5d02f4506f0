//! Dump databases running inside Docker containers.
//!
//! The library enumerates the running containers of the local Docker daemon,
//! classifies each one as MySQL, MariaDB or PostgreSQL by its image tags,
//! reads the credentials from the container environment and runs the engine's
//! native dump utility through `docker exec`. Produced dumps are verified and
//! optionally gzip-compressed. See [`run`] for the orchestration.

#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod docker;
pub mod dump;
pub mod run;
