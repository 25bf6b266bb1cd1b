//! pgkit library
//!
//! Installs the PostgreSQL client binaries on Windows hosts: finds the newest
//! release on the vendor download page, streams the archive, extracts the
//! client tools and registers them on the search path. Also provides the
//! stored-procedure client interface used by the `db` module.

pub mod commands;
pub mod core;
pub mod db;
pub mod error;
pub mod utils;
