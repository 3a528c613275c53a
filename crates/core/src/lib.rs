//! refmark-core
//!
//! Core library for annotating a disassembly database with cross-reference
//! counts.
//!
//! Every function referenced by more than one call or jump gets that count
//! prefixed to its comment; every data item referenced more than once gets it
//! in its repeatable comment, with string literals quoted alongside. The host
//! database is an injected [`host::HostDatabase`], so the same pass runs
//! against the in-memory fake used in tests and the SQLite-backed store the
//! CLI drives.

pub mod model;
pub mod host;
pub mod db;
pub mod services;
pub mod config;
pub mod logging;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
