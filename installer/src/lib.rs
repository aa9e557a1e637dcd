//! LibreOffice buildpack library.
//!
//! This crate implements the compile step of a buildpack that installs a
//! headless LibreOffice into an application's build directory without a
//! system package manager. It is used by the `compile` binary and can be
//! driven programmatically with an injected [`fetch::Fetcher`] for testing.
//!
//! # Modules
//!
//! - [`archive`] - Tarball and Debian package extraction, file sniffing
//! - [`cleanup`] - Cache pruning after a successful install
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Run configuration and TOML overrides
//! - [`deps`] - Shared library dependency fetching and soname aliases
//! - [`error`] - Fatal error types
//! - [`fetch`] - HTTP download abstraction
//! - [`index`] - Ubuntu package index parsing and lookup
//! - [`install`] - Distribution archive installation
//! - [`lock`] - Cache directory locking
//! - [`output`] - Build-log formatting and dry-run summary
//! - [`pipeline`] - Compile pipeline orchestration
//! - [`receipt`] - Install receipt written next to the installation
//! - [`tree`] - Directory search, listing and copying
//! - [`wrapper`] - Launcher and profile script generation

pub mod archive;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod fetch;
pub mod index;
pub mod install;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod receipt;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod tree;
pub mod wrapper;
