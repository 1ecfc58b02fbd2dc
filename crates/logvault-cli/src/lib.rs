//! `logvault` command line tool
//!
//! Reads a store directory, prints statistics and sessions, and runs
//! exports through [`logvault_export::Exporter`].

pub mod commands;
pub mod config;

pub use config::{Cli, CliConfig, Command};
