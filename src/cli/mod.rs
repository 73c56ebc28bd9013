//! CLI module for the photo-booth library
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, CertificateArgs, Cli, CliOutputFormat, Command, ComposeArgs, KeyArgs};
