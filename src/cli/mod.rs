//! CLI module for upsellr - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
