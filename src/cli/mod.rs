//! CLI command definitions for kanban-board
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod rules;

use clap::{Parser, Subcommand};
use rules::RulesCommand;

/// Kanban board API server and rule tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Address to bind the HTTP API to (overrides config)
    #[arg(long, global = true)]
    pub host: Option<std::net::IpAddr>,

    /// Port for the HTTP API (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server (default if no subcommand given)
    Serve,

    /// Manage and try out automation rules
    #[command(subcommand)]
    Rules(RulesCommand),
}
