//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: process one customer event end to end
//! - list/show/stats: inspect stored decisions
//! - agent: manage versioned agent configurations
//! - features: maintain the feature store
//! - catalog: print offerable services

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Upsellr - generate, judge, and retry personalized upsell messages
#[derive(Parser, Debug)]
#[command(name = "upsellr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process one customer event and record the decision
    Run {
        /// Path to the event JSON file
        event: PathBuf,

        /// Print the decision without persisting it
        #[arg(long)]
        dry_run: bool,
    },

    /// List recorded decisions
    List {
        /// Filter by outcome (approved, rejected, exhausted, errored)
        #[arg(short, long)]
        status: Option<String>,

        /// Show only the most recent N decisions
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show one decision with its full attempt history
    Show {
        /// Decision ID
        id: String,
    },

    /// Summarize recorded decisions
    Stats,

    /// Agent configuration management
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Feature store maintenance
    Features {
        #[command(subcommand)]
        command: FeaturesCommands,
    },

    /// Print the service catalog
    Catalog,
}

/// Agent management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AgentCommands {
    /// List registered agent versions
    List,

    /// Register a new agent version from a JSON file
    Register {
        /// Path to the agent configuration JSON
        file: PathBuf,
    },

    /// Promote a registered version to production
    Promote {
        /// Agent identifier
        agent_id: String,

        /// Version to promote
        version: String,
    },
}

/// Feature store subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum FeaturesCommands {
    /// Fold a customer event into the stored features
    Enrich {
        /// Path to the event JSON file
        event: PathBuf,
    },

    /// Show stored features for a customer
    Show {
        /// Customer key (email or id)
        customer: String,
    },
}
