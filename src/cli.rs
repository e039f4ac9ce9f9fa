//! Command-line surface. `rcalendar` normally just serves the API; the
//! `generate-api-key`/`list-api-keys` subcommands are one-shot admin
//! commands run once against the pool and exit.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "rcalendar", version, about = "Multi-tenant calendar reservation service")]
pub struct Args {
    #[arg(long, value_enum, default_value = "pretty")]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mint a new Api-Key for an app label and print it.
    GenerateApiKey {
        #[arg(long)]
        app: String,
    },
    /// List every known Api-Key (app label, key, active flag).
    ListApiKeys,
}
