use clap::{Parser, Subcommand};

use crate::cmd::*;

mod args;
pub use args::*;

pub mod helpers;

/// The CLI interface for the Momiji application.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    /// The selected command.
    #[clap(subcommand)]
    pub command: MomijiCommand,

    #[clap(flatten)]
    pub verbosity: args::Verbosity,
}

/// The top-level commands supported by Momiji.
#[derive(Debug, Subcommand)]
pub enum MomijiCommand {
    Render(render::Render),
    List(list::List),
    Dump(dump::Dump),
}

impl Command for MomijiCommand {
    fn handle(self) -> eyre::Result<()> {
        match self {
            Self::Render(render) => render.handle(),
            Self::List(list) => list.handle(),
            Self::Dump(dump) => dump.handle(),
        }
    }
}
