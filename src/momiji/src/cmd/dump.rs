use std::path::PathBuf;

use clap::Args;
use eyre::Context;
use momiji_wz::{Archive, Located};

use super::Command;
use crate::{cli::WzArgs, utils};

/// Dumps a property subtree as JSON.
#[derive(Debug, Args)]
pub struct Dump {
    /// The path to the archive file to read from.
    pub archive: PathBuf,

    /// The `/`-separated object path to dump.
    ///
    /// The path must reach at least an image; canvas and sound
    /// payloads are summarized by their metadata.
    pub path: String,

    #[clap(flatten)]
    pub wz: WzArgs,

    /// An optional file to write the JSON document to.
    ///
    /// Defaults to stdout, pretty-printed when it is a terminal.
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl Command for Dump {
    fn handle(self) -> eyre::Result<()> {
        let archive = Archive::open_mmap(&self.archive, self.wz.config())
            .with_context(|| format!("failed to open archive at '{}'", self.archive.display()))?;

        let located = archive
            .locate(&self.path)
            .with_context(|| format!("failed to parse image for '{}'", self.path))?;

        match located {
            Some(Located::Node { node, .. }) => {
                utils::serialize_to_output_source(self.output, &node)
            }
            Some(Located::Dir(_)) => {
                eyre::bail!(
                    "'{}' names a directory; use the list command to inspect it",
                    self.path
                )
            }
            None => eyre::bail!("no object at '{}' in the archive", self.path),
        }
    }
}
