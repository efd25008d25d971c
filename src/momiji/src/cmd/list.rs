use std::path::PathBuf;

use clap::Args;
use eyre::Context;
use momiji_wz::{Archive, Located};

use super::Command;
use crate::cli::WzArgs;

/// Lists the children of an archive directory or property node.
#[derive(Debug, Args)]
pub struct List {
    /// The path to the archive file to read from.
    pub archive: PathBuf,

    /// The `/`-separated object path to list.
    ///
    /// If missing, the root directory of the archive is listed.
    pub path: Option<String>,

    #[clap(flatten)]
    pub wz: WzArgs,
}

impl Command for List {
    fn handle(self) -> eyre::Result<()> {
        let archive = Archive::open_mmap(&self.archive, self.wz.config())
            .with_context(|| format!("failed to open archive at '{}'", self.archive.display()))?;

        let path = self.path.as_deref().unwrap_or("");
        let located = archive
            .locate(path)
            .with_context(|| format!("failed to parse image for '{path}'"))?;

        match located {
            Some(Located::Dir(dir)) => {
                for (name, _) in dir.dirs() {
                    println!("{:6} {name}", "dir");
                }
                for (name, _) in dir.images() {
                    println!("{:6} {name}", "img");
                }
            }
            Some(Located::Node { node, .. }) => {
                for child in node.children() {
                    println!("{:6} {}", child.value().kind(), child.name());
                }
            }
            None => eyre::bail!("no object at '{path}' in the archive"),
        }

        Ok(())
    }
}
