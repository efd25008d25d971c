use std::{
    fs,
    io::{self, BufWriter, IsTerminal, Write},
    path::PathBuf,
};

use serde::Serialize;

/// Serializes `value` as JSON to the selected output source.
///
/// Terminal stdout gets a pretty-printed document for humans; files
/// and pipes receive the minified form for further processing.
pub fn serialize_to_output_source<T: Serialize>(
    out: Option<PathBuf>,
    value: &T,
) -> eyre::Result<()> {
    match out {
        Some(out) => {
            let mut writer = BufWriter::new(fs::File::create(&out)?);
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = io::stdout().lock();

            if stdout.is_terminal() {
                serde_json::to_writer_pretty(&mut stdout, value)?;
                writeln!(stdout)?;
            } else {
                serde_json::to_writer(&mut stdout, value)?;
            }
        }
    }

    Ok(())
}
