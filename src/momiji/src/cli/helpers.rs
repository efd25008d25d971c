use std::path::PathBuf;

use image::Rgba;

/// One animation track requested on the command line.
///
/// A plain value is an object path into the main archive. Prefixing
/// the path with `file.wz?` sources that track from a different
/// archive instead, opened with the same key material.
#[derive(Clone, Debug)]
pub struct TrackSpec {
    /// An archive overriding the main one for this track, if any.
    pub archive: Option<PathBuf>,
    /// The `/`-separated object path inside the archive.
    pub path: String,
}

impl TrackSpec {
    /// Splits a raw command line value into its archive and path parts.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('?') {
            Some((archive, path)) => Self {
                archive: Some(PathBuf::from(archive)),
                path: path.to_string(),
            },
            None => Self {
                archive: None,
                path: raw.to_string(),
            },
        }
    }
}

/// Parses an `RRGGBB` or `RRGGBBAA` hex color, with an optional `#`.
pub fn parse_color(raw: &str) -> Result<Rgba<u8>, String> {
    let hex = raw.strip_prefix('#').unwrap_or(raw);
    if !hex.is_ascii() || !matches!(hex.len(), 6 | 8) {
        return Err(format!("expected RRGGBB or RRGGBBAA, got '{raw}'"));
    }

    // Alpha defaults to opaque when only three channels are given.
    let mut channels = [0xFF; 4];
    for (i, channel) in channels[..hex.len() / 2].iter_mut().enumerate() {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| format!("invalid hex digits in '{raw}'"))?;
    }

    Ok(Rgba(channels))
}
