use std::{
    fs,
    io::{BufWriter, Write},
    ops::Deref,
    path::{Path, PathBuf},
};

use clap::{Args, ValueEnum};
use eyre::Context;
use image::{Rgba, RgbaImage};
use momiji_anim::{encode, extract, Compositor, Frame, Padding};
use momiji_wz::{Archive, Located, WzConfig};
use rayon::prelude::*;

use super::Command;
use crate::cli::{
    helpers::{self, TrackSpec},
    WzArgs,
};

/// Renders animations and canvases out of WZ archives.
#[derive(Debug, Args)]
pub struct Render {
    /// The path to the archive file to read from.
    pub archive: PathBuf,

    /// The object paths to render, one animation track each.
    ///
    /// Paths are `/`-separated and walk from the archive root through
    /// directories, an image, and into its properties. A value of the
    /// form `file.wz?inner/path` sources that track from a different
    /// archive, opened with the same version and region settings.
    #[clap(required = true)]
    pub paths: Vec<String>,

    #[clap(flatten)]
    pub wz: WzArgs,

    /// The optional output file to write the result to.
    ///
    /// If missing, a file named after the last segment of the first
    /// path will be created in the working directory.
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// The container format to encode.
    ///
    /// If missing, it is inferred from the output file extension,
    /// falling back to GIF.
    #[clap(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Padding in pixels around the composited content.
    #[clap(short, long, default_value_t = 10)]
    pub padding: u32,

    /// The background fill as an RRGGBB or RRGGBBAA hex color.
    #[clap(short, long, value_parser = helpers::parse_color, default_value = "000000")]
    pub background: Rgba<u8>,
}

/// The supported output encodings for rendered frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// An animated GIF repeating forever, with centisecond delays.
    #[default]
    Gif,
    /// An animated PNG with millisecond delays.
    Apng,
    /// A still PNG of the first frame.
    Png,
}

impl OutputFormat {
    fn infer(out: &Path) -> Self {
        match out.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("png") => Self::Png,
            Some(ext) if ext.eq_ignore_ascii_case("apng") => Self::Apng,
            _ => Self::Gif,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Apng => "apng",
            Self::Png => "png",
        }
    }
}

impl Command for Render {
    fn handle(self) -> eyre::Result<()> {
        let config = self.wz.config();
        let specs: Vec<_> = self.paths.iter().map(|raw| TrackSpec::parse(raw)).collect();

        let format = match self.format {
            Some(format) => format,
            None => self.output.as_deref().map(OutputFormat::infer).unwrap_or_default(),
        };
        let out = match self.output {
            Some(ref out) => out.clone(),
            None => default_output(&specs[0], format),
        };

        let main = open_archive(&self.archive, config)?;

        // A lone path naming a plain canvas renders as that bitmap
        // directly, without compositing.
        if let [spec] = specs.as_slice() {
            let archive = track_source(&main, spec, config)?;
            if let Some(Located::Node { view, node }) = archive.locate(&spec.path)? {
                if extract::is_canvas(node) {
                    let image = extract::decode_canvas(view, node)
                        .with_context(|| format!("failed to decode canvas at '{}'", spec.path))?;

                    log::info!("writing still canvas to '{}'", out.display());
                    return write_still(&out, format, image);
                }
            }
        }

        let mut tracks = specs
            .par_iter()
            .map(|spec| {
                let archive = track_source(&main, spec, config)?;
                extract_track(&archive, &spec.path)
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        let compositor = Compositor::new(Padding::uniform(self.padding), self.background);
        let frames = match tracks.len() {
            1 => compositor.process(tracks.remove(0))?,
            _ => compositor.process_tracks(tracks)?,
        };

        log::info!("writing {} frames to '{}'", frames.len(), out.display());
        write_output(&out, format, frames)
    }
}

/// The archive one track reads from, shared or privately opened.
enum Source<'a> {
    Shared(&'a Archive),
    Owned(Archive),
}

impl Deref for Source<'_> {
    type Target = Archive;

    fn deref(&self) -> &Archive {
        match self {
            Self::Shared(archive) => archive,
            Self::Owned(archive) => archive,
        }
    }
}

fn track_source<'a>(
    main: &'a Archive,
    spec: &TrackSpec,
    config: WzConfig,
) -> eyre::Result<Source<'a>> {
    match &spec.archive {
        Some(path) => open_archive(path, config).map(Source::Owned),
        None => Ok(Source::Shared(main)),
    }
}

fn open_archive(path: &Path, config: WzConfig) -> eyre::Result<Archive> {
    Archive::open_mmap(path, config)
        .with_context(|| format!("failed to open archive at '{}'", path.display()))
}

/// Extracts one track's frames from an object path.
///
/// Containers yield their numbered canvas children; a path naming a
/// single canvas yields a one-frame track with its own anchor and
/// delay.
fn extract_track(archive: &Archive, path: &str) -> eyre::Result<Vec<Frame>> {
    let located = archive
        .locate(path)
        .with_context(|| format!("failed to parse image for '{path}'"))?;

    let frames = match located {
        Some(Located::Node { view, node }) if extract::is_canvas(node) => {
            vec![extract::canvas_frame(view, node)?]
        }
        Some(Located::Node { view, node }) => extract::animation_frames(view, node)
            .with_context(|| format!("cannot render '{path}'"))?,
        Some(Located::Dir(_)) => {
            eyre::bail!("'{path}' names a directory; pass a path into an image instead")
        }
        None => eyre::bail!("no object at '{path}' in the archive"),
    };

    eyre::ensure!(!frames.is_empty(), "'{path}' has no renderable frames");
    Ok(frames)
}

fn write_output(out: &Path, format: OutputFormat, frames: Vec<Frame>) -> eyre::Result<()> {
    let mut writer = create_output(out)?;

    match format {
        OutputFormat::Gif => encode::write_gif(&mut writer, frames)?,
        OutputFormat::Apng => encode::write_apng(&mut writer, &frames)?,
        OutputFormat::Png => match frames.into_iter().next() {
            Some(first) => encode::write_png(&mut writer, &first.image)?,
            None => eyre::bail!("no frames to write"),
        },
    }

    writer.flush().map_err(Into::into)
}

fn write_still(out: &Path, format: OutputFormat, image: RgbaImage) -> eyre::Result<()> {
    let mut writer = create_output(out)?;

    match format {
        OutputFormat::Png => encode::write_png(&mut writer, &image)?,
        OutputFormat::Gif => {
            let frame = Frame::new(0, image, (0, 0), extract::DEFAULT_DELAY_MS);
            encode::write_gif(&mut writer, vec![frame])?;
        }
        OutputFormat::Apng => {
            let frame = Frame::new(0, image, (0, 0), extract::DEFAULT_DELAY_MS);
            encode::write_apng(&mut writer, &[frame])?;
        }
    }

    writer.flush().map_err(Into::into)
}

fn create_output(out: &Path) -> eyre::Result<BufWriter<fs::File>> {
    let file = fs::File::create(out)
        .with_context(|| format!("failed to create output file at '{}'", out.display()))?;

    Ok(BufWriter::new(file))
}

fn default_output(spec: &TrackSpec, format: OutputFormat) -> PathBuf {
    let stem = spec
        .path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("render");

    PathBuf::from(format!("{stem}.{}", format.extension()))
}
