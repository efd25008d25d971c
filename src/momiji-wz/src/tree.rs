//! Directory trees of archives.
//!
//! Directories parse eagerly when an archive opens since they are tiny
//! compared to the images they index. Image property trees stay
//! untouched until something asks for them.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::{property::PropTree, WzError, WzReader};

/// A directory node: named subdirectories plus named images, both kept
/// in their on-disk order.
#[derive(Debug, Default)]
pub struct WzDirectory {
    /// The declared byte size of this entry.
    pub size: i32,
    /// The declared checksum of this entry.
    pub checksum: i32,
    /// Absolute offset of the entry list.
    pub offset: u32,
    dirs: IndexMap<String, WzDirectory>,
    images: IndexMap<String, WzImage>,
}

/// An image unit inside an archive.
///
/// Only the directory metadata is available until the owning archive
/// parses the property tree on first access.
#[derive(Debug)]
pub struct WzImage {
    /// The declared byte size of the image region.
    pub size: i32,
    /// The declared checksum of the image region.
    pub checksum: i32,
    /// Absolute offset of the image region.
    pub offset: u32,
    pub(crate) props: OnceCell<PropTree>,
}

impl WzImage {
    fn new(size: i32, checksum: i32, offset: u32) -> Self {
        Self {
            size,
            checksum,
            offset,
            props: OnceCell::new(),
        }
    }

    /// The parsed property tree, if it was already forced.
    pub fn props(&self) -> Option<&PropTree> {
        self.props.get()
    }
}

/// A named item found by path lookup in a directory tree.
#[derive(Clone, Copy, Debug)]
pub enum Entry<'a> {
    Dir(&'a WzDirectory),
    Img(&'a WzImage),
}

impl WzDirectory {
    /// Parses the entry list at `offset` and recurses into every
    /// subdirectory after the list ends, in on-disk order.
    pub(crate) fn parse(
        reader: &mut WzReader<'_>,
        offset: u32,
        size: i32,
        checksum: i32,
    ) -> Result<Self, WzError> {
        let mut images = IndexMap::new();

        reader.seek(u64::from(offset));
        let count = reader.read_compressed_int()?;

        let mut pending = Vec::new();
        for _ in 0..count {
            let tag = reader.read_u8()?;
            let (kind, name) = match tag {
                // A filler entry: 10 bytes of unused payload.
                1 => {
                    reader.skip(10);
                    continue;
                }
                // Metadata inline, name stored out of line near the
                // archive start.
                2 => {
                    let rel = reader.read_i32()?;
                    let target =
                        u64::from(reader.file_start()).saturating_add_signed(i64::from(rel));

                    let save = reader.position();
                    reader.seek(target);
                    let kind = reader.read_u8()?;
                    let name = reader.read_wz_string(true)?;
                    reader.seek(save);

                    (kind, name)
                }
                3 | 4 => (tag, reader.read_wz_string(true)?),
                tag => {
                    return Err(WzError::UnknownEntryTag {
                        tag,
                        offset: reader.position() - 1,
                    })
                }
            };

            let size = reader.read_compressed_int()?;
            let checksum = reader.read_compressed_int()?;
            let offset = reader.read_offset()?;

            match kind {
                3 => pending.push((name, offset, size, checksum)),
                4 => {
                    images.insert(name, WzImage::new(size, checksum, offset));
                }
                tag => {
                    return Err(WzError::UnknownEntryTag {
                        tag,
                        offset: reader.position(),
                    })
                }
            }
        }

        let mut dirs = IndexMap::new();
        for (name, offset, size, checksum) in pending {
            let sub = Self::parse(reader, offset, size, checksum)?;
            dirs.insert(name, sub);
        }

        Ok(Self {
            size,
            checksum,
            offset,
            dirs,
            images,
        })
    }

    /// Looks up a direct subdirectory by name.
    pub fn dir(&self, name: &str) -> Option<&WzDirectory> {
        self.dirs.get(name)
    }

    /// Looks up a direct image child by name.
    pub fn image(&self, name: &str) -> Option<&WzImage> {
        self.images.get(name)
    }

    /// Iterates over subdirectories in on-disk order.
    pub fn dirs(&self) -> impl ExactSizeIterator<Item = (&str, &WzDirectory)> {
        self.dirs.iter().map(|(name, dir)| (name.as_str(), dir))
    }

    /// Iterates over image children in on-disk order.
    pub fn images(&self) -> impl ExactSizeIterator<Item = (&str, &WzImage)> {
        self.images.iter().map(|(name, img)| (name.as_str(), img))
    }

    /// Walks a `/`-separated path below this directory.
    ///
    /// Lookups are case-sensitive. When a name exists both as a
    /// subdirectory and as an image, the subdirectory wins.
    pub fn entry(&self, path: &str) -> Option<Entry<'_>> {
        let mut dir = self;
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                if let Some(sub) = dir.dir(segment) {
                    return Some(Entry::Dir(sub));
                }
                return dir.image(segment).map(Entry::Img);
            }

            dir = dir.dir(segment)?;
        }

        Some(Entry::Dir(self))
    }

    /// Counts all images in this directory and below.
    pub fn image_count(&self) -> usize {
        self.images.len()
            + self
                .dirs
                .values()
                .map(WzDirectory::image_count)
                .sum::<usize>()
    }
}
