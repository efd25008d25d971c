//! Loading and accessing whole archive files.

use std::{fs, io::Read, path::Path};

use crate::{
    crypto::WzKey,
    property::{NodeRef, PropTree, WzSound},
    tree::{Entry, WzDirectory, WzImage},
    version::{encrypted_version, WzConfig},
    WzError, WzReader,
};
use memmap2::{Mmap, MmapOptions};

/// The magic bytes opening every archive file.
pub const MAGIC: [u8; 4] = *b"PKG1";

/// The fixed-size header at the start of an archive.
#[derive(Clone, Debug)]
pub struct WzHeader {
    /// Total size of the archive payload in bytes.
    pub file_size: u64,
    /// Absolute offset where the data section begins.
    pub file_start: u32,
    /// The NUL-terminated vendor string between header and data.
    pub copyright: String,
}

impl WzHeader {
    fn parse(reader: &mut WzReader<'_>) -> Result<Self, WzError> {
        let magic = reader.read_bytes(4)?;
        if magic != MAGIC {
            return Err(WzError::Magic);
        }

        let file_size = reader.read_u64()?;
        let file_start = reader.read_u32()?;

        let mut copyright = Vec::new();
        loop {
            match reader.read_u8()? {
                0 => break,
                b => copyright.push(b),
            }
        }

        Ok(Self {
            file_size,
            file_start,
            copyright: String::from_utf8_lossy(&copyright).into_owned(),
        })
    }
}

/// Representation of an archive loaded into memory.
///
/// This type is designed for reading existing archives and querying
/// directory and image information from them.
///
/// It supports two modes of interacting with an underlying archive
/// file: read or mmap.
pub struct Archive(ArchiveInner);

enum ArchiveInner {
    MemoryMapped(MemoryMappedArchive),
    Heap(HeapArchive),
}

impl Archive {
    /// Creates an archive from an open file in heap-allocated memory.
    ///
    /// See [`Archive::open_heap`] for further details.
    pub fn heap(file: fs::File, config: WzConfig) -> Result<Self, WzError> {
        HeapArchive::new(file, config).map(|a| Self(ArchiveInner::Heap(a)))
    }

    /// Creates an archive on the heap from a pre-allocated buffer
    /// holding the archive contents.
    ///
    /// See [`Archive::open_heap`] for further details.
    pub fn from_vec(buf: Vec<u8>, config: WzConfig) -> Result<Self, WzError> {
        HeapArchive::from_vec(buf, config).map(|a| Self(ArchiveInner::Heap(a)))
    }

    /// Opens a file at the given `path` and operates on it from
    /// heap-allocated memory.
    ///
    /// The file handle will be closed immediately after reading.
    ///
    /// This is the preferred option of working with relatively small
    /// files but it's always best to profile.
    pub fn open_heap<P: AsRef<Path>>(path: P, config: WzConfig) -> Result<Self, WzError> {
        HeapArchive::open(path, config).map(|a| Self(ArchiveInner::Heap(a)))
    }

    /// Creates an archive by mapping the open file into memory.
    ///
    /// See [`Archive::open_mmap`] for further details.
    pub fn mmap(file: fs::File, config: WzConfig) -> Result<Self, WzError> {
        MemoryMappedArchive::new(file, config).map(|a| Self(ArchiveInner::MemoryMapped(a)))
    }

    /// Opens a file at the given `path` and operates on it from a
    /// memory mapping.
    ///
    /// The file handle will be kept open for the entire lifetime of
    /// the [`Archive`] object.
    ///
    /// This is the preferred option of working with relatively large
    /// files but it's always best to profile.
    pub fn open_mmap<P: AsRef<Path>>(path: P, config: WzConfig) -> Result<Self, WzError> {
        MemoryMappedArchive::open(path, config).map(|a| Self(ArchiveInner::MemoryMapped(a)))
    }

    #[inline]
    fn state(&self) -> &State {
        match &self.0 {
            ArchiveInner::MemoryMapped(a) => &a.state,
            ArchiveInner::Heap(a) => &a.state,
        }
    }

    /// The raw bytes backing this archive.
    #[inline]
    pub fn data(&self) -> &[u8] {
        match &self.0 {
            ArchiveInner::MemoryMapped(a) => &a.mapping,
            ArchiveInner::Heap(a) => &a.data,
        }
    }

    /// The parsed archive header.
    #[inline]
    pub fn header(&self) -> &WzHeader {
        &self.state().header
    }

    /// The configuration this archive was opened with.
    #[inline]
    pub fn config(&self) -> WzConfig {
        self.state().config
    }

    /// The derived decryption keystream.
    #[inline]
    pub fn key(&self) -> &WzKey {
        &self.state().key
    }

    /// The root directory of the archive.
    #[inline]
    pub fn root(&self) -> &WzDirectory {
        &self.state().root
    }

    /// The total number of images across all directories.
    #[inline]
    pub fn len(&self) -> usize {
        self.root().image_count()
    }

    /// Whether the archive contains no images at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks a `/`-separated path from the root directory.
    #[inline]
    pub fn entry(&self, path: &str) -> Option<Entry<'_>> {
        self.root().entry(path)
    }

    /// Walks a `/`-separated path and returns the image it names.
    pub fn image_at(&self, path: &str) -> Option<&WzImage> {
        match self.entry(path)? {
            Entry::Img(img) => Some(img),
            Entry::Dir(_) => None,
        }
    }

    /// Resolves a `/`-separated path across the directory tree and
    /// into property trees, parsing images on demand.
    ///
    /// The path may stop at a directory, at an image (yielding its
    /// root node), or descend further into the image's properties.
    /// `Ok(None)` means some segment did not match anything.
    pub fn locate(&self, path: &str) -> Result<Option<Located<'_>>, WzError> {
        let mut dir = self.root();
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        while let Some(segment) = segments.next() {
            if let Some(sub) = dir.dir(segment) {
                dir = sub;
                continue;
            }

            let Some(image) = dir.image(segment) else {
                return Ok(None);
            };

            let mut node = self.props(image)?.root();
            for segment in segments {
                match node.child(segment) {
                    Some(child) => node = child,
                    None => return Ok(None),
                }
            }

            let view = self.img(image)?;
            return Ok(Some(Located::Node { view, node }));
        }

        Ok(Some(Located::Dir(dir)))
    }

    /// The property tree of `image`, parsing it on first access.
    ///
    /// Results are cached on the image, so repeated calls are cheap.
    /// `image` must belong to this archive.
    pub fn props<'a>(&'a self, image: &'a WzImage) -> Result<&'a PropTree, WzError> {
        image.props.get_or_try_init(|| {
            let mut reader = self.reader();
            PropTree::parse(&mut reader, u64::from(image.offset))
        })
    }

    /// Bundles `image`'s property tree with the bytes and key needed
    /// to decode its canvas and sound payloads.
    pub fn img<'a>(&'a self, image: &'a WzImage) -> Result<ImgView<'a>, WzError> {
        let tree = self.props(image)?;
        Ok(ImgView {
            data: self.data(),
            key: self.key(),
            tree,
        })
    }

    /// Slices the payload bytes of a parsed sound property.
    pub fn sound_data(&self, sound: &WzSound) -> Option<&[u8]> {
        let start = usize::try_from(sound.data_offset).ok()?;
        self.data()
            .get(start..start.saturating_add(sound.data_len as usize))
    }

    fn reader(&self) -> WzReader<'_> {
        let state = self.state();
        WzReader::new(self.data(), &state.key, state.header.file_start, state.hash)
    }
}

/// The outcome of a successful [`Archive::locate`] walk.
#[derive(Clone, Copy)]
pub enum Located<'a> {
    /// The path stopped at a directory.
    Dir(&'a WzDirectory),
    /// The path reached into an image: its root node for the image
    /// itself, or the named property below it.
    Node { view: ImgView<'a>, node: NodeRef<'a> },
}

/// Everything needed to decode payloads out of one image: its parsed
/// property tree plus the backing bytes and keystream.
///
/// Views are plain borrows, so handing them to worker threads is free.
#[derive(Clone, Copy)]
pub struct ImgView<'a> {
    /// The byte region the tree was parsed from.
    pub data: &'a [u8],
    /// The keystream for masked payloads.
    pub key: &'a WzKey,
    /// The parsed property tree.
    pub tree: &'a PropTree,
}

/// The parsed, immutable metadata shared by both archive modes.
struct State {
    header: WzHeader,
    config: WzConfig,
    key: WzKey,
    hash: u32,
    root: WzDirectory,
}

impl State {
    fn parse(data: &[u8], config: WzConfig) -> Result<Self, WzError> {
        let key = WzKey::derive(config.region);
        let hash = config.version_hash();

        let mut reader = WzReader::new(data, &key, 0, hash);
        let header = WzHeader::parse(&mut reader)?;
        log::debug!(
            "parsed archive header: {} payload bytes, data at {:#X}",
            header.file_size,
            header.file_start
        );

        reader.seek(u64::from(header.file_start));
        let stored = reader.read_u16()?;
        let computed = encrypted_version(hash);
        if stored != computed {
            return Err(WzError::VersionMismatch {
                version: config.version,
                stored,
                computed,
            });
        }

        let mut reader = WzReader::new(data, &key, header.file_start, hash);
        let root = WzDirectory::parse(&mut reader, header.file_start + 2, 0, 0)?;
        log::debug!("parsed directory tree with {} images", root.image_count());

        Ok(Self {
            header,
            config,
            key,
            hash,
            root,
        })
    }
}

struct MemoryMappedArchive {
    // The parsed header, key, and directory tree.
    state: State,

    // Internally kept memory mapping of the archive file contents.
    //
    // By guaranteed drop order, this will be unmapped before the
    // file below is closed.
    mapping: Mmap,

    // The backing file of the above mapping.
    //
    // Owned by this structure so the mapping never becomes invalid.
    // Closed when this structure is dropped.
    #[allow(unused)]
    file: fs::File,
}

impl MemoryMappedArchive {
    fn new(file: fs::File, config: WzConfig) -> Result<Self, WzError> {
        // SAFETY: We own the file and keep it around until the mapping
        // is closed; see comments in `MemoryMappedArchive` above.
        //
        // Since archive files are generally treated as read-only by us
        // and most other applications, we likely won't run into any
        // synchronization conflicts we need to account for.
        let mapping = unsafe { MmapOptions::new().populate().map(&file)? };
        let state = State::parse(&mapping, config)?;

        Ok(Self {
            state,
            mapping,
            file,
        })
    }

    fn open<P: AsRef<Path>>(path: P, config: WzConfig) -> Result<Self, WzError> {
        let file = fs::File::open(path)?;
        Self::new(file, config)
    }
}

struct HeapArchive {
    // The parsed header, key, and directory tree.
    state: State,

    // The raw archive data, allocated on the heap.
    data: Box<[u8]>,
}

impl HeapArchive {
    fn new(mut file: fs::File, config: WzConfig) -> Result<Self, WzError> {
        let mut buf = {
            let size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
            Vec::with_capacity(size)
        };
        file.read_to_end(&mut buf)?;

        Self::from_vec(buf, config)
    }

    fn from_vec(buf: Vec<u8>, config: WzConfig) -> Result<Self, WzError> {
        let data = buf.into_boxed_slice();
        let state = State::parse(&data, config)?;

        Ok(Self { state, data })
    }

    fn open<P: AsRef<Path>>(path: P, config: WzConfig) -> Result<Self, WzError> {
        let file = fs::File::open(path)?;
        Self::new(file, config)
    }
}
