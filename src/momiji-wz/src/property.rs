//! Typed property trees inside `.img` units.
//!
//! Properties form a named tree: scalars at the leaves, containers
//! (sub-properties, canvases, convex shapes) in between, and link
//! properties aliasing other nodes by relative path. Nodes live in a
//! per-image arena and reference each other through [`NodeId`]s, which
//! keeps parent back-references cycle-free.

use smartstring::alias::String as WzString;

use crate::{canvas::PixelBlock, WzError, WzReader};

/// Byte length of the codec header blob inside sound properties.
pub const SOUND_HEADER_LEN: usize = 82;

/// Names in link chains resolve through at most this many hops.
const MAX_LINK_HOPS: usize = 16;

const IMG_SIGNATURE: &str = "Property";

/// Handle to one node within a [`PropTree`] arena.
///
/// Ids are only meaningful for the tree that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single named node in the property arena.
#[derive(Debug)]
struct PropNode {
    name: WzString,
    parent: Option<NodeId>,
    value: WzValue,
}

/// The payload of a property node.
#[derive(Debug)]
pub enum WzValue {
    /// An empty placeholder value.
    Null,
    /// A 16-bit integer, also used for boolean flags.
    Short(u16),
    /// A compressed 32-bit integer.
    Int(i32),
    /// A 32-bit float.
    Float(f32),
    /// A 64-bit float.
    Double(f64),
    /// A string value.
    String(WzString),
    /// A 2D point.
    Vector(WzVector),
    /// A nested list of named children.
    Sub(Vec<NodeId>),
    /// A bitmap with optional metadata children.
    Canvas(WzCanvas),
    /// A convex shape; children are unnamed extended values.
    Convex(Vec<NodeId>),
    /// A sound blob; header parsed, payload deferred.
    Sound(WzSound),
    /// An alias to another node, resolved lazily by relative path.
    Link(WzString),
}

impl WzValue {
    /// A short lowercase word naming the payload kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Vector(_) => "vector",
            Self::Sub(_) => "sub",
            Self::Canvas(_) => "canvas",
            Self::Convex(_) => "convex",
            Self::Sound(_) => "sound",
            Self::Link(_) => "link",
        }
    }
}

/// A 2D integer point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WzVector {
    pub x: i32,
    pub y: i32,
}

/// A canvas payload: optional metadata children plus one pixel block.
#[derive(Debug)]
pub struct WzCanvas {
    pub children: Vec<NodeId>,
    pub block: PixelBlock,
}

/// Parsed metadata of a `Sound_DX8` property.
///
/// The payload is not read during parsing; [`WzSound::data_offset`]
/// and [`WzSound::data_len`] locate it in the image's byte region.
#[derive(Debug)]
pub struct WzSound {
    /// Playback duration in milliseconds.
    pub duration_ms: i32,
    /// The raw 82-byte codec header.
    pub header: Vec<u8>,
    /// Absolute offset of the payload bytes.
    pub data_offset: u64,
    /// Payload length in bytes, excluding the header.
    pub data_len: u32,
}

/// The parsed property tree of one `.img` unit.
///
/// The tree always carries a nameless root node whose children are the
/// image's top-level properties; relative link paths can ascend up to
/// it but never beyond. Trees parse in one pass and are immutable
/// afterwards, which makes shared read access across threads safe.
#[derive(Debug)]
pub struct PropTree {
    nodes: Vec<PropNode>,
    names_encrypted: bool,
}

impl Default for PropTree {
    fn default() -> Self {
        Self {
            nodes: vec![PropNode {
                name: WzString::new(),
                parent: None,
                value: WzValue::Sub(Vec::new()),
            }],
            names_encrypted: true,
        }
    }
}

impl PropTree {
    const ROOT: NodeId = NodeId(0);
    /// Parses a bare `.img` byte blob outside any archive.
    ///
    /// String pool references resolve relative to the start of `data`.
    pub fn parse_img(data: &[u8], key: &crate::crypto::WzKey) -> Result<Self, WzError> {
        let mut reader = WzReader::new(data, key, 0, 0);
        Self::parse(&mut reader, 0)
    }

    /// Parses the property tree of an image region starting at `base`.
    ///
    /// A region that does not open with the expected image signature
    /// yields an empty tree without an error; legacy tooling produced
    /// such entries and every client silently skips them.
    pub fn parse(reader: &mut WzReader<'_>, base: u64) -> Result<Self, WzError> {
        let mut tree = Self::default();

        reader.seek(base);
        if reader.read_u8()? != 0x73 {
            log::warn!("image region at {base:#X} lacks a property signature, leaving it empty");
            return Ok(tree);
        }

        // Some distributions store property names unencrypted; probe
        // with the keystream first and retry plain on mismatch.
        let probe = reader.position();
        let mut encrypted = true;
        let mut signature = reader.read_wz_string(true).unwrap_or_default();
        if signature != IMG_SIGNATURE {
            reader.seek(probe);
            encrypted = false;
            signature = reader.read_wz_string(false).unwrap_or_default();
        }

        if signature != IMG_SIGNATURE || reader.read_u16()? != 0 {
            log::warn!("image region at {base:#X} lacks a property signature, leaving it empty");
            return Ok(tree);
        }

        tree.names_encrypted = encrypted;
        let children = tree.parse_property_list(reader, base, encrypted, Some(Self::ROOT))?;
        tree.nodes[Self::ROOT.index()].value = WzValue::Sub(children);

        Ok(tree)
    }

    /// Whether property names in this image were keystream-encrypted.
    #[inline]
    pub fn names_encrypted(&self) -> bool {
        self.names_encrypted
    }

    /// Whether the tree holds no properties at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root().children().len() == 0
    }

    /// Resolves a [`NodeId`] back into a node reference.
    ///
    /// The id must originate from this tree.
    #[inline]
    pub fn get(&self, id: NodeId) -> NodeRef<'_> {
        debug_assert!(id.index() < self.nodes.len());
        NodeRef { tree: self, id }
    }

    /// The nameless root node above the top-level properties.
    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        self.get(Self::ROOT)
    }

    /// Iterates over the top-level properties of the image.
    pub fn props(&self) -> impl ExactSizeIterator<Item = NodeRef<'_>> {
        self.root().children()
    }

    /// Walks a `/`-separated path starting at the top-level list.
    pub fn at(&self, path: &str) -> Option<NodeRef<'_>> {
        self.root().at(path)
    }

    fn push(&mut self, name: WzString, parent: Option<NodeId>, value: WzValue) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PropNode {
            name,
            parent,
            value,
        });

        id
    }

    fn parse_property_list(
        &mut self,
        reader: &mut WzReader<'_>,
        base: u64,
        encrypted: bool,
        parent: Option<NodeId>,
    ) -> Result<Vec<NodeId>, WzError> {
        let count = reader.read_compressed_int()?;
        let mut children = Vec::with_capacity((count.max(0) as usize).min(4096));

        for _ in 0..count {
            let name: WzString = reader.read_string_block(base, encrypted)?.into();
            let tag = reader.read_u8()?;

            log::trace!("property `{name}` with tag {tag:#04X}");

            if tag == 9 {
                let declared = reader.read_u32()?;
                let end = reader.position().saturating_add(u64::from(declared));

                let id = self.push(name, parent, WzValue::Null);
                let value = self.parse_extended(reader, base, encrypted, id)?;
                self.nodes[id.index()].value = value;
                children.push(id);

                // The declared block length wins over whatever the
                // recursive parse consumed. Decoders disagreeing with
                // encoders about a block's layout stay contained here.
                reader.seek(end);
            } else if let Some(value) = parse_scalar(reader, base, encrypted, tag, &name)? {
                let id = self.push(name, parent, value);
                children.push(id);
            }
        }

        Ok(children)
    }

    fn parse_extended(
        &mut self,
        reader: &mut WzReader<'_>,
        base: u64,
        encrypted: bool,
        id: NodeId,
    ) -> Result<WzValue, WzError> {
        let kind = match reader.read_u8()? {
            0x1B => {
                let rel = reader.read_i32()?;
                let target = base.saturating_add_signed(i64::from(rel));
                reader.read_string_at(target, encrypted)?
            }
            0x73 => reader.read_wz_string(encrypted)?,
            tag => {
                return Err(WzError::UnknownExtendedTag {
                    tag,
                    offset: reader.position() - 1,
                })
            }
        };

        let value = match kind.as_str() {
            "Property" => {
                reader.skip(2);
                WzValue::Sub(self.parse_property_list(reader, base, encrypted, Some(id))?)
            }
            "Canvas" => {
                reader.skip(1);
                let children = match reader.read_u8()? {
                    1 => {
                        reader.skip(2);
                        self.parse_property_list(reader, base, encrypted, Some(id))?
                    }
                    _ => Vec::new(),
                };

                let block = PixelBlock::parse(reader)?;
                WzValue::Canvas(WzCanvas { children, block })
            }
            "Shape2D#Vector2D" => WzValue::Vector(WzVector {
                x: reader.read_compressed_int()?,
                y: reader.read_compressed_int()?,
            }),
            "Shape2D#Convex2D" => {
                let count = reader.read_compressed_int()?;
                let mut children = Vec::with_capacity((count.max(0) as usize).min(4096));

                // Convex children carry no names on disk; they are
                // positional extended values only.
                for _ in 0..count {
                    let child = self.push(WzString::new(), Some(id), WzValue::Null);
                    let value = self.parse_extended(reader, base, encrypted, child)?;
                    self.nodes[child.index()].value = value;
                    children.push(child);
                }

                WzValue::Convex(children)
            }
            "Sound_DX8" => {
                reader.skip(1);
                let data_len = reader.read_compressed_int()?;
                let duration_ms = reader.read_compressed_int()?;
                let header = reader.read_bytes(SOUND_HEADER_LEN)?;

                // Payload bytes stay in place; the end-of-block seek
                // in the caller steps over them.
                WzValue::Sound(WzSound {
                    duration_ms,
                    header,
                    data_offset: reader.position(),
                    data_len: data_len.max(0) as u32,
                })
            }
            "UOL" => {
                reader.skip(1);
                let path = match reader.read_u8()? {
                    0 => reader.read_wz_string(encrypted)?,
                    1 => {
                        let rel = reader.read_i32()?;
                        let target = base.saturating_add_signed(i64::from(rel));
                        reader.read_string_at(target, encrypted)?
                    }
                    tag => {
                        return Err(WzError::UnknownExtendedTag {
                            tag,
                            offset: reader.position() - 1,
                        })
                    }
                };

                WzValue::Link(path.into())
            }
            other => return Err(WzError::UnknownExtendedType(other.to_string())),
        };

        Ok(value)
    }
}

fn parse_scalar(
    reader: &mut WzReader<'_>,
    base: u64,
    encrypted: bool,
    tag: u8,
    name: &str,
) -> Result<Option<WzValue>, WzError> {
    let value = match tag {
        0 => WzValue::Null,
        2 | 0x0B => WzValue::Short(reader.read_u16()?),
        3 => WzValue::Int(reader.read_compressed_int()?),
        4 => match reader.read_u8()? {
            0x80 => WzValue::Float(reader.read_f32()?),
            0 => WzValue::Float(0.0),
            mode => {
                // The original decoders drop the property entirely in
                // this case, so inventing a value here would change
                // sibling sets.
                log::debug!("float property `{name}` with unhandled mode {mode:#04X}, dropped");
                return Ok(None);
            }
        },
        5 => WzValue::Double(reader.read_f64()?),
        8 => WzValue::String(reader.read_string_block(base, encrypted)?.into()),
        tag => {
            return Err(WzError::UnknownPropertyTag {
                tag,
                offset: reader.position() - 1,
            })
        }
    };

    Ok(Some(value))
}

/// A borrowed view of one property node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a PropTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    /// The id of this node within its tree.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The name of this node. Convex children have empty names.
    #[inline]
    pub fn name(&self) -> &'a str {
        &self.tree.nodes[self.id.index()].name
    }

    /// The payload of this node.
    #[inline]
    pub fn value(&self) -> &'a WzValue {
        &self.tree.nodes[self.id.index()].value
    }

    /// The structural parent, if this is not a top-level property.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        let parent = self.tree.nodes[self.id.index()].parent?;
        Some(NodeRef {
            tree: self.tree,
            id: parent,
        })
    }

    fn child_ids(&self) -> &'a [NodeId] {
        match self.value() {
            WzValue::Sub(children) | WzValue::Convex(children) => children,
            WzValue::Canvas(canvas) => &canvas.children,
            _ => &[],
        }
    }

    /// Iterates over direct children in on-disk order.
    pub fn children(&self) -> impl ExactSizeIterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.child_ids().iter().map(move |&id| NodeRef { tree, id })
    }

    /// Looks up a direct child by name. Comparison is case-sensitive.
    pub fn child(&self, name: &str) -> Option<NodeRef<'a>> {
        self.children().find(|c| c.name() == name)
    }

    /// Walks a `/`-separated path of child names below this node.
    pub fn at(&self, path: &str) -> Option<NodeRef<'a>> {
        let mut node = *self;
        for segment in path.split('/') {
            node = node.child(segment)?;
        }

        Some(node)
    }

    /// Follows link values until a concrete node is reached.
    ///
    /// On a non-link node this is the identity. Unresolvable paths and
    /// overly long link chains yield [`None`].
    pub fn resolve(&self) -> Option<NodeRef<'a>> {
        let mut node = *self;
        for _ in 0..MAX_LINK_HOPS {
            match node.value() {
                WzValue::Link(path) => node = node.resolve_link(path)?,
                _ => return Some(node),
            }
        }

        log::warn!("link chain exceeding {MAX_LINK_HOPS} hops at `{}`", self.name());
        None
    }

    /// Resolves one link path: `..` segments move to the structural
    /// parent, all other segments look up a child by name. The walk
    /// starts at the parent of the referencing node.
    fn resolve_link(&self, path: &str) -> Option<NodeRef<'a>> {
        let mut node = self.parent()?;
        for segment in path.split('/') {
            node = match segment {
                ".." => node.parent()?,
                name => node.child(name)?,
            };
        }

        Some(node)
    }

    /// The node's integer interpretation, if it has one.
    ///
    /// Shorts widen and strings parse; everything else is [`None`].
    pub fn int_value(&self) -> Option<i32> {
        match self.value() {
            WzValue::Int(v) => Some(*v),
            WzValue::Short(v) => Some(i32::from(*v)),
            WzValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The node's string payload, if it is a string.
    pub fn string_value(&self) -> Option<&'a str> {
        match self.value() {
            WzValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The node's point payload, if it is a vector.
    pub fn vector(&self) -> Option<WzVector> {
        match self.value() {
            WzValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// The node's canvas payload, if it is a canvas.
    pub fn canvas(&self) -> Option<&'a WzCanvas> {
        match self.value() {
            WzValue::Canvas(c) => Some(c),
            _ => None,
        }
    }

    /// The node's sound payload, if it is a sound.
    pub fn sound(&self) -> Option<&'a WzSound> {
        match self.value() {
            WzValue::Sound(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("name", &self.name())
            .field("value", self.value())
            .finish()
    }
}

#[cfg(feature = "serde")]
mod ser {
    use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

    use super::*;

    // Summary shapes for payloads that do not embed into JSON.

    #[derive(serde::Serialize)]
    struct CanvasMeta {
        width: u32,
        height: u32,
        format: i32,
    }

    #[derive(serde::Serialize)]
    struct SoundMeta {
        duration_ms: i32,
        size: u32,
    }

    impl Serialize for PropTree {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let props = self.props();
            let mut map = serializer.serialize_map(Some(props.len()))?;
            for prop in props {
                map.serialize_entry(prop.name(), &prop)?;
            }
            map.end()
        }
    }

    impl Serialize for NodeRef<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self.value() {
                WzValue::Null => serializer.serialize_unit(),
                WzValue::Short(v) => serializer.serialize_u16(*v),
                WzValue::Int(v) => serializer.serialize_i32(*v),
                WzValue::Float(v) => serializer.serialize_f32(*v),
                WzValue::Double(v) => serializer.serialize_f64(*v),
                WzValue::String(s) => serializer.serialize_str(s),
                WzValue::Link(path) => {
                    let path: &str = path;
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry("$link", path)?;
                    map.end()
                }
                WzValue::Vector(v) => {
                    let mut map = serializer.serialize_map(Some(2))?;
                    map.serialize_entry("x", &v.x)?;
                    map.serialize_entry("y", &v.y)?;
                    map.end()
                }
                WzValue::Sub(children) => {
                    let mut map = serializer.serialize_map(Some(children.len()))?;
                    for child in self.children() {
                        map.serialize_entry(child.name(), &child)?;
                    }
                    map.end()
                }
                WzValue::Convex(children) => {
                    let mut seq = serializer.serialize_seq(Some(children.len()))?;
                    for child in self.children() {
                        seq.serialize_element(&child)?;
                    }
                    seq.end()
                }
                WzValue::Canvas(canvas) => {
                    let mut map = serializer.serialize_map(Some(canvas.children.len() + 1))?;
                    map.serialize_entry(
                        "$canvas",
                        &CanvasMeta {
                            width: canvas.block.width,
                            height: canvas.block.height,
                            format: canvas.block.format,
                        },
                    )?;
                    for child in self.children() {
                        map.serialize_entry(child.name(), &child)?;
                    }
                    map.end()
                }
                WzValue::Sound(sound) => {
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry(
                        "$sound",
                        &SoundMeta {
                            duration_ms: sound.duration_ms,
                            size: sound.data_len,
                        },
                    )?;
                    map.end()
                }
            }
        }
    }
}
