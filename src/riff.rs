//! RIFF chunk trees
//!
//! RIFF file structure (all multi-byte fields little-endian):
//! ```text
//! RIFF len WAVE
//!   ├── fmt  (format: 16 bytes + optional extension)
//!   ├── LIST len INFO
//!   │     ├── INAM "title"
//!   │     └── IART "artist"
//!   ├── id3  (ID3v2.3 tag block)
//!   └── data (audio, never read into memory)
//! ```
//!
//! The reader builds a tree of [`Chunk`]s. Small metadata leaves are read
//! into memory; audio data and unknown chunks only record where their payload
//! lives, and the writer copies those bytes straight from the source file.

use crate::binary::{self, Payload};
use crate::error::{Error, Result};
use crate::id3::Id3Tag;
use serde::Serialize;
use std::borrow::Cow;
use std::io::{Read, Seek, Write};
use tracing::{debug, warn};

/// Tag + length
pub const CHUNK_HEADER_SIZE: u32 = 8;

/// Four-character chunk identifier
pub type FourCC = [u8; 4];

pub const RIFF: FourCC = *b"RIFF";
pub const LIST: FourCC = *b"LIST";
pub const INFO: FourCC = *b"INFO";
pub const ID3: FourCC = *b"ID3 ";

// fmt format codes
pub const FORMAT_PCM: u16 = 1;
pub const FORMAT_MS_ADPCM: u16 = 2;
pub const FORMAT_IEEE_FLOAT: u16 = 3;
pub const FORMAT_ALAW: u16 = 6;
pub const FORMAT_MULAW: u16 = 7;
pub const FORMAT_IMA_ADPCM: u16 = 17;
pub const FORMAT_CL_ADPCM: u16 = 512;
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// How a chunk's payload is read and written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Sub-type tag followed by child chunks
    List,
    /// Audio samples, copied through
    Data,
    /// `fmt ` header
    Format,
    /// Single string (INFO entries)
    Text,
    /// Single 32-bit integer
    Integer,
    /// Embedded ID3v2 block
    Id3,
}

/// One row of the chunk table
#[derive(Debug)]
pub struct ChunkType {
    pub id: &'static str,
    pub description: &'static str,
    pub kind: ChunkKind,
}

const fn chunk(id: &'static str, description: &'static str, kind: ChunkKind) -> ChunkType {
    ChunkType {
        id,
        description,
        kind,
    }
}

const fn info(id: &'static str, description: &'static str) -> ChunkType {
    chunk(id, description, ChunkKind::Text)
}

/// Known chunk tags. Anything else is kept as a generic copy-through chunk.
pub static CHUNK_TYPES: &[ChunkType] = &[
    chunk("LIST", "List", ChunkKind::List),
    chunk("data", "Audio data", ChunkKind::Data),
    chunk("fmt ", "Format", ChunkKind::Format),
    info("IARL", "Archival location"),
    info("IART", "Artist"),
    info("ICMS", "Commissioned"),
    info("ICMT", "Comments"),
    info("ICOP", "Copyright"),
    info("ICRD", "Creation date"),
    info("ICRP", "Cropped"),
    info("IDIM", "Dimensions"),
    info("IDPI", "Dots Per Inch"),
    info("IENG", "Engineer"),
    info("IGNR", "Genre"),
    info("IKEY", "Keywords"),
    info("ILGT", "Lightness"),
    info("IMED", "Medium"),
    info("INAM", "Name"),
    info("IPLT", "Palette Setting"),
    info("IPRD", "Product"),
    info("ISBJ", "Subject"),
    info("ISFT", "Software"),
    info("ISHP", "Sharpness"),
    info("ISRC", "Source"),
    info("ISRF", "Source Form"),
    info("ITCH", "Technician"),
    info("ITRK", "Track"),
    chunk("fact", "Samples", ChunkKind::Integer),
    chunk("slnt", "Silence", ChunkKind::Integer),
    chunk("id3 ", "ID3 Tags", ChunkKind::Id3),
];

/// Look up a chunk tag, ignoring ASCII case
pub fn find_chunk_type(id: &[u8]) -> Option<&'static ChunkType> {
    CHUNK_TYPES
        .iter()
        .find(|ct| ct.id.as_bytes().eq_ignore_ascii_case(id))
}

/// Decoded `fmt ` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Format {
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Bytes past the first 16, kept verbatim
    #[serde(skip)]
    pub extension: Vec<u8>,
}

impl Format {
    /// Size of the fixed part of the payload
    pub const SIZE: u32 = 16;

    fn from_bytes(data: &[u8]) -> Self {
        Format {
            format_code: binary::read_u16_le(&data[0..]),
            channels: binary::read_u16_le(&data[2..]),
            sample_rate: binary::read_u32_le(&data[4..]),
            byte_rate: binary::read_u32_le(&data[8..]),
            block_align: binary::read_u16_le(&data[12..]),
            bits_per_sample: binary::read_u16_le(&data[14..]),
            extension: data[Self::SIZE as usize..].to_vec(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE as usize + self.extension.len());
        binary::put_u16_le(&mut bytes, self.format_code);
        binary::put_u16_le(&mut bytes, self.channels);
        binary::put_u32_le(&mut bytes, self.sample_rate);
        binary::put_u32_le(&mut bytes, self.byte_rate);
        binary::put_u16_le(&mut bytes, self.block_align);
        binary::put_u16_le(&mut bytes, self.bits_per_sample);
        bytes.extend_from_slice(&self.extension);
        bytes
    }

    /// Payload length, extension included
    pub fn payload_len(&self) -> u32 {
        Self::SIZE + self.extension.len() as u32
    }

    /// Human-readable name of the format code
    pub fn format_name(&self) -> &'static str {
        match self.format_code {
            FORMAT_PCM => "PCM",
            FORMAT_MS_ADPCM => "Microsoft ADPCM",
            FORMAT_IEEE_FLOAT => "IEEE float",
            FORMAT_ALAW => "A-law",
            FORMAT_MULAW => "mu-law",
            FORMAT_IMA_ADPCM => "IMA ADPCM",
            FORMAT_CL_ADPCM => "CL ADPCM",
            FORMAT_EXTENSIBLE => "Extensible",
            _ => "unknown",
        }
    }
}

/// Payload of RIFF and LIST chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Sub-type, e.g. "WAVE" or "INFO"
    pub kind: FourCC,
    pub children: Vec<Chunk>,
}

impl Container {
    pub fn new(kind: FourCC) -> Self {
        Container {
            kind,
            children: Vec::new(),
        }
    }

    pub fn kind_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.kind)
    }

    /// Whether the sub-type matches, ignoring ASCII case
    pub fn is_kind(&self, kind: &[u8]) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }

    /// Depth-first search through the children and their descendants
    pub fn search(&self, pred: &dyn Fn(&Chunk) -> bool) -> Option<&Chunk> {
        self.children.iter().find_map(|child| child.search(pred))
    }

    /// Mutable depth-first search through the children and their descendants
    pub fn search_mut(&mut self, pred: &dyn Fn(&Chunk) -> bool) -> Option<&mut Chunk> {
        search_mut(&mut self.children, pred)
    }
}

/// Chunk contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkBody {
    Container(Container),
    Format(Format),
    Data(Payload),
    /// Raw string bytes, including any nul terminator and pad byte
    Text(Vec<u8>),
    Integer(u32),
    Id3(Id3Tag),
    /// Unrecognized tag, payload left in the source file
    Generic(Payload),
}

/// One node of a RIFF tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: FourCC,
    /// Payload length, excluding the 8-byte header
    pub length: u32,
    /// Position of the header in the source file, 0 for new chunks
    pub offset: u64,
    pub body: ChunkBody,
}

impl Chunk {
    /// New empty container, e.g. `Chunk::list(LIST, INFO)`
    pub fn list(id: FourCC, kind: FourCC) -> Self {
        Chunk {
            id,
            length: 4,
            offset: 0,
            body: ChunkBody::Container(Container::new(kind)),
        }
    }

    /// New text chunk: the string, a nul terminator, and a pad byte when
    /// needed to make the length even
    pub fn text(id: FourCC, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        if bytes.len() % 2 == 1 {
            bytes.push(0);
        }
        Chunk {
            id,
            length: bytes.len() as u32,
            offset: 0,
            body: ChunkBody::Text(bytes),
        }
    }

    /// New chunk holding an ID3 tag block
    pub fn id3(tag: Id3Tag) -> Self {
        Chunk {
            id: ID3,
            length: tag.total_len(),
            offset: 0,
            body: ChunkBody::Id3(tag),
        }
    }

    pub fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.id)
    }

    /// Whether the tag matches, ignoring ASCII case
    pub fn is(&self, id: &[u8]) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }

    pub fn as_container(&self) -> Option<&Container> {
        match &self.body {
            ChunkBody::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match &mut self.body {
            ChunkBody::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_format(&self) -> Option<&Format> {
        match &self.body {
            ChunkBody::Format(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_id3(&self) -> Option<&Id3Tag> {
        match &self.body {
            ChunkBody::Id3(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_id3_mut(&mut self) -> Option<&mut Id3Tag> {
        match &mut self.body {
            ChunkBody::Id3(tag) => Some(tag),
            _ => None,
        }
    }

    /// Text payload up to the first nul, for text chunks
    pub fn text_value(&self) -> Option<String> {
        match &self.body {
            ChunkBody::Text(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            _ => None,
        }
    }

    /// Value of an integer chunk (`fact`, `slnt`)
    pub fn integer_value(&self) -> Option<u32> {
        match self.body {
            ChunkBody::Integer(n) => Some(n),
            _ => None,
        }
    }

    /// Child chunks, empty for leaves
    pub fn children(&self) -> &[Chunk] {
        match &self.body {
            ChunkBody::Container(c) => &c.children,
            _ => &[],
        }
    }

    /// Depth-first search through this chunk and its descendants
    pub fn search(&self, pred: &dyn Fn(&Chunk) -> bool) -> Option<&Chunk> {
        if pred(self) {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.search(pred))
    }

    /// Read the chunk whose header starts at `offset`
    pub fn read<R: Read + Seek>(src: &mut R, offset: u64) -> Result<Self> {
        binary::seek_to(src, offset)?;
        let header: [u8; 8] = binary::read_array(src, "chunk header")?;
        let id: FourCC = [header[0], header[1], header[2], header[3]];
        let length = binary::read_u32_le(&header[4..8]);
        let payload = offset + CHUNK_HEADER_SIZE as u64;

        debug!(
            chunk = %String::from_utf8_lossy(&id),
            offset,
            length,
            "read chunk"
        );

        let body = match find_chunk_type(&id).map(|ct| ct.kind) {
            Some(ChunkKind::List) => {
                let kind: FourCC = binary::read_array(src, "LIST type")?;
                let mut list = Container::new(kind);
                read_children(src, payload, length, &mut list.children)?;
                ChunkBody::Container(list)
            }
            Some(ChunkKind::Format) => {
                if length < Format::SIZE {
                    return Err(Error::ShortRead("fmt payload"));
                }
                let bytes = binary::read_vec(src, length as usize, "fmt payload")?;
                ChunkBody::Format(Format::from_bytes(&bytes))
            }
            Some(ChunkKind::Data) => ChunkBody::Data(Payload::Source { offset: payload }),
            Some(ChunkKind::Text) => {
                ChunkBody::Text(binary::read_vec(src, length as usize, "text chunk")?)
            }
            Some(ChunkKind::Integer) if length == 4 => {
                let bytes: [u8; 4] = binary::read_array(src, "integer chunk")?;
                ChunkBody::Integer(u32::from_le_bytes(bytes))
            }
            Some(ChunkKind::Id3) => ChunkBody::Id3(Id3Tag::read(src, payload)?),
            Some(ChunkKind::Integer) | None => {
                ChunkBody::Generic(Payload::Source { offset: payload })
            }
        };

        Ok(Chunk {
            id,
            length,
            offset,
            body,
        })
    }

    /// Fix up lengths bottom-up before writing.
    ///
    /// Containers become `4 + Σ(8 + child.length)`. In-memory leaves take
    /// the length of what they hold. Copy-through chunks keep their length.
    /// ID3 chunks keep theirs unless the tag block has outgrown it, in which
    /// case the tag size is recomputed and the chunk grows to fit. Odd
    /// lengths are not padded.
    pub fn recompute_sizes(&mut self) {
        match &mut self.body {
            ChunkBody::Container(list) => {
                let mut length = 4u32;
                for child in &mut list.children {
                    child.recompute_sizes();
                    length = length
                        .saturating_add(CHUNK_HEADER_SIZE)
                        .saturating_add(child.length);
                }
                self.length = length;
            }
            ChunkBody::Format(fmt) => self.length = fmt.payload_len(),
            ChunkBody::Text(bytes) => self.length = bytes.len() as u32,
            ChunkBody::Data(Payload::Owned(bytes)) => self.length = bytes.len() as u32,
            ChunkBody::Integer(_) => self.length = 4,
            ChunkBody::Id3(tag) => {
                if tag.frames_len() > tag.size {
                    tag.recompute_size();
                }
                self.length = self.length.max(tag.total_len());
            }
            ChunkBody::Data(Payload::Source { .. }) | ChunkBody::Generic(_) => {}
        }
    }
}

fn search_mut<'a>(chunks: &'a mut [Chunk], pred: &dyn Fn(&Chunk) -> bool) -> Option<&'a mut Chunk> {
    for chunk in chunks.iter_mut() {
        if pred(chunk) {
            return Some(chunk);
        }
        if let ChunkBody::Container(list) = &mut chunk.body {
            if let Some(found) = search_mut(&mut list.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

/// Read children until `length` (which counts the 4-byte sub-type) is used up.
/// Children read before a failure stay in `children`.
fn read_children<R: Read + Seek>(
    src: &mut R,
    payload: u64,
    length: u32,
    children: &mut Vec<Chunk>,
) -> Result<()> {
    let mut consumed = 4u64;
    while consumed < length as u64 {
        let child = Chunk::read(src, payload + consumed)?;
        consumed += CHUNK_HEADER_SIZE as u64 + child.length as u64;
        children.push(child);
    }
    Ok(())
}

/// A parsed RIFF file
#[derive(Debug)]
pub struct RiffFile {
    /// The top-level `RIFF` container
    pub root: Chunk,
    /// Set when parsing stopped early; `root` then holds the chunks read so far
    pub truncated: Option<Error>,
}

impl RiffFile {
    pub fn is_complete(&self) -> bool {
        self.truncated.is_none()
    }

    /// Sub-type of the file, e.g. "WAVE"
    pub fn form_type(&self) -> Cow<'_, str> {
        match self.root.as_container() {
            Some(c) => c.kind_str(),
            None => Cow::Borrowed(""),
        }
    }

    /// The first `fmt ` chunk
    pub fn format(&self) -> Option<&Format> {
        self.root
            .search(&|c| c.is(b"fmt "))
            .and_then(Chunk::as_format)
    }
}

/// Parse a RIFF file from the start of `src`.
///
/// A bad header is an error. A failure further in leaves the chunks read so
/// far in [`RiffFile::root`] and the error in [`RiffFile::truncated`].
pub fn read_riff<R: Read + Seek>(src: &mut R) -> Result<RiffFile> {
    binary::seek_to(src, 0)?;
    let header: [u8; 12] = binary::read_array(src, "RIFF header")?;
    if header[0..4] != RIFF {
        return Err(Error::BadMagic { expected: "RIFF" });
    }
    let length = binary::read_u32_le(&header[4..8]);
    let mut list = Container::new([header[8], header[9], header[10], header[11]]);

    let truncated = match read_children(src, CHUNK_HEADER_SIZE as u64, length, &mut list.children) {
        Ok(()) => None,
        Err(e) => {
            warn!(
                chunks = list.children.len(),
                "RIFF tree incomplete: {}", e
            );
            Some(e)
        }
    };

    Ok(RiffFile {
        root: Chunk {
            id: RIFF,
            length,
            offset: 0,
            body: ChunkBody::Container(list),
        },
        truncated,
    })
}

/// Serializes a tree, keeping a running output offset
struct ChunkWriter<'a, R, W> {
    src: &'a mut R,
    dst: &'a mut W,
    offset: u64,
}

impl<R: Read + Seek, W: Write> ChunkWriter<'_, R, W> {
    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        binary::write_all(self.dst, bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn emit_header(&mut self, chunk: &Chunk) -> Result<()> {
        let mut header = [0u8; CHUNK_HEADER_SIZE as usize];
        header[0..4].copy_from_slice(&chunk.id);
        header[4..8].copy_from_slice(&chunk.length.to_le_bytes());
        self.emit(&header)
    }

    fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        debug!(
            chunk = %chunk.id_str(),
            offset = self.offset,
            length = chunk.length,
            "write chunk"
        );
        self.emit_header(chunk)?;

        match &chunk.body {
            ChunkBody::Container(list) => {
                self.emit(&list.kind)?;
                for child in &list.children {
                    self.write_chunk(child)?;
                }
            }
            ChunkBody::Format(fmt) => self.emit(&fmt.to_bytes())?,
            ChunkBody::Text(bytes) => self.emit(bytes)?,
            ChunkBody::Integer(n) => self.emit(&n.to_le_bytes())?,
            ChunkBody::Data(payload) | ChunkBody::Generic(payload) => {
                self.offset += payload.write(chunk.length as u64, self.src, self.dst)?;
            }
            ChunkBody::Id3(tag) => {
                let written = tag.write(self.src, self.dst)?;
                self.offset += written;
                if written < chunk.length as u64 {
                    binary::write_zeros(self.dst, chunk.length as u64 - written)?;
                    self.offset += chunk.length as u64 - written;
                }
            }
        }
        Ok(())
    }
}

/// Recompute sizes, then write the tree to `dst`.
///
/// Copy-through payloads are read from `src`, which must be the file the tree
/// was parsed from. Returns the number of bytes written.
pub fn write_riff<R, W>(root: &mut Chunk, src: &mut R, dst: &mut W) -> Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    root.recompute_sizes();
    let mut writer = ChunkWriter {
        src,
        dst,
        offset: 0,
    };
    writer.write_chunk(root)?;
    writer.dst.flush().map_err(Error::WriteFailure)?;
    Ok(writer.offset)
}
