//! ID3v2.3 tag blocks
//!
//! An ID3 block embedded in a RIFF file is one leaf chunk whose payload is:
//! ```text
//! "ID3" major minor flags size(sync-safe)
//! frame*:  tag(4) length(sync-safe) flags(2, big-endian) payload(length)
//! padding: zero bytes up to `size`
//! ```
//!
//! Text frames are materialized in memory. Every other frame keeps only its
//! header; its payload is copied from the source file when the block is
//! written.

use crate::binary::{self, Payload};
use crate::error::{Error, Result};
use crate::syncsafe;
use crate::utf16;
use serde::Serialize;
use std::borrow::Cow;
use std::io::{Read, Seek, Write};
use tracing::{debug, warn};

/// Tag header size without extended header
pub const ID3_HEADER_SIZE: u32 = 10;

/// Frame header size
pub const ID3_FRAME_HEADER_SIZE: u32 = 10;

/// The only major version handled
pub const ID3_MAJOR_VERSION: u8 = 3;

// v2.3 frame header flags that change the frame layout
/// Adds a 4-byte decompressed size to the header (not handled)
pub const FLAG_COMPRESSION: u16 = 0x0080;
/// Adds a 1-byte encryption method (not handled)
pub const FLAG_ENCRYPTION: u16 = 0x0040;
/// Adds a 1-byte group identifier (not handled)
pub const FLAG_GROUPING: u16 = 0x0020;

/// Four-byte frame identifier
pub type FrameId = [u8; 4];

/// How a frame's payload is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameKind {
    /// Encoding byte + string, read into memory
    Text,
    /// Anything else, left in the source file
    Binary,
}

/// One row of the frame table
#[derive(Debug)]
pub struct FrameType {
    pub id: &'static str,
    pub description: &'static str,
    pub kind: FrameKind,
}

const fn text(id: &'static str, description: &'static str) -> FrameType {
    FrameType {
        id,
        description,
        kind: FrameKind::Text,
    }
}

const fn binary(id: &'static str, description: &'static str) -> FrameType {
    FrameType {
        id,
        description,
        kind: FrameKind::Binary,
    }
}

/// Frames defined by ID3v2.3, plus TDRC from v2.4
pub static FRAME_TYPES: &[FrameType] = &[
    binary("AENC", "Audio encryption"),
    binary("APIC", "Attached picture"),
    binary("COMM", "Comments"),
    binary("COMR", "Commercial frame"),
    binary("ENCR", "Encryption method registration"),
    binary("EQUA", "Equalization"),
    binary("ETCO", "Event timing codes"),
    binary("GEOB", "General encapsulated object"),
    binary("GRID", "Group identification registration"),
    binary("IPLS", "Involved people list"),
    binary("LINK", "Linked information"),
    binary("MCDI", "Music CD identifier"),
    binary("MLLT", "MPEG location lookup table"),
    binary("OWNE", "Ownership frame"),
    binary("PRIV", "Private frame"),
    binary("PCNT", "Play counter"),
    binary("POPM", "Popularimeter"),
    binary("POSS", "Position synchronisation frame"),
    binary("RBUF", "Recommended buffer size"),
    binary("RVAD", "Relative volume adjustment"),
    binary("RVRB", "Reverb"),
    binary("SYLT", "Synchronized lyric/text"),
    binary("SYTC", "Synchronized tempo codes"),
    text("TALB", "Album/Show"),
    text("TBPM", "Beats per minute"),
    text("TCOM", "Composer"),
    text("TCON", "Content type"),
    text("TCOP", "Copyright message"),
    text("TDAT", "Date"),
    text("TDLY", "Playlist delay"),
    text("TENC", "Encoded by"),
    text("TEXT", "Lyricist/Text writer"),
    text("TFLT", "File type"),
    text("TIME", "Time"),
    text("TIT1", "Content group description"),
    text("TIT2", "Title"),
    text("TIT3", "Subtitle"),
    text("TKEY", "Initial key"),
    text("TLAN", "Language(s)"),
    text("TLEN", "Length"),
    text("TMED", "Media type"),
    text("TOAL", "Original album/movie"),
    text("TOFN", "Original filename"),
    text("TOLY", "Original lyricist(s)/text writer(s)"),
    text("TOPE", "Original artist(s)"),
    text("TORY", "Original release year"),
    text("TOWN", "File owner/licensee"),
    text("TPE1", "Lead performer(s)"),
    text("TPE2", "Band"),
    text("TPE3", "Conductor"),
    text("TPE4", "Interpreted, remixed, or otherwise modified by"),
    text("TPOS", "Part of a set"),
    text("TPUB", "Publisher"),
    text("TRCK", "Track number"),
    text("TRDA", "Recording dates"),
    text("TRSN", "Internet radio station name"),
    text("TRSO", "Internet radio station owner"),
    text("TSIZ", "Size"),
    text("TSRC", "ISRC (international standard recording code)"),
    text("TSSE", "Software/Hardware and settings used for encoding"),
    text("TYER", "Year"),
    text("TXXX", "User defined text information frame"),
    binary("UFID", "Unique file identifier"),
    binary("USER", "Terms of use"),
    binary("USLT", "Unsychronized lyric/text transcription"),
    binary("WCOM", "Commercial information"),
    binary("WCOP", "Copyright/Legal information"),
    binary("WOAF", "Official audio file webpage"),
    binary("WOAR", "Official artist/performer webpage"),
    binary("WOAS", "Official audio source webpage"),
    binary("WORS", "Official internet radio station homepage"),
    binary("WPAY", "Payment"),
    binary("WPUB", "Publishers official webpage"),
    binary("WXXX", "User defined URL link frame"),
    // v2.4
    text("TDRC", "Recording time"),
];

/// Look up a frame by its exact identifier
pub fn find_frame_type(id: &[u8]) -> Option<&'static FrameType> {
    FRAME_TYPES.iter().find(|ft| ft.id.as_bytes() == id)
}

/// Look up a frame ignoring ASCII case
pub fn find_frame_type_ignore_case(id: &[u8]) -> Option<&'static FrameType> {
    FRAME_TYPES
        .iter()
        .find(|ft| ft.id.as_bytes().eq_ignore_ascii_case(id))
}

/// Text frame encoding selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Latin1,
    /// UTF-16 with a leading byte-order mark
    Utf16Bom,
    Utf16Be,
    Utf8,
    /// Unknown selector, kept so the frame still round-trips
    Other(u8),
}

impl From<u8> for TextEncoding {
    fn from(val: u8) -> Self {
        match val {
            0 => TextEncoding::Latin1,
            1 => TextEncoding::Utf16Bom,
            2 => TextEncoding::Utf16Be,
            3 => TextEncoding::Utf8,
            other => TextEncoding::Other(other),
        }
    }
}

impl From<TextEncoding> for u8 {
    fn from(encoding: TextEncoding) -> Self {
        match encoding {
            TextEncoding::Latin1 => 0,
            TextEncoding::Utf16Bom => 1,
            TextEncoding::Utf16Be => 2,
            TextEncoding::Utf8 => 3,
            TextEncoding::Other(val) => val,
        }
    }
}

/// Payload of a text frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFrame {
    pub encoding: TextEncoding,
    /// Encoded string bytes, excluding the encoding byte
    pub data: Vec<u8>,
}

impl TextFrame {
    /// Encode a string, as Latin-1 when every character fits, otherwise as
    /// UTF-16 with a little-endian byte-order mark.
    pub fn from_string(value: &str) -> Self {
        if value.chars().all(|c| (c as u32) <= 0xFF) {
            TextFrame {
                encoding: TextEncoding::Latin1,
                data: value.chars().map(|c| c as u8).collect(),
            }
        } else {
            let mut data = vec![0xFF, 0xFE];
            data.extend(value.encode_utf16().flat_map(|u| u.to_le_bytes()));
            TextFrame {
                encoding: TextEncoding::Utf16Bom,
                data,
            }
        }
    }

    /// Length of the frame payload: encoding byte plus string bytes
    pub fn payload_len(&self) -> u32 {
        self.data.len() as u32 + 1
    }

    /// Render the string, dropping trailing nul terminators
    pub fn text(&self) -> String {
        let rendered = match self.encoding {
            TextEncoding::Latin1 => self.data.iter().map(|&b| b as char).collect(),
            TextEncoding::Utf16Bom => {
                let mut cps = Vec::with_capacity(self.data.len() / 2);
                utf16::decode_bom(&self.data, &mut cps);
                utf16::to_string(&cps)
            }
            TextEncoding::Utf16Be => {
                let mut cps = Vec::with_capacity(self.data.len() / 2);
                utf16::decode_be(&self.data, &mut cps);
                utf16::to_string(&cps)
            }
            TextEncoding::Utf8 | TextEncoding::Other(_) => {
                String::from_utf8_lossy(&self.data).into_owned()
            }
        };
        rendered.trim_end_matches('\0').to_string()
    }

    fn read<R: Read>(src: &mut R, length: u32) -> Result<Self> {
        let [encoding] = binary::read_array::<_, 1>(src, "ID3 text frame")?;
        let data = binary::read_vec(src, length as usize - 1, "ID3 text frame")?;
        Ok(TextFrame {
            encoding: encoding.into(),
            data,
        })
    }
}

/// Frame contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Text(TextFrame),
    /// Payload left in the source file
    Generic(Payload),
}

/// One ID3 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: FrameId,
    /// Payload length as declared in the header
    pub length: u32,
    pub flags: u16,
    /// Position of the payload in the source file, 0 for new frames
    pub offset: u64,
    pub body: FrameBody,
}

impl Frame {
    /// Build a text frame from a string. The identifier is uppercased.
    pub fn text(id: FrameId, value: &str) -> Self {
        let text = TextFrame::from_string(value);
        Frame {
            id: id.map(|b| b.to_ascii_uppercase()),
            length: text.payload_len(),
            flags: 0,
            offset: 0,
            body: FrameBody::Text(text),
        }
    }

    /// Identifier as text
    pub fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.id)
    }

    /// Text payload, if this is a text frame
    pub fn as_text(&self) -> Option<&TextFrame> {
        match &self.body {
            FrameBody::Text(t) => Some(t),
            FrameBody::Generic(_) => None,
        }
    }

    /// Payload length that will be written
    pub fn payload_len(&self) -> u32 {
        match &self.body {
            FrameBody::Text(t) => t.payload_len(),
            FrameBody::Generic(_) => self.length,
        }
    }

    /// Header plus payload
    pub fn serialized_len(&self) -> u32 {
        ID3_FRAME_HEADER_SIZE + self.payload_len()
    }

    /// Read the frame whose header starts at `offset`.
    ///
    /// Returns `None` when the header starts with a zero byte, which marks
    /// the start of the tag's padding.
    pub fn read<R: Read + Seek>(src: &mut R, offset: u64) -> Result<Option<Self>> {
        binary::seek_to(src, offset)?;
        let header: [u8; 10] = binary::read_array(src, "ID3 frame header")?;
        if header[0] == 0 {
            return Ok(None);
        }

        let id: FrameId = [header[0], header[1], header[2], header[3]];
        let length = syncsafe::decode([header[4], header[5], header[6], header[7]]);
        let flags = binary::read_u16_be(&header[8..10]);
        let payload_offset = offset + ID3_FRAME_HEADER_SIZE as u64;

        if flags & (FLAG_COMPRESSION | FLAG_ENCRYPTION | FLAG_GROUPING) != 0 {
            warn!(
                frame = %String::from_utf8_lossy(&id),
                flags,
                "frame flags not handled, payload kept as-is"
            );
        }

        let body = match find_frame_type(&id) {
            Some(ft) if ft.kind == FrameKind::Text && length > 0 => {
                FrameBody::Text(TextFrame::read(src, length)?)
            }
            _ => FrameBody::Generic(Payload::Source {
                offset: payload_offset,
            }),
        };

        debug!(
            frame = %String::from_utf8_lossy(&id),
            offset = payload_offset,
            length,
            "read ID3 frame"
        );

        Ok(Some(Frame {
            id,
            length,
            flags,
            offset: payload_offset,
            body,
        }))
    }

    /// Write header and payload, returning the number of bytes written
    pub fn write<R, W>(&self, src: &mut R, dst: &mut W) -> Result<u64>
    where
        R: Read + Seek,
        W: Write,
    {
        let length = self.payload_len();
        let mut header = Vec::with_capacity(ID3_FRAME_HEADER_SIZE as usize + 1);
        header.extend_from_slice(&self.id);
        header.extend_from_slice(&syncsafe::encode(length));
        header.extend_from_slice(&self.flags.to_be_bytes());

        match &self.body {
            FrameBody::Text(t) => {
                header.push(t.encoding.into());
                binary::write_all(dst, &header)?;
                binary::write_all(dst, &t.data)?;
            }
            FrameBody::Generic(payload) => {
                binary::write_all(dst, &header)?;
                payload.write(length as u64, src, dst)?;
            }
        }

        Ok(ID3_FRAME_HEADER_SIZE as u64 + length as u64)
    }
}

/// An ID3v2 tag block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3Tag {
    pub major: u8,
    pub minor: u8,
    pub flags: u8,
    /// Bytes of frames and padding after the 10-byte header
    pub size: u32,
    pub frames: Vec<Frame>,
    /// Position of the block in the source file, 0 for new blocks
    pub offset: u64,
}

impl Default for Id3Tag {
    fn default() -> Self {
        Self::new()
    }
}

impl Id3Tag {
    /// Create an empty v2.3.0 tag
    pub fn new() -> Self {
        Id3Tag {
            major: ID3_MAJOR_VERSION,
            minor: 0,
            flags: 0,
            size: 0,
            frames: Vec::new(),
            offset: 0,
        }
    }

    /// Read a tag block starting at `offset`
    pub fn read<R: Read + Seek>(src: &mut R, offset: u64) -> Result<Self> {
        binary::seek_to(src, offset)?;
        let header: [u8; 10] = binary::read_array(src, "ID3 header")?;

        if &header[0..3] != b"ID3" {
            return Err(Error::BadMagic { expected: "ID3" });
        }
        let (major, minor) = (header[3], header[4]);
        if major != ID3_MAJOR_VERSION {
            return Err(Error::UnsupportedVersion { major, minor });
        }

        let mut tag = Id3Tag {
            major,
            minor,
            flags: header[5],
            size: syncsafe::decode([header[6], header[7], header[8], header[9]]),
            frames: Vec::new(),
            offset,
        };

        let end = offset + (ID3_HEADER_SIZE + tag.size) as u64;
        let mut pos = offset + ID3_HEADER_SIZE as u64;
        while pos + ID3_FRAME_HEADER_SIZE as u64 <= end {
            let Some(frame) = Frame::read(src, pos)? else {
                break;
            };
            pos += frame.serialized_len() as u64;
            tag.frames.push(frame);
        }

        debug!(
            offset,
            size = tag.size,
            frames = tag.frames.len(),
            "read ID3v2.{}.{} tag",
            major,
            minor
        );
        Ok(tag)
    }

    /// Sum of frame header and payload sizes
    pub fn frames_len(&self) -> u32 {
        self.frames.iter().map(Frame::serialized_len).sum()
    }

    /// Set `size` from the frames, rounded up to an even byte count
    pub fn recompute_size(&mut self) {
        let len = self.frames_len();
        self.size = len + len % 2;
    }

    /// Header plus declared size
    pub fn total_len(&self) -> u32 {
        ID3_HEADER_SIZE + self.size
    }

    /// Write the block. Space between the last frame and `size` is zero-filled.
    pub fn write<R, W>(&self, src: &mut R, dst: &mut W) -> Result<u64>
    where
        R: Read + Seek,
        W: Write,
    {
        let mut header = [0u8; ID3_HEADER_SIZE as usize];
        header[0..3].copy_from_slice(b"ID3");
        header[3] = self.major;
        header[4] = self.minor;
        header[5] = self.flags;
        header[6..10].copy_from_slice(&syncsafe::encode(self.size));
        binary::write_all(dst, &header)?;

        let mut written = ID3_HEADER_SIZE as u64;
        for frame in &self.frames {
            written += frame.write(src, dst)?;
        }

        let end = self.total_len() as u64;
        if written < end {
            binary::write_zeros(dst, end - written)?;
            written = end;
        }
        Ok(written)
    }
}
