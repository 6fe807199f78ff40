//! # wavtags
//!
//! Read and edit the metadata of RIFF (WAV) files.
//!
//! Two kinds of tags are supported: the RIFF `LIST`/`INFO` text entries
//! (`INAM`, `IART`, ...) and ID3v2.3 text frames (`TIT2`, `TPE1`, ...) in an
//! embedded `id3 ` chunk.
//!
//! ## Features
//!
//! - **Lossless**: audio data and unknown chunks are copied byte for byte
//! - **Low memory**: only metadata is read; payloads stay in the source file
//! - **Exact round-trip**: an unedited file is written back byte-identical
//! - **Atomic edits**: a batch of edits either applies fully or not at all
//!
//! ## Example
//!
//! ```no_run
//! use wavtags::{edit_file, EditOptions, TagEdit};
//! use std::path::Path;
//!
//! let edits: Vec<TagEdit> = ["INAM=Title", "TPE1=Artist"]
//!     .iter()
//!     .map(|s| s.parse().unwrap())
//!     .collect();
//! let bytes = edit_file(
//!     Path::new("in.wav"),
//!     Path::new("out.wav"),
//!     &edits,
//!     EditOptions::default(),
//! )
//! .unwrap();
//! println!("Wrote {} bytes", bytes);
//! ```
//!
//! ## Technical Details
//!
//! Parsing builds a chunk tree ([`riff::Chunk`]). Editing mutates it in
//! memory. Writing recomputes container lengths bottom-up, then serializes the
//! tree, pulling any payload not held in memory from the source file.

pub mod binary;
pub mod error;
pub mod id3;
pub mod riff;
pub mod syncsafe;
pub mod tags;
pub mod utf16;

pub use error::{Error, Result};
pub use id3::{Frame, Id3Tag, TextEncoding, TextFrame, FRAME_TYPES};
pub use riff::{read_riff, write_riff, Chunk, ChunkBody, Format, RiffFile, CHUNK_TYPES};
pub use tags::{apply_edits, collect_tags, EditOptions, EditValue, Namespace, TagEdit, TagEntry};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

/// Parse a RIFF file from disk
pub fn read_file(path: &Path) -> Result<RiffFile> {
    let mut src = BufReader::new(File::open(path)?);
    read_riff(&mut src)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Read `src_path`, apply `edits`, and write the result to `dst_path`.
///
/// Nothing is written if the input is incomplete or any edit fails. The
/// output must be a different file from the input, since unedited payloads
/// are copied from the input while the output is written.
///
/// Returns the number of bytes written.
pub fn edit_file(
    src_path: &Path,
    dst_path: &Path,
    edits: &[TagEdit],
    options: EditOptions,
) -> Result<u64> {
    if same_file(src_path, dst_path) {
        return Err(Error::SameFile(dst_path.to_path_buf()));
    }

    let mut src = BufReader::new(File::open(src_path)?);
    let RiffFile { mut root, truncated } = read_riff(&mut src)?;
    if let Some(err) = truncated {
        return Err(err);
    }

    apply_edits(&mut root, edits, options)?;

    let mut dst = BufWriter::new(File::create(dst_path).map_err(Error::WriteFailure)?);
    let written = write_riff(&mut root, &mut src, &mut dst)?;
    debug!(
        src = %src_path.display(),
        dst = %dst_path.display(),
        written,
        "edited file"
    );
    Ok(written)
}
