//! Error types for wavtags

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wavtags operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while reading, editing or writing a file
#[derive(Error, Debug)]
pub enum Error {
    /// Fewer bytes were available than the structure requires
    #[error("Premature end of file reading {0}")]
    ShortRead(&'static str),

    /// Missing "RIFF" or "ID3" signature
    #[error("Data does not contain a {expected} header")]
    BadMagic { expected: &'static str },

    /// ID3v2 major version other than 3
    #[error("Data is not ID3v2.3 (found ID3v2.{major}.{minor})")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// A buffer sized from the file could not be allocated
    #[error("Out of memory allocating {0} bytes")]
    AllocationFailure(usize),

    /// The destination rejected a write
    #[error("Write failure: {0}")]
    WriteFailure(#[source] io::Error),

    /// Edit request tag that is empty or longer than 4 characters
    #[error("Unrecognized tag: \"{0}\"")]
    MalformedTag(String),

    /// A value-from-file source could not be read
    #[error("Unable to read string file \"{}\": {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Output path names the input file
    #[error("Input file and output file cannot be the same: {}", .0.display())]
    SameFile(PathBuf),

    /// Seek or read failure other than end of file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Map a read error, turning end-of-file into [`Error::ShortRead`]
    pub(crate) fn read(err: io::Error, what: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::ShortRead(what)
        } else {
            Error::Io(err)
        }
    }
}
