//! Fixed-width field helpers and copy-through I/O shared by the RIFF and ID3 layers

use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Buffer size for file-to-file copies
const COPY_BUFFER_SIZE: usize = 8192;

/// Most memory reserved up front by [`read_vec`]; the rest grows as bytes arrive
const READ_RESERVE_LIMIT: usize = 64 * 1024;

/// Where a leaf's payload bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Materialized in memory
    Owned(Vec<u8>),
    /// Left in the source file, starting at `offset`, copied through on write
    Source { offset: u64 },
}

impl Payload {
    /// Write `len` payload bytes to `dst`, pulling from `src` when not in memory
    pub fn write<R, W>(&self, len: u64, src: &mut R, dst: &mut W) -> Result<u64>
    where
        R: Read + Seek,
        W: Write,
    {
        match self {
            Payload::Owned(bytes) => {
                write_all(dst, bytes)?;
                Ok(bytes.len() as u64)
            }
            Payload::Source { offset } => copy_through(src, *offset, len, dst),
        }
    }
}

/// Read u16 little-endian from slice
pub fn read_u16_le(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

/// Read u32 little-endian from slice
pub fn read_u32_le(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// Read u16 big-endian from slice
pub fn read_u16_be(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

/// Append u16 little-endian
pub fn put_u16_le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append u32 little-endian
pub fn put_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Read exactly `N` bytes, naming `what` on a short read
pub fn read_array<R: Read, const N: usize>(src: &mut R, what: &'static str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf).map_err(|e| Error::read(e, what))?;
    Ok(buf)
}

/// Read `len` bytes into a freshly allocated buffer.
///
/// `len` usually comes straight from the file, so the buffer only grows as
/// far as the source actually has bytes.
pub fn read_vec<R: Read>(src: &mut R, len: usize, what: &'static str) -> Result<Vec<u8>> {
    let reserve = len.min(READ_RESERVE_LIMIT);
    let mut buf = Vec::new();
    buf.try_reserve_exact(reserve).map_err(|_| Error::AllocationFailure(reserve))?;
    let got = src
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(|e| Error::read(e, what))?;
    if got < len {
        return Err(Error::ShortRead(what));
    }
    Ok(buf)
}

/// Seek to an absolute position
pub fn seek_to<S: Seek>(src: &mut S, offset: u64) -> Result<()> {
    src.seek(SeekFrom::Start(offset))?;
    Ok(())
}

/// Write all bytes, reporting failures as [`Error::WriteFailure`]
pub fn write_all<W: Write>(dst: &mut W, bytes: &[u8]) -> Result<()> {
    dst.write_all(bytes).map_err(Error::WriteFailure)
}

/// Write `len` zero bytes
pub fn write_zeros<W: Write>(dst: &mut W, len: u64) -> Result<()> {
    let zeros = [0u8; 64];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(zeros.len() as u64) as usize;
        write_all(dst, &zeros[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Copy `len` bytes starting at `offset` in `src` to `dst`
pub fn copy_through<R, W>(src: &mut R, offset: u64, len: u64, dst: &mut W) -> Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    seek_to(src, offset)?;
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(COPY_BUFFER_SIZE as u64) as usize;
        let got = match src.read(&mut buffer[..want]) {
            Ok(0) => return Err(Error::ShortRead("source data")),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        write_all(dst, &buffer[..got])?;
        remaining -= got as u64;
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_le_fields() {
        let data = [0x34, 0x12, 0x78, 0x56];
        assert_eq!(read_u16_le(&data), 0x1234);
        assert_eq!(read_u32_le(&data), 0x5678_1234);
        assert_eq!(read_u16_be(&data), 0x3412);

        let mut buf = Vec::new();
        put_u16_le(&mut buf, 0x1234);
        put_u32_le(&mut buf, 0xDEAD_BEEF);
        assert_eq!(buf, vec![0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_read_array_short() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let err = read_array::<_, 4>(&mut src, "chunk header").unwrap_err();
        assert!(matches!(err, Error::ShortRead("chunk header")));
    }

    #[test]
    fn test_read_vec() {
        let mut src = Cursor::new(b"abcdef".to_vec());
        assert_eq!(read_vec(&mut src, 4, "text chunk").unwrap(), b"abcd");

        // declared length far beyond the source
        let mut src = Cursor::new(b"abcd".to_vec());
        let err = read_vec(&mut src, 0x7FFF_FFF0, "text chunk").unwrap_err();
        assert!(matches!(err, Error::ShortRead("text chunk")));
    }

    #[test]
    fn test_copy_through_large() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut src = Cursor::new(data.clone());
        let mut dst = Vec::new();
        assert_eq!(copy_through(&mut src, 100, 19_000, &mut dst).unwrap(), 19_000);
        assert_eq!(dst, data[100..19_100]);
    }

    #[test]
    fn test_copy_through_past_end() {
        let mut src = Cursor::new(vec![0u8; 10]);
        let mut dst = Vec::new();
        assert!(matches!(
            copy_through(&mut src, 4, 10, &mut dst),
            Err(Error::ShortRead(_))
        ));
    }

    #[test]
    fn test_payload_write() {
        let mut src = Cursor::new(b"xxxxhello".to_vec());
        let mut dst = Vec::new();

        let owned = Payload::Owned(b"abc".to_vec());
        assert_eq!(owned.write(3, &mut src, &mut dst).unwrap(), 3);

        let source = Payload::Source { offset: 4 };
        assert_eq!(source.write(5, &mut src, &mut dst).unwrap(), 5);
        assert_eq!(dst, b"abchello");
    }

    #[test]
    fn test_write_zeros() {
        let mut dst = Vec::new();
        write_zeros(&mut dst, 130).unwrap();
        assert_eq!(dst.len(), 130);
        assert!(dst.iter().all(|&b| b == 0));
    }
}
