//! Builders for in-memory RIFF/WAV and ID3 test files

#![allow(dead_code)]

use wavtags::syncsafe;

/// A chunk: tag, little-endian length, payload
pub fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// A RIFF or LIST container
pub fn list(id: &[u8; 4], kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = kind.to_vec();
    for child in children {
        payload.extend_from_slice(child);
    }
    chunk(id, &payload)
}

/// 16-bit stereo 44.1 kHz PCM format chunk
pub fn fmt_pcm() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&1u16.to_le_bytes());
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&44_100u32.to_le_bytes());
    p.extend_from_slice(&176_400u32.to_le_bytes());
    p.extend_from_slice(&4u16.to_le_bytes());
    p.extend_from_slice(&16u16.to_le_bytes());
    chunk(b"fmt ", &p)
}

/// Data chunk holding `n` bytes of a recognizable pattern
pub fn data(n: usize) -> Vec<u8> {
    let samples: Vec<u8> = (0..n).map(|i| (i * 7 % 256) as u8).collect();
    chunk(b"data", &samples)
}

/// `fmt ` and `data` only, no metadata
pub fn minimal_wave(samples: usize) -> Vec<u8> {
    list(b"RIFF", b"WAVE", &[fmt_pcm(), data(samples)])
}

/// An ID3v2.3 frame
pub fn id3_frame(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&syncsafe::encode(payload.len() as u32));
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(payload);
    out
}

/// An ID3v2.3 tag block followed by `padding` zero bytes
pub fn id3_block(frames: &[Vec<u8>], padding: usize) -> Vec<u8> {
    let body: Vec<u8> = frames.concat();
    let size = body.len() + padding;
    let mut out = b"ID3\x03\x00\x00".to_vec();
    out.extend_from_slice(&syncsafe::encode(size as u32));
    out.extend_from_slice(&body);
    out.resize(out.len() + padding, 0);
    out
}

/// Length field of the top-level RIFF header
pub fn riff_length(file: &[u8]) -> u32 {
    u32::from_le_bytes([file[4], file[5], file[6], file[7]])
}
