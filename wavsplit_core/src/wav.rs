//! RIFF/WAVE chunk parsing and minimal header writing.
//!
//! All multi-byte fields are little-endian and are read and written field by
//! field; nothing here depends on in-memory struct layout. The parser walks
//! an arbitrarily ordered chunk sequence, validating only the chunks it
//! needs ("RIFF", "fmt ", "data") and skipping everything else wholesale.

use std::fmt;
use std::io::{self, Read, Write};

use crate::SplitError;

/// Four-byte ASCII chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChunkTag(pub [u8; 4]);

pub const RIFF: ChunkTag = ChunkTag(*b"RIFF");
pub const WAVE: ChunkTag = ChunkTag(*b"WAVE");
pub const FMT: ChunkTag = ChunkTag(*b"fmt ");
pub const DATA: ChunkTag = ChunkTag(*b"data");

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

/// Tag and declared payload length of one chunk.
///
/// A chunk with an odd length is followed by exactly one pad byte that the
/// length does not count.
#[derive(Clone, Copy, Debug)]
pub struct ChunkHeader {
    pub tag: ChunkTag,
    pub len: u32,
}

impl ChunkHeader {
    /// Payload length including the trailing pad byte, if any.
    pub fn padded_len(&self) -> u64 {
        u64::from(self.len) + u64::from(self.len & 1)
    }
}

/// Format parameters from the "fmt " chunk.
///
/// Only the 16 documented bytes are represented; any extension bytes in the
/// input are skipped during parsing and never re-emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FmtChunk {
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FmtChunk {
    const ENCODED_LEN: u32 = 16;

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.audio_format.to_le_bytes())?;
        writer.write_all(&self.num_channels.to_le_bytes())?;
        writer.write_all(&self.sample_rate.to_le_bytes())?;
        writer.write_all(&self.byte_rate.to_le_bytes())?;
        writer.write_all(&self.block_align.to_le_bytes())?;
        writer.write_all(&self.bits_per_sample.to_le_bytes())?;
        Ok(())
    }

    /// Reject format parameters the splitter cannot process.
    fn validate(&self) -> Result<(), SplitError> {
        if self.audio_format != 1 {
            return Err(SplitError::UnsupportedCodec(self.audio_format));
        }
        if self.num_channels == 0 {
            return Err(SplitError::InvalidChannels(self.num_channels));
        }
        if self.sample_rate == 0 {
            return Err(SplitError::InvalidSampleRate(self.sample_rate));
        }
        if self.bits_per_sample != 16 {
            return Err(SplitError::UnsupportedBitDepth(self.bits_per_sample));
        }
        Ok(())
    }
}

/// Parsed top-level headers of the input stream.
#[derive(Clone, Debug)]
pub struct WavHeaders {
    pub fmt: FmtChunk,
    /// Declared length of the data chunk. Streamed inputs often carry a
    /// placeholder here, so the real sample count is whatever arrives before
    /// end-of-stream.
    pub declared_data_len: u32,
}

/// Chunk-level reader that tracks the absolute stream offset so parse errors
/// can name the position of the offending chunk.
pub struct ChunkReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Bytes consumed from the underlying stream so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Give back the underlying reader, positioned where parsing stopped.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), SplitError> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(SplitError::UnexpectedEof {
                    offset: self.offset,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn read_u16(&mut self) -> Result<u16, SplitError> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32, SplitError> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_tag(&mut self) -> Result<ChunkTag, SplitError> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(ChunkTag(buf))
    }

    /// Read the next chunk header, leaving the stream at its payload.
    pub fn read_header(&mut self) -> Result<ChunkHeader, SplitError> {
        let tag = self.read_tag()?;
        let len = self.read_u32()?;
        Ok(ChunkHeader { tag, len })
    }

    /// Read the next chunk header and fail unless it carries `expected`.
    pub fn expect_chunk(&mut self, expected: ChunkTag) -> Result<ChunkHeader, SplitError> {
        let at = self.offset;
        let header = self.read_header()?;
        if header.tag != expected {
            return Err(SplitError::TagMismatch {
                expected,
                found: header.tag,
                offset: at,
            });
        }
        Ok(header)
    }

    /// Advance past `count` bytes of payload.
    pub fn skip(&mut self, count: u64) -> Result<(), SplitError> {
        let mut remaining = count;
        let mut scratch = [0u8; 512];
        while remaining > 0 {
            let take = remaining.min(scratch.len() as u64) as usize;
            self.fill(&mut scratch[..take])?;
            remaining -= take as u64;
        }
        Ok(())
    }

    /// Skip whole chunks (payload plus pad byte) until one tagged `target`
    /// appears, returning its header with the stream at its payload.
    pub fn skip_until(&mut self, target: ChunkTag) -> Result<ChunkHeader, SplitError> {
        loop {
            let header = self.read_header()?;
            if header.tag == target {
                return Ok(header);
            }
            log::debug!(
                "skipping '{}' chunk ({} bytes) at offset {}",
                header.tag,
                header.len,
                self.offset
            );
            self.skip(header.padded_len())?;
        }
    }

    /// Parse the top-level headers and leave the stream at the first raw
    /// sample byte.
    ///
    /// The required sequence is a "RIFF" container with form type "WAVE",
    /// a "fmt " chunk (whose extension bytes beyond the 16 documented ones
    /// are skipped), and a "data" chunk that arbitrary unrecognized chunks
    /// may precede.
    pub fn parse_headers(&mut self) -> Result<WavHeaders, SplitError> {
        let riff_at = self.offset;
        let riff = self.expect_chunk(RIFF)?;
        if riff.len < 4 {
            return Err(SplitError::Truncated {
                tag: RIFF,
                offset: riff_at,
                declared: riff.len,
                needed: 4,
            });
        }
        let form = self.read_tag()?;
        if form != WAVE {
            return Err(SplitError::NotWave { found: form });
        }

        let fmt_at = self.offset;
        let fmt_header = self.expect_chunk(FMT)?;
        if fmt_header.len < FmtChunk::ENCODED_LEN {
            return Err(SplitError::Truncated {
                tag: FMT,
                offset: fmt_at,
                declared: fmt_header.len,
                needed: FmtChunk::ENCODED_LEN,
            });
        }
        let fmt = FmtChunk {
            audio_format: self.read_u16()?,
            num_channels: self.read_u16()?,
            sample_rate: self.read_u32()?,
            byte_rate: self.read_u32()?,
            block_align: self.read_u16()?,
            bits_per_sample: self.read_u16()?,
        };
        // Extension bytes and pad, if any, up to the next chunk boundary.
        self.skip(fmt_header.padded_len() - u64::from(FmtChunk::ENCODED_LEN))?;
        fmt.validate()?;

        let data_header = self.skip_until(DATA)?;
        Ok(WavHeaders {
            fmt,
            declared_data_len: data_header.len,
        })
    }
}

/// Byte positions of the three size fields within a header written by
/// [`write_header`], recorded as the fields are emitted.
#[derive(Clone, Copy, Debug)]
pub struct HeaderLayout {
    pub riff_size_pos: u64,
    pub fmt_size_pos: u64,
    pub data_size_pos: u64,
}

/// Write the minimal segment header: RIFF/"WAVE", a 16-byte "fmt " chunk
/// copied from the input parameters, and a "data" chunk with a placeholder
/// length of zero. Returns where the size fields landed so they can be
/// patched once the payload length is known.
pub fn write_header<W: Write>(writer: &mut W, fmt: &FmtChunk) -> io::Result<HeaderLayout> {
    let mut counted = CountingWriter { inner: writer, pos: 0 };

    counted.write_all(&RIFF.0)?;
    let riff_size_pos = counted.pos;
    counted.write_all(&36u32.to_le_bytes())?;
    counted.write_all(&WAVE.0)?;

    counted.write_all(&FMT.0)?;
    let fmt_size_pos = counted.pos;
    counted.write_all(&FmtChunk::ENCODED_LEN.to_le_bytes())?;
    fmt.write_to(&mut counted)?;

    counted.write_all(&DATA.0)?;
    let data_size_pos = counted.pos;
    counted.write_all(&0u32.to_le_bytes())?;

    Ok(HeaderLayout {
        riff_size_pos,
        fmt_size_pos,
        data_size_pos,
    })
}

struct CountingWriter<'a, W> {
    inner: &'a mut W,
    pos: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.pos += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
