//! Segment output: destinations, writers, and header finalization.
//!
//! A [`Destination`] opens one writer per segment. File-backed writers
//! support random access, so closing a segment patches the size fields in
//! its header; pipe-backed writers cannot seek and keep the placeholder
//! sizes, which is an accepted limitation of pipe-mode output rather than
//! an error.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use log::{debug, warn};

use crate::wav::{self, FmtChunk, HeaderLayout};
use crate::SplitError;

/// A sink for one segment's bytes.
pub trait SegmentWriter: Write {
    /// Whether the writer can seek back into already written bytes.
    fn random_access(&self) -> bool {
        false
    }

    /// Overwrite four bytes at `pos` with a little-endian `u32`. Only called
    /// when [`random_access`](Self::random_access) returns true.
    fn patch_u32(&mut self, pos: u64, value: u32) -> io::Result<()>;

    /// Release the underlying resource (flush, close, reap).
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Factory for per-segment writers.
pub trait Destination {
    /// Open the writer for a segment with the given rendered name.
    fn open(&mut self, name: &str) -> Result<Box<dyn SegmentWriter>, SplitError>;

    /// Filesystem path the name resolves to, when the destination has one.
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let _ = name;
        None
    }
}

/// Writes each segment to its own file in a directory.
pub struct DirDestination {
    dir: PathBuf,
}

impl DirDestination {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl Destination for DirDestination {
    fn open(&mut self, name: &str) -> Result<Box<dyn SegmentWriter>, SplitError> {
        let path = self.dir.join(name);
        debug!("opening segment file {}", path.display());
        let file = File::create(&path)?;
        Ok(Box::new(FileSegment {
            file: BufWriter::new(file),
        }))
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        Some(self.dir.join(name))
    }
}

struct FileSegment {
    file: BufWriter<File>,
}

impl Write for FileSegment {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl SegmentWriter for FileSegment {
    fn random_access(&self) -> bool {
        true
    }

    fn patch_u32(&mut self, pos: u64, value: u32) -> io::Result<()> {
        self.file.flush()?;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(pos))?;
        file.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.file.flush()
    }
}

/// Streams each segment to the stdin of a freshly spawned command.
pub struct PipeDestination {
    command: String,
}

impl PipeDestination {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Destination for PipeDestination {
    fn open(&mut self, _name: &str) -> Result<Box<dyn SegmentWriter>, SplitError> {
        debug!("spawning pipe command: {}", self.command);
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("pipe command has no stdin"))?;
        Ok(Box::new(PipeSegment { child, stdin }))
    }
}

struct PipeSegment {
    child: Child,
    stdin: ChildStdin,
}

impl Write for PipeSegment {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdin.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdin.flush()
    }
}

impl SegmentWriter for PipeSegment {
    fn patch_u32(&mut self, _pos: u64, _value: u32) -> io::Result<()> {
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        drop(self.stdin);
        let status = self.child.wait()?;
        if !status.success() {
            warn!("pipe command exited with {status}");
        }
        Ok(())
    }
}

/// Per-segment summary handed to the event callback when a segment closes.
#[derive(Clone, Debug)]
pub struct SegmentReport {
    /// Rendered segment name.
    pub name: String,
    /// Filesystem path of the finished segment, for file destinations.
    pub path: Option<PathBuf>,
    /// Payload bytes written (header excluded).
    pub bytes: u64,
    /// Elapsed audio time covered by this segment, in seconds.
    pub seconds: f64,
}

/// One open output segment: provisional header, streamed payload, and size
/// finalization on close.
pub struct SegmentSink {
    writer: Box<dyn SegmentWriter>,
    layout: HeaderLayout,
    name: String,
    path: Option<PathBuf>,
    bytes: u64,
}

impl SegmentSink {
    /// Largest payload length the header can record. The RIFF size field
    /// counts 36 header bytes on top of the payload, so both fields must fit
    /// in a `u32` together.
    const MAX_DATA_LEN: u32 = u32::MAX - 36;

    /// Open a segment and write its header template with placeholder sizes.
    pub fn open(
        dest: &mut dyn Destination,
        name: String,
        fmt: &FmtChunk,
    ) -> Result<Self, SplitError> {
        let path = dest.path_for(&name);
        let mut writer = dest.open(&name)?;
        let layout = wav::write_header(&mut writer, fmt)?;
        Ok(Self {
            writer,
            layout,
            name,
            path,
            bytes: 0,
        })
    }

    /// Append raw sample bytes to the payload.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), SplitError> {
        self.writer.write_all(bytes)?;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Finalize and close the segment.
    ///
    /// Flushing buffered payload is fatal on failure; a failed size patch is
    /// only reported, leaving a usable file with placeholder sizes.
    pub fn close(mut self, seconds: f64) -> Result<SegmentReport, SplitError> {
        self.writer.flush()?;

        if self.writer.random_access() {
            let data_len = u32::try_from(self.bytes)
                .map_or(Self::MAX_DATA_LEN, |len| len.min(Self::MAX_DATA_LEN));
            if let Err(err) = self.patch_sizes(data_len) {
                warn!("could not finalize sizes of '{}': {err}", self.name);
            }
        }
        if let Err(err) = self.writer.finish() {
            warn!("could not close segment '{}': {err}", self.name);
        }

        Ok(SegmentReport {
            name: self.name,
            path: self.path,
            bytes: self.bytes,
            seconds,
        })
    }

    fn patch_sizes(&mut self, data_len: u32) -> io::Result<()> {
        self.writer
            .patch_u32(self.layout.riff_size_pos, data_len.saturating_add(36))?;
        self.writer.patch_u32(self.layout.fmt_size_pos, 16)?;
        self.writer.patch_u32(self.layout.data_size_pos, data_len)
    }
}
