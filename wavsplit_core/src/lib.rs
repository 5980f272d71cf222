//! Silence-detecting segmentation of streamed PCM WAV audio.
//!
//! The library reads a RIFF/WAVE stream (a file or stdin), classifies each
//! 16-bit sample against a volume threshold, and splits the stream into
//! independently valid WAV files wherever a sufficiently long run of silence
//! is found. Splitting policy, output naming, and destinations are all
//! driven by a [`Config`]; the caller observes the run through
//! [`SplitEvent`] callbacks.

use std::fs::File;
use std::io::{self, BufReader};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

mod naming;
mod segmenter;
mod silence;
mod sink;
mod wav;

pub use naming::NameTemplate;
pub use silence::is_silent;
pub use sink::{Destination, DirDestination, PipeDestination, SegmentReport, SegmentWriter};
pub use wav::{ChunkHeader, ChunkReader, ChunkTag, FmtChunk, WavHeaders};

/// Errors that can occur while parsing or splitting a WAV stream.
#[derive(Debug, Error)]
pub enum SplitError {
    /// A chunk carried a different tag than the one required at its position.
    #[error("expected '{expected}' chunk at offset {offset}, found '{found}'")]
    TagMismatch {
        expected: ChunkTag,
        found: ChunkTag,
        offset: u64,
    },

    /// A chunk declared fewer payload bytes than a required read.
    #[error("'{tag}' chunk at offset {offset} declares {declared} bytes, needs at least {needed}")]
    Truncated {
        tag: ChunkTag,
        offset: u64,
        declared: u32,
        needed: u32,
    },

    /// The stream ended in the middle of the chunk structure.
    #[error("unexpected end of stream at offset {offset}")]
    UnexpectedEof { offset: u64 },

    /// The RIFF container is not a WAVE form.
    #[error("RIFF form type is '{found}', expected 'WAVE'")]
    NotWave { found: ChunkTag },

    /// The format chunk advertises a codec other than linear PCM.
    #[error("unsupported audio format {0} (only linear PCM is supported)")]
    UnsupportedCodec(u16),

    /// The format chunk advertises a sample width other than 16 bits.
    #[error("unsupported bit depth {0} (only 16-bit samples are supported)")]
    UnsupportedBitDepth(u16),

    /// The format chunk declares zero channels.
    #[error("invalid channel count {0}")]
    InvalidChannels(u16),

    /// The format chunk declares a zero sample rate.
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),

    /// The silence threshold is outside the accepted (0, 1] range.
    #[error("threshold must be within (0, 1], got {0}")]
    InvalidThreshold(f64),

    /// The silence gap is not a positive duration.
    #[error("gap must be greater than zero seconds, got {0}")]
    InvalidGap(f64),

    /// The override gap is not a positive duration.
    #[error("override gap must be greater than zero seconds, got {0}")]
    InvalidOverride(f64),

    /// The minimum track length is negative.
    #[error("minimum track length must not be negative, got {0}")]
    InvalidMinLength(f64),

    /// The output name template is malformed.
    #[error("invalid name template '{template}': {reason}")]
    InvalidTemplate {
        template: String,
        reason: &'static str,
    },

    /// Wrapper around IO errors encountered while reading or writing streams.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Configuration for one splitting run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Source file to read; `None` reads from stdin.
    pub input: Option<PathBuf>,
    /// Directory into which segment files are written.
    pub output_dir: PathBuf,
    /// Template used to derive segment file names from the segment index.
    pub template: NameTemplate,
    /// Silence threshold as a fraction of full scale, in (0, 1].
    pub threshold: f64,
    /// Minimum length of continuous silence, in seconds, required to split.
    pub gap_secs: f64,
    /// Optional longer gap that splits even below the minimum track length.
    pub override_secs: Option<f64>,
    /// Minimum track length in seconds; 0 means always eligible to split.
    pub min_track_secs: f64,
    /// Number of frames read per block from the input stream.
    pub buffer_frames: NonZeroUsize,
    /// Drop silent samples once a silence run has committed a split.
    pub skip_silence: bool,
    /// Initial value of the segment counter.
    pub counter_start: u64,
    /// Display segment numbers 1-based instead of 0-based.
    pub natural: bool,
    /// Stream each segment to this command's stdin instead of a file.
    pub pipe_cmd: Option<String>,
}

impl Config {
    /// Start building a [`Config`] from the default splitting parameters.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Resolve the output name for a segment index, honoring 1-based display.
    pub(crate) fn segment_name(&self, index: u64) -> String {
        self.template.render(index + u64::from(self.natural))
    }
}

/// Builder for [`Config`]; `build` validates every numeric parameter before
/// any stream processing begins.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input: Option<PathBuf>,
    output_dir: PathBuf,
    template: NameTemplate,
    threshold: f64,
    gap_secs: f64,
    override_secs: Option<f64>,
    min_track_secs: f64,
    buffer_frames: NonZeroUsize,
    skip_silence: bool,
    counter_start: u64,
    natural: bool,
    pipe_cmd: Option<String>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: PathBuf::from("."),
            template: NameTemplate::default(),
            threshold: 0.03,
            gap_secs: 1.0,
            override_secs: None,
            min_track_secs: 0.0,
            buffer_frames: NonZeroUsize::MIN,
            skip_silence: false,
            counter_start: 0,
            natural: false,
            pipe_cmd: None,
        }
    }
}

impl ConfigBuilder {
    pub fn input<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn template(mut self, template: NameTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn threshold(mut self, fraction: f64) -> Self {
        self.threshold = fraction;
        self
    }

    pub fn gap_secs(mut self, seconds: f64) -> Self {
        self.gap_secs = seconds;
        self
    }

    pub fn override_secs(mut self, seconds: f64) -> Self {
        self.override_secs = Some(seconds);
        self
    }

    pub fn min_track_secs(mut self, seconds: f64) -> Self {
        self.min_track_secs = seconds;
        self
    }

    pub fn buffer_frames(mut self, frames: NonZeroUsize) -> Self {
        self.buffer_frames = frames;
        self
    }

    pub fn skip_silence(mut self, enabled: bool) -> Self {
        self.skip_silence = enabled;
        self
    }

    pub fn counter_start(mut self, start: u64) -> Self {
        self.counter_start = start;
        self
    }

    pub fn natural(mut self, enabled: bool) -> Self {
        self.natural = enabled;
        self
    }

    pub fn pipe_cmd<S: Into<String>>(mut self, command: S) -> Self {
        self.pipe_cmd = Some(command.into());
        self
    }

    /// Validate the parameters and produce an immutable [`Config`].
    pub fn build(self) -> Result<Config, SplitError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(SplitError::InvalidThreshold(self.threshold));
        }
        if !(self.gap_secs > 0.0) {
            return Err(SplitError::InvalidGap(self.gap_secs));
        }
        if let Some(seconds) = self.override_secs {
            if !(seconds > 0.0) {
                return Err(SplitError::InvalidOverride(seconds));
            }
        }
        if self.min_track_secs < 0.0 {
            return Err(SplitError::InvalidMinLength(self.min_track_secs));
        }

        Ok(Config {
            input: self.input,
            output_dir: self.output_dir,
            template: self.template,
            threshold: self.threshold,
            gap_secs: self.gap_secs,
            override_secs: self.override_secs,
            min_track_secs: self.min_track_secs,
            buffer_frames: self.buffer_frames,
            skip_silence: self.skip_silence,
            counter_start: self.counter_start,
            natural: self.natural,
            pipe_cmd: self.pipe_cmd,
        })
    }
}

/// Observations emitted while a run is in progress.
#[derive(Clone, Debug)]
pub enum SplitEvent {
    /// The input headers parsed successfully; raw sample data follows.
    Start {
        format: FmtChunk,
        /// Declared size of the data chunk; advisory only for streamed input.
        declared_data_len: u32,
    },
    /// Periodic position update, roughly once per thousand frames.
    Progress { seconds: f64, bytes: u64 },
    /// A segment was finalized and closed.
    Segment(SegmentReport),
    /// The run consumed the whole input.
    Finish(RunStats),
}

/// Cumulative statistics for a completed run.
#[derive(Clone, Debug)]
pub struct RunStats {
    /// Number of segments closed, including the final one.
    pub segments: u64,
    /// Total payload bytes written across all segments.
    pub bytes_written: u64,
    /// Total frames consumed from the input.
    pub frames: u64,
    /// Wall-clock time spent processing.
    pub elapsed: Duration,
}

/// Split the configured input, discarding events.
pub fn run(config: Config) -> Result<RunStats, SplitError> {
    run_with_events(config, |_| {})
}

/// Split the configured input, reporting progress and finished segments to
/// the supplied callback.
pub fn run_with_events<F>(config: Config, mut on_event: F) -> Result<RunStats, SplitError>
where
    F: FnMut(SplitEvent),
{
    let mut dest: Box<dyn Destination> = match &config.pipe_cmd {
        Some(command) => Box::new(PipeDestination::new(command.clone())),
        None => Box::new(DirDestination::new(config.output_dir.clone())),
    };

    match &config.input {
        Some(path) => {
            let file = File::open(path)?;
            segmenter::split(BufReader::new(file), dest.as_mut(), &config, &mut on_event)
        }
        None => {
            let stdin = io::stdin();
            segmenter::split(stdin.lock(), dest.as_mut(), &config, &mut on_event)
        }
    }
}

/// Split an arbitrary byte stream into an arbitrary destination.
///
/// `run_with_events` is the usual entry point; this variant exists for
/// callers that already hold a reader (e.g. a socket) or a custom
/// [`Destination`]. The `input`, `output_dir`, and `pipe_cmd` fields of the
/// configuration are ignored here.
pub fn split_stream<R, F>(
    reader: R,
    dest: &mut dyn Destination,
    config: &Config,
    mut on_event: F,
) -> Result<RunStats, SplitError>
where
    R: io::Read,
    F: FnMut(SplitEvent),
{
    segmenter::split(reader, dest, config, &mut on_event)
}
