//! The run-length segmentation state machine.
//!
//! Samples stream through in blocks; each individual channel sample is
//! classified, the consecutive-silence counter updated, and the split
//! policies evaluated. A split closes the current sink, reports it, and
//! opens the next one. A single silence run commits at most one split: the
//! "already split" latch stays set until a non-silent sample arrives.

use std::io::{self, Read};
use std::time::Instant;

use log::debug;

use crate::silence::is_silent;
use crate::sink::{Destination, SegmentSink};
use crate::wav::ChunkReader;
use crate::{Config, RunStats, SplitError, SplitEvent};

/// Frames between consecutive progress events.
const PROGRESS_INTERVAL_FRAMES: u64 = 1_000;

pub(crate) fn split<R, F>(
    reader: R,
    dest: &mut dyn Destination,
    config: &Config,
    on_event: &mut F,
) -> Result<RunStats, SplitError>
where
    R: Read,
    F: FnMut(SplitEvent),
{
    let started = Instant::now();

    let mut chunks = ChunkReader::new(reader);
    let headers = chunks.parse_headers()?;
    let fmt = headers.fmt;
    on_event(SplitEvent::Start {
        format: fmt.clone(),
        declared_data_len: headers.declared_data_len,
    });

    let channels = u64::from(fmt.num_channels);
    let rate = u64::from(fmt.sample_rate);
    let samples_per_sec = (rate * channels) as f64;

    // Gap durations in individual channel samples, matching the counter.
    let gap_samples = (config.gap_secs * samples_per_sec).round() as u64;
    let override_samples = config
        .override_secs
        .filter(|&secs| secs > config.gap_secs)
        .map(|secs| (secs * samples_per_sec).round() as u64);
    debug!(
        "gap {} samples, override {:?} samples, threshold {}",
        gap_samples, override_samples, config.threshold
    );

    let mut reader = chunks.into_inner();
    let block_bytes = config.buffer_frames.get() * usize::from(fmt.num_channels) * 2;
    let mut block = vec![0u8; block_bytes];

    let mut index = config.counter_start;
    let mut sink = SegmentSink::open(dest, config.segment_name(index), &fmt)?;

    let mut silence_run: u64 = 0;
    let mut latch = false;
    let mut total_samples: u64 = 0;
    let mut segment_samples: u64 = 0;
    let mut segments_closed: u64 = 0;
    let mut bytes_written: u64 = 0;
    let mut last_progress_frame: u64 = 0;

    loop {
        let filled = read_block(&mut reader, &mut block)?;
        if filled == 0 {
            break;
        }
        // A malformed stream can end mid-sample; the dangling byte is not a
        // sample and is dropped.
        let usable = filled - filled % 2;

        for raw in block[..usable].chunks_exact(2) {
            let sample = i16::from_le_bytes([raw[0], raw[1]]);

            if is_silent(sample, config.threshold) {
                silence_run += 1;
            } else {
                silence_run = 0;
                latch = false;
            }

            let min_length_satisfied = config.min_track_secs <= 0.0
                || segment_samples as f64 / samples_per_sec >= config.min_track_secs;
            let override_triggered =
                override_samples.is_some_and(|samples| silence_run > samples);

            if silence_run > gap_samples
                && !latch
                && (min_length_satisfied || override_triggered)
            {
                latch = true;
                debug!(
                    "silence gap at {:.2}s, closing segment {}",
                    total_samples as f64 / samples_per_sec,
                    index
                );

                let report = sink.close(segment_samples as f64 / samples_per_sec)?;
                bytes_written += report.bytes;
                segments_closed += 1;
                on_event(SplitEvent::Segment(report));

                index += 1;
                sink = SegmentSink::open(dest, config.segment_name(index), &fmt)?;
                segment_samples = 0;
            }

            // In skip mode, silence is dropped from the moment a run commits
            // a split until the run ends; otherwise everything is written.
            if !(config.skip_silence && latch) {
                sink.write(raw)?;
            }

            total_samples += 1;
            segment_samples += 1;
        }

        let frame = total_samples / channels;
        if frame - last_progress_frame >= PROGRESS_INTERVAL_FRAMES {
            last_progress_frame = frame;
            on_event(SplitEvent::Progress {
                seconds: frame as f64 / rate as f64,
                bytes: bytes_written + sink.bytes_written(),
            });
        }
    }

    // End of stream: a trailing silence run triggers no split, the open
    // segment is simply finalized.
    let report = sink.close(segment_samples as f64 / samples_per_sec)?;
    bytes_written += report.bytes;
    segments_closed += 1;
    on_event(SplitEvent::Segment(report));

    let stats = RunStats {
        segments: segments_closed,
        bytes_written,
        frames: total_samples / channels,
        elapsed: started.elapsed(),
    };
    on_event(SplitEvent::Finish(stats.clone()));
    Ok(stats)
}

/// Fill as much of `buf` as the stream will give before end-of-stream.
/// Returns 0 only at end-of-stream, the sole normal termination signal.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
