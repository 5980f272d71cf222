//! The run summary log file.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use wavsplit_core::{FmtChunk, RunStats, SegmentReport};

/// Writes the `--log` summary: a header block, one line per finished
/// segment, and a totals block at the end of the run.
pub struct SummaryLog {
    file: File,
}

impl SummaryLog {
    /// Create the log file and write its header block.
    pub fn create(path: &Path, source: Option<&str>, fmt: &FmtChunk) -> io::Result<Self> {
        let mut file = File::create(path)?;
        writeln!(
            file,
            "# Log file created by {} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        match source {
            Some(name) => writeln!(file, "# Data read from file: {name}")?,
            None => writeln!(file, "# Data read from stdin")?,
        }
        writeln!(
            file,
            "# {} Channels, {} Bit, {} Hz",
            fmt.num_channels, fmt.bits_per_sample, fmt.sample_rate
        )?;
        writeln!(file)?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Append one line for a finished segment.
    pub fn record(&mut self, report: &SegmentReport) -> io::Result<()> {
        writeln!(
            self.file,
            "{:>20}: {:>9} bytes  {:>9.2} seconds",
            report.name, report.bytes, report.seconds
        )?;
        self.file.flush()
    }

    /// Write the totals block and close the file.
    pub fn finish(mut self, stats: &RunStats) -> io::Result<()> {
        let elapsed = stats.elapsed.as_secs_f64();
        let kilobytes = stats.bytes_written / 1024;
        writeln!(self.file)?;
        writeln!(self.file, "# === Totals ===")?;
        writeln!(self.file, "# Segments written: {}", stats.segments)?;
        writeln!(self.file, "# Elapsed time: {elapsed:.2} seconds")?;
        writeln!(self.file, "# Data processed: {kilobytes} KB")?;
        writeln!(
            self.file,
            "# Average throughput: {:.1} KB/s",
            kilobytes as f64 / elapsed.max(f64::EPSILON)
        )?;
        self.file.flush()
    }
}
