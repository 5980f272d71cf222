use std::f32::consts::TAU;
use std::fs::File;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tempfile::TempDir;
use wavsplit_core::{run, Config};

struct SyntheticAudio {
    _dir: TempDir,
    path: PathBuf,
}

impl SyntheticAudio {
    /// Alternating tone and silence sections, one pair per `period` seconds.
    fn new(file_name: &str, sample_rate: u32, seconds: u32, period: u32) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(file_name);
        write_tone_and_silence(&path, sample_rate, seconds, period)?;
        Ok(Self { _dir: dir, path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn write_tone_and_silence(
    path: &Path,
    sample_rate: u32,
    seconds: u32,
    period: u32,
) -> io::Result<()> {
    let total = (seconds * sample_rate) as usize;
    let period_frames = (period * sample_rate) as usize;
    let amplitude = i16::MAX as f32 * 0.6;
    let mut samples = Vec::with_capacity(total);

    for frame in 0..total {
        let in_tone = (frame / period_frames) % 2 == 0;
        let sample = if in_tone {
            let t = frame as f32 / sample_rate as f32;
            (amplitude * (440.0 * TAU * t).sin()) as i16
        } else {
            0
        };
        samples.push(sample);
    }

    let mut file = File::create(path)?;
    let data_bytes = (samples.len() * 2) as u32;
    file.write_all(b"RIFF")?;
    file.write_all(&(36 + data_bytes).to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?;
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&(sample_rate * 2).to_le_bytes())?;
    file.write_all(&2u16.to_le_bytes())?;
    file.write_all(&16u16.to_le_bytes())?;
    file.write_all(b"data")?;
    file.write_all(&data_bytes.to_le_bytes())?;
    for sample in &samples {
        file.write_all(&sample.to_le_bytes())?;
    }
    Ok(())
}

fn split_benchmarks(c: &mut Criterion) {
    let fixture = SyntheticAudio::new("synthetic.wav", 44_100, 30, 3)
        .expect("failed to synthesize audio fixture");

    let buffer_sizes = [1usize, 16, 64, 1_024];
    let mut group = c.benchmark_group("wav_split");

    for frames in buffer_sizes {
        group.bench_with_input(
            BenchmarkId::new("buffer_frames", frames),
            &frames,
            |b, &frames| {
                b.iter_batched(
                    || {
                        let output = tempfile::tempdir().expect("failed to create output dir");
                        let config = Config::builder()
                            .input(fixture.path())
                            .output_dir(output.path())
                            .threshold(0.05)
                            .gap_secs(1.0)
                            .buffer_frames(NonZeroUsize::new(frames).expect("non-zero"))
                            .build()
                            .expect("failed to build config");
                        (config, output)
                    },
                    |(config, _output)| {
                        run(config).expect("split run failed");
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, split_benchmarks);
criterion_main!(benches);
