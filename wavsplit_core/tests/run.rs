use std::error::Error;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::Path;

use tempfile::tempdir;
use wavsplit_core::{run, run_with_events, Config, NameTemplate, SplitError, SplitEvent};

const RATE: u32 = 8_000;

/// Write a mono 16-bit PCM WAV built from (count, amplitude) sections.
///
/// Fixtures are synthesized at runtime so no binary assets live in the
/// repository; constant-amplitude sections are enough to steer the silence
/// detector deterministically.
fn write_sectioned_wav<P: AsRef<Path>>(
    path: P,
    sections: &[(usize, i16)],
) -> Result<(), Box<dyn Error>> {
    let mut samples = Vec::new();
    for &(count, amplitude) in sections {
        samples.extend(std::iter::repeat(amplitude).take(count));
    }

    let mut file = File::create(path)?;
    let data_len = (samples.len() * 2) as u32;
    file.write_all(b"RIFF")?;
    file.write_all(&(36 + data_len).to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?;
    file.write_all(&RATE.to_le_bytes())?;
    file.write_all(&(RATE * 2).to_le_bytes())?;
    file.write_all(&2u16.to_le_bytes())?;
    file.write_all(&16u16.to_le_bytes())?;
    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    for sample in &samples {
        file.write_all(&sample.to_le_bytes())?;
    }
    Ok(())
}

fn base_config(input: &Path, output: &Path) -> Config {
    Config::builder()
        .input(input)
        .output_dir(output)
        .threshold(0.1)
        .gap_secs(1.0)
        .buffer_frames(NonZeroUsize::new(16).expect("non-zero"))
        .build()
        .expect("config")
}

fn sorted_outputs(dir: &Path) -> Result<Vec<std::path::PathBuf>, Box<dyn Error>> {
    let mut outputs: Vec<_> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    outputs.sort();
    Ok(outputs)
}

fn read_le_u32(bytes: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(bytes[pos..pos + 4].try_into().expect("u32 field"))
}

#[test]
fn run_splits_at_silence_and_patches_sizes() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    write_sectioned_wav(&input_path, &[(500, 10_000), (9_000, 0), (500, 10_000)])?;

    let output_dir = tempdir()?;
    run(base_config(&input_path, output_dir.path()))?;

    let outputs = sorted_outputs(output_dir.path())?;
    assert_eq!(outputs.len(), 2);
    assert_eq!(
        outputs[0].file_name().and_then(|name| name.to_str()),
        Some("piece-000.wav")
    );

    let expected_payloads = [8_500usize * 2, 1_500 * 2];
    for (path, expected) in outputs.iter().zip(expected_payloads) {
        let bytes = fs::read(path)?;
        assert_eq!(bytes.len(), 44 + expected);
        assert_eq!(read_le_u32(&bytes, 4) as usize, 36 + expected);
        assert_eq!(read_le_u32(&bytes, 16), 16);
        assert_eq!(read_le_u32(&bytes, 40) as usize, expected);
    }

    output_dir.close()?;
    work_dir.close()?;
    Ok(())
}

#[test]
fn segments_concatenate_back_to_the_input_payload() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    let sections = [
        (2_000usize, 9_000i16),
        (8_500, 0),
        (3_000, -9_000),
        (8_200, 0),
        (1_000, 9_000),
    ];
    write_sectioned_wav(&input_path, &sections)?;

    let output_dir = tempdir()?;
    run(base_config(&input_path, output_dir.path()))?;

    let mut joined = Vec::new();
    for path in sorted_outputs(output_dir.path())? {
        joined.extend_from_slice(&fs::read(path)?[44..]);
    }

    let mut original = Vec::new();
    File::open(&input_path)?.read_to_end(&mut original)?;
    assert_eq!(joined, original[44..]);

    output_dir.close()?;
    work_dir.close()?;
    Ok(())
}

#[test]
fn rerunning_a_segment_is_idempotent() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    write_sectioned_wav(&input_path, &[(500, 10_000), (9_000, 0), (500, 10_000)])?;

    let first_dir = tempdir()?;
    run(base_config(&input_path, first_dir.path()))?;
    let first_outputs = sorted_outputs(first_dir.path())?;
    assert_eq!(first_outputs.len(), 2);

    // No internal run of the first segment exceeds the gap, so splitting it
    // again yields a single payload-identical segment.
    let second_dir = tempdir()?;
    run(base_config(&first_outputs[0], second_dir.path()))?;
    let second_outputs = sorted_outputs(second_dir.path())?;
    assert_eq!(second_outputs.len(), 1);
    assert_eq!(
        fs::read(&second_outputs[0])?[44..],
        fs::read(&first_outputs[0])?[44..]
    );

    second_dir.close()?;
    first_dir.close()?;
    work_dir.close()?;
    Ok(())
}

#[test]
fn fmt_extension_bytes_are_not_reemitted() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");

    // Hand-build an input with an 18-byte "fmt " chunk and a LIST chunk
    // between "fmt " and "data".
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&60u32.to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&18u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&RATE.to_le_bytes());
    bytes.extend_from_slice(&(RATE * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(&0xBEEFu16.to_le_bytes()); // extension bytes
    bytes.extend_from_slice(b"LIST");
    bytes.extend_from_slice(&5u32.to_le_bytes());
    bytes.extend_from_slice(b"INFOx");
    bytes.push(0); // pad byte for the odd LIST length
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&8u32.to_le_bytes());
    for sample in [10_000i16, 10_000, 10_000, 10_000] {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    fs::write(&input_path, &bytes)?;

    let output_dir = tempdir()?;
    run(base_config(&input_path, output_dir.path()))?;

    let outputs = sorted_outputs(output_dir.path())?;
    assert_eq!(outputs.len(), 1);
    let produced = fs::read(&outputs[0])?;
    assert_eq!(produced.len(), 44 + 8);
    assert_eq!(read_le_u32(&produced, 16), 16);
    assert!(!produced.windows(4).any(|window| window == b"LIST"));

    output_dir.close()?;
    work_dir.close()?;
    Ok(())
}

#[test]
fn run_reports_events_for_each_closed_segment() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    write_sectioned_wav(&input_path, &[(500, 10_000), (9_000, 0), (500, 10_000)])?;

    let output_dir = tempdir()?;
    let mut reports = Vec::new();
    let mut format = None;
    let stats = run_with_events(base_config(&input_path, output_dir.path()), |event| {
        match event {
            SplitEvent::Start { format: fmt, .. } => format = Some(fmt),
            SplitEvent::Segment(report) => reports.push(report),
            _ => {}
        }
    })?;

    let format = format.expect("start event");
    assert_eq!(format.sample_rate, RATE);
    assert_eq!(format.num_channels, 1);

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].name, "piece-000.wav");
    assert_eq!(reports[0].bytes, 8_500 * 2);
    assert_eq!(
        reports[0].path.as_deref(),
        Some(output_dir.path().join("piece-000.wav").as_path())
    );
    assert_eq!(stats.segments, 2);
    assert_eq!(stats.frames, 10_000);
    assert_eq!(stats.bytes_written, 10_000 * 2);

    output_dir.close()?;
    work_dir.close()?;
    Ok(())
}

#[test]
fn custom_template_names_segment_files() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.wav");
    write_sectioned_wav(&input_path, &[(500, 10_000), (9_000, 0), (500, 10_000)])?;

    let output_dir = tempdir()?;
    let config = Config::builder()
        .input(&input_path)
        .output_dir(output_dir.path())
        .threshold(0.1)
        .template(NameTemplate::parse("track_%2")?)
        .counter_start(5)
        .build()?;
    run(config)?;

    let outputs = sorted_outputs(output_dir.path())?;
    let names: Vec<_> = outputs
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .collect();
    assert_eq!(names, ["track_05.wav", "track_06.wav"]);

    output_dir.close()?;
    work_dir.close()?;
    Ok(())
}

#[test]
fn run_rejects_a_stream_that_is_not_wav() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input_path = work_dir.path().join("input.bin");
    fs::write(&input_path, b"this is certainly not a RIFF stream")?;

    let output_dir = tempdir()?;
    let err = run(base_config(&input_path, output_dir.path()))
        .expect_err("non-WAV input should fail");
    assert!(matches!(err, SplitError::TagMismatch { offset: 0, .. }));

    // No partial segment may appear before parsing succeeds.
    assert!(sorted_outputs(output_dir.path())?.is_empty());

    output_dir.close()?;
    work_dir.close()?;
    Ok(())
}
