use std::path::PathBuf;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};

pub const DEFAULT_TEMPLATE: &str = "piece-%3";

/// Parse a duration argument into seconds.
///
/// Accepts either a bare decimal number of seconds (`1.5`) or one or more
/// unit-suffixed components chained together (`500ms`, `2s`, `1m30s`,
/// `2h15m`). Zero is accepted here; options that need a positive duration
/// reject it during configuration validation.
pub fn parse_seconds(value: &str) -> Result<f64, String> {
    let input = value.trim();
    if input.is_empty() {
        return Err("duration cannot be empty".into());
    }

    if let Ok(seconds) = input.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("invalid duration '{value}'"));
        }
        return Ok(seconds);
    }

    let invalid = || format!("invalid duration '{value}'");
    let bytes = input.as_bytes();
    let mut total_ms: u64 = 0;
    let mut index = 0;

    while index < bytes.len() {
        let start = index;
        while index < bytes.len() && bytes[index].is_ascii_digit() {
            index += 1;
        }
        if start == index {
            return Err(invalid());
        }
        let number = input[start..index].parse::<u64>().map_err(|_| invalid())?;

        let remainder = &input[index..];
        let (unit_len, factor) = if remainder.starts_with("ms") {
            (2, 1u64)
        } else if remainder.starts_with('s') {
            (1, 1_000)
        } else if remainder.starts_with('m') {
            (1, 60_000)
        } else if remainder.starts_with('h') {
            (1, 3_600_000)
        } else {
            return Err(invalid());
        };
        index += unit_len;

        total_ms = number
            .checked_mul(factor)
            .and_then(|component| total_ms.checked_add(component))
            .ok_or_else(|| "duration is too large".to_owned())?;
    }

    Ok(total_ms as f64 / 1_000.0)
}

/// Parse a threshold percentage in (0, 100] into a full-scale fraction.
pub fn parse_threshold(value: &str) -> Result<f64, String> {
    let percent: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid threshold '{value}'"))?;
    if !(percent > 0.0 && percent <= 100.0) {
        return Err("threshold must be within (0, 100] percent".into());
    }
    Ok(percent / 100.0)
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Split a WAV stream into tracks at points of silence")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("threshold")
                .short('t')
                .long("threshold")
                .value_name("PERCENT")
                .help("Volume (in % of full scale) below which a sample is silent")
                .default_value("3")
                .value_parser(ValueParser::new(parse_threshold)),
        )
        .arg(
            Arg::new("gap")
                .short('g')
                .long("gap")
                .value_name("DURATION")
                .help("Minimum run of silence that allows a split (e.g. 1.5 or 2s)")
                .default_value("1")
                .value_parser(ValueParser::new(parse_seconds)),
        )
        .arg(
            Arg::new("override")
                .short('o')
                .long("override")
                .value_name("DURATION")
                .help("Silence gap that splits even below the minimum track length")
                .value_parser(ValueParser::new(parse_seconds)),
        )
        .arg(
            Arg::new("min-length")
                .short('m')
                .long("min-length")
                .value_name("DURATION")
                .help("Minimum track length before a normal gap may split")
                .default_value("0")
                .value_parser(ValueParser::new(parse_seconds)),
        )
        .arg(
            Arg::new("buffer")
                .short('b')
                .long("buffer")
                .value_name("FRAMES")
                .help("Frames read per block from the input (try 16 or 64)")
                .default_value("1")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("skip-silence")
                .short('s')
                .long("skip-silence")
                .help("Remove the silence between pieces from the output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("TEMPLATE")
                .help("Segment name template with one %N placeholder (N = digits)")
                .default_value(DEFAULT_TEMPLATE),
        )
        .arg(
            Arg::new("natural")
                .short('N')
                .long("natural")
                .help("Number segments 1,2,3,... instead of 0,1,2,...")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("counter-start")
                .short('c')
                .long("counter-start")
                .value_name("N")
                .help("Initial value of the segment counter")
                .default_value("0")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("output")
                .short('d')
                .long("output")
                .value_name("DIR")
                .help("Directory where the pieces are written")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Read from FILE instead of stdin")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("pipe")
                .short('P')
                .long("pipe")
                .value_name("CMD")
                .help("Pipe each piece to CMD's stdin instead of writing files")
                .conflicts_with_all(["exec", "remove-after-exec"]),
        )
        .arg(
            Arg::new("exec")
                .short('e')
                .long("exec")
                .value_name("CMD")
                .help("Run CMD with the finished file path after each piece closes"),
        )
        .arg(
            Arg::new("remove-after-exec")
                .short('r')
                .long("remove-after-exec")
                .help("Delete each piece once its --exec command has finished")
                .requires("exec")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log")
                .short('l')
                .long("log")
                .value_name("FILE")
                .help("Write a summary of the run to FILE")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("progress")
                .short('p')
                .long("progress")
                .help("Display progress and throughput while splitting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("info")
                .short('I')
                .long("info")
                .help("Print the input WAV format parameters")
                .action(ArgAction::SetTrue),
        )
}
