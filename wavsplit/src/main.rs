mod cli;
mod exec;
mod summary;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::warn;
use wavsplit_core::{run_with_events, Config, FmtChunk, NameTemplate, SplitEvent};

use crate::exec::PostCommand;
use crate::summary::SummaryLog;

fn progress_message(seconds: f64, bytes: u64, elapsed: Duration) -> String {
    let kb_per_sec = bytes as f64 / 1024.0 / elapsed.as_secs_f64().max(f64::EPSILON);
    format!(
        "Processed {seconds:.2} s - {} written ({kb_per_sec:.0} KB/s)",
        HumanBytes(bytes)
    )
}

fn print_format_info(fmt: &FmtChunk) {
    println!("-- Format Header --");
    println!("  Audio Format: {} (1=PCM)", fmt.audio_format);
    println!("  Num Channels: {}", fmt.num_channels);
    println!("  Sampling Rate: {} Hz", fmt.sample_rate);
    println!("  ByteRate: {} Bps", fmt.byte_rate);
    println!("  BlockAlign: {}", fmt.block_align);
    println!("  Bits/Sample: {}", fmt.bits_per_sample);
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = cli::build_cli().get_matches();

    let template_arg = matches
        .get_one::<String>("name")
        .expect("defaulted argument");
    let template = NameTemplate::parse(template_arg)?;

    let buffer = *matches.get_one::<u64>("buffer").expect("defaulted argument");
    let buffer_frames = usize::try_from(buffer)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| anyhow!("invalid buffer size {buffer}"))?;

    let mut builder = Config::builder()
        .threshold(
            *matches
                .get_one::<f64>("threshold")
                .expect("defaulted argument"),
        )
        .gap_secs(*matches.get_one::<f64>("gap").expect("defaulted argument"))
        .min_track_secs(
            *matches
                .get_one::<f64>("min-length")
                .expect("defaulted argument"),
        )
        .buffer_frames(buffer_frames)
        .skip_silence(matches.get_flag("skip-silence"))
        .counter_start(
            *matches
                .get_one::<u64>("counter-start")
                .expect("defaulted argument"),
        )
        .natural(matches.get_flag("natural"))
        .template(template)
        .output_dir(
            matches
                .get_one::<PathBuf>("output")
                .expect("defaulted argument"),
        );

    if let Some(seconds) = matches.get_one::<f64>("override") {
        builder = builder.override_secs(*seconds);
    }
    if let Some(input) = matches.get_one::<PathBuf>("input") {
        if !input.is_file() {
            return Err(anyhow!("input file does not exist: {}", input.display()));
        }
        builder = builder.input(input);
    }
    if let Some(command) = matches.get_one::<String>("pipe") {
        builder = builder.pipe_cmd(command.clone());
    }

    let config = builder.build().context("invalid configuration")?;

    let show_info = matches.get_flag("info");
    let log_path = matches.get_one::<PathBuf>("log").cloned();
    let source = config.input.as_ref().map(|path| path.display().to_string());
    let mut post = matches
        .get_one::<String>("exec")
        .map(|command| PostCommand::new(command.clone(), matches.get_flag("remove-after-exec")));

    let progress = matches.get_flag("progress").then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    });

    let mut summary: Option<SummaryLog> = None;
    let result = run_with_events(config, |event| match event {
        SplitEvent::Start { format, .. } => {
            if show_info {
                print_format_info(&format);
            }
            if let Some(path) = &log_path {
                match SummaryLog::create(path, source.as_deref(), &format) {
                    Ok(log) => summary = Some(log),
                    Err(err) => warn!("could not create log file {}: {err}", path.display()),
                }
            }
        }
        SplitEvent::Progress { seconds, bytes } => {
            if let Some(bar) = &progress {
                bar.set_message(progress_message(seconds, bytes, bar.elapsed()));
            }
        }
        SplitEvent::Segment(report) => {
            if let Some(log) = summary.as_mut() {
                if let Err(err) = log.record(&report) {
                    warn!("could not append to log file: {err}");
                }
            }
            if let Some(post) = post.as_mut() {
                if let Some(path) = report.path.clone() {
                    post.dispatch(path);
                }
            }
        }
        SplitEvent::Finish(stats) => {
            if let Some(log) = summary.take() {
                if let Err(err) = log.finish(&stats) {
                    warn!("could not finish log file: {err}");
                }
            }
        }
    });

    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    result.context("failed to split input")?;

    if let Some(post) = post {
        post.wait();
    }

    Ok(())
}
