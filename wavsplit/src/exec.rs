//! Detached post-processing of finished segments.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

/// Runs a user command once per finished segment, each in its own worker.
///
/// The pipeline never waits per segment; a closed segment file is immutable,
/// so the worker needs no synchronization with it. Workers are joined in
/// [`wait`](Self::wait) before process exit so commands are not killed
/// mid-flight.
pub struct PostCommand {
    command: String,
    remove_after: bool,
    workers: Vec<JoinHandle<()>>,
}

impl PostCommand {
    pub fn new<S: Into<String>>(command: S, remove_after: bool) -> Self {
        Self {
            command: command.into(),
            remove_after,
            workers: Vec::new(),
        }
    }

    /// Hand a finished segment to a detached worker.
    pub fn dispatch(&mut self, path: PathBuf) {
        let command = self.command.clone();
        let remove_after = self.remove_after;
        self.workers.push(thread::spawn(move || {
            debug!("running '{command}' for {}", path.display());
            let status = Command::new("sh")
                .arg("-c")
                .arg(format!("{command} \"$0\""))
                .arg(&path)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(status) if !status.success() => {
                    warn!("'{command}' exited with {status} for {}", path.display());
                }
                Err(err) => {
                    warn!("could not run '{command}' for {}: {err}", path.display());
                }
                Ok(_) => {}
            }
            if remove_after {
                if let Err(err) = fs::remove_file(&path) {
                    warn!("could not remove {}: {err}", path.display());
                }
            }
        }));
    }

    /// Block until every dispatched worker has finished.
    pub fn wait(self) {
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}
