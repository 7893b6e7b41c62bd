// src/transfer/rsync.rs

//! rsync-backed Transfer Client
//!
//! Commands are assembled argument by argument, never through a shell, so
//! paths and patterns need no quoting.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use tracing::{debug, warn};

use super::{PendingTransfer, TransferClient, TransferRequest, TransferStatus};

/// Network timeout passed to rsync for remote sources, in seconds
const NETWORK_TIMEOUT_SECS: u32 = 10;

/// Argument list for one rsync invocation
#[derive(Debug, Clone)]
pub struct RsyncCommand {
    args: Vec<OsString>,
}

impl RsyncCommand {
    pub fn from_request(request: &TransferRequest) -> Self {
        let mut args: Vec<OsString> = vec![
            "--times".into(),
            "--links".into(),
            "--hard-links".into(),
            "--no-motd".into(),
            "--verbose".into(),
        ];

        if request.recursive {
            args.push("--recursive".into());
        }
        if request.relative {
            args.push("--relative".into());
        }
        if request.delete {
            args.push("--delete".into());
        }
        if request.dry_run {
            args.push("--dry-run".into());
        }
        if request.delay_updates {
            args.push("--delay-updates".into());
        }
        if request.has_remote_source() {
            args.push("--compress".into());
            args.push(format!("--contimeout={NETWORK_TIMEOUT_SECS}").into());
            args.push(format!("--timeout={NETWORK_TIMEOUT_SECS}").into());
        }
        for pattern in &request.excludes {
            args.push(format!("--exclude={pattern}").into());
        }
        for source in &request.sources {
            args.push(source.into());
        }

        // Trailing slash: copy into the destination, not as a sibling
        let mut dest = request.destination.clone().into_os_string();
        if !dest.to_string_lossy().ends_with('/') {
            dest.push("/");
        }
        args.push(dest);

        Self { args }
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn to_command(&self, binary: &Path) -> Command {
        let mut cmd = Command::new(binary);
        cmd.args(&self.args).stdin(Stdio::null());
        cmd
    }
}

/// Transfer Client that shells out to the `rsync` binary
#[derive(Debug, Clone)]
pub struct RsyncClient {
    binary: PathBuf,
}

impl Default for RsyncClient {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rsync"),
        }
    }
}

impl RsyncClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn spawn(&self, cmd: &mut Command) -> Result<Child> {
        cmd.spawn().map_err(|e| {
            Error::Transfer(format!("failed to start {}: {}", self.binary.display(), e))
        })
    }
}

/// Read a pipe to the end, one lossily-decoded line at a time
fn for_each_line<R: Read>(reader: R, mut f: impl FnMut(&str)) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                f(line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                warn!("Failed to read rsync output: {}", e);
                break;
            }
        }
    }
}

impl TransferClient for RsyncClient {
    fn run(
        &self,
        request: &TransferRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<TransferStatus> {
        let rsync = RsyncCommand::from_request(request);
        debug!("Running {} {:?}", self.binary.display(), rsync.args());

        let mut child = self.spawn(
            rsync
                .to_command(&self.binary)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped()),
        )?;

        // stderr is drained on its own thread so neither pipe can fill up
        let stderr = child.stderr.take().map(|stderr| {
            thread::spawn(move || for_each_line(stderr, |line| warn!("rsync: {}", line)))
        });

        if let Some(stdout) = child.stdout.take() {
            for_each_line(stdout, |line| on_line(line));
        }

        let status = child.wait()?;
        if let Some(handle) = stderr {
            let _ = handle.join();
        }

        Ok(TransferStatus::from_code(status.code()))
    }

    fn start(&self, request: &TransferRequest) -> Result<Box<dyn PendingTransfer>> {
        let rsync = RsyncCommand::from_request(request);
        debug!("Starting {} {:?}", self.binary.display(), rsync.args());

        let child = self.spawn(
            rsync
                .to_command(&self.binary)
                .stdout(Stdio::null())
                .stderr(Stdio::piped()),
        )?;

        Ok(Box::new(RsyncTransfer { child }))
    }
}

/// An rsync process started for the download queue
struct RsyncTransfer {
    child: Child,
}

impl PendingTransfer for RsyncTransfer {
    fn wait(self: Box<Self>) -> Result<TransferStatus> {
        let RsyncTransfer { child } = *self;
        let output = child.wait_with_output()?;
        let status = TransferStatus::from_code(output.status.code());
        log_fetch_stderr(&output.stderr, &status);
        Ok(status)
    }
}

/// Surface a failed fetch's diagnostics at the default log level
fn log_fetch_stderr(stderr: &[u8], status: &TransferStatus) {
    for line in String::from_utf8_lossy(stderr).lines() {
        if status.is_success() {
            debug!("rsync: {}", line);
        } else {
            warn!("rsync: {}", line);
        }
    }
}
