//! `qpdf` subprocess backend.
//!
//! Each request runs one `qpdf --show-object` process. Output is drained on
//! helper threads while the child is polled against the deadline; a child
//! that outlives it is killed.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{ContainerInfo, DecompressionService, Deadline, parse_container_info};
use crate::error::{LayoutError, Result};
use crate::marker::ObjectId;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Decompression through the `qpdf` command line tool.
#[derive(Debug, Clone)]
pub struct QpdfService {
    program: PathBuf,
    pdf: PathBuf,
    timeout: Duration,
}

impl QpdfService {
    pub fn new(pdf: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("qpdf"),
            pdf: pdf.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Use a specific `qpdf` executable.
    pub fn program(mut self, program: impl AsRef<Path>) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    fn drain<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<Vec<u8>> {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut source) = source {
                let _ = source.read_to_end(&mut buf);
            }
            buf
        })
    }

    fn wait(&self, child: &mut Child, id: ObjectId, deadline: &Deadline) -> Result<ExitStatus> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if deadline.expired() => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(LayoutError::tool(
                        id,
                        format!("qpdf killed after {:?}", self.timeout),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(LayoutError::tool(id, e.to_string())),
            }
        }
    }

    /// Run `qpdf --show-object=N,G [extra] FILE` and return its stdout.
    fn run(&self, id: ObjectId, extra: &[&str]) -> Result<Vec<u8>> {
        let deadline = Deadline::start(self.timeout);
        let mut cmd = Command::new(&self.program);
        cmd.arg(format!("--show-object={},{}", id.number, id.generation))
            .args(extra)
            .arg(&self.pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(?cmd, "running qpdf");

        let mut child = cmd
            .spawn()
            .map_err(|e| LayoutError::tool(id, format!("cannot run {}: {e}", self.program.display())))?;
        let stdout = Self::drain(child.stdout.take());
        let stderr = Self::drain(child.stderr.take());
        let status = self.wait(&mut child, id, &deadline)?;

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            let message = String::from_utf8_lossy(&stderr);
            return Err(LayoutError::tool(
                id,
                format!("qpdf exited with {status}: {}", message.trim()),
            ));
        }
        Ok(stdout)
    }
}

impl DecompressionService for QpdfService {
    fn stream_data(&self, id: ObjectId) -> Result<Vec<u8>> {
        self.run(id, &["--filtered-stream-data"])
    }

    fn container_metadata(&self, id: ObjectId) -> Result<ContainerInfo> {
        let shown = self.run(id, &[])?;
        parse_container_info(&shown)
            .ok_or_else(|| LayoutError::tool(id, "qpdf output lacks /N or /First"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_a_tool_failure() {
        let svc = QpdfService::new("missing.pdf", Duration::from_secs(1))
            .program("/nonexistent/qpdf-for-tests");
        let err = svc.stream_data(ObjectId::new(1, 0)).unwrap_err();
        match err {
            LayoutError::ExternalToolFailure { object, reason } => {
                assert_eq!(object, ObjectId::new(1, 0));
                assert!(reason.contains("cannot run"));
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
