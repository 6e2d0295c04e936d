//! Layout reconstruction parameters.
//!
//! Contains LayoutParams for controlling admission limits, consistency
//! checks and decompression budgets.

use std::time::Duration;

/// Parameters for layout reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    /// Maximum number of markers (plus expanded object-stream members) before
    /// a file is considered too complex to usefully visualize. Object-stream
    /// members whose object number reaches this value are rejected as well.
    pub marker_ceiling: usize,

    /// Best-effort mode: disables the ceiling, the `%%EOF`/`startxref`
    /// balance check and the marker count assertions, and resolves objects
    /// that match no grammar row as unknown objects.
    pub force: bool,

    /// Gaps between regions up to this many bytes are end-of-line slack and
    /// are absorbed into the preceding region instead of becoming a cavity.
    pub cavity_tolerance: u64,

    /// Budget for each decompression service call.
    pub service_timeout: Duration,

    /// Number of bytes after `obj` inspected to guess the object's type.
    pub probe_window: usize,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            marker_ceiling: 500,
            force: false,
            cavity_tolerance: 3,
            service_timeout: Duration::from_secs(10),
            probe_window: 24,
        }
    }
}

impl LayoutParams {
    pub fn marker_ceiling(mut self, ceiling: usize) -> Self {
        self.marker_ceiling = ceiling;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn cavity_tolerance(mut self, bytes: u64) -> Self {
        self.cavity_tolerance = bytes;
        self
    }

    pub fn service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }

    /// Whether a count of `count` items is admitted under the ceiling.
    pub(crate) fn admits(&self, count: usize) -> bool {
        self.force || count <= self.marker_ceiling
    }
}
