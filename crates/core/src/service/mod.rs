//! Decompression services.
//!
//! The layout engine never decodes streams itself; it asks a service for
//! the decoded payload of an indirect object and for the `/N` and `/First`
//! entries of object streams.
//!
//! - `inline`: in-process decoding of the file image (default)
//! - `qpdf`: delegates to the `qpdf` command line tool

pub mod filters;
pub mod inline;
pub mod qpdf;

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::Serialize;

use crate::error::{LayoutError, Result};
use crate::marker::ObjectId;

pub use inline::InlineService;
pub use qpdf::QpdfService;

/// Member count and first-member offset of an object stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    /// `/N`: number of objects stored in the stream.
    pub member_count: usize,
    /// `/First`: byte offset of the first object's data in the payload.
    pub first_offset: usize,
}

/// Source of decoded stream payloads, keyed by indirect object id.
///
/// Every failure (missing object, tool exit status, timeout) is an
/// `ExternalToolFailure`; callers never retry.
pub trait DecompressionService {
    /// Fully decoded stream payload of `id`.
    fn stream_data(&self, id: ObjectId) -> Result<Vec<u8>>;

    /// Decoded payload length of `id`.
    fn decompressed_length(&self, id: ObjectId) -> Result<u64> {
        Ok(self.stream_data(id)?.len() as u64)
    }

    /// `/N` and `/First` of the object stream `id`.
    fn container_metadata(&self, id: ObjectId) -> Result<ContainerInfo>;
}

static N_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/N[\x00\t\n\x0c\r ]*([0-9]+)").unwrap());
static FIRST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/First[\x00\t\n\x0c\r ]*([0-9]+)").unwrap());

/// Read `/N` and `/First` from the text of a stream dictionary.
pub(crate) fn parse_container_info(dict: &[u8]) -> Option<ContainerInfo> {
    let int = |re: &Regex| -> Option<usize> {
        let cap = re.captures(dict)?;
        std::str::from_utf8(&cap[1]).ok()?.parse().ok()
    };
    Some(ContainerInfo {
        member_count: int(&N_RE)?,
        first_offset: int(&FIRST_RE)?,
    })
}

/// Wall-clock budget for a single service call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub(crate) fn start(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub(crate) fn expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    pub(crate) fn check(&self, id: ObjectId) -> Result<()> {
        if self.expired() {
            return Err(LayoutError::tool(
                id,
                format!("timed out after {:?}", self.budget),
            ));
        }
        Ok(())
    }
}
