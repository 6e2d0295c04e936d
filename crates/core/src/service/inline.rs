//! In-process decompression over the file image.
//!
//! Objects are located by scanning for `N G obj` (the latest definition of
//! an id wins, as a reader following the newest xref section would see it).
//! The stream payload is sliced between `stream` and `endstream`, using a
//! direct `/Length` when it is consistent with the keywords.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use rustc_hash::FxHashMap;

use super::filters::{decode, decode_parms, filter_chain};
use super::{ContainerInfo, DecompressionService, Deadline, parse_container_info};
use crate::error::{LayoutError, Result};
use crate::marker::ObjectId;

static OBJ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)([0-9]+)[\x00 \t]+([0-9]+)[\x00 \t]+obj").unwrap());
static LENGTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)/Length\s+([0-9]+)(\s+[0-9]+\s+R)?").unwrap()
});

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Raw pieces of a stream object.
struct RawStream<'a> {
    dict: &'a [u8],
    payload: &'a [u8],
}

/// Decodes streams straight out of the file bytes.
pub struct InlineService<'a> {
    data: &'a [u8],
    objects: FxHashMap<ObjectId, usize>,
    timeout: Duration,
}

impl<'a> InlineService<'a> {
    pub fn new(data: &'a [u8], timeout: Duration) -> Self {
        let mut objects = FxHashMap::default();
        for cap in OBJ_RE.captures_iter(data) {
            let number = std::str::from_utf8(&cap[1])
                .ok()
                .and_then(|s| s.parse::<u32>().ok());
            let generation = std::str::from_utf8(&cap[2])
                .ok()
                .and_then(|s| s.parse::<u16>().ok());
            if let (Some(number), Some(generation)) = (number, generation) {
                let pos = cap.get(0).map(|m| m.end()).unwrap_or(0);
                objects.insert(ObjectId::new(number, generation), pos);
            }
        }
        Self {
            data,
            objects,
            timeout,
        }
    }

    fn locate(&self, id: ObjectId) -> Result<RawStream<'a>> {
        let data = self.data;
        let start = *self
            .objects
            .get(&id)
            .ok_or_else(|| LayoutError::tool(id, "object not found"))?;
        let body = &data[start..];
        let endobj = find(body, b"endobj").unwrap_or(body.len());
        let keyword = find(&body[..endobj], b"stream")
            .ok_or_else(|| LayoutError::tool(id, "object has no stream"))?;
        let dict = &body[..keyword];

        let mut payload_start = keyword + b"stream".len();
        if body[payload_start..].starts_with(b"\r\n") {
            payload_start += 2;
        } else if matches!(body.get(payload_start), Some(b'\n' | b'\r')) {
            payload_start += 1;
        }
        let endstream = find(&body[payload_start..], b"endstream")
            .map(|p| payload_start + p)
            .ok_or_else(|| LayoutError::tool(id, "stream has no endstream"))?;

        let declared = LENGTH_RE.captures(dict).and_then(|cap| {
            if cap.get(2).is_some() {
                return None;
            }
            std::str::from_utf8(&cap[1]).ok()?.parse::<usize>().ok()
        });
        let payload_end = match declared {
            Some(len) if payload_start + len <= endstream => payload_start + len,
            _ => {
                let mut end = endstream;
                if body[..end].ends_with(b"\r\n") {
                    end -= 2;
                } else if matches!(body[..end].last(), Some(b'\n' | b'\r')) {
                    end -= 1;
                }
                end.max(payload_start)
            }
        };

        Ok(RawStream {
            dict,
            payload: &body[payload_start..payload_end],
        })
    }
}

impl DecompressionService for InlineService<'_> {
    fn stream_data(&self, id: ObjectId) -> Result<Vec<u8>> {
        let deadline = Deadline::start(self.timeout);
        let raw = self.locate(id)?;
        let chain = filter_chain(raw.dict)
            .map_err(|name| LayoutError::tool(id, format!("unsupported filter /{name}")))?;
        decode(id, raw.payload, &chain, &decode_parms(raw.dict), &deadline)
    }

    fn container_metadata(&self, id: ObjectId) -> Result<ContainerInfo> {
        let raw = self.locate(id)?;
        parse_container_info(raw.dict)
            .ok_or_else(|| LayoutError::tool(id, "object stream lacks /N or /First"))
    }
}
