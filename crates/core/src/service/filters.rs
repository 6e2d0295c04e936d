//! Stream filter chains for in-process decoding.
//!
//! Only the general-purpose filters are decoded. Image codecs (DCT, JPX,
//! JBIG2, CCITT) stop the chain and their input is reported as-is, which
//! matches what `qpdf --filtered-stream-data` produces at its default
//! decode level.

use std::io::Read;

use flate2::read::ZlibDecoder;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::debug;
use weezl::{BitOrder, decode::Decoder};

use super::Deadline;
use crate::error::{LayoutError, Result};
use crate::marker::ObjectId;

const CHUNK: usize = 64 * 1024;

static FILTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/Filter\s*(\[[^\]]*\]|/[A-Za-z0-9]+)").unwrap());
static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/([A-Za-z0-9]+)").unwrap());
static PREDICTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/Predictor\s+([0-9]+)").unwrap());
static COLUMNS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/Columns\s+([0-9]+)").unwrap());
static COLORS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/Colors\s+([0-9]+)").unwrap());
static BPC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/BitsPerComponent\s+([0-9]+)").unwrap());
static EARLY_CHANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/EarlyChange\s+([0-9]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Flate,
    Lzw,
    AsciiHex,
    Ascii85,
    RunLength,
    /// Image codec: decoding stops here.
    Image(String),
}

impl Filter {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "FlateDecode" | "Fl" => Self::Flate,
            "LZWDecode" | "LZW" => Self::Lzw,
            "ASCIIHexDecode" | "AHx" => Self::AsciiHex,
            "ASCII85Decode" | "A85" => Self::Ascii85,
            "RunLengthDecode" | "RL" => Self::RunLength,
            "DCTDecode" | "DCT" | "JPXDecode" | "JBIG2Decode" | "CCITTFaxDecode" | "CCF" => {
                Self::Image(name.to_string())
            }
            _ => return None,
        })
    }
}

/// PNG predictor parameters from `/DecodeParms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predictor {
    pub columns: usize,
    pub colors: usize,
    pub bits_per_component: usize,
}

fn dict_int(dict: &[u8], re: &Regex) -> Option<usize> {
    let cap = re.captures(dict)?;
    std::str::from_utf8(&cap[1]).ok()?.parse().ok()
}

/// The filter chain named in a stream dictionary, in application order.
///
/// Unknown filter names are returned as `Err(name)`.
pub(crate) fn filter_chain(dict: &[u8]) -> std::result::Result<Vec<Filter>, String> {
    let Some(cap) = FILTER_RE.captures(dict) else {
        return Ok(Vec::new());
    };
    NAME_RE
        .captures_iter(&cap[1])
        .map(|name| {
            let name = String::from_utf8_lossy(&name[1]).into_owned();
            Filter::from_name(&name).ok_or(name)
        })
        .collect()
}

/// `/DecodeParms` entries that change how a chain decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParms {
    pub predictor: Option<Predictor>,
    /// LZW code width grows one code early (`/EarlyChange 1`, the default).
    pub early_change: bool,
}

pub(crate) fn decode_parms(dict: &[u8]) -> DecodeParms {
    DecodeParms {
        predictor: png_predictor(dict),
        early_change: dict_int(dict, &EARLY_CHANGE_RE).is_none_or(|v| v != 0),
    }
}

/// PNG predictor settings, if the dictionary asks for one (`/Predictor >= 10`).
fn png_predictor(dict: &[u8]) -> Option<Predictor> {
    if dict_int(dict, &PREDICTOR_RE)? < 10 {
        return None;
    }
    Some(Predictor {
        columns: dict_int(dict, &COLUMNS_RE).unwrap_or(1),
        colors: dict_int(dict, &COLORS_RE).unwrap_or(1),
        bits_per_component: dict_int(dict, &BPC_RE).unwrap_or(8),
    })
}

/// Run `data` through `chain`, applying the predictor after the first
/// Flate/LZW stage.
pub(crate) fn decode(
    id: ObjectId,
    data: &[u8],
    chain: &[Filter],
    parms: &DecodeParms,
    deadline: &Deadline,
) -> Result<Vec<u8>> {
    let mut out = data.to_vec();
    let mut predicted = false;
    for filter in chain {
        deadline.check(id)?;
        out = match filter {
            Filter::Flate => inflate(id, &out, deadline)?,
            Filter::Lzw => lzw(id, &out, parms.early_change)?,
            Filter::AsciiHex => ascii_hex(&out),
            Filter::Ascii85 => ascii85(&out),
            Filter::RunLength => run_length(&out),
            Filter::Image(name) => {
                debug!(object = %id, filter = %name, "image codec left encoded");
                break;
            }
        };
        if !predicted
            && matches!(filter, Filter::Flate | Filter::Lzw)
            && let Some(p) = parms.predictor
        {
            out = png_unpredict(&out, p);
            predicted = true;
        }
    }
    Ok(out)
}

/// Zlib inflate in chunks so the deadline is honoured on large streams.
fn inflate(id: ObjectId, data: &[u8], deadline: &Deadline) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = vec![0u8; CHUNK];
    loop {
        match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) => {
                debug!(object = %id, error = %e, decoded = out.len(), "inflate failed");
                return Err(LayoutError::tool(id, format!("FlateDecode failed: {e}")));
            }
        }
        deadline.check(id)?;
    }
    Ok(out)
}

fn lzw(id: ObjectId, data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut decoder = if early_change {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    decoder
        .into_vec(&mut out)
        .decode(data)
        .status
        .map_err(|e| LayoutError::tool(id, format!("LZWDecode failed: {e}")))?;
    Ok(out)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn ascii_hex(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &b in data.iter().take_while(|&&b| b != b'>') {
        let Some(nibble) = hex_value(b) else {
            continue;
        };
        match high.take() {
            Some(h) => out.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    out
}

fn ascii85(data: &[u8]) -> Vec<u8> {
    let body = data.strip_prefix(b"<~").unwrap_or(data);
    let mut out = Vec::with_capacity(body.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut n = 0;
    for &b in body {
        match b {
            b'~' => break,
            b'z' if n == 0 => out.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[n] = b - b'!';
                n += 1;
                if n == 5 {
                    let value = group.iter().fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
                    out.extend_from_slice(&value.to_be_bytes());
                    n = 0;
                }
            }
            _ => {}
        }
    }
    if n > 1 {
        for slot in group.iter_mut().skip(n) {
            *slot = 84;
        }
        let value = group.iter().fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
        out.extend_from_slice(&value.to_be_bytes()[..n - 1]);
    }
    out
}

fn run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        i += 1;
        match len {
            128 => break,
            0..=127 => {
                let end = (i + len + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&b) = data.get(i) {
                    out.extend(std::iter::repeat_n(b, 257 - len));
                    i += 1;
                }
            }
        }
    }
    out
}

/// Reverse PNG row filters. Incomplete trailing rows are dropped.
fn png_unpredict(data: &[u8], p: Predictor) -> Vec<u8> {
    let row_bytes = (p.colors * p.columns * p.bits_per_component).div_ceil(8);
    let bpp = (p.colors * p.bits_per_component / 8).max(1);
    if row_bytes == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_bytes];
    for row in data.chunks_exact(row_bytes + 1) {
        let (kind, raw) = (row[0], &row[1..]);
        let mut cur = vec![0u8; row_bytes];
        for i in 0..row_bytes {
            let left = if i >= bpp { cur[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let pred = match kind {
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => 0,
            };
            cur[i] = raw[i].wrapping_add(pred);
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    out
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
