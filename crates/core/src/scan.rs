//! Marker extraction by byte search.
//!
//! No PDF parser is involved: every structural keyword is located with a
//! byte regex over the whole file, and the value following each `N G obj`
//! is typed from a small probe window. The result is an unordered marker
//! set for the sequencer.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::error::{LayoutError, Result};
use crate::marker::{DictKey, Marker, MarkerKind, ObjectType, is_pdf_whitespace};
use crate::params::LayoutParams;

/// Anything that can supply the initial marker set for a file.
pub trait MarkerSource {
    fn markers(&self) -> Result<Vec<Marker>>;
}

impl MarkerSource for Vec<Marker> {
    fn markers(&self) -> Result<Vec<Marker>> {
        Ok(self.clone())
    }
}

/// Fewer object markers than this means the scan could not make sense of
/// the file (usually exotic separators between `N`, `G` and `obj`).
const MIN_OBJECT_MARKERS: usize = 5;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)%PDF-[0-9]+\.[0-9]+").unwrap());
static OBJ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)([0-9]+)[\x00 \t]+([0-9]+)[\x00 \t]+obj").unwrap());
static OBJSTM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/ObjStm").unwrap());
static XREF_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/XRef\b").unwrap());
static STREAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)(?:^|[^d])(stream)").unwrap());
static ENDSTREAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)endstream").unwrap());
static ENDOBJ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)endobj").unwrap());
static XREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)(?:^|[^t])(xref)").unwrap());
static TRAILER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)trailer").unwrap());
static STARTXREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)startxref").unwrap());
static LINEARIZED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)/Linearized").unwrap());
static EOF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u)%%EOF").unwrap());

/// Regex-driven marker source over an in-memory file image.
pub struct ByteScanner<'a> {
    data: &'a [u8],
    probe_window: usize,
    force: bool,
}

impl<'a> ByteScanner<'a> {
    pub fn new(data: &'a [u8], params: &LayoutParams) -> Self {
        Self {
            data,
            probe_window: params.probe_window.max(2),
            force: params.force,
        }
    }

    /// Offsets of every match of `re`, or of its first capture group when
    /// the pattern needs a leading context byte.
    fn offsets(&self, re: &Regex) -> Vec<u64> {
        re.captures_iter(self.data)
            .filter_map(|cap| cap.get(1).or_else(|| cap.get(0)))
            .map(|m| m.start() as u64)
            .collect()
    }

    fn push_all(&self, out: &mut Vec<Marker>, re: &Regex, kind: MarkerKind) {
        out.extend(
            self.offsets(re)
                .into_iter()
                .map(|at| Marker::new(kind.clone(), at)),
        );
    }

    fn header(&self) -> Result<Marker> {
        let mut found = HEADER_RE.find_iter(self.data);
        let first = found.next().ok_or(LayoutError::HeaderNotFound)?;
        let extra = found.count();
        if extra > 0 {
            warn!(extra, "more than one \"%PDF-x.y\" header found, using the first");
        }
        let version = String::from_utf8_lossy(first.as_bytes());
        Ok(Marker::header(&version, first.start() as u64))
    }

    /// Object starts plus the type probe of each object's value.
    fn objects(&self, out: &mut Vec<Marker>) -> usize {
        let mut count = 0;
        for cap in OBJ_RE.captures_iter(self.data) {
            let Some(whole) = cap.get(0) else { continue };
            let number = std::str::from_utf8(&cap[1])
                .ok()
                .and_then(|s| s.parse::<u32>().ok());
            let generation = std::str::from_utf8(&cap[2])
                .ok()
                .and_then(|s| s.parse::<u16>().ok());
            let (Some(number), Some(generation)) = (number, generation) else {
                debug!(offset = whole.start(), "skipping out-of-range object id");
                continue;
            };
            out.push(Marker::object(number, generation, whole.start() as u64));
            count += 1;

            let start = whole.end();
            let end = (start + self.probe_window).min(self.data.len());
            let window = &self.data[start..end];
            let skip = window
                .iter()
                .take(window.len().saturating_sub(2))
                .take_while(|&&b| is_pdf_whitespace(b))
                .count();
            out.push(Marker::value(
                ObjectType::probe(window),
                (start + skip) as u64,
            ));
        }
        count
    }
}

impl MarkerSource for ByteScanner<'_> {
    fn markers(&self) -> Result<Vec<Marker>> {
        let mut out = vec![self.header()?];

        let objects = self.objects(&mut out);
        if objects < MIN_OBJECT_MARKERS && !self.force {
            return Err(LayoutError::structure(
                0,
                format!("could not find sufficient \"X Y obj\" markers ({objects} found)"),
            ));
        }

        self.push_all(&mut out, &OBJSTM_RE, MarkerKind::Key(DictKey::ObjStm));
        self.push_all(&mut out, &XREF_KEY_RE, MarkerKind::Key(DictKey::XRef));
        self.push_all(&mut out, &STREAM_RE, MarkerKind::Stream);
        self.push_all(&mut out, &ENDSTREAM_RE, MarkerKind::EndStream);
        self.push_all(&mut out, &ENDOBJ_RE, MarkerKind::EndObj);
        self.push_all(&mut out, &XREF_RE, MarkerKind::Xref);
        self.push_all(&mut out, &TRAILER_RE, MarkerKind::Trailer);
        self.push_all(&mut out, &STARTXREF_RE, MarkerKind::StartXref);
        self.push_all(&mut out, &LINEARIZED_RE, MarkerKind::Key(DictKey::Linearized));
        self.push_all(&mut out, &EOF_RE, MarkerKind::EndOfFile);

        debug!(markers = out.len(), objects, "scanned markers");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(data: &[u8]) -> Vec<MarkerKind> {
        let params = LayoutParams::default().force(true);
        let mut markers = ByteScanner::new(data, &params).markers().unwrap();
        markers.sort_by_key(|m| m.offset);
        markers.into_iter().map(|m| m.kind).collect()
    }

    #[test]
    fn keyword_lookbehinds_are_respected() {
        let data = b"%PDF-1.7\n1 0 obj\n<< /Length 3 >>\nstream\nabc\nendstream\nendobj\nstartxref\n9\n%%EOF\n";
        let k = kinds(data);
        assert_eq!(k.iter().filter(|k| **k == MarkerKind::Stream).count(), 1);
        assert_eq!(k.iter().filter(|k| **k == MarkerKind::EndStream).count(), 1);
        assert_eq!(k.iter().filter(|k| **k == MarkerKind::Xref).count(), 0);
        assert_eq!(k.iter().filter(|k| **k == MarkerKind::StartXref).count(), 1);
    }

    #[test]
    fn xref_stream_key_is_not_xrefstm() {
        let data = b"%PDF-1.5\ntrailer\n<< /XRefStm 120 >>\n1 0 obj\n<< /Type /XRef >>\nendobj\n";
        let k = kinds(data);
        let xref_keys = k
            .iter()
            .filter(|k| **k == MarkerKind::Key(DictKey::XRef))
            .count();
        assert_eq!(xref_keys, 1);
    }

    #[test]
    fn value_probe_lands_on_first_significant_byte() {
        let data = b"%PDF-1.4\n7 0 obj \r\n [1 2 3]\nendobj\n";
        let params = LayoutParams::default().force(true);
        let markers = ByteScanner::new(data, &params).markers().unwrap();
        let value = markers
            .iter()
            .find(|m| matches!(m.kind, MarkerKind::Value(_)))
            .unwrap();
        assert_eq!(value.kind, MarkerKind::Value(ObjectType::Array));
        assert_eq!(value.offset, 20);
    }

    #[test]
    fn missing_header_is_fatal() {
        let params = LayoutParams::default();
        let err = ByteScanner::new(b"1 0 obj\nnull\nendobj\n", &params)
            .markers()
            .unwrap_err();
        assert!(matches!(err, LayoutError::HeaderNotFound));
    }

    #[test]
    fn too_few_objects_is_rejected_without_force() {
        let params = LayoutParams::default();
        let err = ByteScanner::new(b"%PDF-1.4\n1 0 obj\nnull\nendobj\n", &params)
            .markers()
            .unwrap_err();
        assert!(matches!(err, LayoutError::StructuralInconsistency { .. }));
    }
}
