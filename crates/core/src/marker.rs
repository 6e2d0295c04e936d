//! Structural markers located at file offsets.
//!
//! A marker is one keyword occurrence (or header/footer location) found in
//! the raw bytes of a PDF. Markers are immutable facts: the sequencer reads
//! them, it never rewrites them.

use std::fmt;

use serde::Serialize;
use smol_str::SmolStr;

/// Bytes that PDF treats as whitespace (ISO 32000 Table 1).
pub const PDF_WHITESPACE: [u8; 6] = [0x00, 0x09, 0x0a, 0x0c, 0x0d, 0x20];

/// Length of the `%%EOF` footer including one end-of-line byte.
pub const EOF_MARKER_SIZE: u64 = 6;

#[inline]
pub fn is_pdf_whitespace(b: u8) -> bool {
    PDF_WHITESPACE.contains(&b)
}

#[inline]
fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Indirect object identifier (`N G obj`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

/// Coarse type of the value following `N G obj`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    Dict,
    Array,
    Name,
    LiteralString,
    HexString,
    Null,
    Bool,
    Number,
    Unknown,
}

impl ObjectType {
    /// Classify a value from its first two significant bytes.
    pub fn classify(c1: u8, c2: u8) -> Self {
        match (c1, c2) {
            (b'[', _) => Self::Array,
            (b'/', _) => Self::Name,
            (b'(', _) => Self::LiteralString,
            (b'<', b'<') => Self::Dict,
            (b'<', c) if c.is_ascii_hexdigit() || c == b'>' => Self::HexString,
            (b'n', b'u') => Self::Null,
            (b't', _) | (b'f', _) => Self::Bool,
            (d, c)
                if d.is_ascii_digit()
                    && (c.is_ascii_digit()
                        || c == b'.'
                        || is_pdf_whitespace(c)
                        || is_delimiter(c)) =>
            {
                Self::Number
            }
            (b'.', c) if c.is_ascii_digit() => Self::Number,
            (b'+' | b'-', c) if c.is_ascii_digit() || c == b'.' => Self::Number,
            _ => Self::Unknown,
        }
    }

    /// Classify the value at the start of `window`, skipping leading PDF
    /// whitespace. The last two bytes of the window are always kept for the
    /// probe itself.
    pub fn probe(window: &[u8]) -> Self {
        if window.len() < 2 {
            return match window.first() {
                Some(&b) => Self::classify(b, 0),
                None => Self::Unknown,
            };
        }
        let mut i = 0;
        while i < window.len() - 2 && is_pdf_whitespace(window[i]) {
            i += 1;
        }
        Self::classify(window[i], window[i + 1])
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dict => "dict",
            Self::Array => "array",
            Self::Name => "name",
            Self::LiteralString => "literal-string",
            Self::HexString => "hex-string",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Unknown => "??",
        }
    }

    pub const fn is_string(self) -> bool {
        matches!(self, Self::LiteralString | Self::HexString)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dictionary key markers that select a grammar row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DictKey {
    XRef,
    ObjStm,
    Linearized,
}

impl DictKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XRef => "XRef",
            Self::ObjStm => "ObjStm",
            Self::Linearized => "Linearized",
        }
    }
}

/// Closed vocabulary of marker kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum MarkerKind {
    /// `%PDF-x.y`; carries the matched header text.
    Header(SmolStr),
    ObjectStart(ObjectId),
    /// Type probe of the value following an object start.
    Value(ObjectType),
    Key(DictKey),
    Stream,
    EndStream,
    EndObj,
    Xref,
    Trailer,
    StartXref,
    EndOfFile,
}

impl MarkerKind {
    /// Top-level kinds stand on their own in the file tiling; the rest only
    /// exist inside an indirect object.
    pub const fn is_top_level(&self) -> bool {
        matches!(
            self,
            Self::Header(_)
                | Self::ObjectStart(_)
                | Self::Xref
                | Self::Trailer
                | Self::StartXref
                | Self::EndOfFile
        )
    }

    pub const fn category(&self) -> &'static str {
        if self.is_top_level() {
            "PDF file"
        } else {
            "Marker"
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Header(text) => text.to_string(),
            Self::ObjectStart(id) => format!("{id} obj"),
            Self::Value(t) => t.as_str().to_string(),
            Self::Key(k) => k.as_str().to_string(),
            Self::Stream => "stream".into(),
            Self::EndStream => "endstream".into(),
            Self::EndObj => "endobj".into(),
            Self::Xref => "xref".into(),
            Self::Trailer => "trailer".into(),
            Self::StartXref => "startxref".into(),
            Self::EndOfFile => "%%EOF".into(),
        }
    }
}

/// A keyword or header/footer occurrence at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub kind: MarkerKind,
    pub offset: u64,
    /// Literal size when the marker's extent is known up front.
    pub size: Option<u64>,
}

impl Marker {
    pub fn new(kind: MarkerKind, offset: u64) -> Self {
        let size = match kind {
            MarkerKind::EndOfFile => Some(EOF_MARKER_SIZE),
            _ => None,
        };
        Self { kind, offset, size }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn header(version: &str, offset: u64) -> Self {
        Self::new(MarkerKind::Header(SmolStr::new(version)), offset)
    }

    pub fn object(number: u32, generation: u16, offset: u64) -> Self {
        Self::new(MarkerKind::ObjectStart(ObjectId::new(number, generation)), offset)
    }

    pub fn value(ty: ObjectType, offset: u64) -> Self {
        Self::new(MarkerKind::Value(ty), offset)
    }

    pub fn key(key: DictKey, offset: u64) -> Self {
        Self::new(MarkerKind::Key(key), offset)
    }

    pub fn name(&self) -> String {
        self.kind.name()
    }
}
