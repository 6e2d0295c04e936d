//! Resolved regions of the file tiling.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::marker::{ObjectId, ObjectType};

/// Length of `endstream` plus one end-of-line byte.
const ENDSTREAM_FRAME: u64 = 10;

/// Top-level grouping a region is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The original body of the file.
    PdfFile,
    /// Part of the linearization (first-page) block.
    Linearized,
    /// Appended by the k-th incremental update (k >= 1).
    IncrementalUpdate(u32),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PdfFile => f.write_str("PDF file"),
            Self::Linearized => f.write_str("Linearized"),
            Self::IncrementalUpdate(k) => write!(f, "Incremental Update {k}"),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Node colors understood by the Sankey renderer (HTML color names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    LightBlue,
    Red,
    MediumPurple,
    PaleGreen,
    Wheat,
    LightCyan,
    MistyRose,
}

impl Color {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LightBlue => "lightblue",
            Self::Red => "red",
            Self::MediumPurple => "MediumPurple",
            Self::PaleGreen => "PaleGreen",
            Self::Wheat => "wheat",
            Self::LightCyan => "lightcyan",
            Self::MistyRose => "MistyRose",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Which grammar row produced a stream region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamFlavor {
    Plain,
    XRef,
    ObjectStream,
}

/// File offsets of the `stream` and `endstream` keywords of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamSpan {
    pub stream_at: u64,
    pub endstream_at: u64,
}

impl StreamSpan {
    /// Bytes from `stream` through `endstream` and its end-of-line byte.
    pub fn compressed(&self) -> u64 {
        self.endstream_at.saturating_sub(self.stream_at) + ENDSTREAM_FRAME
    }
}

/// Compression figures of a stream region, keyword framing included on
/// both sides. `uncompressed >= compressed` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamMetrics {
    pub compressed: u64,
    pub uncompressed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RegionKind {
    /// `%PDF-x.y` and the binary comment that usually follows it.
    Header,
    Xref,
    Trailer,
    StartXref,
    EndOfFile,
    Cavity { index: u32 },
    /// Non-stream indirect object.
    Object { id: ObjectId, value: ObjectType },
    Stream {
        id: ObjectId,
        flavor: StreamFlavor,
        span: StreamSpan,
    },
    LinearizationDict { id: ObjectId },
    /// Summary of a collapsed linearization block.
    LinearizedBlock,
}

impl RegionKind {
    /// Keyword and header/footer regions, reported as overhead.
    pub const fn is_overhead(&self) -> bool {
        matches!(
            self,
            Self::Header | Self::Xref | Self::Trailer | Self::StartXref | Self::EndOfFile
        )
    }

    pub const fn is_object(&self) -> bool {
        matches!(
            self,
            Self::Object { .. } | Self::Stream { .. } | Self::LinearizationDict { .. }
        )
    }

    pub const fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Object { id, .. } | Self::Stream { id, .. } | Self::LinearizationDict { id } => {
                Some(*id)
            }
            _ => None,
        }
    }
}

/// Which stage last produced a region value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Sequenced,
    Synthesized,
    Linearization,
    IncrementalUpdate,
}

/// A contiguous byte range of the file with a resolved meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub category: Category,
    pub name: String,
    pub kind: RegionKind,
    pub offset: u64,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamMetrics>,
    pub provenance: Provenance,
}

impl Region {
    pub fn new(kind: RegionKind, name: impl Into<String>, offset: u64, size: u64) -> Self {
        Self {
            category: Category::PdfFile,
            name: name.into(),
            kind,
            offset,
            size,
            stream: None,
            provenance: Provenance::Sequenced,
        }
    }

    /// Gap filler numbered `index`.
    pub fn cavity(index: u32, category: Category, offset: u64, size: u64) -> Self {
        Self {
            category,
            name: format!("Cavity {index}"),
            kind: RegionKind::Cavity { index },
            offset,
            size,
            stream: None,
            provenance: Provenance::Synthesized,
        }
    }

    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn is_cavity(&self) -> bool {
        matches!(self.kind, RegionKind::Cavity { .. })
    }

    pub fn color(&self) -> Option<Color> {
        match self.category {
            Category::Linearized => return Some(Color::MediumPurple),
            Category::IncrementalUpdate(_) => return Some(Color::PaleGreen),
            Category::PdfFile => {}
        }
        match self.kind {
            RegionKind::Cavity { .. } => Some(Color::Red),
            RegionKind::LinearizedBlock => Some(Color::MediumPurple),
            ref kind if kind.is_overhead() => Some(Color::LightBlue),
            _ => None,
        }
    }

    /// Same bytes, new attribution.
    pub fn reclassify(&self, category: Category, provenance: Provenance) -> Self {
        Self {
            category,
            provenance,
            ..self.clone()
        }
    }

    pub(crate) fn with_metrics(self, metrics: StreamMetrics) -> Self {
        Self {
            stream: Some(metrics),
            ..self
        }
    }

    pub(crate) fn grown_by(self, bytes: u64) -> Self {
        Self {
            size: self.size + bytes,
            ..self
        }
    }
}
