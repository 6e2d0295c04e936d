//! Flow edge aggregation.
//!
//! Turns a resolved [`Layout`] into the weighted edge list a Sankey
//! renderer consumes: the structural edges first, then per-object type
//! buckets, then roll-ups into `Objects`.

use std::fmt;
use std::io::{self, Write};

use serde::Serialize;

use crate::layout::{Color, Layout, ObjectStreamMember, Region, RegionKind};
use crate::marker::ObjectType;

/// One `source -> target` edge carrying `size` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl FlowEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        size: u64,
        color: Option<Color>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            size,
            color,
        }
    }
}

/// CSV line: `source,target,size[,color]`.
impl fmt::Display for FlowEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.source.trim(), self.target.trim(), self.size)?;
        if let Some(color) = self.color {
            write!(f, ",{color}")?;
        }
        Ok(())
    }
}

/// Type bucket of a sized item.
enum Bucket {
    Dictionaries,
    Arrays,
    Numbers,
    Strings,
}

impl Bucket {
    fn of(value: ObjectType) -> Option<Self> {
        match value {
            ObjectType::Dict => Some(Self::Dictionaries),
            ObjectType::Array => Some(Self::Arrays),
            ObjectType::Number => Some(Self::Numbers),
            v if v.is_string() => Some(Self::Strings),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Clusters {
    typed: Vec<FlowEdge>,
    compressed: Vec<FlowEdge>,
    cavities: Vec<FlowEdge>,
    overhead: Vec<FlowEdge>,
    dicts: u64,
    arrays: u64,
    numbers: u64,
    strings: u64,
    stream_dicts: u64,
}

impl Clusters {
    fn bucket(&mut self, name: &str, size: u64, bucket: Bucket) {
        let (target, color, sum) = match bucket {
            Bucket::Dictionaries => ("Dictionaries", Some(Color::Wheat), &mut self.dicts),
            Bucket::Arrays => ("Arrays", Some(Color::LightCyan), &mut self.arrays),
            Bucket::Numbers => ("Numbers", None, &mut self.numbers),
            Bucket::Strings => ("Strings", None, &mut self.strings),
        };
        *sum += size;
        self.typed.push(FlowEdge::new(name, target, size, color));
    }

    fn region(&mut self, region: &Region) {
        match region.kind {
            RegionKind::Object { value, .. } => {
                if let Some(bucket) = Bucket::of(value) {
                    self.bucket(&region.name, region.size, bucket);
                }
            }
            RegionKind::LinearizationDict { .. } => {
                self.bucket(&region.name, region.size, Bucket::Dictionaries)
            }
            RegionKind::Stream { .. } => {
                let Some(metrics) = region.stream else {
                    return;
                };
                let name = &region.name;
                let dict_size = region.size.saturating_sub(metrics.compressed);
                let compressed = format!("Compressed {name}");
                self.stream_dicts += dict_size;
                self.typed.push(FlowEdge::new(
                    name.as_str(),
                    "Stream dicts",
                    dict_size,
                    Some(Color::Wheat),
                ));
                self.typed.push(FlowEdge::new(
                    name.as_str(),
                    compressed.as_str(),
                    metrics.compressed,
                    Some(Color::MistyRose),
                ));
                self.compressed.push(FlowEdge::new(
                    compressed,
                    "Uncompressed data",
                    metrics.uncompressed,
                    Some(Color::MistyRose),
                ));
            }
            RegionKind::Cavity { .. } => self.cavities.push(FlowEdge::new(
                region.name.as_str(),
                "Cavities",
                region.size,
                Some(Color::Red),
            )),
            ref kind if kind.is_overhead() => self.overhead.push(FlowEdge::new(
                region.name.as_str(),
                "Overhead",
                region.size,
                Some(Color::LightBlue),
            )),
            _ => {}
        }
    }

    fn member(&mut self, member: &ObjectStreamMember) {
        if let Some(bucket) = Bucket::of(member.value) {
            self.bucket(&member.name(), member.size, bucket);
        }
    }

    fn roll_up(&self) -> Vec<FlowEdge> {
        let mut out = Vec::new();
        if self.stream_dicts > 0 {
            out.push(FlowEdge::new(
                "Stream dicts",
                "Dictionaries",
                self.stream_dicts,
                Some(Color::Wheat),
            ));
        }
        let all_dicts = self.dicts + self.stream_dicts;
        if all_dicts > 0 {
            out.push(FlowEdge::new("Dictionaries", "Objects", all_dicts, Some(Color::Wheat)));
        }
        if self.arrays > 0 {
            out.push(FlowEdge::new("Arrays", "Objects", self.arrays, Some(Color::LightCyan)));
        }
        if self.numbers > 0 {
            out.push(FlowEdge::new("Numbers", "Objects", self.numbers, None));
        }
        if self.strings > 0 {
            out.push(FlowEdge::new("Strings", "Objects", self.strings, None));
        }
        out
    }
}

/// Build the ordered edge list for `layout`.
pub fn aggregate(layout: &Layout) -> Vec<FlowEdge> {
    let structural = layout
        .regions
        .iter()
        .chain(&layout.linearized)
        .map(|r| FlowEdge::new(r.category.to_string(), r.name.as_str(), r.size, r.color()));
    let members = layout
        .members
        .iter()
        .map(|m| FlowEdge::new(m.category(), m.name(), m.size, None));
    let mut edges: Vec<FlowEdge> = structural.chain(members).collect();

    let mut clusters = Clusters::default();
    for region in layout.regions.iter().chain(&layout.linearized) {
        clusters.region(region);
    }
    for member in &layout.members {
        clusters.member(member);
    }

    let rollups = clusters.roll_up();
    edges.extend(clusters.typed);
    edges.extend(clusters.compressed);
    edges.extend(clusters.cavities);
    edges.extend(clusters.overhead);
    edges.extend(rollups);
    edges
}

/// Write one CSV line per edge.
pub fn write_csv<W: Write>(edges: &[FlowEdge], mut out: W) -> io::Result<()> {
    for edge in edges {
        writeln!(out, "{edge}")?;
    }
    out.flush()
}

pub fn to_csv(edges: &[FlowEdge]) -> String {
    edges.iter().map(|e| format!("{e}\n")).collect()
}
