#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Writes a PDF byte by byte, remembering where each object starts.
pub struct PdfBuilder {
    buf: Vec<u8>,
    offsets: Vec<(u32, usize)>,
    last_xref: usize,
}

impl PdfBuilder {
    pub fn new(version: &str) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("%PDF-{version}\n").as_bytes());
        buf.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");
        Self {
            buf,
            offsets: Vec::new(),
            last_xref: 0,
        }
    }

    /// Bytes placed before the header.
    pub fn with_preamble(preamble: &[u8], version: &str) -> Self {
        let mut b = Self::new(version);
        let mut buf = preamble.to_vec();
        buf.extend_from_slice(&b.buf);
        b.buf = buf;
        b
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn object(mut self, n: u32, body: &str) -> Self {
        self.offsets.push((n, self.buf.len()));
        self.buf
            .extend_from_slice(format!("{n} 0 obj\n{body}\nendobj\n").as_bytes());
        self
    }

    /// Stream object with the payload stored as given.
    pub fn raw_stream(mut self, n: u32, dict: &str, payload: &[u8]) -> Self {
        self.offsets.push((n, self.buf.len()));
        self.buf.extend_from_slice(
            format!("{n} 0 obj\n<< /Length {} {dict} >>\nstream\n", payload.len()).as_bytes(),
        );
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        self
    }

    /// FlateDecode stream object.
    pub fn flate_stream(self, n: u32, dict: &str, data: &[u8]) -> Self {
        let packed = deflate(data);
        self.raw_stream(n, &format!("/Filter /FlateDecode {dict}"), &packed)
    }

    /// Classic xref table, trailer, startxref and `%%EOF`.
    pub fn xref_and_trailer(mut self) -> Self {
        let xref = self.buf.len();
        let size = self.offsets.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
        self.buf
            .extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for n in 1..size {
            let entry = match self.offsets.iter().rev().find(|(m, _)| *m == n) {
                Some((_, at)) => format!("{at:010} 00000 n \n"),
                None => "0000000000 65535 f \n".to_string(),
            };
            self.buf.extend_from_slice(entry.as_bytes());
        }
        let prev = if self.last_xref > 0 {
            format!(" /Prev {}", self.last_xref)
        } else {
            String::new()
        };
        self.buf.extend_from_slice(
            format!("trailer\n<< /Size {size} /Root 1 0 R{prev} >>\nstartxref\n{xref}\n%%EOF\n")
                .as_bytes(),
        );
        self.last_xref = xref;
        self
    }

    /// Only `startxref` and `%%EOF`, for files using a cross-reference stream.
    pub fn startxref_at(mut self, n: u32) -> Self {
        let at = self.offset_of(n);
        self.buf
            .extend_from_slice(format!("startxref\n{at}\n%%EOF\n").as_bytes());
        self
    }

    pub fn offset_of(&self, n: u32) -> usize {
        self.offsets
            .iter()
            .rev()
            .find(|(m, _)| *m == n)
            .map(|(_, at)| *at)
            .unwrap()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

pub const CONTENT: &[u8] = b"BT /F1 24 Tf 72 720 Td (Layout under the microscope) Tj ET\n\
BT /F1 24 Tf 72 680 Td (Layout under the microscope) Tj ET\n\
BT /F1 24 Tf 72 640 Td (Layout under the microscope) Tj ET\n";

/// Five body objects: catalog, pages, page, content stream, info.
pub fn body(b: PdfBuilder) -> PdfBuilder {
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
        )
        .flate_stream(4, "", CONTENT)
        .object(5, "(pdfstrata test file)")
        .object(6, "[0 0 612 792]")
        .object(7, "42")
}

/// A small, well-formed PDF.
pub fn simple_pdf() -> Vec<u8> {
    body(PdfBuilder::new("1.4")).xref_and_trailer().build()
}
