//! Benchmarks for layout reconstruction.
//!
//! Benchmark groups:
//! - `scan`: marker extraction over files of growing object count
//! - `analyze`: the full pipeline, inline decompression included

use std::hint::black_box;
use std::io::Write;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::ZlibEncoder;

use pdfstrata_core::{ByteScanner, LayoutParams, MarkerSource, analyze_bytes};

// =============================================================================
// Data Generation
// =============================================================================

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Generate a PDF with `n` objects, every fourth one a compressed content
/// stream, and an appended incremental update.
fn generate_pdf(n: u32) -> Vec<u8> {
    let content = b"BT /F1 12 Tf 72 720 Td (benchmark) Tj ET\n".repeat(20);
    let packed = deflate(&content);

    let mut pdf = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
    for i in 1..=n {
        pdf.extend_from_slice(format!("{i} 0 obj\n").as_bytes());
        match i % 4 {
            0 => {
                pdf.extend_from_slice(
                    format!("<< /Length {} /Filter /FlateDecode >>\nstream\n", packed.len())
                        .as_bytes(),
                );
                pdf.extend_from_slice(&packed);
                pdf.extend_from_slice(b"\nendstream");
            }
            1 => pdf.extend_from_slice(b"<< /Type /Page /MediaBox [0 0 612 792] >>"),
            2 => pdf.extend_from_slice(b"[0 0 612 792]"),
            _ => pdf.extend_from_slice(b"(benchmark string)"),
        }
        pdf.extend_from_slice(b"\nendobj\n");
    }
    pdf.extend_from_slice(b"trailer\n<< /Root 1 0 R >>\nstartxref\n0\n%%EOF\n");
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Page >>\nendobj\n");
    pdf.extend_from_slice(b"trailer\n<< /Root 1 0 R >>\nstartxref\n0\n%%EOF\n");
    pdf
}

fn params() -> LayoutParams {
    LayoutParams::default().force(true)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let params = params();

    for objects in [50, 500, 5_000] {
        let data = generate_pdf(objects);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("objects", objects), &data, |b, data| {
            b.iter(|| {
                let markers = ByteScanner::new(black_box(data), &params).markers().unwrap();
                black_box(markers.len())
            })
        });
    }

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let params = params();

    for objects in [50, 500, 5_000] {
        let data = generate_pdf(objects);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("objects", objects), &data, |b, data| {
            b.iter(|| {
                let analysis = analyze_bytes(black_box(data), &params).unwrap();
                black_box(analysis.edges.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scan, bench_analyze);
criterion_main!(benches);
