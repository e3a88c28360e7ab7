//! End-to-end conversion throughput benchmarks
//!
//! Measures the full default pipeline on synthetic documents with
//! varying section counts, plus the structured sub-converters on their
//! own.
//!
//! Run benchmarks: `cargo bench --bench convert_throughput`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use retex::Converter;
use std::fmt::Write;

/// A document mixing paragraphs, inline markup, entities, and links.
fn prose_document(sections: usize) -> String {
    let mut html = String::new();
    for i in 0..sections {
        write!(
            html,
            "<h2>Section {i}</h2>\
             <p>Some <b>bold</b> text &amp; some <i>italics</i>, plus a \
             <a href=\"https://example.org/{i}\">link</a>.</p>\
             <p>March &ndash; May, 100% coverage, x &lt; y.</p>"
        )
        .expect("writing to a String cannot fail");
    }
    html
}

/// A document dominated by tables.
fn table_document(rows: usize) -> String {
    let mut html = String::from("<table border=\"1\">");
    for i in 0..rows {
        write!(html, "<tr><td>alpha {i}</td><td>beta {i}</td><td>gamma {i}</td></tr>")
            .expect("writing to a String cannot fail");
    }
    html.push_str("</table>");
    html
}

/// A document dominated by nested lists.
fn list_document(items: usize) -> String {
    let mut html = String::from("<ul>");
    for i in 0..items {
        write!(html, "<li>item {i}<ol><li>sub a</li><li>sub b</li></ol></li>")
            .expect("writing to a String cannot fail");
    }
    html.push_str("</ul>");
    html
}

fn bench_prose(c: &mut Criterion) {
    let converter = Converter::new().expect("default converter builds");
    let mut group = c.benchmark_group("prose");
    for sections in [1, 10, 100] {
        let html = prose_document(sections);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("sections", sections), &html, |b, html| {
            b.iter(|| converter.convert(html).expect("conversion succeeds"));
        });
    }
    group.finish();
}

fn bench_tables(c: &mut Criterion) {
    let converter = Converter::new().expect("default converter builds");
    let mut group = c.benchmark_group("tables");
    for rows in [5, 50, 250] {
        let html = table_document(rows);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &html, |b, html| {
            b.iter(|| converter.convert(html).expect("conversion succeeds"));
        });
    }
    group.finish();
}

fn bench_lists(c: &mut Criterion) {
    let converter = Converter::new().expect("default converter builds");
    let mut group = c.benchmark_group("lists");
    for items in [5, 50, 250] {
        let html = list_document(items);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("items", items), &html, |b, html| {
            b.iter(|| converter.convert(html).expect("conversion succeeds"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_prose, bench_tables, bench_lists);
criterion_main!(benches);
