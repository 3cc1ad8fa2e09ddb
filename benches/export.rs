use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mermaid_export::flatten::{FlattenOptions, flatten_foreign_objects};
use mermaid_export::text_metrics::TextMeasurer;
use mermaid_export::{Config, ExportFormat, Exporter, FontLibrary};
use std::hint::black_box;
use std::sync::Arc;
use usvg::fontdb::Database;

const FLOWCHART: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/flowchart_td.svg"
));

/// A grid of label islands shaped like renderer output.
fn labelled_grid(labels: usize) -> String {
    let cols = (labels as f64).sqrt().ceil().max(1.0) as usize;
    let rows = labels.div_ceil(cols).max(1);
    let mut out = format!(
        r#"<svg id="g" xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="0 0 {} {}"><style>#g .node rect{{fill:#ECECFF;stroke:#9370DB;}}#g .edgeLabel{{background-color:rgba(232,232,232,0.8);}}#g .label{{color:#333;font-family:"trebuchet ms",verdana,arial,sans-serif;}}</style>"#,
        cols * 120,
        rows * 60
    );
    for i in 0..labels {
        let (x, y) = ((i % cols) * 120 + 10, (i / cols) * 60 + 10);
        out.push_str(&format!(
            r#"<g class="node" transform="translate({x}, {y})"><rect width="100" height="40"/><g class="label"><foreignObject width="100" height="40"><div xmlns="http://www.w3.org/1999/xhtml"><span class="edgeLabel">Node {i}<br/>line two</span></div></foreignObject></g></g>"#
        ));
    }
    out.push_str("</svg>");
    out
}

fn exporter() -> Exporter {
    let mut db = Database::new();
    db.load_system_fonts();
    Exporter::with_fonts(Config::default(), FontLibrary::with_database(db))
}

fn bench_flatten(c: &mut Criterion) {
    let db = {
        let mut db = Database::new();
        db.load_system_fonts();
        Arc::new(db)
    };
    let options = FlattenOptions::default();
    let mut group = c.benchmark_group("flatten");
    for labels in [1usize, 16, 128] {
        let svg = labelled_grid(labels);
        group.bench_with_input(BenchmarkId::from_parameter(labels), &svg, |b, data| {
            let mut measurer = TextMeasurer::new(Arc::clone(&db));
            b.iter(|| {
                let out = flatten_foreign_objects(black_box(data), &options, &mut measurer).unwrap();
                black_box(out);
            });
        });
    }
    group.finish();
}

fn bench_raster(c: &mut Criterion) {
    let exporter = exporter();
    let mut group = c.benchmark_group("raster");
    group.sample_size(20);
    for (name, svg) in [("flowchart", FLOWCHART.to_string()), ("grid_16", labelled_grid(16))] {
        for scale in [1.0, 2.0] {
            group.bench_with_input(
                BenchmarkId::new(name, scale),
                &svg,
                |b, data| {
                    b.iter(|| {
                        let artifact = exporter
                            .export_raster(black_box(data), ExportFormat::Png, "bench", scale, "#ffffff")
                            .unwrap();
                        black_box(artifact);
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_flatten, bench_raster);
criterion_main!(benches);
