// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for the logspool codec, writer and scan

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use logspool_planner::{ColumnRef, LogRelation, RelationOptions, Restriction, ScanMode};
use logspool_segment::{
    codec, Column, LogEvent, LogRecord, SegmentCatalog, SegmentLayout, SegmentScan, Severity,
    SeverityTag, SpoolConfig, SpoolWriter,
};

fn sample_record() -> LogRecord {
    LogRecord {
        log_time: Utc.with_ymd_and_hms(2026, 10, 19, 8, 15, 2).unwrap(),
        user_name: Some("alice".to_string()),
        database_name: Some("app".to_string()),
        process_id: Some(4711),
        connection_from: Some("10.0.0.7:51234".to_string()),
        session_id: "6530e1a2.1267".to_string(),
        session_line_num: 3,
        command_tag: Some("SELECT".to_string()),
        session_start_time: Utc.with_ymd_and_hms(2026, 10, 19, 8, 14, 58).unwrap(),
        virtual_transaction_id: Some("3/17".to_string()),
        transaction_id: 0,
        error_severity: SeverityTag::Error,
        sql_state_code: "42P01".to_string(),
        message: Some("relation \"accounts\" does not exist".to_string()),
        detail: None,
        hint: Some("Check the search path.".to_string()),
        internal_query: None,
        internal_query_pos: None,
        context: None,
        query: Some("select * from accounts where id = $1".to_string()),
        query_pos: Some(15),
        location: None,
        application_name: Some("psql".to_string()),
    }
}

// ============================================================================
// Codec Benchmarks
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let record = sample_record();
    let line = codec::encode(&record);

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(line.len() as u64));

    group.bench_function("encode", |b| {
        let mut buf = String::with_capacity(256);
        b.iter(|| {
            buf.clear();
            codec::encode_into(&mut buf, black_box(&record));
            black_box(buf.len())
        });
    });

    group.bench_function("decode", |b| {
        b.iter(|| black_box(codec::decode(black_box(&line)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// Writer Benchmarks
// ============================================================================

fn bench_append(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = SpoolWriter::new(SpoolConfig::new(dir.path()));
    let event = LogEvent::new(Severity::Error, "relation \"accounts\" does not exist")
        .with_statement("select * from accounts where id = $1", 15);

    let mut group = c.benchmark_group("writer");
    group.bench_function("append", |b| {
        b.iter(|| black_box(writer.append(black_box(&event))));
    });
    group.bench_function("append_filtered", |b| {
        let debug = LogEvent::new(Severity::Debug2, "noise");
        b.iter(|| black_box(writer.append(black_box(&debug))));
    });
    group.finish();
}

// ============================================================================
// Scan Benchmarks
// ============================================================================

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for rows in [1_000usize, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = SpoolWriter::new(SpoolConfig::new(dir.path()));
            for i in 0..rows {
                if i % 2_500 == 0 {
                    writer.rotate_now();
                }
                writer.append(&LogEvent::new(Severity::Warning, format!("event number {i}")));
            }
        }
        let catalog = SegmentCatalog::new(dir.path(), SegmentLayout::default());

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("full_width", rows), &rows, |b, _| {
            b.iter(|| {
                let segments = catalog.list().unwrap();
                black_box(SegmentScan::full(segments).count())
            });
        });
        group.bench_with_input(BenchmarkId::new("one_column", rows), &rows, |b, _| {
            b.iter(|| {
                let segments = catalog.list().unwrap();
                black_box(SegmentScan::new(segments, &[Column::Message]).count())
            });
        });
        group.bench_with_input(BenchmarkId::new("planned", rows), &rows, |b, _| {
            b.iter(|| {
                let mut relation = LogRelation::new(catalog.clone(), RelationOptions::default());
                let path = relation
                    .paths(&[ColumnRef::named("message")], &Restriction::default())
                    .unwrap();
                let scan = relation.begin_scan(&path, ScanMode::Execute).unwrap().unwrap();
                black_box(scan.count())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_append, bench_scan);
criterion_main!(benches);
