//! Bridge benchmarks: marker decode, initial load, and steady-state patching

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use treesync_core::{
    decode_region, segment_top_level, CollabSession, LocalEdit, MemorySequence, SharedSequence,
    TreeChild,
};

const LABEL: &str = "doc";

fn build_document(paragraphs: usize) -> MemorySequence {
    let mut seq = MemorySequence::new();
    let mut session = CollabSession::load(&seq, LABEL).expect("load empty");
    for i in 0..paragraphs {
        session
            .apply_local_edit(
                &mut seq,
                LocalEdit::InsertNode {
                    parent: None,
                    index: i,
                    node_type: "paragraph".to_string(),
                    text: Some("the quick brown fox jumps over the lazy dog".to_string()),
                },
            )
            .expect("insert paragraph");
    }
    seq
}

fn bench_decode(c: &mut Criterion) {
    let seq = build_document(100);
    let snapshot = seq.snapshot();

    c.bench_function("decode_region_100_paragraphs", |b| {
        b.iter(|| decode_region(black_box(&snapshot), LABEL).expect("decode"))
    });

    c.bench_function("segment_top_level_100_paragraphs", |b| {
        b.iter(|| segment_top_level(black_box(&snapshot), LABEL))
    });
}

fn bench_load(c: &mut Criterion) {
    let seq = build_document(100);

    c.bench_function("session_load_100_paragraphs", |b| {
        b.iter(|| CollabSession::load(black_box(&seq), LABEL).expect("load"))
    });
}

fn bench_windowed_text_patch(c: &mut Criterion) {
    c.bench_function("local_text_edit_windowed_patch", |b| {
        b.iter_batched(
            || {
                let seq = build_document(50);
                let session = CollabSession::load(&seq, LABEL).expect("load");
                let target = match &session.tree().expect("tree").children[25] {
                    TreeChild::Node(n) => n.id,
                    TreeChild::Text(_) => unreachable!("document has only nodes at top level"),
                };
                (seq, session, target)
            },
            |(mut seq, mut session, target)| {
                session
                    .apply_local_edit(
                        &mut seq,
                        LocalEdit::InsertText {
                            node: target,
                            offset: 0,
                            text: "x".to_string(),
                        },
                    )
                    .expect("edit");
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_decode, bench_load, bench_windowed_text_patch);
criterion_main!(benches);
