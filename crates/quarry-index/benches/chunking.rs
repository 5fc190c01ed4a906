use std::collections::HashMap;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use quarry_index::{Chunker, ChunkerConfig};

fn generate_text(size: usize) -> String {
    let paragraph = "The quick brown fox jumps over the lazy dog. \
                     This sentence contains various English words and punctuation marks.\n\n";
    paragraph.repeat(size / paragraph.len() + 1)[..size].to_string()
}

fn chunk_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk");
    let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
    let metadata = HashMap::from([("document_id".to_owned(), "bench".to_owned())]);

    for size in [1_000, 10_000, 100_000] {
        let input = generate_text(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("paragraphs", size), &input, |b, input| {
            b.iter(|| chunker.chunk(black_box(input), &metadata));
        });
    }

    group.finish();
}

fn chunk_long_unbroken_paragraph(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_forced_split");
    let chunker = Chunker::new(ChunkerConfig {
        max_characters: 256,
        overlap: 16,
        max_tokens: 10_000,
        approx_tokens_per_char: 0.25,
    })
    .unwrap();
    let metadata = HashMap::new();

    let input = "word ".repeat(5_000);
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("25k_chars_no_breaks", |b| {
        b.iter(|| chunker.chunk(black_box(&input), &metadata));
    });

    group.finish();
}

criterion_group!(benches, chunk_documents, chunk_long_unbroken_paragraph);
criterion_main!(benches);
