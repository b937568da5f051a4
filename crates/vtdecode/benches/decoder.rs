use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vtdecode::InputDecoder;

fn bench_plain_text(c: &mut Criterion) {
    let input: Vec<u8> = b"the quick brown fox jumps over the lazy dog"
        .iter()
        .copied()
        .cycle()
        .take(4096)
        .collect();
    c.bench_function("decode_plain_text_4k", |b| {
        b.iter(|| {
            let mut decoder = InputDecoder::new();
            let mut count = 0usize;
            decoder.feed_with(black_box(&input), &mut |_event| count += 1);
            black_box(count)
        });
    });
}

fn bench_key_sequences(c: &mut Criterion) {
    let mut input = Vec::new();
    for _ in 0..256 {
        input.extend_from_slice(b"\x1b[1;5A\x1b[3~\x1bOP\x1b[<35;73;5M");
    }
    c.bench_function("decode_key_and_mouse_sequences", |b| {
        b.iter(|| {
            let mut decoder = InputDecoder::new();
            let mut count = 0usize;
            decoder.feed_with(black_box(&input), &mut |_event| count += 1);
            black_box(count)
        });
    });
}

fn bench_paste(c: &mut Criterion) {
    let mut input = b"\x1b[200~".to_vec();
    input.extend(std::iter::repeat_n(b'a', 8192));
    input.extend_from_slice(b"\x1b[201~");
    c.bench_function("decode_bracketed_paste_8k", |b| {
        b.iter(|| {
            let mut decoder = InputDecoder::new();
            decoder.handle_paste(true);
            let mut count = 0usize;
            decoder.feed_with(black_box(&input), &mut |_event| count += 1);
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_plain_text, bench_key_sequences, bench_paste);
criterion_main!(benches);
