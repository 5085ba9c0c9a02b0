use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dacp_remote::protocol::dacp::{RequestEncoder, SearchField, SearchPredicate};
use dacp_remote::protocol::daap::{DmapDecoder, diff};
use dacp_remote::testing::bodies::{self, SongRow};
use dacp_remote::testing::{status_body, status_body_with_remaining};

fn decode_benchmark(c: &mut Criterion) {
    let decoder = DmapDecoder::new();
    let status = status_body(42, 4, 300, "Benchmark Song");

    // A library listing large enough to exercise MultiList appends
    let rows: Vec<SongRow> = (0..500)
        .map(|i| SongRow {
            item_id: 1_000 + i,
            name: format!("Song {i}"),
            artist: format!("Artist {}", i % 20),
            album: format!("Album {}", i % 50),
            duration_ms: 200_000,
            rating: 60,
        })
        .collect();
    let listing = bodies::items(&rows);

    c.bench_function("dmap_decode_status", |b| {
        b.iter(|| decoder.decode(black_box(&status)).unwrap())
    });

    c.bench_function("dmap_decode_500_items", |b| {
        b.iter(|| decoder.decode(black_box(&listing)).unwrap())
    });
}

fn diff_benchmark(c: &mut Criterion) {
    let decoder = DmapDecoder::new();
    let before = decoder
        .decode(&status_body_with_remaining(42, 4, 300, "Benchmark Song", 90_000))
        .unwrap();
    let tick = decoder
        .decode(&status_body_with_remaining(43, 4, 300, "Benchmark Song", 89_000))
        .unwrap();
    let next = decoder.decode(&status_body(44, 4, 301, "Next Song")).unwrap();

    c.bench_function("dmap_diff_tick", |b| {
        b.iter(|| diff(black_box(&before), black_box(&tick)))
    });

    c.bench_function("dmap_diff_track_change", |b| {
        b.iter(|| diff(black_box(&before), black_box(&next)))
    });
}

fn request_benchmark(c: &mut Criterion) {
    let encoder = RequestEncoder::new("192.168.1.20", 3689);
    let predicates = [
        SearchPredicate::equals(SearchField::Artist, "Miles Davis"),
        SearchPredicate::contains(SearchField::Title, "So What's New"),
    ];

    c.bench_function("dacp_search_target", |b| {
        b.iter(|| {
            encoder.search(
                41,
                black_box(&predicates),
                &["dmap.itemname", "daap.songartist"],
                "1234",
            )
        })
    });
}

criterion_group!(benches, decode_benchmark, diff_benchmark, request_benchmark);
criterion_main!(benches);
