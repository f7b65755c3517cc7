/// Search Performance Benchmark Suite
///
/// 1. Placement generation (NES movement simulation)
/// 2. Static evaluation
/// 3. Full hybrid search at different playout counts
/// 4. Wire serialization of results (serde_json)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use topmoves_service::domain::evaluation::Evaluator;
use topmoves_service::domain::placement::{InputTimeline, MovementModel};
use topmoves_service::domain::search::{Cancellation, HybridSearch, MoveSearch, SearchRequest};
use topmoves_service::domain::{Board, Piece};
use topmoves_service::shared::protocol::TopMovesResponse;

const MIDGAME: &str = "00000000000000000000000000000000000000000000000000000000000000000011100000001110000000111100000111110000011110000011111100011101110011101110001111111000111111100111111110011111111001111111101111111110";

fn midgame() -> Board {
    Board::parse(MIDGAME).expect("valid benchmark board")
}

fn request(depth: u8, playout_count: u32) -> SearchRequest {
    SearchRequest {
        board: midgame(),
        current: Piece::T,
        next: Some(Piece::I),
        level: 18,
        lines: 0,
        timeline: InputTimeline::default(),
        depth,
        playout_count,
    }
}

fn bench_placements(c: &mut Criterion) {
    let mut group = c.benchmark_group("Placement Generation");
    let model = MovementModel::new(InputTimeline::default(), 18);
    let board = midgame();

    for piece in [Piece::I, Piece::O, Piece::T] {
        group.bench_with_input(BenchmarkId::from_parameter(piece.as_char()), &piece, |b, &piece| {
            b.iter(|| model.placements(black_box(&board), piece));
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let evaluator = Evaluator::default();
    let board = midgame();

    c.bench_function("Evaluator - midgame board", |b| {
        b.iter(|| evaluator.evaluate(black_box(&board)));
    });
}

fn bench_hybrid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Hybrid Search");
    group.sample_size(10);
    let engine = HybridSearch::default();

    for playouts in [0u32, 49, 343] {
        let req = request(3, playouts);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("playouts", playouts), &req, |b, req| {
            b.iter(|| engine.search(black_box(req), &Cancellation::new()));
        });
    }

    group.finish();
}

fn bench_serialize_result(c: &mut Criterion) {
    let engine = HybridSearch::default();
    let moves = engine
        .search(&request(1, 7), &Cancellation::new())
        .expect("search succeeds");
    let response: TopMovesResponse = moves.into();

    c.bench_function("serde_json - TopMovesResponse", |b| {
        b.iter(|| serde_json::to_vec(black_box(&response)));
    });
}

criterion_group!(
    benches,
    bench_placements,
    bench_evaluate,
    bench_hybrid_search,
    bench_serialize_result
);
criterion_main!(benches);
