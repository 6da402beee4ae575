//! Position Core Benchmarks
//!
//! Performance benchmarks for the hot-path operations a search drives:
//! make/unmake, move generation, SEE, and perft.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tadpole::{perft, Move, Position, FEN_KIWIPETE, FEN_STARTPOS};

fn bench_from_fen(c: &mut Criterion) {
    c.bench_function("from_fen_kiwipete", |b| {
        b.iter(|| black_box(FEN_KIWIPETE.parse::<Position>().unwrap()))
    });
}

fn bench_legal_movegen(c: &mut Criterion) {
    let pos: Position = FEN_KIWIPETE.parse().unwrap();

    c.bench_function("legal_moves_kiwipete", |b| {
        b.iter(|| black_box(pos.legal_moves().len()))
    });
}

fn bench_make_unmake(c: &mut Criterion) {
    let mut pos: Position = FEN_KIWIPETE.parse().unwrap();
    let moves: Vec<Move> = pos.legal_moves().into_iter().collect();

    c.bench_function("make_unmake_kiwipete", |b| {
        b.iter(|| {
            for &mv in &moves {
                let gives_check = pos.gives_check(mv);
                pos.do_move(mv, gives_check);
                pos.undo_move(mv);
            }
            black_box(pos.key())
        })
    });
}

fn bench_see(c: &mut Criterion) {
    let pos: Position = FEN_KIWIPETE.parse().unwrap();
    let captures: Vec<Move> = pos
        .legal_moves()
        .into_iter()
        .filter(|mv| pos.is_capture(*mv))
        .collect();

    c.bench_function("see_kiwipete_captures", |b| {
        b.iter(|| {
            let mut total = 0;
            for &mv in &captures {
                total += pos.see(mv);
            }
            black_box(total)
        })
    });
}

fn bench_perft_3(c: &mut Criterion) {
    let mut pos: Position = FEN_STARTPOS.parse().unwrap();

    c.bench_function("perft_3_startpos", |b| {
        b.iter(|| black_box(perft(&mut pos, 3)))
    });
}

criterion_group!(
    benches,
    bench_from_fen,
    bench_legal_movegen,
    bench_make_unmake,
    bench_see,
    bench_perft_3,
);
criterion_main!(benches);
