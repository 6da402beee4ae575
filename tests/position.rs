/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use tadpole::{
    Color, Move, PieceKind, Position, Square, Variant, FEN_KIWIPETE, FEN_STARTPOS,
};

/// Positions exercising most of the tricky state transitions: castling both
/// ways, en passant, promotions, pins, and discovered checks.
const TRICKY_FENS: &[&str] = &[
    FEN_STARTPOS,
    FEN_KIWIPETE,
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
    "8/8/1k6/2b5/2pP4/8/5K2/8 b - d3 0 1",
];

// -----------------------------------------------------------------------------
// Literal scenarios

#[test]
fn test_key_survives_make_unmake_round_trip() {
    let mut pos: Position = FEN_STARTPOS.parse().unwrap();
    let original_key = pos.key();

    let mut made = Vec::new();
    for mv_str in ["e2e4", "e7e5", "g1f3", "b8c6"] {
        let mv = Move::from_uci(&pos, mv_str).unwrap();
        pos.make_move(mv);
        made.push(mv);

        // The incremental key always matches a from-scratch computation
        let rebuilt: Position = pos.fen().parse().unwrap();
        assert_eq!(pos.key(), rebuilt.key());
    }

    for mv in made.into_iter().rev() {
        pos.undo_move(mv);
    }
    assert_eq!(pos.key(), original_key);
}

#[test]
fn test_discovered_check_move_is_legal() {
    // b4b5 opens nothing against White's own king and is legal
    let pos: Position = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1".parse().unwrap();
    let mv = Move::from_uci(&pos, "b4b5").unwrap();

    assert!(pos.pseudo_legal(mv));
    assert!(pos.legal(mv));
    assert!(pos.legal_moves().contains(&mv));
}

#[test]
fn test_uncapturable_ep_square_is_dropped() {
    // No black pawn can capture onto e3, so the FEN's claim is discarded and
    // the position hashes exactly like its `-` twin
    let claimed: Position = "4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1".parse().unwrap();
    let plain: Position = "4k3/8/8/8/4P3/8/8/4K3 b - - 0 1".parse().unwrap();

    assert_eq!(claimed.ep_square(), None);
    assert_eq!(claimed.key(), plain.key());
}

#[test]
fn test_chess960_castling_round_trip() {
    let mut pos = Position::from_fen(
        "bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w HFhf - 2 9",
        Variant::Chess960,
    )
    .unwrap();

    // Clear the f1 rook out of the way first, so the h-rook may castle
    pos.make_move_uci("f1f2").unwrap();
    pos.make_move_uci("h7h6").unwrap();

    let before = pos.clone();
    let castle = Move::from_uci(&pos, "g1h1").unwrap();
    assert!(castle.is_castling());

    pos.make_move(castle);
    // King "captures" his own rook and lands on g1; the rook crosses to f1
    assert_eq!(pos.piece_at(Square::G1).map(|p| p.kind()), Some(PieceKind::King));
    assert_eq!(pos.piece_at(Square::F1).map(|p| p.kind()), Some(PieceKind::Rook));
    assert_eq!(pos.piece_at(Square::H1), None);

    pos.undo_move(castle);
    assert_eq!(pos, before);
    assert_eq!(pos.key(), before.key());
    assert!(pos.pos_is_ok_full());
}

#[test]
fn test_three_check_counters_and_terminal_state() {
    let mut pos = Position::from_fen(
        "4k3/8/8/8/8/8/4Q3/4K3 w - - 0 1 +2+0",
        Variant::ThreeCheck,
    )
    .unwrap();
    assert_eq!(pos.checks_given(Color::White), 2);
    assert!(!pos.is_variant_end());

    // The third check ends the game
    pos.make_move_uci("e2e7").unwrap();
    assert_eq!(pos.checks_given(Color::White), 3);
    assert!(pos.is_variant_end());
    assert!(pos.fen().ends_with("+3+0"));

    // No move is accepted once the game is over
    assert!(pos.legal_moves().is_empty());
}

#[test]
fn test_three_check_key_includes_counters() {
    let zero = Position::from_fen(
        "4k3/8/8/8/8/8/4Q3/4K3 w - - 0 1 +0+0",
        Variant::ThreeCheck,
    )
    .unwrap();
    let two = Position::from_fen(
        "4k3/8/8/8/8/8/4Q3/4K3 w - - 0 1 +2+0",
        Variant::ThreeCheck,
    )
    .unwrap();
    assert_ne!(zero.key(), two.key());
}

// -----------------------------------------------------------------------------
// Properties over generated moves

#[test]
fn test_round_trip_restores_byte_image() {
    for fen in TRICKY_FENS {
        let pos: Position = fen.parse().unwrap();
        for mv in pos.legal_moves() {
            let mut walked = pos.clone();
            walked.make_move(mv);
            walked.undo_move(mv);
            assert_eq!(walked, pos, "round trip of {mv} broke {fen}");
        }
    }
}

#[test]
fn test_incremental_keys_match_scratch_recomputation() {
    for fen in TRICKY_FENS {
        let pos: Position = fen.parse().unwrap();
        for mv in pos.legal_moves() {
            let mut walked = pos.clone();
            walked.make_move(mv);
            assert!(
                walked.pos_is_ok_full(),
                "incremental state diverged after {mv} on {fen}"
            );
        }
    }
}

#[test]
fn test_generated_moves_are_pseudo_legal_and_legal() {
    for fen in TRICKY_FENS {
        let pos: Position = fen.parse().unwrap();
        for mv in pos.legal_moves() {
            assert!(pos.pseudo_legal(mv), "{mv} not pseudo-legal on {fen}");
            assert!(pos.legal(mv), "{mv} not legal on {fen}");
        }
    }
}

#[test]
fn test_gives_check_matches_checkers_after_move() {
    for fen in TRICKY_FENS {
        let pos: Position = fen.parse().unwrap();
        for mv in pos.legal_moves() {
            let expected = pos.gives_check(mv);
            let mut walked = pos.clone();
            walked.make_move(mv);
            assert_eq!(
                walked.checkers().is_nonempty(),
                expected,
                "gives_check({mv}) disagreed with checkers on {fen}"
            );
        }
    }
}

#[test]
fn test_material_key_permutation_invariance() {
    // Same piece counts, different placement
    let a: Position = "r1bqkbnr/pppppppp/2n5/8/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 1"
        .parse()
        .unwrap();
    let b: Position = "rnbqkb1r/pppppppp/5n2/4P3/8/2N5/PPPP1PPP/R1BQKBNR b KQkq - 0 1"
        .parse()
        .unwrap();
    assert_eq!(a.material_key(), b.material_key());
    assert_ne!(a.key(), b.key());
    assert_ne!(a.pawn_key(), b.pawn_key());
}

#[test]
fn test_see_sanity_bounds() {
    for fen in TRICKY_FENS {
        let pos: Position = fen.parse().unwrap();
        for mv in pos.legal_moves() {
            if mv.is_castling() {
                continue;
            }

            let see = pos.see(mv);
            if let Some(victim) = pos.piece_at(mv.to()) {
                let attacker = pos.piece_at(mv.from()).unwrap();
                if victim.kind().value() >= attacker.kind().value() {
                    // Winning or equal trades never simulate as worse than
                    // the immediate exchange
                    assert!(
                        see >= victim.kind().value() - attacker.kind().value(),
                        "SEE({mv}) = {see} too low on {fen}"
                    );
                }
            } else if !mv.is_en_passant() {
                // A quiet move gains nothing
                assert!(see <= 0, "SEE({mv}) = {see} positive for a quiet move on {fen}");
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Variant behavior

#[test]
fn test_king_of_the_hill_center_ends_the_game() {
    let pos = Position::from_fen("4k3/8/8/8/3K4/8/8/8 w - - 0 1", Variant::KingOfTheHill)
        .unwrap();
    assert!(pos.is_variant_end());
    assert!(pos.legal_moves().is_empty());

    let pos = Position::from_fen("4k3/8/8/8/8/3K4/8/8 w - - 0 1", Variant::KingOfTheHill)
        .unwrap();
    assert!(!pos.is_variant_end());
}

#[test]
fn test_racing_kings_forbids_checks() {
    // Standard Racing Kings start: all pieces racing from ranks 1-2
    let pos = Position::from_fen(
        "8/8/8/8/8/8/krbnNBRK/qrbnNBRQ w - - 0 1",
        Variant::RacingKings,
    )
    .unwrap();

    // Checking moves exist pseudo-legally, but none survive the legal filter
    assert!(pos
        .pseudo_legal_moves()
        .iter()
        .any(|&mv| pos.gives_check(mv)));
    for mv in pos.legal_moves() {
        assert!(!pos.gives_check(mv), "{mv} gives check in Racing Kings");
    }
}

#[test]
fn test_racing_kings_finish() {
    // March the black king up; the game is only over on arrival at rank 8
    let mut pos =
        Position::from_fen("8/8/8/8/8/8/8/K2k4 b - - 0 1", Variant::RacingKings).unwrap();
    for mv in [
        "d1d2", "a1a2", "d2d3", "a2a1", "d3d4", "a1a2", "d4d5", "a2a1", "d5d6", "a1a2", "d6d7",
        "a2a1", "d7e8",
    ] {
        assert!(!pos.is_variant_end(), "race ended early, before {mv}");
        pos.make_move_uci(mv).unwrap();
    }
    assert!(pos.is_variant_end());
    assert!(pos.legal_moves().is_empty());
}

#[test]
fn test_horde_white_extermination_ends_the_game() {
    // The black king stands in check from the last white pawn and removes it
    let mut pos = Position::from_fen("8/8/8/8/8/2k5/1P6/8 b - - 0 1", Variant::Horde).unwrap();
    assert!(!pos.is_variant_end());

    pos.make_move_uci("c3b2").unwrap();
    assert!(pos.is_variant_end());
    assert!(pos.legal_moves().is_empty());
}

#[test]
fn test_atomic_capture_explodes_neighbors() {
    // Nxd5 detonates: the d5 pawn dies, the knight itself dies, and the
    // adjacent knights and bishops die with them; pawns survive the blast
    let fen = "4k3/8/2nb4/3p4/8/4N3/8/4K3 w - - 0 1";
    let mut pos = Position::from_fen(fen, Variant::Atomic).unwrap();
    let before = pos.clone();

    let mv = Move::from_uci(&pos, "e3d5").unwrap();
    assert!(pos.pseudo_legal(mv) && pos.legal(mv));
    pos.make_move(mv);

    assert_eq!(pos.piece_at(Square::D5), None, "target survived");
    assert_eq!(pos.piece_at(Square::C6), None, "adjacent knight survived");
    assert_eq!(pos.piece_at(Square::D6), None, "adjacent bishop survived");
    assert!(pos.pos_is_ok_full());

    pos.undo_move(mv);
    assert_eq!(pos, before);
    assert!(pos.pos_is_ok_full());
}

#[test]
fn test_atomic_king_may_not_capture() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/3p4/4K3 w - - 0 1", Variant::Atomic).unwrap();
    let mv = Move::from_uci(&pos, "e1d2").unwrap();
    assert!(!pos.pseudo_legal(mv));
    assert!(!pos.legal_moves().contains(&mv));
}

#[test]
fn test_antichess_has_no_checks() {
    let pos = Position::from_fen(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w - - 0 1",
        Variant::Antichess,
    )
    .unwrap();
    assert!(pos.checkers().is_empty());

    for mv in pos.legal_moves() {
        assert!(!pos.gives_check(mv));
    }
}

// -----------------------------------------------------------------------------
// Null moves and draws

#[test]
fn test_null_move_round_trip() {
    let pos: Position = FEN_KIWIPETE.parse().unwrap();
    let mut walked = pos.clone();

    walked.do_null_move();
    assert_ne!(walked.key(), pos.key());
    assert_eq!(walked.side_to_move(), !pos.side_to_move());
    assert_eq!(walked.ep_square(), None);

    walked.undo_null_move();
    assert_eq!(walked, pos);
}

#[test]
fn test_repetition_window_stops_at_null_moves() {
    let mut pos: Position = FEN_STARTPOS.parse().unwrap();
    for mv in ["g1f3", "g8f6", "f3g1"] {
        pos.make_move_uci(mv).unwrap();
    }

    // A null move resets plies_from_null, hiding the earlier occurrences
    pos.do_null_move();
    assert!(!pos.is_draw(0));
}

#[test]
fn test_fifty_move_rule_draw() {
    let pos: Position = "4k3/8/8/8/8/8/8/4K3 w - - 100 80".parse().unwrap();
    assert!(pos.is_draw(0));

    let pos: Position = "4k3/8/8/8/8/8/8/4K3 w - - 99 80".parse().unwrap();
    assert!(!pos.is_draw(0));
}
