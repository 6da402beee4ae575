/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{Bitboard, Color, Piece, PieceKind, Rank, Square};

/// Deltas for the eight ray directions.
///
/// The first four advance toward higher square indices, the last four toward
/// lower ones; `d` and `d + 4` are opposites. Slider lookups rely on this
/// ordering to pick the correct bit-scan direction.
const DIRECTION_DELTAS: [(i8, i8); 8] = [
    (0, 1),   // North
    (1, 0),   // East
    (1, 1),   // Northeast
    (-1, 1),  // Northwest
    (0, -1),  // South
    (-1, 0),  // West
    (-1, -1), // Southwest
    (1, -1),  // Southeast
];

/// Deltas for the movement of the Knight.
const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (1, -2),
    (2, 1),
    (2, -1),
    (-1, 2),
    (-1, -2),
    (-2, 1),
    (-2, -1),
];

/// Ray (exclusive of the origin) from every square in every direction.
const RAYS: [[Bitboard; Square::COUNT]; 8] = {
    let mut rays = [[Bitboard::EMPTY_BOARD; Square::COUNT]; 8];

    let mut d = 0;
    while d < 8 {
        let (df, dr) = DIRECTION_DELTAS[d];
        let mut i = 0;
        while i < Square::COUNT {
            let mut ray = Bitboard::EMPTY_BOARD;
            let mut to = Square::from_index_unchecked(i);

            while let Some(shifted) = to.offset(df, dr) {
                ray = ray.or(shifted.bitboard());
                to = shifted;
            }

            rays[d][i] = ray;
            i += 1;
        }
        d += 1;
    }

    rays
};

/// A table indexed by two squares, holding the squares strictly between them
/// (empty if they do not share a rank, file, or diagonal).
const RAY_BETWEEN: [[Bitboard; Square::COUNT]; Square::COUNT] = {
    let mut rays = [[Bitboard::EMPTY_BOARD; Square::COUNT]; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let from = Square::from_index_unchecked(i);
        let mut d = 0;
        while d < 8 {
            let (df, dr) = DIRECTION_DELTAS[d];
            let mut ray = Bitboard::EMPTY_BOARD;
            let mut to = from;

            while let Some(shifted) = to.offset(df, dr) {
                ray = ray.or(shifted.bitboard());
                to = shifted;
                rays[from.index()][to.index()] = ray.xor(to.bitboard());
            }

            d += 1;
        }

        i += 1;
    }

    rays
};

/// A table indexed by two squares, holding the full line through both
/// (empty if they do not share a rank, file, or diagonal).
const RAY_CONTAINING: [[Bitboard; Square::COUNT]; Square::COUNT] = {
    let mut rays = [[Bitboard::EMPTY_BOARD; Square::COUNT]; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let from = Square::from_index_unchecked(i);
        let mut d = 0;
        // Four axes, pairing each direction with its opposite
        while d < 4 {
            let axis = RAYS[d][i].or(RAYS[d + 4][i]).or(from.bitboard());

            let mut j = 0;
            while j < Square::COUNT {
                if j != i && axis.0 >> j & 1 == 1 {
                    rays[i][j] = axis;
                }
                j += 1;
            }
            d += 1;
        }

        i += 1;
    }

    rays
};

const KNIGHT_ATTACKS: [Bitboard; Square::COUNT] = generate_leaper_mobility(&KNIGHT_DELTAS);
const KING_ATTACKS: [Bitboard; Square::COUNT] = generate_leaper_mobility(&DIRECTION_DELTAS);
const WHITE_PAWN_ATTACKS: [Bitboard; Square::COUNT] = generate_pawn_attacks(Color::White);
const BLACK_PAWN_ATTACKS: [Bitboard; Square::COUNT] = generate_pawn_attacks(Color::Black);
const WHITE_PAWN_PUSHES: [Bitboard; Square::COUNT] = generate_pawn_pushes(Color::White);
const BLACK_PAWN_PUSHES: [Bitboard; Square::COUNT] = generate_pawn_pushes(Color::Black);
const ROOK_RAYS: [Bitboard; Square::COUNT] = generate_slider_rays(0);
const BISHOP_RAYS: [Bitboard; Square::COUNT] = generate_slider_rays(2);

/// Generates the reachable squares from every location for a "leaper" piece
/// (King, Knight) described by its deltas.
const fn generate_leaper_mobility(deltas: &[(i8, i8)]) -> [Bitboard; Square::COUNT] {
    let mut mobility = [Bitboard::EMPTY_BOARD; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let mut movement = Bitboard::EMPTY_BOARD;

        let mut j = 0;
        while j < deltas.len() {
            let (df, dr) = deltas[j];
            if let Some(shifted) = square.offset(df, dr) {
                movement = movement.or(shifted.bitboard());
            }
            j += 1;
        }

        mobility[i] = movement;
        i += 1;
    }

    mobility
}

/// Generates the unobstructed reach of a slider whose two forward directions
/// start at `first_dir` (0 for the Rook's axes, 2 for the Bishop's).
const fn generate_slider_rays(first_dir: usize) -> [Bitboard; Square::COUNT] {
    let mut mobility = [Bitboard::EMPTY_BOARD; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        mobility[i] = RAYS[first_dir][i]
            .or(RAYS[first_dir + 1][i])
            .or(RAYS[first_dir + 4][i])
            .or(RAYS[first_dir + 5][i]);
        i += 1;
    }

    mobility
}

/// Generates capture mobility for Pawns: one square diagonally forward.
const fn generate_pawn_attacks(color: Color) -> [Bitboard; Square::COUNT] {
    let mut boards = [Bitboard::EMPTY_BOARD; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let bb = Square::from_index_unchecked(i).bitboard();
        boards[i] = bb.forward_by(color, 1).east().or(bb.forward_by(color, 1).west());
        i += 1;
    }

    boards
}

/// Generates push mobility for Pawns: one square forward, or two from the pawn rank.
const fn generate_pawn_pushes(color: Color) -> [Bitboard; Square::COUNT] {
    let mut boards = [Bitboard::EMPTY_BOARD; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let bb = square.bitboard();

        if square.rank().inner() == Rank::second(color).inner() {
            boards[i] = bb.forward_by(color, 1).or(bb.forward_by(color, 2));
        } else {
            boards[i] = bb.forward_by(color, 1);
        }

        i += 1;
    }

    boards
}

/// Attacks along one ray direction, truncated at (and including) the first blocker.
#[inline(always)]
fn ray_attacks(square: Square, blockers: Bitboard, dir: usize) -> Bitboard {
    let ray = RAYS[dir][square.index()];
    let obstructed = ray & blockers;
    if obstructed.is_empty() {
        return ray;
    }

    // Directions 0..4 run toward higher indices, so the nearest blocker is the
    // lowest set bit; for 4..8 it is the highest.
    let first = if dir < 4 {
        obstructed.lsb_unchecked()
    } else {
        obstructed.msb_unchecked()
    };

    ray ^ RAYS[dir][first.index()]
}

/// Computes the possible moves for a Rook at a given [`Square`] with the provided blockers.
///
/// The yielded [`Bitboard`] allows the Rook to capture the first blocker in each direction.
#[inline(always)]
pub fn rook_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    ray_attacks(square, blockers, 0)
        | ray_attacks(square, blockers, 1)
        | ray_attacks(square, blockers, 4)
        | ray_attacks(square, blockers, 5)
}

/// Computes the possible moves for a Bishop at a given [`Square`] with the provided blockers.
#[inline(always)]
pub fn bishop_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    ray_attacks(square, blockers, 2)
        | ray_attacks(square, blockers, 3)
        | ray_attacks(square, blockers, 6)
        | ray_attacks(square, blockers, 7)
}

/// Computes the possible moves for a Queen at a given [`Square`] with the provided blockers.
#[inline(always)]
pub fn queen_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    rook_attacks(square, blockers) | bishop_attacks(square, blockers)
}

/// The (unobstructed) reach of a Rook at a given [`Square`].
#[inline(always)]
pub const fn rook_rays(square: Square) -> Bitboard {
    ROOK_RAYS[square.index()]
}

/// The (unobstructed) reach of a Bishop at a given [`Square`].
#[inline(always)]
pub const fn bishop_rays(square: Square) -> Bitboard {
    BISHOP_RAYS[square.index()]
}

/// The raw attacks for a Knight on the provided square.
#[inline(always)]
pub const fn knight_attacks(square: Square) -> Bitboard {
    KNIGHT_ATTACKS[square.index()]
}

/// The raw attacks for a King on the provided square.
#[inline(always)]
pub const fn king_attacks(square: Square) -> Bitboard {
    KING_ATTACKS[square.index()]
}

/// The capture squares for a Pawn of the provided color on the provided square.
#[inline(always)]
pub const fn pawn_attacks(square: Square, color: Color) -> Bitboard {
    match color {
        Color::White => WHITE_PAWN_ATTACKS[square.index()],
        Color::Black => BLACK_PAWN_ATTACKS[square.index()],
    }
}

/// The push squares for a Pawn of the provided color on the provided square.
///
/// Includes the double push from the pawn rank; occupancy is the caller's problem.
#[inline(always)]
pub const fn pawn_pushes(square: Square, color: Color) -> Bitboard {
    match color {
        Color::White => WHITE_PAWN_PUSHES[square.index()],
        Color::Black => BLACK_PAWN_PUSHES[square.index()],
    }
}

/// The default attacks for `piece` on `square`, given `blockers`.
///
/// For Pawns this is only the capture pattern, not the pushes.
#[inline(always)]
pub fn attacks_for(piece: Piece, square: Square, blockers: Bitboard) -> Bitboard {
    match piece.kind() {
        PieceKind::Pawn => pawn_attacks(square, piece.color()),
        PieceKind::Knight => knight_attacks(square),
        PieceKind::Bishop => bishop_attacks(square, blockers),
        PieceKind::Rook => rook_attacks(square, blockers),
        PieceKind::Queen => queen_attacks(square, blockers),
        PieceKind::King => king_attacks(square),
    }
}

/// The squares strictly between `from` and `to`, exclusive of both.
///
/// Empty if the two squares do not share a rank, file, or diagonal.
#[inline(always)]
pub const fn ray_between(from: Square, to: Square) -> Bitboard {
    RAY_BETWEEN[from.index()][to.index()]
}

/// The full line through `from` and `to`, including both.
///
/// Empty if the two squares do not share a rank, file, or diagonal.
#[inline(always)]
pub const fn ray_containing(from: Square, to: Square) -> Bitboard {
    RAY_CONTAINING[from.index()][to.index()]
}

/// Whether `a`, `b`, and `c` all lie on a common rank, file, or diagonal.
#[inline(always)]
pub fn aligned(a: Square, b: Square, c: Square) -> bool {
    ray_containing(a, b).intersects(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rook_blockers() {
        // . . . X . . . X
        // . . . . . . . .
        // . . . X . . . .
        // . . . . . . . .
        // . . . . . . . X
        // . . X . . . . .
        // . . . X . X . .
        // . . . . . . . .
        let blockers =
            Bitboard::new(0b1000100000000000000010000000000010000000000001000010100000000000);

        let moves = rook_attacks(Square::D4, blockers);
        let expected = [
            Square::D2,
            Square::D3,
            Square::D5,
            Square::D6,
            Square::A4,
            Square::B4,
            Square::C4,
            Square::E4,
            Square::F4,
            Square::G4,
            Square::H4,
        ];

        assert_eq!(moves.population() as usize, expected.len());
        for sq in expected {
            assert!(moves.intersects(sq), "{sq} missing from rook attacks");
        }
    }

    #[test]
    fn test_bishop_on_empty_board() {
        assert_eq!(
            bishop_attacks(Square::D4, Bitboard::EMPTY_BOARD),
            bishop_rays(Square::D4)
        );
        assert_eq!(bishop_rays(Square::A1).population(), 7);
    }

    #[test]
    fn test_rays() {
        assert_eq!(
            ray_between(Square::A1, Square::A8),
            Bitboard::FILE_A ^ Square::A1 ^ Square::A8
        );
        assert_eq!(ray_between(Square::C3, Square::F6), Square::D4.bitboard() | Square::E5);
        assert!(ray_between(Square::A1, Square::B3).is_empty());

        assert_eq!(ray_containing(Square::A3, Square::A5), Bitboard::FILE_A);
        assert!(aligned(Square::A1, Square::H8, Square::D4));
        assert!(!aligned(Square::A1, Square::H8, Square::D5));
    }

    #[test]
    fn test_pawn_tables() {
        assert_eq!(
            pawn_attacks(Square::E4, Color::White),
            Square::D5.bitboard() | Square::F5
        );
        assert_eq!(pawn_attacks(Square::A2, Color::Black), Square::B1.bitboard());
        assert_eq!(
            pawn_pushes(Square::E2, Color::White),
            Square::E3.bitboard() | Square::E4
        );
        assert_eq!(pawn_pushes(Square::E3, Color::White), Square::E4.bitboard());
    }

    #[test]
    fn test_leaper_tables() {
        assert_eq!(knight_attacks(Square::A1), Square::B3.bitboard() | Square::C2);
        assert_eq!(king_attacks(Square::A1).population(), 3);
        assert_eq!(king_attacks(Square::E4).population(), 8);
    }
}
