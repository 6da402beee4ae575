/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{
    attacks_for, king_attacks, pawn_attacks, pawn_pushes, ray_between, rook_attacks,
    CastlingRights, File, Move, MoveKind, MoveList, Piece, PieceKind, Position, Rank, Square,
    Variant,
};

impl Position {
    /// Generate all pseudo-legal moves from the current position.
    ///
    /// Pseudo-legal moves are consistent with the board and the piece
    /// movement rules, but may leave the mover's king in check. Castling is
    /// the exception: its path and safety conditions are validated here, so
    /// [`Position::legal`] can accept it unexamined.
    ///
    /// In Antichess, when any capture exists only captures are returned.
    pub fn pseudo_legal_moves(&self) -> MoveList {
        let mut moves = MoveList::new();

        if self.is_variant_end() {
            return moves;
        }

        self.generate_pawn_moves(&mut moves);
        self.generate_piece_moves(&mut moves);
        self.generate_king_moves(&mut moves);

        // Captures are compulsory in Antichess
        if self.variant() == Variant::Antichess
            && moves.iter().any(|mv| self.is_capture(*mv))
        {
            moves.retain(|mv| self.is_capture(*mv));
        }

        moves
    }

    /// Generate all legal moves from the current position.
    pub fn legal_moves(&self) -> MoveList {
        let mut moves = self.pseudo_legal_moves();
        moves.retain(|mv| self.generated_move_is_legal(*mv));
        moves
    }

    /// The legality filter for moves produced by this generator: the check
    /// evasion constraint (which [`Position::legal`] assumes was already
    /// enforced), then `legal` itself.
    fn generated_move_is_legal(&self, mv: Move) -> bool {
        let checkers = self.checkers();

        if checkers.is_nonempty() && matches!(mv.kind(), MoveKind::Normal | MoveKind::Promotion) {
            let us = self.side_to_move();
            let pc = self.piece_at(mv.from()).unwrap();

            // Atomic captures can blast the checker off the board from a
            // distance; `legal` simulates that exactly
            let atomic_capture = self.variant() == Variant::Atomic && self.is_capture(mv);

            if !pc.is_king() && !atomic_capture {
                // Under double check only the king moves
                if checkers.more_than_one() {
                    return false;
                }
                // Otherwise the move must block or capture the sole checker
                let ksq = self.king_square(us).unwrap();
                let checker = checkers.lsb_unchecked();
                if !(ray_between(checker, ksq) | checkers).intersects(mv.to()) {
                    return false;
                }
            }
        }

        self.legal(mv)
    }

    /// Generates all pawn moves: captures, en passant, pushes, promotions.
    fn generate_pawn_moves(&self, moves: &mut MoveList) {
        let us = self.side_to_move();
        let them = !us;
        let occupied = self.occupied();
        let enemy = self.color(them);

        for from in self.pawns(us) {
            for to in pawn_attacks(from, us) & enemy {
                if to.rank() == Rank::eighth(us) {
                    push_promotions(moves, from, to);
                } else {
                    moves.push(Move::new(from, to, MoveKind::Normal));
                }
            }

            if let Some(ep) = self.ep_square() {
                if pawn_attacks(from, us).intersects(ep) {
                    moves.push(Move::new(from, ep, MoveKind::EnPassant));
                }
            }

            // A piece on the single-push square shadows the double-push
            // square once shifted forward, blocking both at once
            let all_but_this_pawn = occupied ^ from;
            let double_push_mask = all_but_this_pawn | all_but_this_pawn.forward_by(us, 1);
            let mut pushes = pawn_pushes(from, us) & !double_push_mask & !occupied;

            // The Horde's back-rank pawns get the double push too
            if self.variant() == Variant::Horde && from.rank() == Rank::first(us) {
                if let (Some(one), Some(two)) = (from.forward_by(us, 1), from.forward_by(us, 2)) {
                    if !self.has(one) && !self.has(two) {
                        pushes |= two;
                    }
                }
            }

            for to in pushes {
                if to.rank() == Rank::eighth(us) {
                    push_promotions(moves, from, to);
                } else {
                    moves.push(Move::new(from, to, MoveKind::Normal));
                }
            }
        }
    }

    /// Generates all Knight, Bishop, Rook, and Queen moves.
    fn generate_piece_moves(&self, moves: &mut MoveList) {
        let us = self.side_to_move();
        let occupied = self.occupied();

        for kind in [
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ] {
            let piece = Piece::new(us, kind);
            for from in self.piece_parts(us, kind) {
                for to in attacks_for(piece, from, occupied) & !self.color(us) {
                    moves.push(Move::new(from, to, MoveKind::Normal));
                }
            }
        }
    }

    /// Generates king steps and castling.
    fn generate_king_moves(&self, moves: &mut MoveList) {
        let us = self.side_to_move();
        let them = !us;

        for from in self.king(us) {
            for to in king_attacks(from) & !self.color(us) {
                moves.push(Move::new(from, to, MoveKind::Normal));
            }
        }

        // No castling out of check, and some variants have none at all
        if !self.variant().has_castling() || self.checkers().is_nonempty() {
            return;
        }

        let occupied = self.occupied();
        for short in [true, false] {
            let right = CastlingRights::right(us, short);
            let Some(rfrom) = self.castling_rook_square(us, short) else {
                continue;
            };
            let Some(kfrom) = self.king_square(us) else {
                continue;
            };

            if self.castling_path(right).intersects(occupied) {
                continue;
            }

            // Every square the king crosses, destination included, must be safe
            let kto = Square::new(if short { File::G } else { File::C }, kfrom.rank());
            let king_path = ray_between(kfrom, kto) | kto;
            if king_path
                .into_iter()
                .any(|s| (self.attackers_to(s, occupied) & self.color(them)).is_nonempty())
            {
                continue;
            }

            // With variable rook files, the castling rook itself may be
            // shielding the king's destination from a slider along the rank
            if (rook_attacks(kto, occupied ^ rfrom) & self.orthogonal_sliders(them)).is_nonempty()
            {
                continue;
            }

            moves.push(Move::new(kfrom, rfrom, MoveKind::Castling));
        }
    }
}

/// Appends all four promotions of the pawn move `from` -> `to`.
#[inline(always)]
fn push_promotions(moves: &mut MoveList, from: Square, to: Square) {
    for kind in [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ] {
        moves.push(Move::new_promotion(from, to, kind));
    }
}
