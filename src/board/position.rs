/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};

use crate::psqt::{psqt, Score};

use super::{
    aligned, attacks_for, bishop_attacks, bishop_rays, king_attacks, knight_attacks, pawn_attacks,
    ray_between, rook_attacks, rook_rays, Bitboard, CastlingRights, Color, File, Move, MoveKind,
    Piece, PieceKind, Rank, Square, StateInfo, Variant, ZobristKey,
};

/// FEN string for the starting position of chess.
pub const FEN_STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A popular FEN string for debugging move generation.
pub const FEN_KIWIPETE: &str =
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

/// Upper bound on the ply depth of a single game or search line.
///
/// The state stack reserves this many entries up front so `do_move` does not
/// allocate in steady state.
pub const MAX_PLY: usize = 256;

/// Returned by [`Position::see_sign`] when the exchange is trivially winning.
pub const SEE_KNOWN_WIN: i32 = 10_000;

/// Returned by the Atomic exchange evaluator when the enemy King sits in the blast.
pub const SEE_MATE: i32 = 32_000;

/// A chess position under one of the supported [`Variant`]s.
///
/// This is the mutable substrate a search drives: millions of
/// [`Position::do_move`] / [`Position::undo_move`] pairs per second, each
/// keeping the mailbox, the bitboards, the piece counts, and the incremental
/// hash keys in exact lockstep. Everything a move changes that cannot be
/// recomputed cheaply lives in a [`StateInfo`], and those are stacked
/// contiguously inside the position, indexed by ply.
#[derive(Clone)]
pub struct Position {
    /// Mailbox: which piece (if any) stands on each square.
    board: [Option<Piece>; Square::COUNT],

    /// All squares occupied by a specific piece kind, both colors together.
    by_type: [Bitboard; PieceKind::COUNT],

    /// All squares occupied by a specific color.
    by_color: [Bitboard; Color::COUNT],

    /// Number of pieces of each kind and color on the board.
    ///
    /// `material_key` is defined over these counts, which is what makes it
    /// permutation-invariant.
    piece_count: [u8; Piece::COUNT],

    /// For each square, the castling rights that touching it invalidates.
    castling_rights_mask: [CastlingRights; Square::COUNT],

    /// The starting square of the rook for each single castling right.
    castling_rook_squares: [Option<Square>; CastlingRights::COUNT],

    /// The squares that must be empty for each castling to be pseudo-legal.
    castling_paths: [Bitboard; CastlingRights::COUNT],

    /// The player whose turn it is.
    side_to_move: Color,

    /// Halfmoves played since the starting position of the game.
    game_ply: i32,

    /// The rule set this position is played under.
    variant: Variant,

    /// Moves made on this position since construction. Not part of equality.
    nodes: u64,

    /// The per-ply state stack; the last entry is the current state.
    states: Vec<StateInfo>,
}

impl Position {
    /// Creates a new, empty [`Position`] for the provided [`Variant`]:
    /// no pieces, White to move, no castling rights.
    pub fn new(variant: Variant) -> Self {
        let mut states = Vec::with_capacity(MAX_PLY);
        states.push(StateInfo::new());

        let mut pos = Self {
            board: [None; Square::COUNT],
            by_type: [Bitboard::EMPTY_BOARD; PieceKind::COUNT],
            by_color: [Bitboard::EMPTY_BOARD; Color::COUNT],
            piece_count: [0; Piece::COUNT],
            castling_rights_mask: [CastlingRights::NONE; Square::COUNT],
            castling_rook_squares: [None; CastlingRights::COUNT],
            castling_paths: [Bitboard::EMPTY_BOARD; CastlingRights::COUNT],
            side_to_move: Color::White,
            game_ply: 0,
            variant,
            nodes: 0,
            states,
        };
        pos.set_state();
        pos
    }

    /// Creates a new [`Position`] from the provided FEN string.
    ///
    /// Accepts standard castling tags (`KQkq`), Shredder rook files
    /// (`HAha`), and X-FEN; an en passant square is kept only when a pawn of
    /// the side to move could actually capture there. Three-Check FENs may
    /// carry a trailing `+w+b` pair of checks-given counters.
    pub fn from_fen(fen: &str, variant: Variant) -> Result<Self> {
        let mut pos = Self::new(variant);
        let mut split = fen.trim().split_ascii_whitespace();

        let placements = split
            .next()
            .ok_or(anyhow!("FEN string must have piece placements"))?;
        if placements.matches('/').count() != 7 {
            bail!("FEN must have piece placements for all 8 ranks");
        }

        // Need to reverse so that White's pieces land at the "bottom" of the board
        for (rank, placements) in placements.split('/').rev().enumerate() {
            let mut file = 0;
            for piece_char in placements.chars() {
                if let Ok(piece) = Piece::from_uci(piece_char) {
                    if file >= 8 {
                        bail!("Rank {} has more than 8 squares", rank + 1);
                    }
                    let square =
                        Square::new(File::new_unchecked(file), Rank::new_unchecked(rank as u8));
                    pos.put_piece(piece, square);
                    file += 1;
                } else {
                    let Some(empty) = piece_char.to_digit(10) else {
                        bail!("FEN placements must contain piece chars or digits. Got {piece_char:?}");
                    };
                    file += empty as u8;
                }
            }
        }

        pos.side_to_move = Color::from_uci(split.next().unwrap_or("w"))?;

        for c in split.next().unwrap_or("-").chars() {
            if c == '-' {
                continue;
            }
            let color = Color::from_case(c);
            let rank = Rank::first(color);
            let Some(ksq) = pos.king_square(color) else {
                continue;
            };
            if ksq.rank() != rank {
                continue;
            }
            let rook = Piece::new(color, PieceKind::Rook);

            let rsq = match c.to_ascii_uppercase() {
                // Scan outward from the edge toward the king for the rook
                'K' => {
                    let mut sq = Square::new(File::H, rank);
                    while sq != ksq && pos.piece_at(sq) != Some(rook) {
                        sq = Square::from_index_unchecked(sq.index() - 1);
                    }
                    sq
                }
                'Q' => {
                    let mut sq = Square::new(File::A, rank);
                    while sq != ksq && pos.piece_at(sq) != Some(rook) {
                        sq = Square::from_index_unchecked(sq.index() + 1);
                    }
                    sq
                }
                'A'..='H' => Square::new(File::from_char(c)?, rank),
                _ => bail!("Castling tags must be K, Q, k, q, or file letters. Got {c:?}"),
            };

            if rsq != ksq {
                pos.set_castling_right(color, rsq);
            }
        }

        let us = pos.side_to_move;
        match split.next().unwrap_or("-") {
            "-" => {}
            ep => {
                let ep = Square::from_uci(ep)?;
                if pos.ep_square_is_valid(ep) {
                    pos.st_mut().ep_square = Some(ep);
                }
            }
        }

        let halfmove = split.next().unwrap_or("0");
        pos.st_mut().rule50 = halfmove.parse().or(Err(anyhow!(
            "FEN string must have a valid halfmove counter. Got {halfmove:?}"
        )))?;

        let fullmove: i32 = split.next().unwrap_or("1").parse().unwrap_or(1);
        // Convert from fullmoves starting at 1 to plies starting at 0,
        // tolerating the common incorrect `fullmove = 0`
        pos.game_ply = (2 * (fullmove - 1)).max(0) + us.is_black() as i32;

        if pos.variant == Variant::ThreeCheck {
            if let Some(checks) = split.next() {
                let mut parts = checks.split('+').skip(1);
                for color in Color::all() {
                    if let Some(n) = parts.next().and_then(|n| n.parse::<u8>().ok()) {
                        pos.st_mut().checks_given[color.index()] = n.min(3);
                    }
                }
            }
        }

        pos.set_state();
        debug_assert!(pos.pos_is_ok_full());
        Ok(pos)
    }

    /// Generates the FEN string of this position.
    ///
    /// Castling rights are written in Shredder (rook file) form iff the
    /// variant is Chess960; Three-Check appends its checks-given counters.
    pub fn fen(&self) -> String {
        let mut placements = String::new();
        for rank in Rank::iter().rev() {
            let mut empty = 0;
            for file in File::iter() {
                if let Some(piece) = self.piece_at(Square::new(file, rank)) {
                    if empty != 0 {
                        placements += &empty.to_string();
                        empty = 0;
                    }
                    placements.push(piece.char());
                } else {
                    empty += 1;
                }
            }
            if empty != 0 {
                placements += &empty.to_string();
            }
            if rank != Rank::ONE {
                placements.push('/');
            }
        }

        let mut castling = String::with_capacity(4);
        for (color, short) in [
            (Color::White, true),
            (Color::White, false),
            (Color::Black, true),
            (Color::Black, false),
        ] {
            let right = CastlingRights::right(color, short);
            if !self.castling_rights().contains(right) {
                continue;
            }
            if self.is_chess960() {
                let file = self.castling_rook_squares[right.index()]
                    .map(|sq| sq.file().char())
                    .unwrap_or('-');
                castling.push(if color.is_white() {
                    file.to_ascii_uppercase()
                } else {
                    file
                });
            } else {
                let c = if short { 'k' } else { 'q' };
                castling.push(if color.is_white() {
                    c.to_ascii_uppercase()
                } else {
                    c
                });
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }

        let ep = self
            .ep_square()
            .map(|sq| sq.to_uci())
            .unwrap_or(String::from("-"));
        let fullmove = 1 + (self.game_ply - self.side_to_move.is_black() as i32) / 2;

        let mut fen = format!(
            "{placements} {} {castling} {ep} {} {fullmove}",
            self.side_to_move,
            self.rule50()
        );

        if self.variant == Variant::ThreeCheck {
            fen += &format!(
                " +{}+{}",
                self.checks_given(Color::White),
                self.checks_given(Color::Black)
            );
        }

        fen
    }

    /// Whether an en passant square claimed by a FEN is actually usable:
    /// a friendly pawn attacks it, it and the square past it are empty, and
    /// the enemy pawn that just double-pushed stands in front of it.
    ///
    /// Keeping an unusable claim would make tactically identical positions
    /// hash differently.
    fn ep_square_is_valid(&self, ep: Square) -> bool {
        let us = self.side_to_move;
        let them = !us;

        let sixth = ep.rank() == Rank::SIX.relative_to(us);
        // A Horde first-rank double push leaves its ep square one rank deeper
        let horde_seventh =
            self.variant == Variant::Horde && ep.rank() == Rank::SEVEN.relative_to(us);
        if !sixth && !horde_seventh {
            return false;
        }
        if (self.attackers_to(ep, self.occupied()) & self.pawns(us)).is_empty() {
            return false;
        }
        if self.has(ep) {
            return false;
        }
        // The origin square of the double push must be empty now
        if ep.forward_by(us, 1).is_some_and(|sq| self.has(sq)) {
            return false;
        }
        // The pawn that just pushed must be behind the ep square
        ep.backward_by(us, 1)
            .is_some_and(|sq| self.piece_at(sq) == Some(Piece::new(them, PieceKind::Pawn)))
    }

    /// Records the castling right of `color` with the rook starting on `rfrom`,
    /// deriving the movement path and the per-square invalidation masks.
    fn set_castling_right(&mut self, color: Color, rfrom: Square) {
        let kfrom = self.king_square(color).unwrap();
        let short = kfrom < rfrom;
        let cr = CastlingRights::right(color, short);

        self.st_mut().castling_rights |= cr;
        self.castling_rights_mask[kfrom.index()] |= cr;
        self.castling_rights_mask[rfrom.index()] |= cr;
        self.castling_rook_squares[cr.index()] = Some(rfrom);

        let kto = Square::new(if short { File::G } else { File::C }, kfrom.rank());
        let rto = Square::new(if short { File::F } else { File::D }, kfrom.rank());

        // Every square either piece crosses must be free, except the two
        // squares the pieces start on (they may overlap in Chess960)
        let mut path = (ray_between(rfrom, rto) | rto) | (ray_between(kfrom, kto) | kto);
        path &= !(kfrom.bitboard() | rfrom);
        self.castling_paths[cr.index()] = path;
    }

    // -------------------------------------------------------------------------
    // Queries

    /// The player whose turn it is.
    #[inline(always)]
    pub const fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// Halfmoves played since the start of the game.
    #[inline(always)]
    pub const fn game_ply(&self) -> i32 {
        self.game_ply
    }

    /// The rule set this position is played under.
    #[inline(always)]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// Whether FEN output and castle display use Chess960 conventions.
    #[inline(always)]
    pub const fn is_chess960(&self) -> bool {
        self.variant.is_chess960()
    }

    /// Number of moves made on this position since construction.
    #[inline(always)]
    pub const fn nodes(&self) -> u64 {
        self.nodes
    }

    /// The current (topmost) [`StateInfo`].
    #[inline(always)]
    fn st(&self) -> &StateInfo {
        // The stack always holds at least the root state
        self.states.last().unwrap()
    }

    #[inline(always)]
    fn st_mut(&mut self) -> &mut StateInfo {
        self.states.last_mut().unwrap()
    }

    /// Zobrist hash of the full position.
    #[inline(always)]
    pub fn key(&self) -> ZobristKey {
        self.st().key
    }

    /// Zobrist hash of the pawn structure only.
    #[inline(always)]
    pub fn pawn_key(&self) -> ZobristKey {
        self.st().pawn_key
    }

    /// Count-based material hash, permutation-invariant over piece placement.
    #[inline(always)]
    pub fn material_key(&self) -> ZobristKey {
        self.st().material_key
    }

    /// Enemy pieces currently giving check to the side to move.
    #[inline(always)]
    pub fn checkers(&self) -> Bitboard {
        self.st().checkers
    }

    /// Pieces of either color shielding `color`'s king from a slider.
    #[inline(always)]
    pub fn blockers_for_king(&self, color: Color) -> Bitboard {
        self.st().blockers_for_king[color.index()]
    }

    /// Squares from which a piece of `kind` would check the enemy king.
    #[inline(always)]
    pub fn check_squares(&self, kind: PieceKind) -> Bitboard {
        self.st().check_squares[kind.index()]
    }

    /// The en passant square, if a capture there is actually possible.
    #[inline(always)]
    pub fn ep_square(&self) -> Option<Square> {
        self.st().ep_square
    }

    /// Halfmoves since the last capture or pawn move.
    #[inline(always)]
    pub fn rule50(&self) -> i32 {
        self.st().rule50
    }

    /// Halfmoves since the last null move, bounding the repetition window.
    #[inline(always)]
    pub fn plies_from_null(&self) -> i32 {
        self.st().plies_from_null
    }

    /// Current castling rights.
    #[inline(always)]
    pub fn castling_rights(&self) -> CastlingRights {
        self.st().castling_rights
    }

    /// The starting square of `color`'s castling rook on the given side, if
    /// the corresponding right is still held.
    #[inline(always)]
    pub fn castling_rook_square(&self, color: Color, short: bool) -> Option<Square> {
        let right = CastlingRights::right(color, short);
        if self.castling_rights().contains(right) {
            self.castling_rook_squares[right.index()]
        } else {
            None
        }
    }

    /// The squares that must be empty for the given castling to be pseudo-legal.
    #[inline(always)]
    pub fn castling_path(&self, right: CastlingRights) -> Bitboard {
        self.castling_paths[right.index()]
    }

    /// Total value of `color`'s non-pawn material.
    #[inline(always)]
    pub fn non_pawn_material(&self, color: Color) -> i32 {
        self.st().non_pawn_material[color.index()]
    }

    /// The incremental piece-square score, White-positive.
    #[inline(always)]
    pub fn psq_score(&self) -> Score {
        self.st().psq
    }

    /// Checks delivered so far by `color` (Three-Check).
    #[inline(always)]
    pub fn checks_given(&self, color: Color) -> u8 {
        self.st().checks_given[color.index()]
    }

    /// The piece removed by the last move made, if any.
    #[inline(always)]
    pub fn captured_piece(&self) -> Option<Piece> {
        self.st().captured_piece
    }

    /// The piece at the given [`Square`], if any.
    #[inline(always)]
    pub const fn piece_at(&self, square: Square) -> Option<Piece> {
        self.board[square.index()]
    }

    /// Returns `true` if there is a piece at the given [`Square`].
    #[inline(always)]
    pub const fn has(&self, square: Square) -> bool {
        self.board[square.index()].is_some()
    }

    /// All squares occupied by the given piece kind, either color.
    #[inline(always)]
    pub const fn kind(&self, kind: PieceKind) -> Bitboard {
        self.by_type[kind.index()]
    }

    /// All squares occupied by the given color.
    #[inline(always)]
    pub const fn color(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    /// All occupied squares.
    #[inline(always)]
    pub const fn occupied(&self) -> Bitboard {
        self.color(Color::White).or(self.color(Color::Black))
    }

    /// All squares occupied by `color` pieces of `kind`.
    #[inline(always)]
    pub const fn piece_parts(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.color(color).and(self.kind(kind))
    }

    /// Number of `piece`s on the board.
    #[inline(always)]
    pub const fn count(&self, piece: Piece) -> u8 {
        self.piece_count[piece.index()]
    }

    /// The Pawns of the provided color.
    #[inline(always)]
    pub const fn pawns(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::Pawn)
    }

    /// The Knights of the provided color.
    #[inline(always)]
    pub const fn knights(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::Knight)
    }

    /// The King of the provided color (empty in Horde for White, and after a
    /// variant ending in Atomic or Antichess).
    #[inline(always)]
    pub const fn king(&self, color: Color) -> Bitboard {
        self.piece_parts(color, PieceKind::King)
    }

    /// The square of `color`'s King, if that King exists.
    #[inline(always)]
    pub const fn king_square(&self, color: Color) -> Option<Square> {
        self.king(color).to_square()
    }

    /// Rooks and Queens of the provided color.
    #[inline(always)]
    pub fn orthogonal_sliders(&self, color: Color) -> Bitboard {
        (self.kind(PieceKind::Rook) | self.kind(PieceKind::Queen)) & self.color(color)
    }

    /// Bishops and Queens of the provided color.
    #[inline(always)]
    pub fn diagonal_sliders(&self, color: Color) -> Bitboard {
        (self.kind(PieceKind::Bishop) | self.kind(PieceKind::Queen)) & self.color(color)
    }

    /// Returns `true` if `mv` takes an enemy piece.
    #[inline(always)]
    pub fn is_capture(&self, mv: Move) -> bool {
        (self.has(mv.to()) && !mv.is_castling()) || mv.is_en_passant()
    }

    // -------------------------------------------------------------------------
    // Board surgery
    //
    // None of these touch hash keys, psq, or material; the make-move code
    // batches those updates itself.

    #[inline(always)]
    pub(crate) fn put_piece(&mut self, piece: Piece, square: Square) {
        self.board[square.index()] = Some(piece);
        self.by_type[piece.kind().index()] |= square;
        self.by_color[piece.color().index()] |= square;
        self.piece_count[piece.index()] += 1;
    }

    #[inline(always)]
    pub(crate) fn remove_piece(&mut self, piece: Piece, square: Square) {
        debug_assert_eq!(self.board[square.index()], Some(piece));
        self.board[square.index()] = None;
        self.by_type[piece.kind().index()] ^= square;
        self.by_color[piece.color().index()] ^= square;
        self.piece_count[piece.index()] -= 1;
    }

    #[inline(always)]
    pub(crate) fn move_piece(&mut self, piece: Piece, from: Square, to: Square) {
        let from_to = from.bitboard() | to;
        self.by_type[piece.kind().index()] ^= from_to;
        self.by_color[piece.color().index()] ^= from_to;
        self.board[from.index()] = None;
        self.board[to.index()] = Some(piece);
    }

    // -------------------------------------------------------------------------
    // Attack queries

    /// All pieces of either color attacking square `s`, with slider attacks
    /// computed over the provided occupancy.
    ///
    /// Pawn attackers are found with the *reversed* pattern: the attackers of
    /// `s` sit where an opposite-colored pawn on `s` would capture.
    pub fn attackers_to(&self, s: Square, occupied: Bitboard) -> Bitboard {
        (pawn_attacks(s, Color::Black) & self.pawns(Color::White))
            | (pawn_attacks(s, Color::White) & self.pawns(Color::Black))
            | (knight_attacks(s) & self.kind(PieceKind::Knight))
            | (rook_attacks(s, occupied)
                & (self.kind(PieceKind::Rook) | self.kind(PieceKind::Queen)))
            | (bishop_attacks(s, occupied)
                & (self.kind(PieceKind::Bishop) | self.kind(PieceKind::Queen)))
            | (king_attacks(s) & self.kind(PieceKind::King))
    }

    /// All pieces (of both colors) shielding square `s` from the sliders in
    /// `sliders`: each is the sole piece between `s` and one of those sliders.
    ///
    /// With `s` a king square, an opposite-colored blocker is pinned and a
    /// same-colored one is a discovered-check candidate.
    pub fn slider_blockers(&self, sliders: Bitboard, s: Square) -> Bitboard {
        let mut result = Bitboard::EMPTY_BOARD;

        // Sliders whose unobstructed ray reaches `s`
        let mut pinners = ((rook_rays(s)
            & (self.kind(PieceKind::Queen) | self.kind(PieceKind::Rook)))
            | (bishop_rays(s) & (self.kind(PieceKind::Queen) | self.kind(PieceKind::Bishop))))
            & sliders;

        while let Some(pinner) = pinners.pop_lsb() {
            let between = ray_between(s, pinner) & self.occupied();
            if between.is_nonempty() && !between.more_than_one() {
                result |= between;
            }
        }

        result
    }

    // -------------------------------------------------------------------------
    // Derived state

    /// Rebuilds every derived field of the current state from the board.
    ///
    /// Used once after FEN parsing; everything else maintains these fields
    /// incrementally, and [`Position::pos_is_ok_full`] uses this as the oracle.
    fn set_state(&mut self) {
        let si = self.computed_state();
        *self.st_mut() = si;
        self.set_check_info();
    }

    /// Recomputes the derived fields of the current state from scratch,
    /// carrying over the fields that are not functions of the board
    /// (counters, rights, captured piece, blast record).
    fn computed_state(&self) -> StateInfo {
        let mut si = *self.st();
        let variant = self.variant;

        si.key = ZobristKey::from_variant(variant);
        si.pawn_key = ZobristKey::from_variant(variant);
        si.material_key = ZobristKey::from_variant(variant);
        si.psq = Score::ZERO;
        si.non_pawn_material = [0; Color::COUNT];

        for square in self.occupied() {
            let piece = self.piece_at(square).unwrap();
            si.key.hash_piece(square, piece);
            si.psq += psqt(piece, square);
        }

        if let Some(ep) = si.ep_square {
            si.key.hash_ep_file(ep.file());
        }
        if self.side_to_move.is_black() {
            si.key.hash_side();
        }
        si.key.hash_castling(si.castling_rights);

        for square in self.kind(PieceKind::Pawn) {
            si.pawn_key.hash_piece(square, self.piece_at(square).unwrap());
        }

        for piece in Piece::all() {
            for cnt in 0..self.count(piece) {
                si.material_key.hash(ZobristKey::piece_key(cnt as usize, piece));
            }
            if !matches!(piece.kind(), PieceKind::Pawn | PieceKind::King) {
                si.non_pawn_material[piece.color().index()] +=
                    self.count(piece) as i32 * piece.kind().value();
            }
        }

        if variant == Variant::ThreeCheck {
            for color in Color::all() {
                for n in 1..=si.checks_given[color.index()] {
                    si.key.hash_check_given(color, n);
                }
            }
        }

        si.checkers = self.compute_checkers();

        self.compute_check_info(&mut si);
        si
    }

    /// The checkers bitboard for the side to move, honoring the variants that
    /// redefine (or abolish) check.
    fn compute_checkers(&self) -> Bitboard {
        let us = self.side_to_move;
        let them = !us;

        match self.variant {
            Variant::Antichess => Bitboard::EMPTY_BOARD,

            // Racing Kings reuses the checkers slot as the "someone finished"
            // flag: the enemy king's rank-8 bit, unless our king already
            // finished too
            Variant::RacingKings => {
                let our_king = self.king_square(us);
                if our_king.is_some_and(|sq| sq.rank() == Rank::EIGHT) {
                    Bitboard::EMPTY_BOARD
                } else {
                    Bitboard::RANK_8 & self.king(them)
                }
            }

            _ => {
                let Some(ksq) = self.king_square(us) else {
                    return Bitboard::EMPTY_BOARD;
                };
                // Adjacent kings in Atomic suspend check entirely
                if self.variant == Variant::Atomic
                    && self
                        .king_square(them)
                        .is_some_and(|theirs| king_attacks(ksq).intersects(theirs))
                {
                    return Bitboard::EMPTY_BOARD;
                }
                self.attackers_to(ksq, self.occupied()) & self.color(them)
            }
        }
    }

    /// Recomputes king-attack metadata on the current state: blockers for
    /// both kings, and the squares from which each piece kind would check the
    /// opponent of the side to move.
    fn set_check_info(&mut self) {
        let mut si = *self.st();
        self.compute_check_info(&mut si);
        *self.st_mut() = si;
    }

    fn compute_check_info(&self, si: &mut StateInfo) {
        for color in Color::all() {
            si.blockers_for_king[color.index()] = match self.king_square(color) {
                Some(ksq) => self.slider_blockers(self.color(!color), ksq),
                None => Bitboard::EMPTY_BOARD,
            };
        }

        si.check_squares = [Bitboard::EMPTY_BOARD; PieceKind::COUNT];
        if !self.variant.has_checks() {
            return;
        }
        let them = !self.side_to_move;
        let Some(ksq) = self.king_square(them) else {
            return;
        };

        let occupied = self.occupied();
        si.check_squares[PieceKind::Pawn.index()] = pawn_attacks(ksq, them);
        si.check_squares[PieceKind::Knight.index()] = knight_attacks(ksq);
        si.check_squares[PieceKind::Bishop.index()] = bishop_attacks(ksq, occupied);
        si.check_squares[PieceKind::Rook.index()] = rook_attacks(ksq, occupied);
        si.check_squares[PieceKind::Queen.index()] = si.check_squares
            [PieceKind::Bishop.index()]
            | si.check_squares[PieceKind::Rook.index()];
        si.check_squares[PieceKind::King.index()] = Bitboard::EMPTY_BOARD;
    }

    // -------------------------------------------------------------------------
    // Variant endings

    /// Whether a variant-specific terminal condition has been reached.
    ///
    /// Standard checkmate and stalemate are the move generator's business;
    /// this covers only the win/loss conditions the variants add.
    pub fn is_variant_end(&self) -> bool {
        match self.variant {
            Variant::Standard | Variant::Chess960 => false,

            Variant::KingOfTheHill => (self.kind(PieceKind::King) & Bitboard::CENTER).is_nonempty(),

            Variant::ThreeCheck => {
                self.checks_given(Color::White) >= 3 || self.checks_given(Color::Black) >= 3
            }

            Variant::Horde => self.color(Color::White).is_empty(),

            // Black gets one reply after White finishes; both finishing is the
            // drawn outcome
            Variant::RacingKings => {
                let black_done = (self.king(Color::Black) & Bitboard::RANK_8).is_nonempty();
                let white_done = (self.king(Color::White) & Bitboard::RANK_8).is_nonempty();
                black_done || (white_done && self.side_to_move.is_white())
            }

            Variant::Antichess => {
                self.color(Color::White).is_empty() || self.color(Color::Black).is_empty()
            }

            Variant::Atomic => {
                self.king_square(Color::White).is_none() || self.king_square(Color::Black).is_none()
            }
        }
    }

    // -------------------------------------------------------------------------
    // Move classification

    /// Validates a move that arrived through an untrusted channel, such as a
    /// transposition-table entry corrupted by concurrent access or key
    /// aliasing. Returning `false` is the error signal; nothing panics.
    pub fn pseudo_legal(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let them = !us;
        let from = mv.from();
        let to = mv.to();

        // A finished game has no moves
        if self.is_variant_end() {
            return false;
        }
        if mv.is_null() {
            return false;
        }

        let Some(pc) = self.piece_at(from) else {
            return false;
        };
        if pc.color() != us {
            return false;
        }

        if self.variant == Variant::Atomic && self.is_capture(mv) {
            // Kings may never capture: the explosion would take them with it
            if pc.is_king() {
                return false;
            }
            // Nor may any capture detonate next to our own king
            if let Some(ksq) = self.king_square(us) {
                if king_attacks(to).intersects(ksq) {
                    return false;
                }
            }
        }

        // Uncommon move kinds go through the full generator
        if mv.kind() != MoveKind::Normal {
            return self.legal_moves().contains(&mv);
        }

        // Not a promotion, so the promotion bits must be empty
        if mv.promotion_unchecked() != PieceKind::Knight {
            return false;
        }

        if self.color(us).intersects(to) {
            return false;
        }

        if pc.is_pawn() {
            // Promotions were already handled, so the pawn cannot arrive on
            // the last rank
            if to.rank() == Rank::eighth(us) {
                return false;
            }

            let capture = (pawn_attacks(from, us) & self.color(them)).intersects(to);
            let single_push = from.forward_by(us, 1) == Some(to) && !self.has(to);
            let double_rank = from.rank() == Rank::second(us)
                || (self.variant == Variant::Horde && from.rank() == Rank::first(us));
            let double_push = from.forward_by(us, 2) == Some(to)
                && double_rank
                && !self.has(to)
                && !from.forward_by(us, 1).is_some_and(|sq| self.has(sq));

            if !capture && !single_push && !double_push {
                return false;
            }
        } else if !attacks_for(pc, from, self.occupied()).intersects(to) {
            return false;
        }

        // Adjacent kings in Atomic suspend check evasion rules
        if self.variant == Variant::Atomic {
            if let Some(them_ksq) = self.king_square(them) {
                let shielded = if pc.is_king() {
                    to
                } else {
                    match self.king_square(us) {
                        Some(ksq) => ksq,
                        None => return true,
                    }
                };
                if king_attacks(them_ksq).intersects(shielded) {
                    return true;
                }
            }
        }

        if self.checkers().is_nonempty() {
            if !pc.is_king() {
                // Double check requires a king move
                if self.checkers().more_than_one() {
                    return false;
                }
                // Otherwise the move must block or capture the sole checker
                let Some(ksq) = self.king_square(us) else {
                    return true;
                };
                let checker = self.checkers().lsb_unchecked();
                if !(ray_between(checker, ksq) | self.checkers()).intersects(to) {
                    return false;
                }
            } else if (self.attackers_to(to, self.occupied() ^ from) & self.color(them))
                .is_nonempty()
            {
                // The king must be lifted off the board for this test, or
                // moves like b1a1 with an enemy rook on c1 slip through
                return false;
            }
        }

        true
    }

    /// Tests whether a pseudo-legal move leaves the mover's king safe.
    ///
    /// Castling is accepted as-is: the generator validates the king's path
    /// before emitting it.
    pub fn legal(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let them = !us;
        let from = mv.from();
        let to = mv.to();

        // No royalty, no legality concerns
        if self.variant == Variant::Antichess {
            return true;
        }

        // A kingless side (the Horde) has nothing to defend
        let Some(ksq) = self.king_square(us) else {
            return true;
        };

        // Giving check is forbidden in Racing Kings
        if self.variant == Variant::RacingKings && self.gives_check(mv) {
            return false;
        }

        let Some(pc) = self.piece_at(from) else {
            return false;
        };

        if self.variant == Variant::Atomic {
            let capture = self.is_capture(mv);
            if capture && (king_attacks(to).intersects(ksq) || pc.is_king()) {
                return false;
            }
            if let Some(them_ksq) = self.king_square(them) {
                if !pc.is_king() {
                    // While the kings touch, we cannot be in check at all
                    if king_attacks(them_ksq).intersects(ksq) {
                        return true;
                    }
                    if capture {
                        let capsq = if mv.is_en_passant() {
                            Square::new(to.file(), from.rank())
                        } else {
                            to
                        };
                        let blast =
                            king_attacks(to) & (self.occupied() ^ self.kind(PieceKind::Pawn));
                        // Blasting the enemy king ends the game on the spot
                        if blast.intersects(them_ksq) {
                            return true;
                        }
                        let after = self.occupied() ^ (blast | capsq.bitboard() | from.bitboard());
                        if (self.checkers() & after).is_nonempty() {
                            return false;
                        }
                        if (rook_attacks(ksq, after) & self.orthogonal_sliders(them) & after)
                            .is_nonempty()
                            || (bishop_attacks(ksq, after) & self.diagonal_sliders(them) & after)
                                .is_nonempty()
                        {
                            return false;
                        }
                        return true;
                    }
                } else if king_attacks(them_ksq).intersects(to) {
                    // Moving our king beside theirs is always safe
                    return true;
                }
            }
        }

        // En passant is simulated exactly: both pawns leave their squares,
        // then we look for sliders (or anything else) hitting the king
        if mv.is_en_passant() {
            let capsq = to.backward_by(us, 1).unwrap();
            let occupied = (self.occupied() ^ from ^ capsq) | to;
            return (self.attackers_to(ksq, occupied) & self.color(them) & occupied).is_empty();
        }

        if pc.is_king() {
            if mv.is_castling() {
                return true;
            }
            // The moving king must be lifted so his shadow does not block the ray
            return (self.attackers_to(to, self.occupied() ^ from) & self.color(them)).is_empty();
        }

        // Any other move is legal iff the piece is not shielding the king, or
        // stays on the ray through it
        !self.blockers_for_king(us).intersects(from) || aligned(from, to, ksq)
    }

    /// Tests whether a pseudo-legal move gives check to the opponent.
    pub fn gives_check(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let them = !us;
        let from = mv.from();
        let to = mv.to();

        if !self.variant.has_checks() {
            return false;
        }
        let Some(them_ksq) = self.king_square(them) else {
            return false;
        };

        if self.variant == Variant::Atomic {
            let Some(pc) = self.piece_at(from) else {
                return false;
            };
            if pc.is_king() {
                // Moving beside the enemy king can never check; leaving his
                // side may reveal checks that adjacency was suspending
                if king_attacks(them_ksq).intersects(to) {
                    return false;
                }
                if king_attacks(them_ksq).intersects(from) {
                    if (self.attackers_to(them_ksq, self.occupied())
                        & (self.knights(us) | self.pawns(us)))
                    .is_nonempty()
                    {
                        return true;
                    }
                    let occupied = (self.occupied() ^ from) | to;
                    return (rook_attacks(them_ksq, occupied) & self.orthogonal_sliders(us))
                        .is_nonempty()
                        || (bishop_attacks(them_ksq, occupied) & self.diagonal_sliders(us))
                            .is_nonempty();
                }
            } else if self
                .king_square(us)
                .is_some_and(|ksq| king_attacks(them_ksq).intersects(ksq))
            {
                // Touching kings suspend check
                return false;
            }

            if self.is_capture(mv) {
                let capsq = if mv.is_en_passant() {
                    Square::new(to.file(), from.rank())
                } else {
                    to
                };
                let blast = king_attacks(to) & (self.occupied() ^ self.kind(PieceKind::Pawn));
                // Blasting the king is a win, not a check
                if blast.intersects(them_ksq) {
                    return false;
                }
                let after = self.occupied() ^ (blast | capsq.bitboard() | from.bitboard());
                return (rook_attacks(them_ksq, after) & self.orthogonal_sliders(us) & after)
                    .is_nonempty()
                    || (bishop_attacks(them_ksq, after) & self.diagonal_sliders(us) & after)
                        .is_nonempty();
            }
        }

        let pc = match self.piece_at(from) {
            Some(pc) => pc,
            None => return false,
        };

        // Direct check?
        if self.check_squares(pc.kind()).intersects(to) {
            return true;
        }

        // Discovered check?
        if self.blockers_for_king(them).intersects(from) && !aligned(from, to, them_ksq) {
            return true;
        }

        match mv.kind() {
            MoveKind::Normal => false,

            MoveKind::Promotion => {
                let promoted = Piece::new(us, mv.promotion_unchecked());
                attacks_for(promoted, to, self.occupied() ^ from).intersects(them_ksq)
            }

            // Direct and ordinary discovered checks were handled above; what
            // remains is a discovery through the captured pawn
            MoveKind::EnPassant => {
                let capsq = Square::new(to.file(), from.rank());
                let occupied = (self.occupied() ^ from ^ capsq) | to;
                (rook_attacks(them_ksq, occupied) & self.orthogonal_sliders(us)).is_nonempty()
                    || (bishop_attacks(them_ksq, occupied) & self.diagonal_sliders(us))
                        .is_nonempty()
            }

            MoveKind::Castling => {
                let kfrom = from;
                let rfrom = to;
                let kto = mv.king_castling_target();
                let rto = mv.rook_castling_target();

                rook_rays(rto).intersects(them_ksq)
                    && (rook_attacks(rto, (self.occupied() ^ kfrom ^ rfrom) | rto | kto))
                        .intersects(them_ksq)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Making and unmaking moves

    /// Converts `mv_str` from UCI notation and applies it, checking its
    /// pseudo-legality and legality first.
    pub fn make_move_uci(&mut self, mv_str: &str) -> Result<()> {
        let mv = Move::from_uci(self, mv_str)?;
        if !(self.pseudo_legal(mv) && self.legal(mv)) {
            bail!("Move {mv_str:?} is not legal on {:?}", self.fen());
        }
        self.make_move(mv);
        Ok(())
    }

    /// Applies the move, computing its check status itself.
    ///
    /// Prefer [`Position::do_move`] when the caller (a search) has already
    /// called [`Position::gives_check`] for move classification.
    #[inline(always)]
    pub fn make_move(&mut self, mv: Move) {
        let gives_check = self.gives_check(mv);
        self.do_move(mv, gives_check);
    }

    /// Makes a move, pushing a new [`StateInfo`]. The move must be legal;
    /// `gives_check` must be the value of [`Position::gives_check`] for it.
    ///
    /// A subsequent [`Position::undo_move`] restores the exact prior state,
    /// hash keys included, without recomputation.
    pub fn do_move(&mut self, mv: Move, gives_check: bool) {
        let mut gives_check = gives_check;
        self.nodes += 1;

        let us = self.side_to_move;
        let them = !us;
        let from = mv.from();
        let mut to = mv.to();
        let pc = self.piece_at(from).unwrap();
        let atomic = self.variant == Variant::Atomic;

        // Copy the old state; everything derived is overwritten below
        let mut st = *self.st();
        st.captured_piece = None;
        st.blast = [None; Square::COUNT];

        let mut key = st.key;
        key.hash_side();

        self.game_ply += 1;
        st.rule50 += 1;
        st.plies_from_null += 1;

        let mut captured = if mv.is_en_passant() {
            Some(Piece::new(them, PieceKind::Pawn))
        } else {
            self.piece_at(to)
        };

        if mv.is_castling() {
            debug_assert!(pc.is_king());
            debug_assert_eq!(captured, Some(Piece::new(us, PieceKind::Rook)));

            let rook = Piece::new(us, PieceKind::Rook);
            let rfrom = to;
            let rto = mv.rook_castling_target();
            let kto = mv.king_castling_target();

            // Remove both pieces first: the squares can overlap in Chess960
            self.remove_piece(pc, from);
            self.remove_piece(rook, rfrom);
            self.put_piece(pc, kto);
            self.put_piece(rook, rto);

            st.psq += psqt(rook, rto) - psqt(rook, rfrom);
            key.hash_piece(rfrom, rook);
            key.hash_piece(rto, rook);

            captured = None;
            to = kto;
        }

        if let Some(captured_pc) = captured {
            let mut capsq = to;

            if captured_pc.is_pawn() {
                if mv.is_en_passant() {
                    capsq = to.backward_by(us, 1).unwrap();
                    debug_assert!(pc.is_pawn());
                    debug_assert!(!self.has(to));
                }
                st.pawn_key.hash_piece(capsq, captured_pc);
            } else {
                st.non_pawn_material[them.index()] -= captured_pc.kind().value();
            }

            self.remove_piece(captured_pc, capsq);
            key.hash_piece(capsq, captured_pc);
            // Hashing the *post-removal count* makes this key a pure function
            // of the piece counts
            st.material_key
                .hash(ZobristKey::piece_key(self.count(captured_pc) as usize, captured_pc));

            if atomic {
                // The blast takes every non-pawn neighbor of the target
                for bsq in king_attacks(to) {
                    if bsq == from {
                        continue;
                    }
                    let Some(bpc) = self.piece_at(bsq) else {
                        continue;
                    };
                    st.blast[bsq.index()] = Some(bpc);
                    if bpc.is_pawn() {
                        continue;
                    }

                    st.non_pawn_material[bpc.color().index()] -= bpc.kind().value();
                    self.remove_piece(bpc, bsq);
                    key.hash_piece(bsq, bpc);
                    st.material_key
                        .hash(ZobristKey::piece_key(self.count(bpc) as usize, bpc));
                    st.psq -= psqt(bpc, bsq);

                    let cr = self.castling_rights_mask[bsq.index()];
                    if !st.castling_rights.is_empty() && !cr.is_empty() {
                        key.hash_castling(st.castling_rights & cr);
                        st.castling_rights = st.castling_rights & !cr;
                    }
                }
            }

            st.psq -= psqt(captured_pc, capsq);
            st.rule50 = 0;
        }

        // Update the key for the moving piece; in an Atomic capture it simply
        // disappears instead of arriving anywhere
        if atomic && captured.is_some() {
            key.hash_piece(from, pc);
        } else {
            key.hash_piece(from, pc);
            key.hash_piece(to, pc);
        }

        // Reset en passant
        if let Some(ep) = st.ep_square.take() {
            key.hash_ep_file(ep.file());
        }

        // Update castling rights touched by either endpoint
        let cr = self.castling_rights_mask[from.index()] | self.castling_rights_mask[to.index()];
        if !st.castling_rights.is_empty() && !cr.is_empty() {
            key.hash_castling(st.castling_rights & cr);
            st.castling_rights = st.castling_rights & !cr;
        }

        if self.variant == Variant::ThreeCheck && gives_check {
            st.checks_given[us.index()] += 1;
            key.hash_check_given(us, st.checks_given[us.index()]);
        }

        if atomic && captured.is_some() {
            // The capturing piece detonates with its victim
            st.blast[from.index()] = Some(pc);
            self.remove_piece(pc, from);
            st.material_key
                .hash(ZobristKey::piece_key(self.count(pc) as usize, pc));
            if !pc.is_pawn() {
                st.non_pawn_material[us.index()] -= pc.kind().value();
            }
        } else if !mv.is_castling() {
            self.move_piece(pc, from, to);
        }

        if pc.is_pawn() {
            let double_push = from.index() ^ to.index() == 16;
            // A double push from the Horde's first rank never yields en passant
            let horde_first_rank =
                self.variant == Variant::Horde && from.rank() == Rank::first(us);

            if double_push && !horde_first_rank && !(atomic && captured.is_some()) {
                // Record en passant only if an enemy pawn is placed to use it
                let ep = from.forward_by(us, 1).unwrap();
                if (pawn_attacks(ep, us) & self.pawns(them)).is_nonempty() {
                    st.ep_square = Some(ep);
                    key.hash_ep_file(ep.file());
                }
            } else if mv.is_promotion() && !(atomic && captured.is_some()) {
                let promotion = pc.promoted(mv.promotion_unchecked());
                debug_assert_eq!(to.rank(), Rank::eighth(us));

                self.remove_piece(pc, to);
                self.put_piece(promotion, to);

                key.hash_piece(to, pc);
                key.hash_piece(to, promotion);
                st.pawn_key.hash_piece(to, pc);
                st.material_key.hash(ZobristKey::piece_key(
                    self.count(promotion) as usize - 1,
                    promotion,
                ));
                st.material_key
                    .hash(ZobristKey::piece_key(self.count(pc) as usize, pc));

                st.psq += psqt(promotion, to) - psqt(pc, to);
                st.non_pawn_material[us.index()] += promotion.kind().value();
            }

            if atomic && captured.is_some() {
                st.pawn_key.hash_piece(from, pc);
            } else {
                st.pawn_key.hash_piece(from, pc);
                st.pawn_key.hash_piece(to, pc);
            }

            st.rule50 = 0;
        }

        if atomic && captured.is_some() {
            st.psq -= psqt(pc, from);
        } else {
            st.psq += psqt(pc, to) - psqt(pc, from);
        }

        st.captured_piece = captured;
        st.key = key;

        // Blasting the enemy king away cannot leave him in check
        if atomic && captured.is_some() && self.king_square(them).is_none() {
            gives_check = false;
        }

        st.checkers = match self.variant {
            Variant::Antichess => Bitboard::EMPTY_BOARD,
            // The finish flag: the mover's king standing on rank 8, unless
            // the opponent's already finished too
            Variant::RacingKings => {
                if (self.king(them) & Bitboard::RANK_8).is_nonempty() {
                    Bitboard::EMPTY_BOARD
                } else {
                    Bitboard::RANK_8 & self.king(us)
                }
            }
            _ => {
                if gives_check {
                    match self.king_square(them) {
                        Some(ksq) => self.attackers_to(ksq, self.occupied()) & self.color(us),
                        None => Bitboard::EMPTY_BOARD,
                    }
                } else {
                    Bitboard::EMPTY_BOARD
                }
            }
        };

        self.side_to_move = them;
        self.states.push(st);
        self.set_check_info();

        debug_assert!(self.pos_is_ok());
    }

    /// Unmakes a move, restoring the prior state exactly.
    ///
    /// Only piece placement and counts are recomputed; keys, scores, and
    /// counters come back by popping the state stack.
    pub fn undo_move(&mut self, mv: Move) {
        self.side_to_move = !self.side_to_move;

        let us = self.side_to_move;
        let from = mv.from();
        let to = mv.to();
        let st = *self.st();
        let atomic_capture = self.variant == Variant::Atomic && st.captured_piece.is_some();

        let mut pc = if atomic_capture {
            st.blast[from.index()].unwrap()
        } else if mv.is_castling() {
            Piece::new(us, PieceKind::King)
        } else {
            self.piece_at(to).unwrap()
        };

        if mv.is_promotion() && !atomic_capture {
            debug_assert_eq!(to.rank(), Rank::eighth(us));
            debug_assert_eq!(pc.kind(), mv.promotion_unchecked());

            self.remove_piece(pc, to);
            pc = Piece::new(us, PieceKind::Pawn);
            self.put_piece(pc, to);
        }

        if mv.is_castling() {
            let rook = Piece::new(us, PieceKind::Rook);
            let rfrom = to;
            let rto = mv.rook_castling_target();
            let kto = mv.king_castling_target();

            self.remove_piece(pc, kto);
            self.remove_piece(rook, rto);
            self.put_piece(pc, from);
            self.put_piece(rook, rfrom);
        } else {
            if atomic_capture {
                self.put_piece(pc, from);
            } else {
                self.move_piece(pc, to, from);
            }

            if let Some(captured) = st.captured_piece {
                let mut capsq = to;
                if mv.is_en_passant() {
                    capsq = to.backward_by(us, 1).unwrap();
                    debug_assert!(pc.is_pawn());
                    debug_assert!(!self.has(capsq));
                }

                if atomic_capture {
                    // Resurrect the blast victims before the direct one
                    for bsq in king_attacks(to) {
                        if bsq == from {
                            continue;
                        }
                        if let Some(bpc) = st.blast[bsq.index()] {
                            if !bpc.is_pawn() {
                                self.put_piece(bpc, bsq);
                            }
                        }
                    }
                }

                self.put_piece(captured, capsq);
            }
        }

        self.states.pop();
        self.game_ply -= 1;

        debug_assert!(self.pos_is_ok());
    }

    /// Flips the side to move without moving a piece. Requires not being in check.
    ///
    /// Used by null-move pruning; `plies_from_null` restarts at zero so draw
    /// detection never walks across the discontinuity.
    pub fn do_null_move(&mut self) {
        debug_assert!(self.checkers().is_empty());

        let mut st = *self.st();
        st.captured_piece = None;

        if let Some(ep) = st.ep_square.take() {
            st.key.hash_ep_file(ep.file());
        }
        st.key.hash_side();
        st.rule50 += 1;
        st.plies_from_null = 0;

        self.side_to_move = !self.side_to_move;
        self.states.push(st);
        self.set_check_info();

        debug_assert!(self.pos_is_ok());
    }

    /// Undoes a null move.
    pub fn undo_null_move(&mut self) {
        debug_assert!(self.checkers().is_empty());

        self.states.pop();
        self.side_to_move = !self.side_to_move;
    }

    /// The hash key this position would have after `mv`, for speculative
    /// transposition-table prefetching.
    ///
    /// Exact for Normal moves only; castling, en passant, and promotions are
    /// not worth special-casing for a prefetch hint.
    pub fn key_after(&self, mv: Move) -> ZobristKey {
        let from = mv.from();
        let to = mv.to();
        let pc = self.piece_at(from).unwrap();

        let mut key = self.key();
        key.hash_side();

        if let Some(captured) = self.piece_at(to) {
            key.hash_piece(to, captured);
            if self.variant == Variant::Atomic {
                let blast =
                    king_attacks(to) & (self.occupied() ^ self.kind(PieceKind::Pawn)) & !from.bitboard();
                for bsq in blast {
                    if let Some(bpc) = self.piece_at(bsq) {
                        key.hash_piece(bsq, bpc);
                    }
                }
            }
        }

        key.hash_piece(from, pc);
        key.hash_piece(to, pc);
        key
    }

    // -------------------------------------------------------------------------
    // Static exchange evaluation

    /// An early-exit wrapper around [`Position::see`]: when the moving piece
    /// is worth no more than the captured one, the exchange cannot lose
    /// material and [`SEE_KNOWN_WIN`] is returned without simulation.
    pub fn see_sign(&self, mv: Move) -> i32 {
        if self.variant == Variant::ThreeCheck && self.gives_check(mv) {
            return SEE_KNOWN_WIN;
        }

        let moved = self.piece_at(mv.from()).map(|p| p.kind().value()).unwrap_or(0);
        let captured = self.piece_at(mv.to()).map(|p| p.kind().value()).unwrap_or(0);
        if moved <= captured {
            return SEE_KNOWN_WIN;
        }

        self.see(mv)
    }

    /// Static exchange evaluation: the material outcome of the capture
    /// sequence on `mv.to()` with both sides always recapturing with their
    /// least valuable attacker, and x-ray attackers joining as pieces vacate
    /// their lines.
    pub fn see(&self, mv: Move) -> i32 {
        let from = mv.from();
        let to = mv.to();

        // Horde can stack more exchanges on one square than standard chess
        let mut swap = [0i32; Square::COUNT];
        let mut sl = 1usize;

        let mut stm = match self.piece_at(from) {
            Some(pc) => pc.color(),
            None => return 0,
        };

        swap[0] = self.piece_at(to).map(|p| p.kind().value()).unwrap_or(0);
        let mut occupied = self.occupied() ^ from;

        if self.variant == Variant::Atomic {
            return self.see_atomic(mv, stm);
        }

        // King-takes-rook cannot be simulated as an exchange; zero is correct
        // unless the rook somehow ends up hanging
        if mv.is_castling() {
            return 0;
        }

        if mv.is_en_passant() {
            occupied ^= to.backward_by(stm, 1).unwrap();
            swap[0] = PieceKind::Pawn.value();
        }

        // All attackers of the target square, with the mover gone and any
        // x-ray attacker behind it revealed
        let mut attackers = self.attackers_to(to, occupied) & occupied;

        stm = !stm;
        let mut stm_attackers = attackers & self.color(stm);
        if stm_attackers.is_empty() {
            return swap[0];
        }

        let mut captured = self.piece_at(from).unwrap().kind();

        loop {
            debug_assert!(sl < Square::COUNT);
            swap[sl] = -swap[sl - 1] + captured.value();

            captured = self.min_attacker(to, stm_attackers, &mut occupied, &mut attackers);
            stm = !stm;
            stm_attackers = attackers & self.color(stm);
            sl += 1;

            if stm_attackers.is_empty() {
                break;
            }
            // A king cannot recapture into a defended square; drop that entry
            if captured == PieceKind::King {
                sl -= 1;
                break;
            }
        }

        // Negamax the swap list backward for the best achievable outcome
        while sl > 1 {
            sl -= 1;
            swap[sl - 1] = swap[sl - 1].min(-swap[sl]);
        }

        swap[0]
    }

    /// Atomic exchange evaluation is not a sequence at all: one detonation
    /// settles everything. Sum the blast, minus what we lose, plus the victim.
    fn see_atomic(&self, mv: Move, stm: Color) -> i32 {
        let from = mv.from();
        let to = mv.to();

        let blast =
            king_attacks(to) & (self.occupied() ^ self.kind(PieceKind::Pawn)) & !from.bitboard();
        if (blast & self.king(!stm)).is_nonempty() {
            return SEE_MATE;
        }

        let mut blast_eval = 0;
        for color in Color::all() {
            for kind in [
                PieceKind::Knight,
                PieceKind::Bishop,
                PieceKind::Rook,
                PieceKind::Queen,
            ] {
                let value =
                    (blast & self.piece_parts(color, kind)).population() as i32 * kind.value();
                if color == stm {
                    blast_eval -= value;
                } else {
                    blast_eval += value;
                }
            }
        }

        let captured = self.piece_at(to).map(|p| p.kind().value()).unwrap_or(0);
        let moved = self.piece_at(from).map(|p| p.kind().value()).unwrap_or(0);
        blast_eval + captured - moved
    }

    /// Finds the least valuable piece in `stm_attackers`, removes it from the
    /// occupancy, and reveals any x-ray attacker standing behind it on the
    /// same line toward `to`.
    fn min_attacker(
        &self,
        to: Square,
        stm_attackers: Bitboard,
        occupied: &mut Bitboard,
        attackers: &mut Bitboard,
    ) -> PieceKind {
        for kind in PieceKind::all() {
            let b = stm_attackers & self.kind(kind);
            if b.is_empty() {
                continue;
            }

            // The king is always the last cycle; nothing behind him matters
            if kind == PieceKind::King {
                return kind;
            }

            *occupied ^= Bitboard::new(b.inner() & b.inner().wrapping_neg());

            if matches!(kind, PieceKind::Pawn | PieceKind::Bishop | PieceKind::Queen) {
                *attackers |= bishop_attacks(to, *occupied)
                    & (self.kind(PieceKind::Bishop) | self.kind(PieceKind::Queen));
            }
            if matches!(kind, PieceKind::Rook | PieceKind::Queen) {
                *attackers |= rook_attacks(to, *occupied)
                    & (self.kind(PieceKind::Rook) | self.kind(PieceKind::Queen));
            }

            // The x-ray scan may re-add pieces already consumed
            *attackers &= *occupied;
            return kind;
        }

        PieceKind::King
    }

    // -------------------------------------------------------------------------
    // Draw detection

    /// Tests for a draw by the fifty-move rule or by repetition.
    ///
    /// `root_ply` is the game ply at the search root: a position repeated
    /// once since the root already scores as a draw, while repetitions
    /// reaching back into the game history need a second occurrence. Does
    /// not detect stalemate.
    pub fn is_draw(&self, root_ply: i32) -> bool {
        let st = self.st();

        // A mate delivered on the hundredth halfmove still mates
        if st.rule50 > 99 && (self.checkers().is_empty() || !self.legal_moves().is_empty()) {
            return true;
        }

        let window = st.rule50.min(st.plies_from_null);
        let top = self.states.len() - 1;
        let mut rep = 1;

        // Only positions with the same side to move can repeat
        let mut i = 2;
        while i <= window as usize && i <= top {
            let stp = &self.states[top - i];
            if stp.key == st.key {
                rep += 1;
                let in_game_tree = self.game_ply - (i as i32) < root_ply;
                if rep >= 2 + in_game_tree as i32 {
                    return true;
                }
            }
            i += 2;
        }

        false
    }

    // -------------------------------------------------------------------------
    // Consistency

    /// Quick consistency checks, cheap enough for a `debug_assert!` after
    /// every move. [`Position::pos_is_ok_full`] is the exhaustive oracle.
    pub fn pos_is_ok(&self) -> bool {
        // King counts, with the variant exemptions
        let wk = self.count(Piece::WHITE_KING);
        let bk = self.count(Piece::BLACK_KING);
        let kings_ok = match self.variant {
            Variant::Horde => wk == 0 && bk == 1,
            Variant::Antichess | Variant::Atomic => wk <= 1 && bk <= 1,
            _ => wk == 1 && bk == 1,
        };
        if !kings_ok {
            return false;
        }

        // An en passant square sits on the capturing side's sixth rank, or
        // the seventh for captures of a Horde first-rank double push
        if let Some(ep) = self.ep_square() {
            let rel = ep.rank().relative_to(self.side_to_move).index();
            let ok = rel == Rank::SIX.index()
                || (self.variant == Variant::Horde && rel == Rank::SEVEN.index());
            if !ok {
                return false;
            }
        }

        if self.color(Color::White).intersects(self.color(Color::Black)) {
            return false;
        }

        true
    }

    /// The exhaustive oracle for internal consistency: recomputes every
    /// derived structure from scratch and compares.
    pub fn pos_is_ok_full(&self) -> bool {
        if !self.pos_is_ok() {
            return false;
        }

        // Bitboards and mailbox must agree
        if self.color(Color::White).intersects(self.color(Color::Black)) {
            return false;
        }
        let mut union = Bitboard::EMPTY_BOARD;
        for kind in PieceKind::all() {
            for other in PieceKind::all() {
                if kind != other && self.kind(kind).intersects(self.kind(other)) {
                    return false;
                }
            }
            union |= self.kind(kind);
        }
        if union != self.occupied() {
            return false;
        }
        for square in Square::iter() {
            match self.piece_at(square) {
                Some(piece) => {
                    if !self.piece_parts(piece.color(), piece.kind()).intersects(square) {
                        return false;
                    }
                }
                None => {
                    if self.occupied().intersects(square) {
                        return false;
                    }
                }
            }
        }

        // Counts must match the bitboards
        for piece in Piece::all() {
            if self.count(piece) != self.piece_parts(piece.color(), piece.kind()).population() {
                return false;
            }
        }

        // Castling structures must agree with the board
        for color in Color::all() {
            for short in [true, false] {
                let right = CastlingRights::right(color, short);
                if !self.castling_rights().contains(right) {
                    continue;
                }
                let Some(rsq) = self.castling_rook_squares[right.index()] else {
                    return false;
                };
                if self.piece_at(rsq) != Some(Piece::new(color, PieceKind::Rook)) {
                    return false;
                }
                if !self.castling_rights_mask[rsq.index()].contains(right) {
                    return false;
                }
                let Some(ksq) = self.king_square(color) else {
                    return false;
                };
                if !self.castling_rights_mask[ksq.index()].contains(right) {
                    return false;
                }
            }
        }

        // The incremental state must match a from-scratch recomputation
        self.computed_state() == *self.st()
    }
}

impl PartialEq for Position {
    /// Two positions are equal when every observable component matches; the
    /// node counter is bookkeeping, not position state.
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board
            && self.by_type == other.by_type
            && self.by_color == other.by_color
            && self.piece_count == other.piece_count
            && self.castling_rights_mask == other.castling_rights_mask
            && self.castling_rook_squares == other.castling_rook_squares
            && self.castling_paths == other.castling_paths
            && self.side_to_move == other.side_to_move
            && self.game_ply == other.game_ply
            && self.variant == other.variant
            && self.states == other.states
    }
}

impl Eq for Position {}

impl FromStr for Position {
    type Err = anyhow::Error;

    /// Parses a FEN under standard rules.
    #[inline(always)]
    fn from_str(s: &str) -> Result<Self> {
        Self::from_fen(s, Variant::Standard)
    }
}

impl Default for Position {
    /// The standard starting position.
    #[inline(always)]
    fn default() -> Self {
        Self::from_fen(FEN_STARTPOS, Variant::Standard).unwrap()
    }
}

impl fmt::Display for Position {
    /// Display this position's FEN string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fen())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in Rank::iter().rev() {
            write!(f, "{rank}|")?;
            for file in File::iter() {
                let piece = self.piece_at(Square::new(file, rank));
                let piece_char = piece.map(|p| p.char()).unwrap_or('.');
                write!(f, " {piece_char}")?;
            }

            if rank == Rank::SEVEN {
                write!(f, "           FEN: {}", self.fen())?;
            } else if rank == Rank::SIX {
                write!(f, "           Key: {}", self.key())?;
            } else if rank == Rank::FIVE {
                let checkers = self
                    .checkers()
                    .into_iter()
                    .map(Square::to_uci)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "      Checkers: {checkers}")?;
            } else if rank == Rank::FOUR {
                write!(f, "       Variant: {}", self.variant())?;
            }
            writeln!(f)?;
        }
        write!(f, " +")?;
        for _ in File::iter() {
            write!(f, "--")?;
        }
        write!(f, "\n   ")?;
        for file in File::iter() {
            write!(f, "{file} ")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn startpos() -> Position {
        Position::default()
    }

    #[test]
    fn test_fen_round_trip() {
        for fen in [
            FEN_STARTPOS,
            FEN_KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 3 17",
        ] {
            let pos: Position = fen.parse().unwrap();
            assert_eq!(pos.fen(), fen);
        }
    }

    #[test]
    fn test_key_changes_with_side_to_move() {
        let pos: Position = "r3k2r/pppp1ppp/8/4p3/8/8/PPPPPPPP/R3K2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let pos_black: Position = "r3k2r/pppp1ppp/8/4p3/8/8/PPPPPPPP/R3K2R b KQkq - 0 1"
            .parse()
            .unwrap();
        assert_ne!(pos.key(), pos_black.key());
    }

    #[test]
    fn test_key_changes_with_castling_rights() {
        let pos: Position = "r3k2r/pppp1ppp/8/4p3/8/8/PPPPPPPP/R3K2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let pos_no_k: Position = "r3k2r/pppp1ppp/8/4p3/8/8/PPPPPPPP/R3K2R w KQq - 0 1"
            .parse()
            .unwrap();
        assert_ne!(pos.key(), pos_no_k.key());
    }

    #[test]
    fn test_variant_seeds_key() {
        let standard: Position = FEN_STARTPOS.parse().unwrap();
        let atomic = Position::from_fen(FEN_STARTPOS, Variant::Atomic).unwrap();
        assert_ne!(standard.key(), atomic.key());
    }

    #[test]
    fn test_unusable_ep_square_is_cleared() {
        // No black pawn can reach e3, so the claim is dropped and the keys agree
        let claimed: Position = "4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1".parse().unwrap();
        let plain: Position = "4k3/8/8/8/4P3/8/8/4K3 b - - 0 1".parse().unwrap();
        assert_eq!(claimed.ep_square(), None);
        assert_eq!(claimed.key(), plain.key());

        // Here d4xe3 is a real option, so the square stays
        let usable: Position = "4k3/8/8/8/3pP3/8/8/4K3 b - e3 0 1".parse().unwrap();
        assert_eq!(usable.ep_square(), Some(Square::E3));
    }

    #[test]
    fn test_make_undo_restores_position() {
        let original = startpos();
        let mut pos = original.clone();

        let mut made = Vec::new();
        for mv_str in ["e2e4", "e7e5", "g1f3", "b8c6"] {
            let mv = Move::from_uci(&pos, mv_str).unwrap();
            pos.make_move(mv);
            made.push(mv);
            assert!(pos.pos_is_ok_full());
        }

        for mv in made.into_iter().rev() {
            pos.undo_move(mv);
        }
        assert_eq!(pos, original);
        assert_eq!(pos.key(), original.key());
    }

    #[test]
    fn test_castling_rights_lost_by_king_move() {
        let mut pos: Position = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        pos.make_move_uci("e1d1").unwrap();
        assert_eq!(pos.castling_rights().to_string(), "kq");
        pos.make_move_uci("e8f8").unwrap();
        assert_eq!(pos.castling_rights().to_string(), "-");
    }

    #[test]
    fn test_castling_rights_lost_by_rook_capture() {
        let mut pos: Position = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        pos.make_move_uci("a1a8").unwrap();
        assert_eq!(pos.castling_rights().to_string(), "Kk");
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_castling_move_execution() {
        let mut pos: Position = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        // e1g1 resolves to the internal king-takes-rook form
        let mv = Move::from_uci(&pos, "e1g1").unwrap();
        assert!(mv.is_castling());
        assert_eq!(mv.to(), Square::H1);

        pos.make_move(mv);
        assert_eq!(pos.piece_at(Square::G1), Some(Piece::WHITE_KING));
        assert_eq!(pos.piece_at(Square::F1), Some(Piece::WHITE_ROOK));
        assert_eq!(pos.castling_rights().to_string(), "kq");

        pos.undo_move(mv);
        assert_eq!(pos.piece_at(Square::E1), Some(Piece::WHITE_KING));
        assert_eq!(pos.piece_at(Square::H1), Some(Piece::WHITE_ROOK));
        assert!(pos.pos_is_ok_full());
    }

    #[test]
    fn test_null_move() {
        let mut pos = startpos();
        let original = pos.clone();

        pos.do_null_move();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_ne!(pos.key(), original.key());

        pos.undo_null_move();
        assert_eq!(pos, original);
    }

    #[test]
    fn test_material_key_is_permutation_invariant() {
        let a: Position = "4k3/8/8/3N4/8/8/8/4K3 w - - 0 1".parse().unwrap();
        let b: Position = "4k3/8/8/8/8/8/N7/4K3 w - - 0 1".parse().unwrap();
        assert_eq!(a.material_key(), b.material_key());
        assert_ne!(a.key(), b.key());

        let c: Position = "4k3/8/8/3B4/8/8/8/4K3 w - - 0 1".parse().unwrap();
        assert_ne!(a.material_key(), c.material_key());
    }

    #[test]
    fn test_see_simple_exchanges() {
        // Rook takes a defended pawn: loses rook for pawn
        let pos: Position = "4k3/4p3/3p4/8/8/8/3R4/4K3 w - - 0 1".parse().unwrap();
        let mv = Move::from_uci(&pos, "d2d6").unwrap();
        assert_eq!(
            pos.see(mv),
            PieceKind::Pawn.value() - PieceKind::Rook.value()
        );

        // Pawn takes an undefended knight: clean win
        let pos: Position = "4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1".parse().unwrap();
        let mv = Move::from_uci(&pos, "e4d5").unwrap();
        assert_eq!(pos.see(mv), PieceKind::Knight.value());
    }

    #[test]
    fn test_see_xray() {
        // RxP, pxR, Rxp: the doubled rook is revealed behind the first and
        // recaptures, netting two pawns for a rook
        let pos: Position = "4k3/2p5/3p4/8/8/8/3R4/3RK3 w - - 0 1".parse().unwrap();
        let mv = Move::from_uci(&pos, "d2d6").unwrap();
        assert_eq!(
            pos.see(mv),
            2 * PieceKind::Pawn.value() - PieceKind::Rook.value()
        );
    }

    #[test]
    fn test_key_after_predicts_normal_moves() {
        let pos = startpos();
        for mv_str in ["e2e4", "g1f3", "b1c3"] {
            let mv = Move::from_uci(&pos, mv_str).unwrap();
            let predicted = pos.key_after(mv);
            let mut walked = pos.clone();
            walked.make_move(mv);
            assert_eq!(predicted, walked.key(), "key_after({mv}) wrong");
        }

        // Captures are included in the prediction
        let pos: Position = "4k3/8/8/3p4/4N3/8/8/4K3 w - - 0 1".parse().unwrap();
        let mv = Move::from_uci(&pos, "e4d5").unwrap();
        let predicted = pos.key_after(mv);
        let mut walked = pos.clone();
        walked.make_move(mv);
        assert_eq!(predicted, walked.key());
    }

    #[test]
    fn test_see_sign_early_exit() {
        // Pawn takes knight: winning by inspection, no simulation needed
        let pos: Position = "4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1".parse().unwrap();
        let mv = Move::from_uci(&pos, "e4d5").unwrap();
        assert_eq!(pos.see_sign(mv), SEE_KNOWN_WIN);

        // Rook takes defended pawn: falls through to the full evaluation
        let pos: Position = "4k3/4p3/3p4/8/8/8/3R4/4K3 w - - 0 1".parse().unwrap();
        let mv = Move::from_uci(&pos, "d2d6").unwrap();
        assert_eq!(pos.see_sign(mv), pos.see(mv));
    }

    #[test]
    fn test_nodes_and_captured_piece_bookkeeping() {
        let mut pos: Position = "4k3/8/8/3p4/4N3/8/8/4K3 w - - 0 1".parse().unwrap();
        assert_eq!(pos.nodes(), 0);
        assert_eq!(pos.captured_piece(), None);

        pos.make_move_uci("e4d5").unwrap();
        assert_eq!(pos.nodes(), 1);
        assert_eq!(pos.captured_piece(), Some(Piece::BLACK_PAWN));
        assert_eq!(pos.rule50(), 0);
        assert_eq!(pos.plies_from_null(), 1);
    }

    #[test]
    fn test_psq_score_tracks_material_swings() {
        let mut pos: Position = "4k3/8/8/3p4/4N3/8/8/4K3 w - - 0 1".parse().unwrap();
        let before = pos.psq_score();
        pos.make_move_uci("e4d5").unwrap();
        // White captured a pawn; the White-positive accumulator rises
        assert!(pos.psq_score().mg > before.mg);
    }

    #[test]
    fn test_fifty_move_draw() {
        let pos: Position = "4k3/8/8/8/8/8/8/4K3 w - - 100 80".parse().unwrap();
        assert!(pos.is_draw(0));

        let pos: Position = "4k3/8/8/8/8/8/8/4K3 w - - 99 80".parse().unwrap();
        assert!(!pos.is_draw(0));
    }

    #[test]
    fn test_repetition_draw() {
        let mut pos = startpos();
        for mv in ["g1f3", "g8f6", "f3g1"] {
            pos.make_move_uci(mv).unwrap();
        }
        assert!(!pos.is_draw(0));

        // First recurrence of the starting position: a draw when it happened
        // inside the search, not yet when it lies in the game history
        pos.make_move_uci("f6g8").unwrap();
        assert!(pos.is_draw(0));
        assert!(!pos.is_draw(pos.game_ply()));

        // Second recurrence: a draw no matter where the root sits
        let root = pos.game_ply();
        for mv in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            pos.make_move_uci(mv).unwrap();
        }
        assert!(pos.is_draw(root));
    }
}
