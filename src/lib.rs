/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! A multi-variant chess position core.
//!
//! This crate is the substrate a chess search drives millions of times per
//! second: the in-memory [`Position`] with its redundant board structures,
//! incremental Zobrist-hashed [`do_move`](Position::do_move) /
//! [`undo_move`](Position::undo_move), the legality predicates, a static
//! exchange evaluator, and repetition/fifty-move draw detection. Standard
//! chess and Chess960 are covered alongside King-of-the-Hill, Three-Check,
//! Horde, Racing Kings, Antichess, and Atomic, all branching off a single
//! unified state.
//!
//! Searching, evaluation, UCI, transposition tables, and time management are
//! deliberately out of scope; the position exposes the keys and counters
//! those collaborators consume.

/// Board representation: squares, bitboards, pieces, moves, and the position.
mod board;

/// Piece-square tables and the packed midgame/endgame score.
mod psqt;

pub use board::*;
pub use psqt::*;
