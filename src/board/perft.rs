/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::Position;

/// Counts the leaf nodes of the legal move tree to the provided depth.
///
/// Drives the position through `do_move`/`undo_move` rather than copying it,
/// which is exactly the access pattern a search uses; a perft mismatch is
/// almost always a make/unmake or movegen bug. Bulk-counts at depth 1.
pub fn perft(position: &mut Position, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = position.legal_moves();

    // No need to make the last layer of moves just to count them
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for mv in moves {
        let gives_check = position.gives_check(mv);
        position.do_move(mv, gives_check);
        nodes += perft(position, depth - 1);
        position.undo_move(mv);
    }

    nodes
}

/// Like [`perft`], but prints the node count under each root move, the way
/// engines report `go perft` for divide-and-conquer debugging.
pub fn perft_split(position: &mut Position, depth: usize) -> u64 {
    let mut nodes = 0;

    for mv in position.legal_moves() {
        let gives_check = position.gives_check(mv);
        position.do_move(mv, gives_check);
        let count = if depth > 1 {
            perft(position, depth - 1)
        } else {
            1
        };
        position.undo_move(mv);

        println!("{mv}: {count}");
        nodes += count;
    }

    println!("\nTotal: {nodes}");
    nodes
}
