//! Fixed-depth alpha-beta over slides, scored by the threat heuristic.
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::board::{Board, Move, Player};
use crate::heuristic::{evaluate, INITIATIVE_SCORE};
use crate::movegen::legal_moves;

const INF: i32 = i32::MAX / 2;

/// Picks uniformly among the root moves tied for the best score. `depth`
/// counts the root move, so depth 1 scores each reply position statically.
pub fn best_move<R: Rng + ?Sized>(
    board: &Board,
    player: Player,
    depth: usize,
    allow_pushing_opponent: bool,
    rng: &mut R,
) -> Option<Move> {
    let depth = depth.max(1);
    let searcher = Searcher {
        ai: player,
        allow_pushing_opponent,
    };
    let mut best_score = -INF;
    let mut best_moves = Vec::new();
    for mv in legal_moves(player, board, allow_pushing_opponent) {
        let child = board.apply_slide(&mv, player);
        let score = -searcher.negamax(&child, player.opponent(), depth - 1, -INF, INF);
        if score > best_score {
            best_score = score;
            best_moves.clear();
            best_moves.push(mv);
        } else if score == best_score {
            best_moves.push(mv);
        }
    }
    debug!(
        depth,
        best_score,
        tied = best_moves.len(),
        "alpha-beta search finished"
    );
    best_moves.choose(rng).copied()
}

struct Searcher {
    ai: Player,
    allow_pushing_opponent: bool,
}

impl Searcher {
    /// Negamax over a fixed-perspective heuristic: the static score always
    /// favors `ai` and is negated when the opponent is to move.
    fn negamax(&self, board: &Board, to_move: Player, depth: usize, mut alpha: i32, beta: i32) -> i32 {
        let static_score = evaluate(board, self.ai);
        let sign = if to_move == self.ai { 1 } else { -1 };
        if depth == 0 || static_score.abs() >= INITIATIVE_SCORE {
            return sign * static_score;
        }

        let moves = legal_moves(to_move, board, self.allow_pushing_opponent);
        if moves.is_empty() {
            return sign * static_score;
        }

        let mut best = -INF;
        for mv in moves {
            let child = board.apply_slide(&mv, to_move);
            let score = -self.negamax(&child, to_move.opponent(), depth - 1, -beta, -alpha);
            best = best.max(score);
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }
        best
    }
}
