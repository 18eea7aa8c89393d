use crate::board::{Board, Cell, Coord, Move, Player, SIZE};

/// Legal slides for `player`, in row-major source order with destinations
/// ordered same-row start, same-row end, same-column start, same-column end.
///
/// With `allow_pushing_opponent` off, a slide whose path crosses an opponent
/// piece is dropped.
pub fn legal_moves(player: Player, board: &Board, allow_pushing_opponent: bool) -> Vec<Move> {
    let opponent = Cell::Owned(player.opponent());
    let mut moves = Vec::with_capacity(44);
    for row in 0..SIZE {
        for col in 0..SIZE {
            let source = Coord::new(row, col);
            if !source.is_peripheral() || board.get(source) == opponent {
                continue;
            }
            let last = SIZE - 1;
            let destinations = [
                Coord::new(row, 0),
                Coord::new(row, last),
                Coord::new(0, col),
                Coord::new(last, col),
            ];
            for destination in destinations {
                if destination == source {
                    continue;
                }
                let mv = Move::new(source, destination);
                if moves.contains(&mv) {
                    continue;
                }
                if !allow_pushing_opponent
                    && mv.path().iter().any(|&idx| board.cells()[idx] == opponent)
                {
                    continue;
                }
                moves.push(mv);
            }
        }
    }
    moves
}
