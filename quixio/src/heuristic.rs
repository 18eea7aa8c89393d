//! Static position scoring for the alpha-beta tiers.
use crate::board::{Board, Cell, Coord, Player, LINES, SIZE};

pub const WIN_SCORE: i32 = 1_000_000;
pub const UNBLOCKABLE_REACH_SCORE: i32 = 200_000;
pub const FORCED_WIN_SCORE: i32 = 50_000;
/// Scores at or above this magnitude mean a forcing threat is on the board.
pub const INITIATIVE_SCORE: i32 = 10_000;

const CREATE_FOUR: i32 = 1_000;
const BLOCK_FOUR: i32 = 1_200;
const CREATE_THREE: i32 = 300;
const BLOCK_THREE: i32 = 350;
const CREATE_TWO: i32 = 10;
const BLOCK_TWO: i32 = 12;
const CENTER_CONTROL: i32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreatCounts {
    /// Four pieces with the gap in the middle of the line: both slide
    /// directions finish it.
    pub unblockable_reaches: u32,
    /// Three pieces with both line ends empty.
    pub open_threes: u32,
    pub fours: u32,
    pub threes: u32,
    pub twos: u32,
}

pub fn count_threats(board: &Board, player: Player) -> ThreatCounts {
    let mut counts = ThreatCounts::default();
    let own = Cell::Owned(player);
    let theirs = Cell::Owned(player.opponent());
    for line in LINES.iter() {
        let cells = board.line_cells(line);
        let mine = cells.iter().filter(|&&c| c == own).count();
        let opposing = cells.iter().filter(|&&c| c == theirs).count();
        if mine > 0 && opposing > 0 {
            continue; // dead line
        }
        let empty = SIZE - mine - opposing;
        match (mine, empty) {
            (4, 1) => {
                let gap = cells.iter().position(|&c| c == Cell::Empty);
                match gap {
                    Some(idx) if idx > 0 && idx < SIZE - 1 => counts.unblockable_reaches += 1,
                    _ => counts.fours += 1,
                }
            }
            (3, 2) if cells[0] == Cell::Empty && cells[SIZE - 1] == Cell::Empty => {
                counts.open_threes += 1
            }
            (3, _) => counts.threes += 1,
            (2, _) => counts.twos += 1,
            _ => {}
        }
    }
    counts
}

/// Score from `player`'s point of view. Threats against `player` are checked
/// before `player`'s own, and blocking weights exceed creating weights.
pub fn evaluate(board: &Board, player: Player) -> i32 {
    if let Some(win) = board.find_winner() {
        return if win.player == player {
            WIN_SCORE
        } else {
            -WIN_SCORE
        };
    }
    let mine = count_threats(board, player);
    let theirs = count_threats(board, player.opponent());

    if theirs.unblockable_reaches > 0 {
        return -UNBLOCKABLE_REACH_SCORE;
    }
    if mine.unblockable_reaches > 0 {
        return UNBLOCKABLE_REACH_SCORE;
    }
    if theirs.open_threes >= 2 {
        return -FORCED_WIN_SCORE;
    }
    if mine.open_threes >= 2 {
        return FORCED_WIN_SCORE;
    }
    if theirs.open_threes > 0 {
        return -INITIATIVE_SCORE;
    }
    if mine.open_threes > 0 {
        return INITIATIVE_SCORE;
    }

    let mut score = 0;
    score += mine.fours as i32 * CREATE_FOUR;
    score += mine.threes as i32 * CREATE_THREE;
    score += mine.twos as i32 * CREATE_TWO;
    score -= theirs.fours as i32 * BLOCK_FOUR;
    score -= theirs.threes as i32 * BLOCK_THREE;
    score -= theirs.twos as i32 * BLOCK_TWO;
    score + center_control(board, player)
}

fn center_control(board: &Board, player: Player) -> i32 {
    let mut score = 0;
    for row in 1..SIZE - 1 {
        for col in 1..SIZE - 1 {
            match board.get(Coord::new(row, col)).owner() {
                Some(owner) if owner == player => score += CENTER_CONTROL,
                Some(_) => score -= CENTER_CONTROL,
                None => {}
            }
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_is_neutral() {
        assert_eq!(evaluate(&Board::empty(), Player::A), 0);
        assert_eq!(count_threats(&Board::empty(), Player::A), ThreatCounts::default());
    }

    #[test]
    fn interior_gap_is_unblockable_reach() {
        let board = Board::parse("...../...../AA.AA/...../.....").unwrap();
        let threats = count_threats(&board, Player::A);
        assert_eq!(threats.unblockable_reaches, 1);
        assert_eq!(evaluate(&board, Player::A), UNBLOCKABLE_REACH_SCORE);
        assert_eq!(evaluate(&board, Player::B), -UNBLOCKABLE_REACH_SCORE);
    }

    #[test]
    fn edge_gap_is_plain_four() {
        let board = Board::parse("...../...../.AAAA/...../.....").unwrap();
        let threats = count_threats(&board, Player::A);
        assert_eq!(threats.fours, 1);
        assert_eq!(threats.unblockable_reaches, 0);
    }

    #[test]
    fn open_three_needs_empty_ends() {
        let open = Board::parse(".AAA./...../...../...../.....").unwrap();
        assert_eq!(count_threats(&open, Player::A).open_threes, 1);
        assert_eq!(evaluate(&open, Player::A), INITIATIVE_SCORE);

        let closed = Board::parse("AAA../...../...../...../.....").unwrap();
        let threats = count_threats(&closed, Player::A);
        assert_eq!(threats.open_threes, 0);
        assert_eq!(threats.threes, 1);
    }

    #[test]
    fn two_open_threes_are_forced() {
        let board = Board::parse(".AAA./...../...../...../.AAA.").unwrap();
        assert_eq!(evaluate(&board, Player::A), FORCED_WIN_SCORE);
    }

    #[test]
    fn mixed_lines_are_dead() {
        let board = Board::parse("AABA./...../...../...../.....").unwrap();
        let threats = count_threats(&board, Player::A);
        assert_eq!(threats.twos, 0);
        assert_eq!(threats.threes, 0);
    }

    #[test]
    fn defence_outweighs_attack() {
        let board = Board::parse("AA.../...../...../...../BB...").unwrap();
        assert!(evaluate(&board, Player::A) < 0);
    }

    #[test]
    fn center_counts_for_its_owner() {
        let board = Board::parse("...../...../..A../...../.....").unwrap();
        assert_eq!(evaluate(&board, Player::A), CENTER_CONTROL);
        assert_eq!(evaluate(&board, Player::B), -CENTER_CONTROL);
    }

    #[test]
    fn terminal_dominates() {
        let board = Board::parse("AAAAA/BBBB./...../...../.....").unwrap();
        assert_eq!(evaluate(&board, Player::A), WIN_SCORE);
    }
}
