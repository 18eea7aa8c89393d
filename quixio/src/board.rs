//! Board representation, the slide transform and winner detection.
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::GameError;

pub const SIZE: usize = 5;
pub const CELLS: usize = SIZE * SIZE;
const LAST: usize = SIZE - 1;

/// Every winning line as row-major cell indices: rows, columns, main
/// diagonal, anti-diagonal. `find_winner` relies on this order.
pub static LINES: Lazy<Vec<[usize; SIZE]>> = Lazy::new(generate_lines);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Player {
    #[serde(rename = "sideA")]
    A,
    #[serde(rename = "sideB")]
    B,
}

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::A => Player::B,
            Player::B => Player::A,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Player::A => "sideA",
            Player::B => "sideB",
        }
    }
}

impl FromStr for Player {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" | "sidea" => Ok(Player::A),
            "b" | "sideb" => Ok(Player::B),
            _ => Err(GameError::ParsePlayer(s.to_string())),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Cell {
    #[default]
    Empty,
    Owned(Player),
}

impl Cell {
    pub fn owner(self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::Owned(player) => Some(player),
        }
    }

    fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Owned(Player::A) => 'A',
            Cell::Owned(Player::B) => 'B',
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn from_index(index: usize) -> Self {
        Self::new(index / SIZE, index % SIZE)
    }

    pub fn index(self) -> usize {
        self.row * SIZE + self.col
    }

    pub fn in_bounds(self) -> bool {
        self.row < SIZE && self.col < SIZE
    }

    pub fn is_peripheral(self) -> bool {
        is_peripheral(self.row, self.col)
    }
}

pub fn is_peripheral(row: usize, col: usize) -> bool {
    row == 0 || row == LAST || col == 0 || col == LAST
}

/// A slide: pick up the piece at `source` and push it in at `destination`,
/// the far end of the same row or column.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub source: Coord,
    pub destination: Coord,
}

impl Move {
    pub const fn new(source: Coord, destination: Coord) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        let (src, dst) = (self.source, self.destination);
        if !src.in_bounds() || !dst.in_bounds() || !src.is_peripheral() || src == dst {
            return false;
        }
        if src.row == dst.row {
            dst.col == 0 || dst.col == LAST
        } else if src.col == dst.col {
            dst.row == 0 || dst.row == LAST
        } else {
            false
        }
    }

    /// The `"r,c:r,c"` key used by training records.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Cell indices from `source` to `destination` inclusive, in slide order.
    pub fn path(&self) -> Vec<usize> {
        let (src, dst) = (self.source, self.destination);
        if src.row == dst.row {
            span(src.col, dst.col)
                .map(|col| Coord::new(src.row, col).index())
                .collect()
        } else {
            span(src.row, dst.row)
                .map(|row| Coord::new(row, src.col).index())
                .collect()
        }
    }
}

fn span(from: usize, to: usize) -> Box<dyn Iterator<Item = usize>> {
    if from <= to {
        Box::new(from..=to)
    } else {
        Box::new((to..=from).rev())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}:{},{}",
            self.source.row, self.source.col, self.destination.row, self.destination.col
        )
    }
}

impl FromStr for Move {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GameError::ParseMove(s.to_string());
        let (src, dst) = s.split_once(':').ok_or_else(invalid)?;
        let coord = |part: &str| -> Result<Coord, GameError> {
            let (row, col) = part.split_once(',').ok_or_else(invalid)?;
            let row = row.trim().parse().map_err(|_| invalid())?;
            let col = col.trim().parse().map_err(|_| invalid())?;
            Ok(Coord::new(row, col))
        };
        let mv = Move::new(coord(src)?, coord(dst)?);
        if !mv.is_well_formed() {
            return Err(invalid());
        }
        Ok(mv)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Win {
    pub player: Player,
    pub line: [Coord; SIZE],
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [Cell; CELLS],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [Cell; CELLS]) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell; CELLS] {
        &self.cells
    }

    pub fn get(&self, coord: Coord) -> Cell {
        self.cells[coord.index()]
    }

    pub fn count(&self, player: Player) -> usize {
        self.cells
            .iter()
            .filter(|&&cell| cell == Cell::Owned(player))
            .count()
    }

    pub fn line_cells(&self, line: &[usize; SIZE]) -> [Cell; SIZE] {
        line.map(|idx| self.cells[idx])
    }

    /// Removes the piece at `mv.source`, shifts the rest of the row or column
    /// toward the vacated cell and inserts `piece` at the end nearest
    /// `mv.destination`.
    pub fn apply_slide(&self, mv: &Move, piece: Player) -> Board {
        debug_assert!(mv.is_well_formed(), "malformed move {mv}");
        let (src, dst) = (mv.source, mv.destination);
        let (line, from, to_start): ([usize; SIZE], usize, bool) = if src.row == dst.row {
            (
                std::array::from_fn(|col| Coord::new(src.row, col).index()),
                src.col,
                dst.col == 0,
            )
        } else {
            (
                std::array::from_fn(|row| Coord::new(row, src.col).index()),
                src.row,
                dst.row == 0,
            )
        };

        let mut shifted: Vec<Cell> = line.iter().map(|&idx| self.cells[idx]).collect();
        shifted.remove(from);
        if to_start {
            shifted.insert(0, Cell::Owned(piece));
        } else {
            shifted.push(Cell::Owned(piece));
        }

        let mut next = *self;
        for (idx, cell) in line.iter().zip(shifted) {
            next.cells[*idx] = cell;
        }
        next
    }

    /// First fully-owned line in scan order. When a slide completes lines for
    /// both sides at once the scan order decides.
    pub fn find_winner(&self) -> Option<Win> {
        LINES.iter().find_map(|line| {
            let player = self.cells[line[0]].owner()?;
            line.iter()
                .all(|&idx| self.cells[idx] == Cell::Owned(player))
                .then(|| Win {
                    player,
                    line: line.map(Coord::from_index),
                })
        })
    }

    pub fn parse(text: &str) -> Result<Board, GameError> {
        let mut cells = [Cell::Empty; CELLS];
        let mut filled = 0;
        for (position, ch) in text.chars().enumerate() {
            let cell = match ch {
                '.' | '-' => Cell::Empty,
                'A' | 'a' => Cell::Owned(Player::A),
                'B' | 'b' => Cell::Owned(Player::B),
                c if c.is_whitespace() || c == '/' || c == '|' => continue,
                c => {
                    return Err(GameError::ParseBoard {
                        position,
                        reason: format!("unexpected character {c:?}"),
                    })
                }
            };
            if filled == CELLS {
                return Err(GameError::ParseBoard {
                    position,
                    reason: format!("more than {CELLS} cells"),
                });
            }
            cells[filled] = cell;
            filled += 1;
        }
        if filled != CELLS {
            return Err(GameError::ParseBoard {
                position: text.chars().count(),
                reason: format!("expected {CELLS} cells, found {filled}"),
            });
        }
        Ok(Board { cells })
    }
}

impl FromStr for Board {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::parse(s)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SIZE {
            for col in 0..SIZE {
                write!(f, "{}", self.get(Coord::new(row, col)).symbol())?;
            }
            if row != LAST {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// A board plus the side to move.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GameState {
    pub board: Board,
    pub to_move: Player,
}

impl GameState {
    pub fn new(to_move: Player) -> Self {
        Self {
            board: Board::empty(),
            to_move,
        }
    }

    pub fn with_board(board: Board, to_move: Player) -> Self {
        Self { board, to_move }
    }

    pub fn winner(&self) -> Option<Win> {
        self.board.find_winner()
    }

    /// Slides the mover's piece and passes the turn, unless the slide ended
    /// the game.
    pub fn apply(&self, mv: &Move) -> GameState {
        let board = self.board.apply_slide(mv, self.to_move);
        let to_move = if board.find_winner().is_some() {
            self.to_move
        } else {
            self.to_move.opponent()
        };
        GameState { board, to_move }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(Player::A)
    }
}

fn generate_lines() -> Vec<[usize; SIZE]> {
    let mut lines = Vec::with_capacity(2 * SIZE + 2);
    for row in 0..SIZE {
        lines.push(std::array::from_fn(|col| Coord::new(row, col).index()));
    }
    for col in 0..SIZE {
        lines.push(std::array::from_fn(|row| Coord::new(row, col).index()));
    }
    lines.push(std::array::from_fn(|i| Coord::new(i, i).index()));
    lines.push(std::array::from_fn(|i| Coord::new(i, LAST - i).index()));
    lines
}
