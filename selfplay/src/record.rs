//! Training records: one JSON object per ply.
use std::collections::BTreeMap;

use quixio::{Board, Cell, Player};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "sideA")]
    SideA,
    #[serde(rename = "sideB")]
    SideB,
}

impl From<Cell> for Mark {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => Mark::Empty,
            Cell::Owned(Player::A) => Mark::SideA,
            Cell::Owned(Player::B) => Mark::SideB,
        }
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::Empty => Cell::Empty,
            Mark::SideA => Cell::Owned(Player::A),
            Mark::SideB => Cell::Owned(Player::B),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "sideA_win")]
    SideAWin,
    #[serde(rename = "sideB_win")]
    SideBWin,
    #[serde(rename = "draw")]
    Draw,
}

impl Outcome {
    pub fn from_winner(winner: Option<Player>) -> Self {
        match winner {
            Some(Player::A) => Outcome::SideAWin,
            Some(Player::B) => Outcome::SideBWin,
            None => Outcome::Draw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game: u64,
    pub ply: u32,
    /// 25 cells, row-major.
    pub board: Vec<Mark>,
    pub player: Player,
    /// Visit shares keyed by `"r,c:r,c"`.
    pub policy: BTreeMap<String, f32>,
    /// Key of the move actually played from this position.
    pub played: String,
    pub outcome: Outcome,
}

impl GameRecord {
    /// Rebuilds the board snapshot. `None` if the record does not hold
    /// exactly 25 cells.
    pub fn board(&self) -> Option<Board> {
        let cells: [Cell; quixio::CELLS] = self
            .board
            .iter()
            .map(|&mark| Cell::from(mark))
            .collect::<Vec<_>>()
            .try_into()
            .ok()?;
        Some(Board::from_cells(cells))
    }
}

pub fn snapshot(board: &Board) -> Vec<Mark> {
    board.cells().iter().map(|&cell| Mark::from(cell)).collect()
}
