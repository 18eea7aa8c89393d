//! Quixio engine: a 5x5 sliding-piece connection game and its computer
//! players.
//!
//! Positions are plain values ([`Board`] plus the side to move), so callers
//! hand in a board string and a difficulty and get a slide back. Stronger
//! tiers search with alpha-beta, UCT playouts or a PUCT tree guided by an
//! injected [`Evaluator`].
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod alphabeta;
pub mod board;
pub mod evaluator;
pub mod heuristic;
pub mod movegen;
pub mod puct;
pub mod uct;

pub use board::{Board, Cell, Coord, GameState, Move, Player, Win, CELLS, SIZE};
pub use evaluator::{Evaluator, ModelEvaluator, NoModel, PolicyValueModel, Prediction};
pub use movegen::legal_moves;
pub use puct::{PuctConfig, PuctSearch, SearchResult};
pub use uct::{UctConfig, UctSearch};

#[derive(Debug, Error)]
pub enum GameError {
    #[error("invalid board at position {position}: {reason}")]
    ParseBoard { position: usize, reason: String },
    #[error("invalid move {0:?}, expected r,c:r,c between peripheral cells")]
    ParseMove(String),
    #[error("unknown player {0:?}")]
    ParsePlayer(String),
    #[error("unknown difficulty {0:?}")]
    ParseDifficulty(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
    Ultimate,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
        Difficulty::Ultimate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
            Difficulty::Ultimate => "ultimate",
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Difficulty::Easy => Strategy::Random,
            Difficulty::Medium => Strategy::Tactical,
            Difficulty::Hard => Strategy::Heuristic { depth: 3 },
            Difficulty::Expert => Strategy::Uct(UctConfig::default().with_iterations(3000)),
            Difficulty::Ultimate => Strategy::Puct(
                PuctConfig::default()
                    .with_iterations(2000)
                    .with_temperature(0.0)
                    .without_dirichlet_noise(),
            ),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Difficulty::ALL
            .into_iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| GameError::ParseDifficulty(s.to_string()))
    }
}

/// How a computer player picks its slide.
#[derive(Debug, Clone)]
pub enum Strategy {
    Random,
    /// Wins in one when it can, otherwise avoids handing the opponent a win
    /// in one.
    Tactical,
    Heuristic { depth: usize },
    Uct(UctConfig),
    Puct(PuctConfig),
}

/// Picks a slide for `state.to_move`. `None` when the game is already over
/// or the side to move has no legal slide.
pub fn select_move<E, R>(state: &GameState, strategy: &Strategy, evaluator: &E, rng: &mut R) -> Option<Move>
where
    E: Evaluator + ?Sized,
    R: Rng + ?Sized,
{
    if state.winner().is_some() {
        return None;
    }
    let (board, player) = (&state.board, state.to_move);
    let mv = match strategy {
        Strategy::Random => legal_moves(player, board, true).choose(rng).copied(),
        Strategy::Tactical => tactical_move(board, player, rng),
        Strategy::Heuristic { depth } => alphabeta::best_move(board, player, *depth, true, rng),
        Strategy::Uct(config) => UctSearch::new(config.clone()).search(board, player, rng),
        Strategy::Puct(config) => PuctSearch::new(evaluator, config.clone())
            .search(board, player, rng)
            .map(|result| result.best_move),
    };
    debug!(player = player.label(), ?strategy, mv = ?mv.map(|m| m.key()), "move selected");
    mv
}

fn wins_for(board: &Board, player: Player) -> bool {
    board.find_winner().map_or(false, |win| win.player == player)
}

fn tactical_move<R: Rng + ?Sized>(board: &Board, player: Player, rng: &mut R) -> Option<Move> {
    let moves = legal_moves(player, board, true);
    let winning: Vec<Move> = moves
        .iter()
        .copied()
        .filter(|mv| wins_for(&board.apply_slide(mv, player), player))
        .collect();
    if let Some(mv) = winning.choose(rng) {
        return Some(*mv);
    }

    let opponent = player.opponent();
    let safe: Vec<Move> = moves
        .iter()
        .copied()
        .filter(|mv| {
            let after = board.apply_slide(mv, player);
            !wins_for(&after, opponent)
                && !legal_moves(opponent, &after, true)
                    .iter()
                    .any(|reply| wins_for(&after.apply_slide(reply, opponent), opponent))
        })
        .collect();
    safe.choose(rng).or_else(|| moves.choose(rng)).copied()
}

/// A computer player holding a (possibly trained) evaluator and its own RNG.
pub struct Engine {
    evaluator: Arc<dyn Evaluator + Send + Sync>,
    rng: StdRng,
}

impl Engine {
    pub fn new(evaluator: Arc<dyn Evaluator + Send + Sync>) -> Self {
        Self {
            evaluator,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(evaluator: Arc<dyn Evaluator + Send + Sync>, seed: u64) -> Self {
        Self {
            evaluator,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn without_model() -> Self {
        Self::new(Arc::new(NoModel))
    }

    pub fn choose(&mut self, state: &GameState, difficulty: Difficulty) -> Option<Move> {
        self.choose_with(state, &difficulty.strategy())
    }

    pub fn choose_with(&mut self, state: &GameState, strategy: &Strategy) -> Option<Move> {
        select_move(state, strategy, &self.evaluator, &mut self.rng)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub board: String,
    pub player: Player,
    pub difficulty: Difficulty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResponse {
    #[serde(rename = "move")]
    pub mv: Option<Move>,
}

/// Stateless entry point: no model attached, fresh randomness per call.
pub fn best_move(request: MoveRequest) -> Result<MoveResponse, GameError> {
    let board = Board::parse(&request.board)?;
    let state = GameState::with_board(board, request.player);
    let mv = select_move(
        &state,
        &request.difficulty.strategy(),
        &NoModel,
        &mut rand::thread_rng(),
    );
    Ok(MoveResponse { mv })
}
