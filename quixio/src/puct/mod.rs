//! PUCT tree search guided by an [`Evaluator`].
//!
//! Every newly reached leaf is scored once by the evaluator (no playouts).
//! Priors shape exploration, values are backed up with alternating sign, and
//! the final move is drawn from the root visit counts.
mod config;
mod noise;
mod tree;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::board::{Board, Move, Player};
use crate::evaluator::{action_index, Evaluator};
use crate::movegen::legal_moves;

pub use config::PuctConfig;
pub use noise::add_dirichlet_noise;
pub use tree::{NodeId, PuctNode, PuctTree, ROOT};

/// Temperatures below this pick the most visited move outright.
pub const DETERMINISTIC_TEMPERATURE: f32 = 0.01;

/// Outcome of one search call.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_move: Move,
    /// Share of root visits per move, in generation order.
    pub policy: Vec<(Move, f32)>,
    /// Mean root value for the side to move.
    pub root_value: f32,
    pub total_visits: u32,
}

impl SearchResult {
    pub fn probability(&self, mv: &Move) -> f32 {
        self.policy
            .iter()
            .find(|(m, _)| m == mv)
            .map_or(0.0, |(_, p)| *p)
    }

    /// Policy keyed by move text.
    pub fn policy_map(&self) -> BTreeMap<String, f32> {
        self.policy.iter().map(|(mv, p)| (mv.key(), *p)).collect()
    }
}

pub struct PuctSearch<E> {
    evaluator: E,
    config: PuctConfig,
}

impl<E: Evaluator> PuctSearch<E> {
    pub fn new(evaluator: E, config: PuctConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &PuctConfig {
        &self.config
    }

    /// Searches with the configured temperature. `None` when the position is
    /// already decided or `mover` has no slide.
    pub fn search<R: Rng + ?Sized>(&self, board: &Board, mover: Player, rng: &mut R) -> Option<SearchResult> {
        self.search_with_temperature(board, mover, self.config.temperature, rng)
    }

    pub fn search_with_temperature<R: Rng + ?Sized>(
        &self,
        board: &Board,
        mover: Player,
        temperature: f32,
        rng: &mut R,
    ) -> Option<SearchResult> {
        if board.find_winner().is_some() {
            return None;
        }
        let mut tree = PuctTree::new(*board, mover);
        self.expand_and_evaluate(&mut tree, ROOT);
        if tree.root().children.is_empty() {
            return None;
        }
        if self.config.add_dirichlet_noise {
            add_dirichlet_noise(
                &mut tree,
                ROOT,
                self.config.dirichlet_alpha,
                self.config.dirichlet_epsilon,
                rng,
            );
        }

        for _ in 0..self.config.iterations {
            let leaf = self.select(&tree);
            let value = self.expand_and_evaluate(&mut tree, leaf);
            tree.backup(leaf, value);
        }

        let root = tree.root();
        let visits: Vec<(Move, u32)> = root
            .children
            .iter()
            .filter_map(|&id| tree.nodes[id].mv.map(|mv| (mv, tree.nodes[id].visits)))
            .collect();
        let total_visits: u32 = visits.iter().map(|(_, n)| n).sum();
        let policy = if total_visits > 0 {
            visits
                .iter()
                .map(|&(mv, n)| (mv, n as f32 / total_visits as f32))
                .collect()
        } else {
            Vec::new()
        };
        let best_move = choose_move(&visits, temperature, rng)?;

        debug!(
            iterations = self.config.iterations,
            nodes = tree.size(),
            total_visits,
            root_value = root.q_value(),
            best = %best_move,
            "puct search finished"
        );
        Some(SearchResult {
            best_move,
            policy,
            root_value: root.q_value(),
            total_visits,
        })
    }

    /// Walks down from the root to the first unexpanded or childless node.
    /// At the root every child is tried once (highest prior first) before
    /// the PUCT score takes over.
    fn select(&self, tree: &PuctTree) -> NodeId {
        let mut id = ROOT;
        loop {
            let node = &tree.nodes[id];
            if !node.expanded || node.children.is_empty() {
                return id;
            }
            if id == ROOT {
                let unvisited = node
                    .children
                    .iter()
                    .copied()
                    .filter(|&c| tree.nodes[c].visits == 0)
                    .fold(None::<NodeId>, |best, c| match best {
                        Some(b) if tree.nodes[b].prior >= tree.nodes[c].prior => Some(b),
                        _ => Some(c),
                    });
                if let Some(child) = unvisited {
                    id = child;
                    continue;
                }
            }
            let sqrt_parent = (node.visits as f32).sqrt();
            id = node
                .children
                .iter()
                .copied()
                .fold(None::<(NodeId, f32)>, |best, c| {
                    let score = self.puct_score(&tree.nodes[c], sqrt_parent);
                    match best {
                        Some((_, s)) if s.partial_cmp(&score) != Some(Ordering::Less) => best,
                        _ => Some((c, score)),
                    }
                })
                .map_or(id, |(c, _)| c);
        }
    }

    /// `Q + c_puct * P * sqrt(N) / (1 + n)`, with Q read from the parent's
    /// side (a child's own value negated).
    fn puct_score(&self, child: &PuctNode, sqrt_parent: f32) -> f32 {
        let q = -child.q_value();
        let u = self.config.c_puct * child.prior * sqrt_parent / (1.0 + child.visits as f32);
        q + u
    }

    /// Scores `id` for its own mover and, when the game goes on, attaches a
    /// child per legal slide. Only called once per node for non-terminal
    /// positions; terminal nodes are rescored on every visit.
    fn expand_and_evaluate(&self, tree: &mut PuctTree, id: NodeId) -> f32 {
        let (board, to_move) = (tree.nodes[id].board, tree.nodes[id].to_move);
        if let Some(win) = board.find_winner() {
            tree.nodes[id].expanded = true;
            return if win.player == to_move { 1.0 } else { -1.0 };
        }
        if tree.nodes[id].expanded {
            // Reached only for positions without slides.
            return 0.0;
        }
        tree.nodes[id].expanded = true;

        let moves = legal_moves(to_move, &board, self.config.allow_pushing_opponent);
        if moves.is_empty() {
            return 0.0;
        }
        let (priors, value) = match self.evaluator.predict(&board, to_move) {
            Some(prediction) => (normalized_priors(&prediction.policy, &moves), prediction.value),
            None => (vec![1.0 / moves.len() as f32; moves.len()], 0.0),
        };
        for (mv, prior) in moves.into_iter().zip(priors) {
            let child = PuctNode::new(
                board.apply_slide(&mv, to_move),
                to_move.opponent(),
                Some(mv),
                Some(id),
                prior,
            );
            tree.add_child(id, child);
        }
        value
    }
}

/// Looks up each move's prior by its source cell and renormalizes over the
/// legal set. Falls back to uniform when the mass is zero or not finite.
fn normalized_priors(policy: &[f32], moves: &[Move]) -> Vec<f32> {
    let raw: Vec<f32> = moves
        .iter()
        .map(|mv| policy.get(action_index(mv)).copied().unwrap_or(0.0).max(0.0))
        .collect();
    let sum: f32 = raw.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        raw.into_iter().map(|p| p / sum).collect()
    } else {
        vec![1.0 / moves.len() as f32; moves.len()]
    }
}

/// Picks a root move from visit counts. Low temperatures take the first most
/// visited move; otherwise counts are scaled to `(n / max)^(1/t)` and sampled.
pub fn choose_move<R: Rng + ?Sized>(visits: &[(Move, u32)], temperature: f32, rng: &mut R) -> Option<Move> {
    if temperature < DETERMINISTIC_TEMPERATURE {
        return visits
            .iter()
            .fold(None::<(Move, u32)>, |best, &(mv, n)| match best {
                Some((_, b)) if b >= n => best,
                _ => Some((mv, n)),
            })
            .map(|(mv, _)| mv);
    }
    let max = visits.iter().map(|(_, n)| *n).max()?;
    if max == 0 {
        return visits.choose(rng).map(|(mv, _)| *mv);
    }
    let exponent = 1.0 / temperature as f64;
    let weights: Vec<f64> = visits
        .iter()
        .map(|(_, n)| (*n as f64 / max as f64).powf(exponent))
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => Some(visits[dist.sample(rng)].0),
        Err(_) => visits.choose(rng).map(|(mv, _)| *mv),
    }
}
