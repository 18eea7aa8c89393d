//! UCT Monte-Carlo tree search with uniformly random playouts.
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::board::{Board, Move, Player};
use crate::movegen::legal_moves;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct UctConfig {
    pub iterations: u32,
    pub exploration: f64,
    /// Playout plies before the game is scored as a draw.
    pub rollout_cap: usize,
    pub allow_pushing_opponent: bool,
}

impl UctConfig {
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    pub fn with_rollout_cap(mut self, cap: usize) -> Self {
        self.rollout_cap = cap;
        self
    }

    pub fn with_pushing_opponent(mut self, allow: bool) -> Self {
        self.allow_pushing_opponent = allow;
        self
    }
}

impl Default for UctConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            exploration: 1.414,
            rollout_cap: 25,
            allow_pushing_opponent: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UctNode {
    pub board: Board,
    pub to_move: Player,
    pub mv: Option<Move>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub visits: u32,
    /// Sum of playout results from the root mover's point of view.
    pub value: f64,
    pub terminal: bool,
}

impl UctNode {
    fn new(board: Board, to_move: Player, mv: Option<Move>, parent: Option<NodeId>) -> Self {
        Self {
            terminal: board.find_winner().is_some(),
            board,
            to_move,
            mv,
            parent,
            children: Vec::new(),
            visits: 0,
            value: 0.0,
        }
    }
}

/// One search: owns its arena and is dropped with it.
pub struct UctSearch {
    config: UctConfig,
    nodes: Vec<UctNode>,
    reference: Player,
}

impl UctSearch {
    pub fn new(config: UctConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            reference: Player::A,
        }
    }

    pub fn nodes(&self) -> &[UctNode] {
        &self.nodes
    }

    pub fn root_children(&self) -> impl Iterator<Item = &UctNode> {
        self.nodes
            .first()
            .into_iter()
            .flat_map(|root| root.children.iter().map(|&id| &self.nodes[id]))
    }

    /// Runs the configured iterations from `board` with `player` to move and
    /// returns the most visited root move.
    pub fn search<R: Rng + ?Sized>(&mut self, board: &Board, player: Player, rng: &mut R) -> Option<Move> {
        self.nodes.clear();
        self.nodes.push(UctNode::new(*board, player, None, None));
        self.reference = player;
        if self.nodes[0].terminal {
            return None;
        }

        for _ in 0..self.config.iterations {
            let leaf = self.select(0);
            let start = self.expand(leaf, rng);
            let result = self.rollout(start, rng);
            self.backpropagate(start, result);
        }

        let best = self
            .root_children()
            .fold(None::<&UctNode>, |best, child| match best {
                Some(b) if b.visits >= child.visits => Some(b),
                _ => Some(child),
            })
            .and_then(|child| child.mv);
        debug!(
            iterations = self.config.iterations,
            nodes = self.nodes.len(),
            best = ?best.map(|mv| mv.key()),
            "uct search finished"
        );
        best
    }

    fn select(&self, mut id: NodeId) -> NodeId {
        loop {
            let node = &self.nodes[id];
            if node.children.is_empty() {
                return id;
            }
            if let Some(&unvisited) = node.children.iter().find(|&&c| self.nodes[c].visits == 0) {
                return unvisited;
            }
            let ln_parent = (node.visits.max(1) as f64).ln();
            // Stored values favor the reference side; flip them when the
            // opponent is choosing.
            let sign = if node.to_move == self.reference { 1.0 } else { -1.0 };
            id = node
                .children
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    let ua = self.ucb(a, ln_parent, sign);
                    let ub = self.ucb(b, ln_parent, sign);
                    ua.partial_cmp(&ub).unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(id);
        }
    }

    fn ucb(&self, id: NodeId, ln_parent: f64, sign: f64) -> f64 {
        let child = &self.nodes[id];
        let visits = child.visits as f64;
        sign * child.value / visits + self.config.exploration * (ln_parent / visits).sqrt()
    }

    /// Expands every legal move of a non-terminal leaf and returns one new
    /// child at random, or the leaf itself when nothing was added.
    fn expand<R: Rng + ?Sized>(&mut self, leaf: NodeId, rng: &mut R) -> NodeId {
        let node = &self.nodes[leaf];
        if node.terminal || !node.children.is_empty() {
            return leaf;
        }
        let (board, to_move) = (node.board, node.to_move);
        let moves = legal_moves(to_move, &board, self.config.allow_pushing_opponent);
        for mv in moves {
            let child_board = board.apply_slide(&mv, to_move);
            let id = self.nodes.len();
            self.nodes
                .push(UctNode::new(child_board, to_move.opponent(), Some(mv), Some(leaf)));
            self.nodes[leaf].children.push(id);
        }
        self.nodes[leaf].children.choose(rng).copied().unwrap_or(leaf)
    }

    /// Plays random slides from `start`; +1 when the reference side wins,
    /// -1 when it loses, 0 on a draw or when the cap is reached.
    fn rollout<R: Rng + ?Sized>(&self, start: NodeId, rng: &mut R) -> f64 {
        let mut board = self.nodes[start].board;
        let mut to_move = self.nodes[start].to_move;
        for _ in 0..self.config.rollout_cap {
            if board.find_winner().is_some() {
                break;
            }
            let moves = legal_moves(to_move, &board, self.config.allow_pushing_opponent);
            let Some(mv) = moves.choose(rng) else {
                return 0.0;
            };
            board = board.apply_slide(mv, to_move);
            to_move = to_move.opponent();
        }
        match board.find_winner() {
            Some(win) if win.player == self.reference => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }

    fn backpropagate(&mut self, from: NodeId, result: f64) {
        let mut current = Some(from);
        while let Some(id) = current {
            let node = &mut self.nodes[id];
            node.visits += 1;
            node.value += result;
            current = node.parent;
        }
    }
}
