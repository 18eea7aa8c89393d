use crate::board::{Board, Move, Player};

/// Index into the search arena
pub type NodeId = usize;

pub const ROOT: NodeId = 0;

pub struct PuctNode {
    pub board: Board,

    /// Side to move at this node
    pub to_move: Player,

    /// Slide that led here (None for the root)
    pub mv: Option<Move>,

    pub parent: Option<NodeId>,

    pub children: Vec<NodeId>,

    pub visits: u32,

    /// Sum of backed-up values, from `to_move`'s point of view
    pub total_value: f32,

    /// Prior from the evaluator, normalized over the parent's legal moves
    pub prior: f32,

    /// Evaluated at least once; terminal and move-less nodes stay childless
    pub expanded: bool,
}

impl PuctNode {
    pub fn new(board: Board, to_move: Player, mv: Option<Move>, parent: Option<NodeId>, prior: f32) -> Self {
        Self {
            board,
            to_move,
            mv,
            parent,
            children: Vec::new(),
            visits: 0,
            total_value: 0.0,
            prior,
            expanded: false,
        }
    }

    /// Mean value for this node's own mover
    pub fn q_value(&self) -> f32 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_value / self.visits as f32
        }
    }
}

/// Arena of nodes for one search call.
pub struct PuctTree {
    pub nodes: Vec<PuctNode>,
}

impl PuctTree {
    pub fn new(board: Board, to_move: Player) -> Self {
        let mut nodes = Vec::with_capacity(4096);
        nodes.push(PuctNode::new(board, to_move, None, None, 1.0));
        Self { nodes }
    }

    pub fn root(&self) -> &PuctNode {
        &self.nodes[ROOT]
    }

    pub fn add_child(&mut self, parent: NodeId, node: PuctNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// Adds `value` at `leaf` and alternates its sign on the way up, since
    /// each level belongs to the other side.
    pub fn backup(&mut self, leaf: NodeId, value: f32) {
        let mut value = value;
        let mut current = Some(leaf);
        while let Some(id) = current {
            let node = &mut self.nodes[id];
            node.visits += 1;
            node.total_value += value;
            value = -value;
            current = node.parent;
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }
}
