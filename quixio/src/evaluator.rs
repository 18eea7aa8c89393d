//! The policy/value port consumed by PUCT search.
//!
//! A trained model lives outside this crate. Anything that can answer
//! [`Evaluator::predict`] can drive the search; returning `None` makes the
//! search fall back to uniform priors and a neutral value.
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::board::{Board, Cell, Move, Player, CELLS};

/// One prior per source cell. Destinations share their source's prior.
pub const ACTION_SPACE: usize = CELLS;
pub const INPUT_CHANNELS: usize = 3;
pub const INPUT_LEN: usize = INPUT_CHANNELS * CELLS;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub policy: Vec<f32>,
    /// From the mover's point of view, in [-1, 1].
    pub value: f32,
}

pub trait Evaluator {
    fn predict(&self, board: &Board, mover: Player) -> Option<Prediction>;
}

impl<T: Evaluator + ?Sized> Evaluator for &T {
    fn predict(&self, board: &Board, mover: Player) -> Option<Prediction> {
        (**self).predict(board, mover)
    }
}

impl<T: Evaluator + ?Sized> Evaluator for Arc<T> {
    fn predict(&self, board: &Board, mover: Player) -> Option<Prediction> {
        (**self).predict(board, mover)
    }
}

impl<T: Evaluator + ?Sized> Evaluator for Box<T> {
    fn predict(&self, board: &Board, mover: Player) -> Option<Prediction> {
        (**self).predict(board, mover)
    }
}

/// No model loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModel;

impl Evaluator for NoModel {
    fn predict(&self, _board: &Board, _mover: Player) -> Option<Prediction> {
        None
    }
}

pub fn action_index(mv: &Move) -> usize {
    mv.source.index()
}

/// Channel-major 3x5x5 input: the mover's pieces, the opponent's pieces, and
/// a constant plane of +1 (side A to move) or -1 (side B to move).
pub fn encode_input(board: &Board, mover: Player) -> [f32; INPUT_LEN] {
    let mut input = [0.0f32; INPUT_LEN];
    for (idx, cell) in board.cells().iter().enumerate() {
        match cell {
            Cell::Owned(owner) if *owner == mover => input[idx] = 1.0,
            Cell::Owned(_) => input[CELLS + idx] = 1.0,
            Cell::Empty => {}
        }
    }
    let side = match mover {
        Player::A => 1.0,
        Player::B => -1.0,
    };
    input[2 * CELLS..].fill(side);
    input
}

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("expected {expected} policy entries, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model produced a non-finite output")]
    NonFinite,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A raw network taking the encoded input tensor.
pub trait PolicyValueModel {
    fn forward(&self, input: &[f32; INPUT_LEN]) -> anyhow::Result<(Vec<f32>, f32)>;
}

/// Adapts a [`PolicyValueModel`] to the port, turning every failure into
/// `None`.
#[derive(Debug, Clone)]
pub struct ModelEvaluator<M> {
    model: M,
}

impl<M: PolicyValueModel> ModelEvaluator<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn try_predict(&self, board: &Board, mover: Player) -> Result<Prediction, EvaluatorError> {
        let input = encode_input(board, mover);
        let (policy, value) = self
            .model
            .forward(&input)
            .map_err(|err| EvaluatorError::Inference(format!("{err:#}")))?;
        if policy.len() != ACTION_SPACE {
            return Err(EvaluatorError::ShapeMismatch {
                expected: ACTION_SPACE,
                actual: policy.len(),
            });
        }
        if !value.is_finite() || policy.iter().any(|p| !p.is_finite()) {
            return Err(EvaluatorError::NonFinite);
        }
        Ok(Prediction {
            policy,
            value: value.clamp(-1.0, 1.0),
        })
    }
}

impl<M: PolicyValueModel> Evaluator for ModelEvaluator<M> {
    fn predict(&self, board: &Board, mover: Player) -> Option<Prediction> {
        match self.try_predict(board, mover) {
            Ok(prediction) => Some(prediction),
            Err(err) => {
                warn!(error = %err, "evaluator unavailable, using uniform fallback");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Coord;

    struct Fixed(Vec<f32>, f32);

    impl PolicyValueModel for Fixed {
        fn forward(&self, _input: &[f32; INPUT_LEN]) -> anyhow::Result<(Vec<f32>, f32)> {
            Ok((self.0.clone(), self.1))
        }
    }

    struct Broken;

    impl PolicyValueModel for Broken {
        fn forward(&self, _input: &[f32; INPUT_LEN]) -> anyhow::Result<(Vec<f32>, f32)> {
            anyhow::bail!("session closed")
        }
    }

    #[test]
    fn input_planes_are_relative_to_mover() {
        let board = Board::parse("AB.../...../...../...../.....").unwrap();
        let for_b = encode_input(&board, Player::B);
        assert_eq!(for_b[1], 1.0);
        assert_eq!(for_b[CELLS], 1.0);
        assert_eq!(for_b[0], 0.0);
        assert!(for_b[2 * CELLS..].iter().all(|&v| v == -1.0));

        let for_a = encode_input(&board, Player::A);
        assert_eq!(for_a[0], 1.0);
        assert_eq!(for_a[CELLS + 1], 1.0);
        assert!(for_a[2 * CELLS..].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn action_index_ignores_destination() {
        let a = Move::new(Coord::new(0, 2), Coord::new(0, 0));
        let b = Move::new(Coord::new(0, 2), Coord::new(4, 2));
        assert_eq!(action_index(&a), 2);
        assert_eq!(action_index(&a), action_index(&b));
    }

    #[test]
    fn model_value_is_clamped() {
        let evaluator = ModelEvaluator::new(Fixed(vec![0.04; ACTION_SPACE], 3.0));
        let prediction = evaluator.predict(&Board::empty(), Player::A).unwrap();
        assert_eq!(prediction.value, 1.0);
    }

    #[test]
    fn failures_become_none() {
        assert!(ModelEvaluator::new(Broken)
            .predict(&Board::empty(), Player::A)
            .is_none());
        let short = ModelEvaluator::new(Fixed(vec![0.1; 10], 0.0));
        assert!(matches!(
            short.try_predict(&Board::empty(), Player::A),
            Err(EvaluatorError::ShapeMismatch { actual: 10, .. })
        ));
        let nan = ModelEvaluator::new(Fixed(vec![f32::NAN; ACTION_SPACE], 0.0));
        assert!(nan.predict(&Board::empty(), Player::A).is_none());
        assert!(NoModel.predict(&Board::empty(), Player::B).is_none());
    }
}
