use rand::Rng;
use rand_distr::{Dirichlet, Distribution};
use tracing::debug;

use super::tree::{NodeId, PuctTree};

/// Mixes Dirichlet noise into the priors of `root`'s children:
/// `P' = (1 - epsilon) * P + epsilon * noise`.
///
/// Returns false when nothing was mixed in: fewer than two children, or a
/// sample that underflowed to something non-finite.
pub fn add_dirichlet_noise<R: Rng + ?Sized>(
    tree: &mut PuctTree,
    root: NodeId,
    alpha: f32,
    epsilon: f32,
    rng: &mut R,
) -> bool {
    let n = tree.nodes[root].children.len();
    if n < 2 {
        return false;
    }
    let dirichlet = match Dirichlet::new(&vec![alpha as f64; n]) {
        Ok(d) => d,
        Err(err) => {
            debug!(error = %err, "skipping root noise");
            return false;
        }
    };
    let noise: Vec<f64> = dirichlet.sample(rng);
    if noise.iter().any(|x| !x.is_finite()) {
        return false;
    }

    let children = tree.nodes[root].children.clone();
    for (child_id, eta) in children.into_iter().zip(noise) {
        let child = &mut tree.nodes[child_id];
        child.prior = (1.0 - epsilon) * child.prior + epsilon * eta as f32;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Player};
    use crate::puct::tree::{PuctNode, ROOT};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn root_with_priors(priors: &[f32]) -> PuctTree {
        let board = Board::empty();
        let mut tree = PuctTree::new(board, Player::A);
        for &prior in priors {
            tree.add_child(ROOT, PuctNode::new(board, Player::B, None, Some(ROOT), prior));
        }
        tree
    }

    fn priors(tree: &PuctTree) -> Vec<f32> {
        tree.root().children.iter().map(|&id| tree.nodes[id].prior).collect()
    }

    #[test]
    fn noise_changes_priors_and_keeps_mass() {
        let mut tree = root_with_priors(&[0.25; 4]);
        let mut rng = StdRng::seed_from_u64(9);
        assert!(add_dirichlet_noise(&mut tree, ROOT, 0.3, 0.25, &mut rng));
        let after = priors(&tree);
        assert!(after.iter().any(|p| (p - 0.25).abs() > 1e-6));
        assert_relative_eq!(after.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn single_child_is_left_alone() {
        let mut tree = root_with_priors(&[1.0]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!add_dirichlet_noise(&mut tree, ROOT, 0.03, 0.25, &mut rng));
        assert_eq!(priors(&tree), vec![1.0]);
    }

    #[test]
    fn small_epsilon_bounds_the_shift() {
        let mut tree = root_with_priors(&[0.8, 0.15, 0.05]);
        let mut rng = StdRng::seed_from_u64(4);
        add_dirichlet_noise(&mut tree, ROOT, 0.3, 0.1, &mut rng);
        let after = priors(&tree);
        for (before, now) in [0.8f32, 0.15, 0.05].iter().zip(after) {
            assert!((before - now).abs() <= 0.1 + 1e-6);
        }
    }
}
