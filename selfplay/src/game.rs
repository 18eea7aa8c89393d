use quixio::{Evaluator, GameState, Player, PuctSearch};
use rand::Rng;
use tracing::debug;

use crate::orchestrator::SelfPlayConfig;
use crate::record::{snapshot, GameRecord, Outcome};

/// Plays one PUCT-vs-itself game from the empty board and labels every ply
/// with the final result. A side left without a slide ends the game as a
/// draw, as does reaching the ply cap.
pub fn play_game<E, R>(game: u64, config: &SelfPlayConfig, search: &PuctSearch<E>, rng: &mut R) -> Vec<GameRecord>
where
    E: Evaluator,
    R: Rng + ?Sized,
{
    let mut state = GameState::new(Player::A);
    let mut plies = Vec::new();
    for ply in 0..config.ply_cap {
        if state.winner().is_some() {
            break;
        }
        let temperature = if ply < config.opening_plies {
            config.opening_temperature
        } else {
            config.endgame_temperature
        };
        let Some(result) = search.search_with_temperature(&state.board, state.to_move, temperature, rng) else {
            break;
        };
        plies.push((ply, state, result.policy_map(), result.best_move.key()));
        state = state.apply(&result.best_move);
    }

    let outcome = Outcome::from_winner(state.winner().map(|win| win.player));
    debug!(game, plies = plies.len(), ?outcome, "self-play game finished");
    plies
        .into_iter()
        .map(|(ply, position, policy, played)| GameRecord {
            game,
            ply,
            board: snapshot(&position.board),
            player: position.to_move,
            policy,
            played,
            outcome,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quixio::{Move, NoModel};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quick_config() -> SelfPlayConfig {
        SelfPlayConfig {
            iterations: 30,
            ..SelfPlayConfig::default()
        }
    }

    #[test]
    fn records_alternate_and_share_outcome() {
        let config = quick_config();
        let search = PuctSearch::new(NoModel, config.puct());
        let mut rng = StdRng::seed_from_u64(8);
        let records = play_game(4, &config, &search, &mut rng);

        assert!(!records.is_empty());
        assert!(records.len() <= config.ply_cap as usize);
        let outcome = records[0].outcome;
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.game, 4);
            assert_eq!(record.ply, i as u32);
            assert_eq!(record.outcome, outcome);
            assert_eq!(record.board.len(), 25);
            let expected = if i % 2 == 0 { Player::A } else { Player::B };
            assert_eq!(record.player, expected);
            assert!(record.policy.contains_key(&record.played));
        }
    }

    #[test]
    fn outcome_matches_replay() {
        let config = quick_config();
        let search = PuctSearch::new(NoModel, config.puct());
        let mut rng = StdRng::seed_from_u64(21);
        let records = play_game(0, &config, &search, &mut rng);

        let last = records.last().unwrap();
        let mv: Move = last.played.parse().unwrap();
        let end = last.board().unwrap().apply_slide(&mv, last.player);
        let winner = end.find_winner().map(|w| w.player);
        assert_eq!(last.outcome, Outcome::from_winner(winner));
    }

    #[test]
    fn ply_cap_forces_a_draw() {
        let config = SelfPlayConfig {
            ply_cap: 2,
            ..quick_config()
        };
        let search = PuctSearch::new(NoModel, config.puct());
        let mut rng = StdRng::seed_from_u64(1);
        let records = play_game(0, &config, &search, &mut rng);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.outcome == Outcome::Draw));
    }
}
