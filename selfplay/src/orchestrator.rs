//! Runs many self-play games at once with a bounded number in flight.
//!
//! Each game is CPU-bound and runs on the blocking pool. Finished games are
//! handed over an mpsc channel to a single writer task, which is the only
//! owner of the output file.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use quixio::{Evaluator, PuctConfig, PuctSearch};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::game::play_game;
use crate::record::GameRecord;
use crate::storage::JsonlSink;

#[derive(Debug, Clone)]
pub struct SelfPlayConfig {
    pub games: u64,
    /// Games allowed in flight at once
    pub workers: usize,
    /// PUCT simulations per move
    pub iterations: u32,
    /// Plies played at `opening_temperature` before switching to
    /// `endgame_temperature`
    pub opening_plies: u32,
    pub opening_temperature: f32,
    pub endgame_temperature: f32,
    /// Game is scored as a draw after this many plies
    pub ply_cap: u32,
    /// Base seed; game `i` uses `seed + i`. Entropy when unset.
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
}

impl SelfPlayConfig {
    pub fn puct(&self) -> PuctConfig {
        PuctConfig::for_self_play().with_iterations(self.iterations)
    }

    /// Rejects settings that would produce no games or records without a
    /// visit distribution.
    pub fn validate(&self) -> Result<()> {
        if self.games == 0 {
            bail!("games must be greater than 0");
        }
        if self.workers == 0 {
            bail!("workers must be greater than 0");
        }
        // Zero simulations leave the root unvisited and the policy empty.
        if self.iterations == 0 {
            bail!("iterations must be greater than 0");
        }
        if self.ply_cap == 0 {
            bail!("ply_cap must be greater than 0");
        }
        for (name, t) in [
            ("opening_temperature", self.opening_temperature),
            ("endgame_temperature", self.endgame_temperature),
        ] {
            if t.is_nan() || t < 0.0 {
                bail!("{name} must be non-negative");
            }
        }
        Ok(())
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            games: 100,
            workers: default_workers(),
            iterations: 400,
            opening_plies: 10,
            opening_temperature: 1.0,
            endgame_temperature: 0.0,
            ply_cap: 50,
            seed: None,
            output_dir: PathBuf::from("data/selfplay"),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: u64,
    pub failed: u64,
    pub requested: u64,
}

impl Progress {
    pub fn finished(&self) -> bool {
        self.completed + self.failed >= self.requested
    }
}

#[derive(Debug, Clone)]
pub struct Summary {
    /// Games whose records are on disk.
    pub completed: u64,
    /// Games that panicked; requested minus completed.
    pub failed: u64,
    pub records: u64,
    pub output: PathBuf,
}

pub struct SelfPlay {
    config: SelfPlayConfig,
    evaluator: Arc<dyn Evaluator + Send + Sync>,
    progress: Arc<watch::Sender<Progress>>,
}

impl SelfPlay {
    pub fn new(config: SelfPlayConfig, evaluator: Arc<dyn Evaluator + Send + Sync>) -> Self {
        let (progress, _) = watch::channel(Progress {
            requested: config.games,
            ..Progress::default()
        });
        Self {
            config,
            evaluator,
            progress: Arc::new(progress),
        }
    }

    pub fn config(&self) -> &SelfPlayConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Plays every requested game into a fresh file under `output_dir`.
    pub async fn run(&self) -> Result<Summary> {
        let sink = JsonlSink::create(&self.config.output_dir).await?;
        self.run_into(sink).await
    }

    /// Plays every requested game into `sink`.
    ///
    /// `completed` in the published progress only moves once the writer has
    /// flushed that game, so it never runs ahead of the file.
    pub async fn run_into(&self, sink: JsonlSink) -> Result<Summary> {
        self.config.validate()?;
        let workers = self.config.workers;
        let output = sink.path().to_path_buf();
        info!(
            games = self.config.games,
            workers,
            iterations = self.config.iterations,
            output = %output.display(),
            "starting self-play"
        );

        self.progress.send_replace(Progress {
            requested: self.config.games,
            ..Progress::default()
        });
        let (tx, rx) = mpsc::channel::<Vec<GameRecord>>(workers * 2);
        let writer = tokio::spawn(write_games(sink, rx, Arc::clone(&self.progress)));

        let mut tasks = JoinSet::new();
        let mut next = 0u64;
        let mut writer_gone = false;
        loop {
            while tasks.len() < workers && next < self.config.games {
                self.spawn_game(&mut tasks, next);
                next += 1;
            }
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok(records) => {
                    if tx.send(records).await.is_err() {
                        writer_gone = true;
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "self-play game failed");
                    self.progress.send_modify(|p| p.failed += 1);
                }
            }
        }
        drop(tx);

        let records = writer.await.context("writer task panicked")??;
        if writer_gone {
            bail!("writer for {} stopped early", output.display());
        }
        let progress = *self.progress.borrow();
        info!(
            completed = progress.completed,
            failed = progress.failed,
            records,
            "self-play finished"
        );
        Ok(Summary {
            completed: progress.completed,
            failed: progress.failed,
            records,
            output,
        })
    }

    fn spawn_game(&self, tasks: &mut JoinSet<Vec<GameRecord>>, index: u64) {
        let evaluator = Arc::clone(&self.evaluator);
        let config = self.config.clone();
        tasks.spawn_blocking(move || {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index)),
                None => StdRng::from_entropy(),
            };
            let search = PuctSearch::new(evaluator, config.puct());
            play_game(index, &config, &search, &mut rng)
        });
    }
}

/// Sole consumer of finished games. Bumps `completed` after each game is
/// flushed and returns the number of records written.
async fn write_games(
    mut sink: JsonlSink,
    mut rx: mpsc::Receiver<Vec<GameRecord>>,
    progress: Arc<watch::Sender<Progress>>,
) -> Result<u64> {
    let mut written = 0u64;
    while let Some(records) = rx.recv().await {
        sink.append_game(&records).await?;
        written += records.len() as u64;
        progress.send_modify(|p| p.completed += 1);
        let now = *progress.borrow();
        info!(
            completed = now.completed,
            failed = now.failed,
            requested = now.requested,
            "self-play progress"
        );
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_training_setup() {
        let config = SelfPlayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.opening_plies, 10);
        assert_eq!(config.opening_temperature, 1.0);
        assert_eq!(config.endgame_temperature, 0.0);
        assert_eq!(config.ply_cap, 50);
        assert!(config.workers >= 2);
        let puct = config.puct();
        assert_eq!(puct.iterations, 400);
        assert!(puct.add_dirichlet_noise);
        assert!(!puct.allow_pushing_opponent);
    }

    #[test]
    fn progress_finishes_when_all_games_accounted_for() {
        let progress = Progress {
            completed: 3,
            failed: 1,
            requested: 4,
        };
        assert!(progress.finished());
        assert!(!Progress {
            requested: 4,
            ..Progress::default()
        }
        .finished());
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let config = SelfPlayConfig {
            iterations: 0,
            ..SelfPlayConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("iterations"));
    }

    #[test]
    fn degenerate_settings_are_rejected() {
        let base = SelfPlayConfig::default();
        let bad = [
            SelfPlayConfig { games: 0, ..base.clone() },
            SelfPlayConfig { workers: 0, ..base.clone() },
            SelfPlayConfig { ply_cap: 0, ..base.clone() },
            SelfPlayConfig { opening_temperature: -0.5, ..base.clone() },
            SelfPlayConfig { endgame_temperature: f32::NAN, ..base.clone() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[tokio::test]
    async fn run_refuses_zero_iterations_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let config = SelfPlayConfig {
            games: 1,
            iterations: 0,
            output_dir: dir.path().to_path_buf(),
            ..SelfPlayConfig::default()
        };
        let runner = SelfPlay::new(config, Arc::new(quixio::NoModel));
        let sink = JsonlSink::create_at(dir.path().join("run.jsonl")).await.unwrap();
        assert!(runner.run_into(sink).await.is_err());
        assert!(crate::read_records(&dir.path().join("run.jsonl")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn writer_counts_a_game_only_after_it_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.jsonl");
        let sink = JsonlSink::create_at(path.clone()).await.unwrap();
        let (progress, watcher) = watch::channel(Progress {
            requested: 2,
            ..Progress::default()
        });
        let (tx, rx) = mpsc::channel(1);
        let writer = tokio::spawn(write_games(sink, rx, Arc::new(progress)));

        let config = SelfPlayConfig {
            iterations: 8,
            ply_cap: 3,
            ..SelfPlayConfig::default()
        };
        let search = PuctSearch::new(quixio::NoModel, config.puct());
        let mut rng = StdRng::seed_from_u64(3);
        let game = play_game(0, &config, &search, &mut rng);
        assert_eq!(watcher.borrow().completed, 0);
        tx.send(game.clone()).await.unwrap();
        drop(tx);

        let written = writer.await.unwrap().unwrap();
        assert_eq!(written, game.len() as u64);
        assert_eq!(watcher.borrow().completed, 1);
        assert_eq!(crate::read_records(&path).unwrap().len(), game.len());
    }
}
