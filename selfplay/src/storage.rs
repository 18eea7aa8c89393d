//! JSON-lines output for self-play records.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::record::GameRecord;

/// `selfplay_<unix-millis>_<pid>.jsonl`, with `_<attempt>` appended when an
/// earlier candidate was already taken.
pub fn output_path(dir: &Path, unix_millis: u64, pid: u32, attempt: u32) -> PathBuf {
    let name = match attempt {
        0 => format!("selfplay_{unix_millis}_{pid}.jsonl"),
        n => format!("selfplay_{unix_millis}_{pid}_{n}.jsonl"),
    };
    dir.join(name)
}

/// Owns the per-run output file. Only one task may hold it; whole games are
/// appended in a single write so records of different games never
/// interleave.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Creates a new run file under `dir`. Never reuses an existing file, so
    /// concurrent runs sharing a directory each get their own.
    pub async fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let pid = std::process::id();
        let mut attempt = 0;
        loop {
            let path = output_path(dir, millis, pid, attempt);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        writer: BufWriter::new(file),
                    })
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err).with_context(|| format!("creating {}", path.display())),
            }
        }
    }

    /// Creates (or truncates) the file at `path`.
    pub async fn create_at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = File::create(&path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append_game(&mut self, records: &[GameRecord]) -> Result<()> {
        let mut batch = String::new();
        for record in records {
            batch.push_str(&serde_json::to_string(record)?);
            batch.push('\n');
        }
        self.writer
            .write_all(batch.as_bytes())
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Loads every record of a finished run.
pub fn read_records(path: &Path) -> Result<Vec<GameRecord>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(n, line)| serde_json::from_str(line).with_context(|| format!("record {n}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Mark, Outcome};
    use quixio::Player;
    use std::collections::BTreeMap;

    fn record(game: u64, ply: u32) -> GameRecord {
        GameRecord {
            game,
            ply,
            board: vec![Mark::Empty; 25],
            player: Player::A,
            policy: BTreeMap::new(),
            played: "0,0:0,4".to_string(),
            outcome: Outcome::Draw,
        }
    }

    #[tokio::test]
    async fn appends_whole_games_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::create_at(output_path(dir.path(), 42, 9, 0)).await.unwrap();
        assert!(sink.path().ends_with("selfplay_42_9.jsonl"));

        sink.append_game(&[record(0, 0), record(0, 1)]).await.unwrap();
        sink.append_game(&[record(1, 0)]).await.unwrap();

        let records = read_records(sink.path()).unwrap();
        let keys: Vec<(u64, u32)> = records.iter().map(|r| (r.game, r.ply)).collect();
        assert_eq!(keys, vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[tokio::test]
    async fn create_truncates_and_makes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(&dir.path().join("nested"), 7, 1, 0);
        let mut sink = JsonlSink::create_at(path.clone()).await.unwrap();
        sink.append_game(&[record(0, 0)]).await.unwrap();
        drop(sink);

        JsonlSink::create_at(path.clone()).await.unwrap();
        assert!(read_records(&path).unwrap().is_empty());
    }

    #[test]
    fn later_attempts_get_a_suffix() {
        let dir = Path::new("runs");
        assert_eq!(output_path(dir, 5, 11, 0), dir.join("selfplay_5_11.jsonl"));
        assert_eq!(output_path(dir, 5, 11, 2), dir.join("selfplay_5_11_2.jsonl"));
    }

    #[tokio::test]
    async fn runs_sharing_a_directory_keep_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = JsonlSink::create(dir.path()).await.unwrap();
        first.append_game(&[record(0, 0), record(0, 1)]).await.unwrap();

        let mut second = JsonlSink::create(dir.path()).await.unwrap();
        assert_ne!(first.path(), second.path());
        second.append_game(&[record(3, 0)]).await.unwrap();

        assert_eq!(read_records(first.path()).unwrap().len(), 2);
        assert_eq!(read_records(second.path()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_steps_past_a_taken_name() {
        let dir = tempfile::tempdir().unwrap();
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
        let pid = std::process::id();
        // Occupy the names this run could pick over the next few milliseconds.
        for stamp in millis..millis + 50 {
            std::fs::write(output_path(dir.path(), stamp, pid, 0), "taken\n").unwrap();
        }
        let sink = JsonlSink::create(dir.path()).await.unwrap();
        let name = sink.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("selfplay_"), "{name}");
        for stamp in millis..millis + 50 {
            let taken = output_path(dir.path(), stamp, pid, 0);
            assert_eq!(std::fs::read_to_string(taken).unwrap(), "taken\n");
        }
    }
}
