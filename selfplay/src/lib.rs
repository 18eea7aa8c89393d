//! Self-play data generation for the Quixio PUCT engine.
//!
//! Games run concurrently on the blocking pool; each finished game is labeled
//! with its outcome and appended to a JSON-lines file, one record per ply.
pub mod game;
pub mod orchestrator;
pub mod record;
pub mod storage;

pub use game::play_game;
pub use orchestrator::{Progress, SelfPlay, SelfPlayConfig, Summary};
pub use record::{GameRecord, Mark, Outcome};
pub use storage::{read_records, JsonlSink};
