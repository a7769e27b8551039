//! Turn orchestration for a single player.
//!
//! `Session` owns the board, score, single-level undo snapshot, and the
//! Active/Ended status. Each public method runs one complete command
//! (resolve, spawn, persist, detect) before returning, so callers never
//! observe a half-applied move.
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::{self, Board, Direction, SpawnedTile, TileTransition};
use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::storage::{self, KeyValueStore, StorageError, GAME_STATE_KEY};
use crate::utils::today_string;

/// Number of tiles placed on a fresh board.
const INITIAL_TILES: usize = 2;

/// Board and score captured immediately before a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "gameBoard")]
    pub board: Board,
    #[serde(rename = "currentScore")]
    pub score: u32,
}

/// The persisted form of a session, stored under [`GAME_STATE_KEY`].
///
/// ```
/// use twenty48::engine::Board;
/// use twenty48::session::SavedGame;
/// let saved = SavedGame { board: Board::new_empty(), score: 8, previous: None };
/// let json = serde_json::to_string(&saved).unwrap();
/// assert!(json.starts_with(r#"{"gameBoard":[[0,0,0,0],"#));
/// assert!(json.ends_with(r#""currentScore":8,"previousGameState":null}"#));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedGame {
    #[serde(rename = "gameBoard")]
    pub board: Board,
    #[serde(rename = "currentScore")]
    pub score: u32,
    #[serde(rename = "previousGameState")]
    pub previous: Option<Snapshot>,
}

impl SavedGame {
    fn is_well_formed(&self) -> bool {
        self.board.is_well_formed()
            && self
                .previous
                .as_ref()
                .map_or(true, |snapshot| snapshot.board.is_well_formed())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameStatus {
    Active,
    Ended,
}

/// What a call to [`Session::apply_move`] did, for renderers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveReport {
    pub direction: Direction,
    /// False when the move was ignored or left the board untouched.
    pub changed: bool,
    pub score_delta: u32,
    /// Board before the move.
    pub previous_board: Board,
    /// Board after the move, including the spawned tile.
    pub board: Board,
    /// Per-tile slides and merges; empty when nothing changed.
    pub transitions: Vec<TileTransition>,
    pub spawned: Option<SpawnedTile>,
    /// Set when this move ended the game.
    pub final_score: Option<u32>,
    /// False if the new state could not be written to storage.
    pub persisted: bool,
}

/// Result of [`Session::submit_score`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Entry accepted. `rank` is its zero-based position, or `None` if it
    /// did not make the top ten.
    Recorded { rank: Option<usize> },
    /// Game still running, blank name, or a score was already submitted for
    /// this game.
    Rejected,
}

/// A single player command.
///
/// Parses from `up`, `down`, `left`, `right`, `undo`, `new-game`, and
/// `submit-score <name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Undo,
    NewGame,
    SubmitScore(String),
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (trimmed, ""),
        };
        match verb.to_ascii_lowercase().as_str() {
            "undo" if rest.is_empty() => Ok(Command::Undo),
            "new-game" if rest.is_empty() => Ok(Command::NewGame),
            "submit-score" => Ok(Command::SubmitScore(rest.to_string())),
            other if rest.is_empty() => other.parse::<Direction>().map(Command::Move),
            _ => Err(format!("Unknown command '{}'", trimmed)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(direction) => write!(f, "{}", direction),
            Command::Undo => write!(f, "undo"),
            Command::NewGame => write!(f, "new-game"),
            Command::SubmitScore(name) => write!(f, "submit-score {}", name),
        }
    }
}

/// Manages the state and progression of one 2048 game session.
///
/// `S` is where state is persisted, `R` drives tile spawning.
///
/// # Examples
/// ```
/// use twenty48::engine::Direction;
/// use twenty48::session::Session;
/// use twenty48::storage::MemoryStore;
/// use rand::{rngs::SmallRng, SeedableRng};
///
/// let mut session = Session::open(MemoryStore::new(), SmallRng::seed_from_u64(3));
/// assert_eq!(session.board().empty_cells().len(), 14);
///
/// let report = session.apply_move(Direction::Left);
/// if report.changed {
///     assert!(session.can_undo());
///     session.undo();
///     assert_eq!(*session.board(), report.previous_board);
/// }
/// ```
pub struct Session<S, R> {
    store: S,
    rng: R,
    board: Board,
    score: u32,
    snapshot: Option<Snapshot>,
    status: GameStatus,
    leaderboard: Leaderboard,
    score_submitted: bool,
    last_persist_error: Option<StorageError>,
}

impl<S: KeyValueStore, R: Rng> Session<S, R> {
    /// Restores the saved session from `store`, or starts a fresh one.
    ///
    /// A missing or corrupt saved game yields an empty board. Whenever the
    /// board is empty after loading, two tiles are spawned.
    pub fn open(store: S, rng: R) -> Self {
        let saved = load_saved_game(&store);
        let leaderboard = Leaderboard::load(&store);
        let mut session = Session {
            store,
            rng,
            board: Board::new_empty(),
            score: 0,
            snapshot: None,
            status: GameStatus::Active,
            leaderboard,
            score_submitted: false,
            last_persist_error: None,
        };
        if let Some(saved) = saved {
            debug!("restored saved game with score {}", saved.score);
            session.board = saved.board;
            session.score = saved.score;
            session.snapshot = saved.previous;
        }
        if session.board.is_empty() {
            session.spawn_initial_tiles();
        }
        session
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_ended(&self) -> bool {
        self.status == GameStatus::Ended
    }

    /// The pending undo snapshot, if any.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.is_ended() && self.snapshot.is_some()
    }

    /// True while a finished game is waiting for a leaderboard name.
    pub fn awaiting_submission(&self) -> bool {
        self.is_ended() && !self.score_submitted
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    /// The error from the most recent failed write, cleared by the next
    /// successful one.
    pub fn last_persist_error(&self) -> Option<&StorageError> {
        self.last_persist_error.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Plays one move.
    ///
    /// Does nothing while the game is ended or when the move would not change
    /// the board; in that case the existing undo snapshot is kept. Otherwise
    /// the pre-move state becomes the undo snapshot, the resolved board and
    /// score are committed, a tile is spawned, the session is persisted, and
    /// the game ends if no move remains.
    pub fn apply_move(&mut self, direction: Direction) -> MoveReport {
        let previous_board = self.board;
        let mut report = MoveReport {
            direction,
            changed: false,
            score_delta: 0,
            previous_board,
            board: previous_board,
            transitions: Vec::new(),
            spawned: None,
            final_score: None,
            persisted: false,
        };

        if self.is_ended() {
            debug!("ignoring {} after game end", direction);
            return report;
        }

        let outcome = engine::resolve(&self.board, direction);
        // A move that changes nothing costs no spawn and keeps the old snapshot.
        if !outcome.changed {
            return report;
        }

        self.snapshot = Some(Snapshot {
            board: self.board,
            score: self.score,
        });
        self.board = outcome.board;
        self.score = self.score.saturating_add(outcome.score_delta);
        let spawned = engine::spawn_tile(&mut self.board, &mut self.rng);
        // Persist first, then decide whether the game is over.
        let persisted = self.persist();

        if engine::is_terminal(&self.board) {
            self.status = GameStatus::Ended;
            self.score_submitted = false;
            info!("game over with score {}", self.score);
            report.final_score = Some(self.score);
        }

        report.changed = true;
        report.score_delta = outcome.score_delta;
        report.board = self.board;
        report.transitions = outcome.transitions;
        report.spawned = spawned;
        report.persisted = persisted;
        report
    }

    /// Restores the board and score from before the last move.
    ///
    /// # Returns
    /// `false` when the game is ended or there is nothing to undo. The
    /// snapshot is consumed, so two undos in a row never go back two moves.
    pub fn undo(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        let Some(snapshot) = self.snapshot.take() else {
            return false;
        };
        self.board = snapshot.board;
        self.score = snapshot.score;
        debug!("undo restored score {}", self.score);
        self.persist();
        true
    }

    /// Discards the current game and starts over with two fresh tiles.
    pub fn new_game(&mut self) {
        self.board = Board::new_empty();
        self.score = 0;
        self.snapshot = None;
        self.status = GameStatus::Active;
        self.score_submitted = false;
        self.spawn_initial_tiles();
        info!("new game started");
        self.persist();
    }

    /// Records the final score under `name`, dated today.
    pub fn submit_score(&mut self, name: &str) -> SubmitOutcome {
        let date = today_string();
        self.submit_score_dated(name, &date)
    }

    /// Like [`Session::submit_score`] with an explicit date string.
    ///
    /// Accepted only once per ended game and only for a name that is not
    /// blank after trimming. A failed leaderboard write is logged; the
    /// in-memory leaderboard keeps the entry.
    pub fn submit_score_dated(&mut self, name: &str, date: &str) -> SubmitOutcome {
        let name = name.trim();
        if !self.awaiting_submission() || name.is_empty() {
            return SubmitOutcome::Rejected;
        }
        let rank = self.leaderboard.insert(LeaderboardEntry {
            name: name.to_string(),
            score: self.score,
            date: date.to_string(),
        });
        self.score_submitted = true;
        match self.leaderboard.save(&mut self.store) {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                warn!("failed to save leaderboard: {}", e);
                self.last_persist_error = Some(e);
            }
        }
        SubmitOutcome::Recorded { rank }
    }

    /// Runs one player command.
    ///
    /// # Returns
    /// `true` if the command changed the session or the leaderboard.
    pub fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::Move(direction) => self.apply_move(direction).changed,
            Command::Undo => self.undo(),
            Command::NewGame => {
                self.new_game();
                true
            }
            Command::SubmitScore(name) => {
                matches!(self.submit_score(&name), SubmitOutcome::Recorded { .. })
            }
        }
    }

    /// The state written to storage.
    pub fn saved_game(&self) -> SavedGame {
        SavedGame {
            board: self.board,
            score: self.score,
            previous: self.snapshot,
        }
    }

    fn spawn_initial_tiles(&mut self) {
        for _ in 0..INITIAL_TILES {
            engine::spawn_tile(&mut self.board, &mut self.rng);
        }
    }

    fn persist(&mut self) -> bool {
        let saved = self.saved_game();
        match storage::save_json(&mut self.store, GAME_STATE_KEY, &saved) {
            Ok(()) => {
                self.last_persist_error = None;
                true
            }
            Err(e) => {
                warn!("failed to save game state: {}", e);
                self.last_persist_error = Some(e);
                false
            }
        }
    }
}

fn load_saved_game<S: KeyValueStore + ?Sized>(store: &S) -> Option<SavedGame> {
    match storage::load_json::<SavedGame, _>(store, GAME_STATE_KEY) {
        Ok(Some(saved)) if saved.is_well_formed() => Some(saved),
        Ok(Some(_)) => {
            warn!("ignoring saved game with invalid tile values");
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!("ignoring unreadable saved game: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BOARD_SIZE;
    use crate::storage::{MemoryStore, LEADERBOARD_KEY};
    use crate::utils::board_from_str_array;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    /// Store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: bool,
        writes: usize,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Unavailable("quota exceeded".to_string()));
            }
            self.writes += 1;
            self.inner.set(key, value)
        }
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(2048)
    }

    fn store_with_board(board: Board, score: u32) -> FlakyStore {
        let mut store = FlakyStore::default();
        let saved = SavedGame {
            board,
            score,
            previous: None,
        };
        storage::save_json(&mut store.inner, GAME_STATE_KEY, &saved).unwrap();
        store
    }

    fn session_with(board: Board, score: u32) -> Session<FlakyStore, SmallRng> {
        Session::open(store_with_board(board, score), rng())
    }

    /// Moving left merges the leading pair and the spawn fills the only gap,
    /// leaving no equal neighbours whichever value spawns.
    fn one_move_from_game_over() -> Board {
        board_from_str_array(&[
            "2 2 8 16",
            "8 16 32 64",
            "16 32 64 128",
            "32 64 128 256",
        ])
        .unwrap()
    }

    /// Moving left merges the bottom-right pair; the spawn fills the gap and
    /// left becomes a no-op while the vertical pair of 2s keeps the game alive.
    fn one_move_from_rest() -> Board {
        board_from_str_array(&[
            "2 4 8 16",
            "2 8 16 32",
            "8 16 32 64",
            "16 32 64 64",
        ])
        .unwrap()
    }

    #[test]
    fn test_open_fresh_session_spawns_two_tiles() {
        let session = Session::open(MemoryStore::new(), rng());
        assert_eq!(session.board().empty_cells().len(), BOARD_SIZE * BOARD_SIZE - 2);
        assert_eq!(session.score(), 0);
        assert_eq!(session.status(), GameStatus::Active);
        assert!(!session.can_undo());
    }

    #[test]
    fn test_open_restores_saved_game() {
        let board = board_from_str_array(&["2 4", ". 8"]).unwrap();
        let previous = board_from_str_array(&["2 4", "8"]).unwrap();
        let mut store = MemoryStore::new();
        let saved = SavedGame {
            board,
            score: 12,
            previous: Some(Snapshot {
                board: previous,
                score: 4,
            }),
        };
        storage::save_json(&mut store, GAME_STATE_KEY, &saved).unwrap();

        let session = Session::open(store, rng());
        assert_eq!(*session.board(), board);
        assert_eq!(session.score(), 12);
        assert_eq!(session.snapshot().map(|s| s.score), Some(4));
        assert_eq!(session.saved_game(), saved);
    }

    #[test]
    fn test_open_ignores_corrupt_state() {
        for raw in [
            "not json at all",
            r#"{"gameBoard":[[0,0],[0,0]],"currentScore":4,"previousGameState":null}"#,
            r#"{"gameBoard":[[3,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]],"currentScore":4,"previousGameState":null}"#,
        ] {
            let mut store = MemoryStore::new();
            store.set(GAME_STATE_KEY, raw).unwrap();
            let session = Session::open(store, rng());
            assert_eq!(session.score(), 0, "{}", raw);
            assert_eq!(session.board().empty_cells().len(), 14);
        }
    }

    #[test]
    fn test_open_rejects_oversized_tiles_and_keeps_playing() {
        for raw in [
            r#"{"gameBoard":[[2147483648,2147483648,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]],"currentScore":4,"previousGameState":null}"#,
            r#"{"gameBoard":[[1073741824,1073741824,1073741824,1073741824],[0,0,0,0],[0,0,0,0],[0,0,0,0]],"currentScore":4,"previousGameState":null}"#,
            r#"{"gameBoard":[[2,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]],"currentScore":4,"previousGameState":{"gameBoard":[[262144,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]],"currentScore":0}}"#,
        ] {
            let mut store = MemoryStore::new();
            store.set(GAME_STATE_KEY, raw).unwrap();
            let mut session = Session::open(store, rng());
            assert_eq!(session.score(), 0, "{}", raw);
            assert!(!session.can_undo());
            assert!(session.board().highest_tile() <= 4);
            for direction in Direction::ALL {
                session.apply_move(direction);
            }
            assert!(session.board().is_well_formed());
        }
    }

    #[test]
    fn test_open_accepts_original_json_layout() {
        let raw = r#"{"gameBoard":[[2,2,0,0],[0,0,0,0],[0,0,0,4],[0,0,0,0]],"currentScore":36,"previousGameState":{"gameBoard":[[2,0,0,2],[0,0,0,0],[0,0,0,4],[0,0,0,0]],"currentScore":36}}"#;
        let mut store = MemoryStore::new();
        store.set(GAME_STATE_KEY, raw).unwrap();
        let session = Session::open(store, rng());
        assert_eq!(session.score(), 36);
        assert_eq!(session.board().get_tile(2, 3), 4);
        assert!(session.can_undo());
    }

    #[test]
    fn test_apply_move_commits_spawns_and_persists() {
        let board = board_from_str_array(&["0 2 0 2"]).unwrap();
        let mut session = session_with(board, 10);

        let report = session.apply_move(Direction::Left);
        assert!(report.changed);
        assert!(report.persisted);
        assert_eq!(report.score_delta, 4);
        assert_eq!(session.score(), 14);
        assert_eq!(report.previous_board, board);
        assert_eq!(session.board().get_tile(0, 0), 4);
        assert_eq!(session.board().tile_sum(), 4 + report.spawned.unwrap().value as u64);
        assert_eq!(report.board, *session.board());
        assert_eq!(report.transitions.len(), 2);
        assert_eq!(
            session.snapshot(),
            Some(&Snapshot {
                board,
                score: 10
            })
        );

        let stored: SavedGame = storage::load_json(session.store(), GAME_STATE_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(stored, session.saved_game());
    }

    #[test]
    fn test_noop_move_keeps_snapshot_and_skips_persistence() {
        let board = one_move_from_rest();
        let mut session = session_with(board, 0);
        let report = session.apply_move(Direction::Left);
        assert!(report.changed);
        assert_eq!(report.score_delta, 128);
        assert_eq!(report.spawned.map(|t| (t.row, t.col)), Some((3, 3)));
        assert!(session.board().is_full());
        assert!(!session.is_ended());
        assert_eq!(session.store().writes, 1);

        let before = *session.board();
        let report = session.apply_move(Direction::Left);
        assert!(!report.changed);
        assert_eq!(report.spawned, None);
        assert_eq!(report.board, before);
        assert!(report.transitions.is_empty());
        assert_eq!(*session.board(), before);
        assert_eq!(session.score(), 128);
        assert_eq!(session.snapshot(), Some(&Snapshot { board, score: 0 }));
        assert_eq!(session.store().writes, 1);
    }

    #[test]
    fn test_full_board_without_merges_ignores_every_direction() {
        let board = board_from_str_array(&[
            "2 4 8 16",
            "4 8 16 32",
            "8 16 32 64",
            "16 32 64 128",
        ])
        .unwrap();
        let mut session = session_with(board, 100);
        for direction in Direction::ALL {
            let report = session.apply_move(direction);
            assert!(!report.changed);
            assert_eq!(report.spawned, None);
            assert!(!report.persisted);
        }
        assert_eq!(*session.board(), board);
        assert_eq!(session.score(), 100);
        assert_eq!(session.store().writes, 0);
        assert!(session.snapshot().is_none());
        // Loading never runs the terminal check; only a move can end the game.
        assert_eq!(session.status(), GameStatus::Active);
    }

    #[test]
    fn test_undo_restores_once() {
        let board = board_from_str_array(&["2 2", ". 4"]).unwrap();
        let mut session = session_with(board, 20);

        let report = session.apply_move(Direction::Left);
        assert!(report.changed);
        assert_eq!(session.score(), 24);

        assert!(session.undo());
        assert_eq!(*session.board(), board);
        assert_eq!(session.score(), 20);
        assert!(session.snapshot().is_none());

        assert!(!session.undo());
        assert_eq!(*session.board(), board);
        assert_eq!(session.score(), 20);

        let stored: SavedGame = storage::load_json(session.store(), GAME_STATE_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(stored.board, board);
        assert_eq!(stored.previous, None);
    }

    #[test]
    fn test_move_ending_the_game() {
        let mut session = session_with(one_move_from_game_over(), 500);
        let report = session.apply_move(Direction::Left);
        assert!(report.changed);
        let spawned = report.spawned.unwrap();
        assert_eq!((spawned.row, spawned.col), (0, 3));
        assert!(engine::is_terminal(session.board()));

        assert!(session.is_ended());
        assert_eq!(session.status(), GameStatus::Ended);
        assert_eq!(report.final_score, Some(504));
        assert!(session.awaiting_submission());
        assert!(!session.can_undo());
        assert!(!session.undo());

        let frozen = *session.board();
        for direction in Direction::ALL {
            assert!(!session.apply_move(direction).changed);
        }
        assert_eq!(*session.board(), frozen);
        assert_eq!(session.score(), 504);
    }

    #[test]
    fn test_submit_score_rules() {
        let mut session = session_with(one_move_from_game_over(), 500);
        assert_eq!(session.submit_score("early"), SubmitOutcome::Rejected);

        session.apply_move(Direction::Left);
        assert!(session.is_ended());
        assert_eq!(
            session.submit_score_dated("   ", "01.02.2024"),
            SubmitOutcome::Rejected
        );
        assert_eq!(
            session.submit_score_dated("  ann  ", "01.02.2024"),
            SubmitOutcome::Recorded { rank: Some(0) }
        );
        assert_eq!(
            session.submit_score_dated("ann", "01.02.2024"),
            SubmitOutcome::Rejected
        );
        assert!(!session.awaiting_submission());

        let entry = &session.leaderboard().entries()[0];
        assert_eq!(entry.name, "ann");
        assert_eq!(entry.score, 504);
        assert_eq!(entry.date, "01.02.2024");
        assert_eq!(Leaderboard::load(session.store()), *session.leaderboard());
    }

    #[test]
    fn test_new_game_resets_everything() {
        let mut session = session_with(one_move_from_game_over(), 500);
        session.apply_move(Direction::Left);
        session.new_game();
        assert_eq!(session.status(), GameStatus::Active);
        assert_eq!(session.score(), 0);
        assert!(session.snapshot().is_none());
        assert_eq!(session.board().empty_cells().len(), 14);
        assert!(!session.awaiting_submission());

        let stored: SavedGame = storage::load_json(session.store(), GAME_STATE_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(stored.board, *session.board());
        assert_eq!(stored.score, 0);
    }

    #[test]
    fn test_storage_failure_keeps_memory_state() {
        let board = board_from_str_array(&["2 2"]).unwrap();
        let mut store = store_with_board(board, 0);
        store.fail_writes = true;
        let mut session = Session::open(store, rng());

        let report = session.apply_move(Direction::Right);
        assert!(report.changed);
        assert!(!report.persisted);
        assert_eq!(session.score(), 4);
        assert!(matches!(
            session.last_persist_error(),
            Some(StorageError::Unavailable(_))
        ));

        assert!(session.undo());
        assert_eq!(*session.board(), board);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn test_leaderboard_submission_survives_write_failure() {
        let mut store = FlakyStore::default();
        store.fail_writes = true;
        storage::save_json(
            &mut store.inner,
            GAME_STATE_KEY,
            &SavedGame {
                board: one_move_from_game_over(),
                score: 0,
                previous: None,
            },
        )
        .unwrap();
        let mut session = Session::open(store, rng());
        session.apply_move(Direction::Left);
        assert!(session.is_ended());
        assert_eq!(
            session.submit_score_dated("bo", "02.02.2024"),
            SubmitOutcome::Recorded { rank: Some(0) }
        );
        assert_eq!(session.leaderboard().len(), 1);
        assert!(session.last_persist_error().is_some());
        assert_eq!(session.store().get(LEADERBOARD_KEY).unwrap(), None);
    }

    #[test]
    fn test_reopen_sees_persisted_state() {
        let mut session = Session::open(MemoryStore::new(), rng());
        let mut moved = false;
        for direction in Direction::ALL {
            if session.apply_move(direction).changed {
                moved = true;
                break;
            }
        }
        assert!(moved);
        let board = *session.board();
        let score = session.score();
        let snapshot = session.snapshot().copied();

        let reopened = Session::open(session.into_store(), SmallRng::seed_from_u64(1));
        assert_eq!(*reopened.board(), board);
        assert_eq!(reopened.score(), score);
        assert_eq!(reopened.snapshot().copied(), snapshot);
    }

    #[test]
    fn test_random_play_invariants() {
        let mut session = Session::open(MemoryStore::new(), SmallRng::seed_from_u64(77));
        let mut pick = SmallRng::seed_from_u64(78);
        for _ in 0..2000 {
            if session.is_ended() {
                assert!(engine::is_terminal(session.board()));
                session.new_game();
                continue;
            }
            let score_before = session.score();
            let sum_before = session.board().tile_sum();
            let direction = Direction::ALL[pick.gen_range(0..4)];
            let report = session.apply_move(direction);
            if report.changed {
                let spawned = report.spawned.map_or(0, |t| t.value as u64);
                assert_eq!(session.board().tile_sum(), sum_before + spawned);
                assert_eq!(session.score(), score_before + report.score_delta);
                assert!(session.board().is_well_formed());
            } else {
                assert_eq!(session.score(), score_before);
            }
        }
    }

    #[test]
    fn test_command_parsing_and_dispatch() {
        assert_eq!("left".parse::<Command>(), Ok(Command::Move(Direction::Left)));
        assert_eq!("UNDO".parse::<Command>(), Ok(Command::Undo));
        assert_eq!("new-game".parse::<Command>(), Ok(Command::NewGame));
        assert_eq!(
            "submit-score  Ann Lee ".parse::<Command>(),
            Ok(Command::SubmitScore("Ann Lee".to_string()))
        );
        assert!("jump".parse::<Command>().is_err());
        assert!("undo twice".parse::<Command>().is_err());
        assert_eq!(Command::SubmitScore("x".into()).to_string(), "submit-score x");

        let board = board_from_str_array(&["2 2"]).unwrap();
        let mut session = session_with(board, 0);
        assert!(session.dispatch(Command::Move(Direction::Left)));
        assert!(session.dispatch(Command::Undo));
        assert!(!session.dispatch(Command::Undo));
        assert!(!session.dispatch(Command::SubmitScore("ann".into())));
        assert!(session.dispatch(Command::NewGame));
        assert_eq!(session.score(), 0);
    }
}
