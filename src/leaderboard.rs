//! Ranked list of finished games, persisted under [`LEADERBOARD_KEY`].
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::{self, KeyValueStore, StorageError, LEADERBOARD_KEY};

/// Maximum number of entries kept.
pub const LEADERBOARD_CAPACITY: usize = 10;

/// One recorded result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    /// Date of submission, `DD.MM.YYYY`, taken from the UTC calendar rather
    /// than the player's local time zone.
    pub date: String,
}

/// Entries ordered by descending score, at most [`LEADERBOARD_CAPACITY`] long.
///
/// Equal scores keep submission order: an earlier entry ranks above a later
/// one with the same score.
///
/// ```
/// use twenty48::leaderboard::{Leaderboard, LeaderboardEntry};
/// let mut board = Leaderboard::new();
/// let entry = |name: &str, score| LeaderboardEntry {
///     name: name.to_string(),
///     score,
///     date: "01.01.2024".to_string(),
/// };
/// assert_eq!(board.insert(entry("ann", 100)), Some(0));
/// assert_eq!(board.insert(entry("bob", 300)), Some(0));
/// assert_eq!(board.insert(entry("cy", 100)), Some(2));
/// assert_eq!(board.entries()[1].name, "ann");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a leaderboard from arbitrary entries, sorting (stably) and
    /// truncating to capacity.
    pub fn from_entries(mut entries: Vec<LeaderboardEntry>) -> Self {
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(LEADERBOARD_CAPACITY);
        Leaderboard { entries }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if a result with `score` would be kept.
    pub fn qualifies(&self, score: u32) -> bool {
        self.entries.len() < LEADERBOARD_CAPACITY
            || self.entries.last().map_or(true, |lowest| score > lowest.score)
    }

    /// Inserts `entry` behind every entry with an equal or higher score.
    ///
    /// # Returns
    /// The zero-based rank of the new entry, or `None` if it fell outside the
    /// top [`LEADERBOARD_CAPACITY`] and was dropped.
    pub fn insert(&mut self, entry: LeaderboardEntry) -> Option<usize> {
        let rank = self
            .entries
            .iter()
            .position(|existing| existing.score < entry.score)
            .unwrap_or(self.entries.len());
        if rank >= LEADERBOARD_CAPACITY {
            return None;
        }
        info!("leaderboard: {} scored {} (rank {})", entry.name, entry.score, rank + 1);
        self.entries.insert(rank, entry);
        self.entries.truncate(LEADERBOARD_CAPACITY);
        Some(rank)
    }

    /// Loads the stored leaderboard. Missing or unreadable data yields an
    /// empty leaderboard.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        match storage::load_json::<Vec<LeaderboardEntry>, _>(store, LEADERBOARD_KEY) {
            Ok(Some(entries)) => Self::from_entries(entries),
            Ok(None) => Self::new(),
            Err(e) => {
                warn!("ignoring unreadable leaderboard: {}", e);
                Self::new()
            }
        }
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StorageError> {
        storage::save_json(store, LEADERBOARD_KEY, &self.entries)
    }
}

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "No records yet");
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:>2}. {:<16} {:>8}  {}",
                idx + 1,
                entry.name,
                entry.score,
                entry.date
            )?;
        }
        Ok(())
    }
}
