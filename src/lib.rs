//! # twenty48
//!
//! This library provides the rules engine for the 2048 sliding-tile puzzle:
//! board state, move resolution, tile spawning, game-over detection, score
//! accounting, single-level undo, and persistence of the game and leaderboard.
//!
//! It is used by the `human_player` binary, which lets you play in the
//! terminal. Rendering and input handling stay outside the library; they read
//! the session's state and send it commands.
//!
//! ## Modules
//! - `engine`: the 4x4 `Board`, `Direction`, the move resolver (`resolve`),
//!   the tile spawner (`spawn_tile`), and terminal detection (`is_terminal`).
//! - `session`: `Session`, which orchestrates turns, undo, new games, and
//!   score submission, and persists state after every change.
//! - `leaderboard`: the ranked top-ten list of finished games.
//! - `storage`: the `KeyValueStore` seam plus in-memory and directory-backed stores.
//! - `config`: command-line configuration for the binary.
//! - `utils`: board parsing from text and date formatting.

pub mod config;
pub mod engine;
pub mod leaderboard;
pub mod session;
pub mod storage;
pub mod utils;
