//! Core rules engine for the 2048 sliding-tile puzzle.
//!
//! This module defines the game's fundamental components:
//! - `Board`: the fixed 4x4 grid of tile values.
//! - `Direction` and `Orientation`: the four move directions and the grid
//!   reorientation that lets a single left-compaction serve all of them.
//! - `resolve`: the move resolver (slide, merge, score delta, per-tile transitions).
//! - `spawn_tile`: random 2/4 insertion into an empty cell.
//! - `is_terminal` / `has_legal_move`: game-over detection.
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Defines the size of the game board (width and height).
/// The board is always square: a `BOARD_SIZE` of 4 means a 4x4 grid.
pub const BOARD_SIZE: usize = 4;

/// Largest tile a 4x4 game can reach (2^17).
pub const MAX_TILE: u32 = 1 << 17;

/// The raw cell matrix, row-major. `0` is an empty cell.
pub type Grid = [[u32; BOARD_SIZE]; BOARD_SIZE];

/// Probability, in tenths, that a spawned tile is a 2 rather than a 4.
const SPAWN_TWO_TENTHS: u32 = 9;

/// Represents the game board as a 2D grid of tile values.
///
/// Every cell holds either `0` (empty) or a power of two. The board never
/// changes size; it is mutated cell by cell or replaced wholesale.
///
/// Serializes as a plain 4x4 array of integers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    grid: Grid,
}

impl Board {
    /// Creates a new empty game board with every cell set to `0`.
    ///
    /// # Examples
    /// ```
    /// use twenty48::engine::Board;
    /// let board = Board::new_empty();
    /// assert_eq!(board.get_tile(0, 0), 0);
    /// assert!(board.is_empty());
    /// ```
    pub fn new_empty() -> Self {
        Board {
            grid: [[0; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Creates a new board from a predefined grid configuration.
    ///
    /// This is useful for testing, for restoring saved state, and for the
    /// move resolver when it hands back a freshly computed grid.
    pub fn from_grid(grid: Grid) -> Self {
        Board { grid }
    }

    /// Returns the tile value at row `r`, column `c` (`0` when empty).
    ///
    /// # Panics
    /// Panics if `r` or `c` is outside `0..BOARD_SIZE`.
    pub fn get_tile(&self, r: usize, c: usize) -> u32 {
        self.grid[r][c]
    }

    /// Sets the tile at row `r`, column `c` to `value`.
    ///
    /// # Panics
    /// Panics if `r` or `c` is outside `0..BOARD_SIZE`.
    pub fn set_tile(&mut self, r: usize, c: usize, value: u32) {
        self.grid[r][c] = value;
    }

    /// Returns an immutable reference to the underlying grid.
    pub fn get_grid(&self) -> &Grid {
        &self.grid
    }

    /// Coordinates of every empty cell, in row-major order.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for r in 0..BOARD_SIZE {
            for c in 0..BOARD_SIZE {
                if self.grid[r][c] == 0 {
                    cells.push((r, c));
                }
            }
        }
        cells
    }

    /// True when no cell is empty.
    pub fn is_full(&self) -> bool {
        self.grid.iter().flatten().all(|&v| v != 0)
    }

    /// True when every cell is empty.
    pub fn is_empty(&self) -> bool {
        self.grid.iter().flatten().all(|&v| v == 0)
    }

    /// Sum of all tile values on the board.
    pub fn tile_sum(&self) -> u64 {
        self.grid.iter().flatten().map(|&v| v as u64).sum()
    }

    /// The highest tile value present, or `0` for an empty board.
    pub fn highest_tile(&self) -> u32 {
        self.grid.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Checks that every cell is either empty or a power of two between 2 and
    /// [`MAX_TILE`].
    ///
    /// Boards that fail this check cannot have been produced by spawns and
    /// merges, so they are treated as corrupt when loaded from storage.
    pub fn is_well_formed(&self) -> bool {
        self.grid
            .iter()
            .flatten()
            .all(|&v| v == 0 || (v >= 2 && v <= MAX_TILE && v.is_power_of_two()))
    }

}

impl fmt::Display for Board {
    /// One line per row, each cell right-aligned in a five-character column.
    /// Empty cells are shown as `.`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.grid.iter().enumerate() {
            for &value in row {
                if value == 0 {
                    write!(f, "{:>5}", ".")?;
                } else {
                    write!(f, "{:>5}", value)?;
                }
            }
            if r < BOARD_SIZE - 1 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// A direction to slide and merge tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All four directions, in the order they are probed for legal moves.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("Unknown direction '{}'", other)),
        }
    }
}

/// Maps a board onto a grid where the requested move is always "left", and back.
///
/// Vertical moves transpose the grid; moves toward the high-index edge
/// (right, down) reverse every row. `forward` applies transpose then reverse,
/// `inverse` undoes them in the opposite order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Orientation {
    transpose: bool,
    reverse: bool,
}

impl Orientation {
    pub fn for_direction(direction: Direction) -> Self {
        Orientation {
            transpose: matches!(direction, Direction::Up | Direction::Down),
            reverse: matches!(direction, Direction::Right | Direction::Down),
        }
    }

    /// Board coordinates to move-left coordinates.
    pub fn forward(&self, grid: &Grid) -> Grid {
        let mut out = if self.transpose { transpose(grid) } else { *grid };
        if self.reverse {
            for row in out.iter_mut() {
                row.reverse();
            }
        }
        out
    }

    /// Move-left coordinates back to board coordinates.
    pub fn inverse(&self, grid: &Grid) -> Grid {
        let mut out = *grid;
        if self.reverse {
            for row in out.iter_mut() {
                row.reverse();
            }
        }
        if self.transpose {
            out = transpose(&out);
        }
        out
    }

    /// Translates a single `(row, col)` of the oriented grid to board coordinates.
    pub fn board_position(&self, row: usize, col: usize) -> (usize, usize) {
        let col = if self.reverse { BOARD_SIZE - 1 - col } else { col };
        if self.transpose {
            (col, row)
        } else {
            (row, col)
        }
    }
}

fn transpose(grid: &Grid) -> Grid {
    let mut out = [[0; BOARD_SIZE]; BOARD_SIZE];
    for (r, row) in grid.iter().enumerate() {
        for (c, &value) in row.iter().enumerate() {
            out[c][r] = value;
        }
    }
    out
}

/// Where one pre-move tile ended up, in board coordinates.
///
/// Both halves of a merge point at the same `to` cell and carry `merged = true`;
/// `value` is always the tile's value before the move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileTransition {
    pub from: (usize, usize),
    pub to: (usize, usize),
    pub value: u32,
    pub merged: bool,
}

/// Result of resolving one move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The board after sliding and merging (no spawn).
    pub board: Board,
    /// Sum of the values produced by merges.
    pub score_delta: u32,
    /// False iff `board` is cell-wise identical to the input.
    pub changed: bool,
    /// One entry per tile present before the move.
    pub transitions: Vec<TileTransition>,
}

/// A tile placed by [`spawn_tile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnedTile {
    pub row: usize,
    pub col: usize,
    pub value: u32,
}

#[derive(Clone, Copy, Debug)]
struct SlideStep {
    from: usize,
    to: usize,
    value: u32,
    merged: bool,
}

struct RowSlide {
    cells: [u32; BOARD_SIZE],
    score: u32,
    changed: bool,
    steps: Vec<SlideStep>,
}

/// Compacts one row toward index 0, merging equal neighbours at most once per
/// output cell.
fn slide_row_left(row: &[u32; BOARD_SIZE]) -> RowSlide {
    let mut cells = [0; BOARD_SIZE];
    let mut len = 0;
    let mut previous: Option<u32> = None;
    let mut score: u32 = 0;
    let mut changed = false;
    let mut steps: Vec<SlideStep> = Vec::with_capacity(BOARD_SIZE);

    for (col, &value) in row.iter().enumerate() {
        if value == 0 {
            continue;
        }
        if previous == Some(value) {
            // Merge into the last emitted cell; out-of-range tiles saturate.
            let doubled = value.saturating_mul(2);
            cells[len - 1] = doubled;
            score = score.saturating_add(doubled);
            // A merged cell cannot absorb a third equal tile.
            previous = None;
            changed = true;
            if let Some(partner) = steps.last_mut() {
                partner.merged = true;
            }
            steps.push(SlideStep {
                from: col,
                to: len - 1,
                value,
                merged: true,
            });
        } else {
            cells[len] = value;
            len += 1;
            previous = Some(value);
            // The tile slid over at least one gap.
            if col != len - 1 {
                changed = true;
            }
            steps.push(SlideStep {
                from: col,
                to: len - 1,
                value,
                merged: false,
            });
        }
    }

    RowSlide {
        cells,
        score,
        changed,
        steps,
    }
}

/// Slides and merges every tile on `board` toward `direction`.
///
/// No tile is spawned; the caller decides what to do with the outcome.
///
/// # Examples
/// ```
/// use twenty48::engine::{resolve, Board, Direction};
/// let board = Board::from_grid([[0, 2, 0, 2], [0; 4], [0; 4], [0; 4]]);
/// let outcome = resolve(&board, Direction::Left);
/// assert!(outcome.changed);
/// assert_eq!(outcome.score_delta, 4);
/// assert_eq!(outcome.board.get_grid()[0], [4, 0, 0, 0]);
/// ```
pub fn resolve(board: &Board, direction: Direction) -> MoveOutcome {
    // Turn the board so that every direction becomes a slide to the left.
    let orientation = Orientation::for_direction(direction);
    let oriented = orientation.forward(&board.grid);

    let mut compacted = [[0; BOARD_SIZE]; BOARD_SIZE];
    let mut score_delta: u32 = 0;
    let mut changed = false;
    let mut transitions = Vec::new();

    for (row_idx, row) in oriented.iter().enumerate() {
        let slide = slide_row_left(row);
        compacted[row_idx] = slide.cells;
        score_delta = score_delta.saturating_add(slide.score);
        changed |= slide.changed;
        // Report positions in board coordinates, not the turned ones.
        transitions.extend(slide.steps.iter().map(|step| TileTransition {
            from: orientation.board_position(row_idx, step.from),
            to: orientation.board_position(row_idx, step.to),
            value: step.value,
            merged: step.merged,
        }));
    }

    // Turn the compacted grid back.
    let outcome = MoveOutcome {
        board: Board::from_grid(orientation.inverse(&compacted)),
        score_delta,
        changed,
        transitions,
    };
    debug!(
        "resolved {}: changed={} score_delta={}",
        direction, outcome.changed, outcome.score_delta
    );
    outcome
}

/// Places a 2 (90%) or a 4 (10%) on a uniformly chosen empty cell.
///
/// Returns the placed tile, or `None` (leaving the board untouched) when the
/// board is full.
///
/// ```
/// use twenty48::engine::{spawn_tile, Board};
/// use rand::{rngs::SmallRng, SeedableRng};
/// let mut rng = SmallRng::seed_from_u64(7);
/// let mut board = Board::new_empty();
/// let tile = spawn_tile(&mut board, &mut rng).unwrap();
/// assert!(tile.value == 2 || tile.value == 4);
/// assert_eq!(board.empty_cells().len(), 15);
/// ```
pub fn spawn_tile<R: Rng + ?Sized>(board: &mut Board, rng: &mut R) -> Option<SpawnedTile> {
    let empty = board.empty_cells();
    if empty.is_empty() {
        return None;
    }
    let (row, col) = empty[rng.gen_range(0..empty.len())];
    let value = if rng.gen_range(0..10) < SPAWN_TWO_TENTHS { 2 } else { 4 };
    board.set_tile(row, col, value);
    Some(SpawnedTile { row, col, value })
}

/// True iff the board is full and no two orthogonally adjacent cells are equal.
///
/// For any board holding at least one tile this agrees with
/// `!has_legal_move(board)`: a board with an empty cell always has a tile
/// next to a gap that can slide into it.
pub fn is_terminal(board: &Board) -> bool {
    if !board.is_full() {
        return false;
    }
    for r in 0..BOARD_SIZE {
        for c in 0..BOARD_SIZE {
            let value = board.grid[r][c];
            if c + 1 < BOARD_SIZE && board.grid[r][c + 1] == value {
                return false;
            }
            if r + 1 < BOARD_SIZE && board.grid[r + 1][c] == value {
                return false;
            }
        }
    }
    true
}

/// True if resolving any of the four directions would change the board.
pub fn has_legal_move(board: &Board) -> bool {
    Direction::ALL
        .iter()
        .any(|&direction| resolve(board, direction).changed)
}
